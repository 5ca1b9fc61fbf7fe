//! Line classifier for the free-text `gt doctor` report.

use crate::{SourceError, SourceReader};
use regex::Regex;
use std::sync::OnceLock;
use tokio_util::sync::CancellationToken;
use town_core::{CheckStatus, DoctorCheck, DoctorReport, DoctorSummary};

const FIX_ARROW: char = '→';
const DETAIL_INDENT: usize = 4;

fn summary_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^\s*(\d+) checks?, (\d+) passed, (\d+) warnings?, (\d+) errors?\s*$")
            .expect("valid regex")
    })
}

fn check_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^\s*([✓✔⚠✗✘✖])\s+([^:]+):\s*(.*)$").expect("valid regex")
    })
}

enum ReportLine {
    Summary(DoctorSummary),
    Check(DoctorCheck),
    Fix(String),
    Detail(String),
    Other,
}

fn glyph_status(glyph: &str) -> Option<CheckStatus> {
    match glyph {
        "✓" | "✔" => Some(CheckStatus::Pass),
        "⚠" => Some(CheckStatus::Warn),
        "✗" | "✘" | "✖" => Some(CheckStatus::Fail),
        _ => None,
    }
}

fn classify(line: &str) -> ReportLine {
    if let Some(captures) = summary_pattern().captures(line) {
        let count = |idx: usize| captures[idx].parse::<usize>().unwrap_or(0);
        return ReportLine::Summary(DoctorSummary {
            total: count(1),
            passed: count(2),
            warnings: count(3),
            errors: count(4),
        });
    }
    if let Some(captures) = check_pattern().captures(line) {
        if let Some(status) = glyph_status(&captures[1]) {
            return ReportLine::Check(DoctorCheck {
                name: captures[2].trim().to_string(),
                status,
                message: captures[3].trim().to_string(),
                details: Vec::new(),
                fix: None,
            });
        }
    }
    let trimmed = line.trim();
    if let Some(fix) = trimmed.strip_prefix(FIX_ARROW) {
        return ReportLine::Fix(fix.trim().to_string());
    }
    let indent = line.len() - line.trim_start_matches(' ').len();
    if indent >= DETAIL_INDENT && !trimmed.is_empty() {
        return ReportLine::Detail(trimmed.to_string());
    }
    ReportLine::Other
}

pub fn parse_doctor_report(output: &str) -> DoctorReport {
    let mut report = DoctorReport::default();
    let mut current: Option<DoctorCheck> = None;
    for line in output.lines() {
        match classify(line) {
            ReportLine::Summary(summary) => report.summary = Some(summary),
            ReportLine::Check(check) => {
                if let Some(done) = current.replace(check) {
                    report.checks.push(done);
                }
            }
            ReportLine::Fix(fix) => {
                if let Some(check) = current.as_mut() {
                    check.fix = Some(match check.fix.take() {
                        Some(existing) => format!("{existing}\n{fix}"),
                        None => fix,
                    });
                }
            }
            ReportLine::Detail(detail) => {
                if let Some(check) = current.as_mut() {
                    check.details.push(detail);
                }
            }
            ReportLine::Other => {}
        }
    }
    if let Some(done) = current {
        report.checks.push(done);
    }
    report
}

impl SourceReader {
    /// Runs the diagnostic command. It exits non-zero whenever a check
    /// fails, so the exit status is ignored and stdout is parsed regardless.
    pub async fn doctor(&self, cancel: &CancellationToken) -> Result<DoctorReport, SourceError> {
        let (command, result) = self.exec("gt", &["doctor"], self.paths().root(), cancel).await;
        let stdout = match result {
            Ok(output) => output.stdout,
            Err(error) => match error.stdout() {
                Some(stdout) => stdout.to_string(),
                None => {
                    return Err(SourceError::Command {
                        name: "doctor",
                        command,
                        error,
                    })
                }
            },
        };
        Ok(parse_doctor_report(&stdout))
    }
}
