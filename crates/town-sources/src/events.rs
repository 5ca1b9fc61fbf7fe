//! Tail reader for the append-only town event log.
//!
//! Each line has the shape `YYYY-MM-DD HH:MM:SS [type] message`, where the
//! first token of the message is the originating agent address.

use crate::{read_optional, SourceError, SourceReader};
use chrono::NaiveDateTime;
use regex::Regex;
use std::sync::OnceLock;
use town_core::TownEvent;

pub const DEFAULT_EVENT_LIMIT: usize = 100;

fn event_line_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^(\d{4}-\d{2}-\d{2} \d{2}:\d{2}:\d{2}) \[([^\]]+)\] (.+)$")
            .expect("valid regex")
    })
}

pub fn parse_event_line(line: &str) -> Option<TownEvent> {
    let captures = event_line_pattern().captures(line.trim_end())?;
    let timestamp = NaiveDateTime::parse_from_str(&captures[1], "%Y-%m-%d %H:%M:%S").ok()?;
    let message = captures[3].trim().to_string();
    let agent = message.split_whitespace().next()?.to_string();
    Some(TownEvent {
        timestamp,
        event_type: captures[2].to_string(),
        agent,
        message,
    })
}

/// Parses the last `limit` lines of `contents`, newest first. Lines that do
/// not match the grammar are dropped.
pub fn parse_event_log(contents: &str, limit: usize) -> Vec<TownEvent> {
    let lines: Vec<&str> = contents.lines().collect();
    let start = lines.len().saturating_sub(limit);
    lines[start..]
        .iter()
        .rev()
        .filter_map(|line| parse_event_line(line))
        .collect()
}

impl SourceReader {
    pub async fn events(&self, limit: usize) -> Result<Vec<TownEvent>, SourceError> {
        let path = self.paths().event_log();
        let contents = read_optional("events", &path).await?;
        Ok(contents
            .map(|contents| parse_event_log(&contents, limit))
            .unwrap_or_default())
    }
}
