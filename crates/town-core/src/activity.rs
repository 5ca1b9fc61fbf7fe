use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

/// One parsed line of the town event log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TownEvent {
    pub timestamp: NaiveDateTime,
    pub event_type: String,
    pub agent: String,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CheckStatus {
    Pass,
    Warn,
    Fail,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DoctorCheck {
    pub name: String,
    pub status: CheckStatus,
    pub message: String,
    pub details: Vec<String>,
    pub fix: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DoctorSummary {
    pub total: usize,
    pub passed: usize,
    pub warnings: usize,
    pub errors: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DoctorReport {
    pub checks: Vec<DoctorCheck>,
    pub summary: Option<DoctorSummary>,
}

impl DoctorReport {
    pub fn failing(&self) -> impl Iterator<Item = &DoctorCheck> {
        self.checks
            .iter()
            .filter(|check| check.status == CheckStatus::Fail)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PluginInfo {
    pub name: String,
    /// `"town"` or the owning rig's name.
    pub scope: String,
    pub path: String,
    pub title: String,
    pub description: Option<String>,
    pub gate: Option<String>,
    pub schedule: Option<String>,
    pub cooldown: Option<String>,
    pub enabled: bool,
    pub last_error: Option<String>,
    pub last_run: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CrewWorktree {
    pub rig: String,
    pub name: String,
    pub path: String,
    pub branch: Option<String>,
    /// `"clean"` or `"<n> uncommitted"`.
    pub git_status: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CommitInfo {
    pub hash: String,
    pub author: String,
    pub committed_at: Option<DateTime<Utc>>,
    pub subject: String,
}
