use crate::{deserialize_lenient_time, deserialize_null_default};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// An issue ("bead") as reported by `bd list --json`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Issue {
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub priority: i64,
    #[serde(default, rename = "issue_type", alias = "type")]
    pub issue_type: String,
    #[serde(default)]
    pub assignee: Option<String>,
    #[serde(default, deserialize_with = "deserialize_lenient_time")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "deserialize_lenient_time")]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "deserialize_lenient_time")]
    pub closed_at: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "deserialize_null_default")]
    pub labels: Vec<String>,
    #[serde(default)]
    pub dependency_count: usize,
    #[serde(default)]
    pub dependent_count: usize,
    #[serde(default)]
    pub ephemeral: bool,
}

impl Issue {
    pub fn is_message(&self) -> bool {
        self.issue_type.eq_ignore_ascii_case("message")
    }

    /// Whether this issue counts toward active-work tallies.
    pub fn counts_as_work(&self) -> bool {
        !self.ephemeral && !self.is_message()
    }

    pub fn is_open(&self) -> bool {
        self.status == "open"
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssueDependency {
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub status: String,
    #[serde(default, rename = "dependency_type", alias = "type")]
    pub dependency_type: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IssueComment {
    #[serde(default)]
    pub author: String,
    #[serde(default)]
    pub text: String,
    #[serde(default, deserialize_with = "deserialize_lenient_time")]
    pub created_at: Option<DateTime<Utc>>,
}

/// Maps an issue-id prefix to the directory holding that prefix's tracker.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BeadRoute {
    #[serde(default)]
    pub prefix: String,
    #[serde(default)]
    pub path: String,
    #[serde(default)]
    pub rig: Option<String>,
}

impl BeadRoute {
    pub fn matches(&self, issue_id: &str) -> bool {
        !self.prefix.is_empty() && issue_id.starts_with(&self.prefix)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DependencyEdit {
    Add,
    Remove,
}

impl DependencyEdit {
    pub fn as_str(&self) -> &'static str {
        match self {
            DependencyEdit::Add => "add",
            DependencyEdit::Remove => "remove",
        }
    }
}

impl fmt::Display for DependencyEdit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
