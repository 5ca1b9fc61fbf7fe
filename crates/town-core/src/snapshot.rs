use crate::activity::{CommitInfo, CrewWorktree, DoctorReport, PluginInfo, TownEvent};
use crate::beads::{BeadRoute, Issue};
use crate::health::OperationalState;
use crate::status::{
    Convoy, ConvoyDetail, MailMessage, MergeRequest, Overseer, Polecat, TownStatus,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Every independently loaded input of a snapshot. Per-rig sources carry
/// the rig name so their failures stay distinguishable.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Source {
    Status,
    Polecats,
    Convoys,
    ClosedConvoys,
    ConvoyDetails,
    Issues,
    ActiveIssues,
    Mail,
    Events,
    Doctor,
    Routes,
    Plugins,
    GitLog,
    MergeQueue(String),
    Worktrees(String),
}

impl Source {
    pub fn key(&self) -> String {
        match self {
            Source::Status => "status".to_string(),
            Source::Polecats => "polecats".to_string(),
            Source::Convoys => "convoys".to_string(),
            Source::ClosedConvoys => "closed_convoys".to_string(),
            Source::ConvoyDetails => "convoy_details".to_string(),
            Source::Issues => "issues".to_string(),
            Source::ActiveIssues => "active_issues".to_string(),
            Source::Mail => "mail".to_string(),
            Source::Events => "events".to_string(),
            Source::Doctor => "doctor".to_string(),
            Source::Routes => "routes".to_string(),
            Source::Plugins => "plugins".to_string(),
            Source::GitLog => "git_log".to_string(),
            Source::MergeQueue(rig) => format!("merge_queue:{rig}"),
            Source::Worktrees(rig) => format!("worktrees:{rig}"),
        }
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.key())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoadError {
    pub source: String,
    pub command: String,
    pub error: String,
    pub at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Identity {
    pub operator: Option<Overseer>,
    pub recent_issues: Vec<Issue>,
    pub recent_commits: Vec<CommitInfo>,
}

impl Identity {
    /// Keeps the `limit` most recently updated issues, newest first. Ties keep
    /// their original relative order.
    pub fn recent_issues(issues: &[Issue], limit: usize) -> Vec<Issue> {
        let mut sorted = issues.to_vec();
        sorted.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        sorted.truncate(limit);
        sorted
    }
}

/// The union of every source that loaded during one refresh cycle.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub status: Option<TownStatus>,
    pub polecats: Vec<Polecat>,
    pub convoys: Vec<Convoy>,
    pub closed_convoys: Vec<Convoy>,
    pub convoy_details: BTreeMap<String, ConvoyDetail>,
    pub merge_queues: BTreeMap<String, Vec<MergeRequest>>,
    pub issues: Vec<Issue>,
    pub active_issues: Vec<Issue>,
    pub active_issues_loaded: bool,
    pub mail: Vec<MailMessage>,
    pub plugins: Vec<PluginInfo>,
    pub identity: Identity,
    pub events: Vec<TownEvent>,
    pub operational: OperationalState,
    pub doctor: Option<DoctorReport>,
    pub routes: Vec<BeadRoute>,
    pub worktrees: Vec<CrewWorktree>,
    pub loaded_at: DateTime<Utc>,
    pub errors: Vec<String>,
    pub load_errors: Vec<LoadError>,
    pub source_loaded_at: BTreeMap<String, DateTime<Utc>>,
}

impl Snapshot {
    pub fn new(loaded_at: DateTime<Utc>) -> Self {
        Self {
            loaded_at,
            ..Self::default()
        }
    }

    pub fn record_success(&mut self, source: &Source, at: DateTime<Utc>) {
        self.source_loaded_at.insert(source.key(), at);
    }

    pub fn record_failure(
        &mut self,
        source: &Source,
        command: impl Into<String>,
        error: impl Into<String>,
        at: DateTime<Utc>,
    ) {
        let error = error.into();
        self.errors.push(format!("{source}: {error}"));
        self.load_errors.push(LoadError {
            source: source.key(),
            command: command.into(),
            error,
            at,
        });
    }

    /// A source is stale when it did not load successfully this cycle.
    pub fn is_stale(&self, source: &Source) -> bool {
        !self.source_loaded_at.contains_key(&source.key())
    }

    pub fn has_errors(&self) -> bool {
        !self.load_errors.is_empty()
    }

    pub fn issue(&self, id: &str) -> Option<&Issue> {
        self.issues
            .iter()
            .chain(self.active_issues.iter())
            .find(|issue| issue.id == id)
    }

    pub fn polecat(&self, rig: &str, name: &str) -> Option<&Polecat> {
        self.polecats
            .iter()
            .find(|polecat| polecat.rig == rig && polecat.name == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn ts(minute: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 1, 2, 7, minute, 0)
            .single()
            .expect("valid timestamp")
    }

    fn issue(id: &str, updated: Option<DateTime<Utc>>) -> Issue {
        Issue {
            id: id.to_string(),
            updated_at: updated,
            ..Issue::default()
        }
    }

    #[test]
    fn recent_issues_sort_descending_and_keep_tie_order() {
        let issues = vec![
            issue("gt-1", Some(ts(1))),
            issue("gt-2", Some(ts(5))),
            issue("gt-3", None),
            issue("gt-4", Some(ts(5))),
            issue("gt-5", Some(ts(3))),
            issue("gt-6", Some(ts(2))),
            issue("gt-7", Some(ts(4))),
        ];
        let recent = Identity::recent_issues(&issues, 5);
        let ids: Vec<_> = recent.iter().map(|issue| issue.id.as_str()).collect();
        assert_eq!(ids, vec!["gt-2", "gt-4", "gt-7", "gt-5", "gt-6"]);
    }

    #[test]
    fn failures_feed_both_error_lists_and_leave_source_stale() {
        let mut snapshot = Snapshot::new(ts(0));
        snapshot.record_success(&Source::Mail, ts(1));
        snapshot.record_failure(
            &Source::MergeQueue("gastown".to_string()),
            "gt mq list gastown --json",
            "exit status 1: no such rig",
            ts(1),
        );
        assert!(!snapshot.is_stale(&Source::Mail));
        assert!(snapshot.is_stale(&Source::MergeQueue("gastown".to_string())));
        assert_eq!(
            snapshot.errors,
            vec!["merge_queue:gastown: exit status 1: no such rig".to_string()]
        );
        assert_eq!(snapshot.load_errors[0].source, "merge_queue:gastown");
        assert!(snapshot.has_errors());
    }
}
