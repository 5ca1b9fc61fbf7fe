use crate::{deserialize_lenient_time, deserialize_null_default};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Point-in-time view of the town as reported by `gt status --json`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TownStatus {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub location: String,
    #[serde(default)]
    pub overseer: Option<Overseer>,
    #[serde(default, deserialize_with = "deserialize_null_default")]
    pub agents: Vec<AgentRuntime>,
    #[serde(default, deserialize_with = "deserialize_null_default")]
    pub rigs: Vec<RigStatus>,
    #[serde(default)]
    pub summary: StatusSummary,
}

impl TownStatus {
    pub fn rig(&self, name: &str) -> Option<&RigStatus> {
        self.rigs.iter().find(|rig| rig.name == name)
    }

    pub fn rig_names(&self) -> Vec<String> {
        self.rigs.iter().map(|rig| rig.name.clone()).collect()
    }

    /// Town-level agents followed by every rig's agents.
    pub fn all_agents(&self) -> impl Iterator<Item = &AgentRuntime> {
        self.agents
            .iter()
            .chain(self.rigs.iter().flat_map(|rig| rig.agents.iter()))
    }
}

/// The human operating the town.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Overseer {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub source: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AgentRuntime {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub session: Option<String>,
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub running: bool,
    #[serde(default)]
    pub has_work: bool,
    #[serde(default, alias = "first_subject")]
    pub work_title: Option<String>,
    #[serde(default)]
    pub hooked_bead_id: Option<String>,
    #[serde(default)]
    pub hooked_status: Option<String>,
    #[serde(default, deserialize_with = "deserialize_lenient_time")]
    pub hooked_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RigStatus {
    pub name: String,
    #[serde(default, deserialize_with = "deserialize_null_default")]
    pub polecats: Vec<String>,
    #[serde(default)]
    pub polecat_count: usize,
    #[serde(default, deserialize_with = "deserialize_null_default")]
    pub crews: Vec<String>,
    #[serde(default)]
    pub crew_count: usize,
    #[serde(default)]
    pub has_witness: bool,
    #[serde(default)]
    pub has_refinery: bool,
    #[serde(default, deserialize_with = "deserialize_null_default")]
    pub agents: Vec<AgentRuntime>,
    #[serde(default, deserialize_with = "deserialize_null_default")]
    pub hooks: Vec<HookInfo>,
    #[serde(default)]
    pub active_hooks: usize,
}

/// A declared claim slot; exists whether or not an agent is running for it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HookInfo {
    #[serde(default)]
    pub agent: String,
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub has_work: bool,
    #[serde(default)]
    pub molecule: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusSummary {
    #[serde(default)]
    pub rig_count: usize,
    #[serde(default)]
    pub polecat_count: usize,
    #[serde(default)]
    pub crew_count: usize,
    #[serde(default)]
    pub witness_count: usize,
    #[serde(default)]
    pub refinery_count: usize,
    #[serde(default)]
    pub active_hooks: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Polecat {
    #[serde(default)]
    pub rig: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub state: String,
    #[serde(default)]
    pub issue: Option<String>,
    #[serde(default)]
    pub session_running: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Convoy {
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub status: String,
    #[serde(default, deserialize_with = "deserialize_lenient_time")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "deserialize_null_default")]
    pub tracked: Vec<TrackedIssue>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConvoyDetail {
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub status: String,
    #[serde(default, deserialize_with = "deserialize_null_default")]
    pub tracked: Vec<TrackedIssue>,
    #[serde(default)]
    pub completed: usize,
    #[serde(default)]
    pub total: usize,
}

impl From<&Convoy> for ConvoyDetail {
    /// Degraded detail built from the list entry when `convoy status` fails.
    fn from(convoy: &Convoy) -> Self {
        let completed = convoy
            .tracked
            .iter()
            .filter(|issue| issue.status == "closed")
            .count();
        Self {
            id: convoy.id.clone(),
            title: convoy.title.clone(),
            status: convoy.status.clone(),
            tracked: convoy.tracked.clone(),
            completed,
            total: convoy.tracked.len(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackedIssue {
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub assignee: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MailMessage {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub from: String,
    #[serde(default)]
    pub to: String,
    #[serde(default)]
    pub subject: String,
    #[serde(default)]
    pub body: String,
    #[serde(default, deserialize_with = "deserialize_lenient_time")]
    pub timestamp: Option<DateTime<Utc>>,
    #[serde(default)]
    pub read: bool,
    #[serde(default)]
    pub priority: Option<String>,
    #[serde(default, rename = "type")]
    pub message_type: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MergeRequest {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub branch: String,
    #[serde(default)]
    pub status: String,
    #[serde(default, alias = "polecat")]
    pub worker: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub priority: i64,
    #[serde(default, deserialize_with = "deserialize_lenient_time")]
    pub created_at: Option<DateTime<Utc>>,
}
