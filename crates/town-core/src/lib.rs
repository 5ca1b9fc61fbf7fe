pub mod activity;
pub mod address;
pub mod beads;
pub mod health;
pub mod snapshot;
pub mod status;

pub use activity::{
    CheckStatus, CommitInfo, CrewWorktree, DoctorCheck, DoctorReport, DoctorSummary, PluginInfo,
    TownEvent,
};
pub use address::{address_candidates, canonical_address, polecat_address, rig_of};
pub use beads::{BeadRoute, DependencyEdit, Issue, IssueComment, IssueDependency};
pub use health::{derive_operational_state, HealthFlags, HealthLevel, OperationalState};
pub use snapshot::{Identity, LoadError, Snapshot, Source};
pub use status::{
    AgentRuntime, Convoy, ConvoyDetail, HookInfo, MailMessage, MergeRequest, Overseer, Polecat,
    RigStatus, StatusSummary, TownStatus, TrackedIssue,
};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer};

/// Timestamps from the external tools vary in precision and occasionally in
/// format; anything that is not RFC 3339 decodes to `None` instead of failing
/// the whole record.
pub(crate) fn deserialize_lenient_time<'de, D>(
    deserializer: D,
) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    let val: Option<serde_json::Value> = Option::deserialize(deserializer)?;
    Ok(match val {
        Some(serde_json::Value::String(s)) => parse_time(&s),
        _ => None,
    })
}

/// Treats an explicit JSON `null` the same as a missing field.
pub(crate) fn deserialize_null_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

pub fn parse_time(raw: &str) -> Option<DateTime<Utc>> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    DateTime::parse_from_rfc3339(trimmed)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}
