use crate::status::{AgentRuntime, TownStatus};
use serde::{Deserialize, Serialize};
use std::fmt;

const COORDINATOR_NAME: &str = "mayor";
const WATCHDOG_NAME: &str = "deacon";

/// Operator-controlled mode switches. Resolved once by the caller and passed
/// in so the derivation below stays pure.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthFlags {
    pub degraded_mode: bool,
    pub patrol_muted: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthLevel {
    Healthy,
    Degraded,
    Down,
    #[default]
    Unknown,
}

impl HealthLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            HealthLevel::Healthy => "healthy",
            HealthLevel::Degraded => "degraded",
            HealthLevel::Down => "down",
            HealthLevel::Unknown => "unknown",
        }
    }
}

impl fmt::Display for HealthLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperationalState {
    pub level: HealthLevel,
    pub degraded: bool,
    pub patrol_muted: bool,
    pub coordinator_running: bool,
    pub watchdog_running: bool,
    pub agents_total: usize,
    pub agents_running: usize,
    pub notes: Vec<String>,
}

pub fn derive_operational_state(
    status: Option<&TownStatus>,
    flags: HealthFlags,
) -> OperationalState {
    let mut state = OperationalState {
        degraded: flags.degraded_mode,
        patrol_muted: flags.patrol_muted,
        ..OperationalState::default()
    };
    let Some(status) = status else {
        state.notes.push("town status unavailable".to_string());
        return state;
    };

    for agent in status.all_agents() {
        state.agents_total += 1;
        if agent.running {
            state.agents_running += 1;
        }
        if is_named(agent, COORDINATOR_NAME) && agent.running {
            state.coordinator_running = true;
        }
        if is_named(agent, WATCHDOG_NAME) && agent.running {
            state.watchdog_running = true;
        }
    }

    if flags.degraded_mode {
        state.notes.push("degraded mode enabled".to_string());
    }
    if flags.patrol_muted {
        state.notes.push("patrol muted".to_string());
    }
    if !state.coordinator_running {
        state.notes.push(format!("{COORDINATOR_NAME} not running"));
    }
    if !state.watchdog_running {
        state.notes.push(format!("{WATCHDOG_NAME} not running"));
    }

    state.level = if state.agents_running == 0 {
        HealthLevel::Down
    } else if flags.degraded_mode || !state.coordinator_running || !state.watchdog_running {
        HealthLevel::Degraded
    } else {
        HealthLevel::Healthy
    };
    state
}

fn is_named(agent: &AgentRuntime, name: &str) -> bool {
    agent.name == name || agent.role.as_deref() == Some(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::status::RigStatus;

    fn agent(name: &str, running: bool) -> AgentRuntime {
        AgentRuntime {
            name: name.to_string(),
            address: format!("{name}/"),
            running,
            ..AgentRuntime::default()
        }
    }

    #[test]
    fn healthy_when_coordinator_and_watchdog_run() {
        let status = TownStatus {
            agents: vec![agent("mayor", true), agent("deacon", true)],
            rigs: vec![RigStatus {
                name: "gastown".to_string(),
                agents: vec![agent("witness", false)],
                ..RigStatus::default()
            }],
            ..TownStatus::default()
        };
        let state = derive_operational_state(Some(&status), HealthFlags::default());
        assert_eq!(state.level, HealthLevel::Healthy);
        assert_eq!(state.agents_total, 3);
        assert_eq!(state.agents_running, 2);
        assert!(state.notes.is_empty());
    }

    #[test]
    fn flags_fold_into_level() {
        let status = TownStatus {
            agents: vec![agent("mayor", true), agent("deacon", true)],
            ..TownStatus::default()
        };
        let flags = HealthFlags {
            degraded_mode: true,
            patrol_muted: true,
        };
        let state = derive_operational_state(Some(&status), flags);
        assert_eq!(state.level, HealthLevel::Degraded);
        assert!(state.degraded);
        assert!(state.patrol_muted);
    }

    #[test]
    fn missing_status_is_unknown_and_nothing_running_is_down() {
        let state = derive_operational_state(None, HealthFlags::default());
        assert_eq!(state.level, HealthLevel::Unknown);

        let status = TownStatus {
            agents: vec![agent("mayor", false)],
            ..TownStatus::default()
        };
        let state = derive_operational_state(Some(&status), HealthFlags::default());
        assert_eq!(state.level, HealthLevel::Down);
    }
}
