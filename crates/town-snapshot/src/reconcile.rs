//! Overlays the issue tracker's view of claimed work onto the status model.
//!
//! The tracker is authoritative for who holds which issue; the status source
//! can lag behind. Enrichment is best-effort and never fails.

use std::collections::{HashMap, HashSet};
use town_core::{address_candidates, canonical_address, rig_of, AgentRuntime, Issue, Snapshot};
use tracing::debug;

/// Canonical assignee address -> first issue claimed under it.
fn assignee_index<'a>(
    active: impl IntoIterator<Item = &'a Issue>,
) -> HashMap<String, &'a Issue> {
    let mut index = HashMap::new();
    for issue in active {
        let Some(assignee) = issue.assignee.as_deref() else {
            continue;
        };
        let key = canonical_address(assignee);
        if !key.is_empty() {
            index.entry(key).or_insert(issue);
        }
    }
    index
}

fn lookup<'a>(index: &HashMap<String, &'a Issue>, address: &str) -> Option<&'a Issue> {
    address_candidates(address)
        .iter()
        .find_map(|candidate| index.get(candidate).copied())
}

fn enrich_agent(agent: &mut AgentRuntime, index: &HashMap<String, &Issue>) {
    let Some(issue) = lookup(index, &agent.address) else {
        return;
    };
    agent.has_work = true;
    agent.work_title = Some(issue.title.clone());
    agent.hooked_bead_id = Some(issue.id.clone());
    agent.hooked_status = Some(issue.status.clone());
    agent.hooked_at = issue.updated_at;
}

/// Applies tracker truth to `snapshot.status` in place. Does nothing when the
/// status or the active-issue source did not load this cycle, so counts from
/// the status source survive a tracker outage. Running it twice yields the
/// same result as running it once.
pub fn reconcile(snapshot: &mut Snapshot) {
    if !snapshot.active_issues_loaded {
        debug!("active issues unavailable; keeping status-reported work counts");
        return;
    }
    let Some(status) = snapshot.status.as_mut() else {
        return;
    };
    let active = &snapshot.active_issues;
    let index = assignee_index(active);
    // ephemeral and message claims enrich hooks but never count as held work
    let work_index = assignee_index(active.iter().filter(|issue| issue.counts_as_work()));

    status.summary.active_hooks = active.iter().filter(|issue| issue.counts_as_work()).count();

    for agent in status.agents.iter_mut() {
        enrich_agent(agent, &index);
    }

    for rig in status.rigs.iter_mut() {
        for agent in rig.agents.iter_mut() {
            enrich_agent(agent, &index);
        }

        let mut attributed = HashSet::new();
        let mut held = 0;
        for hook in rig.hooks.iter_mut() {
            if let Some(issue) = lookup(&index, &hook.agent) {
                hook.has_work = true;
                hook.title = Some(issue.title.clone());
            }
            if lookup(&work_index, &hook.agent).is_some() {
                held += 1;
            }
            attributed.extend(address_candidates(&hook.agent));
        }

        let unattributed = active
            .iter()
            .filter(|issue| issue.counts_as_work())
            .filter_map(|issue| issue.assignee.as_deref())
            .map(canonical_address)
            .filter(|assignee| assignee.contains('/') && rig_of(assignee) == rig.name)
            .filter(|assignee| !attributed.contains(assignee))
            .count();
        rig.active_hooks = held + unattributed;
    }
}
