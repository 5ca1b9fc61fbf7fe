//! Holds the most recent snapshot and refreshes it on a timer.
//!
//! Readers always see a whole snapshot: a refresh builds the next one off to
//! the side and swaps it in under a short write lock.

use crate::loader::SnapshotLoader;
use chrono::{DateTime, Utc};
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use town_core::{
    rig_of, ConvoyDetail, Issue, LoadError, MergeRequest, Polecat, Snapshot, Source, TownStatus,
};
use tracing::{debug, info};

/// Town-wide active work together with whether the figure reflects this
/// cycle's tracker data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActiveWork {
    pub count: usize,
    pub stale: bool,
}

pub struct Store {
    loader: SnapshotLoader,
    current: RwLock<Option<Arc<Snapshot>>>,
    updates: watch::Sender<Option<Arc<Snapshot>>>,
}

impl Store {
    pub fn new(loader: SnapshotLoader) -> Self {
        let (updates, _) = watch::channel(None);
        Self {
            loader,
            current: RwLock::new(None),
            updates,
        }
    }

    /// Loads a fresh snapshot and replaces the current one.
    pub async fn refresh(&self, cancel: &CancellationToken) -> Arc<Snapshot> {
        let snapshot = Arc::new(self.loader.load(cancel).await);
        {
            let mut current = self.current.write().unwrap_or_else(PoisonError::into_inner);
            *current = Some(Arc::clone(&snapshot));
        }
        self.updates.send_replace(Some(Arc::clone(&snapshot)));
        snapshot
    }

    /// Refreshes immediately, then once per `interval` until `cancel` fires.
    /// A tick that arrives while a refresh is still running waits for it, so
    /// refreshes never overlap. A zero interval refreshes once and returns.
    pub async fn run_periodic(&self, interval: Duration, cancel: &CancellationToken) {
        if interval.is_zero() {
            self.refresh(cancel).await;
            return;
        }
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        info!(interval_secs = interval.as_secs_f64(), "periodic refresh started");
        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {}
            }
            self.refresh(cancel).await;
        }
        debug!("periodic refresh stopped");
    }

    /// Notified with every snapshot swapped in after subscribing.
    pub fn subscribe(&self) -> watch::Receiver<Option<Arc<Snapshot>>> {
        self.updates.subscribe()
    }

    pub fn snapshot(&self) -> Option<Arc<Snapshot>> {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn with_snapshot<R: Default>(&self, f: impl FnOnce(&Snapshot) -> R) -> R {
        self.snapshot().map(|snap| f(snap.as_ref())).unwrap_or_default()
    }

    pub fn status(&self) -> Option<TownStatus> {
        self.with_snapshot(|snap| snap.status.clone())
    }

    pub fn polecats(&self) -> Vec<Polecat> {
        self.with_snapshot(|snap| snap.polecats.clone())
    }

    pub fn polecat(&self, rig: &str, name: &str) -> Option<Polecat> {
        self.with_snapshot(|snap| snap.polecat(rig, name).cloned())
    }

    pub fn issues(&self) -> Vec<Issue> {
        self.with_snapshot(|snap| snap.issues.clone())
    }

    pub fn issue(&self, id: &str) -> Option<Issue> {
        self.with_snapshot(|snap| snap.issue(id).cloned())
    }

    pub fn issues_with_status(&self, status: &str) -> Vec<Issue> {
        self.with_snapshot(|snap| {
            snap.issues
                .iter()
                .filter(|issue| issue.status == status)
                .cloned()
                .collect()
        })
    }

    /// Open work items with no unresolved dependencies.
    pub fn ready_issues(&self) -> Vec<Issue> {
        self.with_snapshot(|snap| {
            snap.issues
                .iter()
                .filter(|issue| issue.is_open() && issue.dependency_count == 0)
                .filter(|issue| issue.counts_as_work())
                .cloned()
                .collect()
        })
    }

    /// Issues whose id prefix routes to `rig`.
    pub fn issues_for_rig(&self, rig: &str) -> Vec<Issue> {
        self.with_snapshot(|snap| {
            let routes: Vec<_> = snap
                .routes
                .iter()
                .filter(|route| route.rig.as_deref() == Some(rig) || rig_of(&route.path) == rig)
                .collect();
            snap.issues
                .iter()
                .filter(|issue| routes.iter().any(|route| route.matches(&issue.id)))
                .cloned()
                .collect()
        })
    }

    pub fn convoy(&self, id: &str) -> Option<ConvoyDetail> {
        self.with_snapshot(|snap| snap.convoy_details.get(id).cloned())
    }

    pub fn merge_queue(&self, rig: &str) -> Vec<MergeRequest> {
        self.with_snapshot(|snap| snap.merge_queues.get(rig).cloned().unwrap_or_default())
    }

    pub fn active_work(&self) -> Option<ActiveWork> {
        self.with_snapshot(|snap| {
            snap.status.as_ref().map(|status| ActiveWork {
                count: status.summary.active_hooks,
                stale: !snap.active_issues_loaded,
            })
        })
    }

    pub fn last_refresh(&self) -> Option<DateTime<Utc>> {
        self.with_snapshot(|snap| Some(snap.loaded_at))
    }

    pub fn errors(&self) -> Vec<String> {
        self.with_snapshot(|snap| snap.errors.clone())
    }

    pub fn load_errors(&self) -> Vec<LoadError> {
        self.with_snapshot(|snap| snap.load_errors.clone())
    }

    /// True when `source` failed in the latest cycle, or nothing has loaded.
    pub fn is_stale(&self, source: &Source) -> bool {
        self.snapshot().map_or(true, |snap| snap.is_stale(source))
    }
}
