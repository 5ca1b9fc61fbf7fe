//! One refresh cycle: query every source, tolerate individual failures, and
//! assemble the results into a single [`Snapshot`].

use crate::reconcile::reconcile;
use chrono::Utc;
use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use town_core::{derive_operational_state, HealthFlags, Identity, Snapshot, Source, TownStatus};
use town_sources::{SourceError, SourceReader, SystemRunner, DEFAULT_EVENT_LIMIT};
use tracing::{debug, info, warn};

pub const DEFAULT_RECENT_LIMIT: usize = 5;

#[derive(Debug, Clone)]
pub struct LoaderConfig {
    pub town_root: PathBuf,
    pub event_limit: usize,
    pub recent_limit: usize,
    pub health: HealthFlags,
    /// Per-command limit; `None` lets commands run until cancelled.
    pub timeout: Option<Duration>,
}

impl LoaderConfig {
    pub fn new(town_root: impl Into<PathBuf>) -> Self {
        Self {
            town_root: town_root.into(),
            event_limit: DEFAULT_EVENT_LIMIT,
            recent_limit: DEFAULT_RECENT_LIMIT,
            health: HealthFlags::default(),
            timeout: None,
        }
    }
}

/// Shared write target for concurrently running source loads. Every load
/// records either its data or its failure while holding the lock, so no two
/// loads mutate the snapshot at once.
#[derive(Clone)]
struct SnapshotSink(Arc<Mutex<Snapshot>>);

impl SnapshotSink {
    fn new(snapshot: Snapshot) -> Self {
        Self(Arc::new(Mutex::new(snapshot)))
    }

    async fn record<T, A>(&self, source: Source, result: Result<T, SourceError>, apply: A)
    where
        A: FnOnce(&mut Snapshot, T),
    {
        let at = Utc::now();
        let mut snapshot = self.0.lock().await;
        match result {
            Ok(value) => {
                apply(&mut snapshot, value);
                snapshot.record_success(&source, at);
            }
            Err(err) => {
                warn!(source = %source, error = %err, "source load failed");
                snapshot.record_failure(&source, err.resource(), err.detail(), at);
            }
        }
    }

    async fn update<R>(&self, f: impl FnOnce(&mut Snapshot) -> R) -> R {
        let mut snapshot = self.0.lock().await;
        f(&mut snapshot)
    }

    async fn into_inner(self) -> Snapshot {
        match Arc::try_unwrap(self.0) {
            Ok(mutex) => mutex.into_inner(),
            Err(shared) => shared.lock().await.clone(),
        }
    }
}

#[derive(Clone)]
pub struct SnapshotLoader {
    reader: SourceReader,
    config: LoaderConfig,
}

impl SnapshotLoader {
    pub fn new(reader: SourceReader, config: LoaderConfig) -> Self {
        Self { reader, config }
    }

    /// Loader backed by real subprocesses, honoring the configured timeout.
    pub fn system(config: LoaderConfig) -> Self {
        let runner = match config.timeout {
            Some(limit) => SystemRunner::with_timeout(limit),
            None => SystemRunner::new(),
        };
        let reader = SourceReader::new(Arc::new(runner), config.town_root.clone());
        Self::new(reader, config)
    }

    fn spawn_load<T, F, Fut, A>(
        &self,
        wave: &mut JoinSet<()>,
        sink: &SnapshotSink,
        cancel: &CancellationToken,
        source: Source,
        load: F,
        apply: A,
    ) where
        T: Send + 'static,
        F: FnOnce(SourceReader, CancellationToken) -> Fut,
        Fut: Future<Output = Result<T, SourceError>> + Send + 'static,
        A: FnOnce(&mut Snapshot, T) + Send + 'static,
    {
        let sink = sink.clone();
        let pending = load(self.reader.clone(), cancel.clone());
        wave.spawn(async move {
            let result = pending.await;
            sink.record(source, result, apply).await;
        });
    }

    async fn join_wave(wave: &mut JoinSet<()>) {
        while let Some(joined) = wave.join_next().await {
            if let Err(err) = joined {
                warn!(error = %err, "source load task aborted");
            }
        }
    }

    /// Runs one refresh cycle. Never fails: every source error is recorded in
    /// the returned snapshot and the remaining sources still load.
    pub async fn load(&self, cancel: &CancellationToken) -> Snapshot {
        let started = Instant::now();
        let sink = SnapshotSink::new(Snapshot::new(Utc::now()));

        // Status first: the rig list gates the per-rig sources.
        let status = self.reader.town_status(cancel).await;
        sink.record(Source::Status, status, |snap, status| snap.status = status)
            .await;
        let rigs = sink
            .update(|snap| snap.status.as_ref().map(TownStatus::rig_names))
            .await;

        let mut wave = JoinSet::new();
        self.spawn_load(
            &mut wave,
            &sink,
            cancel,
            Source::Polecats,
            |reader, cancel| async move { reader.polecats(&cancel).await },
            |snap, polecats| snap.polecats = polecats,
        );
        self.spawn_load(
            &mut wave,
            &sink,
            cancel,
            Source::Convoys,
            |reader, cancel| async move { reader.convoys(&cancel).await },
            |snap, convoys| snap.convoys = convoys,
        );
        self.spawn_load(
            &mut wave,
            &sink,
            cancel,
            Source::ClosedConvoys,
            |reader, cancel| async move { reader.closed_convoys(&cancel).await },
            |snap, convoys| snap.closed_convoys = convoys,
        );
        self.spawn_load(
            &mut wave,
            &sink,
            cancel,
            Source::Issues,
            |reader, cancel| async move { reader.issues(&cancel).await },
            |snap, issues| snap.issues = issues,
        );
        self.spawn_load(
            &mut wave,
            &sink,
            cancel,
            Source::ActiveIssues,
            |reader, cancel| async move { reader.active_issues(&cancel).await },
            |snap, issues| {
                snap.active_issues = issues;
                snap.active_issues_loaded = true;
            },
        );
        self.spawn_load(
            &mut wave,
            &sink,
            cancel,
            Source::Mail,
            |reader, cancel| async move { reader.mail_inbox(&cancel).await },
            |snap, mail| snap.mail = mail,
        );
        let event_limit = self.config.event_limit;
        self.spawn_load(
            &mut wave,
            &sink,
            cancel,
            Source::Events,
            move |reader, _| async move { reader.events(event_limit).await },
            |snap, events| snap.events = events,
        );
        self.spawn_load(
            &mut wave,
            &sink,
            cancel,
            Source::Doctor,
            |reader, cancel| async move { reader.doctor(&cancel).await },
            |snap, report| snap.doctor = Some(report),
        );
        Self::join_wave(&mut wave).await;

        let health = self.config.health;
        let convoys = sink
            .update(|snap| {
                snap.operational = derive_operational_state(snap.status.as_ref(), health);
                snap.convoys.clone()
            })
            .await;

        if !convoys.is_empty() {
            let details = self.reader.convoy_details(&convoys, cancel).await;
            sink.record(Source::ConvoyDetails, Ok(details), |snap, details| {
                snap.convoy_details = details
            })
            .await;
        }

        let rigs = rigs.unwrap_or_default();
        let mut per_rig = JoinSet::new();
        for rig in &rigs {
            let queue_rig = rig.clone();
            let queue_key = rig.clone();
            self.spawn_load(
                &mut per_rig,
                &sink,
                cancel,
                Source::MergeQueue(rig.clone()),
                move |reader, cancel| async move { reader.merge_queue(&queue_rig, &cancel).await },
                move |snap, queue| {
                    snap.merge_queues.insert(queue_key, queue);
                },
            );
            let crew_rig = rig.clone();
            self.spawn_load(
                &mut per_rig,
                &sink,
                cancel,
                Source::Worktrees(rig.clone()),
                move |reader, cancel| async move { reader.crew_worktrees(&crew_rig, &cancel).await },
                |snap, worktrees| snap.worktrees.extend(worktrees),
            );
        }
        let plugin_rigs = rigs.clone();
        self.spawn_load(
            &mut per_rig,
            &sink,
            cancel,
            Source::Plugins,
            move |reader, _| async move { reader.plugins(&plugin_rigs).await },
            |snap, plugins| snap.plugins = plugins,
        );
        Self::join_wave(&mut per_rig).await;

        let routes = self.reader.routes().await;
        sink.record(Source::Routes, routes, |snap, routes| snap.routes = routes)
            .await;

        let recent_limit = self.config.recent_limit;
        sink.update(|snap| {
            snap.identity.operator = snap
                .status
                .as_ref()
                .and_then(|status| status.overseer.clone());
            snap.identity.recent_issues = Identity::recent_issues(&snap.issues, recent_limit);
            snap.worktrees
                .sort_by(|a, b| (&a.rig, &a.name).cmp(&(&b.rig, &b.name)));
        })
        .await;
        let commits = self.reader.recent_commits(recent_limit, cancel).await;
        sink.record(Source::GitLog, commits, |snap, commits| {
            snap.identity.recent_commits = commits
        })
        .await;

        let mut snapshot = sink.into_inner().await;
        reconcile(&mut snapshot);

        if snapshot.has_errors() {
            debug!(errors = ?snapshot.errors, "refresh completed with errors");
        }
        info!(
            rigs = rigs.len(),
            issues = snapshot.issues.len(),
            active = snapshot.active_issues.len(),
            errors = snapshot.load_errors.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "snapshot loaded"
        );
        snapshot
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_defaults_match_source_limits() {
        let config = LoaderConfig::new("/town");
        assert_eq!(config.event_limit, 100);
        assert_eq!(config.recent_limit, 5);
        assert!(config.timeout.is_none());
        assert_eq!(config.health, HealthFlags::default());
    }

    #[tokio::test]
    async fn sink_records_failure_without_applying() {
        let sink = SnapshotSink::new(Snapshot::default());
        let err = SourceError::Io {
            name: "events",
            path: PathBuf::from("/town/logs/town.log"),
            error: std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        };
        sink.record(Source::Events, Err::<Vec<town_core::TownEvent>, _>(err), |snap, events| {
            snap.events = events
        })
        .await;
        let snapshot = sink.into_inner().await;
        assert!(snapshot.is_stale(&Source::Events));
        assert_eq!(snapshot.load_errors.len(), 1);
        assert_eq!(snapshot.load_errors[0].command, "/town/logs/town.log");
        assert!(snapshot.errors[0].starts_with("events: cannot read /town/logs/town.log"));
    }
}
