#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use town_snapshot::{LoaderConfig, SnapshotLoader};
use town_sources::{command_line, CommandOutput, CommandRunner, ExecError, SourceReader};

pub const STATUS: &str = "gt status --json";
pub const POLECATS: &str = "gt polecat list --all --json";
pub const CONVOYS: &str = "gt convoy list --json";
pub const CLOSED_CONVOYS: &str = "gt convoy list --status=closed --json";
pub const ISSUES: &str = "bd list --json --limit 0";
pub const ACTIVE_ISSUES: &str = "bd list --json --status=hooked,in_progress --limit 0";
pub const MAIL: &str = "gt mail inbox --json";
pub const DOCTOR: &str = "gt doctor";
pub const GIT_LOG: &str = "git log -5 --format=%h%x09%an%x09%aI%x09%s";

pub const STATUS_JSON: &str = r#"{
  "name": "gt",
  "overseer": {"name": "Dev", "email": "dev@example.com"},
  "agents": [
    {"name": "mayor", "address": "mayor/", "role": "coordinator", "running": true},
    {"name": "deacon", "address": "deacon/", "role": "health-check", "running": true}
  ],
  "rigs": [{
    "name": "gastown",
    "agents": [{"name": "rictus", "address": "gastown/polecats/rictus", "role": "polecat", "running": true}],
    "hooks": [{"agent": "gastown/rictus", "role": "polecat"}, {"agent": "gastown/nux", "role": "polecat"}],
    "active_hooks": 0
  }],
  "summary": {"rig_count": 1, "polecat_count": 2, "active_hooks": 4}
}"#;

pub const ISSUES_JSON: &str = r#"[
  {"id": "gt-1", "title": "Fix login", "status": "hooked", "issue_type": "task", "assignee": "gastown/polecats/rictus", "updated_at": "2026-01-02T10:00:00Z"},
  {"id": "gt-2", "title": "Docs", "status": "open", "issue_type": "task", "updated_at": "2026-01-03T10:00:00Z"},
  {"id": "gt-3", "title": "Blocked", "status": "open", "issue_type": "bug", "dependency_count": 1, "updated_at": "2026-01-01T10:00:00Z"}
]"#;

pub const ACTIVE_JSON: &str = r#"[
  {"id": "gt-1", "title": "Fix login", "status": "hooked", "issue_type": "task", "assignee": "gastown/polecats/rictus", "updated_at": "2026-01-02T10:00:00Z"}
]"#;

pub const CONVOYS_JSON: &str = r#"[
  {"id": "hq-cv-1", "title": "Login", "status": "open", "tracked": [{"id": "gt-1", "status": "hooked"}]}
]"#;

enum Reply {
    Ok(String),
    Fail(String),
}

/// Canned command results with call accounting. Unscripted commands fail to
/// spawn; every call optionally sleeps for `delay` first.
#[derive(Default)]
pub struct FakeRunner {
    replies: Mutex<HashMap<String, Reply>>,
    delay: Duration,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    calls: Mutex<Vec<String>>,
    spans: Mutex<Vec<Span>>,
}

/// When one scripted command started and finished, in (possibly paused)
/// tokio time.
#[derive(Debug, Clone)]
pub struct Span {
    pub command: String,
    pub started: Instant,
    pub finished: Instant,
}

impl Span {
    pub fn overlaps(&self, other: &Span) -> bool {
        self.started < other.finished && other.started < self.finished
    }
}

impl FakeRunner {
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn ok(self, command: &str, stdout: &str) -> Self {
        self.replies
            .lock()
            .expect("lock")
            .insert(command.to_string(), Reply::Ok(stdout.to_string()));
        self
    }

    pub fn fail(self, command: &str, stderr: &str) -> Self {
        self.replies
            .lock()
            .expect("lock")
            .insert(command.to_string(), Reply::Fail(stderr.to_string()));
        self
    }

    /// Every source the loader queries for a one-rig town, all succeeding.
    pub fn healthy_town() -> Self {
        Self::default()
            .ok(STATUS, STATUS_JSON)
            .ok(POLECATS, r#"[{"rig": "gastown", "name": "rictus", "state": "working", "session_running": true}]"#)
            .ok(CONVOYS, CONVOYS_JSON)
            .ok(CLOSED_CONVOYS, "[]")
            .ok(
                "gt convoy status hq-cv-1 --json",
                r#"{"id": "hq-cv-1", "title": "Login", "status": "open", "completed": 0, "total": 1}"#,
            )
            .ok(ISSUES, ISSUES_JSON)
            .ok(ACTIVE_ISSUES, ACTIVE_JSON)
            .ok(MAIL, r#"[{"id": "m-1", "from": "mayor/", "subject": "hello", "type": "notification"}]"#)
            .ok(DOCTOR, "✓ town-root: ok\n⚠ stale-hooks: 1 stale\n")
            .ok("gt mq list gastown --json", r#"[{"id": "mr-1", "branch": "polecat/rictus", "status": "ready", "polecat": "rictus"}]"#)
            .ok(GIT_LOG, "abc1234\tDev\t2026-01-02T10:00:00+00:00\tInitial commit\n")
    }

    /// Replaces the scripted reply for `command` between refreshes.
    pub fn reply_ok(&self, command: &str, stdout: &str) {
        self.replies
            .lock()
            .expect("lock")
            .insert(command.to_string(), Reply::Ok(stdout.to_string()));
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().expect("lock").clone()
    }

    pub fn spans(&self) -> Vec<Span> {
        self.spans.lock().expect("lock").clone()
    }

    pub fn spans_of(&self, prefix: &str) -> Vec<Span> {
        self.spans()
            .into_iter()
            .filter(|span| span.command.starts_with(prefix))
            .collect()
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    pub fn count(&self, command: &str) -> usize {
        self.calls().iter().filter(|call| *call == command).count()
    }
}

#[async_trait]
impl CommandRunner for FakeRunner {
    async fn run(
        &self,
        program: &str,
        args: &[String],
        _cwd: &Path,
        cancel: &CancellationToken,
    ) -> Result<CommandOutput, ExecError> {
        let line = command_line(program, args);
        self.calls.lock().expect("lock").push(line.clone());
        if cancel.is_cancelled() {
            return Err(ExecError::Cancelled {
                program: program.to_string(),
            });
        }

        let started = Instant::now();
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        let cancelled = if self.delay.is_zero() {
            false
        } else {
            tokio::select! {
                _ = cancel.cancelled() => true,
                _ = tokio::time::sleep(self.delay) => false,
            }
        };
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        self.spans.lock().expect("lock").push(Span {
            command: line.clone(),
            started,
            finished: Instant::now(),
        });
        if cancelled {
            return Err(ExecError::Cancelled {
                program: program.to_string(),
            });
        }

        match self.replies.lock().expect("lock").get(&line) {
            Some(Reply::Ok(stdout)) => Ok(CommandOutput {
                stdout: stdout.clone(),
                stderr: String::new(),
            }),
            Some(Reply::Fail(stderr)) => Err(ExecError::Failed {
                program: program.to_string(),
                status: "exit status: 1".to_string(),
                stdout: String::new(),
                stderr: stderr.clone(),
            }),
            None => Err(ExecError::Spawn {
                program: program.to_string(),
                message: format!("unscripted command: {line}"),
            }),
        }
    }
}

pub fn loader(runner: FakeRunner, root: &Path) -> (SnapshotLoader, Arc<FakeRunner>) {
    let runner = Arc::new(runner);
    let reader = SourceReader::new(runner.clone(), root);
    (SnapshotLoader::new(reader, LoaderConfig::new(root)), runner)
}
