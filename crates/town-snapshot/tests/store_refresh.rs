mod common;

use common::*;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use town_core::Source;
use town_snapshot::{ActiveWork, Store};

#[tokio::test]
async fn accessors_are_empty_before_first_refresh() {
    let dir = tempfile::tempdir().expect("tempdir");
    let (loader, runner) = loader(FakeRunner::healthy_town(), dir.path());
    let store = Store::new(loader);

    assert!(store.snapshot().is_none());
    assert!(store.status().is_none());
    assert!(store.issues().is_empty());
    assert!(store.merge_queue("gastown").is_empty());
    assert!(store.last_refresh().is_none());
    assert!(store.is_stale(&Source::Status));
    assert!(runner.calls().is_empty());
}

#[tokio::test]
async fn refresh_publishes_snapshot_to_accessors_and_subscribers() {
    let dir = tempfile::tempdir().expect("tempdir");
    std::fs::create_dir_all(dir.path().join(".beads")).expect("beads dir");
    std::fs::write(
        dir.path().join(".beads/routes.jsonl"),
        "{\"prefix\": \"gt-\", \"path\": \"gastown/mayor/rig\"}\n",
    )
    .expect("routes");
    let (loader, _) = loader(FakeRunner::healthy_town(), dir.path());
    let store = Store::new(loader);
    let mut updates = store.subscribe();

    store.refresh(&CancellationToken::new()).await;

    updates.changed().await.expect("update");
    assert!(updates.borrow().is_some());
    assert!(store.last_refresh().is_some());
    assert_eq!(store.issue("gt-1").expect("issue").title, "Fix login");
    assert_eq!(store.polecat("gastown", "rictus").expect("polecat").state, "working");
    assert_eq!(store.issues_with_status("open").len(), 2);
    let ready: Vec<_> = store.ready_issues().into_iter().map(|issue| issue.id).collect();
    assert_eq!(ready, vec!["gt-2".to_string()]);
    assert_eq!(store.issues_for_rig("gastown").len(), 3);
    assert!(store.issues_for_rig("beads").is_empty());
    assert_eq!(store.merge_queue("gastown").len(), 1);
    assert_eq!(store.convoy("hq-cv-1").expect("convoy").total, 1);
    assert_eq!(
        store.active_work(),
        Some(ActiveWork {
            count: 1,
            stale: false
        })
    );
    assert!(store.errors().is_empty());
}

#[tokio::test]
async fn refresh_replaces_errors_from_previous_cycle() {
    let dir = tempfile::tempdir().expect("tempdir");
    let (loader, runner) = loader(FakeRunner::healthy_town().fail(MAIL, "boom"), dir.path());
    let store = Store::new(loader);

    let first = store.refresh(&CancellationToken::new()).await;
    assert_eq!(store.load_errors().len(), 1);
    assert!(store.is_stale(&Source::Mail));
    assert_eq!(store.active_work().map(|work| work.stale), Some(false));

    runner.reply_ok(MAIL, "[]");
    store.refresh(&CancellationToken::new()).await;
    assert!(store.load_errors().is_empty());
    assert!(!store.is_stale(&Source::Mail));
    // earlier readers keep the snapshot they were handed
    assert_eq!(first.load_errors.len(), 1);
}

#[tokio::test(start_paused = true)]
async fn periodic_refreshes_never_overlap() {
    let dir = tempfile::tempdir().expect("tempdir");
    // each command takes longer than the interval
    let (loader, runner) = loader(
        FakeRunner::healthy_town().with_delay(Duration::from_secs(3)),
        dir.path(),
    );
    let store = Arc::new(Store::new(loader));
    let cancel = CancellationToken::new();

    let task = {
        let store = Arc::clone(&store);
        let cancel = cancel.clone();
        tokio::spawn(async move { store.run_periodic(Duration::from_secs(1), &cancel).await })
    };

    tokio::time::sleep(Duration::from_secs(60)).await;
    cancel.cancel();
    task.await.expect("periodic task");

    let calls = runner.calls();
    let refreshes = runner.count(STATUS);
    assert!(refreshes >= 2, "only {refreshes} refreshes");
    // git log is the last command of a cycle; each new cycle must start
    // after the previous one issued it
    let mut finished = 0;
    let mut started = 0;
    for call in &calls {
        if call == STATUS {
            assert_eq!(started, finished, "cycle started before previous finished");
            started += 1;
        } else if call == GIT_LOG {
            finished += 1;
        }
    }
    // the widest wave has seven concurrent commands
    assert!(runner.max_in_flight() <= 7, "max in flight {}", runner.max_in_flight());
    assert!(store.last_refresh().is_some());
}

#[tokio::test(start_paused = true)]
async fn periodic_refresh_stops_on_cancel() {
    let dir = tempfile::tempdir().expect("tempdir");
    let (loader, runner) = loader(FakeRunner::healthy_town(), dir.path());
    let store = Store::new(loader);
    let cancel = CancellationToken::new();
    cancel.cancel();

    store.run_periodic(Duration::from_secs(5), &cancel).await;

    assert!(runner.calls().is_empty());
    assert!(store.snapshot().is_none());
}
