// Crash-safety: every change is on disk before dispatch returns, so a timer
// rebuilt over the same database file resumes where the last one stopped.

use speedsplits::clock::ManualClock;
use speedsplits::error_log;
use speedsplits::runs;
use speedsplits::split::Run;
use speedsplits::storage::{SqliteStore, Store, StoreExt, StorageKey};
use speedsplits::{Action, SplitTimer, TimerError, TimerStatus};
use tempfile::tempdir;

#[test]
fn timer_resumes_from_database_after_restart() {
    let dir = tempdir().unwrap();
    let db = dir.path().join("speedsplits.db");

    {
        let mut store = SqliteStore::open(&db).unwrap();
        runs::add_run(&mut store, Run::new("any%", &["A", "B", "C"])).unwrap();

        let clock = ManualClock::new(0);
        let mut timer = SplitTimer::initialize(store, clock.clone()).unwrap();
        timer.dispatch(Action::Start).unwrap();
        clock.set(1_000);
        timer.dispatch(Action::Split).unwrap();
        clock.set(1_500);
        timer.dispatch(Action::PauseResume).unwrap();
        // dropped here without any shutdown step
    }

    let store = SqliteStore::open(&db).unwrap();
    let clock = ManualClock::new(90_000);
    let timer = SplitTimer::initialize(store, clock).unwrap();
    let state = timer.state();

    assert_eq!(state.status, TimerStatus::Paused);
    assert_eq!(state.current_split, 1);
    assert_eq!(state.recorded_time_ms, 1_500);
    assert_eq!(state.current_time_ms, 1_500);
    assert_eq!(state.splits[0].time_ms, Some(1_000));
    // paused time does not move while the process was gone
    assert_eq!(timer.live_time_ms(), 1_500);
}

#[test]
fn running_timer_counts_time_while_closed() {
    let dir = tempdir().unwrap();
    let db = dir.path().join("speedsplits.db");

    {
        let mut store = SqliteStore::open(&db).unwrap();
        runs::add_run(&mut store, Run::new("any%", &["A"])).unwrap();
        let mut timer = SplitTimer::initialize(store, ManualClock::new(10_000)).unwrap();
        timer.dispatch(Action::Start).unwrap();
    }

    let store = SqliteStore::open(&db).unwrap();
    let timer = SplitTimer::initialize(store, ManualClock::new(13_000)).unwrap();
    assert_eq!(timer.state().status, TimerStatus::Running);
    assert_eq!(timer.live_time_ms(), 3_000);
}

#[test]
fn reset_keeps_durable_keys_on_disk() {
    let dir = tempdir().unwrap();
    let db = dir.path().join("speedsplits.db");

    {
        let mut store = SqliteStore::open(&db).unwrap();
        runs::add_run(&mut store, Run::new("any%", &["A", "B"])).unwrap();
        let clock = ManualClock::new(0);
        let mut timer = SplitTimer::initialize(store, clock.clone()).unwrap();
        timer.dispatch(Action::Start).unwrap();
        clock.set(700);
        timer.dispatch(Action::Split).unwrap();
        let _ = timer.dispatch_named("jump", None);
        timer.dispatch(Action::Reset).unwrap();
    }

    let store = SqliteStore::open(&db).unwrap();
    for key in StorageKey::session_keys() {
        assert!(store.get_raw(key).is_none(), "{key:?} survived reset");
    }
    assert_eq!(runs::load_runs(&store).unwrap().len(), 1);
    assert_eq!(error_log::load(&store).unwrap().len(), 1);

    let timer = SplitTimer::initialize(store, ManualClock::new(0)).unwrap();
    assert_eq!(timer.state().status, TimerStatus::Initial);
    assert_eq!(timer.state().splits.len(), 2);
    assert!(timer.state().splits.iter().all(|s| s.time_ms.is_none()));
}

#[test]
fn failed_dispatch_leaves_session_untouched() {
    let dir = tempdir().unwrap();
    let db = dir.path().join("speedsplits.db");
    let mut store = SqliteStore::open(&db).unwrap();
    runs::add_run(&mut store, Run::new("any%", &["A"])).unwrap();

    let mut timer = SplitTimer::initialize(store, ManualClock::new(0)).unwrap();
    let err = timer.dispatch_named("keyPress", None).unwrap_err();
    assert!(matches!(err, TimerError::MissingRequiredValue(_)));

    let status: Option<TimerStatus> = timer.store().get(StorageKey::Status).unwrap();
    assert_eq!(status, None);
    let log = error_log::load(timer.store()).unwrap();
    assert_eq!(log[0].error_kind, "MissingRequiredValue");
}

#[test]
fn corrupt_session_value_on_disk_still_opens() {
    let dir = tempdir().unwrap();
    let db = dir.path().join("speedsplits.db");
    {
        let mut store = SqliteStore::open(&db).unwrap();
        runs::add_run(&mut store, Run::new("any%", &["A", "B"])).unwrap();
        store
            .set_raw(StorageKey::Status, "\"sprinting\"".to_string())
            .unwrap();
    }

    let store = SqliteStore::open(&db).unwrap();
    let mut timer = SplitTimer::initialize(store, ManualClock::new(0)).unwrap();
    assert_eq!(timer.state().status, TimerStatus::Initial);
    assert_eq!(timer.state().run_name, "any%");

    timer.dispatch(Action::Reset).unwrap();
    drop(timer);
    let store = SqliteStore::open(&db).unwrap();
    assert!(store.get_raw(StorageKey::Status).is_none());
}
