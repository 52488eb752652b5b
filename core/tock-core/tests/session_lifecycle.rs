//! Integration tests for full timer sessions driven through the filesystem.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use chrono::Local;
use tock_core::{
    CellUpdate, FileWorksheet, Result, SessionConfig, SessionObserver, SessionReport,
    SessionStart, StorageConfig, TimerSession, TimerSnapshot, TockError, TrackingOutcome,
    Worksheet, DISPLAY_UPDATE, TIMER_RUNNING,
};

fn storage() -> (tempfile::TempDir, StorageConfig) {
    let temp = tempfile::tempdir().unwrap();
    let storage = StorageConfig::with_root(temp.path().to_path_buf());
    storage.ensure_dirs().unwrap();
    (temp, storage)
}

fn fast_config() -> SessionConfig {
    SessionConfig {
        tick: Duration::from_millis(20),
        focus_unit_secs: 1,
        penalty: 0.04,
        track: true,
        force: false,
    }
}

fn interrupt_after(delay: Duration) -> (Arc<AtomicBool>, thread::JoinHandle<()>) {
    let flag = Arc::new(AtomicBool::new(false));
    let setter = Arc::clone(&flag);
    let handle = thread::spawn(move || {
        thread::sleep(delay);
        setter.store(true, Ordering::SeqCst);
    });
    (flag, handle)
}

#[derive(Default)]
struct Recorder {
    started: Vec<SessionStart>,
    display_updates: usize,
    paused: Vec<Option<i64>>,
    completed: usize,
}

impl SessionObserver for Recorder {
    fn on_started(&mut self, _label: &str, start: SessionStart, _remaining: i64) {
        self.started.push(start);
    }

    fn on_display_update(&mut self, _snapshot: &TimerSnapshot) {
        self.display_updates += 1;
    }

    fn on_paused(&mut self, _label: &str, remaining: Option<i64>) {
        self.paused.push(remaining);
    }

    fn on_complete(&mut self, _label: &str) {
        self.completed += 1;
    }
}

struct OfflineSheet;

impl Worksheet for OfflineSheet {
    fn cell_value(&self, _row: u32, _col: u32) -> Result<Option<String>> {
        Err(TockError::Sheet("offline".to_string()))
    }

    fn batch_update(&self, _updates: &[CellUpdate]) -> Result<()> {
        Err(TockError::Sheet("offline".to_string()))
    }
}

#[test]
fn test_interrupt_pauses_timer_and_releases_signals() {
    let (_temp, storage) = storage();
    let session = TimerSession::new(storage.clone(), fast_config());
    let (flag, handle) = interrupt_after(Duration::from_millis(2500));
    let mut recorder = Recorder::default();

    let report = session
        .run("code", Some(60), &flag, &mut recorder, None)
        .unwrap();
    handle.join().unwrap();

    let SessionReport::Interrupted {
        remaining,
        interruptions,
        ..
    } = report
    else {
        panic!("expected an interrupted session, got {:?}", report);
    };
    let remaining = remaining.unwrap();
    assert!((57..=58).contains(&remaining), "remaining was {}", remaining);
    assert_eq!(interruptions, 1);
    assert_eq!(recorder.started, vec![SessionStart::Started]);
    assert_eq!(recorder.paused.len(), 1);

    assert!(storage.signals().list().unwrap().is_empty());
    let timer = storage.timers().open_existing("code").unwrap().unwrap();
    assert!(!timer.is_running());
    assert_eq!(timer.interruptions(), 1);
}

#[test]
fn test_second_session_resumes_paused_timer() {
    let (_temp, storage) = storage();
    let session = TimerSession::new(storage.clone(), fast_config());

    let (flag, handle) = interrupt_after(Duration::from_millis(100));
    session
        .run("code", Some(60), &flag, &mut Recorder::default(), None)
        .unwrap();
    handle.join().unwrap();

    let (flag, handle) = interrupt_after(Duration::from_millis(100));
    let mut recorder = Recorder::default();
    let report = session
        .run("code", None, &flag, &mut recorder, None)
        .unwrap();
    handle.join().unwrap();

    assert_eq!(recorder.started, vec![SessionStart::Resumed]);
    match report {
        SessionReport::Interrupted { interruptions, .. } => assert_eq!(interruptions, 2),
        other => panic!("unexpected report {:?}", other),
    }
}

#[test]
fn test_two_interruptions_then_completion_earns_reduced_credit() {
    let (_temp, storage) = storage();
    let session = TimerSession::new(
        storage.clone(),
        SessionConfig {
            track: false,
            ..fast_config()
        },
    );

    for _ in 0..2 {
        let (flag, handle) = interrupt_after(Duration::from_millis(200));
        let report = session
            .run("code", Some(1), &flag, &mut Recorder::default(), None)
            .unwrap();
        handle.join().unwrap();
        assert!(matches!(report, SessionReport::Interrupted { .. }));
    }

    let flag = AtomicBool::new(false);
    let mut recorder = Recorder::default();
    let report = session
        .run("code", None, &flag, &mut recorder, None)
        .unwrap();

    assert_eq!(recorder.started, vec![SessionStart::Resumed]);
    let SessionReport::Completed {
        interruptions,
        credit,
        ..
    } = report
    else {
        panic!("expected completion, got {:?}", report);
    };
    assert_eq!(interruptions, 2);
    assert!((credit - 0.88).abs() < 1e-9, "credit was {}", credit);
    assert!(!storage.timers().exists("code").unwrap());
}

#[test]
fn test_expired_timer_completes_despite_pending_interrupt() {
    let (_temp, storage) = storage();
    let mut timer = storage.timers().open("code").unwrap();
    timer.start_for(1).unwrap();
    timer.close().unwrap();
    thread::sleep(Duration::from_millis(1200));

    let session = TimerSession::new(
        storage.clone(),
        SessionConfig {
            track: false,
            ..fast_config()
        },
    );
    let flag = AtomicBool::new(true);
    let mut recorder = Recorder::default();
    let report = session
        .run("code", None, &flag, &mut recorder, None)
        .unwrap();

    assert_eq!(recorder.started, vec![SessionStart::Adopted]);
    assert!(recorder.paused.is_empty());
    match report {
        SessionReport::Completed { interruptions, .. } => assert_eq!(interruptions, 0),
        other => panic!("unexpected report {:?}", other),
    }
    assert!(!storage.timers().exists("code").unwrap());
    assert!(storage.signals().list().unwrap().is_empty());
}

#[test]
fn test_forced_start_resets_interruptions() {
    let (_temp, storage) = storage();
    let session = TimerSession::new(storage.clone(), fast_config());

    let (flag, handle) = interrupt_after(Duration::from_millis(100));
    session
        .run("code", Some(60), &flag, &mut Recorder::default(), None)
        .unwrap();
    handle.join().unwrap();

    let forced = TimerSession::new(
        storage.clone(),
        SessionConfig {
            force: true,
            ..fast_config()
        },
    );
    let (flag, handle) = interrupt_after(Duration::from_millis(100));
    let mut recorder = Recorder::default();
    let report = forced
        .run("code", Some(120), &flag, &mut recorder, None)
        .unwrap();
    handle.join().unwrap();

    assert_eq!(recorder.started, vec![SessionStart::Started]);
    match report {
        SessionReport::Interrupted {
            remaining,
            interruptions,
            ..
        } => {
            assert_eq!(interruptions, 1);
            assert!((119..=120).contains(&remaining.unwrap()));
        }
        other => panic!("unexpected report {:?}", other),
    }
}

#[test]
fn test_already_running_leaves_record_unchanged() {
    let (_temp, storage) = storage();
    let mut timer = storage.timers().open("code").unwrap();
    timer.start_for(600).unwrap();
    timer.close().unwrap();
    storage.signals().set(TIMER_RUNNING).unwrap();

    let record_path = storage.timer_dir().join("code-timer");
    let before = std::fs::read(&record_path).unwrap();

    let session = TimerSession::new(storage.clone(), fast_config());
    let flag = AtomicBool::new(false);
    let report = session
        .run("code", Some(60), &flag, &mut Recorder::default(), None)
        .unwrap();

    assert_eq!(report, SessionReport::AlreadyRunning);
    assert_eq!(std::fs::read(&record_path).unwrap(), before);
    assert!(storage.signals().is_set(TIMER_RUNNING).unwrap());
}

#[test]
fn test_stale_running_record_is_adopted() {
    let (_temp, storage) = storage();
    let mut timer = storage.timers().open("code").unwrap();
    timer.start_for(600).unwrap();
    timer.close().unwrap();

    let session = TimerSession::new(storage.clone(), fast_config());
    let (flag, handle) = interrupt_after(Duration::from_millis(100));
    let mut recorder = Recorder::default();
    session
        .run("code", Some(60), &flag, &mut recorder, None)
        .unwrap();
    handle.join().unwrap();

    assert_eq!(recorder.started, vec![SessionStart::Adopted]);
    let timer = storage.timers().open_existing("code").unwrap().unwrap();
    assert!(timer.remaining().unwrap() > 500);
}

#[test]
fn test_display_update_is_consumed_by_session() {
    let (_temp, storage) = storage();
    let session = TimerSession::new(storage.clone(), fast_config());

    let signals = storage.signals();
    let raiser = thread::spawn(move || {
        thread::sleep(Duration::from_millis(100));
        signals.set(DISPLAY_UPDATE).unwrap();
    });
    let (flag, handle) = interrupt_after(Duration::from_millis(400));
    let mut recorder = Recorder::default();
    session
        .run("code", Some(60), &flag, &mut recorder, None)
        .unwrap();
    raiser.join().unwrap();
    handle.join().unwrap();

    assert_eq!(recorder.display_updates, 1);
    assert!(!storage.signals().is_set(DISPLAY_UPDATE).unwrap());
}

#[test]
fn test_completion_posts_credit() {
    let (temp, storage) = storage();
    let sheet = FileWorksheet::new(temp.path().join("sheet.json"));
    sheet
        .initialize(&["code"], Local::now().date_naive())
        .unwrap();

    let session = TimerSession::new(storage.clone(), fast_config());
    let flag = AtomicBool::new(false);
    let mut recorder = Recorder::default();
    let report = session
        .run("code", Some(1), &flag, &mut recorder, Some(&sheet))
        .unwrap();

    let SessionReport::Completed {
        interruptions,
        credit,
        tracking,
        ..
    } = report
    else {
        panic!("expected completion, got {:?}", report);
    };
    assert_eq!(interruptions, 0);
    assert!((credit - 1.0).abs() < 1e-9);
    match tracking {
        TrackingOutcome::Posted(posting) => {
            assert_eq!(posting.column, 3);
            assert!((posting.total - 1.0).abs() < 1e-9);
        }
        other => panic!("unexpected tracking {:?}", other),
    }
    assert_eq!(recorder.completed, 1);
    assert!(!storage.timers().exists("code").unwrap());
    assert!(storage.signals().list().unwrap().is_empty());
}

#[test]
fn test_failed_worksheet_still_clears_local_state() {
    let (_temp, storage) = storage();
    let session = TimerSession::new(storage.clone(), fast_config());
    let flag = AtomicBool::new(false);

    let report = session
        .run("code", Some(1), &flag, &mut Recorder::default(), Some(&OfflineSheet))
        .unwrap();

    match report {
        SessionReport::Completed { tracking, .. } => {
            assert!(matches!(tracking, TrackingOutcome::Failed(_)));
        }
        other => panic!("unexpected report {:?}", other),
    }
    assert!(!storage.timers().exists("code").unwrap());
    assert!(storage.signals().list().unwrap().is_empty());
}

#[test]
fn test_untracked_session_skips_worksheet() {
    let (_temp, storage) = storage();
    let session = TimerSession::new(
        storage.clone(),
        SessionConfig {
            track: false,
            ..fast_config()
        },
    );
    let flag = AtomicBool::new(false);

    let report = session
        .run("code", Some(1), &flag, &mut Recorder::default(), Some(&OfflineSheet))
        .unwrap();

    match report {
        SessionReport::Completed { tracking, .. } => {
            assert_eq!(tracking, TrackingOutcome::Skipped)
        }
        other => panic!("unexpected report {:?}", other),
    }
}

#[test]
fn test_external_clear_ends_session() {
    let (_temp, storage) = storage();
    let session = TimerSession::new(storage.clone(), fast_config());

    let timers = storage.timers();
    let clearer = thread::spawn(move || {
        thread::sleep(Duration::from_millis(150));
        let mut timer = timers.open_existing("code").unwrap().unwrap();
        timer.clear();
        timer.close().unwrap();
    });
    let flag = AtomicBool::new(false);
    let report = session
        .run("code", Some(60), &flag, &mut Recorder::default(), None)
        .unwrap();
    clearer.join().unwrap();

    assert_eq!(
        report,
        SessionReport::Cleared {
            label: "code".to_string()
        }
    );
    assert!(storage.signals().list().unwrap().is_empty());
}

#[test]
fn test_session_exits_diary_window() {
    let (_temp, storage) = storage();
    storage.diary().create("code").unwrap();

    let session = TimerSession::new(storage.clone(), fast_config());
    let flag = AtomicBool::new(false);
    session
        .run("code", Some(1), &flag, &mut Recorder::default(), None)
        .unwrap();

    let entry = storage.diary().entries().unwrap().remove(0);
    assert!(entry.effective > 0.2, "effective was {}", entry.effective);
    assert!(entry.effective < 5.0, "effective was {}", entry.effective);
}
