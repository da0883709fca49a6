use std::sync::{mpsc, Arc, Mutex};
use std::thread;
use std::time::{Duration, SystemTime};

use anky::api::SessionNotifier;
use anky::app::{App, AppSettings, Control};
use anky::error::ApiError;
use anky::game::{EndedReport, Phase};
use anky::prompts::PromptBook;
use anky::reporter::{ReportSinks, Reporter};
use anky::runtime::{AppEvent, FixedTicker, Runner, TestEventSource};
use anky::session::{SessionStatus, SessionTiming, WritingSession};
use anky::store::{MemoryStore, SessionArchive};
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

#[derive(Clone, Default)]
struct RecordingNotifier {
    events: Arc<Mutex<Vec<String>>>,
}

impl SessionNotifier for RecordingNotifier {
    fn session_started(&self, session: &WritingSession) -> Result<(), ApiError> {
        self.events
            .lock()
            .unwrap()
            .push(format!("started:{}", session.prompt()));
        Ok(())
    }

    fn session_ended(&self, report: &EndedReport) -> Result<(), ApiError> {
        self.events
            .lock()
            .unwrap()
            .push(format!("ended:{}", report.session.status()));
        Ok(())
    }
}

fn build_app(timing: SessionTiming, store: Arc<MemoryStore>, notifier: RecordingNotifier) -> App {
    let reporter = Reporter::spawn(ReportSinks {
        archive: SessionArchive::new(store),
        history: None,
        keylog_dir: None,
        notifier: Box::new(notifier),
    });
    App::with_prompt(
        "tell us who you are",
        reporter,
        PromptBook::from_prompts(Vec::new()),
        AppSettings {
            timing,
            owner_id: None,
            record_keylog: false,
        },
        false,
    )
}

fn key(code: KeyCode) -> AppEvent {
    AppEvent::Key(KeyEvent::new(code, KeyModifiers::NONE))
}

/// Drive the app the way the binary does, until it ends or quits
fn run_until_ended<E, T>(app: &mut App, runner: &mut Runner<E, T>, max_steps: u32)
where
    E: anky::runtime::EventSource,
    T: anky::runtime::Ticker,
{
    for _ in 0..max_steps {
        let control = match runner.step() {
            AppEvent::Key(k) => app.on_key(&k, SystemTime::now()),
            AppEvent::Poll => app.on_poll(SystemTime::now()),
            AppEvent::Resize => Control::Continue,
        };
        if control == Control::Quit || app.game().phase() == Phase::Ended {
            return;
        }
    }
}

// Headless integration using the runtime + App without a TTY
#[test]
fn headless_session_ends_after_inactivity() {
    let store = Arc::new(MemoryStore::new());
    let notifier = RecordingNotifier::default();
    let timing = SessionTiming {
        inactivity_deadline: Duration::from_millis(60),
        target_duration: Duration::from_secs(60),
        poll_interval: Duration::from_millis(5),
        ..SessionTiming::default()
    };
    let mut app = build_app(timing, store.clone(), notifier.clone());

    let (tx, rx) = mpsc::channel();
    let mut runner = Runner::new(
        TestEventSource::new(rx),
        FixedTicker::new(timing.poll_interval),
    );
    for c in "hi there".chars() {
        tx.send(key(KeyCode::Char(c))).unwrap();
    }

    run_until_ended(&mut app, &mut runner, 1_000);

    assert_eq!(app.game().phase(), Phase::Ended);
    assert_eq!(app.game().session().content(), "hi there");
    assert_eq!(app.game().session().status(), SessionStatus::Draft);
    assert_eq!(app.game().word_count(), 2);

    app.quit(SystemTime::now());
    assert_eq!(
        *notifier.events.lock().unwrap(),
        vec!["started:tell us who you are", "ended:draft"]
    );
    assert_eq!(SessionArchive::new(store).drafts().unwrap().len(), 1);
}

#[test]
fn headless_session_past_target_is_an_anky() {
    let store = Arc::new(MemoryStore::new());
    let notifier = RecordingNotifier::default();
    let timing = SessionTiming {
        inactivity_deadline: Duration::from_millis(200),
        target_duration: Duration::from_millis(50),
        poll_interval: Duration::from_millis(5),
        ..SessionTiming::default()
    };
    let mut app = build_app(timing, store.clone(), notifier.clone());

    let (tx, rx) = mpsc::channel();
    let mut runner = Runner::new(
        TestEventSource::new(rx),
        FixedTicker::new(timing.poll_interval),
    );
    let producer = thread::spawn(move || {
        tx.send(key(KeyCode::Char('a'))).unwrap();
        thread::sleep(Duration::from_millis(80));
        tx.send(key(KeyCode::Char('b'))).unwrap();
    });

    run_until_ended(&mut app, &mut runner, 10_000);
    producer.join().unwrap();

    let session = app.game().session();
    assert_eq!(session.status(), SessionStatus::Anky);
    assert!(session.is_anky());
    assert!(session.anky_id().is_some());
    assert!(app.wrote_today());

    app.quit(SystemTime::now());
    assert_eq!(notifier.events.lock().unwrap().last().unwrap(), "ended:anky");
    assert_eq!(SessionArchive::new(store).ankys().unwrap().len(), 1);
}

#[test]
fn headless_escape_stops_then_quits() {
    let store = Arc::new(MemoryStore::new());
    let notifier = RecordingNotifier::default();
    let timing = SessionTiming {
        poll_interval: Duration::from_millis(5),
        ..SessionTiming::default()
    };
    let mut app = build_app(timing, store, notifier.clone());

    let (tx, rx) = mpsc::channel();
    let mut runner = Runner::new(
        TestEventSource::new(rx),
        FixedTicker::new(timing.poll_interval),
    );
    for c in "one".chars() {
        tx.send(key(KeyCode::Char(c))).unwrap();
    }
    tx.send(key(KeyCode::Esc)).unwrap();
    tx.send(key(KeyCode::Esc)).unwrap();

    let mut quit = false;
    for _ in 0..1_000u32 {
        let control = match runner.step() {
            AppEvent::Key(k) => app.on_key(&k, SystemTime::now()),
            AppEvent::Poll => app.on_poll(SystemTime::now()),
            AppEvent::Resize => Control::Continue,
        };
        if control == Control::Quit {
            quit = true;
            break;
        }
    }

    assert!(quit, "second escape should quit");
    assert_eq!(app.game().session().status(), SessionStatus::Draft);
    app.quit(SystemTime::now());
    assert_eq!(notifier.events.lock().unwrap().len(), 2);
}

#[test]
fn headless_blank_session_announces_start_but_never_ends() {
    let store = Arc::new(MemoryStore::new());
    let notifier = RecordingNotifier::default();
    let timing = SessionTiming {
        inactivity_deadline: Duration::from_millis(40),
        target_duration: Duration::from_secs(60),
        poll_interval: Duration::from_millis(5),
        ..SessionTiming::default()
    };
    let mut app = build_app(timing, store.clone(), notifier.clone());

    let (tx, rx) = mpsc::channel();
    let mut runner = Runner::new(
        TestEventSource::new(rx),
        FixedTicker::new(timing.poll_interval),
    );
    tx.send(key(KeyCode::Char(' '))).unwrap();

    run_until_ended(&mut app, &mut runner, 1_000);

    assert_eq!(app.game().phase(), Phase::Ended);
    assert_eq!(app.game().session().status(), SessionStatus::Discarded);
    assert!(!app.wrote_today());

    app.quit(SystemTime::now());
    assert_eq!(
        *notifier.events.lock().unwrap(),
        vec!["started:tell us who you are"]
    );
    let archive = SessionArchive::new(store);
    assert!(archive.drafts().unwrap().is_empty());
    assert!(archive.ankys().unwrap().is_empty());
}
