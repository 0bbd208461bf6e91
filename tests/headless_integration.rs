use std::sync::mpsc;
use std::time::Duration;

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use typeflow::app::{App, Control, Screen};
use typeflow::clock::ManualClock;
use typeflow::runtime::{AppEvent, ChannelEventSource, FixedTicker, Runner};
use typeflow::saver::{self, ResultSaver, SaveStatus};
use typeflow::session::Session;
use typeflow::settings::{Difficulty, TestMode, TestSettings};
use typeflow::store::{ResultStore, SqliteResultStore};
use typeflow::text_gen::FixedPrompt;

fn key(c: char) -> AppEvent {
    AppEvent::Key(KeyEvent::new(KeyCode::Char(c), KeyModifiers::NONE))
}

// Drives the app the way the binary does, through Runner and a channel source.
#[test]
fn headless_typing_flow_saves_the_result() {
    let dir = tempfile::tempdir().unwrap();
    let db = dir.path().join("results.db");
    let store = SqliteResultStore::open(&db).unwrap();
    let (queue, monitor) = saver::spawn(ResultSaver::new(Box::new(store), "tester"));

    let clock = ManualClock::new();
    let settings = TestSettings::new(TestMode::Words, 2, Difficulty::Easy);
    let session = Session::new(settings, clock.clone(), FixedPrompt("hi yo".to_string()));
    let mut app = App::new(session).with_saves(queue, monitor);

    let (tx, rx) = mpsc::channel();
    let runner = Runner::new(
        ChannelEventSource::new(rx),
        FixedTicker::new(Duration::from_millis(5)),
    );
    for c in "hi yo".chars() {
        tx.send(key(c)).unwrap();
    }

    for _ in 0..400u32 {
        match runner.step() {
            AppEvent::Tick => app.on_tick(),
            AppEvent::Resize => {}
            AppEvent::Key(k) => {
                assert_eq!(app.handle_key(k), Control::Continue);
            }
        }
        if matches!(app.save_status(), Some(SaveStatus::Saved { .. })) {
            break;
        }
    }

    assert_eq!(app.screen, Screen::Results);
    assert!(matches!(app.save_status(), Some(SaveStatus::Saved { .. })));

    let reader = SqliteResultStore::open(&db).unwrap();
    let recent = reader.recent_results("tester", 5).unwrap();
    assert_eq!(recent.len(), 1);
    assert_eq!(Some(&recent[0]), app.session.result());
    assert_eq!(reader.aggregate_stats("tester").unwrap().total_tests, 1);
}

#[test]
fn headless_time_mode_runs_out_on_ticks() {
    let clock = ManualClock::new();
    let settings = TestSettings::new(TestMode::Time, 15, Difficulty::Hard);
    let session = Session::new(settings, clock.clone(), FixedPrompt("abc def".to_string()));
    let mut app = App::new(session);

    let (tx, rx) = mpsc::channel();
    let runner = Runner::new(
        ChannelEventSource::new(rx),
        FixedTicker::new(Duration::from_millis(1)),
    );
    tx.send(key('a')).unwrap();

    for _ in 0..20 {
        match runner.step() {
            AppEvent::Tick => {
                clock.advance(Duration::from_secs(1));
                app.on_tick();
            }
            AppEvent::Key(k) => {
                app.handle_key(k);
            }
            AppEvent::Resize => {}
        }
    }

    assert_eq!(app.screen, Screen::Results);
    let stats = app.session.stats();
    assert_eq!(stats.total_time, 15.0);
    assert_eq!(stats.correct, 1);
    assert_eq!(stats.missed, 6);
    assert_eq!(app.session.wpm_history().len(), 14);
}
