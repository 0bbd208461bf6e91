//! Terminal front end state: one session, its save channel, and the key map.

use std::time::Duration;

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use tracing::warn;

use crate::result::ResultSink;
use crate::saver::{SaveMonitor, SaveQueue, SaveStatus};
use crate::session::{Session, SessionState};
use crate::settings::{Difficulty, SettingsStore, TestMode, TestSettings};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Screen {
    Typing,
    Results,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Control {
    Continue,
    Quit,
}

pub struct App {
    pub session: Session,
    pub screen: Screen,
    saves: Option<SaveMonitor>,
    settings_store: Option<Box<dyn SettingsStore>>,
}

impl App {
    pub fn new(session: Session) -> Self {
        Self {
            session,
            screen: Screen::Typing,
            saves: None,
            settings_store: None,
        }
    }

    /// Persist finished results through a background saver.
    pub fn with_saves(mut self, queue: SaveQueue, monitor: SaveMonitor) -> Self {
        let sink: Box<dyn ResultSink> = Box::new(queue);
        self.session.set_sink(Some(sink));
        self.saves = Some(monitor);
        self
    }

    /// Write settings back whenever they change from the keyboard.
    pub fn with_settings_store(mut self, store: impl SettingsStore + 'static) -> Self {
        self.settings_store = Some(Box::new(store));
        self
    }

    /// `None` when results are not being persisted at all.
    pub fn save_status(&self) -> Option<&SaveStatus> {
        self.saves.as_ref().map(SaveMonitor::status)
    }

    pub fn on_tick(&mut self) {
        self.session.tick();
        self.sync();
    }

    pub fn handle_key(&mut self, key: KeyEvent) -> Control {
        if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
            return Control::Quit;
        }
        match (self.screen, key.code) {
            (_, KeyCode::Esc) => return Control::Quit,
            (_, KeyCode::Tab) => self.restart(),
            (Screen::Typing, KeyCode::Backspace) => self.session.backspace(),
            (Screen::Typing, KeyCode::Char(' ')) => self.session.press_space(),
            (Screen::Typing, KeyCode::Char(c)) => self.session.push_char(c),
            (Screen::Typing, KeyCode::Enter) if self.session.state() == SessionState::Running => {
                self.session.finish();
            }
            (Screen::Typing, code) if self.session.state() == SessionState::Idle => {
                self.adjust_settings(code)
            }
            (Screen::Results, KeyCode::Char('r') | KeyCode::Char('n')) => self.restart(),
            (Screen::Results, KeyCode::Char('s')) => self.retry_save(),
            (Screen::Results, KeyCode::Char('q')) => return Control::Quit,
            _ => {}
        }
        self.sync();
        Control::Continue
    }

    /// New prompt, same settings.
    pub fn restart(&mut self) {
        self.session.reset();
        self.screen = Screen::Typing;
        if let Some(monitor) = self.saves.as_mut() {
            monitor.clear();
        }
    }

    pub fn retry_save(&mut self) {
        if let Some(monitor) = self.saves.as_mut() {
            monitor.retry();
        }
    }

    fn adjust_settings(&mut self, code: KeyCode) {
        let current = *self.session.settings();
        let next = match code {
            KeyCode::Up => {
                let mode = match current.mode {
                    TestMode::Time => TestMode::Words,
                    TestMode::Words => TestMode::Time,
                };
                let options = TestSettings { mode, ..current }.duration_options();
                TestSettings::new(mode, options[options.len() / 2], current.difficulty)
            }
            KeyCode::Down => {
                let difficulty = match current.difficulty {
                    Difficulty::Easy => Difficulty::Hard,
                    Difficulty::Hard => Difficulty::Easy,
                };
                TestSettings {
                    difficulty,
                    ..current
                }
            }
            KeyCode::Left | KeyCode::Right => TestSettings {
                duration: cycle(current.duration_options(), current.duration, code == KeyCode::Right),
                ..current
            },
            _ => return,
        };
        self.apply_settings(next);
    }

    pub fn apply_settings(&mut self, settings: TestSettings) {
        self.session.initialize(settings);
        self.screen = Screen::Typing;
        if let Some(store) = self.settings_store.as_ref() {
            if let Err(e) = store.save(self.session.settings()) {
                warn!(error = %e, "could not save settings");
            }
        }
    }

    /// Gives a save still in flight up to `timeout` to land. Call before exiting.
    pub fn flush_saves(&mut self, timeout: Duration) {
        let Some(monitor) = self.saves.as_mut() else {
            return;
        };
        if *monitor.wait(timeout) == SaveStatus::Saving {
            warn!(?timeout, "exiting with a result still being saved");
        }
    }

    fn sync(&mut self) {
        if let Some(monitor) = self.saves.as_mut() {
            monitor.poll();
        }
        if self.screen == Screen::Typing && self.session.is_finished() {
            self.screen = Screen::Results;
        }
    }
}

/// Next (or previous) entry after `current`; values outside the set snap to the first entry.
fn cycle(options: &[u32], current: u32, forward: bool) -> u32 {
    let Some(idx) = options.iter().position(|&o| o == current) else {
        return options.first().copied().unwrap_or(current);
    };
    let len = options.len();
    let next = if forward { (idx + 1) % len } else { (idx + len - 1) % len };
    options[next]
}
