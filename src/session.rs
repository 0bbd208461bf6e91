//! The typing test lifecycle: idle, running, finished.
//!
//! A [`Session`] owns the prompt, the ledger, the input buffer and the two
//! periodic tasks. It is driven from a single thread; every entry point first
//! runs whatever timer deadlines have passed, so a countdown that expired
//! between two events finishes the test before the later event is looked at.

use std::fmt;
use std::time::Instant;

use serde::Serialize;
use tracing::{debug, info};

use crate::clock::Clock;
use crate::ledger::{Character, Ledger};
use crate::result::{self, ResultSink, TestResult};
use crate::settings::{TestMode, TestSettings};
use crate::stats::{self, TypingStats};
use crate::text_gen::PromptSource;
use crate::time_series::WpmSample;
use crate::timer::{TimerKind, Timers};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, strum_macros::Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum SessionState {
    Idle,
    Running,
    Finished,
}

/// Read-only copy of everything a front end needs to draw the current frame.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSnapshot {
    pub prompt: String,
    pub characters: Vec<Character>,
    pub cursor: usize,
    pub state: SessionState,
    /// Whole seconds remaining, time mode only.
    pub time_left: Option<u32>,
    pub elapsed: f64,
    pub stats: TypingStats,
    pub wpm_history: Vec<WpmSample>,
}

pub struct Session {
    settings: TestSettings,
    prompt: String,
    ledger: Ledger,
    input: String,
    cursor: usize,
    state: SessionState,
    started_at: Option<Instant>,
    finished_after: Option<f64>,
    time_left: Option<u32>,
    stats: TypingStats,
    wpm_history: Vec<WpmSample>,
    result: Option<TestResult>,
    timers: Timers,
    clock: Box<dyn Clock>,
    prompts: Box<dyn PromptSource>,
    sink: Option<Box<dyn ResultSink>>,
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("settings", &self.settings)
            .field("state", &self.state)
            .field("cursor", &self.cursor)
            .field("time_left", &self.time_left)
            .field("stats", &self.stats)
            .finish_non_exhaustive()
    }
}

impl Session {
    /// A session in the idle state with a fresh prompt.
    pub fn new(
        settings: TestSettings,
        clock: impl Clock + 'static,
        prompts: impl PromptSource + 'static,
    ) -> Self {
        let mut session = Self {
            settings,
            prompt: String::new(),
            ledger: Ledger::default(),
            input: String::new(),
            cursor: 0,
            state: SessionState::Idle,
            started_at: None,
            finished_after: None,
            time_left: None,
            stats: TypingStats::default(),
            wpm_history: Vec::new(),
            result: None,
            timers: Timers::new(),
            clock: Box::new(clock),
            prompts: Box::new(prompts),
            sink: None,
        };
        session.initialize(settings);
        session
    }

    /// Finished results are handed to `sink`, once per test.
    pub fn with_sink(mut self, sink: impl ResultSink + 'static) -> Self {
        self.sink = Some(Box::new(sink));
        self
    }

    pub fn set_sink(&mut self, sink: Option<Box<dyn ResultSink>>) {
        self.sink = sink;
    }

    /// Hard reset onto `settings`: new prompt, empty input and history, timers cancelled.
    pub fn initialize(&mut self, settings: TestSettings) {
        self.timers.cancel_all();

        let settings = TestSettings {
            duration: settings.effective_duration(),
            ..settings
        };
        self.prompt = self
            .prompts
            .prompt(settings.word_budget(), settings.difficulty);
        self.ledger = Ledger::new(&self.prompt);
        self.input.clear();
        self.cursor = 0;
        self.state = SessionState::Idle;
        self.started_at = None;
        self.finished_after = None;
        self.time_left = match settings.mode {
            TestMode::Time => Some(settings.duration),
            TestMode::Words => None,
        };
        self.stats = TypingStats::default();
        self.wpm_history.clear();
        self.result = None;
        self.settings = settings;

        debug!(
            mode = %settings.mode,
            duration = settings.duration,
            difficulty = %settings.difficulty,
            prompt_len = self.ledger.len(),
            "session initialized"
        );
    }

    pub fn reset(&mut self) {
        let settings = self.settings;
        self.initialize(settings);
    }

    /// Idle to running. Anything else is left alone.
    pub fn start(&mut self) {
        if self.state != SessionState::Idle {
            return;
        }
        let now = self.clock.now();
        self.state = SessionState::Running;
        self.started_at = Some(now);

        let kinds: &[TimerKind] = match self.settings.mode {
            TestMode::Time => &[TimerKind::Countdown, TimerKind::Sampler],
            TestMode::Words => &[TimerKind::Sampler],
        };
        self.timers.start(now, kinds);

        info!(
            mode = %self.settings.mode,
            duration = self.settings.duration,
            "test started"
        );
    }

    /// Replaces the whole input buffer and rescores the ledger against it.
    pub fn handle_input(&mut self, input: &str) {
        self.run_due_timers();
        if self.state == SessionState::Finished {
            return;
        }
        if self.state == SessionState::Idle && !input.is_empty() {
            self.start();
        }

        self.input.clear();
        self.input.push_str(input);
        self.ledger.apply_input(&self.input);
        self.cursor = self.input.chars().count().min(self.ledger.len());
        self.refresh_stats();
        self.finish_if_complete();
    }

    /// Skips the rest of the word at `index`, counting it as wrong.
    pub fn handle_space_skip(&mut self, index: usize) {
        self.run_due_timers();
        if self.state == SessionState::Finished {
            return;
        }
        let Some(skip) = self.ledger.apply_space_skip(index) else {
            debug!(index, "space skip ignored at end of prompt");
            return;
        };
        if self.state == SessionState::Idle {
            self.start();
        }

        if !skip.consumed.is_empty() {
            self.input.push_str(&skip.consumed);
            self.cursor = skip.new_index;
        }
        self.refresh_stats();
        self.finish_if_complete();
    }

    /// A space typed at the cursor: plain input when a space is expected, a skip otherwise.
    pub fn press_space(&mut self) {
        self.run_due_timers();
        if self.state == SessionState::Finished {
            return;
        }
        if self.ledger.expected_char(self.cursor) == Some(' ') {
            self.push_char(' ');
        } else {
            self.handle_space_skip(self.cursor);
        }
    }

    pub fn push_char(&mut self, c: char) {
        let mut input = self.input.clone();
        input.push(c);
        self.handle_input(&input);
    }

    pub fn backspace(&mut self) {
        let mut input = self.input.clone();
        if input.pop().is_some() {
            self.handle_input(&input);
        }
    }

    /// Runs whatever periodic work is due. Call this at least once a second.
    pub fn tick(&mut self) {
        self.run_due_timers();
    }

    /// Ends the test now. Only the first call has any effect; it returns the
    /// assembled result.
    pub fn finish(&mut self) -> Option<&TestResult> {
        self.run_due_timers();
        if self.state == SessionState::Finished {
            return None;
        }
        let elapsed = self.elapsed_at(self.clock.now());
        self.finish_after(elapsed);
        self.result.as_ref()
    }

    pub fn settings(&self) -> &TestSettings {
        &self.settings
    }

    pub fn prompt(&self) -> &str {
        &self.prompt
    }

    pub fn input(&self) -> &str {
        &self.input
    }

    pub fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    pub fn characters(&self) -> &[Character] {
        self.ledger.chars()
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn is_finished(&self) -> bool {
        self.state == SessionState::Finished
    }

    pub fn time_left(&self) -> Option<u32> {
        self.time_left
    }

    /// Seconds since the first keystroke; frozen once finished.
    pub fn elapsed_secs(&self) -> f64 {
        match self.state {
            SessionState::Idle => 0.0,
            SessionState::Running => self.elapsed_at(self.clock.now()),
            SessionState::Finished => self.finished_after.unwrap_or(0.0),
        }
    }

    pub fn stats(&self) -> &TypingStats {
        &self.stats
    }

    pub fn wpm_history(&self) -> &[WpmSample] {
        &self.wpm_history
    }

    pub fn result(&self) -> Option<&TestResult> {
        self.result.as_ref()
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            prompt: self.prompt.clone(),
            characters: self.ledger.chars().to_vec(),
            cursor: self.cursor,
            state: self.state,
            time_left: self.time_left,
            elapsed: self.elapsed_secs(),
            stats: self.stats,
            wpm_history: self.wpm_history.clone(),
        }
    }

    fn elapsed_at(&self, now: Instant) -> f64 {
        self.started_at
            .map_or(0.0, |t| now.saturating_duration_since(t).as_secs_f64())
    }

    fn refresh_stats(&mut self) {
        self.stats = stats::compute_for(&self.ledger, self.elapsed_secs());
    }

    fn finish_if_complete(&mut self) {
        if self.settings.mode == TestMode::Words
            && self.state == SessionState::Running
            && self.input.chars().count() >= self.ledger.len()
        {
            let elapsed = self.elapsed_at(self.clock.now());
            self.finish_after(elapsed);
        }
    }

    fn run_due_timers(&mut self) {
        if self.state != SessionState::Running {
            return;
        }
        let now = self.clock.now();
        while let Some(fire) = self.timers.next_due(now) {
            if !self.timers.is_current(fire.token) {
                debug!(kind = ?fire.kind, "dropping stale timer fire");
                continue;
            }
            match fire.kind {
                TimerKind::Countdown => {
                    let left = self.time_left.unwrap_or(0).saturating_sub(1);
                    self.time_left = Some(left);
                    if left == 0 {
                        self.finish_after(fire.offset_secs());
                    }
                }
                TimerKind::Sampler => {
                    let at = fire.offset_secs();
                    let wpm = stats::compute_for(&self.ledger, at).wpm;
                    self.wpm_history.push(WpmSample::new(at, wpm));
                }
            }
        }
    }

    fn finish_after(&mut self, elapsed: f64) {
        if self.state == SessionState::Finished {
            return;
        }
        self.timers.cancel_all();
        self.state = SessionState::Finished;
        self.finished_after = Some(elapsed);

        self.ledger.mark_missed();
        self.stats = stats::compute_for(&self.ledger, elapsed);
        let result = result::assemble(&self.settings, &self.stats, &self.wpm_history);

        info!(
            result_id = %result.id,
            wpm = self.stats.wpm,
            accuracy = self.stats.accuracy,
            total_time = elapsed,
            samples = self.wpm_history.len(),
            "test finished"
        );

        if let Some(sink) = self.sink.as_mut() {
            sink.submit(&result);
        }
        self.result = Some(result);
    }
}
