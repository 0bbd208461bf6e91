//! Periodic tasks owned by a session.
//!
//! Tasks are deadlines at whole multiples of their period after the start
//! instant. The owner drains them with [`Timers::next_due`] on every event, so
//! callbacks run one at a time on the caller's thread. Cancelling bumps the
//! generation; a [`Fire`] carrying an older token must be dropped.

use std::time::{Duration, Instant};

pub const SECOND: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerKind {
    /// Time-mode countdown; finishes the test when it reaches zero.
    Countdown,
    /// Appends a wpm sample to the history.
    Sampler,
}

/// Generation a fire was issued under.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CancelToken(u64);

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Fire {
    pub kind: TimerKind,
    /// Offset of the deadline from the start instant.
    pub offset: Duration,
    pub token: CancelToken,
}

impl Fire {
    pub fn offset_secs(&self) -> f64 {
        self.offset.as_secs_f64()
    }
}

#[derive(Debug, Clone)]
struct Task {
    kind: TimerKind,
    period: Duration,
    next_tick: u32,
}

impl Task {
    fn next_offset(&self) -> Duration {
        self.period * self.next_tick
    }
}

#[derive(Debug, Clone, Default)]
pub struct Timers {
    generation: u64,
    started_at: Option<Instant>,
    // drained in this order when deadlines coincide
    tasks: Vec<Task>,
}

impl Timers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cancels anything outstanding, then schedules `kinds` (in priority order)
    /// with a one second period starting at `at`.
    pub fn start(&mut self, at: Instant, kinds: &[TimerKind]) -> CancelToken {
        self.start_with_period(at, kinds, SECOND)
    }

    pub fn start_with_period(
        &mut self,
        at: Instant,
        kinds: &[TimerKind],
        period: Duration,
    ) -> CancelToken {
        self.cancel_all();
        self.started_at = Some(at);
        self.tasks = kinds
            .iter()
            .map(|&kind| Task {
                kind,
                period,
                next_tick: 1,
            })
            .collect();
        self.token()
    }

    pub fn cancel_all(&mut self) {
        self.generation += 1;
        self.started_at = None;
        self.tasks.clear();
    }

    pub fn is_active(&self) -> bool {
        !self.tasks.is_empty()
    }

    pub fn token(&self) -> CancelToken {
        CancelToken(self.generation)
    }

    pub fn is_current(&self, token: CancelToken) -> bool {
        token == self.token()
    }

    /// The earliest deadline at or before `now`, advancing that task.
    /// Coinciding deadlines come out in scheduling order.
    pub fn next_due(&mut self, now: Instant) -> Option<Fire> {
        let started_at = self.started_at?;
        let elapsed = now.saturating_duration_since(started_at);

        let (idx, offset) = self
            .tasks
            .iter()
            .enumerate()
            .map(|(idx, task)| (idx, task.next_offset()))
            .filter(|&(_, offset)| offset <= elapsed)
            .min_by_key(|&(idx, offset)| (offset, idx))?;

        let task = &mut self.tasks[idx];
        task.next_tick += 1;
        let kind = task.kind;

        Some(Fire {
            kind,
            offset,
            token: self.token(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn drain(timers: &mut Timers, now: Instant) -> Vec<(TimerKind, u64)> {
        let mut fires = vec![];
        while let Some(fire) = timers.next_due(now) {
            fires.push((fire.kind, fire.offset.as_secs()));
        }
        fires
    }

    #[test]
    fn nothing_due_before_first_period() {
        let t0 = Instant::now();
        let mut timers = Timers::new();
        timers.start(t0, &[TimerKind::Sampler]);
        assert!(timers.next_due(t0).is_none());
        assert!(timers.next_due(t0 + Duration::from_millis(999)).is_none());
        assert!(timers.next_due(t0 + SECOND).is_some());
    }

    #[test]
    fn catch_up_is_chronological_with_countdown_first() {
        let t0 = Instant::now();
        let mut timers = Timers::new();
        timers.start(t0, &[TimerKind::Countdown, TimerKind::Sampler]);

        let fires = drain(&mut timers, t0 + Duration::from_millis(2500));
        assert_eq!(
            fires,
            vec![
                (TimerKind::Countdown, 1),
                (TimerKind::Sampler, 1),
                (TimerKind::Countdown, 2),
                (TimerKind::Sampler, 2),
            ]
        );
        assert!(timers.next_due(t0 + Duration::from_millis(2500)).is_none());
    }

    #[test]
    fn cancel_invalidates_outstanding_tokens() {
        let t0 = Instant::now();
        let mut timers = Timers::new();
        timers.start(t0, &[TimerKind::Sampler]);
        let fire = timers.next_due(t0 + SECOND).unwrap();
        assert!(timers.is_current(fire.token));

        timers.cancel_all();
        assert!(!timers.is_current(fire.token));
        assert!(!timers.is_active());
        assert!(timers.next_due(t0 + SECOND * 10).is_none());
    }

    #[test]
    fn restart_issues_a_fresh_generation() {
        let t0 = Instant::now();
        let mut timers = Timers::new();
        let first = timers.start(t0, &[TimerKind::Sampler]);
        let second = timers.start(t0 + SECOND * 5, &[TimerKind::Sampler]);
        assert_ne!(first, second);
        // deadlines are relative to the new start
        assert!(timers.next_due(t0 + SECOND * 5).is_none());
        assert_eq!(
            timers.next_due(t0 + SECOND * 6).map(|f| f.offset),
            Some(SECOND)
        );
    }

    #[test]
    fn custom_period() {
        let t0 = Instant::now();
        let mut timers = Timers::new();
        timers.start_with_period(t0, &[TimerKind::Sampler], Duration::from_millis(250));
        let fires = drain(&mut timers, t0 + SECOND);
        assert_eq!(fires.len(), 4);
    }
}
