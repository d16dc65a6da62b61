//! Tick timing: when the next sampling pass is due

use std::time::{Duration, Instant};

pub const MIN_INTERVAL: Duration = Duration::from_millis(200);
pub const MAX_INTERVAL: Duration = Duration::from_secs(60);
pub const DEFAULT_INTERVAL: Duration = Duration::from_millis(1000);
pub const INTERVAL_STEP: Duration = Duration::from_millis(250);

pub fn clamp_interval(interval: Duration) -> Duration {
    interval.clamp(MIN_INTERVAL, MAX_INTERVAL)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Nothing sampled yet, or a tick boundary has been reached
    Idle,
    Sampling,
    /// Between ticks
    Waiting,
}

/// Phase machine driving acquisition.
///
/// Interval changes are picked up on the next transition into `Sampling`,
/// never in the middle of a pass.
#[derive(Debug, Clone)]
pub struct Scheduler {
    phase: Phase,
    interval: Duration,
    pending_interval: Option<Duration>,
    deadline: Option<Instant>,
    paused: bool,
}

impl Scheduler {
    /// Starts `Idle` with the first tick due immediately
    pub fn new(interval: Duration, now: Instant) -> Self {
        Self {
            phase: Phase::Idle,
            interval: clamp_interval(interval),
            pending_interval: None,
            deadline: Some(now),
            paused: false,
        }
    }

    #[cfg(test)]
    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn interval(&self) -> Duration {
        self.pending_interval.unwrap_or(self.interval)
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    /// When the turn loop should wake up for the next tick
    pub fn deadline(&self) -> Option<Instant> {
        if self.paused || self.phase == Phase::Sampling {
            None
        } else {
            self.deadline
        }
    }

    /// The tick boundary arrived. Returns whether a pass should start.
    pub fn on_deadline(&mut self, now: Instant) -> bool {
        match self.deadline() {
            Some(due) if now >= due => {
                self.phase = Phase::Idle;
                self.begin()
            }
            _ => false,
        }
    }

    /// Manual refresh: skips the remaining wait. Ignored while sampling.
    pub fn request_refresh(&mut self) -> bool {
        match self.phase {
            Phase::Sampling => false,
            Phase::Idle | Phase::Waiting => self.begin(),
        }
    }

    fn begin(&mut self) -> bool {
        if let Some(interval) = self.pending_interval.take() {
            self.interval = interval;
        }
        self.phase = Phase::Sampling;
        self.deadline = None;
        true
    }

    /// A pass finished. The next one is due one interval after completion.
    pub fn complete(&mut self, now: Instant) {
        if self.phase != Phase::Sampling {
            return;
        }
        self.phase = Phase::Waiting;
        self.deadline = Some(now + self.interval);
    }

    /// Takes effect at the next transition into `Sampling`
    pub fn set_interval(&mut self, interval: Duration) -> Duration {
        let interval = clamp_interval(interval);
        self.pending_interval = Some(interval);
        interval
    }

    pub fn pause(&mut self) {
        self.paused = true;
    }

    /// A deadline that passed while paused fires right away
    pub fn resume(&mut self) {
        self.paused = false;
    }
}
