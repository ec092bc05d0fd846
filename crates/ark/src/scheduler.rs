use std::time::{Duration, Instant};

use crate::world::EntityId;

/// Something the timer steps once per tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Subscriber {
    Viewport,
    Hand,
    Entity(EntityId),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerPoll {
    /// The timer is off; the caller must not re-arm.
    Stopped,
    /// Nothing to do before this instant.
    Pending(Instant),
    /// A tick is due now.
    Due,
}

/// Fixed-rate tick source with an insertion-ordered subscriber set.
///
/// Stepping is driven from outside: the host polls [`Timer::poll`] and
/// re-arms with the instant returned by [`Timer::rearm`]. Turning the timer
/// off is cooperative; the next poll observes it and stops.
#[derive(Debug)]
pub struct Timer {
    tick: u64,
    running: bool,
    rate: u32,
    subscribers: Vec<Subscriber>,
    next_due: Option<Instant>,
    stats: TickStats,
}

impl Timer {
    pub fn new(rate: u32) -> Self {
        Self {
            tick: 0,
            running: false,
            rate: rate.max(1),
            subscribers: Vec::new(),
            next_due: None,
            stats: TickStats::new(Duration::from_secs(1)),
        }
    }

    pub fn tick(&self) -> u64 {
        self.tick
    }

    pub fn rate(&self) -> u32 {
        self.rate
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn period(&self) -> Duration {
        Duration::from_secs_f64(1.0 / self.rate as f64)
    }

    /// Returns false when the subscriber was already present.
    pub fn add(&mut self, subscriber: Subscriber) -> bool {
        if self.has(subscriber) {
            return false;
        }
        self.subscribers.push(subscriber);
        true
    }

    pub fn remove(&mut self, subscriber: Subscriber) -> bool {
        let before = self.subscribers.len();
        self.subscribers.retain(|existing| *existing != subscriber);
        self.subscribers.len() != before
    }

    pub fn has(&self, subscriber: Subscriber) -> bool {
        self.subscribers.contains(&subscriber)
    }

    pub fn len(&self) -> usize {
        self.subscribers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.subscribers.is_empty()
    }

    pub fn subscribers(&self) -> &[Subscriber] {
        &self.subscribers
    }

    /// Increments the counter and returns the subscriber set as of this tick.
    pub(crate) fn advance(&mut self) -> (u64, Vec<Subscriber>) {
        self.tick = self.tick.saturating_add(1);
        (self.tick, self.subscribers.clone())
    }

    pub fn on(&mut self, now: Instant) {
        self.running = true;
        if self.next_due.is_none() {
            self.next_due = Some(now);
        }
    }

    pub fn off(&mut self) {
        self.running = false;
    }

    pub fn poll(&mut self, now: Instant) -> TimerPoll {
        if !self.running {
            self.next_due = None;
            return TimerPoll::Stopped;
        }
        match self.next_due {
            Some(due) if due > now => TimerPoll::Pending(due),
            _ => TimerPoll::Due,
        }
    }

    /// Schedules the next tick after one that ran from `started` to
    /// `finished`. Returns `None` if the timer was turned off meanwhile.
    pub fn rearm(&mut self, started: Instant, finished: Instant) -> Option<Instant> {
        let elapsed = finished.saturating_duration_since(started);
        self.stats.record(elapsed, self.period());
        if !self.running {
            self.next_due = None;
            return None;
        }
        let due = finished + next_wait(self.period(), elapsed);
        self.next_due = Some(due);
        Some(due)
    }

    pub fn set_stats_interval(&mut self, interval: Duration) {
        self.stats = TickStats::new(interval);
    }

    pub fn take_stats(&mut self, now: Instant) -> Option<TickStatsSnapshot> {
        self.stats.maybe_snapshot(now)
    }
}

/// Time to wait after a tick that took `elapsed`; never negative.
pub fn next_wait(period: Duration, elapsed: Duration) -> Duration {
    period.saturating_sub(elapsed)
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct TickStatsSnapshot {
    pub tps: f32,
    pub mean_tick_ms: f32,
    pub slow_ticks: u32,
}

#[derive(Debug)]
struct TickStats {
    interval_start: Instant,
    interval: Duration,
    ticks: u32,
    slow_ticks: u32,
    busy: Duration,
}

impl TickStats {
    fn new(interval: Duration) -> Self {
        Self {
            interval_start: Instant::now(),
            interval,
            ticks: 0,
            slow_ticks: 0,
            busy: Duration::ZERO,
        }
    }

    fn record(&mut self, elapsed: Duration, period: Duration) {
        self.ticks = self.ticks.saturating_add(1);
        self.busy = self.busy.saturating_add(elapsed);
        if elapsed > period {
            self.slow_ticks = self.slow_ticks.saturating_add(1);
        }
    }

    fn maybe_snapshot(&mut self, now: Instant) -> Option<TickStatsSnapshot> {
        let elapsed = now.saturating_duration_since(self.interval_start);
        if elapsed < self.interval {
            return None;
        }

        let elapsed_seconds = elapsed.as_secs_f32().max(f32::EPSILON);
        let mean_tick_ms = if self.ticks == 0 {
            0.0
        } else {
            self.busy.as_secs_f32() * 1000.0 / self.ticks as f32
        };
        let snapshot = TickStatsSnapshot {
            tps: self.ticks as f32 / elapsed_seconds,
            mean_tick_ms,
            slow_ticks: self.slow_ticks,
        };

        self.interval_start = now;
        self.ticks = 0;
        self.slow_ticks = 0;
        self.busy = Duration::ZERO;
        Some(snapshot)
    }
}
