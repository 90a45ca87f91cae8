//! Change scheduler: decides when the sweep and the link binder re-run.
//!
//! Pure state machine over a millisecond clock supplied by the host. The host
//! asks [`ChangeScheduler::next_deadline`] when to call back, calls
//! [`ChangeScheduler::advance`] at (or after) that time, and forwards DOM
//! mutations to [`ChangeScheduler::notify_mutation`].
//!
//! ```text
//! location poll (500ms) ── href changed? ──► CheckNavigation
//!                                         └─► settle (100ms) ──► Sweep + RebindLinks
//! mutation ──► debounce (100ms, reset on each mutation) ──► Sweep + RebindLinks
//! backup poll (2000ms) ──► Sweep
//! ```

use crate::config::ScheduleConfig;

/// Work requested by the scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Task {
    CheckNavigation,
    Sweep,
    RebindLinks,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Timer {
    LocationPoll,
    Settle,
    Debounce,
    Backup,
}

#[derive(Debug, Clone)]
struct Running {
    last_href: String,
    next_location_poll: u64,
    next_backup: u64,
    settle: Option<u64>,
    debounce: Option<u64>,
}

impl Running {
    /// Earliest due timer; ties resolve in declaration order.
    fn earliest(&self) -> Option<(u64, Timer)> {
        [
            Some((self.next_location_poll, Timer::LocationPoll)),
            self.settle.map(|at| (at, Timer::Settle)),
            self.debounce.map(|at| (at, Timer::Debounce)),
            Some((self.next_backup, Timer::Backup)),
        ]
        .into_iter()
        .flatten()
        .min_by_key(|(at, _)| *at)
    }
}

#[derive(Debug, Clone)]
pub struct ChangeScheduler {
    timing: ScheduleConfig,
    running: Option<Running>,
}

impl ChangeScheduler {
    pub fn new(timing: ScheduleConfig) -> Self {
        Self {
            timing,
            running: None,
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.is_some()
    }

    /// Initial run: guard, sweep, bind. No-op if already started.
    pub fn start(&mut self, now: u64, href: &str) -> Vec<Task> {
        if self.running.is_some() {
            return Vec::new();
        }
        self.running = Some(Running {
            last_href: href.to_string(),
            next_location_poll: now + self.timing.location_poll_ms,
            next_backup: now + self.timing.backup_sweep_ms,
            settle: None,
            debounce: None,
        });
        vec![Task::CheckNavigation, Task::Sweep, Task::RebindLinks]
    }

    /// Drops every pending deadline.
    pub fn stop(&mut self) {
        self.running = None;
    }

    /// Trailing-edge debounce: each mutation pushes the deadline back.
    pub fn notify_mutation(&mut self, now: u64) {
        if let Some(ref mut running) = self.running {
            running.debounce = Some(now + self.timing.debounce_ms);
        }
    }

    pub fn next_deadline(&self) -> Option<u64> {
        self.running.as_ref().and_then(Running::earliest).map(|(at, _)| at)
    }

    /// Fires every deadline `<= now` in chronological order. `href` is the
    /// location observed by the host at `now`. Duplicate tasks in the batch
    /// are coalesced, keeping first-occurrence order.
    pub fn advance(&mut self, now: u64, href: &str) -> Vec<Task> {
        let timing = self.timing;
        let Some(ref mut running) = self.running else {
            return Vec::new();
        };

        let mut tasks = Vec::new();
        while let Some((at, timer)) = running.earliest().filter(|(at, _)| *at <= now) {
            match timer {
                Timer::LocationPoll => {
                    running.next_location_poll = next_period(at, now, timing.location_poll_ms);
                    if running.last_href != href {
                        running.last_href = href.to_string();
                        tasks.push(Task::CheckNavigation);
                        running.settle = Some(at + timing.settle_delay_ms);
                    }
                }
                Timer::Settle => {
                    running.settle = None;
                    tasks.extend([Task::Sweep, Task::RebindLinks]);
                }
                Timer::Debounce => {
                    running.debounce = None;
                    tasks.extend([Task::Sweep, Task::RebindLinks]);
                }
                Timer::Backup => {
                    running.next_backup = next_period(at, now, timing.backup_sweep_ms);
                    tasks.push(Task::Sweep);
                }
            }
        }

        let mut seen = Vec::with_capacity(tasks.len());
        tasks.retain(|task| {
            if seen.contains(task) {
                false
            } else {
                seen.push(*task);
                true
            }
        });
        tasks
    }
}

/// Next firing of an interval. A host that woke up late (throttled tab)
/// gets one firing, not a burst of missed ones.
fn next_period(at: u64, now: u64, period: u64) -> u64 {
    let period = period.max(1);
    let next = at + period;
    if next <= now { now + period } else { next }
}
