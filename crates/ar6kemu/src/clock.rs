//! Virtual clock and one-shot timers.
//!
//! The card never reads wall-clock time. Deferred work (counter interrupt
//! debounce, credit grants, the WMI alive event) is queued here with a
//! deadline in ticks and fired when the owner advances the clock.
//!
//! Timers are not cancelled on reset. Every timer records the epoch it was
//! armed in and a reset bumps the epoch, so stale timers are dropped when
//! they come due.

use tracing::trace;

/// Deferred work items
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerEvent {
    /// Re-evaluate the counter bit of the host interrupt status
    CounterIrqUpdate,
    /// Restore the transmit credits of a mailbox
    CreditGrant(usize),
    /// WMI transport is alive; post the READY event
    WmiAlive,
}

#[derive(Debug, Clone, Copy)]
struct Timer {
    deadline: u64,
    epoch: u64,
    event: TimerEvent,
}

/// Tick counter with a queue of pending one-shot timers
#[derive(Debug, Default)]
pub struct VirtualClock {
    now: u64,
    epoch: u64,
    pending: Vec<Timer>,
}

impl VirtualClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current time in ticks
    pub fn now(&self) -> u64 {
        self.now
    }

    /// Current reset epoch
    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    /// Arm `event` to fire `delay` ticks from now.
    ///
    /// Each event is a single one-shot timer: re-arming an event that is
    /// already pending moves its deadline instead of queueing a second one.
    pub fn schedule_after(&mut self, delay: u64, event: TimerEvent) {
        let deadline = self.now.saturating_add(delay);
        self.pending.retain(|t| t.event != event);
        self.pending.push(Timer {
            deadline,
            epoch: self.epoch,
            event,
        });
        trace!("armed {:?} for tick {}", event, deadline);
    }

    /// Check whether `event` is armed in the current epoch
    pub fn is_pending(&self, event: TimerEvent) -> bool {
        self.pending
            .iter()
            .any(|t| t.event == event && t.epoch == self.epoch)
    }

    /// Make every timer armed so far a no-op
    pub fn bump_epoch(&mut self) {
        self.epoch += 1;
        trace!("clock epoch now {}", self.epoch);
    }

    /// Pop the earliest timer due at or before `until`.
    ///
    /// The clock is moved to that timer's deadline so work it schedules is
    /// relative to the moment it fired. Timers from an older epoch are
    /// discarded on the way.
    pub fn pop_due(&mut self, until: u64) -> Option<TimerEvent> {
        loop {
            let index = self
                .pending
                .iter()
                .enumerate()
                .filter(|(_, t)| t.deadline <= until)
                .min_by_key(|(i, t)| (t.deadline, *i))
                .map(|(i, _)| i)?;

            let timer = self.pending.remove(index);
            self.now = self.now.max(timer.deadline);

            if timer.epoch != self.epoch {
                trace!(
                    "dropping stale {:?} (epoch {} != {})",
                    timer.event, timer.epoch, self.epoch
                );
                continue;
            }

            return Some(timer.event);
        }
    }

    /// Move the clock forward to `until` without firing anything
    pub fn advance_to(&mut self, until: u64) {
        self.now = self.now.max(until);
    }
}
