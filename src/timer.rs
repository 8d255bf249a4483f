//! Clocks and deadline scheduling
//!
//! The turn engine never reads the system time or sleeps by itself. It asks a
//! [`Clock`] for the current time and a [`Scheduler`] to deliver an [`Alarm`]
//! back to it later; whoever owns the runtime (a tokio task, a browser timer,
//! a test) decides how that delivery happens.

use std::{
    collections::HashMap,
    sync::{Arc, Mutex, PoisonError},
    time::Duration,
};

use itertools::Itertools;
use serde::{Deserialize, Serialize};
use web_time::{SystemTime, UNIX_EPOCH};

use crate::room_id::RoomId;

/// Identifies one voting window within a room
///
/// Every window opened by a turn manager gets a strictly larger generation
/// than the one before it.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Default,
    Serialize,
    Deserialize,
    derive_more::Display,
)]
pub struct Generation(u64);

impl Generation {
    /// The generation following this one
    #[must_use]
    pub fn next(self) -> Self {
        Self(self.0 + 1)
    }
}

/// A deadline notification scheduled for a specific room and window
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Alarm {
    /// Room the deadline belongs to
    pub room: RoomId,
    /// Voting window the deadline was scheduled for
    pub generation: Generation,
}

/// Handle to a scheduled alarm, used to cancel it
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TimerId(pub u64);

/// Source of the current wall-clock time
pub trait Clock {
    /// Milliseconds since the Unix epoch
    fn now_millis(&self) -> u64;
}

/// Delivers alarms after a delay
pub trait Scheduler {
    /// Schedules `alarm` to be handed back to the turn manager after `delay`
    fn schedule(&mut self, alarm: Alarm, delay: Duration) -> TimerId;

    /// Cancels a previously scheduled alarm; unknown or fired timers are ignored
    fn cancel(&mut self, timer: TimerId);
}

/// Reads the real system time
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_millis(&self) -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_or(0, |elapsed| elapsed.as_millis() as u64)
    }
}

#[derive(Debug, Default)]
struct ManualTimerState {
    now_millis: u64,
    next_timer: u64,
    pending: HashMap<TimerId, (u64, Alarm)>,
}

/// A virtual clock and scheduler driven by hand
///
/// Time only moves when [`ManualTimer::advance`] is called, which returns the
/// alarms that became due in deadline order. Clones share the same clock, so
/// one instance can serve several rooms.
#[derive(Debug, Clone, Default)]
pub struct ManualTimer {
    state: Arc<Mutex<ManualTimerState>>,
}

impl ManualTimer {
    /// Creates a virtual clock reading `now_millis`
    pub fn starting_at(now_millis: u64) -> Self {
        Self {
            state: Arc::new(Mutex::new(ManualTimerState {
                now_millis,
                ..ManualTimerState::default()
            })),
        }
    }

    fn with_state<R>(&self, f: impl FnOnce(&mut ManualTimerState) -> R) -> R {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut state)
    }

    /// Moves the clock forward and returns every alarm that became due
    pub fn advance(&self, by: Duration) -> Vec<Alarm> {
        self.with_state(|state| {
            state.now_millis += by.as_millis() as u64;
            let now = state.now_millis;

            let due = state
                .pending
                .iter()
                .filter(|(_, (deadline, _))| *deadline <= now)
                .map(|(timer, (deadline, _))| (*deadline, *timer))
                .sorted()
                .collect_vec();

            due.into_iter()
                .filter_map(|(_, timer)| state.pending.remove(&timer))
                .map(|(_, alarm)| alarm)
                .collect_vec()
        })
    }

    /// Alarms still waiting to fire, with their deadlines in epoch milliseconds
    pub fn pending(&self) -> Vec<(u64, Alarm)> {
        self.with_state(|state| {
            state
                .pending
                .iter()
                .sorted_by_key(|(timer, (deadline, _))| (*deadline, **timer))
                .map(|(_, entry)| *entry)
                .collect_vec()
        })
    }
}

impl Clock for ManualTimer {
    fn now_millis(&self) -> u64 {
        self.with_state(|state| state.now_millis)
    }
}

impl Scheduler for ManualTimer {
    fn schedule(&mut self, alarm: Alarm, delay: Duration) -> TimerId {
        self.with_state(|state| {
            let timer = TimerId(state.next_timer);
            state.next_timer += 1;
            let deadline = state.now_millis + delay.as_millis() as u64;
            state.pending.insert(timer, (deadline, alarm));
            timer
        })
    }

    fn cancel(&mut self, timer: TimerId) {
        self.with_state(|state| {
            state.pending.remove(&timer);
        });
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;

    fn alarm(generation: u64) -> Alarm {
        Alarm {
            room: RoomId::new(),
            generation: Generation(generation),
        }
    }

    #[test]
    fn test_generation_increases() {
        let first = Generation::default();
        assert!(first.next() > first);
        assert_eq!(first.next().next(), Generation(2));
    }

    #[test]
    fn test_system_clock_is_after_2020() {
        assert!(SystemClock.now_millis() > 1_577_836_800_000);
    }

    #[test]
    fn test_manual_timer_fires_in_order() {
        let mut timer = ManualTimer::starting_at(1_000);
        let late = alarm(2);
        let early = alarm(1);
        timer.schedule(late, Duration::from_secs(10));
        timer.schedule(early, Duration::from_secs(5));

        assert!(timer.advance(Duration::from_secs(4)).is_empty());
        assert_eq!(timer.advance(Duration::from_secs(10)), vec![early, late]);
        assert_eq!(timer.now_millis(), 15_000);
        assert!(timer.pending().is_empty());
    }

    #[test]
    fn test_manual_timer_cancel() {
        let mut timer = ManualTimer::default();
        let id = timer.schedule(alarm(1), Duration::from_secs(1));
        timer.cancel(id);
        timer.cancel(id);

        assert!(timer.advance(Duration::from_secs(2)).is_empty());
    }

    #[test]
    fn test_manual_timer_clones_share_clock() {
        let timer = ManualTimer::starting_at(0);
        let mut other = timer.clone();
        let scheduled = alarm(3);
        other.schedule(scheduled, Duration::from_millis(250));

        assert_eq!(timer.pending(), vec![(250, scheduled)]);
        assert_eq!(timer.advance(Duration::from_millis(250)), vec![scheduled]);
        assert_eq!(other.now_millis(), 250);
    }
}
