//! Sleep timer countdown.  Pure state; the one-second tick loop lives in the
//! core, which starts it when `arm` says so and stops it on disarm/expiry.

use gly_proto::protocol::{TimerSnapshot, TimerState};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArmOutcome {
    /// Timer is off.  `was_armed` tells whether a running loop must be stopped.
    Disarmed { was_armed: bool },
    /// Newly armed; the caller starts the tick loop.
    Started,
    /// Already counting; remaining time replaced, existing loop keeps going.
    Replaced,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tick {
    Idle,
    Running(u32),
    /// Reached zero on this tick.  The timer is now off.
    Expired,
}

#[derive(Debug, Default)]
pub struct SleepTimer {
    remaining_secs: Option<u32>,
}

impl SleepTimer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn arm(&mut self, minutes: u32) -> ArmOutcome {
        let was_armed = self.remaining_secs.is_some();
        if minutes == 0 {
            self.remaining_secs = None;
            return ArmOutcome::Disarmed { was_armed };
        }
        self.remaining_secs = Some(minutes.saturating_mul(60));
        if was_armed {
            ArmOutcome::Replaced
        } else {
            ArmOutcome::Started
        }
    }

    pub fn tick(&mut self) -> Tick {
        match self.remaining_secs {
            None => Tick::Idle,
            Some(secs) if secs <= 1 => {
                self.remaining_secs = None;
                Tick::Expired
            }
            Some(secs) => {
                self.remaining_secs = Some(secs - 1);
                Tick::Running(secs - 1)
            }
        }
    }

    pub fn state(&self) -> TimerState {
        match self.remaining_secs {
            Some(remaining_secs) => TimerState::Armed { remaining_secs },
            None => TimerState::Off,
        }
    }

    pub fn snapshot(&self) -> TimerSnapshot {
        TimerSnapshot::from_state(self.state())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_arm_zero_always_turns_off() {
        let mut timer = SleepTimer::new();
        assert_eq!(timer.arm(0), ArmOutcome::Disarmed { was_armed: false });
        assert_eq!(timer.state(), TimerState::Off);

        timer.arm(30);
        timer.tick();
        assert_eq!(timer.arm(0), ArmOutcome::Disarmed { was_armed: true });
        assert_eq!(timer.state(), TimerState::Off);
        assert_eq!(timer.snapshot().display, "");
    }

    #[test]
    fn test_rearm_replaces_without_stacking() {
        let mut timer = SleepTimer::new();
        assert_eq!(timer.arm(15), ArmOutcome::Started);
        assert_eq!(timer.arm(60), ArmOutcome::Replaced);
        assert_eq!(timer.state(), TimerState::Armed { remaining_secs: 3600 });
        assert_eq!(timer.snapshot().display, "60:00");
    }

    #[test]
    fn test_counts_down_and_expires_once() {
        let mut timer = SleepTimer::new();
        timer.arm(15);
        let mut expired = 0;
        for i in 1..=900u32 {
            match timer.tick() {
                Tick::Running(left) => assert_eq!(left, 900 - i),
                Tick::Expired => expired += 1,
                Tick::Idle => panic!("idle while armed at tick {}", i),
            }
        }
        assert_eq!(expired, 1);
        assert_eq!(timer.tick(), Tick::Idle);
        assert_eq!(timer.state(), TimerState::Off);
    }

    #[test]
    fn test_display_tracks_ticks() {
        let mut timer = SleepTimer::new();
        timer.arm(1);
        timer.tick();
        assert_eq!(timer.snapshot().display, "00:59");
    }
}
