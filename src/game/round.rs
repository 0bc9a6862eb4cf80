//! Round lifecycle: phases, timers and win verdicts

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::time::Instant;

use crate::config::ArenaTuning;

use super::ConnId;

/// Countdown timer period
const COUNTDOWN_PERIOD: Duration = Duration::from_secs(1);

/// Round phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoundPhase {
    /// Lobby, players may join and request a start
    Waiting,
    /// Counting down to the round start
    Countdown,
    /// Round in progress
    Running,
    /// Round over, waiting to return to the lobby
    Ended,
}

impl RoundPhase {
    /// Phases in which the world is simulated and broadcast
    pub fn is_live(self) -> bool {
        matches!(self, RoundPhase::Running | RoundPhase::Ended)
    }
}

/// A single pending deadline; arming replaces whatever was pending.
#[derive(Debug, Clone, Copy, Default)]
pub struct Timer {
    deadline: Option<Instant>,
}

impl Timer {
    pub fn arm(&mut self, at: Instant) {
        self.deadline = Some(at);
    }

    pub fn cancel(&mut self) {
        self.deadline = None;
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    #[cfg(test)]
    pub fn is_armed(&self) -> bool {
        self.deadline.is_some()
    }

    /// Disarm and return the deadline if it has passed
    fn take_due(&mut self, now: Instant) -> Option<Instant> {
        match self.deadline {
            Some(at) if at <= now => self.deadline.take(),
            _ => None,
        }
    }
}

/// How a round finished
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoundEnd {
    /// Exactly one player left standing
    Winner(ConnId),
    /// Nobody left standing
    Draw,
    /// Round timer ran out; never has a winner
    Timeout,
}

/// Something the round clock wants the session to act on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoundEvent {
    /// Countdown decremented; zero means the round starts now
    Countdown(u32),
    /// Round timer expired while running
    TimedOut,
    /// Post-round pause is over
    ResetDue,
}

/// Process-wide round record with its timers
#[derive(Debug)]
pub struct Round {
    phase: RoundPhase,
    countdown: u32,
    started_at_ms: Option<u64>,
    countdown_timer: Timer,
    round_timer: Timer,
    reset_timer: Timer,
    tuning: ArenaTuning,
}

impl Round {
    pub fn new(tuning: ArenaTuning) -> Self {
        Self {
            phase: RoundPhase::Waiting,
            countdown: 0,
            started_at_ms: None,
            countdown_timer: Timer::default(),
            round_timer: Timer::default(),
            reset_timer: Timer::default(),
            tuning,
        }
    }

    pub fn phase(&self) -> RoundPhase {
        self.phase
    }

    /// Seconds left, only while counting down
    pub fn countdown(&self) -> Option<u32> {
        (self.phase == RoundPhase::Countdown).then_some(self.countdown)
    }

    /// Unix millis at which the running round times out
    pub fn round_ends_at(&self) -> Option<u64> {
        if self.phase != RoundPhase::Running {
            return None;
        }
        self.started_at_ms
            .map(|start| start + self.tuning.round_duration.as_millis() as u64)
    }

    pub fn can_start(&self, player_count: usize) -> bool {
        self.phase == RoundPhase::Waiting && player_count >= self.tuning.min_players
    }

    /// `waiting -> countdown`; false (and no change) unless a start is allowed
    pub fn begin_countdown(&mut self, player_count: usize, now: Instant) -> bool {
        if !self.can_start(player_count) {
            return false;
        }
        self.phase = RoundPhase::Countdown;
        self.countdown = self.tuning.countdown_secs;
        self.countdown_timer.arm(now + COUNTDOWN_PERIOD);
        true
    }

    /// `countdown -> running`
    pub fn begin_running(&mut self, now: Instant, wall_ms: u64) {
        self.phase = RoundPhase::Running;
        self.countdown = 0;
        self.countdown_timer.cancel();
        self.started_at_ms = Some(wall_ms);
        self.round_timer.arm(now + self.tuning.round_duration);
    }

    /// `running -> ended`; false if the round was not running
    pub fn finish(&mut self, end: RoundEnd, now: Instant) -> bool {
        if self.phase != RoundPhase::Running {
            return false;
        }
        self.phase = RoundPhase::Ended;
        self.round_timer.cancel();
        self.started_at_ms = None;

        let delay = match end {
            RoundEnd::Winner(_) => self.tuning.win_reset_delay,
            RoundEnd::Draw | RoundEnd::Timeout => self.tuning.draw_reset_delay,
        };
        self.reset_timer.arm(now + delay);
        true
    }

    /// Back to the lobby from any phase, disarming every timer
    pub fn reset(&mut self) {
        self.phase = RoundPhase::Waiting;
        self.countdown = 0;
        self.started_at_ms = None;
        self.countdown_timer.cancel();
        self.round_timer.cancel();
        self.reset_timer.cancel();
    }

    /// Earliest armed deadline
    pub fn next_deadline(&self) -> Option<Instant> {
        [
            self.countdown_timer.deadline(),
            self.round_timer.deadline(),
            self.reset_timer.deadline(),
        ]
        .into_iter()
        .flatten()
        .min()
    }

    /// Fire at most one due timer.
    ///
    /// Timers whose phase has already been left are dropped instead of fired.
    pub fn poll(&mut self, now: Instant) -> Option<RoundEvent> {
        if let Some(fired) = self.countdown_timer.take_due(now) {
            if self.phase == RoundPhase::Countdown {
                self.countdown = self.countdown.saturating_sub(1);
                if self.countdown > 0 {
                    self.countdown_timer.arm(fired + COUNTDOWN_PERIOD);
                }
                return Some(RoundEvent::Countdown(self.countdown));
            }
        }

        if self.round_timer.take_due(now).is_some() && self.phase == RoundPhase::Running {
            return Some(RoundEvent::TimedOut);
        }

        if self.reset_timer.take_due(now).is_some() && self.phase == RoundPhase::Ended {
            return Some(RoundEvent::ResetDue);
        }

        None
    }

    #[cfg(test)]
    pub(crate) fn timers_armed(&self) -> usize {
        [&self.countdown_timer, &self.round_timer, &self.reset_timer]
            .iter()
            .filter(|t| t.is_armed())
            .count()
    }
}

/// Decide a round from the players still standing; `None` while two or more remain
pub fn judge(alive: &[ConnId]) -> Option<RoundEnd> {
    match alive {
        [] => Some(RoundEnd::Draw),
        [winner] => Some(RoundEnd::Winner(*winner)),
        _ => None,
    }
}
