//! Match lifecycle: upcoming -> live -> completed, plus the reader visibility filter.

use crate::domain::{Match, MatchId, MatchState, Score, TimeMs};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Default window before kick-off during which ordinary readers can see a match.
pub const DEFAULT_LOOKAHEAD_MS: i64 = 24 * 60 * 60 * 1000;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LifecycleError {
    #[error("match has not started yet")]
    NotStarted(MatchId),
}

/// Who is looking at the match list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Viewer {
    #[default]
    Public,
    Admin,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MatchLifecycle {
    lookahead_ms: i64,
}

impl Default for MatchLifecycle {
    fn default() -> Self {
        Self::new(DEFAULT_LOOKAHEAD_MS)
    }
}

impl MatchLifecycle {
    pub fn new(lookahead_ms: i64) -> Self {
        Self { lookahead_ms }
    }

    /// State the match should be in at `now`. Only the clock-driven upcoming -> live step
    /// is applied here; completion needs an explicit result.
    pub fn state_at(&self, m: &Match, now: TimeMs) -> MatchState {
        match m.state {
            MatchState::Upcoming if now >= m.scheduled_at => MatchState::Live,
            state => state,
        }
    }

    /// Apply the clock-driven transition in place. Returns true if the state changed.
    /// Calling it again (or on a live/completed match) is a no-op.
    pub fn advance(&self, m: &mut Match, now: TimeMs) -> bool {
        let next = self.state_at(m, now);
        if next == m.state {
            return false;
        }
        m.state = next;
        true
    }

    /// Record the final score and move to completed.
    ///
    /// Allowed from live, from an upcoming match whose kick-off has passed, and from
    /// completed (a correction).
    ///
    /// # Errors
    /// Returns `LifecycleError::NotStarted` while the match is still in the future.
    pub fn complete(&self, m: &Match, result: Score, now: TimeMs) -> Result<Match, LifecycleError> {
        if self.state_at(m, now) == MatchState::Upcoming {
            return Err(LifecycleError::NotStarted(m.id));
        }
        Ok(Match {
            state: MatchState::Completed,
            result: Some(result),
            ..m.clone()
        })
    }

    /// Display filter. Admins see everything; readers see started matches and those
    /// kicking off within the lookahead window.
    pub fn is_visible(&self, m: &Match, now: TimeMs, viewer: Viewer) -> bool {
        if viewer == Viewer::Admin {
            return true;
        }
        if self.state_at(m, now) != MatchState::Upcoming {
            return true;
        }
        m.scheduled_at <= now.saturating_add_ms(self.lookahead_ms)
    }

    /// Whether the match has kicked off from a reader's point of view.
    pub fn has_started(&self, m: &Match, now: TimeMs) -> bool {
        self.state_at(m, now) != MatchState::Upcoming
    }
}
