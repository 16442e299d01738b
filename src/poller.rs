//! Long-poll bookkeeping: the update cursor, retry backoff and the phase
//! the loop is in. All of it is owned by the run loop and lives only in
//! memory; a restart starts from whatever the platform still holds.

use std::time::Duration;

use tracing::debug;

use crate::config::TelegramConfig;
use crate::platform::{Platform, PlatformError, Update, UpdateId};

/// Highest update id consumed so far
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Cursor(Option<UpdateId>);

impl Cursor {
    pub fn last_seen(&self) -> Option<UpdateId> {
        self.0
    }

    /// Offset for the next poll, so consumed updates are not re-delivered.
    pub fn next_offset(&self) -> Option<UpdateId> {
        self.0.map(|id| id.saturating_add(1))
    }

    /// Move past `id` if it is newer than anything seen. Returns whether the
    /// update is fresh and should be handled.
    pub fn advance(&mut self, id: UpdateId) -> bool {
        match self.0 {
            Some(last) if id <= last => false,
            _ => {
                self.0 = Some(id);
                true
            }
        }
    }
}

/// Doubling retry delay between `floor` and `ceiling`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Backoff {
    floor: Duration,
    ceiling: Duration,
    current: Duration,
}

impl Backoff {
    pub fn new(floor: Duration, ceiling: Duration) -> Self {
        let ceiling = ceiling.max(floor);
        Self {
            floor,
            ceiling,
            current: floor,
        }
    }

    #[allow(dead_code)]
    pub fn current(&self) -> Duration {
        self.current
    }

    /// Delay to wait after this failure; the next one waits twice as long.
    pub fn fail(&mut self) -> Duration {
        let delay = self.current;
        self.current = self
            .current
            .checked_mul(2)
            .map_or(self.ceiling, |doubled| doubled.min(self.ceiling));
        delay
    }

    pub fn reset(&mut self) {
        self.current = self.floor;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopPhase {
    Polling,
    BackingOff(Duration),
    Stopped,
}

/// Everything the polling loop carries from one cycle to the next
#[derive(Debug, Clone, Copy)]
pub struct LoopState {
    pub cursor: Cursor,
    pub backoff: Backoff,
    pub phase: LoopPhase,
}

impl LoopState {
    pub fn new(backoff: Backoff) -> Self {
        Self {
            cursor: Cursor::default(),
            backoff,
            phase: LoopPhase::Polling,
        }
    }

    pub fn on_poll_success(&mut self) {
        self.backoff.reset();
        self.phase = LoopPhase::Polling;
    }

    pub fn on_poll_failure(&mut self) -> Duration {
        let delay = self.backoff.fail();
        self.phase = LoopPhase::BackingOff(delay);
        delay
    }

    pub fn on_backoff_elapsed(&mut self) {
        if let LoopPhase::BackingOff(_) = self.phase {
            self.phase = LoopPhase::Polling;
        }
    }

    pub fn stop(&mut self) {
        self.phase = LoopPhase::Stopped;
    }

    pub fn is_stopped(&self) -> bool {
        self.phase == LoopPhase::Stopped
    }
}

/// One long-poll request from the cursor's position.
pub async fn poll<P>(
    platform: &P,
    cursor: &Cursor,
    config: &TelegramConfig,
) -> Result<Vec<Update>, PlatformError>
where
    P: Platform + ?Sized,
{
    let offset = cursor.next_offset();
    debug!("Polling for updates (offset: {:?})", offset);
    platform
        .get_updates(offset, config.poll_timeout_secs, config.poll_limit)
        .await
}

#[cfg(test)]
mod tests {
    use super::*;

    fn secs(n: u64) -> Duration {
        Duration::from_secs(n)
    }

    #[test]
    fn test_cursor_starts_unset() {
        let cursor = Cursor::default();
        assert_eq!(cursor.last_seen(), None);
        assert_eq!(cursor.next_offset(), None);
    }

    #[test]
    fn test_cursor_tracks_maximum() {
        let mut cursor = Cursor::default();
        let batches: [&[UpdateId]; 3] = [&[10, 11, 12], &[12, 9, 15, 14], &[3, 15]];
        let mut seen_max = 0;

        for batch in batches {
            let before = cursor.last_seen();
            for &id in batch {
                cursor.advance(id);
                seen_max = seen_max.max(id);
            }
            assert_eq!(cursor.last_seen(), Some(seen_max));
            assert!(cursor.last_seen() >= before);
        }
        assert_eq!(cursor.next_offset(), Some(16));
    }

    #[test]
    fn test_cursor_rejects_duplicates_and_regressions() {
        let mut cursor = Cursor::default();
        assert!(cursor.advance(5));
        assert!(!cursor.advance(5));
        assert!(!cursor.advance(4));
        assert!(cursor.advance(6));
        assert_eq!(cursor.last_seen(), Some(6));
    }

    #[test]
    fn test_cursor_accepts_zero_first() {
        let mut cursor = Cursor::default();
        assert!(cursor.advance(0));
        assert_eq!(cursor.next_offset(), Some(1));
    }

    #[test]
    fn test_backoff_doubles_to_ceiling() {
        let mut backoff = Backoff::new(secs(1), secs(3));
        assert_eq!(backoff.fail(), secs(1));
        assert_eq!(backoff.fail(), secs(2));
        assert_eq!(backoff.fail(), secs(3));
        assert_eq!(backoff.fail(), secs(3));
    }

    #[test]
    fn test_backoff_reset_returns_to_floor() {
        let mut backoff = Backoff::new(secs(1), secs(60));
        backoff.fail();
        backoff.fail();
        backoff.fail();
        assert_eq!(backoff.current(), secs(8));

        backoff.reset();
        assert_eq!(backoff.fail(), secs(1));
    }

    #[test]
    fn test_backoff_ceiling_below_floor() {
        let mut backoff = Backoff::new(secs(5), secs(2));
        assert_eq!(backoff.fail(), secs(5));
        assert_eq!(backoff.fail(), secs(5));
    }

    #[test]
    fn test_loop_state_transitions() {
        let mut state = LoopState::new(Backoff::new(secs(1), secs(60)));
        assert_eq!(state.phase, LoopPhase::Polling);

        assert_eq!(state.on_poll_failure(), secs(1));
        assert_eq!(state.phase, LoopPhase::BackingOff(secs(1)));
        state.on_backoff_elapsed();
        assert_eq!(state.phase, LoopPhase::Polling);

        assert_eq!(state.on_poll_failure(), secs(2));
        assert_eq!(state.on_poll_failure(), secs(4));
        state.on_poll_success();
        assert_eq!(state.phase, LoopPhase::Polling);
        assert_eq!(state.on_poll_failure(), secs(1));

        state.stop();
        state.on_backoff_elapsed();
        assert!(state.is_stopped());
    }
}
