//! Session lifecycle state and statistics

use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::ScrcpyError;

/// Lifecycle state of a session.
///
/// Transitions: `Created -> Connecting -> Handshaking -> Streaming -> (Stopping ->) Closed`,
/// with `Failed` reachable from any non-terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SessionState {
    Created,
    Connecting,
    Handshaking,
    Streaming,
    Stopping,
    Closed,
    Failed,
}

impl SessionState {
    /// Check if the session reached an absorbing state
    pub fn is_terminal(self) -> bool {
        matches!(self, SessionState::Closed | SessionState::Failed)
    }

    /// Check if a transition from `self` to `next` is allowed
    pub fn can_transition_to(self, next: SessionState) -> bool {
        use SessionState::*;
        match (self, next) {
            (Created, Connecting) => true,
            (Connecting, Handshaking) => true,
            (Handshaking, Streaming) => true,
            (Streaming, Stopping) | (Streaming, Closed) => true,
            (Stopping, Closed) => true,
            (from, Failed) => !from.is_terminal(),
            _ => false,
        }
    }
}

/// Running counters for one session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionStats {
    /// Bytes read from the connection, handshake included
    pub bytes_received: u64,
    /// Access units framed by the demuxer, config packets included
    pub access_units: u64,
    /// Config packets among `access_units`
    pub config_packets: u64,
    /// Frames emitted by the decoder
    pub frames: u64,
    /// Access units skipped because the decoder reported a corrupt payload
    pub skipped_units: u64,
}

/// Terminal result of a session.
///
/// Cheap to clone so `join()` can hand out the same result any number of times.
#[derive(Debug, Clone)]
pub enum SessionOutcome {
    /// The server closed the stream at a packet boundary
    Finished(SessionStats),
    /// `stop()` was requested or the frame receiver went away
    Stopped(SessionStats),
    /// First fatal error encountered
    Failed(Arc<ScrcpyError>),
}

impl SessionOutcome {
    /// The state the session ended in
    pub fn state(&self) -> SessionState {
        match self {
            SessionOutcome::Finished(_) | SessionOutcome::Stopped(_) => SessionState::Closed,
            SessionOutcome::Failed(_) => SessionState::Failed,
        }
    }

    /// Stats for sessions that closed cleanly
    pub fn stats(&self) -> Option<&SessionStats> {
        match self {
            SessionOutcome::Finished(stats) | SessionOutcome::Stopped(stats) => Some(stats),
            SessionOutcome::Failed(_) => None,
        }
    }

    /// The fatal error, if the session failed
    pub fn error(&self) -> Option<&ScrcpyError> {
        match self {
            SessionOutcome::Failed(err) => Some(err),
            _ => None,
        }
    }

    /// Convert into a `Result`, keeping stats on success
    pub fn into_result(self) -> Result<SessionStats, Arc<ScrcpyError>> {
        match self {
            SessionOutcome::Finished(stats) | SessionOutcome::Stopped(stats) => Ok(stats),
            SessionOutcome::Failed(err) => Err(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn happy_path_transitions() {
        use SessionState::*;
        let path = [Created, Connecting, Handshaking, Streaming, Stopping, Closed];
        for pair in path.windows(2) {
            assert!(pair[0].can_transition_to(pair[1]), "{:?} -> {:?}", pair[0], pair[1]);
        }
        assert!(Streaming.can_transition_to(Closed));
    }

    #[test]
    fn failed_is_reachable_only_from_live_states() {
        use SessionState::*;
        for state in [Created, Connecting, Handshaking, Streaming, Stopping] {
            assert!(state.can_transition_to(Failed));
        }
        assert!(!Closed.can_transition_to(Failed));
        assert!(!Failed.can_transition_to(Failed));
        assert!(!Failed.can_transition_to(Closed));
        assert!(!Created.can_transition_to(Streaming));
    }

    #[test]
    fn outcome_reports_terminal_state() {
        let stats = SessionStats { frames: 3, ..Default::default() };
        assert_eq!(SessionOutcome::Finished(stats).state(), SessionState::Closed);
        assert_eq!(SessionOutcome::Stopped(stats).stats(), Some(&stats));

        let failed = SessionOutcome::Failed(Arc::new(ScrcpyError::transport_failed("reset")));
        assert_eq!(failed.state(), SessionState::Failed);
        assert!(failed.error().is_some());
        assert!(failed.into_result().is_err());
    }
}
