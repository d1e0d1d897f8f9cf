//! Blocking mode: the caller's thread drives the session

use tokio::runtime::Runtime;

use super::{Session, StopHandle};
use crate::protocol::HandshakeInfo;
use crate::transport::Transport;
use crate::{DecodedFrame, Result, ScrcpyError, SessionOutcome, SessionState, SessionStats};

/// Session driven synchronously on the calling thread.
///
/// Owns a private current-thread runtime. Must not be used from inside an
/// async context; use [`Session`] directly there.
pub struct BlockingSession<T: Transport> {
    runtime: Runtime,
    session: Session<T>,
}

impl<T: Transport> BlockingSession<T> {
    pub(super) fn new(session: Session<T>) -> Result<Self> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| ScrcpyError::transport_failed_with_source("cannot build session runtime", Box::new(e)))?;
        Ok(Self { runtime, session })
    }

    /// Connect and read the handshake, blocking until streaming or failed
    pub fn start(&mut self) -> Result<&HandshakeInfo> {
        self.runtime.block_on(self.session.start())
    }

    /// Block until the next frame, end of stream, or a fatal error
    pub fn next_frame(&mut self) -> Result<Option<DecodedFrame>> {
        self.runtime.block_on(self.session.next_frame())
    }

    /// Iterate decoded frames; ends after the first error
    pub fn frames(&mut self) -> BlockingFrames<'_, T> {
        BlockingFrames { session: self }
    }

    /// Request a stop before the next packet is read
    pub fn stop(&self) {
        self.session.stop();
    }

    /// Handle for stopping this session from another thread
    pub fn stop_handle(&self) -> StopHandle {
        self.session.stop_handle()
    }

    pub fn state(&self) -> SessionState {
        self.session.state()
    }

    pub fn handshake(&self) -> Option<&HandshakeInfo> {
        self.session.handshake()
    }

    pub fn stats(&self) -> SessionStats {
        self.session.stats()
    }

    /// Terminal outcome once the frames ran out
    pub fn outcome(&self) -> Option<SessionOutcome> {
        self.session.outcome()
    }

    /// Give back the async session
    pub fn into_inner(self) -> Session<T> {
        self.session
    }
}

/// Iterator over the frames of a [`BlockingSession`].
pub struct BlockingFrames<'a, T: Transport> {
    session: &'a mut BlockingSession<T>,
}

impl<T: Transport> Iterator for BlockingFrames<'_, T> {
    type Item = Result<DecodedFrame>;

    fn next(&mut self) -> Option<Self::Item> {
        self.session.next_frame().transpose()
    }
}
