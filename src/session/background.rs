//! Background mode: the session runs on a dedicated worker thread

use futures::Stream;
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::JoinHandle;
use tokio::sync::{mpsc, watch};
use tokio_stream::wrappers::{ReceiverStream, WatchStream};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::Session;
use crate::transport::Transport;
use crate::{DecodedFrame, Result, ScrcpyError, SessionOutcome, SessionState};

impl<T: Transport> Session<T> {
    /// Run connect, handshake and the stream loop on a worker thread.
    ///
    /// The worker owns its own current-thread runtime, so this works with or
    /// without an ambient tokio runtime. Frames are delivered over a bounded
    /// channel of `frame_buffer` entries; take it with
    /// [`SessionHandle::take_frames`].
    pub fn spawn(self) -> Result<SessionHandle> {
        let state = self.state();
        if state != SessionState::Created {
            return Err(ScrcpyError::InvalidState { operation: "spawn", state });
        }

        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| ScrcpyError::transport_failed_with_source("cannot build session runtime", Box::new(e)))?;

        let (tx, rx) = mpsc::channel(self.config.frame_buffer);
        let states = self.state.subscribe();
        let outcome = self.outcome.subscribe();
        let cancel = self.cancel.clone();
        let transport = self.transport.describe();

        let worker = std::thread::Builder::new()
            .name("scrcpy-session".to_string())
            .spawn(move || {
                runtime.block_on(self.run(tx));
                debug!("Session worker exiting");
            })
            .map_err(|e| ScrcpyError::transport_failed_with_source("cannot spawn session worker", Box::new(e)))?;

        info!(%transport, "Session worker started");

        Ok(SessionHandle {
            states,
            outcome,
            cancel,
            frames: Mutex::new(Some(FrameReceiver { rx })),
            worker: Mutex::new(Some(worker)),
        })
    }
}

/// Control handle for a session running in the background.
///
/// `stop()`, `join()` and `wait()` take `&self`, so the handle can be shared
/// across threads behind an `Arc`. Dropping the handle requests a stop without
/// waiting for the worker.
#[derive(Debug)]
pub struct SessionHandle {
    states: watch::Receiver<SessionState>,
    outcome: watch::Receiver<Option<SessionOutcome>>,
    cancel: CancellationToken,
    frames: Mutex<Option<FrameReceiver>>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl SessionHandle {
    /// Take the frame receiver. Returns `None` after the first call.
    ///
    /// Dropping the receiver stops the session. A receiver that was never
    /// taken is dropped by [`wait`](Self::wait) and [`join`](Self::join).
    pub fn take_frames(&mut self) -> Option<FrameReceiver> {
        self.frames.get_mut().unwrap_or_else(PoisonError::into_inner).take()
    }

    /// Request a graceful stop. Idempotent, callable from any thread.
    pub fn stop(&self) {
        if !self.cancel.is_cancelled() {
            info!("Stop requested for background session");
        }
        self.cancel.cancel();
    }

    /// Current lifecycle state
    pub fn state(&self) -> SessionState {
        *self.states.borrow()
    }

    /// Stream of lifecycle states, starting with the current one
    pub fn state_updates(&self) -> impl Stream<Item = SessionState> + 'static {
        WatchStream::new(self.states.clone())
    }

    /// Terminal outcome if the session already ended
    pub fn try_outcome(&self) -> Option<SessionOutcome> {
        self.outcome.borrow().clone()
    }

    /// Wait asynchronously for the session to reach `Closed` or `Failed`.
    ///
    /// Frames that were never taken are discarded, so a worker blocked on a
    /// full channel can observe the stop and wind down.
    pub async fn wait(&self) -> SessionOutcome {
        let untaken = self.frames.lock().unwrap_or_else(PoisonError::into_inner).take();
        if untaken.is_some() {
            debug!("Discarding untaken frame receiver");
        }
        drop(untaken);

        let mut outcome = self.outcome.clone();
        if let Ok(reached) = outcome.wait_for(Option::is_some).await {
            if let Some(outcome) = reached.as_ref() {
                return outcome.clone();
            }
        }

        // Worker went away without publishing; check for a last value
        match self.outcome.borrow().clone() {
            Some(outcome) => outcome,
            None => {
                warn!("Session worker exited without an outcome");
                SessionOutcome::Failed(Arc::new(ScrcpyError::transport_failed(
                    "session worker exited without reporting an outcome",
                )))
            }
        }
    }

    /// Block until the session ends and its worker thread exited.
    ///
    /// Repeatable: every call returns the same outcome. Do not call from inside
    /// an async task; use [`wait`](Self::wait) there.
    pub fn join(&self) -> SessionOutcome {
        let outcome = futures::executor::block_on(self.wait());

        let worker = self.worker.lock().unwrap_or_else(PoisonError::into_inner).take();
        if let Some(worker) = worker {
            if worker.join().is_err() {
                warn!("Session worker panicked");
            }
        }

        outcome
    }
}

impl Drop for SessionHandle {
    fn drop(&mut self) {
        debug!("Dropping session handle");
        self.cancel.cancel();
    }
}

/// Receiving end of a background session's frames.
///
/// Yields `Ok(frame)` in emission order and at most one `Err` for the fatal
/// error, then ends. Iterate it from a plain thread, or call
/// [`into_stream`](Self::into_stream) inside async code.
#[derive(Debug)]
pub struct FrameReceiver {
    rx: mpsc::Receiver<Result<DecodedFrame>>,
}

impl FrameReceiver {
    /// Receive the next frame asynchronously
    pub async fn recv(&mut self) -> Option<Result<DecodedFrame>> {
        self.rx.recv().await
    }

    /// Convert into a `Stream`
    pub fn into_stream(self) -> ReceiverStream<Result<DecodedFrame>> {
        ReceiverStream::new(self.rx)
    }
}

impl Iterator for FrameReceiver {
    type Item = Result<DecodedFrame>;

    /// Blocks the calling thread. Panics if called from within an async runtime.
    fn next(&mut self) -> Option<Self::Item> {
        self.rx.blocking_recv()
    }
}
