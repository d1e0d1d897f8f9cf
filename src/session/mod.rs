//! Session controller: connect, handshake, stream, tear down.
//!
//! A [`Session`] owns one connection and one decoder session for its whole
//! lifetime. Three ways to drive it:
//!
//! - **Async**: [`Session::start`] then [`Session::next_frame`] or [`Session::frames`]
//! - **Blocking**: [`Session::blocking`] wraps the session with its own runtime
//! - **Background**: [`Session::spawn`] runs everything on a worker thread and
//!   hands back a [`SessionHandle`] with `stop()` and `join()`
//!
//! Stopping is cooperative. The stop flag is checked between packets and never
//! interrupts a read in progress, so a stalled connection delays shutdown until
//! its read returns.
//!
//! ```rust,no_run
//! use scrcpy_stream::decoder::VideoDecoder;
//! use scrcpy_stream::{ClientConfig, DecoderError, HandshakeInfo, Scrcpy};
//!
//! # fn decoder_for(info: &HandshakeInfo) -> Result<Box<dyn VideoDecoder>, DecoderError> { unimplemented!() }
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> scrcpy_stream::Result<()> {
//! let mut session = Scrcpy::session(ClientConfig::default(), decoder_for)?;
//! let info = session.start().await?;
//! println!("{} streaming {} at {}x{}", info.device_name, info.codec, info.width, info.height);
//!
//! while let Some(frame) = session.next_frame().await? {
//!     println!("frame pts={:?}", frame.pts);
//! }
//! # Ok(())
//! # }
//! ```

use futures::Stream;
use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::{mpsc, watch};
use tokio_stream::wrappers::WatchStream;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::decoder::{DecoderAdapter, DecoderFactory};
use crate::demux::FrameDemuxer;
use crate::protocol::{HandshakeInfo, ProtocolVersion};
use crate::transport::Transport;
use crate::transports::MeteredConnection;
use crate::{
    ClientConfig, DecodedFrame, Result, ScrcpyError, SessionOutcome, SessionState, SessionStats,
};

mod background;
mod blocking;

pub use background::{FrameReceiver, SessionHandle};
pub use blocking::{BlockingFrames, BlockingSession};

#[cfg(test)]
mod tests;

/// Resources held while streaming. Dropped exactly once, on close or failure.
struct Active<C> {
    demuxer: FrameDemuxer<MeteredConnection<C>>,
    decoder: DecoderAdapter,
    /// End of stream was reached and the decoder flushed
    drained: bool,
}

/// Cloneable handle that requests a stop from another thread or task.
#[derive(Debug, Clone)]
pub struct StopHandle {
    cancel: CancellationToken,
}

impl StopHandle {
    /// Request a graceful stop. Idempotent.
    pub fn stop(&self) {
        self.cancel.cancel();
    }

    /// Whether a stop was requested
    pub fn is_stopped(&self) -> bool {
        self.cancel.is_cancelled()
    }
}

/// One streaming session against a scrcpy server.
pub struct Session<T: Transport> {
    config: ClientConfig,
    version: ProtocolVersion,
    transport: T,
    decoders: Arc<dyn DecoderFactory>,

    state: watch::Sender<SessionState>,
    outcome: watch::Sender<Option<SessionOutcome>>,
    cancel: CancellationToken,

    handshake: Option<HandshakeInfo>,
    active: Option<Active<T::Connection>>,
    pending: VecDeque<DecodedFrame>,

    stats: SessionStats,
    bytes: Arc<AtomicU64>,
}

impl<T: Transport> Session<T> {
    /// Create a session in the `Created` state.
    ///
    /// Validates the configuration and resolves the protocol version; nothing
    /// is connected until [`start`](Self::start).
    pub fn new<D>(config: ClientConfig, transport: T, decoders: D) -> Result<Self>
    where
        D: DecoderFactory,
    {
        config.validate()?;
        let version = config.protocol_version()?;

        let (state, _) = watch::channel(SessionState::Created);
        let (outcome, _) = watch::channel(None);

        Ok(Self {
            config,
            version,
            transport,
            decoders: Arc::new(decoders),
            state,
            outcome,
            cancel: CancellationToken::new(),
            handshake: None,
            active: None,
            pending: VecDeque::new(),
            stats: SessionStats::default(),
            bytes: Arc::new(AtomicU64::new(0)),
        })
    }

    /// Current lifecycle state
    pub fn state(&self) -> SessionState {
        *self.state.borrow()
    }

    /// Stream of lifecycle states, starting with the current one
    pub fn state_updates(&self) -> impl Stream<Item = SessionState> + 'static {
        WatchStream::new(self.state.subscribe())
    }

    /// Handshake parameters, once started
    pub fn handshake(&self) -> Option<&HandshakeInfo> {
        self.handshake.as_ref()
    }

    /// Running counters
    pub fn stats(&self) -> SessionStats {
        let skipped_units = match &self.active {
            Some(active) => active.decoder.skipped_units(),
            None => self.stats.skipped_units,
        };
        SessionStats { bytes_received: self.bytes.load(Ordering::Relaxed), skipped_units, ..self.stats }
    }

    /// Terminal outcome, once the session reached `Closed` or `Failed`
    pub fn outcome(&self) -> Option<SessionOutcome> {
        self.outcome.borrow().clone()
    }

    /// Configuration this session was created with
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Request a graceful stop.
    ///
    /// Observed before the next packet is read. Idempotent.
    pub fn stop(&self) {
        if !self.cancel.is_cancelled() {
            info!(state = ?self.state(), "Stop requested");
        }
        self.cancel.cancel();
    }

    /// Handle for stopping this session from elsewhere
    pub fn stop_handle(&self) -> StopHandle {
        StopHandle { cancel: self.cancel.clone() }
    }

    /// Connect, read the handshake and open the decoder.
    ///
    /// Moves `Created -> Connecting -> Handshaking -> Streaming`. On failure the
    /// session is `Failed` and the error is also kept as its outcome.
    pub async fn start(&mut self) -> Result<&HandshakeInfo> {
        let state = self.state();
        if state != SessionState::Created {
            return Err(ScrcpyError::InvalidState { operation: "start", state });
        }

        match self.open().await {
            Ok((info, active)) => {
                self.active = Some(active);
                self.transition(SessionState::Streaming);
                info!(
                    device = %info.device_name,
                    codec = %info.codec,
                    width = info.width,
                    height = info.height,
                    "Session streaming"
                );
                Ok(self.handshake.insert(info))
            }
            Err(e) => Err(self.fail(e)),
        }
    }

    async fn open(&mut self) -> Result<(HandshakeInfo, Active<T::Connection>)> {
        self.transition(SessionState::Connecting);
        info!(transport = %self.transport.describe(), "Connecting to video socket");

        let connection = self.transport.connect().await?;
        let mut connection = MeteredConnection::new(connection, Arc::clone(&self.bytes));

        self.transition(SessionState::Handshaking);
        let info = HandshakeInfo::read_from(&mut connection, &self.version).await?;

        if let Some(hint) = self.config.codec_hint {
            if hint != info.codec {
                warn!(requested = %hint, negotiated = %info.codec, "Server chose a different codec than requested");
            }
        }

        let decoder = DecoderAdapter::new(Arc::clone(&self.decoders), &info)?;
        let demuxer = FrameDemuxer::new(connection, info.codec, self.version)
            .with_max_payload_len(self.config.max_payload_len);

        Ok((info, Active { demuxer, decoder, drained: false }))
    }

    /// Next decoded frame.
    ///
    /// Returns:
    /// - `Ok(Some(frame))` - frames come out in decoder emission order
    /// - `Ok(None)` - the stream finished, was stopped, or the session already ended
    /// - `Err(e)` - the first fatal error; the session is now `Failed`
    pub async fn next_frame(&mut self) -> Result<Option<DecodedFrame>> {
        loop {
            if let Some(frame) = self.pending.pop_front() {
                self.stats.frames += 1;
                return Ok(Some(frame));
            }

            match self.state() {
                SessionState::Streaming => {}
                SessionState::Closed | SessionState::Failed => return Ok(None),
                state => return Err(ScrcpyError::InvalidState { operation: "read frames", state }),
            }

            if self.cancel.is_cancelled() {
                self.close(true);
                return Ok(None);
            }

            let Some(active) = self.active.as_mut() else {
                return Err(self.fail(ScrcpyError::transport_failed("connection already released")));
            };

            if active.drained {
                self.close(false);
                return Ok(None);
            }

            match active.demuxer.next_access_unit().await {
                Ok(Some(unit)) => {
                    self.stats.access_units += 1;
                    if unit.is_config {
                        self.stats.config_packets += 1;
                    }
                    match active.decoder.submit(unit) {
                        Ok(frames) => self.pending.extend(frames),
                        Err(e) => return Err(self.fail(e.into())),
                    }
                }
                Ok(None) => match active.decoder.flush() {
                    Ok(frames) => {
                        self.pending.extend(frames);
                        active.drained = true;
                    }
                    Err(e) => return Err(self.fail(e.into())),
                },
                Err(e) => return Err(self.fail(e)),
            }
        }
    }

    /// Frames as a stream, ending after the first error.
    ///
    /// Not restartable: once the session ended the stream is empty.
    pub fn frames(&mut self) -> impl Stream<Item = Result<DecodedFrame>> + '_ {
        futures::stream::try_unfold(self, |session| async move {
            Ok(session.next_frame().await?.map(|frame| (frame, session)))
        })
    }

    /// Wrap in a blocking interface backed by a private current-thread runtime
    pub fn blocking(self) -> Result<BlockingSession<T>> {
        BlockingSession::new(self)
    }

    fn transition(&self, next: SessionState) {
        let current = self.state();
        if !current.can_transition_to(next) {
            warn!(from = ?current, to = ?next, "Ignoring invalid state transition");
            return;
        }
        debug!(from = ?current, to = ?next, "Session state changed");
        self.state.send_replace(next);
    }

    /// Drop the connection and the decoder session.
    fn release(&mut self) {
        if let Some(active) = self.active.take() {
            self.stats.skipped_units = active.decoder.skipped_units();
            drop(active);
            debug!("Released connection and decoder");
        }
    }

    fn close(&mut self, stopped: bool) {
        if stopped {
            self.transition(SessionState::Stopping);
        }
        self.release();
        self.transition(SessionState::Closed);

        let stats = self.stats();
        info!(
            frames = stats.frames,
            access_units = stats.access_units,
            bytes = stats.bytes_received,
            skipped = stats.skipped_units,
            "Session closed{}",
            if stopped { " on request" } else { "" }
        );

        let outcome = if stopped { SessionOutcome::Stopped(stats) } else { SessionOutcome::Finished(stats) };
        self.outcome.send_replace(Some(outcome));
    }

    fn fail(&mut self, err: ScrcpyError) -> ScrcpyError {
        self.release();
        self.pending.clear();
        error!(state = ?self.state(), "Session failed: {}", err);

        self.transition(SessionState::Failed);
        self.outcome.send_replace(Some(SessionOutcome::Failed(Arc::new(err.clone()))));
        err
    }

    /// Drive the whole session, pushing frames into `frames`.
    ///
    /// A dropped receiver counts as a stop request.
    pub(crate) async fn run(mut self, frames: mpsc::Sender<Result<DecodedFrame>>) {
        let cancel = self.cancel.clone();

        if let Err(e) = self.start().await {
            tokio::select! {
                _ = cancel.cancelled() => {}
                _ = frames.send(Err(e)) => {}
            }
            return;
        }

        loop {
            let item = match self.next_frame().await {
                Ok(Some(frame)) => Ok(frame),
                Ok(None) => break,
                Err(e) => Err(e),
            };
            let failed = item.is_err();

            tokio::select! {
                biased;
                _ = cancel.cancelled() => {}
                sent = frames.send(item) => {
                    if sent.is_err() {
                        debug!("Frame receiver dropped, stopping session");
                        cancel.cancel();
                    }
                }
            }

            if failed {
                break;
            }
        }
    }
}

impl<T: Transport> std::fmt::Debug for Session<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("transport", &self.transport.describe())
            .field("state", &self.state())
            .field("handshake", &self.handshake)
            .field("pending", &self.pending.len())
            .field("stats", &self.stats())
            .finish()
    }
}
