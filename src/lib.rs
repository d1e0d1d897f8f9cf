//! Async client core for the scrcpy video socket.
//!
//! scrcpy-stream connects to a running scrcpy server, reads the stream handshake,
//! frames the length-prefixed packet stream into access units and feeds them to
//! a pluggable decoder, handing decoded frames back to the caller in order.
//!
//! # Features
//!
//! - **Cancel-safe demuxing**: partial headers and payloads survive dropped reads
//! - **Pluggable decoders**: bring your own H.264, H.265 or AV1 backend
//! - **Three interaction modes**: async, blocking, and a background worker thread
//! - **Explicit configuration**: YAML-loadable [`ClientConfig`], no hidden defaults
//!
//! Deploying the server with adb and setting up the port forward happen
//! outside this crate.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use scrcpy_stream::decoder::VideoDecoder;
//! use scrcpy_stream::{ClientConfig, DecoderError, HandshakeInfo, Scrcpy, SessionOutcome};
//!
//! # fn decoder_for(info: &HandshakeInfo) -> Result<Box<dyn VideoDecoder>, DecoderError> { unimplemented!() }
//! fn main() -> scrcpy_stream::Result<()> {
//!     let config = ClientConfig::load("scrcpy.yaml")?;
//!     let mut handle = Scrcpy::spawn(config, decoder_for)?;
//!
//!     for frame in handle.take_frames().into_iter().flatten() {
//!         let frame = frame?;
//!         println!("{}x{} pts={:?}", frame.width, frame.height, frame.pts);
//!     }
//!
//!     match handle.join() {
//!         SessionOutcome::Failed(err) => eprintln!("session failed: {}", err),
//!         outcome => println!("session ended: {:?}", outcome.stats()),
//!     }
//!     Ok(())
//! }
//! ```

// Core types and error handling
pub mod config;
mod error;
#[cfg_attr(any(test, feature = "benchmark"), path = "test_utils.rs")]
#[cfg(any(test, feature = "benchmark"))]
pub mod test_utils;
pub mod types;

// Wire protocol and stream processing
pub mod decoder;
pub mod demux;
pub mod protocol;

// Connections and lifecycle
pub mod session;
pub mod transport;
pub mod transports;

// Core exports
pub use config::ClientConfig;
pub use error::*;
pub use types::*;

// Main API exports
pub use decoder::{DecoderFactory, VideoDecoder};
pub use demux::FrameDemuxer;
pub use protocol::{HandshakeInfo, ProtocolVersion};
pub use session::{BlockingSession, FrameReceiver, Session, SessionHandle, StopHandle};
pub use transport::Transport;
pub use transports::{ReplayTransport, TcpTransport};

/// Unified entry point for scrcpy video sessions.
///
/// Builds sessions over the shipped transports. For custom transports use
/// [`Session::new`] directly.
///
/// # Examples
///
/// ## Live device (adb forward)
/// ```rust,no_run
/// use scrcpy_stream::decoder::VideoDecoder;
/// use scrcpy_stream::{ClientConfig, DecoderError, HandshakeInfo, Scrcpy};
///
/// # fn decoder_for(info: &HandshakeInfo) -> Result<Box<dyn VideoDecoder>, DecoderError> { unimplemented!() }
/// #[tokio::main(flavor = "current_thread")]
/// async fn main() -> scrcpy_stream::Result<()> {
///     let mut session = Scrcpy::session(ClientConfig::default(), decoder_for)?;
///     session.start().await?;
///     while let Some(_frame) = session.next_frame().await? {
///         // render frame...
///     }
///     Ok(())
/// }
/// ```
///
/// ## Recorded capture
/// ```rust,no_run
/// use scrcpy_stream::decoder::VideoDecoder;
/// use scrcpy_stream::{ClientConfig, DecoderError, HandshakeInfo, Scrcpy};
///
/// # fn decoder_for(info: &HandshakeInfo) -> Result<Box<dyn VideoDecoder>, DecoderError> { unimplemented!() }
/// fn main() -> scrcpy_stream::Result<()> {
///     let mut session = Scrcpy::replay("capture.bin", ClientConfig::default(), decoder_for)?.blocking()?;
///     session.start()?;
///     let frames = session.frames().count();
///     println!("{} frames", frames);
///     Ok(())
/// }
/// ```
pub struct Scrcpy;

impl Scrcpy {
    /// Create a session against the server forwarded to `config.host:config.port`.
    ///
    /// Nothing is connected until the session is started.
    ///
    /// # Errors
    ///
    /// Returns a `Config` error if the configuration does not validate or names
    /// an unknown server version.
    pub fn session<D>(config: ClientConfig, decoders: D) -> Result<Session<TcpTransport>>
    where
        D: DecoderFactory,
    {
        let transport = TcpTransport::from_config(&config);
        Session::new(config, transport, decoders)
    }

    /// Create a session replaying a recorded video socket capture.
    pub fn replay<P, D>(path: P, config: ClientConfig, decoders: D) -> Result<Session<ReplayTransport>>
    where
        P: AsRef<std::path::Path>,
        D: DecoderFactory,
    {
        Session::new(config, ReplayTransport::new(path), decoders)
    }

    /// Connect to the forwarded server and stream on a background worker thread.
    pub fn spawn<D>(config: ClientConfig, decoders: D) -> Result<SessionHandle>
    where
        D: DecoderFactory,
    {
        Self::session(config, decoders)?.spawn()
    }
}
