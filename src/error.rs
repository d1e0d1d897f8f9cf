//! Error types for the scrcpy video client.
//!
//! All errors implement `std::error::Error` and carry enough context to tell a
//! framing violation apart from a decoder hiccup or a dropped device.
//!
//! ## Error Categories
//!
//! - **Protocol Errors**: The video socket violated the framing contract. Always fatal.
//! - **Decoder Errors**: The external decoder rejected input. Only `CorruptPayload`
//!   is recoverable; the session skips that access unit and keeps streaming.
//! - **Transport Errors**: Connection refused, reset or otherwise broken. Fatal, no
//!   reconnect is attempted.
//! - **Config Errors**: Invalid client configuration.
//! - **Invalid State**: A lifecycle operation was called in the wrong session state.
//!
//! ## Fatal vs Recoverable
//!
//! ```rust
//! use scrcpy_stream::{DecoderError, ProtocolError, ScrcpyError};
//!
//! let truncated = ScrcpyError::from(ProtocolError::TruncatedHeader { received: 5 });
//! assert!(truncated.is_fatal());
//!
//! let corrupt = ScrcpyError::from(DecoderError::corrupt_payload("bad slice header"));
//! assert!(!corrupt.is_fatal());
//! ```

use std::sync::Arc;
use thiserror::Error;

use crate::types::{SessionState, VideoCodec};

/// Result type alias for client operations.
pub type Result<T, E = ScrcpyError> = std::result::Result<T, E>;

/// Main error type for the scrcpy client.
///
/// Cloneable so a session can report the same terminal error from every `join()`.
#[derive(Error, Debug, Clone)]
#[non_exhaustive]
pub enum ScrcpyError {
    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    #[error("Decoder error: {0}")]
    Decoder(#[from] DecoderError),

    #[error("Transport error: {reason}")]
    Transport {
        reason: String,
        #[source]
        source: Option<Arc<dyn std::error::Error + Send + Sync>>,
    },

    #[error("Configuration error in {context}: {details}")]
    Config { context: String, details: String },

    #[error("Cannot {operation} while session is {state:?}")]
    InvalidState { operation: &'static str, state: SessionState },
}

/// Violations of the video socket framing contract.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ProtocolError {
    #[error("connection closed during handshake field '{field}' ({received}/{expected} bytes)")]
    TruncatedHandshake { field: &'static str, expected: usize, received: usize },

    #[error("unknown codec tag {0:#010x}")]
    UnknownCodec(u32),

    #[error("connection closed inside a packet header ({received}/12 bytes)")]
    TruncatedHeader { received: usize },

    #[error("connection closed inside a payload ({received}/{expected} bytes)")]
    TruncatedPayload { expected: usize, received: usize },

    #[error("payload length {length} exceeds limit of {limit} bytes")]
    PayloadTooLarge { length: usize, limit: usize },
}

/// Errors reported by decoder backends and the decoder adapter.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum DecoderError {
    #[error("no decoder available for {0}")]
    UnsupportedCodec(VideoCodec),

    #[error("corrupt payload: {details}")]
    CorruptPayload { details: String },

    #[error("failed to flush decoder: {details}")]
    FlushFailed { details: String },
}

impl DecoderError {
    /// Helper constructor for corrupt payload errors.
    pub fn corrupt_payload(details: impl Into<String>) -> Self {
        DecoderError::CorruptPayload { details: details.into() }
    }

    /// Helper constructor for flush failures.
    pub fn flush_failed(details: impl Into<String>) -> Self {
        DecoderError::FlushFailed { details: details.into() }
    }

    /// Returns whether the session must stop after this error.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, DecoderError::CorruptPayload { .. })
    }
}

impl ScrcpyError {
    /// Returns whether this error terminates the session.
    ///
    /// Only a corrupt payload is recoverable; everything else ends the stream
    /// because partial progress on an ordered byte stream cannot be replayed.
    pub fn is_fatal(&self) -> bool {
        match self {
            ScrcpyError::Decoder(err) => err.is_fatal(),
            ScrcpyError::Protocol(_) => true,
            ScrcpyError::Transport { .. } => true,
            ScrcpyError::Config { .. } => true,
            ScrcpyError::InvalidState { .. } => true,
        }
    }

    /// Returns suggested recovery actions for this error.
    pub fn recovery_suggestions(&self) -> Vec<&'static str> {
        match self {
            ScrcpyError::Protocol(ProtocolError::UnknownCodec(_)) => vec![
                "Request a supported video codec from the server (h264, h265 or av1)",
                "Check that the server version matches the client protocol table",
            ],
            ScrcpyError::Protocol(_) => vec![
                "Check that the device is still connected",
                "Verify the server version matches the configured server_version",
                "Start a new session; framing errors cannot be resumed",
            ],
            ScrcpyError::Decoder(DecoderError::CorruptPayload { .. }) => {
                vec!["Wait for the next key frame", "Lower the video bit rate if errors persist"]
            }
            ScrcpyError::Decoder(_) => vec![
                "Verify the decoder backend supports the negotiated codec",
                "Start a new session with a fresh decoder",
            ],
            ScrcpyError::Transport { .. } => vec![
                "Ensure the scrcpy server is running on the device",
                "Check the adb forward for the configured port",
                "Increase connect_attempts if the server starts slowly",
            ],
            ScrcpyError::Config { .. } => {
                vec!["Check the configuration file syntax", "Compare values against the defaults"]
            }
            ScrcpyError::InvalidState { .. } => {
                vec!["Construct a new session; sessions are single-pass"]
            }
        }
    }

    /// Helper constructor for transport errors.
    pub fn transport_failed(reason: impl Into<String>) -> Self {
        ScrcpyError::Transport { reason: reason.into(), source: None }
    }

    /// Helper constructor for transport errors with source.
    pub fn transport_failed_with_source(
        reason: impl Into<String>,
        source: Box<dyn std::error::Error + Send + Sync>,
    ) -> Self {
        ScrcpyError::Transport { reason: reason.into(), source: Some(Arc::from(source)) }
    }

    /// Helper constructor for configuration errors.
    pub fn config_error(context: impl Into<String>, details: impl Into<String>) -> Self {
        ScrcpyError::Config { context: context.into(), details: details.into() }
    }
}

impl From<std::io::Error> for ScrcpyError {
    fn from(err: std::io::Error) -> Self {
        ScrcpyError::Transport { reason: err.kind().to_string(), source: Some(Arc::new(err)) }
    }
}
