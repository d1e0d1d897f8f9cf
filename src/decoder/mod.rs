//! Decoder plumbing between the demuxer and an external codec.
//!
//! - [`VideoDecoder`] is one codec session supplied by the caller
//! - [`DecoderFactory`] creates sessions from the handshake, once at start and
//!   again on every mid-stream reconfiguration
//! - [`DecoderAdapter`] applies the config-packet, corrupt-payload and flush rules
//!
//! # Example
//!
//! ```rust
//! use scrcpy_stream::decoder::{DecoderInput, VideoDecoder};
//! use scrcpy_stream::protocol::HandshakeInfo;
//! use scrcpy_stream::{DecodedFrame, DecoderError, PixelFormat};
//!
//! /// Emits one blank frame per packet.
//! struct Blank {
//!     width: u32,
//!     height: u32,
//! }
//!
//! impl VideoDecoder for Blank {
//!     fn decode(&mut self, input: DecoderInput<'_>) -> Result<Vec<DecodedFrame>, DecoderError> {
//!         let size = (self.width * self.height * 3 / 2) as usize;
//!         Ok(vec![DecodedFrame::new(self.width, self.height, PixelFormat::Yuv420p, vec![0; size], input.pts)])
//!     }
//!
//!     fn flush(&mut self) -> Result<Vec<DecodedFrame>, DecoderError> {
//!         Ok(Vec::new())
//!     }
//! }
//!
//! let factory = |info: &HandshakeInfo| -> Result<Box<dyn VideoDecoder>, DecoderError> {
//!     Ok(Box::new(Blank { width: info.width, height: info.height }))
//! };
//! # let _ = factory;
//! ```

mod adapter;
mod backend;

pub use adapter::DecoderAdapter;
pub use backend::{DecoderFactory, DecoderInput, VideoDecoder};
