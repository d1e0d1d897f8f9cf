//! Core types shared by the demuxer, decoder adapter and session.
//!
//! - [`VideoCodec`] maps the handshake codec tag to a closed enum
//! - [`AccessUnit`] is one framed packet, ready for a decoder
//! - [`DecodedFrame`] is what a decoder backend hands back
//! - [`SessionState`], [`SessionStats`] and [`SessionOutcome`] describe the lifecycle

mod codec;
mod frame;
mod state;

pub use codec::VideoCodec;
pub use frame::{AccessUnit, DecodedFrame, PixelFormat};
pub use state::{SessionOutcome, SessionState, SessionStats};
