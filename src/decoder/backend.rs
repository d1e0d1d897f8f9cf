//! Decoder backend traits

use crate::protocol::HandshakeInfo;
use crate::{DecodedFrame, DecoderError, VideoCodec};

/// One packet handed to a decoder backend.
#[derive(Debug, Clone, Copy)]
pub struct DecoderInput<'a> {
    pub codec: VideoCodec,
    /// Encoded bytes; pending configuration data is already prepended
    pub data: &'a [u8],
    pub pts: Option<u64>,
    pub is_key_frame: bool,
}

/// A codec-specific decoder session.
///
/// The crate never implements codecs itself; this is the seam where an external
/// decoder (ffmpeg, MediaCodec, a hardware API) plugs in.
pub trait VideoDecoder: Send {
    /// Feed one packet and collect the frames the decoder is ready to hand out.
    ///
    /// Returning an empty vector is normal: decoders buffer for reordering and
    /// parameter-set packets produce no picture.
    ///
    /// Return [`DecoderError::CorruptPayload`] for input the decoder rejects but
    /// can recover from; the packet is skipped and streaming continues.
    fn decode(&mut self, input: DecoderInput<'_>) -> Result<Vec<DecodedFrame>, DecoderError>;

    /// Drain every buffered frame. Called once at end of stream and before a
    /// reconfiguration replaces this session.
    fn flush(&mut self) -> Result<Vec<DecodedFrame>, DecoderError>;
}

/// Creates decoder sessions for a negotiated stream.
pub trait DecoderFactory: Send + Sync + 'static {
    /// Create a session for the codec and frame size announced in the handshake.
    ///
    /// Return [`DecoderError::UnsupportedCodec`] if this factory cannot serve the codec.
    fn create(&self, info: &HandshakeInfo) -> Result<Box<dyn VideoDecoder>, DecoderError>;
}

impl<F> DecoderFactory for F
where
    F: Fn(&HandshakeInfo) -> Result<Box<dyn VideoDecoder>, DecoderError> + Send + Sync + 'static,
{
    fn create(&self, info: &HandshakeInfo) -> Result<Box<dyn VideoDecoder>, DecoderError> {
        self(info)
    }
}
