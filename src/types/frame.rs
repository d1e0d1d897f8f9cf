//! Access units and decoded frames

use super::VideoCodec;

/// One decodable unit of encoded video, as framed from the video socket.
///
/// Created by the demuxer per packet and consumed exactly once by the decoder adapter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessUnit {
    /// Codec negotiated in the handshake
    pub codec: VideoCodec,

    /// Packet carries decoder configuration (parameter sets, sequence header)
    pub is_config: bool,

    /// Packet starts a key frame
    pub is_key_frame: bool,

    /// Presentation timestamp in microseconds, if the server sent one
    pub pts: Option<u64>,

    /// Encoded bytes
    pub payload: Vec<u8>,
}

/// Pixel layouts a decoder backend may produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PixelFormat {
    Yuv420p,
    Nv12,
    Rgb24,
    Rgba,
}

/// Image produced by a decoder backend.
///
/// Ownership passes to the caller on emission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedFrame {
    pub width: u32,
    pub height: u32,
    pub format: PixelFormat,
    pub data: Vec<u8>,
    /// Presentation timestamp of the originating access unit
    pub pts: Option<u64>,
}

impl DecodedFrame {
    /// Create a new decoded frame
    pub fn new(
        width: u32,
        height: u32,
        format: PixelFormat,
        data: Vec<u8>,
        pts: Option<u64>,
    ) -> Self {
        Self { width, height, format, data, pts }
    }
}
