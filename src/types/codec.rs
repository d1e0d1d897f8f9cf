//! Video codec identifiers

use serde::{Deserialize, Serialize};
use std::fmt;

/// Video codecs the scrcpy server can stream.
/// Maps to the 4-byte codec tag sent in the video socket handshake.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VideoCodec {
    /// H.264 / AVC, tag `"h264"`
    H264,
    /// H.265 / HEVC, tag `"h265"`
    H265,
    /// AV1, tag `"\0av1"`
    Av1,
}

impl VideoCodec {
    /// All codecs, in wire-tag order.
    pub const ALL: [VideoCodec; 3] = [VideoCodec::H264, VideoCodec::H265, VideoCodec::Av1];

    /// Returns the big-endian codec tag used on the wire.
    pub const fn wire_id(&self) -> u32 {
        match self {
            VideoCodec::H264 => 0x6832_3634,
            VideoCodec::H265 => 0x6832_3635,
            VideoCodec::Av1 => 0x0061_7631,
        }
    }

    /// Maps a wire tag back to a codec.
    pub const fn from_wire_id(id: u32) -> Option<Self> {
        match id {
            0x6832_3634 => Some(VideoCodec::H264),
            0x6832_3635 => Some(VideoCodec::H265),
            0x0061_7631 => Some(VideoCodec::Av1),
            _ => None,
        }
    }

    /// Short lowercase name, as accepted by the server's `video_codec=` option.
    pub const fn name(&self) -> &'static str {
        match self {
            VideoCodec::H264 => "h264",
            VideoCodec::H265 => "h265",
            VideoCodec::Av1 => "av1",
        }
    }
}

impl fmt::Display for VideoCodec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
