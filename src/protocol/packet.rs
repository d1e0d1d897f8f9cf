//! Per-packet header of the video socket
//!
//! ```text
//! [pts_and_flags: u64 BE][payload_len: u32 BE][payload: payload_len bytes]
//!  bit 63: config packet
//!  bit 62: key frame
//!  bits 0..62: PTS in microseconds, all ones when absent
//! ```

/// Size of the packet header in bytes
pub const PACKET_HEADER_SIZE: usize = 12;

/// Packet carries codec configuration rather than picture data
pub const FLAG_CONFIG: u64 = 1 << 63;
/// Packet starts a key frame
pub const FLAG_KEY_FRAME: u64 = 1 << 62;
/// Bits left for the timestamp once the flags are cleared
pub const PTS_MASK: u64 = FLAG_KEY_FRAME - 1;
/// Timestamp value meaning "no PTS"
pub const NO_PTS: u64 = PTS_MASK;

/// Decoded packet header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PacketHeader {
    pub pts_and_flags: u64,
    pub payload_len: u32,
}

impl PacketHeader {
    /// Build a header from its logical fields.
    ///
    /// PTS values wider than 62 bits are masked.
    pub fn new(is_config: bool, is_key_frame: bool, pts: Option<u64>, payload_len: u32) -> Self {
        let mut pts_and_flags = pts.map_or(NO_PTS, |pts| pts & PTS_MASK);
        if is_config {
            pts_and_flags |= FLAG_CONFIG;
        }
        if is_key_frame {
            pts_and_flags |= FLAG_KEY_FRAME;
        }
        Self { pts_and_flags, payload_len }
    }

    /// Parse the 12 header bytes.
    pub fn parse(bytes: &[u8; PACKET_HEADER_SIZE]) -> Self {
        let mut pts = [0u8; 8];
        pts.copy_from_slice(&bytes[0..8]);
        let mut len = [0u8; 4];
        len.copy_from_slice(&bytes[8..12]);

        Self { pts_and_flags: u64::from_be_bytes(pts), payload_len: u32::from_be_bytes(len) }
    }

    /// Serialize to the 12 wire bytes.
    pub fn encode(&self) -> [u8; PACKET_HEADER_SIZE] {
        let mut out = [0u8; PACKET_HEADER_SIZE];
        out[0..8].copy_from_slice(&self.pts_and_flags.to_be_bytes());
        out[8..12].copy_from_slice(&self.payload_len.to_be_bytes());
        out
    }

    pub fn is_config(&self) -> bool {
        self.pts_and_flags & FLAG_CONFIG != 0
    }

    pub fn is_key_frame(&self) -> bool {
        self.pts_and_flags & FLAG_KEY_FRAME != 0
    }

    /// Presentation timestamp, or `None` for the all-ones sentinel.
    pub fn pts(&self) -> Option<u64> {
        match self.pts_and_flags & PTS_MASK {
            NO_PTS => None,
            pts => Some(pts),
        }
    }
}
