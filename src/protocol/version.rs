//! Versioned constant table for the video socket wire layout
//!
//! Field sizes and per-codec framing policy are pinned by the server version,
//! not negotiated. Adding a server version means adding a row here.

/// Wire layout constants for one scrcpy server version.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProtocolVersion {
    /// Server version string, as passed on the server command line
    pub server_version: &'static str,

    /// Size of the NUL-padded device name field
    pub device_name_len: usize,

    /// Prepend a temporal delimiter OBU to AV1 payloads that lack one.
    ///
    /// When `false` the wire already carries low-overhead bitstream OBUs and
    /// payloads are only validated.
    pub av1_insert_temporal_delimiter: bool,
}

impl ProtocolVersion {
    /// scrcpy 3.3.1, the version the client is pinned to.
    pub const V3_3_1: ProtocolVersion = ProtocolVersion {
        server_version: "3.3.1",
        device_name_len: 64,
        av1_insert_temporal_delimiter: false,
    };

    /// Default protocol version
    pub const CURRENT: ProtocolVersion = ProtocolVersion::V3_3_1;

    const KNOWN: &'static [ProtocolVersion] = &[ProtocolVersion::V3_3_1];

    /// Look up the layout for a server version string.
    pub fn lookup(server_version: &str) -> Option<&'static ProtocolVersion> {
        Self::KNOWN.iter().find(|v| v.server_version == server_version)
    }

    /// Total handshake size in bytes (device name, codec tag, width, height).
    pub const fn handshake_len(&self) -> usize {
        self.device_name_len + 4 + 4 + 4
    }
}

impl Default for ProtocolVersion {
    fn default() -> Self {
        Self::CURRENT
    }
}
