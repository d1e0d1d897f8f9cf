//! scrcpy video socket wire format (cross-platform)
//!
//! The video socket carries a one-time handshake followed by an unbounded
//! sequence of length-prefixed packets:
//!
//! 1. **Handshake** - device name, codec tag, initial frame size
//! 2. **Packets** - 12-byte header (PTS + flags, payload length) and payload
//!
//! All integers are big-endian. Field sizes are pinned per server version in
//! [`ProtocolVersion`].

pub mod av1;
pub mod handshake;
pub mod packet;
pub mod version;

pub use handshake::HandshakeInfo;
pub use packet::{PACKET_HEADER_SIZE, PacketHeader};
pub use version::ProtocolVersion;
