//! Video socket handshake
//!
//! Sent once by the server before any packet:
//!
//! ```text
//! [device_name: N bytes, NUL-padded][codec: u32 BE][width: u32 BE][height: u32 BE]
//! ```
//!
//! `N` comes from [`ProtocolVersion::device_name_len`].

use tokio::io::{AsyncRead, AsyncReadExt};
use tracing::{debug, trace, warn};

use super::ProtocolVersion;
use crate::{ProtocolError, Result, VideoCodec};

/// Metadata sent by the server at connection start.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandshakeInfo {
    pub device_name: String,
    pub codec: VideoCodec,
    pub width: u32,
    pub height: u32,
}

impl HandshakeInfo {
    /// Read the handshake from a freshly connected video socket.
    ///
    /// Fails with [`ProtocolError::TruncatedHandshake`] if the stream ends early and
    /// with [`ProtocolError::UnknownCodec`] if the codec tag is not supported.
    pub async fn read_from<R>(reader: &mut R, version: &ProtocolVersion) -> Result<Self>
    where
        R: AsyncRead + Unpin,
    {
        trace!("Reading handshake ({} bytes)", version.handshake_len());

        let mut name = vec![0u8; version.device_name_len];
        read_field(reader, &mut name, "device_name").await?;
        let device_name = decode_device_name(&name);

        let mut word = [0u8; 4];
        read_field(reader, &mut word, "codec").await?;
        let tag = u32::from_be_bytes(word);
        let codec = VideoCodec::from_wire_id(tag).ok_or(ProtocolError::UnknownCodec(tag))?;

        read_field(reader, &mut word, "width").await?;
        let width = u32::from_be_bytes(word);

        read_field(reader, &mut word, "height").await?;
        let height = u32::from_be_bytes(word);

        debug!(device = %device_name, %codec, width, height, "Parsed handshake");

        Ok(Self { device_name, codec, width, height })
    }

    /// Serialize to wire bytes.
    ///
    /// The device name is truncated so the field always keeps a NUL terminator.
    pub fn encode(&self, version: &ProtocolVersion) -> Vec<u8> {
        let mut out = Vec::with_capacity(version.handshake_len());

        let name = self.device_name.as_bytes();
        let keep = name.len().min(version.device_name_len.saturating_sub(1));
        out.extend_from_slice(&name[..keep]);
        out.resize(version.device_name_len, 0);

        out.extend_from_slice(&self.codec.wire_id().to_be_bytes());
        out.extend_from_slice(&self.width.to_be_bytes());
        out.extend_from_slice(&self.height.to_be_bytes());
        out
    }
}

/// Fill `buf` completely or report how far we got.
async fn read_field<R>(reader: &mut R, buf: &mut [u8], field: &'static str) -> Result<()>
where
    R: AsyncRead + Unpin,
{
    let mut filled = 0;
    while filled < buf.len() {
        let n = reader.read(&mut buf[filled..]).await?;
        if n == 0 {
            return Err(ProtocolError::TruncatedHandshake {
                field,
                expected: buf.len(),
                received: filled,
            }
            .into());
        }
        filled += n;
    }
    Ok(())
}

fn decode_device_name(field: &[u8]) -> String {
    let end = field.iter().position(|&b| b == 0).unwrap_or(field.len());
    match std::str::from_utf8(&field[..end]) {
        Ok(name) => name.to_string(),
        Err(e) => {
            warn!("Device name is not valid UTF-8: {}", e);
            String::from_utf8_lossy(&field[..end]).into_owned()
        }
    }
}
