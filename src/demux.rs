//! Frame demuxer for the scrcpy video socket
//!
//! Turns the raw byte stream that follows the handshake into [`AccessUnit`]s.
//! The socket has no message boundaries, so the demuxer is a small state machine
//! that accumulates partial reads:
//!
//! - `AwaitingHeader` collects exactly 12 header bytes
//! - `AwaitingPayload` collects exactly `payload_len` bytes
//!
//! End of stream is only clean when it lands exactly on a header boundary. Any
//! other EOF is a fatal framing error and the demuxer stops producing units.
//!
//! ## Usage Example
//!
//! ```rust
//! use scrcpy_stream::demux::FrameDemuxer;
//! use scrcpy_stream::protocol::{PacketHeader, ProtocolVersion};
//! use scrcpy_stream::VideoCodec;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> scrcpy_stream::Result<()> {
//! let mut wire = PacketHeader::new(false, true, Some(0), 3).encode().to_vec();
//! wire.extend_from_slice(&[0, 0, 1]);
//!
//! let mut demuxer = FrameDemuxer::new(wire.as_slice(), VideoCodec::H264, ProtocolVersion::CURRENT);
//! while let Some(unit) = demuxer.next_access_unit().await? {
//!     println!("{} bytes, key frame: {}", unit.payload.len(), unit.is_key_frame);
//! }
//! # Ok(())
//! # }
//! ```

use futures::Stream;
use tokio::io::{AsyncRead, AsyncReadExt};
use tracing::{debug, trace, warn};

use crate::protocol::av1;
use crate::protocol::{PACKET_HEADER_SIZE, PacketHeader, ProtocolVersion};
use crate::{AccessUnit, ProtocolError, Result, VideoCodec};

/// Default cap on a single payload (64 MiB).
pub const DEFAULT_MAX_PAYLOAD_LEN: usize = 64 * 1024 * 1024;

#[derive(Debug)]
enum DemuxState {
    AwaitingHeader { buf: [u8; PACKET_HEADER_SIZE], filled: usize },
    AwaitingPayload { header: PacketHeader, payload: Vec<u8>, filled: usize },
    Ended,
}

impl DemuxState {
    fn header() -> Self {
        DemuxState::AwaitingHeader { buf: [0u8; PACKET_HEADER_SIZE], filled: 0 }
    }
}

/// Stateful packet reader over the video socket.
///
/// Progress is stored in the demuxer, not in the read future, so dropping a
/// pending [`next_access_unit`](Self::next_access_unit) call loses no bytes.
#[derive(Debug)]
pub struct FrameDemuxer<R> {
    reader: R,
    codec: VideoCodec,
    version: ProtocolVersion,
    max_payload_len: usize,
    state: DemuxState,
    packets: u64,
}

impl<R> FrameDemuxer<R>
where
    R: AsyncRead + Unpin,
{
    /// Create a demuxer positioned right after the handshake
    pub fn new(reader: R, codec: VideoCodec, version: ProtocolVersion) -> Self {
        Self {
            reader,
            codec,
            version,
            max_payload_len: DEFAULT_MAX_PAYLOAD_LEN,
            state: DemuxState::header(),
            packets: 0,
        }
    }

    /// Set the largest payload accepted before failing with `PayloadTooLarge`
    pub fn with_max_payload_len(mut self, limit: usize) -> Self {
        self.max_payload_len = limit;
        self
    }

    /// Read the next access unit.
    ///
    /// Returns:
    /// - `Ok(Some(unit))` - a complete packet was framed
    /// - `Ok(None)` - the stream ended at a packet boundary (or had already ended)
    /// - `Err(e)` - framing or transport failure; the demuxer is finished
    pub async fn next_access_unit(&mut self) -> Result<Option<AccessUnit>> {
        loop {
            match &mut self.state {
                DemuxState::Ended => return Ok(None),

                DemuxState::AwaitingHeader { buf, filled } => {
                    let n = match self.reader.read(&mut buf[*filled..]).await {
                        Ok(n) => n,
                        Err(e) => return self.fail(e.into()),
                    };

                    if n == 0 {
                        let received = *filled;
                        if received == 0 {
                            debug!(packets = self.packets, "Video stream ended at packet boundary");
                            self.state = DemuxState::Ended;
                            return Ok(None);
                        }
                        return self.fail(ProtocolError::TruncatedHeader { received }.into());
                    }

                    *filled += n;
                    if *filled < PACKET_HEADER_SIZE {
                        continue;
                    }

                    let header = PacketHeader::parse(buf);
                    let len = header.payload_len as usize;
                    if len > self.max_payload_len {
                        return self.fail(
                            ProtocolError::PayloadTooLarge { length: len, limit: self.max_payload_len }
                                .into(),
                        );
                    }

                    self.state = DemuxState::AwaitingPayload { header, payload: vec![0u8; len], filled: 0 };
                }

                DemuxState::AwaitingPayload { header, payload, filled } => {
                    if *filled < payload.len() {
                        let n = match self.reader.read(&mut payload[*filled..]).await {
                            Ok(n) => n,
                            Err(e) => return self.fail(e.into()),
                        };

                        if n == 0 {
                            let err = ProtocolError::TruncatedPayload {
                                expected: payload.len(),
                                received: *filled,
                            };
                            return self.fail(err.into());
                        }

                        *filled += n;
                        continue;
                    }

                    let header = *header;
                    let payload = std::mem::take(payload);
                    self.state = DemuxState::header();
                    self.packets += 1;

                    return Ok(Some(self.emit(header, payload)));
                }
            }
        }
    }

    fn emit(&self, header: PacketHeader, payload: Vec<u8>) -> AccessUnit {
        trace!(
            packet = self.packets,
            config = header.is_config(),
            key_frame = header.is_key_frame(),
            pts = ?header.pts(),
            len = payload.len(),
            "Framed packet"
        );

        AccessUnit {
            codec: self.codec,
            is_config: header.is_config(),
            is_key_frame: header.is_key_frame(),
            pts: header.pts(),
            payload: preprocess(self.codec, &self.version, payload),
        }
    }

    fn fail<T>(&mut self, err: crate::ScrcpyError) -> Result<T> {
        self.state = DemuxState::Ended;
        Err(err)
    }

    /// Codec negotiated for this stream
    pub fn codec(&self) -> VideoCodec {
        self.codec
    }

    /// Number of complete packets framed so far
    pub fn packets(&self) -> u64 {
        self.packets
    }

    /// Check if the demuxer reached end of stream or failed
    pub fn is_ended(&self) -> bool {
        matches!(self.state, DemuxState::Ended)
    }

    /// Borrow the underlying reader
    pub fn get_ref(&self) -> &R {
        &self.reader
    }

    /// Give back the underlying reader
    pub fn into_inner(self) -> R {
        self.reader
    }

    /// Convert into a stream of access units, ending after the first error
    pub fn into_stream(self) -> impl Stream<Item = Result<AccessUnit>> {
        futures::stream::try_unfold(self, |mut demuxer| async move {
            Ok(demuxer.next_access_unit().await?.map(|unit| (unit, demuxer)))
        })
    }
}

/// Per-codec payload fix-ups, chosen by the protocol version table.
fn preprocess(codec: VideoCodec, version: &ProtocolVersion, payload: Vec<u8>) -> Vec<u8> {
    match codec {
        VideoCodec::H264 | VideoCodec::H265 => payload,
        VideoCodec::Av1 if version.av1_insert_temporal_delimiter => {
            if av1::starts_with_temporal_delimiter(&payload) {
                return payload;
            }
            let mut framed = Vec::with_capacity(payload.len() + av1::TEMPORAL_DELIMITER.len());
            framed.extend_from_slice(&av1::TEMPORAL_DELIMITER);
            framed.extend_from_slice(&payload);
            framed
        }
        VideoCodec::Av1 => {
            if let Some(&first) = payload.first() {
                if !av1::is_low_overhead_obu_header(first) {
                    warn!(header = first, "AV1 payload does not start with a sized OBU header");
                }
            }
            payload
        }
    }
}
