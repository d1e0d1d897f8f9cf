//! Test utilities: wire builders, in-memory connections and a scripted decoder
//!
//! Shared by unit tests, session tests and the demux benchmark.

#![cfg(any(test, feature = "benchmark"))]

use std::collections::VecDeque;
use std::io;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::task::{Context, Poll};
use tokio::io::{AsyncRead, ReadBuf};

use crate::decoder::{DecoderFactory, DecoderInput, VideoDecoder};
use crate::protocol::{HandshakeInfo, PacketHeader, ProtocolVersion};
use crate::transport::Transport;
use crate::{DecodedFrame, DecoderError, PixelFormat, Result, ScrcpyError, VideoCodec};

/// Logical description of one packet on the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PacketSpec {
    pub is_config: bool,
    pub is_key_frame: bool,
    pub pts: Option<u64>,
    pub payload: Vec<u8>,
}

impl PacketSpec {
    /// Config packet (no PTS)
    pub fn config(payload: Vec<u8>) -> Self {
        Self { is_config: true, is_key_frame: false, pts: None, payload }
    }

    /// Key frame media packet
    pub fn key_frame(pts: u64, payload: Vec<u8>) -> Self {
        Self { is_config: false, is_key_frame: true, pts: Some(pts), payload }
    }

    /// Non-key media packet
    pub fn frame(pts: u64, payload: Vec<u8>) -> Self {
        Self { is_config: false, is_key_frame: false, pts: Some(pts), payload }
    }
}

/// Encode packets back to back, exactly as the server writes them.
pub fn encode_packets(packets: &[PacketSpec]) -> Vec<u8> {
    let mut out = Vec::new();
    for packet in packets {
        let header = PacketHeader::new(
            packet.is_config,
            packet.is_key_frame,
            packet.pts,
            packet.payload.len() as u32,
        );
        out.extend_from_slice(&header.encode());
        out.extend_from_slice(&packet.payload);
    }
    out
}

/// Encode a whole video socket capture: handshake followed by packets.
pub fn encode_stream(info: &HandshakeInfo, packets: &[PacketSpec]) -> Vec<u8> {
    let mut out = info.encode(&ProtocolVersion::CURRENT);
    out.extend_from_slice(&encode_packets(packets));
    out
}

/// Handshake used by most tests: a Pixel streaming 1920x1080 H.264
pub fn pixel_handshake() -> HandshakeInfo {
    HandshakeInfo {
        device_name: "Pixel".to_string(),
        codec: VideoCodec::H264,
        width: 1920,
        height: 1080,
    }
}

/// In-memory reader that hands out at most `chunk` bytes per read.
///
/// Simulates a socket delivering data in arbitrary fragments. Dropping the
/// reader raises its release flag.
#[derive(Debug)]
pub struct ChunkedReader {
    data: Vec<u8>,
    pos: usize,
    chunk: usize,
    fail_at_end: bool,
    released: Arc<AtomicBool>,
}

impl ChunkedReader {
    pub fn new(data: Vec<u8>, chunk: usize) -> Self {
        Self {
            data,
            pos: 0,
            chunk: chunk.max(1),
            fail_at_end: false,
            released: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Report a connection reset instead of EOF once the data runs out
    pub fn fail_at_end(mut self) -> Self {
        self.fail_at_end = true;
        self
    }

    /// Share a flag that is raised when this reader is dropped
    pub fn with_release_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.released = flag;
        self
    }
}

impl AsyncRead for ChunkedReader {
    fn poll_read(
        mut self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let remaining = self.data.len() - self.pos;
        if remaining == 0 {
            if self.fail_at_end {
                return Poll::Ready(Err(io::Error::new(
                    io::ErrorKind::ConnectionReset,
                    "connection reset by peer",
                )));
            }
            return Poll::Ready(Ok(()));
        }

        let n = remaining.min(self.chunk).min(buf.remaining());
        let start = self.pos;
        buf.put_slice(&self.data[start..start + n]);
        self.pos += n;
        Poll::Ready(Ok(()))
    }
}

impl Drop for ChunkedReader {
    fn drop(&mut self) {
        self.released.store(true, Ordering::SeqCst);
    }
}

/// Transport serving a fixed capture from memory.
#[derive(Debug, Clone)]
pub struct MemoryTransport {
    data: Arc<Vec<u8>>,
    chunk: usize,
    refuse: bool,
    connects: Arc<AtomicUsize>,
    released: Arc<AtomicBool>,
}

impl MemoryTransport {
    pub fn new(data: Vec<u8>) -> Self {
        Self {
            data: Arc::new(data),
            chunk: 4096,
            refuse: false,
            connects: Arc::new(AtomicUsize::new(0)),
            released: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Capture of `packets` behind the default handshake
    pub fn with_packets(packets: &[PacketSpec]) -> Self {
        Self::new(encode_stream(&pixel_handshake(), packets))
    }

    /// Transport whose connect always fails
    pub fn refusing() -> Self {
        let mut transport = Self::new(Vec::new());
        transport.refuse = true;
        transport
    }

    /// Deliver at most `chunk` bytes per read
    pub fn with_chunk(mut self, chunk: usize) -> Self {
        self.chunk = chunk;
        self
    }

    /// Number of successful connects
    pub fn connections(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }

    /// Whether the last handed-out connection has been dropped
    pub fn connection_released(&self) -> bool {
        self.released.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl Transport for MemoryTransport {
    type Connection = ChunkedReader;

    async fn connect(&self) -> Result<ChunkedReader> {
        if self.refuse {
            return Err(ScrcpyError::transport_failed("connection refused"));
        }

        self.connects.fetch_add(1, Ordering::SeqCst);
        self.released.store(false, Ordering::SeqCst);
        Ok(ChunkedReader::new(self.data.as_ref().clone(), self.chunk)
            .with_release_flag(Arc::clone(&self.released)))
    }

    fn describe(&self) -> String {
        format!("memory ({} bytes)", self.data.len())
    }
}

/// Call recorded by [`MockDecoderFactory`] sessions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecoderCall {
    Decode { data: Vec<u8>, pts: Option<u64>, is_key_frame: bool },
    Flush,
}

#[derive(Debug, Default)]
struct MockState {
    calls: Vec<DecoderCall>,
    created: usize,
    live: usize,
}

/// Scripted decoder factory.
///
/// Each decode yields a frame whose data is the decoded input. `with_delay(n)`
/// keeps `n` frames buffered until the next decode or flush. Any input containing
/// `CORRUPT` is rejected as a corrupt payload.
#[derive(Debug, Clone, Default)]
pub struct MockDecoderFactory {
    delay: usize,
    failing_flush: bool,
    supported: Option<Vec<VideoCodec>>,
    session_limit: Option<usize>,
    state: Arc<Mutex<MockState>>,
}

impl MockDecoderFactory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_delay(mut self, frames: usize) -> Self {
        self.delay = frames;
        self
    }

    pub fn with_failing_flush(mut self) -> Self {
        self.failing_flush = true;
        self
    }

    /// Refuse to create sessions for any codec not listed
    pub fn supporting(mut self, codecs: &[VideoCodec]) -> Self {
        self.supported = Some(codecs.to_vec());
        self
    }

    /// Refuse to create more than `sessions` decoder sessions in total
    pub fn with_session_limit(mut self, sessions: usize) -> Self {
        self.session_limit = Some(sessions);
        self
    }

    /// Every call made on any session, in order
    pub fn calls(&self) -> Vec<DecoderCall> {
        self.lock().calls.clone()
    }

    /// Number of decoder sessions created so far
    pub fn sessions_created(&self) -> usize {
        self.lock().created
    }

    /// Number of decoder sessions not yet dropped
    pub fn live_sessions(&self) -> usize {
        self.lock().live
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl DecoderFactory for MockDecoderFactory {
    fn create(&self, info: &HandshakeInfo) -> std::result::Result<Box<dyn VideoDecoder>, DecoderError> {
        if let Some(supported) = &self.supported {
            if !supported.contains(&info.codec) {
                return Err(DecoderError::UnsupportedCodec(info.codec));
            }
        }

        let mut state = self.lock();
        if self.session_limit.is_some_and(|limit| state.created >= limit) {
            return Err(DecoderError::UnsupportedCodec(info.codec));
        }
        state.created += 1;
        state.live += 1;

        Ok(Box::new(MockDecoder {
            width: info.width,
            height: info.height,
            delay: self.delay,
            failing_flush: self.failing_flush,
            buffered: VecDeque::new(),
            state: Arc::clone(&self.state),
        }))
    }
}

struct MockDecoder {
    width: u32,
    height: u32,
    delay: usize,
    failing_flush: bool,
    buffered: VecDeque<DecodedFrame>,
    state: Arc<Mutex<MockState>>,
}

impl MockDecoder {
    fn record(&self, call: DecoderCall) {
        self.state.lock().unwrap_or_else(PoisonError::into_inner).calls.push(call);
    }
}

impl VideoDecoder for MockDecoder {
    fn decode(&mut self, input: DecoderInput<'_>) -> std::result::Result<Vec<DecodedFrame>, DecoderError> {
        self.record(DecoderCall::Decode {
            data: input.data.to_vec(),
            pts: input.pts,
            is_key_frame: input.is_key_frame,
        });

        if input.data.windows(7).any(|w| w == b"CORRUPT") {
            return Err(DecoderError::corrupt_payload("mock decoder rejected payload"));
        }

        self.buffered.push_back(DecodedFrame::new(
            self.width,
            self.height,
            PixelFormat::Yuv420p,
            input.data.to_vec(),
            input.pts,
        ));

        let mut ready = Vec::new();
        while self.buffered.len() > self.delay {
            if let Some(frame) = self.buffered.pop_front() {
                ready.push(frame);
            }
        }
        Ok(ready)
    }

    fn flush(&mut self) -> std::result::Result<Vec<DecodedFrame>, DecoderError> {
        self.record(DecoderCall::Flush);

        if self.failing_flush {
            return Err(DecoderError::flush_failed("mock decoder flush failure"));
        }
        Ok(self.buffered.drain(..).collect())
    }
}

impl Drop for MockDecoder {
    fn drop(&mut self) {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        state.live = state.live.saturating_sub(1);
    }
}
