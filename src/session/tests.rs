//! Session lifecycle tests
//!
//! These drive full sessions over in-memory captures: connect, handshake,
//! demux, decode and teardown, in all three interaction modes.

use super::*;
use crate::protocol::PacketHeader;
use crate::test_utils::{
    DecoderCall, MemoryTransport, MockDecoderFactory, PacketSpec, encode_stream, pixel_handshake,
};
use crate::{DecoderError, ProtocolError, VideoCodec};
use futures::TryStreamExt;
use std::time::Duration;

fn session(transport: &MemoryTransport, decoders: &MockDecoderFactory) -> Session<MemoryTransport> {
    Session::new(ClientConfig::default(), transport.clone(), decoders.clone()).unwrap()
}

fn pixel_packets() -> Vec<PacketSpec> {
    vec![
        PacketSpec::config(b"SPS".to_vec()),
        PacketSpec::key_frame(0, b"IDR".to_vec()),
        PacketSpec::frame(16_666, b"P".to_vec()),
    ]
}

/// Many small packets, so a background worker with a tiny buffer can never finish on its own.
fn long_stream(count: u64) -> MemoryTransport {
    let packets: Vec<_> = (0..count).map(|i| PacketSpec::frame(i, vec![0xAB; 16])).collect();
    MemoryTransport::with_packets(&packets)
}

fn truncated_payload_capture() -> Vec<u8> {
    let mut bytes = encode_stream(&pixel_handshake(), &[]);
    bytes.extend_from_slice(&PacketHeader::new(false, true, Some(0), 500).encode());
    bytes.extend_from_slice(&[0x42; 300]);
    bytes
}

#[tokio::test]
async fn pixel_h264_session_streams_to_completion() {
    let _ = tracing_subscriber::fmt::try_init();

    let capture = encode_stream(&pixel_handshake(), &pixel_packets());
    let capture_len = capture.len() as u64;
    let transport = MemoryTransport::new(capture).with_chunk(7);
    let decoders = MockDecoderFactory::new();
    let mut session = session(&transport, &decoders);

    let info = session.start().await.expect("handshake should succeed").clone();
    assert_eq!(info.device_name, "Pixel");
    assert_eq!(info.codec, VideoCodec::H264);
    assert_eq!((info.width, info.height), (1920, 1080));
    assert_eq!(session.state(), SessionState::Streaming);

    let frames: Vec<DecodedFrame> = session.frames().try_collect().await.unwrap();
    assert_eq!(frames.len(), 2);
    assert_eq!(frames[0].data, b"SPSIDR");
    assert_eq!(frames[0].pts, Some(0));
    assert_eq!(frames[1].data, b"P");
    assert_eq!((frames[1].width, frames[1].height), (1920, 1080));

    assert_eq!(session.state(), SessionState::Closed);
    let outcome = session.outcome().expect("closed session has an outcome");
    assert!(matches!(outcome, SessionOutcome::Finished(_)));

    let stats = outcome.stats().copied().unwrap();
    assert_eq!(stats.access_units, 3);
    assert_eq!(stats.config_packets, 1);
    assert_eq!(stats.frames, 2);
    assert_eq!(stats.skipped_units, 0);
    assert_eq!(stats.bytes_received, capture_len);

    assert!(transport.connection_released());
    assert_eq!(decoders.live_sessions(), 0);
    assert_eq!(decoders.calls().iter().filter(|c| **c == DecoderCall::Flush).count(), 1);
}

#[tokio::test]
async fn config_and_key_frame_yield_a_frame_before_next_packet() {
    let transport = MemoryTransport::with_packets(&pixel_packets());
    let decoders = MockDecoderFactory::new();
    let mut session = session(&transport, &decoders);
    session.start().await.unwrap();

    let first = session.next_frame().await.unwrap().expect("key frame should decode");
    assert_eq!(first.pts, Some(0));

    // only the merged config + key frame reached the decoder so far
    assert_eq!(
        decoders.calls(),
        vec![DecoderCall::Decode { data: b"SPSIDR".to_vec(), pts: Some(0), is_key_frame: true }]
    );
    assert_eq!(session.stats().access_units, 2);
}

#[tokio::test]
async fn truncated_payload_fails_and_releases_resources() {
    let transport = MemoryTransport::new(truncated_payload_capture()).with_chunk(64);
    let decoders = MockDecoderFactory::new();
    let mut session = session(&transport, &decoders);
    session.start().await.unwrap();
    assert_eq!(decoders.live_sessions(), 1);

    let err = session.next_frame().await.unwrap_err();
    assert!(matches!(
        err,
        ScrcpyError::Protocol(ProtocolError::TruncatedPayload { expected: 500, received: 300 })
    ));

    assert_eq!(session.state(), SessionState::Failed);
    assert!(transport.connection_released());
    assert_eq!(decoders.live_sessions(), 0);

    let outcome = session.outcome().unwrap();
    assert_eq!(outcome.state(), SessionState::Failed);
    assert_eq!(outcome.error().unwrap().to_string(), err.to_string());

    // the error is reported once; afterwards the session is simply over
    assert!(session.next_frame().await.unwrap().is_none());
}

#[tokio::test]
async fn truncated_header_is_fatal() {
    let mut capture = encode_stream(&pixel_handshake(), &[PacketSpec::frame(0, vec![1, 2])]);
    capture.extend_from_slice(&[0u8; 5]);
    let transport = MemoryTransport::new(capture);
    let decoders = MockDecoderFactory::new();
    let mut session = session(&transport, &decoders);
    session.start().await.unwrap();

    assert!(session.next_frame().await.unwrap().is_some());
    let err = session.next_frame().await.unwrap_err();
    assert!(matches!(err, ScrcpyError::Protocol(ProtocolError::TruncatedHeader { received: 5 })));
}

#[tokio::test]
async fn empty_stream_after_handshake_finishes_cleanly() {
    let transport = MemoryTransport::with_packets(&[]);
    let decoders = MockDecoderFactory::new();
    let mut session = session(&transport, &decoders);
    session.start().await.unwrap();

    assert!(session.next_frame().await.unwrap().is_none());
    assert_eq!(session.state(), SessionState::Closed);

    let outcome = session.outcome().unwrap();
    assert!(matches!(outcome, SessionOutcome::Finished(stats) if stats.frames == 0));
    assert_eq!(decoders.calls(), vec![DecoderCall::Flush]);
}

#[tokio::test]
async fn flush_emits_buffered_frames_at_end_of_stream() {
    let transport = MemoryTransport::with_packets(&pixel_packets());
    let decoders = MockDecoderFactory::new().with_delay(2);
    let mut session = session(&transport, &decoders);
    session.start().await.unwrap();

    let frames: Vec<DecodedFrame> = session.frames().try_collect().await.unwrap();
    let pts: Vec<_> = frames.iter().map(|f| f.pts).collect();
    assert_eq!(pts, vec![Some(0), Some(16_666)]);
}

#[tokio::test]
async fn failing_flush_fails_the_session() {
    let transport = MemoryTransport::with_packets(&pixel_packets());
    let decoders = MockDecoderFactory::new().with_failing_flush();
    let mut session = session(&transport, &decoders);
    session.start().await.unwrap();

    let results: Vec<Result<DecodedFrame>> = {
        let mut out = Vec::new();
        loop {
            match session.next_frame().await {
                Ok(Some(frame)) => out.push(Ok(frame)),
                Ok(None) => break,
                Err(e) => out.push(Err(e)),
            }
        }
        out
    };

    assert_eq!(results.len(), 3);
    assert!(matches!(
        results.last(),
        Some(Err(ScrcpyError::Decoder(DecoderError::FlushFailed { .. })))
    ));
    assert_eq!(session.state(), SessionState::Failed);
    assert_eq!(decoders.live_sessions(), 0);
}

#[tokio::test]
async fn corrupt_units_are_skipped_and_counted() {
    let transport = MemoryTransport::with_packets(&[
        PacketSpec::config(b"SPS".to_vec()),
        PacketSpec::key_frame(0, b"CORRUPT".to_vec()),
        PacketSpec::key_frame(1, b"IDR".to_vec()),
    ]);
    let decoders = MockDecoderFactory::new();
    let mut session = session(&transport, &decoders);
    session.start().await.unwrap();

    let frames: Vec<DecodedFrame> = session.frames().try_collect().await.unwrap();
    assert_eq!(frames.len(), 1);
    assert_eq!(frames[0].data, b"SPSIDR");

    let stats = session.outcome().unwrap().stats().copied().unwrap();
    assert_eq!(stats.skipped_units, 1);
    assert_eq!(stats.access_units, 3);
}

#[tokio::test]
async fn stop_is_idempotent_and_observed_between_packets() {
    let transport = long_stream(50);
    let decoders = MockDecoderFactory::new();
    let mut session = session(&transport, &decoders);
    session.start().await.unwrap();

    assert!(session.next_frame().await.unwrap().is_some());
    session.stop();
    session.stop();

    assert!(session.next_frame().await.unwrap().is_none());
    session.stop();

    assert_eq!(session.state(), SessionState::Closed);
    let outcome = session.outcome().unwrap();
    assert!(matches!(outcome, SessionOutcome::Stopped(stats) if stats.frames == 1));
    assert!(transport.connection_released());
    assert_eq!(decoders.live_sessions(), 0);
    // stopping does not drain the decoder
    assert!(!decoders.calls().contains(&DecoderCall::Flush));
}

#[tokio::test]
async fn stop_handle_before_start_ends_at_first_read() {
    let transport = long_stream(10);
    let decoders = MockDecoderFactory::new();
    let mut session = session(&transport, &decoders);

    let handle = session.stop_handle();
    handle.stop();
    assert!(handle.is_stopped());

    session.start().await.unwrap();
    assert!(session.next_frame().await.unwrap().is_none());
    assert!(matches!(session.outcome(), Some(SessionOutcome::Stopped(_))));
}

#[tokio::test]
async fn start_twice_is_invalid_state() {
    let transport = MemoryTransport::with_packets(&pixel_packets());
    let mut session = session(&transport, &MockDecoderFactory::new());
    session.start().await.unwrap();

    let err = session.start().await.unwrap_err();
    assert!(matches!(
        err,
        ScrcpyError::InvalidState { operation: "start", state: SessionState::Streaming }
    ));
    assert_eq!(transport.connections(), 1);
}

#[tokio::test]
async fn reading_before_start_is_invalid_state() {
    let transport = MemoryTransport::with_packets(&pixel_packets());
    let mut session = session(&transport, &MockDecoderFactory::new());

    let err = session.next_frame().await.unwrap_err();
    assert!(matches!(err, ScrcpyError::InvalidState { state: SessionState::Created, .. }));
    assert_eq!(transport.connections(), 0);
}

#[tokio::test]
async fn refused_connection_fails_start() {
    let transport = MemoryTransport::refusing();
    let mut session = session(&transport, &MockDecoderFactory::new());

    let err = session.start().await.unwrap_err();
    assert!(matches!(err, ScrcpyError::Transport { .. }));
    assert_eq!(session.state(), SessionState::Failed);
    assert!(matches!(session.outcome(), Some(SessionOutcome::Failed(_))));

    let again = session.start().await.unwrap_err();
    assert!(matches!(again, ScrcpyError::InvalidState { state: SessionState::Failed, .. }));
}

#[tokio::test]
async fn unknown_codec_fails_before_decoder_is_created() {
    let mut capture = b"Pixel".to_vec();
    capture.resize(64, 0);
    capture.extend_from_slice(b"vp09");
    capture.extend_from_slice(&1920u32.to_be_bytes());
    capture.extend_from_slice(&1080u32.to_be_bytes());

    let transport = MemoryTransport::new(capture);
    let decoders = MockDecoderFactory::new();
    let mut session = session(&transport, &decoders);

    let err = session.start().await.unwrap_err();
    assert!(matches!(err, ScrcpyError::Protocol(ProtocolError::UnknownCodec(0x7670_3039))));
    assert_eq!(decoders.sessions_created(), 0);
    assert!(transport.connection_released());
}

#[tokio::test]
async fn unsupported_codec_releases_connection() {
    let transport = MemoryTransport::with_packets(&pixel_packets());
    let decoders = MockDecoderFactory::new().supporting(&[VideoCodec::Av1]);
    let mut session = session(&transport, &decoders);

    let err = session.start().await.unwrap_err();
    assert!(matches!(err, ScrcpyError::Decoder(DecoderError::UnsupportedCodec(VideoCodec::H264))));
    assert!(err.is_fatal());
    assert!(transport.connection_released());
}

#[tokio::test]
async fn codec_hint_mismatch_keeps_negotiated_codec() {
    let config = ClientConfig { codec_hint: Some(VideoCodec::H265), ..ClientConfig::default() };
    let transport = MemoryTransport::with_packets(&pixel_packets());
    let mut session = Session::new(config, transport, MockDecoderFactory::new()).unwrap();

    let info = session.start().await.unwrap();
    assert_eq!(info.codec, VideoCodec::H264);
}

#[tokio::test]
async fn invalid_config_is_rejected_up_front() {
    let config = ClientConfig { frame_buffer: 0, ..ClientConfig::default() };
    let err = Session::new(config, MemoryTransport::with_packets(&[]), MockDecoderFactory::new())
        .unwrap_err();
    assert!(matches!(err, ScrcpyError::Config { .. }));
}

#[tokio::test]
async fn state_updates_start_with_current_state() {
    use futures::StreamExt;

    let transport = MemoryTransport::with_packets(&pixel_packets());
    let mut session = session(&transport, &MockDecoderFactory::new());

    let mut updates = Box::pin(session.state_updates());
    assert_eq!(updates.next().await, Some(SessionState::Created));

    session.start().await.unwrap();
    let latest = tokio::time::timeout(Duration::from_secs(1), updates.next()).await.unwrap();
    assert_eq!(latest, Some(SessionState::Streaming));
}

#[test]
fn blocking_session_iterates_frames() {
    let transport = MemoryTransport::with_packets(&pixel_packets());
    let decoders = MockDecoderFactory::new();
    let mut session = session(&transport, &decoders).blocking().unwrap();

    let info = session.start().unwrap();
    assert_eq!(info.device_name, "Pixel");

    let frames = session.frames().collect::<Result<Vec<_>>>().unwrap();
    assert_eq!(frames.len(), 2);
    assert_eq!(session.state(), SessionState::Closed);
    assert!(matches!(session.outcome(), Some(SessionOutcome::Finished(_))));
    assert_eq!(decoders.live_sessions(), 0);
}

#[test]
fn blocking_session_stops_from_another_thread() {
    let transport = long_stream(50);
    let mut session = session(&transport, &MockDecoderFactory::new()).blocking().unwrap();
    session.start().unwrap();
    assert!(session.next_frame().unwrap().is_some());

    let handle = session.stop_handle();
    std::thread::spawn(move || handle.stop()).join().unwrap();

    assert!(session.next_frame().unwrap().is_none());
    assert!(matches!(session.outcome(), Some(SessionOutcome::Stopped(_))));
}

#[test]
fn background_session_delivers_all_frames() {
    let transport = MemoryTransport::with_packets(&pixel_packets());
    let decoders = MockDecoderFactory::new();
    let mut handle = session(&transport, &decoders).spawn().unwrap();

    let frames = handle.take_frames().unwrap().collect::<Result<Vec<_>>>().unwrap();
    assert_eq!(frames.len(), 2);
    assert!(handle.take_frames().is_none());

    let first = handle.join();
    let second = handle.join();
    assert!(matches!(first, SessionOutcome::Finished(_)));
    assert_eq!(first.stats(), second.stats());
    assert_eq!(handle.state(), SessionState::Closed);
    assert_eq!(decoders.live_sessions(), 0);
}

#[test]
fn background_stop_is_idempotent() {
    let config = ClientConfig { frame_buffer: 1, ..ClientConfig::default() };
    let transport = long_stream(1000);
    let decoders = MockDecoderFactory::new();
    let mut handle = Session::new(config, transport.clone(), decoders.clone()).unwrap().spawn().unwrap();

    let mut frames = handle.take_frames().unwrap();
    assert!(frames.next().unwrap().is_ok());

    handle.stop();
    handle.stop();

    let outcome = handle.join();
    assert!(matches!(outcome, SessionOutcome::Stopped(_)), "got {:?}", outcome);
    assert!(matches!(handle.join(), SessionOutcome::Stopped(_)));

    assert!(frames.count() < 1000);
    assert!(transport.connection_released());
    assert_eq!(decoders.live_sessions(), 0);
}

#[test]
fn dropping_frame_receiver_stops_worker() {
    let transport = long_stream(1000);
    let mut handle = session(&transport, &MockDecoderFactory::new()).spawn().unwrap();

    drop(handle.take_frames());

    assert!(matches!(handle.join(), SessionOutcome::Stopped(_)));
    assert!(transport.connection_released());
}

#[test]
fn join_without_taking_frames_does_not_block() {
    let config = ClientConfig { frame_buffer: 2, ..ClientConfig::default() };
    let transport = long_stream(20);
    let decoders = MockDecoderFactory::new();
    let handle = Session::new(config, transport.clone(), decoders.clone()).unwrap().spawn().unwrap();

    let (done_tx, done_rx) = std::sync::mpsc::channel();
    std::thread::spawn(move || {
        let _ = done_tx.send(handle.join());
    });

    let outcome = done_rx.recv_timeout(Duration::from_secs(5)).expect("join should return");
    assert!(outcome.error().is_none(), "got {:?}", outcome);
    assert_eq!(outcome.state(), SessionState::Closed);
    assert!(transport.connection_released());
    assert_eq!(decoders.live_sessions(), 0);
}

#[test]
fn dropping_handle_stops_worker() {
    let config = ClientConfig { frame_buffer: 1, ..ClientConfig::default() };
    let transport = long_stream(1000);
    let mut handle = Session::new(config, transport.clone(), MockDecoderFactory::new()).unwrap().spawn().unwrap();

    let frames = handle.take_frames().unwrap();
    drop(handle);

    // the worker exits and closes the channel
    assert!(frames.count() < 1000);
}

#[test]
fn background_failure_is_reported_on_channel_and_join() {
    let transport = MemoryTransport::new(truncated_payload_capture());
    let decoders = MockDecoderFactory::new();
    let mut handle = session(&transport, &decoders).spawn().unwrap();

    let items: Vec<Result<DecodedFrame>> = handle.take_frames().unwrap().collect();
    assert_eq!(items.len(), 1);
    assert!(matches!(
        items[0],
        Err(ScrcpyError::Protocol(ProtocolError::TruncatedPayload { expected: 500, received: 300 }))
    ));

    let first = handle.join();
    let second = handle.join();
    assert_eq!(first.state(), SessionState::Failed);
    assert_eq!(first.error().unwrap().to_string(), second.error().unwrap().to_string());
    assert_eq!(decoders.live_sessions(), 0);
}

#[test]
fn background_connect_failure_is_reported() {
    let mut handle = session(&MemoryTransport::refusing(), &MockDecoderFactory::new()).spawn().unwrap();

    let items: Vec<_> = handle.take_frames().unwrap().collect();
    assert!(matches!(items.as_slice(), [Err(ScrcpyError::Transport { .. })]));
    assert!(handle.join().error().is_some());
}

#[tokio::test]
async fn background_session_can_be_awaited() {
    use futures::StreamExt;

    let transport = MemoryTransport::with_packets(&pixel_packets());
    let mut handle = session(&transport, &MockDecoderFactory::new()).spawn().unwrap();

    let frames: Vec<_> = handle.take_frames().unwrap().into_stream().collect().await;
    assert_eq!(frames.len(), 2);
    assert!(matches!(handle.wait().await, SessionOutcome::Finished(_)));
}

#[tokio::test]
async fn spawning_a_started_session_is_invalid() {
    let transport = MemoryTransport::with_packets(&pixel_packets());
    let mut session = session(&transport, &MockDecoderFactory::new());
    session.start().await.unwrap();

    let err = session.spawn().unwrap_err();
    assert!(matches!(err, ScrcpyError::InvalidState { operation: "spawn", .. }));
}
