//! Streaming pipeline tests against the mock transport
//!
//! Covers queue backpressure, FIFO delivery, the fixed audio quantum,
//! write-failure escalation, and the input lane hand-off.

use bytes::Bytes;
use crabcast::signaling::encode;
use crabcast::testing::{MockTransport, MockTransportFactory};
use crabcast::types::AUDIO_SAMPLES_PER_FRAME;
use crabcast::{
    MediaSession, OnIceCallback, SdpKind, SdpPayload, SessionConfig, SessionError,
    SessionDescription, SessionState, TransportState, VideoPacket,
};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_test::{assert_pending, task};

fn new_session() -> (MediaSession, Arc<MockTransportFactory>) {
    let factory = MockTransportFactory::new();
    let session = MediaSession::new(SessionConfig::default(), factory.clone());
    (session, factory)
}

fn noop_ice() -> OnIceCallback {
    Arc::new(|_candidate: String| {})
}

fn packet(n: u16) -> VideoPacket {
    VideoPacket {
        sequence_number: n,
        timestamp: u32::from(n) * 3_000,
        marker: false,
        payload: Bytes::from(vec![n as u8; 16]),
    }
}

fn encoded_answer() -> String {
    encode(&SdpPayload {
        sdp: SessionDescription {
            kind: SdpKind::Answer,
            sdp: "v=0\r\no=- 1 1 IN IP4 192.0.2.7\r\ns=-\r\nt=0 0\r\n".to_string(),
        },
        id: "remote-peer".to_string(),
        ts: 1722945600,
    })
    .unwrap()
}

async fn wait_until(mut condition: impl FnMut() -> bool) {
    let deadline = Instant::now() + Duration::from_secs(2);
    while !condition() {
        assert!(Instant::now() < deadline, "condition not met within deadline");
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}

async fn streaming_session() -> (MediaSession, Arc<MockTransport>) {
    let (session, factory) = new_session();
    session.start(noop_ice(), 12345).await.unwrap();
    session.set_remote_answer(&encoded_answer()).await.unwrap();

    let transport = factory.transport().unwrap();
    transport
        .fire_connection_state(TransportState::Connected)
        .await;
    wait_until(|| session.state() == SessionState::Streaming).await;
    (session, transport)
}

#[tokio::test]
async fn test_video_push_blocks_when_queue_is_full() {
    let (session, _factory) = new_session();

    // No consumer is draining yet; the queue holds exactly its capacity.
    for n in 0..30 {
        session.push_video(packet(n)).await.unwrap();
    }

    let overflow_session = session.clone();
    let mut overflow = task::spawn(async move { overflow_session.push_video(packet(30)).await });
    assert_pending!(overflow.poll());
    // Still blocked: backpressure, not a drop.
    assert_pending!(overflow.poll());
}

#[tokio::test]
async fn test_backpressure_releases_without_losing_packets() {
    let (session, factory) = new_session();
    session.start(noop_ice(), 1).await.unwrap();
    session.set_remote_answer(&encoded_answer()).await.unwrap();

    for n in 0..30 {
        session.push_video(packet(n)).await.unwrap();
    }

    let producer_session = session.clone();
    let producer = tokio::spawn(async move { producer_session.push_video(packet(30)).await });
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(!producer.is_finished(), "producer should be blocked on the full queue");

    // Consumer resumes: the connected event launches the pipeline.
    let transport = factory.transport().unwrap();
    transport
        .fire_connection_state(TransportState::Connected)
        .await;

    producer.await.unwrap().unwrap();

    let video = transport.video_track().unwrap();
    wait_until(|| video.packets().len() == 31).await;

    // Nothing dropped, arrival order preserved end to end.
    let sequences: Vec<u16> = video.packets().iter().map(|p| p.sequence_number).collect();
    assert_eq!(sequences, (0..=30).collect::<Vec<u16>>());
}

#[tokio::test]
async fn test_video_packets_preserve_fifo_order() {
    let (session, transport) = streaming_session().await;

    for n in 0..10 {
        session.push_video(packet(n)).await.unwrap();
    }

    let video = transport.video_track().unwrap();
    wait_until(|| video.packets().len() == 10).await;

    let sequences: Vec<u16> = video.packets().iter().map(|p| p.sequence_number).collect();
    assert_eq!(sequences, (0..10).collect::<Vec<u16>>());
}

#[tokio::test]
async fn test_audio_frames_use_the_fixed_sample_quantum() {
    let (session, transport) = streaming_session().await;

    // One 20 ms stereo frame of 16-bit PCM.
    let frame = Bytes::from(vec![0u8; 3840]);
    session.push_audio(frame.clone()).await.unwrap();

    let audio = transport.audio_track().unwrap();
    wait_until(|| !audio.samples().is_empty()).await;

    let samples = audio.samples();
    assert_eq!(samples.len(), 1);
    assert_eq!(samples[0].0, frame);
    assert_eq!(samples[0].1, AUDIO_SAMPLES_PER_FRAME);
    assert_eq!(AUDIO_SAMPLES_PER_FRAME, 1920);
}

#[tokio::test]
async fn test_video_write_failure_escalates_to_stop() {
    let (session, transport) = streaming_session().await;

    let video = transport.video_track().unwrap();
    video.fail_writes();

    session.push_video(packet(0)).await.unwrap();

    // A broken video lane takes the whole session down.
    wait_until(|| transport.close_calls() == 1).await;
    assert_eq!(session.state(), SessionState::Stopped);
    assert!(!session.is_connected());
}

#[tokio::test]
async fn test_stop_closes_media_lanes() {
    let (session, transport) = streaming_session().await;

    session.push_audio(Bytes::from_static(b"pcm-frame")).await.unwrap();
    let audio = transport.audio_track().unwrap();
    wait_until(|| !audio.samples().is_empty()).await;

    session.stop().await;

    let audio_result = session.push_audio(Bytes::from_static(b"late")).await;
    assert!(matches!(audio_result, Err(SessionError::State(_))));
    let video_result = session.push_video(packet(0)).await;
    assert!(matches!(video_result, Err(SessionError::State(_))));
}

#[tokio::test]
async fn test_input_lane_hand_off_and_close() {
    let (session, _factory) = new_session();

    session
        .push_input(Bytes::from_static(b"keydown:w"))
        .await
        .unwrap();

    let mut input = session.take_input_receiver().unwrap();
    assert_eq!(input.recv().await.unwrap(), Bytes::from_static(b"keydown:w"));
    // The receiver is handed over exactly once.
    assert!(session.take_input_receiver().is_none());

    session
        .push_input(Bytes::from_static(b"keyup:w"))
        .await
        .unwrap();
    session.stop().await;

    // Buffered input survives the stop, then the lane ends.
    assert_eq!(input.recv().await.unwrap(), Bytes::from_static(b"keyup:w"));
    assert_eq!(input.recv().await, None);

    let result = session.push_input(Bytes::from_static(b"late")).await;
    assert!(matches!(result, Err(SessionError::State(_))));
}

#[tokio::test]
async fn test_stats_count_delivered_frames() {
    let (session, transport) = streaming_session().await;

    for n in 0..3 {
        session.push_video(packet(n)).await.unwrap();
    }
    session.push_audio(Bytes::from_static(b"pcm")).await.unwrap();

    let video = transport.video_track().unwrap();
    wait_until(|| video.packets().len() == 3).await;
    let audio = transport.audio_track().unwrap();
    wait_until(|| !audio.samples().is_empty()).await;

    let stats = session.stats();
    assert_eq!(stats.frames_sent, 3);
    assert_eq!(stats.samples_sent, 1);
    assert!(stats.smoothed_fps >= 0.0);
}
