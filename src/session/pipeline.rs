//! Streaming pipeline: the video and audio consumer loops.
//!
//! Both loops start together once the transport reports connected and drain
//! their queues into the transport tracks. A shutdown signal makes each loop
//! close its own receiver and drain to empty before exiting; writes that fail
//! against a torn-down transport end the loop, they never panic.

use crate::session::stats::FpsEstimator;
use crate::session::SessionInner;
use crate::transport::{PacketSink, SampleSink};
use crate::types::{VideoPacket, AUDIO_SAMPLES_PER_FRAME};
use bytes::Bytes;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{mpsc, watch};

/// Launch the video and audio loops for a freshly connected session.
///
/// No-op when the queue receivers are already gone, which happens only when a
/// stop won the race against the connected event.
pub(crate) fn launch(
    inner: &Arc<SessionInner>,
    video_track: Arc<dyn PacketSink>,
    audio_track: Arc<dyn SampleSink>,
) {
    let (Some(video_rx), Some(audio_rx)) = (
        inner.queues.video.take_receiver(),
        inner.queues.audio.take_receiver(),
    ) else {
        log::debug!("Session {}: pipeline not launched, queues already closed", inner.id);
        return;
    };

    tokio::spawn(video_loop(
        Arc::clone(inner),
        video_track,
        video_rx,
        inner.shutdown.subscribe(),
    ));
    tokio::spawn(audio_loop(
        Arc::clone(inner),
        audio_track,
        audio_rx,
        inner.shutdown.subscribe(),
    ));
}

async fn video_loop(
    inner: Arc<SessionInner>,
    track: Arc<dyn PacketSink>,
    mut rx: mpsc::Receiver<VideoPacket>,
    mut shutdown: watch::Receiver<bool>,
) {
    log::debug!("Session {}: video loop started", inner.id);
    let mut fps = FpsEstimator::new();
    let mut draining = false;

    loop {
        let packet = if draining {
            rx.recv().await
        } else {
            tokio::select! {
                _ = shutdown.wait_for(|stop| *stop) => {
                    rx.close();
                    draining = true;
                    continue;
                }
                packet = rx.recv() => packet,
            }
        };
        // Queue closed and drained.
        let Some(packet) = packet else { break };

        if let Err(e) = track.write_packet(&packet).await {
            log::warn!(
                "Session {}: video write failed, stopping session: {}",
                inner.id,
                e
            );
            SessionInner::stop_session(&inner).await;
            break;
        }

        let smoothed = fps.update(Instant::now());
        inner.stats.record_video_frame(smoothed);
    }

    log::debug!("Session {}: video loop exited", inner.id);
}

async fn audio_loop(
    inner: Arc<SessionInner>,
    track: Arc<dyn SampleSink>,
    mut rx: mpsc::Receiver<Bytes>,
    mut shutdown: watch::Receiver<bool>,
) {
    log::debug!("Session {}: audio loop started", inner.id);
    let mut draining = false;

    loop {
        let frame = if draining {
            rx.recv().await
        } else {
            tokio::select! {
                _ = shutdown.wait_for(|stop| *stop) => {
                    rx.close();
                    draining = true;
                    continue;
                }
                frame = rx.recv() => frame,
            }
        };
        let Some(data) = frame else { break };

        // Never write into a transport that is being torn down.
        if !inner.is_connected() {
            log::debug!("Session {}: audio loop exiting, no longer connected", inner.id);
            break;
        }

        if let Err(e) = track.write_sample(data, AUDIO_SAMPLES_PER_FRAME).await {
            log::warn!("Session {}: audio write failed: {}", inner.id, e);
        } else {
            inner.stats.record_audio_frame();
        }
    }

    log::debug!("Session {}: audio loop exited", inner.id);
}
