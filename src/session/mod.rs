//! Session lifecycle: negotiation, connectivity events, streaming, teardown.
//!
//! A [`MediaSession`] runs one offer/answer negotiation and one streaming
//! phase, then stops for good. Teardown is guarded by a single atomic
//! transition: however many triggers race (remote failure event, explicit
//! stop, fatal write error), exactly one of them closes the transport and the
//! queues.

mod pipeline;
pub(crate) mod queues;
pub mod stats;

pub use stats::{FpsEstimator, SessionStats};

use crate::config::SessionConfig;
use crate::errors::SessionError;
use crate::signaling::{self, CandidateInit, SdpPayload};
use crate::transport::webrtc::WebRtcTransportFactory;
use crate::transport::{MediaTransport, PacketSink, SampleSink, TransportFactory};
use crate::types::{SessionState, StatsSnapshot, TransportState, VideoPacket};
use bytes::Bytes;
use queues::FrameQueues;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::{mpsc, watch};
use uuid::Uuid;

/// Callback delivering each encoded local candidate to the signaling channel.
/// An empty string marks the end of candidate enumeration.
pub type OnIceCallback = Arc<dyn Fn(String) + Send + Sync>;

/// One negotiated media session.
///
/// Cheap to clone; all clones observe the same session.
#[derive(Clone)]
pub struct MediaSession {
    inner: Arc<SessionInner>,
}

pub(crate) struct SessionInner {
    pub(crate) id: String,
    config: SessionConfig,
    factory: Arc<dyn TransportFactory>,
    state: AtomicU8,
    transport: tokio::sync::Mutex<Option<Arc<dyn MediaTransport>>>,
    video_track: Mutex<Option<Arc<dyn PacketSink>>>,
    audio_track: Mutex<Option<Arc<dyn SampleSink>>>,
    pub(crate) queues: FrameQueues,
    pub(crate) shutdown: watch::Sender<bool>,
    pub(crate) stats: SessionStats,
}

impl MediaSession {
    /// Create an idle session from explicit configuration and a transport
    /// factory.
    pub fn new(config: SessionConfig, factory: Arc<dyn TransportFactory>) -> Self {
        let (shutdown, _) = watch::channel(false);
        Self {
            inner: Arc::new(SessionInner {
                id: Uuid::new_v4().to_string(),
                config,
                factory,
                state: AtomicU8::new(SessionState::Idle as u8),
                transport: tokio::sync::Mutex::new(None),
                video_track: Mutex::new(None),
                audio_track: Mutex::new(None),
                queues: FrameQueues::new(),
                shutdown,
                stats: SessionStats::new(),
            }),
        }
    }

    /// Create an idle session backed by the production WebRTC transport.
    pub fn with_webrtc(config: SessionConfig) -> Self {
        Self::new(config, Arc::new(WebRtcTransportFactory::new()))
    }

    pub fn id(&self) -> &str {
        &self.inner.id
    }

    pub fn state(&self) -> SessionState {
        SessionState::from_u8(self.inner.state.load(Ordering::Acquire))
    }

    /// Lock-free observation of current connectivity.
    pub fn is_connected(&self) -> bool {
        self.inner.is_connected()
    }

    /// Smoothed video frame rate as measured by the video loop.
    pub fn current_fps(&self) -> f64 {
        self.inner.stats.current_fps()
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.inner.stats.snapshot()
    }

    /// Begin negotiation: allocate the transport, attach tracks, register
    /// connectivity handlers, and return the encoded local offer.
    ///
    /// Only an idle session can start. Sessions are single-shot: once stopped
    /// they stay stopped, and a new `MediaSession` is created per negotiation.
    pub async fn start(
        &self,
        ice_callback: OnIceCallback,
        video_ssrc: u32,
    ) -> Result<String, SessionError> {
        if !self
            .inner
            .try_transition(SessionState::Idle, SessionState::Negotiating)
        {
            return Err(SessionError::AlreadyActive(format!(
                "session {} is {:?}",
                self.inner.id,
                self.state()
            )));
        }

        log::info!("Session {}: starting negotiation", self.inner.id);
        match self.negotiate(ice_callback, video_ssrc).await {
            Ok(offer) => Ok(offer),
            Err(e) => {
                // Unwind: never leave a half-initialized session looking active.
                log::warn!("Session {}: start failed, unwinding: {}", self.inner.id, e);
                SessionInner::stop_session(&self.inner).await;
                Err(e)
            }
        }
    }

    async fn negotiate(
        &self,
        ice_callback: OnIceCallback,
        video_ssrc: u32,
    ) -> Result<String, SessionError> {
        let inner = &self.inner;
        let transport = inner.factory.create(&inner.config.transport).await?;
        *inner.transport.lock().await = Some(Arc::clone(&transport));

        let video_track = transport
            .create_video_track(video_ssrc, &inner.config.media.video_stream_label)
            .await?;
        let audio_track = transport
            .create_audio_track(rand::random::<u32>(), &inner.config.media.audio_stream_label)
            .await?;
        *inner.video_track.lock().expect("lock poisoned") = Some(video_track);
        *inner.audio_track.lock().expect("lock poisoned") = Some(audio_track);

        // Register handlers before creating the offer so no early event or
        // candidate is missed. Weak references keep the transport's handler
        // storage from leaking the session.
        let weak = Arc::downgrade(inner);
        transport.on_connection_state_change(Box::new(move |state: TransportState| {
            let weak = weak.clone();
            Box::pin(async move {
                let Some(inner) = weak.upgrade() else { return };
                log::info!("Session {}: transport state {:?}", inner.id, state);
                if state == TransportState::Connected {
                    // Launch off the callback path.
                    tokio::spawn(async move {
                        SessionInner::handle_connected(inner).await;
                    });
                } else if state.is_terminal() {
                    tokio::spawn(async move {
                        SessionInner::stop_session(&inner).await;
                    });
                }
            })
        }));

        let session_id = inner.id.clone();
        transport.on_candidate(Box::new(move |candidate: Option<CandidateInit>| {
            let ice_callback = Arc::clone(&ice_callback);
            let session_id = session_id.clone();
            Box::pin(async move {
                match candidate {
                    Some(candidate) => match signaling::encode(&candidate) {
                        Ok(encoded) => ice_callback(encoded),
                        Err(e) => {
                            log::warn!("Session {}: failed to encode candidate: {}", session_id, e)
                        }
                    },
                    // Enumeration finished; deliver the end-of-candidates sentinel.
                    None => ice_callback(String::new()),
                }
            })
        }));

        let offer = transport.create_offer().await?;
        transport.set_local_description(offer.clone()).await?;

        let payload = SdpPayload {
            sdp: offer,
            id: inner.id.clone(),
            ts: signaling::unix_timestamp(),
        };
        let encoded = signaling::encode(&payload)
            .map_err(|e| SessionError::Transport(format!("offer serialization failed: {}", e)))?;

        log::info!(
            "Session {}: local offer created ({} bytes encoded)",
            inner.id,
            encoded.len()
        );
        Ok(encoded)
    }

    /// Apply the remote answer received over the signaling channel.
    pub async fn set_remote_answer(&self, encoded: &str) -> Result<(), SessionError> {
        let payload: SdpPayload = signaling::decode(encoded)?;
        let transport = self.transport_handle().await?;
        transport.set_remote_description(payload.sdp).await?;
        log::info!("Session {}: remote answer applied", self.inner.id);
        Ok(())
    }

    /// Apply one remote connectivity candidate. Pure pass-through: the
    /// transport owns ICE sequencing, so candidates may arrive in any order
    /// and any number relative to the answer.
    pub async fn add_remote_candidate(&self, encoded: &str) -> Result<(), SessionError> {
        let candidate: CandidateInit = signaling::decode(encoded)?;
        let transport = self.transport_handle().await?;
        transport.add_candidate(candidate).await?;
        log::debug!("Session {}: remote candidate applied", self.inner.id);
        Ok(())
    }

    /// Stop the session. Idempotent and safe to call concurrently from any
    /// number of triggers; only the first caller tears anything down.
    pub async fn stop(&self) {
        SessionInner::stop_session(&self.inner).await;
    }

    /// Push one video packet for delivery. Blocks while the video queue is
    /// full; fails fast once the session is stopped.
    pub async fn push_video(&self, packet: VideoPacket) -> Result<(), SessionError> {
        self.inner.queues.video.push(packet).await
    }

    /// Push one 20 ms audio frame for delivery. Blocks while the audio queue
    /// is full; fails fast once the session is stopped.
    pub async fn push_audio(&self, frame: Bytes) -> Result<(), SessionError> {
        self.inner.queues.audio.push(frame).await
    }

    /// Push one message received from the remote peer.
    pub async fn push_input(&self, message: Bytes) -> Result<(), SessionError> {
        self.inner.queues.input.push(message).await
    }

    /// Claim the consumer end of the input queue. The input lane is drained
    /// outside the session core; this hands it over exactly once.
    pub fn take_input_receiver(&self) -> Option<mpsc::Receiver<Bytes>> {
        self.inner.queues.input.take_receiver()
    }

    async fn transport_handle(&self) -> Result<Arc<dyn MediaTransport>, SessionError> {
        self.inner
            .transport
            .lock()
            .await
            .as_ref()
            .cloned()
            .ok_or_else(|| {
                SessionError::State(format!(
                    "session {} has no active transport ({:?})",
                    self.inner.id,
                    self.state()
                ))
            })
    }
}

impl SessionInner {
    /// Connectivity is derived from the lifecycle state, so the stop
    /// transition itself flips it off before any teardown step runs.
    pub(crate) fn is_connected(&self) -> bool {
        matches!(
            SessionState::from_u8(self.state.load(Ordering::Acquire)),
            SessionState::Connected | SessionState::Streaming
        )
    }

    fn try_transition(&self, from: SessionState, to: SessionState) -> bool {
        self.state
            .compare_exchange(from as u8, to as u8, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// Claim the transition to Stopped. Returns false for every caller but
    /// the winner.
    fn begin_stop(&self) -> bool {
        loop {
            let current = self.state.load(Ordering::Acquire);
            if current == SessionState::Stopped as u8 {
                return false;
            }
            if self
                .state
                .compare_exchange(
                    current,
                    SessionState::Stopped as u8,
                    Ordering::AcqRel,
                    Ordering::Acquire,
                )
                .is_ok()
            {
                return true;
            }
        }
    }

    /// The connected event: mark connectivity and launch the pipeline.
    async fn handle_connected(inner: Arc<SessionInner>) {
        if !inner.try_transition(SessionState::Negotiating, SessionState::Connected) {
            // Stopped already, or a duplicate connected event.
            log::debug!("Session {}: ignoring connected event", inner.id);
            return;
        }

        if !inner.try_transition(SessionState::Connected, SessionState::Streaming) {
            return;
        }

        let video_track = inner.video_track.lock().expect("lock poisoned").take();
        let audio_track = inner.audio_track.lock().expect("lock poisoned").take();
        let (Some(video_track), Some(audio_track)) = (video_track, audio_track) else {
            log::warn!("Session {}: connected without tracks", inner.id);
            return;
        };

        pipeline::launch(&inner, video_track, audio_track);
        log::info!("Session {}: streaming started", inner.id);
    }

    /// Tear the session down exactly once. Claiming the Stopped state also
    /// flips connectivity off; then the pipeline is signalled, the transport
    /// closed, and the queues closed last.
    pub(crate) async fn stop_session(inner: &Arc<SessionInner>) {
        if !inner.begin_stop() {
            log::debug!("Session {}: already stopped", inner.id);
            return;
        }

        log::info!("Session {}: stopping", inner.id);
        inner.shutdown.send_replace(true);

        let transport = inner.transport.lock().await.take();
        if let Some(transport) = transport {
            if let Err(e) = transport.close().await {
                log::warn!("Session {}: transport close failed: {}", inner.id, e);
            }
        }

        // Track handles the pipeline never claimed.
        inner.video_track.lock().expect("lock poisoned").take();
        inner.audio_track.lock().expect("lock poisoned").take();

        // Queues close last, after the transport can no longer feed them.
        inner.queues.close_all();
        log::info!("Session {}: stopped", inner.id);
    }
}
