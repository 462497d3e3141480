//! Testing utilities for crabcast
//!
//! Provides a recording mock of the transport capability so session
//! lifecycle, negotiation, and pipeline behavior can be exercised offline,
//! with no network or media stack.

use crate::config::TransportConfig;
use crate::errors::SessionError;
use crate::signaling::{CandidateInit, SdpKind, SessionDescription};
use crate::transport::{
    MediaTransport, OnCandidateFn, OnConnectionStateChangeFn, PacketSink, SampleSink,
    TransportFactory,
};
use crate::types::{TransportState, VideoPacket};
use async_trait::async_trait;
use bytes::Bytes;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// Factory that hands out [`MockTransport`] instances and remembers them so
/// tests can drive events and inspect recorded calls.
#[derive(Default)]
pub struct MockTransportFactory {
    created: Mutex<Vec<Arc<MockTransport>>>,
    fail_create: AtomicBool,
    fail_tracks_on_create: AtomicBool,
    fail_offer_on_create: AtomicBool,
}

impl MockTransportFactory {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Most recently created transport, if any.
    pub fn transport(&self) -> Option<Arc<MockTransport>> {
        self.created.lock().expect("lock poisoned").last().cloned()
    }

    pub fn created_count(&self) -> usize {
        self.created.lock().expect("lock poisoned").len()
    }

    /// Make the next `create` call fail with a transport error.
    pub fn fail_next_create(&self) {
        self.fail_create.store(true, Ordering::SeqCst);
    }

    /// Make the next created transport reject track creation.
    pub fn fail_tracks_on_create(&self) {
        self.fail_tracks_on_create.store(true, Ordering::SeqCst);
    }

    /// Make the next created transport reject its first offer.
    pub fn fail_offer_on_create(&self) {
        self.fail_offer_on_create.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl TransportFactory for MockTransportFactory {
    async fn create(
        &self,
        _config: &TransportConfig,
    ) -> Result<Arc<dyn MediaTransport>, SessionError> {
        if self.fail_create.swap(false, Ordering::SeqCst) {
            return Err(SessionError::Transport(
                "mock: connection refused".to_string(),
            ));
        }
        let transport = Arc::new(MockTransport::default());
        if self.fail_tracks_on_create.swap(false, Ordering::SeqCst) {
            transport.fail_track_creation();
        }
        if self.fail_offer_on_create.swap(false, Ordering::SeqCst) {
            transport.fail_next_offer();
        }
        self.created
            .lock()
            .expect("lock poisoned")
            .push(Arc::clone(&transport));
        Ok(transport)
    }
}

/// Recording implementation of the transport capability.
#[derive(Default)]
pub struct MockTransport {
    video_tracks: Mutex<Vec<Arc<MockTrack>>>,
    audio_tracks: Mutex<Vec<Arc<MockTrack>>>,
    offers_created: AtomicUsize,
    local_descriptions: Mutex<Vec<SessionDescription>>,
    remote_descriptions: Mutex<Vec<SessionDescription>>,
    candidates: Mutex<Vec<CandidateInit>>,
    close_calls: AtomicUsize,
    state_handler: Mutex<Option<OnConnectionStateChangeFn>>,
    candidate_handler: Mutex<Option<OnCandidateFn>>,
    fail_offer: AtomicBool,
    fail_tracks: AtomicBool,
    fail_remote_description: AtomicBool,
}

impl MockTransport {
    /// Deliver a connectivity-state event to the registered handler, the way
    /// the real transport would.
    pub async fn fire_connection_state(&self, state: TransportState) {
        let future = {
            let mut guard = self.state_handler.lock().expect("lock poisoned");
            guard.as_mut().map(|handler| handler(state))
        };
        if let Some(future) = future {
            future.await;
        }
    }

    /// Deliver a discovered-candidate event (`None` = enumeration finished).
    pub async fn fire_candidate(&self, candidate: Option<CandidateInit>) {
        let future = {
            let mut guard = self.candidate_handler.lock().expect("lock poisoned");
            guard.as_mut().map(|handler| handler(candidate))
        };
        if let Some(future) = future {
            future.await;
        }
    }

    pub fn video_track(&self) -> Option<Arc<MockTrack>> {
        self.video_tracks.lock().expect("lock poisoned").first().cloned()
    }

    pub fn audio_track(&self) -> Option<Arc<MockTrack>> {
        self.audio_tracks.lock().expect("lock poisoned").first().cloned()
    }

    pub fn close_calls(&self) -> usize {
        self.close_calls.load(Ordering::SeqCst)
    }

    pub fn offers_created(&self) -> usize {
        self.offers_created.load(Ordering::SeqCst)
    }

    pub fn local_descriptions(&self) -> Vec<SessionDescription> {
        self.local_descriptions.lock().expect("lock poisoned").clone()
    }

    pub fn remote_descriptions(&self) -> Vec<SessionDescription> {
        self.remote_descriptions.lock().expect("lock poisoned").clone()
    }

    pub fn candidates(&self) -> Vec<CandidateInit> {
        self.candidates.lock().expect("lock poisoned").clone()
    }

    pub fn fail_next_offer(&self) {
        self.fail_offer.store(true, Ordering::SeqCst);
    }

    pub fn fail_track_creation(&self) {
        self.fail_tracks.store(true, Ordering::SeqCst);
    }

    pub fn fail_remote_description(&self) {
        self.fail_remote_description.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl MediaTransport for MockTransport {
    async fn create_video_track(
        &self,
        sync_source_id: u32,
        stream_label: &str,
    ) -> Result<Arc<dyn PacketSink>, SessionError> {
        if self.fail_tracks.load(Ordering::SeqCst) {
            return Err(SessionError::Transport("mock: track rejected".to_string()));
        }
        let track = Arc::new(MockTrack::new(sync_source_id, stream_label));
        self.video_tracks
            .lock()
            .expect("lock poisoned")
            .push(Arc::clone(&track));
        Ok(track)
    }

    async fn create_audio_track(
        &self,
        sync_source_id: u32,
        stream_label: &str,
    ) -> Result<Arc<dyn SampleSink>, SessionError> {
        if self.fail_tracks.load(Ordering::SeqCst) {
            return Err(SessionError::Transport("mock: track rejected".to_string()));
        }
        let track = Arc::new(MockTrack::new(sync_source_id, stream_label));
        self.audio_tracks
            .lock()
            .expect("lock poisoned")
            .push(Arc::clone(&track));
        Ok(track)
    }

    async fn create_offer(&self) -> Result<SessionDescription, SessionError> {
        if self.fail_offer.swap(false, Ordering::SeqCst) {
            return Err(SessionError::Transport("mock: offer failed".to_string()));
        }
        self.offers_created.fetch_add(1, Ordering::SeqCst);
        Ok(SessionDescription {
            kind: SdpKind::Offer,
            sdp: "v=0\r\no=- 0 0 IN IP4 127.0.0.1\r\ns=-\r\nt=0 0\r\n".to_string(),
        })
    }

    async fn set_local_description(&self, desc: SessionDescription) -> Result<(), SessionError> {
        self.local_descriptions
            .lock()
            .expect("lock poisoned")
            .push(desc);
        Ok(())
    }

    async fn set_remote_description(&self, desc: SessionDescription) -> Result<(), SessionError> {
        if self.fail_remote_description.swap(false, Ordering::SeqCst) {
            return Err(SessionError::Transport(
                "mock: description rejected".to_string(),
            ));
        }
        self.remote_descriptions
            .lock()
            .expect("lock poisoned")
            .push(desc);
        Ok(())
    }

    async fn add_candidate(&self, candidate: CandidateInit) -> Result<(), SessionError> {
        // The real transport owns ICE sequencing and accepts candidates in
        // any order; the mock just records them.
        self.candidates.lock().expect("lock poisoned").push(candidate);
        Ok(())
    }

    fn on_connection_state_change(&self, handler: OnConnectionStateChangeFn) {
        *self.state_handler.lock().expect("lock poisoned") = Some(handler);
    }

    fn on_candidate(&self, handler: OnCandidateFn) {
        *self.candidate_handler.lock().expect("lock poisoned") = Some(handler);
    }

    async fn close(&self) -> Result<(), SessionError> {
        self.close_calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// A track that records every write.
pub struct MockTrack {
    pub sync_source_id: u32,
    pub stream_label: String,
    packets: Mutex<Vec<VideoPacket>>,
    samples: Mutex<Vec<(Bytes, u32)>>,
    fail_writes: AtomicBool,
}

impl MockTrack {
    fn new(sync_source_id: u32, stream_label: &str) -> Self {
        Self {
            sync_source_id,
            stream_label: stream_label.to_string(),
            packets: Mutex::new(Vec::new()),
            samples: Mutex::new(Vec::new()),
            fail_writes: AtomicBool::new(false),
        }
    }

    pub fn packets(&self) -> Vec<VideoPacket> {
        self.packets.lock().expect("lock poisoned").clone()
    }

    pub fn samples(&self) -> Vec<(Bytes, u32)> {
        self.samples.lock().expect("lock poisoned").clone()
    }

    /// Make every subsequent write fail, as a broken transport would.
    pub fn fail_writes(&self) {
        self.fail_writes.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl PacketSink for MockTrack {
    async fn write_packet(&self, packet: &VideoPacket) -> Result<(), SessionError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(SessionError::Transport("mock: write failed".to_string()));
        }
        self.packets
            .lock()
            .expect("lock poisoned")
            .push(packet.clone());
        Ok(())
    }
}

#[async_trait]
impl SampleSink for MockTrack {
    async fn write_sample(&self, data: Bytes, sample_count: u32) -> Result<(), SessionError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(SessionError::Transport("mock: write failed".to_string()));
        }
        self.samples
            .lock()
            .expect("lock poisoned")
            .push((data, sample_count));
        Ok(())
    }
}
