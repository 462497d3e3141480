//! Abstract media transport capability.
//!
//! The session core never talks to a concrete connection. It drives this
//! capability: track creation, offer/answer description exchange, candidate
//! pass-through, connectivity events, and teardown. The production
//! implementation lives in [`webrtc`]; a recording implementation for offline
//! tests lives in [`crate::testing`].

pub mod webrtc;

use crate::errors::SessionError;
use crate::signaling::{CandidateInit, SessionDescription};
use crate::types::{TransportState, VideoPacket};
use async_trait::async_trait;
use bytes::Bytes;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use crate::config::TransportConfig;

/// Handler invoked on every transport connectivity-state change.
pub type OnConnectionStateChangeFn = Box<
    dyn (FnMut(TransportState) -> Pin<Box<dyn Future<Output = ()> + Send + 'static>>)
        + Send
        + Sync,
>;

/// Handler invoked for each discovered local candidate; `None` marks the end
/// of candidate enumeration.
pub type OnCandidateFn = Box<
    dyn (FnMut(Option<CandidateInit>) -> Pin<Box<dyn Future<Output = ()> + Send + 'static>>)
        + Send
        + Sync,
>;

/// Creates transport connections from explicit configuration.
#[async_trait]
pub trait TransportFactory: Send + Sync {
    async fn create(&self, config: &TransportConfig) -> Result<Arc<dyn MediaTransport>, SessionError>;
}

/// One transport connection to a remote peer.
#[async_trait]
pub trait MediaTransport: Send + Sync {
    /// Create and attach the outgoing video track.
    async fn create_video_track(
        &self,
        sync_source_id: u32,
        stream_label: &str,
    ) -> Result<Arc<dyn PacketSink>, SessionError>;

    /// Create and attach the outgoing audio track.
    async fn create_audio_track(
        &self,
        sync_source_id: u32,
        stream_label: &str,
    ) -> Result<Arc<dyn SampleSink>, SessionError>;

    async fn create_offer(&self) -> Result<SessionDescription, SessionError>;

    async fn set_local_description(&self, desc: SessionDescription) -> Result<(), SessionError>;

    async fn set_remote_description(&self, desc: SessionDescription) -> Result<(), SessionError>;

    /// Apply one remote connectivity candidate. Implementations own ICE
    /// sequencing; candidates may arrive in any order relative to the remote
    /// description.
    async fn add_candidate(&self, candidate: CandidateInit) -> Result<(), SessionError>;

    fn on_connection_state_change(&self, handler: OnConnectionStateChangeFn);

    fn on_candidate(&self, handler: OnCandidateFn);

    async fn close(&self) -> Result<(), SessionError>;
}

/// Write end of a video track.
#[async_trait]
pub trait PacketSink: Send + Sync {
    /// Write one packet, preserving its embedded timestamp and sequencing.
    async fn write_packet(&self, packet: &VideoPacket) -> Result<(), SessionError>;
}

/// Write end of an audio track.
#[async_trait]
pub trait SampleSink: Send + Sync {
    /// Write one timed unit of `sample_count` interleaved samples.
    async fn write_sample(&self, data: Bytes, sample_count: u32) -> Result<(), SessionError>;
}
