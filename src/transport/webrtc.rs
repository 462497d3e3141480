//! Production transport backed by the `webrtc` crate.
//!
//! VP8 packets go out through a static RTP track (`write_rtp`), Opus audio
//! through a static sample track (`write_sample`). Remote candidates that
//! arrive before the remote description is applied are queued and flushed
//! afterwards, so callers may pass candidates through in any order.

use crate::config::{IceServerConfig, TransportConfig};
use crate::errors::SessionError;
use crate::signaling::{CandidateInit, SdpKind, SessionDescription};
use crate::transport::{
    MediaTransport, OnCandidateFn, OnConnectionStateChangeFn, PacketSink, SampleSink,
    TransportFactory,
};
use crate::types::{TransportState, VideoPacket, AUDIO_CHANNELS, AUDIO_SAMPLE_RATE};
use async_trait::async_trait;
use bytes::Bytes;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use webrtc::api::interceptor_registry::register_default_interceptors;
use webrtc::api::media_engine::{MediaEngine, MIME_TYPE_OPUS, MIME_TYPE_VP8};
use webrtc::api::APIBuilder;
use webrtc::ice_transport::ice_candidate::{RTCIceCandidate, RTCIceCandidateInit};
use webrtc::ice_transport::ice_server::RTCIceServer;
use webrtc::interceptor::registry::Registry;
use webrtc::media::Sample;
use webrtc::peer_connection::configuration::RTCConfiguration;
use webrtc::peer_connection::peer_connection_state::RTCPeerConnectionState;
use webrtc::peer_connection::sdp::sdp_type::RTCSdpType;
use webrtc::peer_connection::sdp::session_description::RTCSessionDescription;
use webrtc::peer_connection::RTCPeerConnection;
use webrtc::rtp_transceiver::rtp_codec::RTCRtpCodecCapability;
use webrtc::rtp_transceiver::rtp_sender::RTCRtpSender;
use webrtc::track::track_local::track_local_static_rtp::TrackLocalStaticRTP;
use webrtc::track::track_local::track_local_static_sample::TrackLocalStaticSample;
use webrtc::track::track_local::{TrackLocal, TrackLocalWriter};

/// Creates peer connections with default codecs and interceptors.
#[derive(Debug, Default)]
pub struct WebRtcTransportFactory;

impl WebRtcTransportFactory {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl TransportFactory for WebRtcTransportFactory {
    async fn create(
        &self,
        config: &TransportConfig,
    ) -> Result<Arc<dyn MediaTransport>, SessionError> {
        let mut media_engine = MediaEngine::default();
        media_engine
            .register_default_codecs()
            .map_err(SessionError::transport)?;

        let registry = register_default_interceptors(Registry::new(), &mut media_engine)
            .map_err(SessionError::transport)?;

        let api = APIBuilder::new()
            .with_media_engine(media_engine)
            .with_interceptor_registry(registry)
            .build();

        let rtc_config = RTCConfiguration {
            ice_servers: config.ice_servers.iter().map(to_rtc_ice_server).collect(),
            ..Default::default()
        };

        let peer_connection = api
            .new_peer_connection(rtc_config)
            .await
            .map_err(SessionError::transport)?;

        Ok(Arc::new(WebRtcTransport {
            peer_connection: Arc::new(peer_connection),
            pending_candidates: Mutex::new(Vec::new()),
        }))
    }
}

/// One peer connection plus its candidate staging area.
pub struct WebRtcTransport {
    peer_connection: Arc<RTCPeerConnection>,
    /// Remote candidates received before the remote description.
    pending_candidates: Mutex<Vec<RTCIceCandidateInit>>,
}

#[async_trait]
impl MediaTransport for WebRtcTransport {
    async fn create_video_track(
        &self,
        sync_source_id: u32,
        stream_label: &str,
    ) -> Result<Arc<dyn PacketSink>, SessionError> {
        // Wire SSRCs are assigned at sender binding; the caller's sync source
        // id keys the track id so packet streams stay attributable.
        let track = Arc::new(TrackLocalStaticRTP::new(
            RTCRtpCodecCapability {
                mime_type: MIME_TYPE_VP8.to_owned(),
                ..Default::default()
            },
            format!("video-{}", sync_source_id),
            stream_label.to_owned(),
        ));

        let sender = self
            .peer_connection
            .add_track(Arc::clone(&track) as Arc<dyn TrackLocal + Send + Sync>)
            .await
            .map_err(SessionError::transport)?;
        spawn_rtcp_drain(sender);

        log::info!("Added video track ssrc={}", sync_source_id);
        Ok(Arc::new(RtpPacketTrack { track }))
    }

    async fn create_audio_track(
        &self,
        sync_source_id: u32,
        stream_label: &str,
    ) -> Result<Arc<dyn SampleSink>, SessionError> {
        let track = Arc::new(TrackLocalStaticSample::new(
            RTCRtpCodecCapability {
                mime_type: MIME_TYPE_OPUS.to_owned(),
                ..Default::default()
            },
            format!("audio-{}", sync_source_id),
            stream_label.to_owned(),
        ));

        let sender = self
            .peer_connection
            .add_track(Arc::clone(&track) as Arc<dyn TrackLocal + Send + Sync>)
            .await
            .map_err(SessionError::transport)?;
        spawn_rtcp_drain(sender);

        log::info!("Added audio track ssrc={}", sync_source_id);
        Ok(Arc::new(SampleTrack { track }))
    }

    async fn create_offer(&self) -> Result<SessionDescription, SessionError> {
        let offer = self
            .peer_connection
            .create_offer(None)
            .await
            .map_err(SessionError::transport)?;
        Ok(from_rtc_description(&offer))
    }

    async fn set_local_description(&self, desc: SessionDescription) -> Result<(), SessionError> {
        let rtc_desc = to_rtc_description(&desc)?;
        self.peer_connection
            .set_local_description(rtc_desc)
            .await
            .map_err(SessionError::transport)
    }

    async fn set_remote_description(&self, desc: SessionDescription) -> Result<(), SessionError> {
        let rtc_desc = to_rtc_description(&desc)?;
        self.peer_connection
            .set_remote_description(rtc_desc)
            .await
            .map_err(SessionError::transport)?;

        // Remote description is in; flush candidates that arrived early.
        let pending: Vec<RTCIceCandidateInit> =
            self.pending_candidates.lock().await.drain(..).collect();
        for candidate in pending {
            if let Err(e) = self.peer_connection.add_ice_candidate(candidate).await {
                log::warn!("Failed to apply queued candidate: {}", e);
            }
        }
        Ok(())
    }

    async fn add_candidate(&self, candidate: CandidateInit) -> Result<(), SessionError> {
        let init = RTCIceCandidateInit {
            candidate: candidate.candidate,
            sdp_mid: candidate.sdp_mid,
            sdp_mline_index: candidate.sdp_mline_index,
            username_fragment: candidate.username_fragment,
        };

        if self.peer_connection.remote_description().await.is_none() {
            log::debug!("Remote description not set yet, queuing candidate");
            self.pending_candidates.lock().await.push(init);
            return Ok(());
        }

        self.peer_connection
            .add_ice_candidate(init)
            .await
            .map_err(SessionError::transport)
    }

    fn on_connection_state_change(&self, mut handler: OnConnectionStateChangeFn) {
        self.peer_connection
            .on_peer_connection_state_change(Box::new(move |state: RTCPeerConnectionState| {
                handler(from_rtc_state(state))
            }));
    }

    fn on_candidate(&self, mut handler: OnCandidateFn) {
        self.peer_connection
            .on_ice_candidate(Box::new(move |candidate: Option<RTCIceCandidate>| {
                match candidate {
                    Some(c) => match c.to_json() {
                        Ok(init) => handler(Some(CandidateInit {
                            candidate: init.candidate,
                            sdp_mid: init.sdp_mid,
                            sdp_mline_index: init.sdp_mline_index,
                            username_fragment: init.username_fragment,
                        })),
                        Err(e) => {
                            log::warn!("Failed to serialize local candidate: {}", e);
                            Box::pin(async {})
                        }
                    },
                    // End of candidate enumeration.
                    None => handler(None),
                }
            }));
    }

    async fn close(&self) -> Result<(), SessionError> {
        self.peer_connection
            .close()
            .await
            .map_err(SessionError::transport)
    }
}

struct RtpPacketTrack {
    track: Arc<TrackLocalStaticRTP>,
}

#[async_trait]
impl PacketSink for RtpPacketTrack {
    async fn write_packet(&self, packet: &VideoPacket) -> Result<(), SessionError> {
        let rtp_packet = webrtc::rtp::packet::Packet {
            header: webrtc::rtp::header::Header {
                version: 2,
                marker: packet.marker,
                sequence_number: packet.sequence_number,
                timestamp: packet.timestamp,
                ..Default::default()
            },
            payload: packet.payload.clone(),
        };

        self.track
            .write_rtp(&rtp_packet)
            .await
            .map(|_| ())
            .map_err(SessionError::transport)
    }
}

struct SampleTrack {
    track: Arc<TrackLocalStaticSample>,
}

#[async_trait]
impl SampleSink for SampleTrack {
    async fn write_sample(&self, data: Bytes, sample_count: u32) -> Result<(), SessionError> {
        // sample_count is interleaved across channels; the track wants the
        // per-channel duration of the unit.
        let per_channel = (sample_count / AUDIO_CHANNELS).max(1);
        let duration = Duration::from_secs_f64(f64::from(per_channel) / f64::from(AUDIO_SAMPLE_RATE));

        let sample = Sample {
            data,
            duration,
            ..Default::default()
        };

        self.track
            .write_sample(&sample)
            .await
            .map_err(SessionError::transport)
    }
}

/// Read and discard incoming RTCP for a sender so interceptors keep running.
fn spawn_rtcp_drain(sender: Arc<RTCRtpSender>) {
    tokio::spawn(async move {
        let mut rtcp_buf = vec![0u8; 1500];
        while let Ok((_, _)) = sender.read(&mut rtcp_buf).await {}
    });
}

fn to_rtc_ice_server(server: &IceServerConfig) -> RTCIceServer {
    RTCIceServer {
        urls: server.urls.clone(),
        username: server.username.clone().unwrap_or_default(),
        credential: server.credential.clone().unwrap_or_default(),
        ..Default::default()
    }
}

fn to_rtc_description(desc: &SessionDescription) -> Result<RTCSessionDescription, SessionError> {
    match desc.kind {
        SdpKind::Offer => RTCSessionDescription::offer(desc.sdp.clone())
            .map_err(|e| SessionError::Transport(format!("invalid SDP offer: {}", e))),
        SdpKind::Answer => RTCSessionDescription::answer(desc.sdp.clone())
            .map_err(|e| SessionError::Transport(format!("invalid SDP answer: {}", e))),
        SdpKind::Pranswer => RTCSessionDescription::pranswer(desc.sdp.clone())
            .map_err(|e| SessionError::Transport(format!("invalid SDP pranswer: {}", e))),
        SdpKind::Rollback => Err(SessionError::Transport(
            "rollback descriptions are not supported".to_string(),
        )),
    }
}

fn from_rtc_description(desc: &RTCSessionDescription) -> SessionDescription {
    let kind = match desc.sdp_type {
        RTCSdpType::Offer | RTCSdpType::Unspecified => SdpKind::Offer,
        RTCSdpType::Answer => SdpKind::Answer,
        RTCSdpType::Pranswer => SdpKind::Pranswer,
        RTCSdpType::Rollback => SdpKind::Rollback,
    };
    SessionDescription {
        kind,
        sdp: desc.sdp.clone(),
    }
}

fn from_rtc_state(state: RTCPeerConnectionState) -> TransportState {
    match state {
        RTCPeerConnectionState::New | RTCPeerConnectionState::Unspecified => TransportState::New,
        RTCPeerConnectionState::Connecting => TransportState::Connecting,
        RTCPeerConnectionState::Connected => TransportState::Connected,
        RTCPeerConnectionState::Disconnected => TransportState::Disconnected,
        RTCPeerConnectionState::Failed => TransportState::Failed,
        RTCPeerConnectionState::Closed => TransportState::Closed,
    }
}
