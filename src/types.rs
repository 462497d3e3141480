//! Shared types for session lifecycle and media transport.

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Audio clock rate used by the streaming protocol.
pub const AUDIO_SAMPLE_RATE: u32 = 48_000;
/// Interleaved channel count of one audio frame.
pub const AUDIO_CHANNELS: u32 = 2;
/// Duration of one written audio unit.
pub const AUDIO_FRAME_DURATION: Duration = Duration::from_millis(20);
/// Interleaved samples per written audio unit (20 ms at 48 kHz, 2 channels).
pub const AUDIO_SAMPLES_PER_FRAME: u32 = AUDIO_SAMPLE_RATE / 1000 * 20 * AUDIO_CHANNELS;

/// Session lifecycle state.
///
/// Transitions are monotonic along Idle -> Negotiating -> Connected ->
/// Streaming -> Stopped. Stopped is absorbing: a stopped session is never
/// reused, callers construct a fresh one per negotiation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum SessionState {
    Idle = 0,
    Negotiating = 1,
    Connected = 2,
    Streaming = 3,
    Stopped = 4,
}

impl SessionState {
    pub(crate) fn from_u8(value: u8) -> Self {
        match value {
            0 => SessionState::Idle,
            1 => SessionState::Negotiating,
            2 => SessionState::Connected,
            3 => SessionState::Streaming,
            _ => SessionState::Stopped,
        }
    }
}

/// Connectivity state reported by the transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransportState {
    New,
    Connecting,
    Connected,
    Disconnected,
    Failed,
    Closed,
}

impl TransportState {
    /// States after which the transport will never deliver media again.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TransportState::Failed | TransportState::Closed | TransportState::Disconnected
        )
    }
}

/// One encoded video packet, carrying the caller-chosen RTP sequencing and
/// timestamp. Delivered to the transport verbatim, in arrival order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoPacket {
    pub sequence_number: u16,
    pub timestamp: u32,
    pub marker: bool,
    pub payload: Bytes,
}

/// Point-in-time counters for one session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatsSnapshot {
    pub frames_sent: u64,
    pub samples_sent: u64,
    pub smoothed_fps: f64,
}
