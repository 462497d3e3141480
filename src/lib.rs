//! CrabCast: WebRTC media session management and real-time streaming
//!
//! This crate manages one bidirectional media session between a capture/
//! encoder pipeline and a remote peer: offer/answer negotiation with trickle
//! ICE, bounded frame queues with backpressure, concurrent video/audio
//! delivery into the transport, and race-free teardown.
//!
//! # Features
//! - Offer/answer negotiation over any text signaling channel
//! - Incremental (trickle) connectivity-candidate exchange
//! - Bounded video/audio/input queues decoupling producers from delivery
//! - Concurrent streaming pipeline with deterministic, idempotent teardown
//! - Abstract transport capability with a production `webrtc` backend and an
//!   offline mock for tests
//!
//! # Usage
//! ```rust,ignore
//! use crabcast::{MediaSession, SessionConfig};
//! use std::sync::Arc;
//!
//! # async fn run() -> Result<(), crabcast::SessionError> {
//! let session = MediaSession::with_webrtc(SessionConfig::default());
//! let offer = session
//!     .start(Arc::new(|candidate| send_to_peer(candidate)), 12345)
//!     .await?;
//! send_to_peer(offer);
//!
//! // ... answer arrives from the remote peer:
//! session.set_remote_answer(&answer).await?;
//! # Ok(())
//! # }
//! ```
pub mod config;
pub mod errors;
pub mod session;
pub mod signaling;
pub mod testing;
pub mod transport;
pub mod types;

// Re-exports for convenience
pub use config::{IceServerConfig, MediaConfig, SessionConfig, TransportConfig};
pub use errors::SessionError;
pub use session::{MediaSession, OnIceCallback, SessionStats};
pub use signaling::{CandidateInit, SdpKind, SdpPayload, SessionDescription};
pub use transport::webrtc::WebRtcTransportFactory;
pub use transport::{MediaTransport, PacketSink, SampleSink, TransportFactory};
pub use types::{SessionState, StatsSnapshot, TransportState, VideoPacket};

/// Initialize logging for the streaming stack
pub fn init_logging() {
    if std::env::var("RUST_LOG").is_err() {
        std::env::set_var("RUST_LOG", "crabcast=info");
    }
    let _ = env_logger::try_init();
}

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const NAME: &str = env!("CARGO_PKG_NAME");
pub const DESCRIPTION: &str = env!("CARGO_PKG_DESCRIPTION");
