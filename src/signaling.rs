//! Signaling message encoding.
//!
//! Offers, answers, and connectivity candidates cross the system boundary as
//! opaque strings: the structured message is serialized to JSON and wrapped in
//! standard base64 so it survives any text-based signaling channel (QR codes,
//! copy-paste, chat relays). The encoding is bit-exact reversible.

use crate::errors::SessionError;
use base64::{engine::general_purpose, Engine as _};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// Kind of a session description.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SdpKind {
    Offer,
    Answer,
    Pranswer,
    Rollback,
}

/// A session description as exchanged during offer/answer negotiation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionDescription {
    pub kind: SdpKind,
    pub sdp: String,
}

/// Offer/answer payload with session metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SdpPayload {
    pub sdp: SessionDescription,
    /// Session id of the sender, for correlating the two halves of an exchange.
    pub id: String,
    /// Unix timestamp (seconds) at which the payload was produced.
    pub ts: i64,
}

/// One connectivity candidate, in the init form the transport consumes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidateInit {
    pub candidate: String,
    pub sdp_mid: Option<String>,
    pub sdp_mline_index: Option<u16>,
    pub username_fragment: Option<String>,
}

/// Encode a signaling message to its transport-safe string form.
pub fn encode<T: Serialize>(message: &T) -> Result<String, SessionError> {
    let json = serde_json::to_vec(message)
        .map_err(|e| SessionError::Decode(format!("serialize failed: {}", e)))?;
    Ok(general_purpose::STANDARD.encode(json))
}

/// Decode a signaling message from its transport-safe string form.
pub fn decode<T: DeserializeOwned>(encoded: &str) -> Result<T, SessionError> {
    let bytes = general_purpose::STANDARD
        .decode(encoded)
        .map_err(|e| SessionError::Decode(format!("malformed base64: {}", e)))?;
    serde_json::from_slice(&bytes)
        .map_err(|e| SessionError::Decode(format!("malformed message: {}", e)))
}

/// Current unix timestamp in seconds, for payload metadata.
pub(crate) fn unix_timestamp() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}
