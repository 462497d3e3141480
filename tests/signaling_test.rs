//! Signaling codec round-trip and malformed-input tests
//!
//! Every representable signaling message must survive encode/decode
//! bit-exact, and every malformed payload must fail with a decode error,
//! never a panic.

use crabcast::signaling::{decode, encode};
use crabcast::{CandidateInit, SdpKind, SdpPayload, SessionDescription, SessionError};
use proptest::prelude::*;

fn sample_description(kind: SdpKind) -> SessionDescription {
    SessionDescription {
        kind,
        sdp: "v=0\r\no=- 4611731400430051336 2 IN IP4 127.0.0.1\r\ns=-\r\nt=0 0\r\n".to_string(),
    }
}

#[test]
fn test_offer_payload_round_trip() {
    let payload = SdpPayload {
        sdp: sample_description(SdpKind::Offer),
        id: "9b1deb4d".to_string(),
        ts: 1722945600,
    };

    let encoded = encode(&payload).unwrap();
    assert!(!encoded.is_empty());
    let decoded: SdpPayload = decode(&encoded).unwrap();
    assert_eq!(decoded, payload);
}

#[test]
fn test_answer_payload_round_trip() {
    let payload = SdpPayload {
        sdp: sample_description(SdpKind::Answer),
        id: "c8f1a2b3".to_string(),
        ts: 0,
    };

    let decoded: SdpPayload = decode(&encode(&payload).unwrap()).unwrap();
    assert_eq!(decoded.sdp.kind, SdpKind::Answer);
    assert_eq!(decoded, payload);
}

#[test]
fn test_candidate_round_trip_with_sparse_fields() {
    let candidate = CandidateInit {
        candidate: "candidate:842163049 1 udp 1677729535 10.0.0.5 43877 typ srflx".to_string(),
        sdp_mid: None,
        sdp_mline_index: None,
        username_fragment: None,
    };

    let decoded: CandidateInit = decode(&encode(&candidate).unwrap()).unwrap();
    assert_eq!(decoded, candidate);
}

#[test]
fn test_decode_rejects_garbage() {
    for input in ["", "!!!", "abc", "%%%%", "bm90IGpzb24="] {
        let result: Result<SdpPayload, _> = decode(input);
        assert!(
            matches!(result, Err(SessionError::Decode(_))),
            "input {:?} should fail with a decode error",
            input
        );
    }
}

#[test]
fn test_decode_rejects_wrong_message_shape() {
    // A candidate is valid JSON but not an SDP payload.
    let candidate = CandidateInit {
        candidate: "candidate:1 1 UDP 2122260223 192.168.1.1 5000 typ host".to_string(),
        sdp_mid: Some("0".to_string()),
        sdp_mline_index: Some(0),
        username_fragment: None,
    };
    let encoded = encode(&candidate).unwrap();

    let result: Result<SdpPayload, _> = decode(&encoded);
    assert!(matches!(result, Err(SessionError::Decode(_))));
}

proptest! {
    #[test]
    fn prop_sdp_payload_round_trip(
        sdp in ".*",
        id in "[0-9a-f]{1,32}",
        ts in any::<i64>(),
        kind_index in 0usize..4,
    ) {
        let kinds = [SdpKind::Offer, SdpKind::Answer, SdpKind::Pranswer, SdpKind::Rollback];
        let payload = SdpPayload {
            sdp: SessionDescription { kind: kinds[kind_index], sdp },
            id,
            ts,
        };

        let encoded = encode(&payload).unwrap();
        let decoded: SdpPayload = decode(&encoded).unwrap();
        prop_assert_eq!(decoded, payload);
    }

    #[test]
    fn prop_candidate_round_trip(
        candidate in ".*",
        sdp_mid in proptest::option::of(".*"),
        sdp_mline_index in proptest::option::of(any::<u16>()),
        username_fragment in proptest::option::of(".*"),
    ) {
        let message = CandidateInit { candidate, sdp_mid, sdp_mline_index, username_fragment };

        let encoded = encode(&message).unwrap();
        let decoded: CandidateInit = decode(&encoded).unwrap();
        prop_assert_eq!(decoded, message);
    }

    #[test]
    fn prop_decode_never_panics(input in ".*") {
        // Arbitrary input must produce Ok or a decode error, never a panic.
        let _: Result<SdpPayload, _> = decode(&input);
        let _: Result<CandidateInit, _> = decode(&input);
    }
}
