//! End-to-end identity handshake tests.
//!
//! Peers verify each other by exchanging IDENTITY packets as wire strings.
//! Verification is per direction, and message traffic from an unverified
//! sender never reaches the completion backend.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use efficode::completion::{ChatMessage, CompletionBackend, CompletionError};
use efficode::error::ErrorCode;
use efficode::peer::{Peer, PeerRole, Persona};
use efficode::protocol::{wire, AuthState, OpCode, Packet, OPERATOR_SENDER};

#[derive(Clone, Default)]
struct Counting(Arc<AtomicUsize>);

impl CompletionBackend for Counting {
    fn complete(&self, _history: &[ChatMessage]) -> Result<String, CompletionError> {
        self.0.fetch_add(1, Ordering::SeqCst);
        Ok("a considered reply".to_string())
    }
}

impl Counting {
    fn calls(&self) -> usize {
        self.0.load(Ordering::SeqCst)
    }
}

fn peer(name: &str, role: PeerRole, backend: Counting) -> Peer {
    Peer::new(Persona::new(name, role), backend)
}

/// Send `from`'s identity to `to` over the wire and return the decoded reply
fn introduce(from: &Peer, to: &mut Peer) -> Packet {
    let wire_identity = from.identity_packet().to_wire();
    assert_eq!(wire_identity, format!("@DID?value=did:efficode:{}", from.name()));

    let incoming = wire::parse(&wire_identity, from.name()).unwrap();
    let reply = to.respond(incoming);
    wire::parse(&reply, to.name()).unwrap()
}

fn ask(from: &str, to: &mut Peer, content: &str) -> Packet {
    let wire_request = Packet::request(from, content, "question").to_wire();
    let reply = to.respond(wire::parse(&wire_request, from).unwrap());
    wire::parse(&reply, to.name()).unwrap()
}

/// Test one direction of the handshake
#[test]
fn test_identity_exchange_acknowledged() {
    let sage = peer("Sage", PeerRole::Questioner, Counting::default());
    let mut lens = peer("Lens", PeerRole::Answerer, Counting::default());

    let reply = introduce(&sage, &mut lens);
    assert_eq!(reply.op_code, OpCode::Ack);
    assert_eq!(reply.text_param("responder"), Some("Lens"));
    assert_eq!(reply.text_param("status"), Some("success"));
    assert_eq!(lens.auth().state("Sage"), AuthState::Verified);
}

/// Test trust is not automatically mutual
#[test]
fn test_trust_is_per_direction() {
    let sage_backend = Counting::default();
    let lens_backend = Counting::default();
    let mut sage = peer("Sage", PeerRole::Questioner, sage_backend.clone());
    let mut lens = peer("Lens", PeerRole::Answerer, lens_backend.clone());

    assert!(introduce(&sage, &mut lens).is_ack());

    // Lens accepts Sage's question...
    let answer = ask("Sage", &mut lens, "what is time?");
    assert_eq!(answer.op_code, OpCode::Data);
    assert_eq!(lens_backend.calls(), 1);

    // ...but Sage has not verified Lens yet
    let refused = ask("Lens", &mut sage, "and space?");
    assert_eq!(refused.error_code(), Some(ErrorCode::AuthRequired));
    assert_eq!(sage_backend.calls(), 0);

    assert!(introduce(&lens, &mut sage).is_ack());
    let follow_up = ask("Lens", &mut sage, "and space?");
    assert_eq!(follow_up.op_code, OpCode::Request);
    assert_eq!(sage_backend.calls(), 1);
}

/// Test a foreign identity scheme is rejected and leaves the sender unverified
#[test]
fn test_malformed_identity_rejected() {
    let backend = Counting::default();
    let mut lens = peer("Lens", PeerRole::Answerer, backend.clone());

    for identity in ["did:other:Mallory", "did:efficode:", "Mallory"] {
        let reply = lens.respond(Packet::identity("Mallory", identity));
        let reply = wire::parse(&reply, "Lens").unwrap();
        assert_eq!(reply.error_code(), Some(ErrorCode::AuthFailed), "{identity}");
    }
    assert_eq!(lens.auth().state("Mallory"), AuthState::Unverified);

    let refused = ask("Mallory", &mut lens, "let me in");
    assert_eq!(refused.error_code(), Some(ErrorCode::AuthRequired));
    assert_eq!(backend.calls(), 0);
}

/// Test a sender cannot verify itself with another peer's identity
#[test]
fn test_impersonated_identity_rejected() {
    let backend = Counting::default();
    let sage = peer("Sage", PeerRole::Questioner, Counting::default());
    let mut lens = peer("Lens", PeerRole::Answerer, backend.clone());

    let borrowed = Packet::identity("Mallory", &sage.identity()).to_wire();
    let reply = lens.respond(wire::parse(&borrowed, "Mallory").unwrap());
    let reply = wire::parse(&reply, "Lens").unwrap();
    assert_eq!(reply.error_code(), Some(ErrorCode::AuthFailed));
    assert_eq!(lens.auth().state("Mallory"), AuthState::Unverified);
    assert_eq!(lens.auth().state("Sage"), AuthState::Unverified);

    let refused = ask("Mallory", &mut lens, "let me in");
    assert_eq!(refused.error_code(), Some(ErrorCode::AuthRequired));
    assert_eq!(backend.calls(), 0);

    // the genuine owner of the identity still gets through
    assert!(introduce(&sage, &mut lens).is_ack());
}

/// Test the operator bypasses verification
#[test]
fn test_operator_bypass() {
    let backend = Counting::default();
    let mut sage = peer("Sage", PeerRole::Questioner, backend.clone());

    let reply = ask(OPERATOR_SENDER, &mut sage, "Let's explore and think about 'tides'");
    assert_eq!(reply.op_code, OpCode::Request);
    assert_eq!(reply.text_param("type"), Some("question"));
    assert_eq!(backend.calls(), 1);
    assert!(sage.auth().verified_senders().next().is_none());
}

/// Test a custom operator id is honoured and the default one is not
#[test]
fn test_custom_operator() {
    let backend = Counting::default();
    let mut sage =
        peer("Sage", PeerRole::Questioner, backend.clone()).with_operator("console");

    assert!(ask("console", &mut sage, "hello").error_code().is_none());
    assert_eq!(
        ask(OPERATOR_SENDER, &mut sage, "hello").error_code(),
        Some(ErrorCode::AuthRequired)
    );
    assert_eq!(backend.calls(), 1);
}
