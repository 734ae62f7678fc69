//! Identity handshake.
//!
//! A sender announces itself with an IDENTITY packet whose `value` is a
//! `did:efficode:<name>` identity. The receiver records the sender as
//! verified and answers ACK, or answers ERROR and leaves it unverified.
//!
//! Trust is per direction: A verifying itself to B says nothing about
//! whether B is verified by A. A full handshake runs both directions.

use std::collections::HashMap;

use super::packet::{OpCode, Packet};
use super::PARAM_VALUE;
use crate::error::{EfficodeError, ErrorCode, Result};

/// Recognized identity scheme
pub const IDENTITY_SCHEME: &str = "did:efficode:";

/// Default sender id of the human operator; it bypasses the auth gate
pub const OPERATOR_SENDER: &str = "operator";

/// Verification state of one sender as seen by one receiver
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AuthState {
    /// No successful identity exchange yet
    #[default]
    Unverified,
    /// Identity accepted
    Verified,
}

/// Identity string for a peer name
pub fn identity_for(name: &str) -> String {
    format!("{IDENTITY_SCHEME}{name}")
}

/// Name claimed by an identity, if it uses the recognized scheme
pub fn claimed_name(identity: &str) -> Option<&str> {
    identity
        .strip_prefix(IDENTITY_SCHEME)
        .filter(|name| !name.trim().is_empty())
}

/// Check that an identity uses the recognized scheme and names someone
pub fn is_well_formed(identity: &str) -> bool {
    claimed_name(identity).is_some()
}

/// Check an identity presented by `sender`: the scheme must match and the
/// claimed name must be the sender's own.
pub fn verify_identity(identity: &str, sender: &str) -> Result<()> {
    match claimed_name(identity) {
        Some(name) if name == sender => Ok(()),
        Some(name) => Err(EfficodeError::AuthFailed(format!(
            "{sender} presented the identity of {name}"
        ))),
        None => Err(EfficodeError::AuthFailed(format!(
            "malformed identity {identity:?}"
        ))),
    }
}

/// Receiver-side record of which senders are verified
#[derive(Debug, Clone, Default)]
pub struct AuthTable {
    states: HashMap<String, AuthState>,
}

impl AuthTable {
    /// Create an empty table
    pub fn new() -> Self {
        Self::default()
    }

    /// State of a sender
    pub fn state(&self, sender: &str) -> AuthState {
        self.states.get(sender).copied().unwrap_or_default()
    }

    /// Check if a sender is verified
    pub fn is_verified(&self, sender: &str) -> bool {
        self.state(sender) == AuthState::Verified
    }

    /// Senders verified so far
    pub fn verified_senders(&self) -> impl Iterator<Item = &str> {
        self.states
            .iter()
            .filter(|(_, s)| **s == AuthState::Verified)
            .map(|(k, _)| k.as_str())
    }

    /// Gate for message traffic: the operator always passes, anyone else
    /// must be verified.
    pub fn authorize(&self, sender: &str, operator: &str) -> Result<()> {
        if sender == operator || self.is_verified(sender) {
            Ok(())
        } else {
            Err(EfficodeError::AuthRequired(sender.to_string()))
        }
    }

    /// Process an IDENTITY packet on behalf of `responder`, returning the
    /// ACK or ERROR reply.
    pub fn process_identity(&mut self, packet: &Packet, responder: &str) -> Packet {
        if packet.op_code != OpCode::Identity {
            return Packet::error(
                responder,
                ErrorCode::UnexpectedOpcode,
                &format!("expected identity, got {}", packet.op_code),
            );
        }

        let identity = packet.text_param(PARAM_VALUE).unwrap_or_default();
        if let Err(e) = verify_identity(identity, &packet.sender) {
            tracing::warn!("{} rejected identity from {}: {}", responder, packet.sender, e);
            return Packet::error(responder, ErrorCode::AuthFailed, "identity verification failed");
        }

        self.states
            .insert(packet.sender.clone(), AuthState::Verified);
        tracing::info!("{} verified {} ({})", responder, packet.sender, identity);
        Packet::ack(responder, "success", &format!("verified by {responder}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity_format() {
        assert_eq!(identity_for("Sage"), "did:efficode:Sage");
        assert!(is_well_formed("did:efficode:Sage"));
        assert!(!is_well_formed("did:efficode:"));
        assert!(!is_well_formed("did:other:Sage"));
        assert!(!is_well_formed(""));
    }

    #[test]
    fn test_successful_verification() {
        let mut table = AuthTable::new();
        assert_eq!(table.state("A"), AuthState::Unverified);

        let reply = table.process_identity(&Packet::identity("A", &identity_for("A")), "B");
        assert!(reply.is_ack());
        assert_eq!(reply.sender, "B");
        assert_eq!(reply.text_param("responder"), Some("B"));
        assert!(table.is_verified("A"));
        assert_eq!(table.verified_senders().collect::<Vec<_>>(), vec!["A"]);
    }

    #[test]
    fn test_bad_scheme_rejected() {
        let mut table = AuthTable::new();
        let reply = table.process_identity(&Packet::identity("A", "urn:someone"), "B");
        assert_eq!(reply.error_code(), Some(ErrorCode::AuthFailed));
        assert!(!table.is_verified("A"));
    }

    #[test]
    fn test_borrowed_identity_rejected() {
        let mut table = AuthTable::new();
        let borrowed = Packet::identity("Mallory", &identity_for("Sage"));
        let reply = table.process_identity(&borrowed, "Lens");
        assert_eq!(reply.error_code(), Some(ErrorCode::AuthFailed));
        assert!(!table.is_verified("Mallory"));
        assert!(!table.is_verified("Sage"));
    }

    #[test]
    fn test_verify_identity() {
        assert!(verify_identity("did:efficode:Sage", "Sage").is_ok());
        assert!(matches!(
            verify_identity("did:efficode:Sage", "Lens"),
            Err(EfficodeError::AuthFailed(_))
        ));
        assert!(verify_identity("did:other:Sage", "Sage").is_err());
        assert_eq!(claimed_name("did:efficode:Sage"), Some("Sage"));
    }

    #[test]
    fn test_authorize_gate() {
        let mut table = AuthTable::new();
        assert!(matches!(
            table.authorize("A", OPERATOR_SENDER),
            Err(EfficodeError::AuthRequired(_))
        ));
        assert!(table.authorize(OPERATOR_SENDER, OPERATOR_SENDER).is_ok());

        table.process_identity(&Packet::identity("A", &identity_for("A")), "B");
        assert!(table.authorize("A", OPERATOR_SENDER).is_ok());
    }
}
