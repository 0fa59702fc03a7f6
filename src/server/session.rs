//! Per-session protocol context.
//!
//! The session is an explicit value owned by the surrounding session store
//! and passed `&mut` into every handler call; nothing in the crate keeps
//! hidden per-session state. The store is responsible for serializing access
//! so that at most one request per session is in flight.

use serde::{Deserialize, Serialize};

use crate::protocol::ProtocolState;

/// Parts of the identity answer the server asked the client to include.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestedParts {
    pub address: bool,
    pub photo: bool,
    pub certificates: bool,
}

/// Digest awaiting a signature, stored between the sign request and the
/// matching signature data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingDigest {
    #[serde(with = "serde_bytes")]
    pub value: Vec<u8>,
    /// Algorithm identifier, e.g. `SHA-256` or `SHA-256-PSS`.
    pub algo: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Session {
    protocol_state: Option<ProtocolState>,
    pub request_id: Option<String>,
    pub requested_parts: Option<RequestedParts>,
    pub pending_digest: Option<PendingDigest>,
    /// Identifier of the user a preceding authentication step established,
    /// written by the authentication layer around this crate.
    pub authenticated_user: Option<String>,
    /// Challenge issued with an authentication request.
    #[serde(with = "serde_bytes")]
    pub challenge: Option<Vec<u8>>,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn protocol_state(&self) -> Option<ProtocolState> {
        self.protocol_state
    }

    pub(crate) fn set_protocol_state(&mut self, state: ProtocolState) {
        tracing::debug!("protocol state -> {state}");
        self.protocol_state = Some(state);
    }

    pub(crate) fn remove_protocol_state(&mut self) {
        tracing::debug!("protocol state removed");
        self.protocol_state = None;
    }

    /// Full reset, used when a session is restarted or finished.
    pub(crate) fn clear(&mut self) {
        *self = Self::default();
    }

    pub(crate) fn require_request_id(&self) -> Result<&str, super::Error> {
        self.request_id
            .as_deref()
            .ok_or_else(|| super::Error::Violation("no request id established".to_string()))
    }
}
