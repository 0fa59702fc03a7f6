//! Wire protocol surface: the transport abstraction, the typed message set
//! and the envelope codec that maps between them.
//!
//! Every exchange is one request/response pair. A request carries its
//! message discriminator and scalar fields in custom headers and all binary
//! payload in a single body, pre-concatenated when a message logically holds
//! several binary parts.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use strum_macros::Display;

pub mod envelope;
pub mod message;

pub use message::{MessageType, ProtocolMessage};

/// Header carrying the message discriminator.
pub const TYPE_HEADER: &str = "X-EidProtocol-Type";
/// Prefix shared by all protocol field headers.
pub const HEADER_PREFIX: &str = "X-EidProtocol-";

/// Finite set of per-session protocol states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum ProtocolState {
    Init,
    EnvCheck,
    Identify,
    Authenticate,
    Admin,
    Sign,
    FilesDigest,
    SignCerts,
}

/// Read access to one inbound transport request.
pub trait HttpReceiver {
    /// Whether the request arrived over a secured channel.
    fn is_secure(&self) -> bool;

    /// All header names present on the request.
    fn header_names(&self) -> Vec<String>;

    /// A specific header value.
    fn header_value(&self, name: &str) -> Option<String>;

    /// The request body, absent when no body was sent.
    fn body(&self) -> Option<&[u8]>;

    /// Peer address the request was received from, for audit records.
    fn remote_address(&self) -> String;
}

/// Write access to the outbound transport response.
pub trait HttpTransmitter {
    fn add_header(&mut self, name: &str, value: &str);
    fn set_body(&mut self, body: Vec<u8>);
}

/// A buffered header/body exchange, for embedding the protocol outside a
/// live transport and for tests.
#[derive(Debug, Clone)]
pub struct MemoryExchange {
    pub secure: bool,
    pub remote_address: String,
    headers: BTreeMap<String, String>,
    body: Option<Vec<u8>>,
}

impl MemoryExchange {
    pub fn new() -> Self {
        Self {
            secure: true,
            remote_address: "127.0.0.1".to_string(),
            headers: BTreeMap::new(),
            body: None,
        }
    }

    pub fn insecure() -> Self {
        Self {
            secure: false,
            ..Self::new()
        }
    }
}

impl Default for MemoryExchange {
    fn default() -> Self {
        Self::new()
    }
}

impl HttpReceiver for MemoryExchange {
    fn is_secure(&self) -> bool {
        self.secure
    }

    fn header_names(&self) -> Vec<String> {
        self.headers.keys().cloned().collect()
    }

    fn header_value(&self, name: &str) -> Option<String> {
        self.headers.get(name).cloned()
    }

    fn body(&self) -> Option<&[u8]> {
        self.body.as_deref()
    }

    fn remote_address(&self) -> String {
        self.remote_address.clone()
    }
}

impl HttpTransmitter for MemoryExchange {
    fn add_header(&mut self, name: &str, value: &str) {
        self.headers.insert(name.to_string(), value.to_string());
    }

    fn set_body(&mut self, body: Vec<u8>) {
        self.body = Some(body);
    }
}
