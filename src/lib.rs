//! Server side of the eID client/server protocol.
//!
//! An eID client drives a citizen's smart card and talks to this server in
//! discrete typed messages, carried as custom headers plus a single binary
//! body per request. The server decides the operation (identification,
//! authentication, signing, administration), enforces the protocol state
//! machine, and verifies everything the card produces: TLV-encoded identity
//! and address records, reconstructed X.509 certificate chains, and RSA or
//! RSA-PSS signatures over session-stored digests.
//!
//! The crate is transport-agnostic: plug the [`protocol::HttpReceiver`] and
//! [`protocol::HttpTransmitter`] traits into your server stack, keep one
//! [`server::Session`] value per client session, and call
//! [`server::ProtocolService::process`] for every request. Trust decisions,
//! identity persistence and audit logging stay outside the crate, behind
//! the traits in [`spi`].

pub mod definitions;
pub mod protocol;
pub mod server;
pub mod spi;
pub mod tlv;
pub mod x509;
