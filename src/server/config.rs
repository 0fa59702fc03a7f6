//! Server-side configuration of the protocol run.

/// Operation the server drives the client through once the environment
/// check has passed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerOperation {
    /// Read identity data off the card, optionally with address, photo and
    /// certificates.
    Identification {
        include_address: bool,
        include_photo: bool,
        include_certificates: bool,
    },
    /// Challenge-response authentication with the card's authentication key.
    Authentication {
        /// Byte length of the random challenge.
        challenge_size: usize,
    },
    /// Card administration (PIN change / PIN unblock).
    Administration { change_pin: bool, unblock_pin: bool },
    /// Sign a digest the signature service computes up front.
    Signing,
    /// Let the client digest local files first, then sign.
    FilesDigestSigning { digest_algo: String },
    /// Collect the citizen's signing certificates first, then sign.
    CertificateSigning,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub operation: ServerOperation,
    /// Reject clients that connect over an unsecured channel.
    pub require_secure_channel: bool,
    /// Skip the cross-check of the decoded national number against the
    /// authenticated user identifier.
    pub skip_national_number_check: bool,
}

impl ServerConfig {
    pub fn new(operation: ServerOperation) -> Self {
        Self {
            operation,
            require_secure_channel: true,
            skip_national_number_check: false,
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self::new(ServerOperation::Identification {
            include_address: false,
            include_photo: false,
            include_certificates: false,
        })
    }
}
