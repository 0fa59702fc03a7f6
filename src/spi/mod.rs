//! Interfaces to the services collaborating with the protocol core.
//!
//! The core never decides certificate trust, persists identity data or
//! writes audit records itself; it calls out through these traits and maps
//! the outcomes onto protocol responses. Implementations are synchronous:
//! whatever latency or failure they produce is propagated to the caller,
//! and retry policy belongs to the implementation.

use crate::definitions::helpers::NonEmptyVec;
use crate::definitions::{Address, Identity};
use crate::x509::{CertificateChain, CertificateWithDer};

/// Failure kinds a certificate-judging collaborator reports.
///
/// The first four have a defined business meaning and are translated into
/// the matching error code of a `FinishedMessage`. [`Internal`] is reserved
/// for unexpected conditions and is never shown to the client as a code.
///
/// [`Internal`]: CertificateSecurityError::Internal
#[derive(Debug, thiserror::Error)]
pub enum CertificateSecurityError {
    #[error("certificate expired")]
    Expired,
    #[error("certificate revoked")]
    Revoked,
    #[error("certificate not trusted")]
    NotTrusted,
    #[error("certificate invalid: {0}")]
    Invalid(String),
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl CertificateSecurityError {
    /// The client-facing error code, when the failure has one.
    pub fn error_code(&self) -> Option<crate::definitions::ErrorCode> {
        use crate::definitions::ErrorCode;
        match self {
            Self::Expired => Some(ErrorCode::CertificateExpired),
            Self::Revoked => Some(ErrorCode::CertificateRevoked),
            Self::NotTrusted => Some(ErrorCode::CertificateNotTrusted),
            Self::Invalid(_) => Some(ErrorCode::Certificate),
            Self::Internal(_) => None,
        }
    }
}

/// Digest to be signed by the card, produced by the signature collaborator
/// during sign preparation.
#[derive(Debug, Clone)]
pub struct DigestInfo {
    pub digest_value: Vec<u8>,
    /// Algorithm identifier, e.g. `SHA-256` or `SHA-256-PSS`.
    pub digest_algo: String,
    /// Human-readable description shown to the citizen before signing.
    pub description: String,
}

/// Judges the national registry certificate chain that vouches for the
/// identity and address files.
pub trait IdentityIntegrityService {
    fn check_national_registration_certificate(
        &self,
        chain: &NonEmptyVec<CertificateWithDer>,
    ) -> Result<(), CertificateSecurityError>;
}

/// Drives the signing operation: produces the digest the card must sign and
/// post-processes the produced signature.
pub trait SignatureService {
    /// Compute the digest to be signed. `file_digests` carries the opaque
    /// blob from a `FileDigestsDataMessage`, `sign_certificates` the chain
    /// from a `SignCertificatesDataMessage`, when the flow supplied them.
    fn pre_sign(
        &self,
        request_id: &str,
        file_digests: Option<&[u8]>,
        sign_certificates: Option<&CertificateChain>,
    ) -> anyhow::Result<DigestInfo>;

    /// Accept the signature produced by the card, judging its chain.
    fn post_sign(
        &self,
        request_id: &str,
        signature_value: &[u8],
        certificate_chain: &CertificateChain,
    ) -> Result<(), CertificateSecurityError>;
}

/// Receives the verified identity data, keyed by request id.
pub trait IdentityConsumerService {
    fn set_identity(&self, request_id: &str, identity: &Identity) -> anyhow::Result<()>;
    fn set_address(&self, request_id: &str, address: &Address) -> anyhow::Result<()>;
    fn set_photo(&self, request_id: &str, photo: &[u8]) -> anyhow::Result<()>;
    fn set_certificates(
        &self,
        request_id: &str,
        authentication: &CertificateWithDer,
        signing: &CertificateWithDer,
        ca: &CertificateWithDer,
        root: &CertificateWithDer,
    ) -> anyhow::Result<()>;
}

/// Audit sink for security-relevant protocol events.
pub trait AuditService {
    /// A citizen was successfully identified.
    fn identified(&self, user_id: &str);
    /// A citizen successfully produced a signature.
    fn signed(&self, user_id: &str);
    /// A signature from `remote_address` did not verify.
    fn signature_error(&self, remote_address: &str, certificate: &CertificateWithDer);
    /// Identity or address data from `remote_address` failed its integrity
    /// check.
    fn identity_integrity_error(&self, remote_address: &str);
}
