//! The closed set of protocol messages and their static metadata.
//!
//! Each variant's metadata drives the state machine: the states in which it
//! is acceptable as input, the state its emission transitions the session
//! into, whether it may start a fresh session, and which responses a handler
//! may produce for it. Dispatch is a registry lookup plus a match on the
//! concrete variant; the discriminator string is the sole decode selector.

use strum_macros::{Display, EnumString};

use super::ProtocolState;
use crate::definitions::ErrorCode;
use crate::x509::CertificateChain;

/// Message discriminators, carried verbatim in the type header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString)]
pub enum MessageType {
    #[strum(serialize = "HelloMessage")]
    Hello,
    #[strum(serialize = "CheckClientMessage")]
    CheckClient,
    #[strum(serialize = "ClientEnvironmentMessage")]
    ClientEnvironment,
    #[strum(serialize = "IdentificationRequestMessage")]
    IdentificationRequest,
    #[strum(serialize = "AuthenticationRequestMessage")]
    AuthenticationRequest,
    #[strum(serialize = "AdministrationMessage")]
    Administration,
    #[strum(serialize = "SignRequestMessage")]
    SignRequest,
    #[strum(serialize = "FilesDigestRequestMessage")]
    FilesDigestRequest,
    #[strum(serialize = "SignCertificatesRequestMessage")]
    SignCertificatesRequest,
    #[strum(serialize = "FileDigestsDataMessage")]
    FileDigestsData,
    #[strum(serialize = "SignCertificatesDataMessage")]
    SignCertificatesData,
    #[strum(serialize = "IdentityDataMessage")]
    IdentityData,
    #[strum(serialize = "SignatureDataMessage")]
    SignatureData,
    #[strum(serialize = "FinishedMessage")]
    Finished,
}

impl MessageType {
    /// State a start message opens a fresh session in.
    pub fn start_state(self) -> Option<ProtocolState> {
        match self {
            Self::Hello => Some(ProtocolState::Init),
            _ => None,
        }
    }

    /// Whether this message is acceptable as input in the given state.
    pub fn accepts_state(self, state: ProtocolState) -> bool {
        match self {
            Self::ClientEnvironment => state == ProtocolState::EnvCheck,
            Self::IdentityData => state == ProtocolState::Identify,
            Self::SignatureData => state == ProtocolState::Sign,
            Self::FileDigestsData => state == ProtocolState::FilesDigest,
            Self::SignCertificatesData => state == ProtocolState::SignCerts,
            // the client may report completion or cancellation at any point
            Self::Finished => true,
            _ => false,
        }
    }

    /// State the session moves to once this message is sent as a response.
    pub fn transition(self) -> Option<ProtocolState> {
        match self {
            Self::CheckClient => Some(ProtocolState::EnvCheck),
            Self::IdentificationRequest => Some(ProtocolState::Identify),
            Self::AuthenticationRequest => Some(ProtocolState::Authenticate),
            Self::Administration => Some(ProtocolState::Admin),
            Self::SignRequest => Some(ProtocolState::Sign),
            Self::FilesDigestRequest => Some(ProtocolState::FilesDigest),
            Self::SignCertificatesRequest => Some(ProtocolState::SignCerts),
            _ => None,
        }
    }

    /// Responses a handler may legally produce for this input message.
    pub fn responses_allowed(self) -> &'static [MessageType] {
        match self {
            Self::Hello => &[Self::CheckClient, Self::Finished],
            Self::ClientEnvironment => &[
                Self::IdentificationRequest,
                Self::AuthenticationRequest,
                Self::Administration,
                Self::SignRequest,
                Self::FilesDigestRequest,
                Self::SignCertificatesRequest,
                Self::Finished,
            ],
            Self::FileDigestsData | Self::SignCertificatesData => {
                &[Self::SignRequest, Self::Finished]
            }
            Self::IdentityData | Self::SignatureData | Self::Finished => &[Self::Finished],
            // server-to-client messages never have handlers
            _ => &[],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HelloMessage {
    pub language: Option<String>,
    pub request_id: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CheckClientMessage;

/// Environment report the client produces during the check phase.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientEnvironmentMessage {
    pub client_version: String,
    pub os_name: String,
    pub os_arch: String,
    pub os_version: String,
    /// Names of the card readers attached on the client, one body line each.
    pub readers: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IdentificationRequestMessage {
    pub include_address: bool,
    pub include_photo: bool,
    pub include_certificates: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthenticationRequestMessage {
    pub challenge: Vec<u8>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AdministrationMessage {
    pub change_pin: bool,
    pub unblock_pin: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignRequestMessage {
    pub digest_algo: String,
    pub description: Option<String>,
    pub digest_value: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilesDigestRequestMessage {
    pub digest_algo: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SignCertificatesRequestMessage;

/// Digests of the files the client wants signed; the blob is opaque to the
/// protocol core and interpreted by the signature collaborator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileDigestsDataMessage {
    pub digest_algo: String,
    pub file_digests: Vec<u8>,
}

/// The citizen's signing certificate chain: sign, citizen CA, root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignCertificatesDataMessage {
    pub certificate_chain: CertificateChain,
}

/// Identity answer of the card. All parts arrive concatenated in the body,
/// sliced here by the declared per-part sizes; the handler decides which
/// parts were legal to include.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentityDataMessage {
    pub identity_file: Vec<u8>,
    pub address_file: Option<Vec<u8>>,
    pub photo_file: Option<Vec<u8>>,
    pub identity_signature_file: Option<Vec<u8>>,
    pub address_signature_file: Option<Vec<u8>>,
    pub authn_cert_file: Option<Vec<u8>>,
    pub sign_cert_file: Option<Vec<u8>>,
    pub ca_cert_file: Option<Vec<u8>>,
    pub root_cert_file: Option<Vec<u8>>,
    pub rrn_cert_file: Option<Vec<u8>>,
}

/// Signature value plus the chain it was produced under: sign, citizen CA,
/// root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignatureDataMessage {
    pub signature_value: Vec<u8>,
    pub certificate_chain: CertificateChain,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FinishedMessage {
    pub error_code: Option<ErrorCode>,
}

impl FinishedMessage {
    pub fn new() -> Self {
        Self { error_code: None }
    }

    pub fn with_error(error_code: ErrorCode) -> Self {
        Self {
            error_code: Some(error_code),
        }
    }
}

/// A decoded protocol message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProtocolMessage {
    Hello(HelloMessage),
    CheckClient(CheckClientMessage),
    ClientEnvironment(ClientEnvironmentMessage),
    IdentificationRequest(IdentificationRequestMessage),
    AuthenticationRequest(AuthenticationRequestMessage),
    Administration(AdministrationMessage),
    SignRequest(SignRequestMessage),
    FilesDigestRequest(FilesDigestRequestMessage),
    SignCertificatesRequest(SignCertificatesRequestMessage),
    FileDigestsData(FileDigestsDataMessage),
    SignCertificatesData(SignCertificatesDataMessage),
    IdentityData(IdentityDataMessage),
    SignatureData(SignatureDataMessage),
    Finished(FinishedMessage),
}

impl ProtocolMessage {
    pub fn message_type(&self) -> MessageType {
        match self {
            Self::Hello(_) => MessageType::Hello,
            Self::CheckClient(_) => MessageType::CheckClient,
            Self::ClientEnvironment(_) => MessageType::ClientEnvironment,
            Self::IdentificationRequest(_) => MessageType::IdentificationRequest,
            Self::AuthenticationRequest(_) => MessageType::AuthenticationRequest,
            Self::Administration(_) => MessageType::Administration,
            Self::SignRequest(_) => MessageType::SignRequest,
            Self::FilesDigestRequest(_) => MessageType::FilesDigestRequest,
            Self::SignCertificatesRequest(_) => MessageType::SignCertificatesRequest,
            Self::FileDigestsData(_) => MessageType::FileDigestsData,
            Self::SignCertificatesData(_) => MessageType::SignCertificatesData,
            Self::IdentityData(_) => MessageType::IdentityData,
            Self::SignatureData(_) => MessageType::SignatureData,
            Self::Finished(_) => MessageType::Finished,
        }
    }
}

macro_rules! message_from {
    ($($variant:ident($message:ty)),* $(,)?) => {
        $(
            impl From<$message> for ProtocolMessage {
                fn from(message: $message) -> Self {
                    Self::$variant(message)
                }
            }
        )*
    };
}

message_from! {
    Hello(HelloMessage),
    CheckClient(CheckClientMessage),
    ClientEnvironment(ClientEnvironmentMessage),
    IdentificationRequest(IdentificationRequestMessage),
    AuthenticationRequest(AuthenticationRequestMessage),
    Administration(AdministrationMessage),
    SignRequest(SignRequestMessage),
    FilesDigestRequest(FilesDigestRequestMessage),
    SignCertificatesRequest(SignCertificatesRequestMessage),
    FileDigestsData(FileDigestsDataMessage),
    SignCertificatesData(SignCertificatesDataMessage),
    IdentityData(IdentityDataMessage),
    SignatureData(SignatureDataMessage),
    Finished(FinishedMessage),
}

#[cfg(test)]
mod test {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn discriminators_are_unique_and_round_trip() {
        let all = [
            MessageType::Hello,
            MessageType::CheckClient,
            MessageType::ClientEnvironment,
            MessageType::IdentificationRequest,
            MessageType::AuthenticationRequest,
            MessageType::Administration,
            MessageType::SignRequest,
            MessageType::FilesDigestRequest,
            MessageType::SignCertificatesRequest,
            MessageType::FileDigestsData,
            MessageType::SignCertificatesData,
            MessageType::IdentityData,
            MessageType::SignatureData,
            MessageType::Finished,
        ];
        let mut seen = std::collections::HashSet::new();
        for message_type in all {
            let discriminator = message_type.to_string();
            assert!(seen.insert(discriminator.clone()));
            assert_eq!(MessageType::from_str(&discriminator).unwrap(), message_type);
        }
    }

    #[test]
    fn signature_data_only_accepted_in_sign_state() {
        assert!(MessageType::SignatureData.accepts_state(ProtocolState::Sign));
        for state in [
            ProtocolState::Init,
            ProtocolState::EnvCheck,
            ProtocolState::Identify,
            ProtocolState::Authenticate,
            ProtocolState::Admin,
            ProtocolState::FilesDigest,
            ProtocolState::SignCerts,
        ] {
            assert!(!MessageType::SignatureData.accepts_state(state));
        }
    }

    #[test]
    fn finished_accepted_in_every_state() {
        for state in [
            ProtocolState::Init,
            ProtocolState::EnvCheck,
            ProtocolState::Identify,
            ProtocolState::Authenticate,
            ProtocolState::Admin,
            ProtocolState::Sign,
            ProtocolState::FilesDigest,
            ProtocolState::SignCerts,
        ] {
            assert!(MessageType::Finished.accepts_state(state));
        }
    }
}
