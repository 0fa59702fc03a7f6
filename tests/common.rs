#![allow(dead_code)]

use std::str::FromStr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use rsa::pkcs1v15::SigningKey;
use rsa::signature::Keypair;
use rsa::{Pkcs1v15Sign, RsaPrivateKey};
use sha2::Sha256;
use x509_cert::builder::{Builder, CertificateBuilder, Profile};
use x509_cert::name::Name;
use x509_cert::spki::SubjectPublicKeyInfoOwned;
use x509_cert::time::Validity;

use eid_server::definitions::helpers::NonEmptyVec;
use eid_server::definitions::{Address, Identity};
use eid_server::spi::{
    AuditService, CertificateSecurityError, DigestInfo, IdentityConsumerService,
    IdentityIntegrityService, SignatureService,
};
use eid_server::x509::signature::DigestAlgorithm;
use eid_server::x509::{CertificateChain, CertificateWithDer};

/// Build a certificate signed by `issuer_key`, self-issued when `issuer` is
/// `None`.
pub fn certificate(
    subject: &str,
    issuer: Option<&str>,
    subject_key: &RsaPrivateKey,
    issuer_key: &RsaPrivateKey,
) -> CertificateWithDer {
    let signer: SigningKey<Sha256> = SigningKey::new(issuer_key.clone());
    let subject_public = SigningKey::<Sha256>::new(subject_key.clone()).verifying_key();
    let spki = SubjectPublicKeyInfoOwned::from_key(subject_public).unwrap();
    let profile = Profile::Manual {
        issuer: issuer.map(|name| Name::from_str(name).unwrap()),
    };
    let builder = CertificateBuilder::new(
        profile,
        rand::random::<u64>().into(),
        Validity::from_now(Duration::from_secs(3600)).unwrap(),
        Name::from_str(subject).unwrap(),
        spki,
        &signer,
    )
    .unwrap();
    CertificateWithDer::from_cert(builder.build::<rsa::pkcs1v15::Signature>().unwrap()).unwrap()
}

/// The citizen's national number used throughout the scenarios.
pub const NATIONAL_NUMBER: &str = "71715100070";

/// A miniature PKI: a self-signed root that issued the national registry
/// certificate, the citizen CA, and the citizen's signing certificate.
pub struct TestPki {
    pub root: CertificateWithDer,
    pub rrn: CertificateWithDer,
    pub rrn_key: RsaPrivateKey,
    pub ca: CertificateWithDer,
    pub signing: CertificateWithDer,
    pub signing_key: RsaPrivateKey,
}

pub fn test_pki() -> TestPki {
    let root_key = RsaPrivateKey::new(&mut rand::thread_rng(), 2048).unwrap();
    let rrn_key = RsaPrivateKey::new(&mut rand::thread_rng(), 2048).unwrap();
    let ca_key = RsaPrivateKey::new(&mut rand::thread_rng(), 2048).unwrap();
    let signing_key = RsaPrivateKey::new(&mut rand::thread_rng(), 2048).unwrap();

    let root_name = "CN=Belgium Root CA,C=BE";
    let ca_name = "CN=Citizen CA,C=BE";
    let root = certificate(root_name, None, &root_key, &root_key);
    let rrn = certificate("CN=RRN,O=RRN,C=BE", Some(root_name), &rrn_key, &root_key);
    let ca = certificate(ca_name, Some(root_name), &ca_key, &root_key);
    let signing = certificate(
        &format!("CN=Anna Peeters (Signature),2.5.4.5={NATIONAL_NUMBER},C=BE"),
        Some(ca_name),
        &signing_key,
        &ca_key,
    );
    TestPki {
        root,
        rrn,
        rrn_key,
        ca,
        signing,
        signing_key,
    }
}

/// Sign the way the card and registry do: a raw PKCS#1 v1.5 signature over
/// `DigestInfo(SHA-256 prefix || SHA-256(parts))`.
pub fn raw_sign_sha256(key: &RsaPrivateKey, parts: &[&[u8]]) -> Vec<u8> {
    let digest = DigestAlgorithm::Sha256.digest_parts(parts);
    raw_sign_digest(key, &digest)
}

pub fn raw_sign_digest(key: &RsaPrivateKey, digest: &[u8]) -> Vec<u8> {
    let mut digest_info = DigestAlgorithm::Sha256.digest_info_prefix().to_vec();
    digest_info.extend_from_slice(digest);
    key.sign(Pkcs1v15Sign::new_unprefixed(), &digest_info).unwrap()
}

/// Identity file with the given photo digest, valid until 2099.
pub fn identity_file(photo_digest: &[u8]) -> Vec<u8> {
    identity_file_with_validity_end(photo_digest, "01.09.2099")
}

pub fn identity_file_with_validity_end(photo_digest: &[u8], validity_end: &str) -> Vec<u8> {
    eid_server::tlv::encode([
        (1, b"592-2500611-33".as_slice()),
        (2, [0x53, 0x4c, 0x49, 0x4e, 0x33, 0x66].as_slice()),
        (3, b"01.09.2021".as_slice()),
        (4, validity_end.as_bytes()),
        (5, b"Gent".as_slice()),
        (6, NATIONAL_NUMBER.as_bytes()),
        (7, b"Peeters".as_slice()),
        (8, b"Anna".as_slice()),
        (10, b"Belg".as_slice()),
        (11, b"Leuven".as_slice()),
        (12, b"15 SEP  1971".as_slice()),
        (13, b"V".as_slice()),
        (15, b"1".as_slice()),
        (17, photo_digest),
    ])
}

/// Address file content without the on-card zero padding.
pub fn address_core() -> Vec<u8> {
    eid_server::tlv::encode([
        (1, b"Veldstraat 12".as_slice()),
        (2, b"9000".as_slice()),
        (3, b"Gent".as_slice()),
    ])
}

/// Address file as it comes off the card, zero-padded.
pub fn address_file() -> Vec<u8> {
    let mut data = address_core();
    data.extend(std::iter::repeat(0u8).take(117 - data.len().min(117)));
    data
}

/// Outcome a stub trust judgment should produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrustOutcome {
    Trusted,
    Expired,
    Revoked,
    NotTrusted,
    Invalid,
}

impl TrustOutcome {
    fn into_result(self) -> Result<(), CertificateSecurityError> {
        match self {
            Self::Trusted => Ok(()),
            Self::Expired => Err(CertificateSecurityError::Expired),
            Self::Revoked => Err(CertificateSecurityError::Revoked),
            Self::NotTrusted => Err(CertificateSecurityError::NotTrusted),
            Self::Invalid => Err(CertificateSecurityError::Invalid("stubbed".to_string())),
        }
    }
}

pub struct StubIntegrityService {
    pub outcome: TrustOutcome,
    pub calls: Arc<Mutex<usize>>,
}

impl StubIntegrityService {
    pub fn new(outcome: TrustOutcome) -> (Self, Arc<Mutex<usize>>) {
        let calls = Arc::new(Mutex::new(0));
        (
            Self {
                outcome,
                calls: calls.clone(),
            },
            calls,
        )
    }
}

impl IdentityIntegrityService for StubIntegrityService {
    fn check_national_registration_certificate(
        &self,
        chain: &NonEmptyVec<CertificateWithDer>,
    ) -> Result<(), CertificateSecurityError> {
        assert_eq!(chain.len(), 2, "expected [RRN, root]");
        *self.calls.lock().unwrap() += 1;
        self.outcome.into_result()
    }
}

pub struct StubSignatureService {
    pub digest_info: DigestInfo,
    pub post_sign_outcome: TrustOutcome,
    pub post_signed: Arc<Mutex<Vec<Vec<u8>>>>,
}

impl StubSignatureService {
    pub fn new(
        digest_info: DigestInfo,
        post_sign_outcome: TrustOutcome,
    ) -> (Self, Arc<Mutex<Vec<Vec<u8>>>>) {
        let post_signed = Arc::new(Mutex::new(Vec::new()));
        (
            Self {
                digest_info,
                post_sign_outcome,
                post_signed: post_signed.clone(),
            },
            post_signed,
        )
    }
}

impl SignatureService for StubSignatureService {
    fn pre_sign(
        &self,
        _request_id: &str,
        _file_digests: Option<&[u8]>,
        _sign_certificates: Option<&CertificateChain>,
    ) -> anyhow::Result<DigestInfo> {
        Ok(self.digest_info.clone())
    }

    fn post_sign(
        &self,
        _request_id: &str,
        signature_value: &[u8],
        certificate_chain: &CertificateChain,
    ) -> Result<(), CertificateSecurityError> {
        assert!(certificate_chain.signing_certificate().is_some());
        self.post_sign_outcome.into_result()?;
        self.post_signed.lock().unwrap().push(signature_value.to_vec());
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuditEvent {
    Identified(String),
    Signed(String),
    SignatureError(String),
    IdentityIntegrityError(String),
}

pub struct RecordingAudit(pub Arc<Mutex<Vec<AuditEvent>>>);

impl RecordingAudit {
    pub fn new() -> (Self, Arc<Mutex<Vec<AuditEvent>>>) {
        let events = Arc::new(Mutex::new(Vec::new()));
        (Self(events.clone()), events)
    }
}

impl AuditService for RecordingAudit {
    fn identified(&self, user_id: &str) {
        self.0
            .lock()
            .unwrap()
            .push(AuditEvent::Identified(user_id.to_string()));
    }

    fn signed(&self, user_id: &str) {
        self.0
            .lock()
            .unwrap()
            .push(AuditEvent::Signed(user_id.to_string()));
    }

    fn signature_error(&self, remote_address: &str, _certificate: &CertificateWithDer) {
        self.0
            .lock()
            .unwrap()
            .push(AuditEvent::SignatureError(remote_address.to_string()));
    }

    fn identity_integrity_error(&self, remote_address: &str) {
        self.0
            .lock()
            .unwrap()
            .push(AuditEvent::IdentityIntegrityError(remote_address.to_string()));
    }
}

#[derive(Default)]
pub struct ConsumerRecord {
    pub identities: Vec<Identity>,
    pub addresses: Vec<Address>,
    pub photos: Vec<Vec<u8>>,
    pub certificate_sets: usize,
}

pub struct RecordingConsumer(pub Arc<Mutex<ConsumerRecord>>);

impl RecordingConsumer {
    pub fn new() -> (Self, Arc<Mutex<ConsumerRecord>>) {
        let record = Arc::new(Mutex::new(ConsumerRecord::default()));
        (Self(record.clone()), record)
    }
}

impl IdentityConsumerService for RecordingConsumer {
    fn set_identity(&self, _request_id: &str, identity: &Identity) -> anyhow::Result<()> {
        self.0.lock().unwrap().identities.push(identity.clone());
        Ok(())
    }

    fn set_address(&self, _request_id: &str, address: &Address) -> anyhow::Result<()> {
        self.0.lock().unwrap().addresses.push(address.clone());
        Ok(())
    }

    fn set_photo(&self, _request_id: &str, photo: &[u8]) -> anyhow::Result<()> {
        self.0.lock().unwrap().photos.push(photo.to_vec());
        Ok(())
    }

    fn set_certificates(
        &self,
        _request_id: &str,
        _authentication: &CertificateWithDer,
        _signing: &CertificateWithDer,
        _ca: &CertificateWithDer,
        _root: &CertificateWithDer,
    ) -> anyhow::Result<()> {
        self.0.lock().unwrap().certificate_sets += 1;
        Ok(())
    }
}
