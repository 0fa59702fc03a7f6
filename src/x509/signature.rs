//! RSA signature verification for digests produced by the eID card.
//!
//! The card signs raw `DigestInfo` structures: the server prepends a fixed
//! ASN.1 prefix to the digest value and verifies the plain PKCS#1 v1.5
//! signature over that buffer. PSS variants are verified directly over the
//! digest value with MGF1, a salt as long as the digest and trailer field 1.
//! The prefixes are protocol constants and must match byte for byte.

use std::str::FromStr;

use const_oid::db::rfc5912::{
    SHA_1_WITH_RSA_ENCRYPTION, SHA_224_WITH_RSA_ENCRYPTION, SHA_256_WITH_RSA_ENCRYPTION,
    SHA_384_WITH_RSA_ENCRYPTION, SHA_512_WITH_RSA_ENCRYPTION,
};
use const_oid::ObjectIdentifier;
use digest::Digest;
use hex_literal::hex;
use ripemd::{Ripemd128, Ripemd160, Ripemd256};
use rsa::pss::Pss;
use rsa::{Pkcs1v15Sign, RsaPublicKey};
use sha1::Sha1;
use sha2::{Sha224, Sha256, Sha384, Sha512};
use strum_macros::{Display, EnumString};
use x509_cert::certificate::Certificate;

use super::rsa_public_key;

pub const SHA1_DIGEST_INFO_PREFIX: [u8; 15] = hex!("3021300906052b0e03021a05000414");
pub const SHA224_DIGEST_INFO_PREFIX: [u8; 19] = hex!("302d300d06096086480165030402040500041c");
pub const SHA256_DIGEST_INFO_PREFIX: [u8; 19] = hex!("3031300d060960864801650304020105000420");
pub const SHA384_DIGEST_INFO_PREFIX: [u8; 19] = hex!("3041300d060960864801650304020205000430");
pub const SHA512_DIGEST_INFO_PREFIX: [u8; 19] = hex!("3051300d060960864801650304020305000440");
pub const RIPEMD128_DIGEST_INFO_PREFIX: [u8; 15] = hex!("301d300906052b2403020205000410");
pub const RIPEMD160_DIGEST_INFO_PREFIX: [u8; 15] = hex!("3021300906052b2403020105000414");
pub const RIPEMD256_DIGEST_INFO_PREFIX: [u8; 15] = hex!("302d300906052b2403020305000420");

/// A failed verification is a regular `Ok(false)` outcome; this error covers
/// the cases where no verdict could be reached at all.
#[derive(Debug, thiserror::Error)]
pub enum VerifyError {
    #[error("unsupported signature algorithm {0:?}")]
    UnsupportedAlgorithm(String),
    #[error("malformed public key: {0}")]
    Key(String),
    #[error("verification backend error: {0}")]
    Backend(String),
}

/// Digest algorithms the card can produce signatures over.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString)]
pub enum DigestAlgorithm {
    #[strum(to_string = "SHA-1", serialize = "SHA1")]
    Sha1,
    #[strum(to_string = "SHA-224")]
    Sha224,
    #[strum(to_string = "SHA-256")]
    Sha256,
    #[strum(to_string = "SHA-384")]
    Sha384,
    #[strum(to_string = "SHA-512")]
    Sha512,
    #[strum(to_string = "RIPEMD128")]
    Ripemd128,
    #[strum(to_string = "RIPEMD160")]
    Ripemd160,
    #[strum(to_string = "RIPEMD256")]
    Ripemd256,
}

impl DigestAlgorithm {
    pub fn digest_info_prefix(self) -> &'static [u8] {
        match self {
            Self::Sha1 => &SHA1_DIGEST_INFO_PREFIX,
            Self::Sha224 => &SHA224_DIGEST_INFO_PREFIX,
            Self::Sha256 => &SHA256_DIGEST_INFO_PREFIX,
            Self::Sha384 => &SHA384_DIGEST_INFO_PREFIX,
            Self::Sha512 => &SHA512_DIGEST_INFO_PREFIX,
            Self::Ripemd128 => &RIPEMD128_DIGEST_INFO_PREFIX,
            Self::Ripemd160 => &RIPEMD160_DIGEST_INFO_PREFIX,
            Self::Ripemd256 => &RIPEMD256_DIGEST_INFO_PREFIX,
        }
    }

    pub fn output_length(self) -> usize {
        match self {
            Self::Sha1 | Self::Ripemd160 => 20,
            Self::Sha224 => 28,
            Self::Sha256 | Self::Ripemd256 => 32,
            Self::Sha384 => 48,
            Self::Sha512 => 64,
            Self::Ripemd128 => 16,
        }
    }

    /// Digest algorithm used for the photo digest embedded in the identity
    /// file, selected by the length of the expected digest.
    pub fn from_digest_length(length: usize) -> Option<Self> {
        match length {
            20 => Some(Self::Sha1),
            28 => Some(Self::Sha224),
            32 => Some(Self::Sha256),
            48 => Some(Self::Sha384),
            64 => Some(Self::Sha512),
            _ => None,
        }
    }

    pub fn digest(self, data: &[u8]) -> Vec<u8> {
        self.digest_parts(&[data])
    }

    pub fn digest_parts(self, parts: &[&[u8]]) -> Vec<u8> {
        fn run<D: Digest>(parts: &[&[u8]]) -> Vec<u8> {
            let mut hasher = D::new();
            for part in parts {
                hasher.update(part);
            }
            hasher.finalize().to_vec()
        }
        match self {
            Self::Sha1 => run::<Sha1>(parts),
            Self::Sha224 => run::<Sha224>(parts),
            Self::Sha256 => run::<Sha256>(parts),
            Self::Sha384 => run::<Sha384>(parts),
            Self::Sha512 => run::<Sha512>(parts),
            Self::Ripemd128 => run::<Ripemd128>(parts),
            Self::Ripemd160 => run::<Ripemd160>(parts),
            Self::Ripemd256 => run::<Ripemd256>(parts),
        }
    }
}

/// Algorithm identifier carried in session state between a sign request and
/// the matching signature data, e.g. `SHA-256` or `SHA-256-PSS`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SignatureAlgorithm {
    pub digest: DigestAlgorithm,
    pub pss: bool,
}

impl SignatureAlgorithm {
    pub fn parse(identifier: &str) -> Result<Self, VerifyError> {
        let (digest_part, pss) = match identifier.strip_suffix("-PSS") {
            Some(digest_part) => (digest_part, true),
            None => (identifier, false),
        };
        let digest = DigestAlgorithm::from_str(digest_part)
            .map_err(|_| VerifyError::UnsupportedAlgorithm(identifier.to_string()))?;
        Ok(Self { digest, pss })
    }
}

impl std::fmt::Display for SignatureAlgorithm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.pss {
            write!(f, "{}-PSS", self.digest)
        } else {
            write!(f, "{}", self.digest)
        }
    }
}

/// Verify a signature over a digest value, dispatching on the algorithm
/// identifier stored for the session.
pub fn verify(
    algorithm: SignatureAlgorithm,
    digest_value: &[u8],
    signature: &[u8],
    public_key: &RsaPublicKey,
) -> Result<bool, VerifyError> {
    if algorithm.pss {
        verify_rsa_pss(algorithm.digest, digest_value, signature, public_key)
    } else {
        verify_rsa(algorithm.digest, digest_value, signature, public_key)
    }
}

/// Verify a plain RSA signature over `DigestInfo = prefix || digest`.
pub fn verify_rsa(
    digest_algo: DigestAlgorithm,
    digest_value: &[u8],
    signature: &[u8],
    public_key: &RsaPublicKey,
) -> Result<bool, VerifyError> {
    let prefix = digest_algo.digest_info_prefix();
    let mut digest_info = Vec::with_capacity(prefix.len() + digest_value.len());
    digest_info.extend_from_slice(prefix);
    digest_info.extend_from_slice(digest_value);
    outcome(public_key.verify(Pkcs1v15Sign::new_unprefixed(), &digest_info, signature))
}

/// Verify an RSA-PSS signature directly over the digest value.
pub fn verify_rsa_pss(
    digest_algo: DigestAlgorithm,
    digest_value: &[u8],
    signature: &[u8],
    public_key: &RsaPublicKey,
) -> Result<bool, VerifyError> {
    let scheme = match digest_algo {
        DigestAlgorithm::Sha1 => Pss::new::<Sha1>(),
        DigestAlgorithm::Sha224 => Pss::new::<Sha224>(),
        DigestAlgorithm::Sha256 => Pss::new::<Sha256>(),
        DigestAlgorithm::Sha384 => Pss::new::<Sha384>(),
        DigestAlgorithm::Sha512 => Pss::new::<Sha512>(),
        DigestAlgorithm::Ripemd128 => Pss::new::<Ripemd128>(),
        DigestAlgorithm::Ripemd160 => Pss::new::<Ripemd160>(),
        DigestAlgorithm::Ripemd256 => Pss::new::<Ripemd256>(),
    };
    outcome(public_key.verify(scheme, digest_value, signature))
}

/// Verify a PKCS#1 v1.5 signature over `data`, hashing with the digest
/// algorithm the certificate itself declares. Used for the identity and
/// address signatures, which are made by the national registry with its own
/// certificate's algorithm.
pub fn verify_with_certificate_algorithm(
    certificate: &Certificate,
    data: &[&[u8]],
    signature: &[u8],
) -> Result<bool, VerifyError> {
    let digest_algo = digest_for_signature_oid(&certificate.signature_algorithm.oid)?;
    let public_key = rsa_public_key(certificate)?;
    let digest = digest_algo.digest_parts(data);
    verify_rsa(digest_algo, &digest, signature, &public_key)
}

fn digest_for_signature_oid(oid: &ObjectIdentifier) -> Result<DigestAlgorithm, VerifyError> {
    if *oid == SHA_1_WITH_RSA_ENCRYPTION {
        Ok(DigestAlgorithm::Sha1)
    } else if *oid == SHA_224_WITH_RSA_ENCRYPTION {
        Ok(DigestAlgorithm::Sha224)
    } else if *oid == SHA_256_WITH_RSA_ENCRYPTION {
        Ok(DigestAlgorithm::Sha256)
    } else if *oid == SHA_384_WITH_RSA_ENCRYPTION {
        Ok(DigestAlgorithm::Sha384)
    } else if *oid == SHA_512_WITH_RSA_ENCRYPTION {
        Ok(DigestAlgorithm::Sha512)
    } else {
        Err(VerifyError::UnsupportedAlgorithm(oid.to_string()))
    }
}

fn outcome(result: rsa::Result<()>) -> Result<bool, VerifyError> {
    match result {
        Ok(()) => Ok(true),
        Err(rsa::Error::Verification) => Ok(false),
        Err(e) => Err(VerifyError::Backend(e.to_string())),
    }
}
