//! X.509 certificate handling: chain reconstruction from message bodies and
//! RSA signature verification against card-produced digests.

use anyhow::{anyhow, Context, Result};
use x509_cert::{
    certificate::Certificate,
    der::{Decode, Encode},
};

pub mod chain;
pub mod signature;
mod util;

pub use chain::{CertificateChain, ChainSlot};
pub use util::{common_name_or_unknown, user_identifier};
pub(crate) use util::rsa_public_key;

/// X.509 certificate with the DER representation held in memory for ease of
/// re-framing into message bodies.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct CertificateWithDer {
    pub inner: Certificate,
    der: Vec<u8>,
}

impl CertificateWithDer {
    pub fn from_pem(bytes: &[u8]) -> Result<Self> {
        let bytes = pem_rfc7468::decode_vec(bytes)
            .map_err(|e| anyhow!("unable to parse certificate from PEM encoding: {e}"))?
            .1;
        CertificateWithDer::from_der(&bytes)
    }

    pub fn from_der(bytes: &[u8]) -> Result<Self> {
        let inner = Certificate::from_der(bytes)
            .context("unable to parse certificate from DER encoding")?;
        Ok(Self {
            inner,
            der: bytes.to_vec(),
        })
    }

    pub fn from_cert(certificate: Certificate) -> Result<Self> {
        let der = certificate.to_der()?;
        Ok(Self {
            inner: certificate,
            der,
        })
    }

    pub fn der(&self) -> &[u8] {
        &self.der
    }
}
