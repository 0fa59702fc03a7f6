//! Reconstruction of certificate chains from a concatenated message body.
//!
//! The client ships a chain as one opaque body with per-slot byte lengths
//! declared in sibling headers. A slot may legitimately hold no certificate:
//! eID cards without an authentication or non-repudiation certificate send a
//! fixed-size block of zero bytes in its place.

use super::CertificateWithDer;

/// Byte length of the all-zero block representing a certificate that is not
/// present on the card.
pub const ABSENT_CERTIFICATE_LENGTH: usize = 1300;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("chain framing error: slot sizes declare {declared} bytes but the body holds {actual}")]
    Framing { declared: usize, actual: usize },
    #[error("unable to decode certificate in slot {slot}: {reason}")]
    Decoding { slot: usize, reason: String },
}

/// One position in a reconstructed chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChainSlot {
    Present(CertificateWithDer),
    /// The slot carried the absent-certificate marker.
    Absent,
}

impl ChainSlot {
    /// Decode a slot from its raw bytes. Only the exact all-zero marker maps
    /// to [`ChainSlot::Absent`]; any other undecodable content is an error.
    pub fn parse(data: &[u8]) -> Result<Self, Error> {
        Self::parse_at(data, 0)
    }

    fn parse_at(data: &[u8], slot: usize) -> Result<Self, Error> {
        if is_absent_marker(data) {
            tracing::debug!("slot {slot} carries the absent-certificate marker");
            return Ok(ChainSlot::Absent);
        }
        CertificateWithDer::from_der(data)
            .map(ChainSlot::Present)
            .map_err(|e| Error::Decoding {
                slot,
                reason: e.to_string(),
            })
    }

    pub fn as_certificate(&self) -> Option<&CertificateWithDer> {
        match self {
            ChainSlot::Present(certificate) => Some(certificate),
            ChainSlot::Absent => None,
        }
    }

    /// Raw bytes of the slot as they appear in a message body.
    pub fn der_bytes(&self) -> Vec<u8> {
        match self {
            ChainSlot::Present(certificate) => certificate.der().to_vec(),
            ChainSlot::Absent => vec![0; ABSENT_CERTIFICATE_LENGTH],
        }
    }
}

pub fn is_absent_marker(data: &[u8]) -> bool {
    data.len() == ABSENT_CERTIFICATE_LENGTH && data.iter().all(|&b| b == 0)
}

/// An ordered sequence of certificate slots as delivered by the client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CertificateChain(Vec<ChainSlot>);

impl CertificateChain {
    /// Slice `body` into slots of the declared sizes. The sizes must consume
    /// the body exactly; anything else is a framing error.
    pub fn split(body: &[u8], sizes: &[usize]) -> Result<Self, Error> {
        let declared = sizes.iter().sum::<usize>();
        if declared != body.len() {
            return Err(Error::Framing {
                declared,
                actual: body.len(),
            });
        }
        let mut slots = Vec::with_capacity(sizes.len());
        let mut offset = 0;
        for (slot, &size) in sizes.iter().enumerate() {
            slots.push(ChainSlot::parse_at(&body[offset..offset + size], slot)?);
            offset += size;
        }
        Ok(Self(slots))
    }

    pub fn from_slots(slots: Vec<ChainSlot>) -> Self {
        Self(slots)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn slots(&self) -> &[ChainSlot] {
        &self.0
    }

    /// The signing certificate occupies the first slot, when present.
    pub fn signing_certificate(&self) -> Option<&CertificateWithDer> {
        self.0.first().and_then(ChainSlot::as_certificate)
    }

    /// Certificates actually present, leaf first.
    pub fn certificates(&self) -> impl Iterator<Item = &CertificateWithDer> {
        self.0.iter().filter_map(ChainSlot::as_certificate)
    }

    /// Re-concatenate the chain into body bytes plus per-slot sizes.
    pub fn to_body(&self) -> (Vec<u8>, Vec<usize>) {
        let mut body = Vec::new();
        let mut sizes = Vec::with_capacity(self.0.len());
        for slot in &self.0 {
            let bytes = slot.der_bytes();
            sizes.push(bytes.len());
            body.extend_from_slice(&bytes);
        }
        (body, sizes)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::x509::testutil::self_signed;

    #[test]
    fn absent_marker_is_exactly_1300_zero_bytes() {
        assert!(is_absent_marker(&[0; 1300]));
        assert!(!is_absent_marker(&[0; 1299]));
        assert!(!is_absent_marker(&[0; 1301]));
        let mut nearly = vec![0u8; 1300];
        nearly[747] = 1;
        assert!(!is_absent_marker(&nearly));
    }

    #[test]
    fn zero_marker_decodes_to_absent_in_any_position() {
        let (certificate, _) = self_signed("CN=Citizen CA,C=BE");
        let marker = vec![0u8; 1300];
        let body = [marker.as_slice(), certificate.der(), marker.as_slice()].concat();
        let sizes = [1300, certificate.der().len(), 1300];
        let chain = CertificateChain::split(&body, &sizes).unwrap();
        assert_eq!(chain.slots()[0], ChainSlot::Absent);
        assert!(chain.slots()[1].as_certificate().is_some());
        assert_eq!(chain.slots()[2], ChainSlot::Absent);
        assert!(chain.signing_certificate().is_none());
    }

    #[test]
    fn malformed_slot_of_marker_length_is_a_hard_error() {
        let mut garbage = vec![0u8; 1300];
        garbage[0] = 0x30;
        let result = CertificateChain::split(&garbage, &[1300]);
        assert!(matches!(result, Err(Error::Decoding { slot: 0, .. })));
    }

    #[test]
    fn split_then_reassemble_reproduces_the_body() {
        let (signing, _) = self_signed("CN=Jan Janssens (Signature),C=BE");
        let (ca, _) = self_signed("CN=Citizen CA,C=BE");
        let absent = vec![0u8; 1300];
        let body = [signing.der(), absent.as_slice(), ca.der()].concat();
        let sizes = vec![signing.der().len(), 1300, ca.der().len()];
        let chain = CertificateChain::split(&body, &sizes).unwrap();
        let (reassembled, reassembled_sizes) = chain.to_body();
        assert_eq!(reassembled, body);
        assert_eq!(reassembled_sizes, sizes);
    }

    #[test]
    fn sizes_must_consume_the_body_exactly() {
        let (certificate, _) = self_signed("CN=Citizen CA,C=BE");
        let body = certificate.der().to_vec();
        let result = CertificateChain::split(&body, &[body.len() - 1]);
        assert!(matches!(
            result,
            Err(Error::Framing { declared, actual }) if declared == actual - 1
        ));
    }
}
