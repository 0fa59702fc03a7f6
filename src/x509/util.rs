use const_oid::db::rfc4519::{CN, SERIAL_NUMBER};
use const_oid::ObjectIdentifier;
use der::asn1::{PrintableStringRef, Utf8StringRef};
use der::Encode;
use rsa::pkcs8::DecodePublicKey;
use rsa::RsaPublicKey;
use x509_cert::certificate::Certificate;

use super::signature::VerifyError;

/// Extract the RSA public key from a certificate.
pub(crate) fn rsa_public_key(certificate: &Certificate) -> Result<RsaPublicKey, VerifyError> {
    let spki = certificate
        .tbs_certificate
        .subject_public_key_info
        .to_der()
        .map_err(|e| VerifyError::Key(e.to_string()))?;
    RsaPublicKey::from_public_key_der(&spki).map_err(|e| VerifyError::Key(e.to_string()))
}

/// Common name of the certificate subject, for log and audit output.
pub fn common_name_or_unknown(certificate: &Certificate) -> String {
    subject_rdn_string(certificate, CN).unwrap_or_else(|| "unknown".to_string())
}

/// User identifier baked into eID certificates: the `serialNumber` attribute
/// of the subject holds the citizen's national number.
pub fn user_identifier(certificate: &Certificate) -> Option<String> {
    subject_rdn_string(certificate, SERIAL_NUMBER)
}

fn subject_rdn_string(certificate: &Certificate, oid: ObjectIdentifier) -> Option<String> {
    for rdn in certificate.tbs_certificate.subject.0.iter() {
        for attribute in rdn.0.iter() {
            if attribute.oid != oid {
                continue;
            }
            if let Ok(value) = attribute.value.decode_as::<Utf8StringRef>() {
                return Some(value.as_str().to_string());
            }
            if let Ok(value) = attribute.value.decode_as::<PrintableStringRef>() {
                return Some(value.as_str().to_string());
            }
        }
    }
    None
}
