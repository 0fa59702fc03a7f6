//! Handler for the identity data message.
//!
//! Cross-checks the included parts against what was requested earlier in
//! the session, verifies the national registry signatures over the identity
//! and address files, has the trust collaborator judge the registry chain,
//! checks photo integrity and card validity, and only then forwards the
//! data to the identity consumer.

use anyhow::{anyhow, Context};
use time::OffsetDateTime;

use crate::definitions::helpers::NonEmptyVec;
use crate::definitions::{Address, Identity};
use crate::protocol::message::{FinishedMessage, IdentityDataMessage};
use crate::protocol::ProtocolMessage;
use crate::server::{Error, ProtocolService, RequestContext, Session};
use crate::x509::signature::{self, DigestAlgorithm, VerifyError};
use crate::x509::{chain::ChainSlot, common_name_or_unknown, CertificateWithDer};

pub(crate) fn handle(
    service: &ProtocolService,
    session: &mut Session,
    message: &IdentityDataMessage,
    context: &RequestContext,
) -> Result<ProtocolMessage, Error> {
    tracing::debug!("identity data received");
    tracing::debug!("identity file size: {}", message.identity_file.len());

    let identity = Identity::parse(&message.identity_file)
        .map_err(|e| Error::Violation(format!("identity file: {e}")))?;

    let parts = session.requested_parts.unwrap_or_default();

    // the answer must match what was requested, part for part
    let address = match &message.address_file {
        Some(file) => {
            tracing::debug!("address file size: {}", file.len());
            if !parts.address {
                return Err(Error::Violation(
                    "address included while not requested".to_string(),
                ));
            }
            Some(
                Address::parse(file)
                    .map_err(|e| Error::Violation(format!("address file: {e}")))?,
            )
        }
        None => {
            if parts.address {
                return Err(Error::Violation(
                    "address not included while requested".to_string(),
                ));
            }
            None
        }
    };

    let certificates = if parts.certificates {
        Some(requested_certificates(message)?)
    } else {
        None
    };

    if let Some(integrity_service) = service.services().identity_integrity.as_deref() {
        let identity_signature = message
            .identity_signature_file
            .as_deref()
            .ok_or_else(|| Error::Violation("identity signature not included".to_string()))?;
        tracing::debug!("identity signature file size: {}", identity_signature.len());
        let address_signature = if parts.address {
            let file = message.address_signature_file.as_deref().ok_or_else(|| {
                Error::Violation("address signature not included while requested".to_string())
            })?;
            tracing::debug!("address signature file size: {}", file.len());
            Some(file)
        } else {
            None
        };
        let rrn_file = message.rrn_cert_file.as_deref().ok_or_else(|| {
            Error::Violation("national registry certificate not included".to_string())
        })?;
        tracing::debug!("national registry certificate file size: {}", rrn_file.len());
        let rrn_certificate = present_certificate(rrn_file, "national registry certificate")?;

        verify_registry_signature(
            service,
            context,
            &rrn_certificate,
            &[&message.identity_file],
            identity_signature,
        )?;

        if !service.config().skip_national_number_check {
            if let Some(authenticated_user) = &session.authenticated_user {
                if *authenticated_user != identity.national_number {
                    return Err(Error::Violation("national number mismatch".to_string()));
                }
            }
        }

        if let (Some(address_signature), Some(address_file)) =
            (address_signature, message.address_file.as_deref())
        {
            // the card signs the address together with the identity
            // signature, over the address bytes with the zero padding
            // stripped
            let trimmed = trim_trailing_zeroes(address_file);
            verify_registry_signature(
                service,
                context,
                &rrn_certificate,
                &[trimmed, identity_signature],
                address_signature,
            )?;
        }

        tracing::debug!(
            "checking national registry certificate: {}",
            common_name_or_unknown(&rrn_certificate.inner)
        );
        let root_file = message
            .root_cert_file
            .as_deref()
            .ok_or_else(|| Error::Violation("root certificate not included".to_string()))?;
        let root_certificate = present_certificate(root_file, "root certificate")?;
        let mut registry_chain = NonEmptyVec::new(rrn_certificate);
        registry_chain.push(root_certificate);

        if let Err(e) = integrity_service.check_national_registration_certificate(&registry_chain)
        {
            return match e.error_code() {
                Some(error_code) => Ok(FinishedMessage::with_error(error_code).into()),
                None => Err(Error::Internal(anyhow!(
                    "error checking the national registry certificate: {e}"
                ))),
            };
        }
    }

    if let Some(photo) = &message.photo_file {
        tracing::debug!("photo file size: {}", photo.len());
        if !parts.photo {
            return Err(Error::Violation(
                "photo included while not requested".to_string(),
            ));
        }
        let expected_digest = &identity.photo_digest;
        let digest_algo = DigestAlgorithm::from_digest_length(expected_digest.len())
            .ok_or_else(|| {
                Error::Violation(format!(
                    "unsupported photo digest length {}",
                    expected_digest.len()
                ))
            })?;
        let actual_digest = digest_algo.digest(photo);
        if actual_digest != *expected_digest {
            return Err(Error::Violation("photo digest mismatch".to_string()));
        }
    } else if parts.photo {
        return Err(Error::Violation(
            "photo not included while requested".to_string(),
        ));
    }

    let today = OffsetDateTime::now_utc().date();
    if identity.card_validity.has_expired(today) {
        return Err(Error::Security("eID card has expired".to_string()));
    }

    if let Some(consumer) = service.services().identity_consumer.as_deref() {
        let request_id = session.require_request_id()?;
        consumer
            .set_identity(request_id, &identity)
            .context("identity consumer")?;
        if let Some(address) = &address {
            consumer
                .set_address(request_id, address)
                .context("identity consumer")?;
        }
        if let Some(photo) = &message.photo_file {
            consumer
                .set_photo(request_id, photo)
                .context("identity consumer")?;
        }
        if let Some(certificates) = &certificates {
            consumer
                .set_certificates(
                    request_id,
                    &certificates.authentication,
                    &certificates.signing,
                    &certificates.ca,
                    &certificates.root,
                )
                .context("identity consumer")?;
        }
    }

    if let Some(audit) = service.services().audit.as_deref() {
        audit.identified(&identity.national_number);
    }

    Ok(FinishedMessage::new().into())
}

struct RequestedCertificates {
    authentication: CertificateWithDer,
    signing: CertificateWithDer,
    ca: CertificateWithDer,
    root: CertificateWithDer,
}

fn requested_certificates(message: &IdentityDataMessage) -> Result<RequestedCertificates, Error> {
    let file = |file: &Option<Vec<u8>>, what: &str| -> Result<CertificateWithDer, Error> {
        let data = file
            .as_deref()
            .ok_or_else(|| Error::Violation(format!("{what} not included while requested")))?;
        present_certificate(data, what)
    };
    Ok(RequestedCertificates {
        authentication: file(&message.authn_cert_file, "authentication certificate")?,
        signing: file(&message.sign_cert_file, "signing certificate")?,
        ca: file(&message.ca_cert_file, "CA certificate")?,
        root: file(&message.root_cert_file, "root certificate")?,
    })
}

/// Decode a certificate file that the flow requires to be present; the
/// absent-certificate marker counts as missing here.
fn present_certificate(data: &[u8], what: &str) -> Result<CertificateWithDer, Error> {
    match ChainSlot::parse(data) {
        Ok(ChainSlot::Present(certificate)) => Ok(certificate),
        Ok(ChainSlot::Absent) => Err(Error::Violation(format!(
            "{what} not included while requested"
        ))),
        Err(e) => Err(Error::Violation(format!("{what}: {e}"))),
    }
}

fn verify_registry_signature(
    service: &ProtocolService,
    context: &RequestContext,
    certificate: &CertificateWithDer,
    data: &[&[u8]],
    signature_bytes: &[u8],
) -> Result<(), Error> {
    let report_integrity_error = || {
        if let Some(audit) = service.services().audit.as_deref() {
            audit.identity_integrity_error(&context.remote_address);
        }
    };
    match signature::verify_with_certificate_algorithm(&certificate.inner, data, signature_bytes) {
        Ok(true) => Ok(()),
        Ok(false) => {
            report_integrity_error();
            Err(Error::Violation("signature incorrect".to_string()))
        }
        Err(e @ VerifyError::Backend(_)) => {
            report_integrity_error();
            Err(Error::Internal(anyhow!("signature verification error: {e}")))
        }
        Err(e) => Err(Error::Internal(anyhow!("signature verification error: {e}"))),
    }
}

fn trim_trailing_zeroes(data: &[u8]) -> &[u8] {
    let end = data
        .iter()
        .position(|&b| b == 0)
        .unwrap_or(data.len());
    &data[..end]
}

#[cfg(test)]
mod test {
    use super::trim_trailing_zeroes;

    #[test]
    fn trims_at_the_first_zero_byte() {
        assert_eq!(trim_trailing_zeroes(&[1, 2, 3, 0, 0, 0]), &[1, 2, 3]);
        assert_eq!(trim_trailing_zeroes(&[1, 2, 3]), &[1, 2, 3]);
        assert_eq!(trim_trailing_zeroes(&[0, 1]), &[] as &[u8]);
    }
}
