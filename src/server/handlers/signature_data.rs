//! Handler for the signature data message.
//!
//! Verifies the produced signature against the digest stored for this
//! session, hands the result to the signature collaborator for its
//! post-sign judgment of the chain, and notifies the audit sink.

use anyhow::anyhow;

use crate::protocol::message::{FinishedMessage, SignatureDataMessage};
use crate::protocol::ProtocolMessage;
use crate::server::{Error, ProtocolService, RequestContext, Session};
use crate::x509::signature::{self, SignatureAlgorithm};
use crate::x509::{common_name_or_unknown, rsa_public_key, user_identifier};

pub(crate) fn handle(
    service: &ProtocolService,
    session: &mut Session,
    message: &SignatureDataMessage,
    context: &RequestContext,
) -> Result<ProtocolMessage, Error> {
    tracing::debug!("signature data message received");

    let chain = &message.certificate_chain;
    if chain.is_empty() {
        return Err(Error::Violation("certificate chain is empty".to_string()));
    }
    let signing_certificate = chain
        .signing_certificate()
        .ok_or_else(|| Error::Violation("non-repudiation certificate missing".to_string()))?;
    tracing::debug!(
        "non-repudiation signing certificate: {}",
        common_name_or_unknown(&signing_certificate.inner)
    );

    // the digest is consumed: a second signature data message for the same
    // sign request has nothing to verify against
    let pending = session
        .pending_digest
        .take()
        .ok_or_else(|| Error::Violation("no digest pending signature".to_string()))?;
    let algorithm = SignatureAlgorithm::parse(&pending.algo)
        .map_err(|e| Error::Internal(anyhow!("stored digest algorithm: {e}")))?;
    let public_key = rsa_public_key(&signing_certificate.inner)
        .map_err(|e| Error::Internal(anyhow!("signing certificate key: {e}")))?;

    if algorithm.pss {
        tracing::debug!("verifying RSA-PSS signature, {algorithm}");
    } else {
        tracing::debug!("verifying RSA signature, {algorithm}");
    }
    match signature::verify(algorithm, &pending.value, &message.signature_value, &public_key) {
        Ok(true) => {}
        Ok(false) => {
            if let Some(audit) = service.services().audit.as_deref() {
                audit.signature_error(&context.remote_address, signing_certificate);
            }
            return Err(Error::Violation("signature incorrect".to_string()));
        }
        Err(e) => {
            return Err(Error::Internal(anyhow!("signature verification error: {e}")));
        }
    }

    let signature_service = service
        .services()
        .signature
        .as_deref()
        .ok_or_else(|| Error::Internal(anyhow!("no signature service configured")))?;
    let request_id = session.require_request_id()?;
    if let Err(e) = signature_service.post_sign(request_id, &message.signature_value, chain) {
        return match e.error_code() {
            Some(error_code) => Ok(FinishedMessage::with_error(error_code).into()),
            None => Err(Error::Internal(anyhow!("signature service error: {e}"))),
        };
    }

    if let Some(audit) = service.services().audit.as_deref() {
        let user_id = user_identifier(&signing_certificate.inner)
            .unwrap_or_else(|| common_name_or_unknown(&signing_certificate.inner));
        audit.signed(&user_id);
    }

    Ok(FinishedMessage::new().into())
}
