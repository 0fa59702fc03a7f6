//! Handlers that turn client-supplied signing material into a sign request.
//!
//! Both the file-digests flow and the certificate-collecting flow end the
//! same way: the signature collaborator computes the digest to be signed,
//! the digest is parked in the session, and the client receives a
//! `SignRequestMessage`.

use anyhow::{anyhow, Context};

use crate::protocol::message::{FileDigestsDataMessage, SignCertificatesDataMessage, SignRequestMessage};
use crate::protocol::ProtocolMessage;
use crate::server::{Error, PendingDigest, ProtocolService, RequestContext, Session};
use crate::x509::CertificateChain;

pub(crate) fn issue_sign_request(
    service: &ProtocolService,
    session: &mut Session,
    file_digests: Option<&[u8]>,
    sign_certificates: Option<&CertificateChain>,
) -> Result<ProtocolMessage, Error> {
    let signature_service = service
        .services()
        .signature
        .as_deref()
        .ok_or_else(|| Error::Internal(anyhow!("no signature service configured")))?;
    let request_id = session.require_request_id()?.to_string();
    let digest_info = signature_service
        .pre_sign(&request_id, file_digests, sign_certificates)
        .context("sign preparation failed")?;
    tracing::debug!(
        algo = %digest_info.digest_algo,
        "storing digest pending signature"
    );
    session.pending_digest = Some(PendingDigest {
        value: digest_info.digest_value.clone(),
        algo: digest_info.digest_algo.clone(),
    });
    Ok(SignRequestMessage {
        digest_algo: digest_info.digest_algo,
        description: Some(digest_info.description),
        digest_value: digest_info.digest_value,
    }
    .into())
}

pub(crate) fn handle_file_digests(
    service: &ProtocolService,
    session: &mut Session,
    message: &FileDigestsDataMessage,
    _context: &RequestContext,
) -> Result<ProtocolMessage, Error> {
    tracing::debug!(
        algo = %message.digest_algo,
        size = message.file_digests.len(),
        "file digests received"
    );
    issue_sign_request(service, session, Some(&message.file_digests), None)
}

pub(crate) fn handle_sign_certificates(
    service: &ProtocolService,
    session: &mut Session,
    message: &SignCertificatesDataMessage,
    _context: &RequestContext,
) -> Result<ProtocolMessage, Error> {
    tracing::debug!("sign certificates received");
    if message.certificate_chain.signing_certificate().is_none() {
        return Err(Error::Violation(
            "non-repudiation certificate missing".to_string(),
        ));
    }
    issue_sign_request(service, session, None, Some(&message.certificate_chain))
}
