//! Handler for the client environment report; chooses and parameterizes the
//! operation request the server answers with.

use rand::RngCore;

use crate::protocol::message::{
    AdministrationMessage, AuthenticationRequestMessage, ClientEnvironmentMessage,
    FilesDigestRequestMessage, IdentificationRequestMessage, SignCertificatesRequestMessage,
};
use crate::protocol::ProtocolMessage;
use crate::server::handlers::sign_preparation;
use crate::server::{Error, ProtocolService, RequestContext, RequestedParts, ServerOperation, Session};

pub(crate) fn handle(
    service: &ProtocolService,
    session: &mut Session,
    message: &ClientEnvironmentMessage,
    _context: &RequestContext,
) -> Result<ProtocolMessage, Error> {
    tracing::debug!(
        client_version = %message.client_version,
        os = %message.os_name,
        arch = %message.os_arch,
        os_version = %message.os_version,
        "client environment received"
    );
    for reader in &message.readers {
        tracing::debug!("card reader: {reader}");
    }

    let response = match &service.config().operation {
        ServerOperation::Identification {
            include_address,
            include_photo,
            include_certificates,
        } => {
            session.requested_parts = Some(RequestedParts {
                address: *include_address,
                photo: *include_photo,
                certificates: *include_certificates,
            });
            IdentificationRequestMessage {
                include_address: *include_address,
                include_photo: *include_photo,
                include_certificates: *include_certificates,
            }
            .into()
        }
        ServerOperation::Authentication { challenge_size } => {
            let mut challenge = vec![0u8; *challenge_size];
            rand::thread_rng().fill_bytes(&mut challenge);
            session.challenge = Some(challenge.clone());
            AuthenticationRequestMessage { challenge }.into()
        }
        ServerOperation::Administration {
            change_pin,
            unblock_pin,
        } => AdministrationMessage {
            change_pin: *change_pin,
            unblock_pin: *unblock_pin,
        }
        .into(),
        ServerOperation::Signing => sign_preparation::issue_sign_request(service, session, None, None)?,
        ServerOperation::FilesDigestSigning { digest_algo } => FilesDigestRequestMessage {
            digest_algo: digest_algo.clone(),
        }
        .into(),
        ServerOperation::CertificateSigning => SignCertificatesRequestMessage.into(),
    };
    Ok(response)
}
