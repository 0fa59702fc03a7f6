//! Handler for the hello message that opens every protocol run.

use crate::protocol::message::{CheckClientMessage, HelloMessage};
use crate::protocol::ProtocolMessage;
use crate::server::{Error, ProtocolService, RequestContext, Session};

pub(crate) fn handle(
    service: &ProtocolService,
    session: &mut Session,
    message: &HelloMessage,
    context: &RequestContext,
) -> Result<ProtocolMessage, Error> {
    tracing::debug!(request_id = %message.request_id, "hello message received");
    if service.config().require_secure_channel && !context.secure {
        return Err(Error::Violation(
            "client connected over an unsecured channel".to_string(),
        ));
    }
    if let Some(language) = &message.language {
        tracing::debug!("client language: {language}");
    }
    session.request_id = Some(message.request_id.clone());
    Ok(CheckClientMessage.into())
}
