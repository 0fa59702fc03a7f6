//! Handler for a finished message sent by the client, which either reports
//! completion of a client-local operation or cancels the run.

use crate::protocol::message::FinishedMessage;
use crate::protocol::ProtocolMessage;
use crate::server::{Error, ProtocolService, RequestContext, Session};

pub(crate) fn handle(
    _service: &ProtocolService,
    session: &mut Session,
    message: &FinishedMessage,
    _context: &RequestContext,
) -> Result<ProtocolMessage, Error> {
    match message.error_code {
        Some(error_code) => tracing::warn!("client finished with error code {error_code}"),
        None => tracing::debug!("client finished"),
    }
    session.clear();
    Ok(FinishedMessage::new().into())
}
