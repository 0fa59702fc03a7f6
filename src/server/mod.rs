//! Protocol state machine and message dispatch.
//!
//! One [`ProtocolService`] serves all sessions; it owns no per-session state.
//! Each inbound message passes four steps: the acceptance check against the
//! session's protocol state, handler dispatch on the concrete variant, the
//! response-legality check, and the state transition declared by the
//! response.

use anyhow::anyhow;

use crate::protocol::{
    envelope, HttpReceiver, HttpTransmitter, MessageType, ProtocolMessage, ProtocolState,
};
use crate::spi::{AuditService, IdentityConsumerService, IdentityIntegrityService, SignatureService};

pub mod config;
pub mod handlers;
pub mod session;

pub use config::{ServerConfig, ServerOperation};
pub use session::{PendingDigest, RequestedParts, Session};

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The client broke the protocol; fatal for the current request.
    #[error("protocol violation: {0}")]
    Violation(String),
    /// A security check failed in a way that has no client-facing code.
    #[error("security failure: {0}")]
    Security(String),
    #[error(transparent)]
    Envelope(#[from] envelope::Error),
    /// Unexpected infrastructure failure; never translated into a client
    /// error code.
    #[error("internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

/// Collaborating services. A service left unconfigured disables the checks
/// or notifications that depend on it.
#[derive(Default)]
pub struct Services {
    pub identity_integrity: Option<Box<dyn IdentityIntegrityService>>,
    pub identity_consumer: Option<Box<dyn IdentityConsumerService>>,
    pub signature: Option<Box<dyn SignatureService>>,
    pub audit: Option<Box<dyn AuditService>>,
}

/// Transport-level context of the request a message arrived on.
#[derive(Debug, Clone)]
pub struct RequestContext {
    pub remote_address: String,
    pub secure: bool,
}

pub struct ProtocolService {
    config: ServerConfig,
    services: Services,
}

impl ProtocolService {
    pub fn new(config: ServerConfig, services: Services) -> Self {
        Self { config, services }
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    pub(crate) fn services(&self) -> &Services {
        &self.services
    }

    /// Serve one request/response cycle: decode from the transport, run the
    /// message through the state machine, encode the response.
    pub fn process<R: HttpReceiver, T: HttpTransmitter>(
        &self,
        session: &mut Session,
        receiver: &R,
        transmitter: &mut T,
    ) -> Result<(), Error> {
        let expected = Self::expected_types(session.protocol_state());
        let message = envelope::decode(receiver, Some(&expected))?;
        let context = RequestContext {
            remote_address: receiver.remote_address(),
            secure: receiver.is_secure(),
        };
        let response = self.handle(session, &message, &context)?;
        envelope::encode(&response, transmitter)?;
        Ok(())
    }

    /// Message types acceptable in the given session state; this feeds the
    /// envelope gate so that illegal discriminators are rejected before any
    /// field mapping runs.
    pub fn expected_types(state: Option<ProtocolState>) -> Vec<MessageType> {
        const INBOUND: [MessageType; 7] = [
            MessageType::Hello,
            MessageType::ClientEnvironment,
            MessageType::IdentityData,
            MessageType::SignatureData,
            MessageType::FileDigestsData,
            MessageType::SignCertificatesData,
            MessageType::Finished,
        ];
        match state {
            None => vec![MessageType::Hello],
            Some(state) => INBOUND
                .into_iter()
                .filter(|t| t.accepts_state(state) || t.start_state() == Some(state))
                .collect(),
        }
    }

    /// Run one decoded message through acceptance, dispatch and transition.
    pub fn handle(
        &self,
        session: &mut Session,
        message: &ProtocolMessage,
        context: &RequestContext,
    ) -> Result<ProtocolMessage, Error> {
        let message_type = message.message_type();
        self.accept(session, message_type)?;

        let response = self.dispatch(session, message, context)?;

        let response_type = response.message_type();
        if !message_type.responses_allowed().contains(&response_type) {
            // a handler producing an illegal response is a defect in this
            // crate, not client behaviour; fail loudly
            return Err(Error::Internal(anyhow!(
                "handler for {message_type} produced {response_type}, \
                 which is not an allowed response"
            )));
        }

        if let Some(next) = response_type.transition() {
            session.set_protocol_state(next);
        } else if response_type == MessageType::Finished {
            session.remove_protocol_state();
        }
        Ok(response)
    }

    fn accept(&self, session: &mut Session, message_type: MessageType) -> Result<(), Error> {
        match (message_type.start_state(), session.protocol_state()) {
            (Some(initial), None) => {
                session.set_protocol_state(initial);
                Ok(())
            }
            (Some(initial), Some(current)) if current == initial => {
                // a client restarting from the top; drop stale context
                session.clear();
                session.set_protocol_state(initial);
                Ok(())
            }
            (Some(_), Some(current)) => Err(Error::Violation(format!(
                "{message_type} cannot start a session in state {current}"
            ))),
            (None, Some(current)) if message_type.accepts_state(current) => Ok(()),
            (None, Some(current)) => Err(Error::Violation(format!(
                "{message_type} not acceptable in state {current}"
            ))),
            (None, None) => Err(Error::Violation(format!(
                "{message_type} received without an established session"
            ))),
        }
    }

    fn dispatch(
        &self,
        session: &mut Session,
        message: &ProtocolMessage,
        context: &RequestContext,
    ) -> Result<ProtocolMessage, Error> {
        match message {
            ProtocolMessage::Hello(m) => handlers::hello::handle(self, session, m, context),
            ProtocolMessage::ClientEnvironment(m) => {
                handlers::client_environment::handle(self, session, m, context)
            }
            ProtocolMessage::IdentityData(m) => {
                handlers::identity_data::handle(self, session, m, context)
            }
            ProtocolMessage::SignatureData(m) => {
                handlers::signature_data::handle(self, session, m, context)
            }
            ProtocolMessage::FileDigestsData(m) => {
                handlers::sign_preparation::handle_file_digests(self, session, m, context)
            }
            ProtocolMessage::SignCertificatesData(m) => {
                handlers::sign_preparation::handle_sign_certificates(self, session, m, context)
            }
            ProtocolMessage::Finished(m) => handlers::finished::handle(self, session, m, context),
            other => Err(Error::Violation(format!(
                "{} is not a request message",
                other.message_type()
            ))),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::protocol::message::{FinishedMessage, HelloMessage, SignatureDataMessage};
    use crate::x509::chain::ChainSlot;
    use crate::x509::CertificateChain;

    fn service() -> ProtocolService {
        ProtocolService::new(ServerConfig::default(), Services::default())
    }

    fn context() -> RequestContext {
        RequestContext {
            remote_address: "192.0.2.17".to_string(),
            secure: true,
        }
    }

    fn hello() -> ProtocolMessage {
        HelloMessage {
            language: None,
            request_id: "req-1".to_string(),
        }
        .into()
    }

    #[test]
    fn hello_starts_a_fresh_session_in_init() {
        let service = service();
        let mut session = Session::new();
        assert_eq!(session.protocol_state(), None);
        let response = service.handle(&mut session, &hello(), &context()).unwrap();
        assert_eq!(response.message_type(), MessageType::CheckClient);
        // the check-client response immediately moves the session onwards
        assert_eq!(session.protocol_state(), Some(ProtocolState::EnvCheck));
    }

    #[test]
    fn hello_is_rejected_mid_session() {
        let service = service();
        let mut session = Session::new();
        session.set_protocol_state(ProtocolState::Sign);
        let err = service.handle(&mut session, &hello(), &context()).unwrap_err();
        assert!(matches!(err, Error::Violation(_)));
    }

    #[test]
    fn signature_data_outside_sign_state_is_a_violation() {
        let service = service();
        let message: ProtocolMessage = SignatureDataMessage {
            signature_value: vec![0; 16],
            certificate_chain: CertificateChain::from_slots(vec![
                ChainSlot::Absent,
                ChainSlot::Absent,
                ChainSlot::Absent,
            ]),
        }
        .into();

        for state in [
            None,
            Some(ProtocolState::Init),
            Some(ProtocolState::EnvCheck),
            Some(ProtocolState::Identify),
            Some(ProtocolState::Admin),
        ] {
            let mut session = Session::new();
            if let Some(state) = state {
                session.set_protocol_state(state);
            }
            let err = service.handle(&mut session, &message, &context()).unwrap_err();
            assert!(matches!(err, Error::Violation(_)), "state {state:?}");
        }
    }

    #[test]
    fn expected_types_gate_by_state() {
        assert_eq!(
            ProtocolService::expected_types(None),
            vec![MessageType::Hello]
        );
        let in_sign = ProtocolService::expected_types(Some(ProtocolState::Sign));
        assert!(in_sign.contains(&MessageType::SignatureData));
        assert!(in_sign.contains(&MessageType::Finished));
        assert!(!in_sign.contains(&MessageType::IdentityData));
        // Hello may restart a session sitting in INIT
        let in_init = ProtocolService::expected_types(Some(ProtocolState::Init));
        assert!(in_init.contains(&MessageType::Hello));
    }

    #[test]
    fn client_finished_clears_the_session_in_any_state() {
        let service = service();
        let mut session = Session::new();
        session.set_protocol_state(ProtocolState::Identify);
        session.request_id = Some("req-1".to_string());
        let message: ProtocolMessage = FinishedMessage::with_error(
            crate::definitions::ErrorCode::UserCanceled,
        )
        .into();
        let response = service.handle(&mut session, &message, &context()).unwrap();
        assert_eq!(response.message_type(), MessageType::Finished);
        assert_eq!(session.protocol_state(), None);
        assert_eq!(session.request_id, None);
    }
}
