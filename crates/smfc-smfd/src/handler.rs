use smfc_core::{GtpMessage, GxMessage};
use smfc_sm_core::{Completion, Session, SessionHandler, Transaction};
use tracing::{info, warn};

/// Procedure handler for a standalone daemon with no policy or user-plane
/// peers wired in. Every procedure is logged and answered locally.
#[derive(Debug, Default)]
pub struct LoggingHandler {
    pub created: u64,
    pub released: u64,
}

impl SessionHandler for LoggingHandler {
    fn create_session_request(
        &mut self,
        sess: Option<&mut Session>,
        xact: &Transaction,
        _request: &GtpMessage,
    ) -> Completion {
        match sess {
            Some(sess) => {
                self.created += 1;
                info!(
                    teid = %sess.teid(),
                    imsi = %sess.imsi,
                    apn = ?sess.apn,
                    xact = %xact.id,
                    "Create-Session accepted"
                );
                Completion::Replied
            }
            None => {
                warn!(peer = %xact.peer(), seq = xact.sequence(), "Create-Session rejected");
                Completion::Replied
            }
        }
    }

    fn delete_session_request(
        &mut self,
        sess: Option<&mut Session>,
        xact: &Transaction,
        _request: &GtpMessage,
    ) -> Completion {
        match sess {
            Some(sess) => {
                self.released += 1;
                info!(teid = %sess.teid(), xact = %xact.id, "Delete-Session accepted");
                Completion::Release
            }
            None => {
                warn!(peer = %xact.peer(), seq = xact.sequence(), "Delete-Session for unknown context");
                Completion::Replied
            }
        }
    }

    fn create_bearer_response(
        &mut self,
        sess: Option<&mut Session>,
        xact: &Transaction,
        _response: &GtpMessage,
    ) -> Completion {
        info!(teid = ?sess.map(|s| s.teid()), xact = %xact.id, "Create-Bearer answered");
        Completion::Replied
    }

    fn update_bearer_response(
        &mut self,
        sess: Option<&mut Session>,
        xact: &Transaction,
        _response: &GtpMessage,
    ) -> Completion {
        info!(teid = ?sess.map(|s| s.teid()), xact = %xact.id, "Update-Bearer answered");
        Completion::Replied
    }

    fn delete_bearer_response(
        &mut self,
        sess: Option<&mut Session>,
        xact: &Transaction,
        _response: &GtpMessage,
    ) -> Completion {
        info!(teid = ?sess.map(|s| s.teid()), xact = %xact.id, "Delete-Bearer answered");
        Completion::Replied
    }

    fn cca_initial(
        &mut self,
        sess: &mut Session,
        xact: &Transaction,
        _answer: &GxMessage,
        _request: &GtpMessage,
    ) -> Completion {
        info!(teid = %sess.teid(), xact = %xact.id, "Policy installed");
        Completion::Replied
    }

    fn cca_termination(
        &mut self,
        sess: &mut Session,
        xact: &Transaction,
        _answer: &GxMessage,
        _request: &GtpMessage,
    ) -> Completion {
        self.released += 1;
        info!(teid = %sess.teid(), xact = %xact.id, "Policy removed");
        Completion::Release
    }

    fn re_auth_request(&mut self, sess: &mut Session, request: &GxMessage) {
        info!(teid = %sess.teid(), session_id = ?request.session_id(), "Re-Auth received");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use smfc_core::gtp::encode_bcd;
    use smfc_core::{Fteid, GtpHeader, GtpIe};
    use smfc_shared::*;
    use smfc_sm_core::{Dispatcher, SmfAction, SmfEvent};

    fn sgw() -> NodeId {
        NodeId("10.1.1.1:2123".parse().unwrap())
    }

    fn gtp(message_type: u8, teid: Teid, sequence: u32) -> SmfEvent {
        let buf = GtpMessage::new(GtpHeader::new(message_type, teid, sequence))
            .with_ie(GtpIe::new(GTP_IE_IMSI, 0, encode_bcd("001010000000009")))
            .with_ie(
                Fteid {
                    interface_type: 7,
                    teid: Teid(0x42),
                    ipv4: None,
                }
                .encode(0),
            )
            .serialize();
        SmfEvent::Gtp { origin: sgw(), buf }
    }

    #[test]
    fn test_create_then_delete() {
        let mut dispatcher = Dispatcher::new(LoggingHandler::default());

        let actions = dispatcher.dispatch(gtp(GTP_CREATE_SESSION_REQUEST, Teid::UNASSIGNED, 1));
        let teid = match actions.as_slice() {
            [SmfAction::SessionCreated(teid)] => *teid,
            other => panic!("Unexpected actions: {other:?}"),
        };
        assert_eq!(dispatcher.handler().created, 1);
        assert!(dispatcher.transactions().is_empty());

        let actions = dispatcher.dispatch(gtp(GTP_DELETE_SESSION_REQUEST, teid, 2));
        assert_eq!(actions, vec![SmfAction::SessionReleased(teid)]);
        assert_eq!(dispatcher.handler().released, 1);
        assert!(dispatcher.registry().is_empty());
    }

    #[test]
    fn test_delete_unknown_context_keeps_counters() {
        let mut dispatcher = Dispatcher::new(LoggingHandler::default());
        dispatcher.dispatch(gtp(GTP_DELETE_SESSION_REQUEST, Teid(0x77), 3));

        assert_eq!(dispatcher.handler().released, 0);
        assert!(dispatcher.transactions().is_empty());
    }
}
