use crate::continuation::ContinuationStore;
use crate::handler::{Completion, SessionHandler};
use crate::registry::{Session, SessionRegistry};
use crate::types::{DropReason, SmfAction, SmfEvent};
use crate::xact::{Transaction, TransactionCorrelator};
use bytes::Bytes;
use smfc_core::{Fteid, GtpMessage, GtpMessageKind, GxMessage, PfcpMessage, Result, SmfcError};
use smfc_shared::{
    classify, Direction, NodeId, Protocol, Teid, XactId, AVP_RESULT_CODE, CC_REQUEST_TYPE_INITIAL,
    CC_REQUEST_TYPE_TERMINATION, GTP_CREATE_SESSION_REQUEST, GTP_DELETE_SESSION_REQUEST,
    GTP_IE_F_TEID, RESULT_CODE_SUCCESS,
};
use tracing::{debug, error, info, warn};

// ★ Sans-IO Core Logic
// イベントを1件ずつ最後まで処理し、Runtimeが実行すべきアクションを返す
pub struct Dispatcher<H> {
    registry: SessionRegistry,
    xacts: TransactionCorrelator,
    continuations: ContinuationStore,
    handler: H,
}

impl<H: SessionHandler> Dispatcher<H> {
    pub fn new(handler: H) -> Self {
        Self {
            registry: SessionRegistry::new(),
            xacts: TransactionCorrelator::new(),
            continuations: ContinuationStore::new(),
            handler,
        }
    }

    pub fn handler(&self) -> &H {
        &self.handler
    }

    pub fn handler_mut(&mut self) -> &mut H {
        &mut self.handler
    }

    pub fn registry(&self) -> &SessionRegistry {
        &self.registry
    }

    pub fn transactions(&self) -> &TransactionCorrelator {
        &self.xacts
    }

    pub fn continuations(&self) -> &ContinuationStore {
        &self.continuations
    }

    /// Process one event to completion
    pub fn dispatch(&mut self, event: SmfEvent) -> Vec<SmfAction> {
        let mut actions = Vec::new();
        match event {
            SmfEvent::Gtp { origin, buf } => self.on_gtp(origin, buf, &mut actions),
            SmfEvent::Gx { teid, buf } => self.on_gx(teid, buf, &mut actions),
            SmfEvent::Pfcp { origin, buf } => self.on_pfcp(origin, buf, &mut actions),
            SmfEvent::TransactionTimeout { teid, xact } => self.on_timeout(teid, xact, &mut actions),
            SmfEvent::Unknown(name) => {
                warn!(event = %name, "Unknown event");
                actions.push(SmfAction::Discard(DropReason::UnknownEvent(name)));
            }
        }
        actions
    }

    /// Open a local transaction for a request a handler is about to send
    pub fn open_request(
        &mut self,
        peer: NodeId,
        protocol: Protocol,
        message_type: u8,
        reply_teid: Teid,
    ) -> Result<Transaction> {
        self.xacts.open_local(peer, protocol, message_type, reply_teid)
    }

    /// Finish a transaction a handler left open with [`Completion::Pending`]
    pub fn complete(&mut self, xact: &Transaction) -> Result<()> {
        self.xacts.complete(xact)
    }

    /// Attach the user-plane peer serving a session
    pub fn bind_pfcp_peer(&mut self, teid: Teid, node: NodeId) -> Result<()> {
        let sess = self
            .registry
            .lookup_mut(teid)
            .ok_or(SmfcError::SessionNotFound(teid))?;
        sess.bind_pfcp_peer(node);
        Ok(())
    }

    fn on_gtp(&mut self, origin: NodeId, buf: Bytes, actions: &mut Vec<SmfAction>) {
        let msg = match GtpMessage::parse(&buf) {
            Ok(msg) => msg,
            Err(e) => {
                warn!(%origin, error = %e, "Failed to decode GTP-C message");
                actions.push(SmfAction::Discard(DropReason::Decode(e.to_string())));
                return;
            }
        };

        let message_type = msg.header.message_type;
        let kind = msg.kind();
        let routed = classify(Protocol::Gtp, message_type)
            .filter(|_| !matches!(kind, GtpMessageKind::Other(_)));
        let Some((class, direction)) = routed else {
            warn!(%origin, message_type, "Not implemented GTP-C message type");
            actions.push(SmfAction::Discard(DropReason::UnknownMessage {
                protocol: Protocol::Gtp,
                message_type,
            }));
            return;
        };

        // TEID 0 never resolves; a miss on a non-zero TEID falls back to the
        // sender address so a context-not-found reply still reaches it
        let mut teid = Some(msg.header.teid).filter(|t| self.registry.lookup(*t).is_some());
        let session = teid.and_then(|t| self.registry.lookup(t));
        let peer = session.and_then(Session::peer).unwrap_or(origin);
        let reply_teid = match session {
            Some(sess) => sess.remote_teid,
            None if kind == GtpMessageKind::CreateSessionRequest => sender_teid(&msg),
            None => Teid::UNASSIGNED,
        };

        let correlated = match direction {
            Direction::Request => {
                self.xacts
                    .receive_request(peer, class, msg.header.sequence, reply_teid)
            }
            Direction::Response => self.xacts.receive_response(peer, class, msg.header.sequence),
        };
        let xact = match correlated {
            Ok(xact) => xact,
            Err(e) => {
                actions.push(SmfAction::Discard(uncorrelated(e)));
                return;
            }
        };

        let completion = match kind {
            GtpMessageKind::CreateSessionRequest => {
                if msg.header.teid.is_assigned() {
                    warn!(teid = %msg.header.teid, "Create-Session-Request with non-zero TEID");
                } else {
                    teid = self.create_session(&msg, peer, actions);
                }
                let sess = teid.and_then(|t| self.registry.lookup_mut(t));
                self.handler.create_session_request(sess, &xact, &msg)
            }
            GtpMessageKind::DeleteSessionRequest => {
                let sess = teid.and_then(|t| self.registry.lookup_mut(t));
                self.handler.delete_session_request(sess, &xact, &msg)
            }
            GtpMessageKind::CreateBearerResponse => {
                let sess = teid.and_then(|t| self.registry.lookup_mut(t));
                self.handler.create_bearer_response(sess, &xact, &msg)
            }
            GtpMessageKind::UpdateBearerResponse => {
                let sess = teid.and_then(|t| self.registry.lookup_mut(t));
                self.handler.update_bearer_response(sess, &xact, &msg)
            }
            GtpMessageKind::DeleteBearerResponse => {
                let sess = teid.and_then(|t| self.registry.lookup_mut(t));
                self.handler.delete_bearer_response(sess, &xact, &msg)
            }
            GtpMessageKind::Other(_) => return,
        };

        match direction {
            Direction::Request => self.finish(teid, xact, completion, buf, actions),
            Direction::Response => self.finish_response(teid, xact, completion, actions),
        }
    }

    fn on_gx(&mut self, teid: Teid, buf: Bytes, actions: &mut Vec<SmfAction>) {
        // The Gx buffer is owned by this frame and dropped on every branch
        let msg = match GxMessage::parse(&buf) {
            Ok(msg) => msg,
            Err(e) => {
                warn!(%teid, error = %e, "Failed to decode Gx message");
                actions.push(SmfAction::Discard(DropReason::Decode(e.to_string())));
                return;
            }
        };

        if self.registry.lookup(teid).is_none() {
            warn!(%teid, "Gx message for unknown session");
            actions.push(SmfAction::Discard(DropReason::SessionNotFound(teid)));
            return;
        }

        if msg.is_cca() {
            self.on_credit_control_answer(teid, &msg, actions);
        } else if msg.is_rar() {
            if let Some(sess) = self.registry.lookup_mut(teid) {
                self.handler.re_auth_request(sess, &msg);
            }
        } else {
            error!(%teid, command_code = msg.command_code, "Invalid Gx command");
            actions.push(SmfAction::Discard(DropReason::InvalidGxCommand(msg.command_code)));
        }
    }

    fn on_credit_control_answer(&mut self, teid: Teid, answer: &GxMessage, actions: &mut Vec<SmfAction>) {
        let result_code = match answer.result_code() {
            Some(code) => code,
            None => {
                let e = SmfcError::MissingAvp(AVP_RESULT_CODE);
                warn!(%teid, error = %e, "Credit-Control-Answer without result");
                actions.push(SmfAction::Discard(DropReason::Decode(e.to_string())));
                return;
            }
        };

        // Only a successful answer may resume the parked request
        if result_code != RESULT_CODE_SUCCESS {
            error!(%teid, result_code, "Policy request rejected");
            actions.push(SmfAction::Discard(DropReason::PolicyFailure { teid, result_code }));
            return;
        }

        let cc_request_type = answer.cc_request_type().unwrap_or_default();
        if cc_request_type != CC_REQUEST_TYPE_INITIAL && cc_request_type != CC_REQUEST_TYPE_TERMINATION {
            error!(%teid, cc_request_type, "Unsupported CC-Request-Type");
            actions.push(SmfAction::Discard(DropReason::UnsupportedPolicyRequest(cc_request_type)));
            return;
        }

        // Initial resumes a Create-Session-Request, Termination a Delete-Session-Request
        let expected = if cc_request_type == CC_REQUEST_TYPE_INITIAL {
            GTP_CREATE_SESSION_REQUEST
        } else {
            GTP_DELETE_SESSION_REQUEST
        };
        let parked_type = self
            .continuations
            .get(teid)
            .map(|parked| parked.xact.request_type());
        if parked_type.is_some_and(|t| t != expected) {
            error!(%teid, cc_request_type, ?parked_type, "Answer does not match the parked request");
            actions.push(SmfAction::Discard(DropReason::UnsupportedPolicyRequest(cc_request_type)));
            return;
        }

        let (xact, request_buf) = match self.continuations.resume(teid) {
            Ok(parked) => parked,
            Err(e) => {
                warn!(%teid, error = %e, "Credit-Control-Answer without parked request");
                actions.push(SmfAction::Discard(DropReason::NoContinuation(teid)));
                return;
            }
        };
        actions.push(SmfAction::CancelPolicyTimer(teid));

        let request = match GtpMessage::parse(&request_buf) {
            Ok(request) => request,
            Err(e) => {
                error!(%teid, error = %e, "Parked request no longer decodes");
                self.complete_xact(&xact);
                actions.push(SmfAction::Discard(DropReason::Decode(e.to_string())));
                return;
            }
        };

        let Some(sess) = self.registry.lookup_mut(teid) else {
            self.complete_xact(&xact);
            actions.push(SmfAction::Discard(DropReason::SessionNotFound(teid)));
            return;
        };
        let completion = if cc_request_type == CC_REQUEST_TYPE_INITIAL {
            self.handler.cca_initial(sess, &xact, answer, &request)
        } else {
            self.handler.cca_termination(sess, &xact, answer, &request)
        };

        self.finish(Some(teid), xact, completion, request_buf, actions);
    }

    fn on_pfcp(&mut self, origin: NodeId, buf: Bytes, actions: &mut Vec<SmfAction>) {
        let msg = match PfcpMessage::parse(&buf) {
            Ok(msg) => msg,
            Err(e) => {
                warn!(%origin, error = %e, "Failed to decode PFCP message");
                actions.push(SmfAction::Discard(DropReason::Decode(e.to_string())));
                return;
            }
        };

        let message_type = msg.header.message_type;
        let Some((class, direction)) = classify(Protocol::Pfcp, message_type) else {
            warn!(%origin, message_type, "Not implemented PFCP message type");
            actions.push(SmfAction::Discard(DropReason::UnknownMessage {
                protocol: Protocol::Pfcp,
                message_type,
            }));
            return;
        };

        let peer = if msg.header.seid.is_assigned() {
            self.registry
                .lookup_by_seid(msg.header.seid)
                .and_then(Session::pfcp_peer)
                .unwrap_or(origin)
        } else {
            origin
        };

        let correlated = match direction {
            Direction::Request => {
                self.xacts
                    .receive_request(peer, class, msg.header.sequence, Teid::UNASSIGNED)
            }
            Direction::Response => self.xacts.receive_response(peer, class, msg.header.sequence),
        };
        let xact = match correlated {
            Ok(xact) => xact,
            Err(e) => {
                actions.push(SmfAction::Discard(uncorrelated(e)));
                return;
            }
        };

        // TODO: route PFCP session reports once the N4 procedures exist
        debug!(%peer, message_type, seid = %msg.header.seid, "PFCP dispatch not implemented");
        self.complete_xact(&xact);
        actions.push(SmfAction::Discard(DropReason::NotImplemented {
            protocol: Protocol::Pfcp,
            message_type,
        }));
    }

    fn on_timeout(&mut self, teid: Teid, xact_id: XactId, actions: &mut Vec<SmfAction>) {
        if self.continuations.pending_xact(teid) == Some(xact_id) {
            warn!(%teid, xact = %xact_id, "Policy answer deadline expired");
            self.continuations.release(teid);
            actions.push(SmfAction::ContinuationReleased(teid));

            // A session whose setup or teardown never got its policy answer
            // is not kept half-open
            let parked_type = self.xacts.get(xact_id).map(Transaction::request_type);
            self.xacts.expire(xact_id);
            if matches!(
                parked_type,
                Some(GTP_CREATE_SESSION_REQUEST | GTP_DELETE_SESSION_REQUEST)
            ) {
                self.release_session(teid, actions);
            }
            return;
        }

        if let Some(xact) = self.xacts.expire(xact_id) {
            warn!(xact = %xact.id, peer = %xact.peer(), seq = xact.sequence(), "Transaction deadline expired");
        }
    }

    fn create_session(&mut self, msg: &GtpMessage, peer: NodeId, actions: &mut Vec<SmfAction>) -> Option<Teid> {
        let teid = match self.registry.create(msg) {
            Ok(teid) => teid,
            Err(e) => {
                warn!(%peer, error = %e, "Cannot create session");
                return None;
            }
        };
        if let Err(e) = self.registry.bind_peer(teid, peer) {
            error!(%teid, error = %e, "Cannot bind session peer");
        }
        actions.push(SmfAction::SessionCreated(teid));
        Some(teid)
    }

    fn finish(
        &mut self,
        teid: Option<Teid>,
        xact: Transaction,
        completion: Completion,
        buf: Bytes,
        actions: &mut Vec<SmfAction>,
    ) {
        match completion {
            Completion::Replied => self.complete_xact(&xact),
            Completion::Pending => {
                debug!(xact = %xact.id, "Transaction left open by handler");
                actions.push(SmfAction::ArmTransactionTimer {
                    teid: teid.unwrap_or_default(),
                    xact: xact.id,
                });
            }
            Completion::AwaitPolicy => {
                let Some(teid) = teid else {
                    error!(xact = %xact.id, "Policy round-trip requested without a session");
                    self.complete_xact(&xact);
                    actions.push(SmfAction::Discard(DropReason::SessionNotFound(Teid::UNASSIGNED)));
                    return;
                };
                match self.continuations.suspend(teid, xact.clone(), buf) {
                    Ok(()) => {
                        debug!(%teid, xact = %xact.id, "Request parked for policy answer");
                        actions.push(SmfAction::ArmPolicyTimer { teid, xact: xact.id });
                    }
                    Err(e) => {
                        error!(%teid, error = %e, "Cannot park request");
                        self.complete_xact(&xact);
                        actions.push(SmfAction::Discard(DropReason::ContinuationPending(teid)));
                    }
                }
            }
            Completion::Release => {
                self.complete_xact(&xact);
                if let Some(teid) = teid {
                    self.release_session(teid, actions);
                }
            }
        }
    }

    /// A response closes its local transaction at dispatch. Only `Release`
    /// is honored beyond that.
    fn finish_response(
        &mut self,
        teid: Option<Teid>,
        xact: Transaction,
        completion: Completion,
        actions: &mut Vec<SmfAction>,
    ) {
        self.complete_xact(&xact);
        match completion {
            Completion::Replied => {}
            Completion::Release => {
                if let Some(teid) = teid {
                    self.release_session(teid, actions);
                }
            }
            Completion::Pending | Completion::AwaitPolicy => {
                warn!(xact = %xact.id, ?completion, "Response transactions cannot stay open");
            }
        }
    }

    fn release_session(&mut self, teid: Teid, actions: &mut Vec<SmfAction>) {
        if let Some(parked) = self.continuations.release(teid) {
            self.complete_xact(&parked.xact);
            actions.push(SmfAction::CancelPolicyTimer(teid));
            actions.push(SmfAction::ContinuationReleased(teid));
        }
        if self.registry.destroy(teid, &mut self.continuations).is_some() {
            info!(%teid, sessions = self.registry.len(), "Session released");
            actions.push(SmfAction::SessionReleased(teid));
        }
    }

    fn complete_xact(&mut self, xact: &Transaction) {
        if let Err(e) = self.xacts.complete(xact) {
            debug!(error = %e, "Transaction already finished");
        }
    }
}

fn sender_teid(msg: &GtpMessage) -> Teid {
    msg.find_ie(GTP_IE_F_TEID, 0)
        .and_then(|ie| Fteid::decode(ie).ok())
        .map(|fteid| fteid.teid)
        .unwrap_or_default()
}

fn uncorrelated(e: SmfcError) -> DropReason {
    match e {
        SmfcError::DuplicateTransaction { peer, sequence } => {
            debug!(%peer, sequence, "Dropping retransmitted request");
            DropReason::Duplicate
        }
        SmfcError::UnmatchedResponse { peer, sequence } => {
            warn!(%peer, sequence, "Dropping unmatched response");
            DropReason::UnmatchedResponse
        }
        other => {
            warn!(error = %other, "Dropping uncorrelated message");
            DropReason::Decode(other.to_string())
        }
    }
}
