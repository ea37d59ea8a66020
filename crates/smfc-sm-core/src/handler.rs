use crate::registry::Session;
use crate::xact::Transaction;
use smfc_core::{GtpMessage, GxMessage};

/// What a handler did with the transaction it was given
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Completion {
    /// Reply sent; the transaction is finished
    Replied,
    /// Handler keeps the transaction open and completes it later
    Pending,
    /// A policy request was sent; park the request until the answer arrives
    AwaitPolicy,
    /// Reply sent and the session is gone
    Release,
}

/// Per-message-type procedure handlers. Handlers build and send replies;
/// the dispatcher only routes and keeps correlation state.
///
/// GTP-C handlers receive `None` when no session could be resolved, so
/// they can still reply with a context-not-found cause. Bearer responses
/// finish their transaction regardless of the returned completion; only
/// `Release` has an effect there.
pub trait SessionHandler {
    fn create_session_request(
        &mut self,
        sess: Option<&mut Session>,
        xact: &Transaction,
        request: &GtpMessage,
    ) -> Completion;

    fn delete_session_request(
        &mut self,
        sess: Option<&mut Session>,
        xact: &Transaction,
        request: &GtpMessage,
    ) -> Completion;

    fn create_bearer_response(
        &mut self,
        sess: Option<&mut Session>,
        xact: &Transaction,
        response: &GtpMessage,
    ) -> Completion;

    fn update_bearer_response(
        &mut self,
        sess: Option<&mut Session>,
        xact: &Transaction,
        response: &GtpMessage,
    ) -> Completion;

    fn delete_bearer_response(
        &mut self,
        sess: Option<&mut Session>,
        xact: &Transaction,
        response: &GtpMessage,
    ) -> Completion;

    /// Successful CCA-Initial; `request` is the parked Create-Session-Request
    fn cca_initial(
        &mut self,
        sess: &mut Session,
        xact: &Transaction,
        answer: &GxMessage,
        request: &GtpMessage,
    ) -> Completion;

    /// Successful CCA-Termination; `request` is the parked Delete-Session-Request
    fn cca_termination(
        &mut self,
        sess: &mut Session,
        xact: &Transaction,
        answer: &GxMessage,
        request: &GtpMessage,
    ) -> Completion;

    fn re_auth_request(&mut self, sess: &mut Session, request: &GxMessage);
}
