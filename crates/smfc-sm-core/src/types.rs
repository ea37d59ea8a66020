use bytes::Bytes;
use smfc_shared::{NodeId, Protocol, Teid, XactId};

// Input event: one decoded-origin datagram or signal from a transport layer
#[derive(Debug)]
pub enum SmfEvent {
    /// GTP-C datagram from the S5-C/S11 path
    Gtp { origin: NodeId, buf: Bytes },
    /// Gx message from the Diameter client, tagged with the session it belongs to
    Gx { teid: Teid, buf: Bytes },
    /// PFCP datagram from the N4 path
    Pfcp { origin: NodeId, buf: Bytes },
    /// Synthetic failure: a transaction deadline expired
    TransactionTimeout { teid: Teid, xact: XactId },
    /// Anything the transport layers could not classify
    Unknown(String),
}

impl SmfEvent {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Gtp { .. } => "SMF_EVT_S5C_MESSAGE",
            Self::Gx { .. } => "SMF_EVT_GX_MESSAGE",
            Self::Pfcp { .. } => "SMF_EVT_N4_MESSAGE",
            Self::TransactionTimeout { .. } => "SMF_EVT_XACT_TIMEOUT",
            Self::Unknown(_) => "SMF_EVT_UNKNOWN",
        }
    }
}

// Why an event ended without reaching a handler
#[derive(Debug, Clone, PartialEq)]
pub enum DropReason {
    Decode(String),
    Duplicate,
    UnknownMessage { protocol: Protocol, message_type: u8 },
    UnmatchedResponse,
    SessionNotFound(Teid),
    NoContinuation(Teid),
    ContinuationPending(Teid),
    PolicyFailure { teid: Teid, result_code: u32 },
    UnsupportedPolicyRequest(u32),
    InvalidGxCommand(u32),
    NotImplemented { protocol: Protocol, message_type: u8 },
    NotOperational,
    UnknownEvent(String),
}

impl DropReason {
    /// Metric label
    pub fn label(&self) -> &'static str {
        match self {
            Self::Decode(_) => "decode",
            Self::Duplicate => "duplicate",
            Self::UnknownMessage { .. } => "unknown_message",
            Self::UnmatchedResponse => "unmatched_response",
            Self::SessionNotFound(_) => "session_not_found",
            Self::NoContinuation(_) => "no_continuation",
            Self::ContinuationPending(_) => "continuation_pending",
            Self::PolicyFailure { .. } => "policy_failure",
            Self::UnsupportedPolicyRequest(_) => "unsupported_policy_request",
            Self::InvalidGxCommand(_) => "invalid_gx_command",
            Self::NotImplemented { .. } => "not_implemented",
            Self::NotOperational => "not_operational",
            Self::UnknownEvent(_) => "unknown_event",
        }
    }
}

// Output action: what the runtime must do or account for after an event
#[derive(Debug, Clone, PartialEq)]
pub enum SmfAction {
    SessionCreated(Teid),
    SessionReleased(Teid),
    /// Start the policy-answer deadline for a suspended transaction
    ArmPolicyTimer { teid: Teid, xact: XactId },
    /// The suspended transaction was resumed or dropped; stop its deadline
    CancelPolicyTimer(Teid),
    /// Start the deadline for a transaction a handler left open
    ArmTransactionTimer { teid: Teid, xact: XactId },
    ContinuationReleased(Teid),
    Discard(DropReason),
}
