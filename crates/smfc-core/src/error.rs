use smfc_shared::{
    NodeId, Teid, XactId, GTP_CAUSE_CONTEXT_NOT_FOUND, GTP_CAUSE_MANDATORY_IE_INCORRECT,
    GTP_CAUSE_MANDATORY_IE_MISSING, GTP_CAUSE_SYSTEM_FAILURE,
};
use thiserror::Error;

/// Main error type for the SMF session core
#[derive(Error, Debug)]
pub enum SmfcError {
    // ========================================
    // Protocol Errors
    // ========================================
    #[error("Invalid packet: {0}")]
    InvalidPacket(String),

    #[error("Missing mandatory IE: {0}")]
    MissingIe(u8),

    #[error("Invalid IE value for type {ie_type}: {reason}")]
    InvalidIe { ie_type: u8, reason: String },

    #[error("Missing required AVP: {0}")]
    MissingAvp(u32),

    // ========================================
    // Correlation Errors
    // ========================================
    #[error("Retransmitted request from {peer} (seq {sequence})")]
    DuplicateTransaction { peer: NodeId, sequence: u32 },

    #[error("No outstanding request for response from {peer} (seq {sequence})")]
    UnmatchedResponse { peer: NodeId, sequence: u32 },

    #[error("Transaction not found: {0}")]
    TransactionNotFound(XactId),

    // ========================================
    // Session Errors
    // ========================================
    #[error("Session not found: {0}")]
    SessionNotFound(Teid),

    #[error("Policy round-trip already pending for session {0}")]
    ContinuationPending(Teid),

    #[error("No continuation for session {0}")]
    NoContinuation(Teid),

    // ========================================
    // System Errors
    // ========================================
    #[error("Session core is not operational")]
    NotOperational,

    #[error("Invalid state transition: {0}")]
    InvalidStateTransition(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Internal error: {0}")]
    InternalError(String),

    // ========================================
    // Network Errors
    // ========================================
    #[error("Path error: {0}")]
    PathError(#[from] std::io::Error),
}

impl SmfcError {
    /// GTPv2-C cause a handler puts in the negative reply for this error
    pub fn to_gtp_cause(&self) -> u8 {
        match self {
            Self::SessionNotFound(_) => GTP_CAUSE_CONTEXT_NOT_FOUND,
            Self::MissingIe(_) => GTP_CAUSE_MANDATORY_IE_MISSING,
            Self::InvalidIe { .. } | Self::InvalidPacket(_) => GTP_CAUSE_MANDATORY_IE_INCORRECT,
            _ => GTP_CAUSE_SYSTEM_FAILURE,
        }
    }

    /// Get error severity level
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            Self::DuplicateTransaction { .. } => ErrorSeverity::Info,
            Self::InvalidPacket(_)
            | Self::MissingIe(_)
            | Self::InvalidIe { .. }
            | Self::MissingAvp(_)
            | Self::UnmatchedResponse { .. }
            | Self::SessionNotFound(_)
            | Self::NoContinuation(_) => ErrorSeverity::Warning,
            Self::ContinuationPending(_)
            | Self::TransactionNotFound(_)
            | Self::InvalidStateTransition(_) => ErrorSeverity::Error,
            Self::PathError(_) | Self::InternalError(_) => ErrorSeverity::Critical,
            _ => ErrorSeverity::Warning,
        }
    }

    /// Errors that cannot be contained at the event boundary. Only a path
    /// that cannot be established takes the process down.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::PathError(_))
    }
}

/// Error severity levels
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorSeverity {
    Info,
    Warning,
    Error,
    Critical,
}

impl std::fmt::Display for ErrorSeverity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Info => write!(f, "info"),
            Self::Warning => write!(f, "warning"),
            Self::Error => write!(f, "error"),
            Self::Critical => write!(f, "critical"),
        }
    }
}

/// Result type alias for session core operations
pub type Result<T> = std::result::Result<T, SmfcError>;
