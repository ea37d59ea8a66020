// Error types module
pub mod error;

// Wire records for the three protocol legs
pub mod diameter;
pub mod gtp;
pub mod pfcp;

// Transport path abstraction
pub mod transport;

// Re-export commonly used types
pub use diameter::{Avp, GxMessage};
pub use error::{ErrorSeverity, Result, SmfcError};
pub use gtp::{CreateSessionRequest, Fteid, GtpHeader, GtpIe, GtpMessage, GtpMessageKind};
pub use pfcp::{PfcpHeader, PfcpMessage};
pub use transport::PathLayer;
