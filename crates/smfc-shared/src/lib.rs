use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::SocketAddr;

// GTPv2-C message types (TS 29.274 table 6.1-1)
pub const GTP_ECHO_REQUEST: u8 = 1;
pub const GTP_ECHO_RESPONSE: u8 = 2;
pub const GTP_CREATE_SESSION_REQUEST: u8 = 32;
pub const GTP_CREATE_SESSION_RESPONSE: u8 = 33;
pub const GTP_DELETE_SESSION_REQUEST: u8 = 36;
pub const GTP_DELETE_SESSION_RESPONSE: u8 = 37;
pub const GTP_CREATE_BEARER_REQUEST: u8 = 95;
pub const GTP_CREATE_BEARER_RESPONSE: u8 = 96;
pub const GTP_UPDATE_BEARER_REQUEST: u8 = 97;
pub const GTP_UPDATE_BEARER_RESPONSE: u8 = 98;
pub const GTP_DELETE_BEARER_REQUEST: u8 = 99;
pub const GTP_DELETE_BEARER_RESPONSE: u8 = 100;

// GTPv2-C IE types
pub const GTP_IE_IMSI: u8 = 1;
pub const GTP_IE_CAUSE: u8 = 2;
pub const GTP_IE_APN: u8 = 71;
pub const GTP_IE_EBI: u8 = 73;
pub const GTP_IE_F_TEID: u8 = 87;

// GTPv2-C cause values
pub const GTP_CAUSE_REQUEST_ACCEPTED: u8 = 16;
pub const GTP_CAUSE_CONTEXT_NOT_FOUND: u8 = 64;
pub const GTP_CAUSE_MANDATORY_IE_INCORRECT: u8 = 69;
pub const GTP_CAUSE_MANDATORY_IE_MISSING: u8 = 70;
pub const GTP_CAUSE_SYSTEM_FAILURE: u8 = 72;

// PFCP message types (TS 29.244 table 7.3-1)
pub const PFCP_HEARTBEAT_REQUEST: u8 = 1;
pub const PFCP_HEARTBEAT_RESPONSE: u8 = 2;
pub const PFCP_ASSOCIATION_SETUP_REQUEST: u8 = 5;
pub const PFCP_ASSOCIATION_SETUP_RESPONSE: u8 = 6;
pub const PFCP_SESSION_ESTABLISHMENT_REQUEST: u8 = 50;
pub const PFCP_SESSION_ESTABLISHMENT_RESPONSE: u8 = 51;
pub const PFCP_SESSION_MODIFICATION_REQUEST: u8 = 52;
pub const PFCP_SESSION_MODIFICATION_RESPONSE: u8 = 53;
pub const PFCP_SESSION_DELETION_REQUEST: u8 = 54;
pub const PFCP_SESSION_DELETION_RESPONSE: u8 = 55;
pub const PFCP_SESSION_REPORT_REQUEST: u8 = 56;
pub const PFCP_SESSION_REPORT_RESPONSE: u8 = 57;

// Diameter Gx (TS 29.212)
pub const GX_APPLICATION_ID: u32 = 16777238;
pub const CMD_RE_AUTH: u32 = 258;
pub const CMD_CREDIT_CONTROL: u32 = 272;

// AVP Codes
pub const AVP_SESSION_ID: u32 = 263;
pub const AVP_RESULT_CODE: u32 = 268;
pub const AVP_CC_REQUEST_NUMBER: u32 = 415;
pub const AVP_CC_REQUEST_TYPE: u32 = 416;

// Result-Code values (AVP 268)
pub const RESULT_CODE_SUCCESS: u32 = 2001; // DIAMETER_SUCCESS
pub const RESULT_CODE_UNABLE_TO_COMPLY: u32 = 5012; // DIAMETER_UNABLE_TO_COMPLY

// CC-Request-Type values (AVP 416)
pub const CC_REQUEST_TYPE_INITIAL: u32 = 1;
pub const CC_REQUEST_TYPE_UPDATE: u32 = 2;
pub const CC_REQUEST_TYPE_TERMINATION: u32 = 3;
pub const CC_REQUEST_TYPE_EVENT: u32 = 4;

/// GTP-C tunnel endpoint identifier. Zero means "not yet assigned".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub struct Teid(pub u32);

impl Teid {
    pub const UNASSIGNED: Teid = Teid(0);

    pub fn is_assigned(self) -> bool {
        self.0 != 0
    }
}

impl fmt::Display for Teid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:08x}", self.0)
    }
}

/// PFCP session endpoint identifier. Zero means "not yet assigned".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub struct Seid(pub u64);

impl Seid {
    pub const UNASSIGNED: Seid = Seid(0);

    pub fn is_assigned(self) -> bool {
        self.0 != 0
    }
}

impl From<Teid> for Seid {
    fn from(teid: Teid) -> Self {
        Seid(u64::from(teid.0))
    }
}

impl fmt::Display for Seid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:016x}", self.0)
    }
}

/// Handle of a remote transport peer. The transport layer owns the peer;
/// sessions only keep this handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NodeId(pub SocketAddr);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Transaction identifier, unique for the lifetime of a correlator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct XactId(pub u64);

impl fmt::Display for XactId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "xact-{}", self.0)
    }
}

/// Protocol leg an event or transaction belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Protocol {
    Gtp,
    Pfcp,
    Gx,
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Gtp => write!(f, "gtp"),
            Self::Pfcp => write!(f, "pfcp"),
            Self::Gx => write!(f, "gx"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    Request,
    Response,
}

/// Request/response pair a message belongs to, identified by the request's
/// message type. A response shares the class of the request it answers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MessageClass {
    pub protocol: Protocol,
    pub request_type: u8,
}

/// Classify a GTP-C or PFCP message type. Returns `None` for types the
/// session core does not route.
pub fn classify(protocol: Protocol, message_type: u8) -> Option<(MessageClass, Direction)> {
    let known = match protocol {
        Protocol::Gtp => matches!(
            message_type,
            GTP_CREATE_SESSION_REQUEST
                | GTP_CREATE_SESSION_RESPONSE
                | GTP_DELETE_SESSION_REQUEST
                | GTP_DELETE_SESSION_RESPONSE
                | GTP_CREATE_BEARER_REQUEST..=GTP_DELETE_BEARER_RESPONSE
        ),
        Protocol::Pfcp => matches!(
            message_type,
            PFCP_HEARTBEAT_REQUEST
                | PFCP_HEARTBEAT_RESPONSE
                | PFCP_ASSOCIATION_SETUP_REQUEST
                | PFCP_ASSOCIATION_SETUP_RESPONSE
                | PFCP_SESSION_ESTABLISHMENT_REQUEST..=PFCP_SESSION_REPORT_RESPONSE
        ),
        Protocol::Gx => false,
    };
    if !known {
        return None;
    }

    // A response is always numbered request type + 1; which parity marks the
    // request depends on the range.
    let is_request = match protocol {
        Protocol::Gtp if message_type >= GTP_CREATE_BEARER_REQUEST => message_type % 2 == 1,
        Protocol::Pfcp if message_type < PFCP_SESSION_ESTABLISHMENT_REQUEST => message_type % 2 == 1,
        _ => message_type % 2 == 0,
    };

    let (request_type, direction) = if is_request {
        (message_type, Direction::Request)
    } else {
        (message_type - 1, Direction::Response)
    };

    Some((
        MessageClass {
            protocol,
            request_type,
        },
        direction,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_teid_unassigned() {
        assert!(!Teid::UNASSIGNED.is_assigned());
        assert!(Teid(77).is_assigned());
        assert_eq!(Teid(0x4d).to_string(), "0x0000004d");
    }

    #[test]
    fn test_seid_from_teid() {
        assert_eq!(Seid::from(Teid(9)), Seid(9));
    }

    #[test]
    fn test_classify_gtp() {
        let (class, dir) = classify(Protocol::Gtp, GTP_CREATE_SESSION_REQUEST).unwrap();
        assert_eq!(class.request_type, GTP_CREATE_SESSION_REQUEST);
        assert_eq!(dir, Direction::Request);

        let (class, dir) = classify(Protocol::Gtp, GTP_DELETE_SESSION_RESPONSE).unwrap();
        assert_eq!(class.request_type, GTP_DELETE_SESSION_REQUEST);
        assert_eq!(dir, Direction::Response);

        let (class, dir) = classify(Protocol::Gtp, GTP_CREATE_BEARER_RESPONSE).unwrap();
        assert_eq!(class.request_type, GTP_CREATE_BEARER_REQUEST);
        assert_eq!(dir, Direction::Response);

        let (class, dir) = classify(Protocol::Gtp, GTP_UPDATE_BEARER_REQUEST).unwrap();
        assert_eq!(class.request_type, GTP_UPDATE_BEARER_REQUEST);
        assert_eq!(dir, Direction::Request);
    }

    #[test]
    fn test_classify_pfcp() {
        let (class, dir) = classify(Protocol::Pfcp, PFCP_HEARTBEAT_RESPONSE).unwrap();
        assert_eq!(class.request_type, PFCP_HEARTBEAT_REQUEST);
        assert_eq!(dir, Direction::Response);

        let (class, dir) = classify(Protocol::Pfcp, PFCP_SESSION_REPORT_REQUEST).unwrap();
        assert_eq!(class.request_type, PFCP_SESSION_REPORT_REQUEST);
        assert_eq!(dir, Direction::Request);

        let (class, _) = classify(Protocol::Pfcp, PFCP_SESSION_DELETION_RESPONSE).unwrap();
        assert_eq!(class.request_type, PFCP_SESSION_DELETION_REQUEST);
    }

    #[test]
    fn test_classify_unknown() {
        assert!(classify(Protocol::Gtp, GTP_ECHO_REQUEST).is_none());
        assert!(classify(Protocol::Gtp, 200).is_none());
        assert!(classify(Protocol::Pfcp, 99).is_none());
        assert!(classify(Protocol::Gx, 1).is_none());
    }
}
