pub mod continuation;
pub mod dispatcher;
pub mod handler;
pub mod lifecycle;
pub mod registry;
pub mod types;
pub mod xact;

pub use continuation::{Continuation, ContinuationStore};
pub use dispatcher::Dispatcher;
pub use handler::{Completion, SessionHandler};
pub use lifecycle::{Lifecycle, LifecycleState};
pub use registry::{Session, SessionRegistry};
pub use types::{DropReason, SmfAction, SmfEvent};
pub use xact::{Transaction, TransactionCorrelator, XactKey, XactOrigin};

#[cfg(test)]
pub(crate) mod test_support {
    use smfc_core::gtp::{encode_apn, encode_bcd};
    use smfc_core::{Fteid, GtpHeader, GtpIe, GtpMessage};
    use smfc_shared::{NodeId, Teid, GTP_CREATE_SESSION_REQUEST, GTP_IE_APN, GTP_IE_IMSI};
    use std::net::Ipv4Addr;

    pub fn node(port: u16) -> NodeId {
        NodeId(([127, 0, 0, 1], port).into())
    }

    pub fn create_session_request(teid: Teid, sequence: u32) -> GtpMessage {
        GtpMessage::new(GtpHeader::new(GTP_CREATE_SESSION_REQUEST, teid, sequence))
            .with_ie(GtpIe::new(GTP_IE_IMSI, 0, encode_bcd("001010123456789")))
            .with_ie(GtpIe::new(GTP_IE_APN, 0, encode_apn("internet")))
            .with_ie(
                Fteid {
                    interface_type: 6,
                    teid: Teid(0x1111),
                    ipv4: Some(Ipv4Addr::new(10, 0, 0, 1)),
                }
                .encode(0),
            )
    }
}
