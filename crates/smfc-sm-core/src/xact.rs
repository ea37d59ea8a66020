use smfc_core::{Result, SmfcError};
use smfc_shared::{classify, Direction, MessageClass, NodeId, Protocol, Teid, XactId};
use std::collections::HashMap;
use tracing::{debug, trace};

const SEQUENCE_MASK: u32 = 0x00ff_ffff;

/// Correlation key: the same sequence from the same peer in the same
/// request/response class is the same transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct XactKey {
    pub peer: NodeId,
    pub sequence: u32,
    pub class: MessageClass,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum XactOrigin {
    /// Opened by a request from the peer
    Remote,
    /// Opened by a request this node sent
    Local,
}

/// One outstanding request/response exchange with a peer
#[derive(Debug, Clone, PartialEq)]
pub struct Transaction {
    pub id: XactId,
    pub key: XactKey,
    pub origin: XactOrigin,
    /// TEID to put in the reply header (GTP-C only)
    pub reply_teid: Teid,
}

impl Transaction {
    pub fn peer(&self) -> NodeId {
        self.key.peer
    }

    pub fn sequence(&self) -> u32 {
        self.key.sequence
    }

    pub fn protocol(&self) -> Protocol {
        self.key.class.protocol
    }

    /// Message type of the request that opened this transaction
    pub fn request_type(&self) -> u8 {
        self.key.class.request_type
    }
}

// 進行中のトランザクション (応答未送信 / 応答未受信)
pub struct TransactionCorrelator {
    active: HashMap<XactKey, Transaction>,
    by_id: HashMap<XactId, XactKey>,
    next_id: u64,
    next_sequence: HashMap<NodeId, u32>,
}

impl Default for TransactionCorrelator {
    fn default() -> Self {
        Self::new()
    }
}

impl TransactionCorrelator {
    pub fn new() -> Self {
        Self {
            active: HashMap::new(),
            by_id: HashMap::new(),
            next_id: 1,
            next_sequence: HashMap::new(),
        }
    }

    /// Correlate an inbound message by header fields. Requests open a
    /// transaction; responses resolve one this node opened.
    pub fn receive(
        &mut self,
        peer: NodeId,
        protocol: Protocol,
        message_type: u8,
        sequence: u32,
        reply_teid: Teid,
    ) -> Result<Transaction> {
        let (class, direction) = classify(protocol, message_type).ok_or_else(|| {
            SmfcError::InvalidPacket(format!("{protocol} message type {message_type} not correlated"))
        })?;

        match direction {
            Direction::Request => self.receive_request(peer, class, sequence, reply_teid),
            Direction::Response => self.receive_response(peer, class, sequence),
        }
    }

    /// Open a remote transaction. A retransmission of a request still in
    /// flight fails and leaves the first transaction untouched.
    pub fn receive_request(
        &mut self,
        peer: NodeId,
        class: MessageClass,
        sequence: u32,
        reply_teid: Teid,
    ) -> Result<Transaction> {
        let key = XactKey {
            peer,
            sequence: sequence & SEQUENCE_MASK,
            class,
        };
        if self.active.contains_key(&key) {
            debug!(%peer, sequence, "Retransmitted request");
            return Err(SmfcError::DuplicateTransaction { peer, sequence });
        }
        Ok(self.insert(key, XactOrigin::Remote, reply_teid))
    }

    /// Resolve the local transaction a response answers. The transaction
    /// stays active until [`TransactionCorrelator::complete`].
    pub fn receive_response(
        &mut self,
        peer: NodeId,
        class: MessageClass,
        sequence: u32,
    ) -> Result<Transaction> {
        let key = XactKey {
            peer,
            sequence: sequence & SEQUENCE_MASK,
            class,
        };
        match self.active.get(&key) {
            Some(xact) if xact.origin == XactOrigin::Local => Ok(xact.clone()),
            _ => Err(SmfcError::UnmatchedResponse { peer, sequence }),
        }
    }

    /// Open a local transaction for a request about to be sent, allocating
    /// the next free sequence number for the peer
    pub fn open_local(
        &mut self,
        peer: NodeId,
        protocol: Protocol,
        message_type: u8,
        reply_teid: Teid,
    ) -> Result<Transaction> {
        let class = match classify(protocol, message_type) {
            Some((class, Direction::Request)) => class,
            _ => {
                return Err(SmfcError::InternalError(format!(
                    "{protocol} message type {message_type} is not a request"
                )))
            }
        };

        for _ in 0..=SEQUENCE_MASK {
            let counter = self.next_sequence.entry(peer).or_insert(1);
            let sequence = *counter & SEQUENCE_MASK;
            *counter = (sequence + 1) & SEQUENCE_MASK;
            let key = XactKey {
                peer,
                sequence,
                class,
            };
            if !self.active.contains_key(&key) {
                return Ok(self.insert(key, XactOrigin::Local, reply_teid));
            }
        }
        Err(SmfcError::InternalError(format!("no free sequence for {peer}")))
    }

    /// Finish a transaction once its reply is sent or its response handled
    pub fn complete(&mut self, xact: &Transaction) -> Result<()> {
        match self.active.get(&xact.key) {
            Some(active) if active.id == xact.id => {
                self.active.remove(&xact.key);
                self.by_id.remove(&xact.id);
                trace!(xact = %xact.id, "Transaction completed");
                Ok(())
            }
            _ => Err(SmfcError::TransactionNotFound(xact.id)),
        }
    }

    /// Drop a transaction whose deadline expired
    pub fn expire(&mut self, id: XactId) -> Option<Transaction> {
        let key = self.by_id.remove(&id)?;
        self.active.remove(&key)
    }

    pub fn get(&self, id: XactId) -> Option<&Transaction> {
        self.by_id.get(&id).and_then(|key| self.active.get(key))
    }

    pub fn len(&self) -> usize {
        self.active.len()
    }

    pub fn is_empty(&self) -> bool {
        self.active.is_empty()
    }

    fn insert(&mut self, key: XactKey, origin: XactOrigin, reply_teid: Teid) -> Transaction {
        let id = XactId(self.next_id);
        self.next_id += 1;

        let xact = Transaction {
            id,
            key,
            origin,
            reply_teid,
        };
        self.active.insert(key, xact.clone());
        self.by_id.insert(id, key);
        xact
    }
}
