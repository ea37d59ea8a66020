use crate::continuation::ContinuationStore;
use smfc_core::{CreateSessionRequest, GtpMessage, Result, SmfcError};
use smfc_shared::{NodeId, Seid, Teid};
use std::collections::HashMap;
use std::time::Instant;
use tracing::{debug, info};

/// Per-subscriber session context, keyed by the locally assigned TEID
#[derive(Debug, Clone)]
pub struct Session {
    teid: Teid,
    seid: Seid,
    peer: Option<NodeId>,
    pfcp_peer: Option<NodeId>,
    pub imsi: String,
    pub apn: Option<String>,
    /// Peer's control-plane TEID, used in every reply header
    pub remote_teid: Teid,
    pub created_at: Instant,
}

impl Session {
    pub fn teid(&self) -> Teid {
        self.teid
    }

    pub fn seid(&self) -> Seid {
        self.seid
    }

    /// GTP-C peer that created the session
    pub fn peer(&self) -> Option<NodeId> {
        self.peer
    }

    pub fn pfcp_peer(&self) -> Option<NodeId> {
        self.pfcp_peer
    }

    /// Record the user-plane function serving this session
    pub fn bind_pfcp_peer(&mut self, node: NodeId) {
        self.pfcp_peer = Some(node);
    }
}

pub struct SessionRegistry {
    sessions: HashMap<Teid, Session>,
    next_teid: u32,
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self {
            sessions: HashMap::new(),
            next_teid: 1,
        }
    }

    /// TEID 0 never resolves
    pub fn lookup(&self, teid: Teid) -> Option<&Session> {
        if !teid.is_assigned() {
            return None;
        }
        self.sessions.get(&teid)
    }

    pub fn lookup_mut(&mut self, teid: Teid) -> Option<&mut Session> {
        if !teid.is_assigned() {
            return None;
        }
        self.sessions.get_mut(&teid)
    }

    /// SEIDs are allocated from the session's TEID
    pub fn lookup_by_seid(&self, seid: Seid) -> Option<&Session> {
        let teid = u32::try_from(seid.0).ok()?;
        self.lookup(Teid(teid))
    }

    /// Allocate a session from a Create-Session-Request. The peer is not
    /// bound yet; see [`SessionRegistry::bind_peer`].
    pub fn create(&mut self, msg: &GtpMessage) -> Result<Teid> {
        let req = CreateSessionRequest::decode(msg)?;
        let teid = self.allocate_teid()?;

        let session = Session {
            teid,
            seid: Seid::from(teid),
            peer: None,
            pfcp_peer: None,
            imsi: req.imsi,
            apn: req.apn,
            remote_teid: req.sender_fteid.teid,
            created_at: Instant::now(),
        };
        info!(%teid, imsi = %session.imsi, "Session created");
        self.sessions.insert(teid, session);
        Ok(teid)
    }

    /// Associate a freshly created session with its GTP-C peer. Fails if
    /// the session is unknown or already bound.
    pub fn bind_peer(&mut self, teid: Teid, peer: NodeId) -> Result<()> {
        let session = self
            .lookup_mut(teid)
            .ok_or(SmfcError::SessionNotFound(teid))?;

        match session.peer {
            Some(bound) => Err(SmfcError::InternalError(format!(
                "session {teid} already bound to {bound}"
            ))),
            None => {
                session.peer = Some(peer);
                Ok(())
            }
        }
    }

    /// Remove a session along with any continuation it still owns.
    /// Destroying an absent session is a no-op.
    pub fn destroy(&mut self, teid: Teid, continuations: &mut ContinuationStore) -> Option<Session> {
        let session = self.sessions.remove(&teid)?;
        if continuations.release(teid).is_some() {
            debug!(%teid, "Dropped pending continuation with session");
        }
        info!(%teid, "Session removed");
        Some(session)
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Session> {
        self.sessions.values()
    }

    fn allocate_teid(&mut self) -> Result<Teid> {
        // One more probe than live sessions always reaches a free value
        for _ in 0..=self.sessions.len() + 1 {
            let candidate = Teid(self.next_teid);
            self.next_teid = self.next_teid.wrapping_add(1);
            if candidate.is_assigned() && !self.sessions.contains_key(&candidate) {
                return Ok(candidate);
            }
        }
        Err(SmfcError::InternalError("TEID space exhausted".to_string()))
    }
}
