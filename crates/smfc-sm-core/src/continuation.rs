use crate::xact::Transaction;
use bytes::Bytes;
use smfc_core::{Result, SmfcError};
use smfc_shared::{Teid, XactId};
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::time::Instant;

/// A GTP-C request parked while its policy answer is outstanding. The raw
/// buffer stays owned here until the answer resumes it.
#[derive(Debug)]
pub struct Continuation {
    pub xact: Transaction,
    pub buf: Bytes,
    pub suspended_at: Instant,
}

// ポリシー応答待ちのリクエスト (セッションごとに最大1件)
#[derive(Default)]
pub struct ContinuationStore {
    pending: HashMap<Teid, Continuation>,
}

impl ContinuationStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Park a request for `teid`. Fails if one is already pending; the
    /// existing record is left as it was.
    pub fn suspend(&mut self, teid: Teid, xact: Transaction, buf: Bytes) -> Result<()> {
        match self.pending.entry(teid) {
            Entry::Occupied(_) => Err(SmfcError::ContinuationPending(teid)),
            Entry::Vacant(slot) => {
                slot.insert(Continuation {
                    xact,
                    buf,
                    suspended_at: Instant::now(),
                });
                Ok(())
            }
        }
    }

    /// Take the parked request back. Each record resumes at most once.
    pub fn resume(&mut self, teid: Teid) -> Result<(Transaction, Bytes)> {
        self.pending
            .remove(&teid)
            .map(|c| (c.xact, c.buf))
            .ok_or(SmfcError::NoContinuation(teid))
    }

    /// Drop a parked request without resuming it
    pub fn release(&mut self, teid: Teid) -> Option<Continuation> {
        self.pending.remove(&teid)
    }

    pub fn get(&self, teid: Teid) -> Option<&Continuation> {
        self.pending.get(&teid)
    }

    /// Transaction parked for `teid`, if any
    pub fn pending_xact(&self, teid: Teid) -> Option<XactId> {
        self.pending.get(&teid).map(|c| c.xact.id)
    }

    pub fn contains(&self, teid: Teid) -> bool {
        self.pending.contains_key(&teid)
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}
