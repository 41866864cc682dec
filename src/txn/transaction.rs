use std::collections::HashSet;

use parking_lot::Mutex;

use crate::common::{PageId, SeqNumber, TxnId};

/// A transaction's lifecycle. See the core's state diagram: `Active` only
/// ever moves to `PartiallyCommitted` or `Failed`; both of those are
/// terminal-adjacent, resolving to `Committed` or `Aborted` respectively.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxnState {
    Active,
    PartiallyCommitted,
    Committed,
    Failed,
    Aborted,
}

struct Inner {
    state: TxnState,
    staged_pages: HashSet<PageId>,
    last_log_location: (PageId, SeqNumber),
}

/// A single transaction's bookkeeping: its id, state, the set of pages it
/// has dirtied, and the tail of its own backward log chain.
pub struct Transaction {
    txn_id: TxnId,
    inner: Mutex<Inner>,
}

impl Transaction {
    pub(crate) fn new(txn_id: TxnId, begin_location: (PageId, SeqNumber)) -> Self {
        Self {
            txn_id,
            inner: Mutex::new(Inner {
                state: TxnState::Active,
                staged_pages: HashSet::new(),
                last_log_location: begin_location,
            }),
        }
    }

    pub fn txn_id(&self) -> TxnId {
        self.txn_id
    }

    pub fn state(&self) -> TxnState {
        self.inner.lock().state
    }

    pub(crate) fn set_state(&self, state: TxnState) {
        self.inner.lock().state = state;
    }

    pub(crate) fn last_log_location(&self) -> (PageId, SeqNumber) {
        self.inner.lock().last_log_location
    }

    pub(crate) fn set_last_log_location(&self, location: (PageId, SeqNumber)) {
        self.inner.lock().last_log_location = location;
    }

    pub(crate) fn stage_page(&self, page_id: PageId) {
        self.inner.lock().staged_pages.insert(page_id);
    }

    pub(crate) fn staged_pages(&self) -> Vec<PageId> {
        self.inner.lock().staged_pages.iter().copied().collect()
    }
}
