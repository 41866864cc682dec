use std::sync::Arc;

use parking_lot::Mutex;
use tracing::info;

use crate::buffer::{BufferManager, LruReplacer, Replacer};
use crate::common::{CrioError, PageId, Result, SeqNumber, TxnId};
use crate::page::{LogPage, NewPage};
use crate::storage::StorageBackend;

use super::{LogRecord, LogRecordBody};

struct LogState {
    next_seq_number: SeqNumber,
    tail_page_id: PageId,
}

/// Append-only sequence of [`LogRecord`]s backed by a dedicated chain of
/// [`LogPage`]s. Appends are serialized through `state`; reads only need a
/// resident page.
pub struct LogManager {
    buffer: Arc<BufferManager<LogPage>>,
    state: Mutex<LogState>,
}

impl LogManager {
    pub fn new(backend: Arc<dyn StorageBackend>, buffer_capacity: usize) -> Result<Arc<Self>> {
        let replacer: Arc<dyn Replacer> = Arc::new(LruReplacer::new());
        let buffer = BufferManager::new(buffer_capacity, replacer, backend)?;
        Ok(Arc::new(Self {
            buffer,
            state: Mutex::new(LogState {
                next_seq_number: SeqNumber(1),
                tail_page_id: PageId::NULL,
            }),
        }))
    }

    /// Opens log storage and recovers `next_seq_number` by walking the
    /// forward chain of log pages to its tail.
    pub fn start(&self) -> Result<()> {
        self.buffer.start()?;
        let mut state = self.state.lock();

        let mut page_id = PageId::new(1);
        let mut last_seen = PageId::NULL;
        let mut last_seq = SeqNumber::NONE;

        loop {
            let page = match self.buffer.get_read(page_id) {
                Ok(page) => page,
                Err(CrioError::PageNotFound(_)) => break,
                Err(e) => return Err(e),
            };
            last_seen = page_id;
            last_seq = last_seq.max(page.last_seq_number());
            let next = page.next_page_id();
            drop(page);
            if next.is_null() {
                break;
            }
            page_id = next;
        }

        if last_seen.is_null() {
            let page = self.buffer.get_new()?;
            state.tail_page_id = page.id();
            drop(page);
            state.next_seq_number = SeqNumber(1);
        } else {
            state.tail_page_id = last_seen;
            state.next_seq_number = if last_seq == SeqNumber::NONE {
                SeqNumber(1)
            } else {
                last_seq.next()
            };
        }

        info!(next_seq_number = state.next_seq_number.0, "log manager started");
        Ok(())
    }

    pub fn stop(&self) -> Result<()> {
        self.buffer.stop()
    }

    /// Assigns a sequence number, serializes the record, and appends it into
    /// the tail log page, rolling over to a freshly allocated page if it
    /// does not fit. Returns the record's `(page_id, seq_number)` location.
    pub fn add(
        &self,
        prev_seq_number: SeqNumber,
        txn_id: TxnId,
        location: crate::common::RecordId,
        body: LogRecordBody,
    ) -> Result<(PageId, SeqNumber)> {
        let mut state = self.state.lock();
        let seq = state.next_seq_number;
        let record = LogRecord::new(seq, prev_seq_number, txn_id, location, body);

        let mut tail = self.buffer.get_write(state.tail_page_id)?;
        match tail.append(seq, &record) {
            Ok(()) => {}
            Err(CrioError::InsufficientSpace { .. }) => {
                drop(tail);
                let mut new_page = self.buffer.get_new()?;
                new_page.append(seq, &record)?;
                let new_id = new_page.id();
                drop(new_page);

                let mut old_tail = self.buffer.get_write(state.tail_page_id)?;
                old_tail.set_next_page_id(new_id);
                drop(old_tail);

                state.tail_page_id = new_id;
            }
            Err(e) => return Err(e),
        }

        state.next_seq_number = seq.next();
        Ok((state.tail_page_id, seq))
    }

    pub fn get(&self, location: (PageId, SeqNumber)) -> Result<LogRecord> {
        let (page_id, seq) = location;
        let page = self.buffer.get_read(page_id)?;
        page.get(seq)
    }

    /// Finds the record with the given sequence number by walking the page
    /// chain from its head, and returns the page it lives on alongside it.
    /// Sequence numbers are global and monotonic, but a transaction's prior
    /// record may sit on an earlier page than its successor, so a bare
    /// `(page_id, seq)` pair from a later record cannot be reused to look up
    /// an earlier one.
    pub fn find(&self, seq: SeqNumber) -> Result<(PageId, LogRecord)> {
        let mut page_id = PageId::new(1);
        loop {
            let page = match self.buffer.get_read(page_id) {
                Ok(page) => page,
                Err(CrioError::PageNotFound(_)) => {
                    return Err(CrioError::CorruptError(format!(
                        "log has no record with sequence number {}",
                        seq.0
                    )))
                }
                Err(e) => return Err(e),
            };
            if page.contains(seq) {
                let record = page.get(seq)?;
                return Ok((page_id, record));
            }
            let next = page.next_page_id();
            drop(page);
            if next.is_null() {
                return Err(CrioError::CorruptError(format!(
                    "log has no record with sequence number {}",
                    seq.0
                )));
            }
            page_id = next;
        }
    }

    /// Writes back every dirty log page. Must be called before flushing any
    /// data page whose modifications it covers.
    pub fn flush(&self) -> Result<()> {
        self.buffer.flush_all()
    }

    /// Every record in the log, in append order, by walking the page chain
    /// from its head. Used by recovery; not meant for the steady-state path.
    pub fn replay_all(&self) -> Result<Vec<LogRecord>> {
        let mut out = Vec::new();
        let mut page_id = PageId::new(1);
        loop {
            let page = match self.buffer.get_read(page_id) {
                Ok(page) => page,
                Err(CrioError::PageNotFound(_)) => break,
                Err(e) => return Err(e),
            };
            out.extend(page.records()?);
            let next = page.next_page_id();
            drop(page);
            if next.is_null() {
                break;
            }
            page_id = next;
        }
        Ok(out)
    }
}
