use std::sync::Arc;

use crate::codec::Span;
use crate::common::{CrioError, PageId, Result, SeqNumber, PAGE_TYPE_LOG};
use crate::wal::LogRecord;

use super::{NewPage, Operation, Page, PageObserver, PAGE_FRAME_HEADER_SIZE};

// next_page_id(8) + tail(4) + slot_count(8)
const FIXED_HEADER: usize = 8 + 4 + 8;
const DIR_ENTRY_SIZE: usize = 8 + 4 + 4; // seq_number(8) + offset(4) + length(4)

/// A specialized slotted page whose directory is keyed by [`SeqNumber`]
/// instead of [`crate::common::SlotId`], forming a singly-linked forward
/// chain of log pages. Sequence numbers within a page are strictly
/// increasing.
pub struct LogPage {
    id: PageId,
    page_size: usize,
    next_page_id: PageId,
    tail: u32,
    directory: Vec<(SeqNumber, u32, u32)>,
    payload: Vec<u8>,
    observers: Vec<Arc<dyn PageObserver>>,
}

impl LogPage {
    fn body_len(&self) -> usize {
        self.page_size - PAGE_FRAME_HEADER_SIZE
    }

    pub fn next_page_id(&self) -> PageId {
        self.next_page_id
    }

    pub fn set_next_page_id(&mut self, id: PageId) {
        self.next_page_id = id;
    }

    pub fn last_seq_number(&self) -> SeqNumber {
        self.directory.last().map(|e| e.0).unwrap_or(SeqNumber::NONE)
    }

    /// Appends a record, assigning it the given (already-incremented)
    /// sequence number. Fails with `InsufficientSpace` if it does not fit;
    /// the caller is responsible for allocating a new page in that case.
    pub fn append(&mut self, seq: SeqNumber, record: &LogRecord) -> Result<()> {
        let mut bytes = vec![0u8; record.dump_size()];
        record.dump(&mut Span::new(&mut bytes))?;
        let required = bytes.len();

        if self.free_space(Operation::Insert) < required {
            return Err(CrioError::InsufficientSpace {
                needed: required,
                available: self.free_space(Operation::Insert),
            });
        }

        let offset = self.tail as usize - required;
        self.payload[offset..offset + required].copy_from_slice(&bytes);
        self.tail = offset as u32;
        self.directory.push((seq, offset as u32, required as u32));
        self.notify_observers();
        Ok(())
    }

    pub fn get(&self, seq: SeqNumber) -> Result<LogRecord> {
        let idx = self
            .directory
            .binary_search_by_key(&seq, |e| e.0)
            .map_err(|_| CrioError::CorruptError(format!("log page has no entry for {seq}")))?;
        let (_, offset, length) = self.directory[idx];
        let mut bytes = self.payload[offset as usize..(offset + length) as usize].to_vec();
        LogRecord::load(&mut Span::new(&mut bytes))
    }

    pub fn contains(&self, seq: SeqNumber) -> bool {
        self.directory.binary_search_by_key(&seq, |e| e.0).is_ok()
    }

    /// Every record stored in this page, in ascending sequence-number order.
    pub fn records(&self) -> Result<Vec<LogRecord>> {
        self.directory
            .iter()
            .map(|&(seq, _, _)| self.get(seq))
            .collect()
    }
}

impl Page for LogPage {
    fn type_id(&self) -> crate::common::PageTypeId {
        PAGE_TYPE_LOG
    }

    fn id(&self) -> PageId {
        self.id
    }

    fn set_id(&mut self, id: PageId) {
        self.id = id;
    }

    fn size(&self) -> usize {
        self.page_size
    }

    fn free_space(&self, op: Operation) -> usize {
        let entry_cost = match op {
            Operation::Insert => (self.directory.len() + 1) * DIR_ENTRY_SIZE,
            Operation::Update => self.directory.len() * DIR_ENTRY_SIZE,
        };
        let used = FIXED_HEADER + entry_cost;
        (self.tail as usize).saturating_sub(used)
    }

    fn load_body(&mut self, span: &mut Span) -> Result<()> {
        use crate::codec::Load;

        self.next_page_id = PageId::new(u64::load(span)?);
        self.tail = u32::load(span)?;
        let count = u64::load(span)? as usize;

        let mut directory = Vec::with_capacity(count);
        for _ in 0..count {
            let seq = SeqNumber(u64::load(span)?);
            let offset = u32::load(span)?;
            let length = u32::load(span)?;
            directory.push((seq, offset, length));
        }

        let dir_bytes_len = count * DIR_ENTRY_SIZE;
        let rest_len = self.body_len() - FIXED_HEADER - dir_bytes_len;
        let rest = span.take(rest_len)?;

        let mut payload = vec![0u8; self.body_len()];
        payload[FIXED_HEADER + dir_bytes_len..].copy_from_slice(rest);

        self.directory = directory;
        self.payload = payload;
        Ok(())
    }

    fn dump_body(&self, span: &mut Span) -> Result<()> {
        use crate::codec::Dump;

        self.next_page_id.as_u64().dump(span)?;
        self.tail.dump(span)?;
        (self.directory.len() as u64).dump(span)?;

        for &(seq, offset, length) in &self.directory {
            seq.0.dump(span)?;
            offset.dump(span)?;
            length.dump(span)?;
        }

        let dir_bytes_len = self.directory.len() * DIR_ENTRY_SIZE;
        span.put(&self.payload[FIXED_HEADER + dir_bytes_len..])
    }

    fn add_observer(&mut self, observer: Arc<dyn PageObserver>) {
        if !self.observers.iter().any(|o| Arc::ptr_eq(o, &observer)) {
            self.observers.push(observer);
        }
    }

    fn notify_observers(&self) {
        let free = self.free_space(Operation::Insert);
        for observer in &self.observers {
            observer.on_mutate(self.id, free);
        }
    }
}

impl NewPage for LogPage {
    fn new_empty(id: PageId, page_size: usize) -> Self {
        let body_len = page_size - PAGE_FRAME_HEADER_SIZE;
        Self {
            id,
            page_size,
            next_page_id: PageId::NULL,
            tail: body_len as u32,
            directory: Vec::new(),
            payload: vec![0u8; body_len],
            observers: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::{RecordId, TxnId};
    use crate::wal::LogRecordBody;

    #[test]
    fn appended_sequence_numbers_are_retrievable_in_order() {
        let mut p = LogPage::new_empty(PageId::new(1), 512);
        let r1 = LogRecord::new(
            SeqNumber(1),
            SeqNumber::NONE,
            TxnId(1),
            RecordId::NULL,
            LogRecordBody::Begin,
        );
        let r2 = LogRecord::new(
            SeqNumber(2),
            SeqNumber(1),
            TxnId(1),
            RecordId::NULL,
            LogRecordBody::Commit,
        );
        p.append(SeqNumber(1), &r1).unwrap();
        p.append(SeqNumber(2), &r2).unwrap();

        assert_eq!(p.get(SeqNumber(1)).unwrap().txn_id, TxnId(1));
        assert_eq!(p.last_seq_number(), SeqNumber(2));
    }
}
