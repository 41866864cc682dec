use std::sync::Arc;

use crate::common::{RecordId, Result};
use crate::page::{Operation, Page, PageSlot};
use crate::page_manager::PageManager;
use crate::txn::{Transaction, TransactionManager};

/// Fixed cost of a [`PageSlot`] with an empty payload: `prev(16) + next(16) +
/// checksum(8) + payload length prefix(8)`.
const SLOT_OVERHEAD: usize = 48;

/// Reads and writes logical records that may span more than one page slot.
/// A record longer than a single slot's share of a page is split into a
/// forward/backward-linked chain of [`PageSlot`]s; every mutation it makes
/// to a page is paired with exactly one log record through the transaction
/// manager.
pub struct RecordAccessor {
    page_manager: Arc<PageManager>,
    txn_manager: Arc<TransactionManager>,
}

impl RecordAccessor {
    pub fn new(page_manager: Arc<PageManager>, txn_manager: Arc<TransactionManager>) -> Self {
        Self {
            page_manager,
            txn_manager,
        }
    }

    /// Splits `payload` across as many slots as needed, placing each with
    /// null links first, then re-fetching every slot to set its real
    /// `prev`/`next`. The relink pass never changes a slot's dump size, so
    /// it cannot trigger a page compaction or run out of room.
    pub fn insert(&self, txn: &Transaction, payload: &[u8]) -> Result<RecordId> {
        let mut locations = Vec::new();
        let mut originals = Vec::new();
        let mut remaining = payload;

        loop {
            let want = remaining.len().min(1) + SLOT_OVERHEAD;
            let mut guard = self.page_manager.get_free_or_new_page(want)?;
            let mut room = guard
                .free_space(Operation::Insert)
                .saturating_sub(SLOT_OVERHEAD);

            if room == 0 && !remaining.is_empty() {
                drop(guard);
                guard = self.page_manager.get_new_page()?;
                room = guard
                    .free_space(Operation::Insert)
                    .saturating_sub(SLOT_OVERHEAD);
            }

            let take = room.min(remaining.len());
            let (chunk, rest) = remaining.split_at(take);
            remaining = rest;

            let slot = PageSlot::new(chunk.to_vec());
            let slot_id = guard.insert(&slot)?;
            let page_id = guard.id();
            drop(guard);

            let location = RecordId::new(page_id, slot_id);
            self.txn_manager.log_insert(txn, location, slot.clone())?;
            locations.push(location);
            originals.push(slot);

            if remaining.is_empty() {
                break;
            }
        }

        if locations.len() > 1 {
            for i in 0..locations.len() {
                let prev = if i == 0 { RecordId::NULL } else { locations[i - 1] };
                let next = if i + 1 == locations.len() {
                    RecordId::NULL
                } else {
                    locations[i + 1]
                };

                let old = originals[i].clone();
                let mut new = old.clone();
                new.prev = prev;
                new.next = next;

                let mut guard = self.page_manager.get_page_mut(locations[i].page_id)?;
                guard.update(locations[i].slot_id, &new)?;
                drop(guard);

                self.txn_manager
                    .log_update(txn, locations[i], old, new)?;
            }
        }

        Ok(locations[0])
    }

    /// Concatenates every chunk in the chain starting at `head`.
    pub fn read(&self, head: RecordId) -> Result<Vec<u8>> {
        let mut out = Vec::new();
        let mut current = head;
        while !current.is_null() {
            let page = self.page_manager.get_page(current.page_id)?;
            let slot = page.get(current.slot_id)?;
            out.extend_from_slice(&slot.payload);
            current = slot.next;
        }
        Ok(out)
    }

    /// Removes every slot in the chain starting at `head`, logging each
    /// removal. `next` is captured before the slot is removed since removal
    /// only drops the directory entry, not the in-memory copy already read.
    pub fn delete(&self, txn: &Transaction, head: RecordId) -> Result<()> {
        let mut current = head;
        while !current.is_null() {
            let mut page = self.page_manager.get_page_mut(current.page_id)?;
            let slot = page.get(current.slot_id)?;
            page.remove(current.slot_id)?;
            drop(page);

            let next = slot.next;
            self.txn_manager.log_delete(txn, current, slot)?;
            current = next;
        }
        Ok(())
    }

    /// Replaces the record at `head` with `payload`. Implemented as a
    /// delete followed by an insert rather than a true in-place resize of
    /// the existing chain.
    pub fn update(&self, txn: &Transaction, head: RecordId, payload: &[u8]) -> Result<RecordId> {
        self.delete(txn, head)?;
        self.insert(txn, payload)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::LruReplacer;
    use crate::fsl::FreeSpaceManager;
    use crate::storage::MemoryBackend;
    use crate::wal::LogManager;

    fn harness() -> (RecordAccessor, Arc<TransactionManager>) {
        let page_size = 512;
        let data_backend = Arc::new(MemoryBackend::new(page_size));
        let fsl_backend = Arc::new(MemoryBackend::new(page_size));
        let log_backend = Arc::new(MemoryBackend::new(page_size));

        let replacer: Arc<dyn crate::buffer::Replacer> = Arc::new(LruReplacer::new());
        let buffer = crate::buffer::BufferManager::new(8, replacer, data_backend).unwrap();
        let fsl = Arc::new(FreeSpaceManager::new(fsl_backend, page_size));
        let page_manager = Arc::new(PageManager::new(buffer, fsl));
        page_manager.start().unwrap();

        let log_manager = LogManager::new(log_backend, 8).unwrap();
        log_manager.start().unwrap();

        let txn_manager = Arc::new(TransactionManager::new(log_manager, page_manager.clone()));
        (RecordAccessor::new(page_manager, txn_manager.clone()), txn_manager)
    }

    #[test]
    fn round_trips_a_small_record() {
        let (records, txns) = harness();
        let txn = txns.begin().unwrap();
        let head = records.insert(&txn, b"hello world").unwrap();
        assert_eq!(records.read(head).unwrap(), b"hello world");
        txns.commit(&txn).unwrap();
    }

    #[test]
    fn splits_a_payload_across_multiple_pages() {
        let (records, txns) = harness();
        let txn = txns.begin().unwrap();
        let payload = vec![7u8; 3000];
        let head = records.insert(&txn, &payload).unwrap();
        assert_eq!(records.read(head).unwrap(), payload);
        txns.commit(&txn).unwrap();
    }

    #[test]
    fn delete_removes_every_chunk() {
        let (records, txns) = harness();
        let txn = txns.begin().unwrap();
        let payload = vec![9u8; 2000];
        let head = records.insert(&txn, &payload).unwrap();
        records.delete(&txn, head).unwrap();
        assert!(records.read(head).is_err());
        txns.commit(&txn).unwrap();
    }
}
