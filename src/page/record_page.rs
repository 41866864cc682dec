use std::sync::Arc;

use crate::codec::Span;
use crate::common::{CrioError, PageId, Result, SlotId, PAGE_TYPE_RECORD};

use super::{NewPage, Operation, Page, PageObserver, PageSlot, PAGE_FRAME_HEADER_SIZE};

/// Fixed header fields before the slot directory: prev_page_id(8),
/// next_page_id(8), next_slot_id(8), tail(4), slot_count(8).
const HEADER_SIZE: usize = 8 + 8 + 8 + 4 + 8;
/// Bytes per slot-directory entry: slot_id(8), offset(4), length(4).
const DIR_ENTRY_SIZE: usize = 8 + 4 + 4;

/// The primary slotted page. A header plus a slot directory growing upward
/// from the low-address end, and page slots growing downward from the
/// high-address end; `tail` is the low watermark of the occupied region.
pub struct RecordPage {
    id: PageId,
    page_size: usize,
    prev_page_id: PageId,
    next_page_id: PageId,
    next_slot_id: u64,
    tail: u32,
    directory: Vec<(SlotId, u32, u32)>,
    /// Raw body bytes, indexed by the same absolute offsets the directory
    /// entries reference. Bytes below `tail` are stale once a slot has been
    /// removed (lazy compaction); bytes in `[tail, body_len)` are live.
    payload: Vec<u8>,
    observers: Vec<Arc<dyn PageObserver>>,
}

impl RecordPage {
    fn body_len(&self) -> usize {
        self.page_size - PAGE_FRAME_HEADER_SIZE
    }

    pub fn prev_page_id(&self) -> PageId {
        self.prev_page_id
    }

    pub fn set_prev_page_id(&mut self, id: PageId) {
        self.prev_page_id = id;
    }

    pub fn next_page_id(&self) -> PageId {
        self.next_page_id
    }

    pub fn set_next_page_id(&mut self, id: PageId) {
        self.next_page_id = id;
    }

    pub fn slot_count(&self) -> usize {
        self.directory.len()
    }

    fn find(&self, slot_id: SlotId) -> Result<usize> {
        self.directory
            .binary_search_by_key(&slot_id, |entry| entry.0)
            .map_err(|_| CrioError::SlotNotFound(slot_id, self.id))
    }

    /// Rearranges live slots to coalesce free space; triggered only when an
    /// insert cannot otherwise fit.
    fn compact(&mut self) {
        let body_len = self.body_len();
        let mut new_payload = vec![0u8; body_len];
        let mut new_tail = body_len;
        let mut new_directory = Vec::with_capacity(self.directory.len());

        for &(slot_id, offset, length) in &self.directory {
            let bytes = self.payload[offset as usize..(offset + length) as usize].to_vec();
            new_tail -= length as usize;
            new_payload[new_tail..new_tail + length as usize].copy_from_slice(&bytes);
            new_directory.push((slot_id, new_tail as u32, length));
        }

        self.payload = new_payload;
        self.tail = new_tail as u32;
        self.directory = new_directory;
    }

    /// Places `bytes` at the tail under `slot_id`, growing `next_slot_id` to
    /// stay ahead of it. Shared by `insert`, `update`'s grow path, and
    /// `undo_remove`.
    fn place(&mut self, slot_id: SlotId, bytes: &[u8]) -> Result<()> {
        let required = bytes.len();
        if self.free_space(Operation::Insert) < required {
            self.compact();
        }
        let available = self.free_space(Operation::Insert);
        if available < required {
            return Err(CrioError::InsufficientSpace {
                needed: required,
                available,
            });
        }

        let offset = self.tail as usize - required;
        self.payload[offset..offset + required].copy_from_slice(bytes);
        self.tail = offset as u32;

        match self.directory.binary_search_by_key(&slot_id, |entry| entry.0) {
            Ok(pos) => self.directory[pos] = (slot_id, offset as u32, required as u32),
            Err(pos) => self
                .directory
                .insert(pos, (slot_id, offset as u32, required as u32)),
        }

        if slot_id.0 >= self.next_slot_id {
            self.next_slot_id = slot_id.0 + 1;
        }
        Ok(())
    }

    /// Assigns a fresh slot id (max-assigned + 1), places the payload, and
    /// notifies observers.
    pub fn insert(&mut self, slot: &PageSlot) -> Result<SlotId> {
        let mut bytes = vec![0u8; slot.dump_size()];
        slot.dump(&mut Span::new(&mut bytes))?;

        let slot_id = SlotId::new(self.next_slot_id);
        self.place(slot_id, &bytes)?;
        self.notify_observers();
        Ok(slot_id)
    }

    /// Fails with `SlotNotFound` if absent.
    pub fn get(&self, slot_id: SlotId) -> Result<PageSlot> {
        let idx = self.find(slot_id)?;
        let (_, offset, length) = self.directory[idx];
        let mut bytes = self.payload[offset as usize..(offset + length) as usize].to_vec();
        PageSlot::load(&mut Span::new(&mut bytes))
    }

    /// If the new image is no larger than the old one, rewrites in place;
    /// otherwise removes and reinserts under the same `SlotId`, which is
    /// preserved across the call either way.
    pub fn update(&mut self, slot_id: SlotId, slot: &PageSlot) -> Result<()> {
        let idx = self.find(slot_id)?;
        let mut bytes = vec![0u8; slot.dump_size()];
        slot.dump(&mut Span::new(&mut bytes))?;

        let (_, offset, length) = self.directory[idx];
        if bytes.len() <= length as usize {
            self.payload[offset as usize..offset as usize + bytes.len()].copy_from_slice(&bytes);
            self.directory[idx].2 = bytes.len() as u32;
        } else {
            self.directory.remove(idx);
            self.place(slot_id, &bytes)?;
        }
        self.notify_observers();
        Ok(())
    }

    /// Deletes the directory entry; the freed region is compacted lazily.
    pub fn remove(&mut self, slot_id: SlotId) -> Result<()> {
        let idx = self.find(slot_id)?;
        self.directory.remove(idx);
        self.notify_observers();
        Ok(())
    }

    /// Reinstates a specific slot id with a given payload; used by rollback.
    pub fn undo_remove(&mut self, slot_id: SlotId, slot: &PageSlot) -> Result<()> {
        let mut bytes = vec![0u8; slot.dump_size()];
        slot.dump(&mut Span::new(&mut bytes))?;
        self.place(slot_id, &bytes)?;
        self.notify_observers();
        Ok(())
    }
}

impl Page for RecordPage {
    fn type_id(&self) -> crate::common::PageTypeId {
        PAGE_TYPE_RECORD
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
        let used = HEADER_SIZE + entry_cost;
        (self.tail as usize).saturating_sub(used)
    }

    fn load_body(&mut self, span: &mut Span) -> Result<()> {
        use crate::codec::Load;

        self.prev_page_id = PageId::new(u64::load(span)?);
        self.next_page_id = PageId::new(u64::load(span)?);
        self.next_slot_id = u64::load(span)?;
        self.tail = u32::load(span)?;
        let slot_count = u64::load(span)? as usize;

        // An all-zero header (no slots, no next_slot_id, tail == 0) can only
        // come from a page the backend allocated but never wrote an image
        // for; a page that ever held zero live slots through `new_empty`
        // and a normal dump/load round trip always has `tail == body_len`.
        // Recovery can run redo against such a page, so treat it as blank.
        if slot_count == 0 && self.next_slot_id == 0 && self.tail == 0 && self.body_len() > 0 {
            self.tail = self.body_len() as u32;
        }

        let mut directory = Vec::with_capacity(slot_count);
        for _ in 0..slot_count {
            let slot_id = SlotId::new(u64::load(span)?);
            let offset = u32::load(span)?;
            let length = u32::load(span)?;
            directory.push((slot_id, offset, length));
        }

        let dir_bytes_len = slot_count * DIR_ENTRY_SIZE;
        let rest_len = self.body_len() - HEADER_SIZE - dir_bytes_len;
        let rest = span.take(rest_len)?;

        let mut payload = vec![0u8; self.body_len()];
        payload[HEADER_SIZE + dir_bytes_len..].copy_from_slice(rest);

        self.directory = directory;
        self.payload = payload;
        Ok(())
    }

    fn dump_body(&self, span: &mut Span) -> Result<()> {
        use crate::codec::Dump;

        self.prev_page_id.as_u64().dump(span)?;
        self.next_page_id.as_u64().dump(span)?;
        self.next_slot_id.dump(span)?;
        self.tail.dump(span)?;
        (self.directory.len() as u64).dump(span)?;

        for &(slot_id, offset, length) in &self.directory {
            slot_id.0.dump(span)?;
            offset.dump(span)?;
            length.dump(span)?;
        }

        let dir_bytes_len = self.directory.len() * DIR_ENTRY_SIZE;
        span.put(&self.payload[HEADER_SIZE + dir_bytes_len..])
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

impl NewPage for RecordPage {
    fn new_empty(id: PageId, page_size: usize) -> Self {
        let body_len = page_size - PAGE_FRAME_HEADER_SIZE;
        Self {
            id,
            page_size,
            prev_page_id: PageId::NULL,
            next_page_id: PageId::NULL,
            next_slot_id: 1,
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

    fn page() -> RecordPage {
        RecordPage::new_empty(PageId::new(1), 512)
    }

    #[test]
    fn insert_assigns_monotonic_slot_ids() {
        let mut p = page();
        let a = p.insert(&PageSlot::new(b"a".to_vec())).unwrap();
        let b = p.insert(&PageSlot::new(b"b".to_vec())).unwrap();
        assert_eq!(a, SlotId::new(1));
        assert_eq!(b, SlotId::new(2));
    }

    #[test]
    fn get_returns_most_recently_written_payload() {
        let mut p = page();
        let id = p.insert(&PageSlot::new(b"first".to_vec())).unwrap();
        p.update(id, &PageSlot::new(b"second".to_vec())).unwrap();
        assert_eq!(p.get(id).unwrap().payload, b"second");
    }

    #[test]
    fn slot_id_is_never_reused_after_removal() {
        let mut p = page();
        let a = p.insert(&PageSlot::new(b"a".to_vec())).unwrap();
        p.remove(a).unwrap();
        let b = p.insert(&PageSlot::new(b"b".to_vec())).unwrap();
        assert_ne!(a, b);
        assert!(p.get(a).is_err());
    }

    #[test]
    fn insert_fails_with_insufficient_space_when_truly_full() {
        let mut p = page();
        let big = vec![0u8; 400];
        assert!(p.insert(&PageSlot::new(big)).is_ok());
        let another = vec![0u8; 400];
        assert!(matches!(
            p.insert(&PageSlot::new(another)),
            Err(CrioError::InsufficientSpace { .. })
        ));
    }

    #[test]
    fn compaction_reclaims_space_from_removed_slots() {
        let mut p = page();
        let a = p.insert(&PageSlot::new(vec![1u8; 150])).unwrap();
        let b = p.insert(&PageSlot::new(vec![2u8; 150])).unwrap();
        p.remove(a).unwrap();
        // Without compaction this would not fit; place() compacts first.
        let c = p.insert(&PageSlot::new(vec![3u8; 150])).unwrap();
        assert_eq!(p.get(b).unwrap().payload, vec![2u8; 150]);
        assert_eq!(p.get(c).unwrap().payload, vec![3u8; 150]);
    }

    #[test]
    fn dump_then_load_round_trips() {
        let mut p = page();
        p.insert(&PageSlot::new(b"hello".to_vec())).unwrap();
        p.set_prev_page_id(PageId::new(7));

        let body_len = p.body_len();
        let mut buf = vec![0u8; body_len];
        p.dump_body(&mut Span::new(&mut buf)).unwrap();

        let mut reloaded = RecordPage::new_empty(PageId::new(1), 512);
        reloaded.load_body(&mut Span::new(&mut buf)).unwrap();

        assert_eq!(reloaded.prev_page_id(), PageId::new(7));
        assert_eq!(reloaded.get(SlotId::new(1)).unwrap().payload, b"hello");
    }

    #[test]
    fn free_space_insert_never_exceeds_free_space_update() {
        let mut p = page();
        p.insert(&PageSlot::new(b"x".to_vec())).unwrap();
        assert!(p.free_space(Operation::Insert) <= p.free_space(Operation::Update));
    }
}
