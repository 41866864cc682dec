use std::collections::BTreeSet;
use std::sync::Arc;

use crate::codec::{load_container, Span};
use crate::common::{PageId, Result, PAGE_TYPE_FSL};

use super::{NewPage, Operation, Page, PageObserver, PAGE_FRAME_HEADER_SIZE};

/// Stores a sorted set of free page ids whose values fall within this
/// page's declared `[min, max]` range. The range is determined solely by
/// the FSL page's own id and capacity (see [`crate::fsl::FreeSpaceManager`]).
pub struct FslPage {
    id: PageId,
    page_size: usize,
    next_page_id: PageId,
    prev_page_id: PageId,
    min: PageId,
    max: PageId,
    free_pages: BTreeSet<PageId>,
    observers: Vec<Arc<dyn PageObserver>>,
}

impl FslPage {
    fn body_len(&self) -> usize {
        self.page_size - PAGE_FRAME_HEADER_SIZE
    }

    /// `(max_free_space / sizeof(PageId))` entries per page: the fixed
    /// header leaves this many 8-byte ids of room.
    pub fn capacity(&self) -> usize {
        (self.body_len() - FIXED_HEADER) / 8
    }

    pub fn range(&self) -> (PageId, PageId) {
        (self.min, self.max)
    }

    pub fn set_range(&mut self, min: PageId, max: PageId) {
        self.min = min;
        self.max = max;
    }

    pub fn next_page_id(&self) -> PageId {
        self.next_page_id
    }

    pub fn set_next_page_id(&mut self, id: PageId) {
        self.next_page_id = id;
    }

    pub fn prev_page_id(&self) -> PageId {
        self.prev_page_id
    }

    pub fn set_prev_page_id(&mut self, id: PageId) {
        self.prev_page_id = id;
    }

    pub fn contains(&self, page_id: PageId) -> bool {
        self.free_pages.contains(&page_id)
    }

    pub fn insert(&mut self, page_id: PageId) -> bool {
        let inserted = self.free_pages.insert(page_id);
        if inserted {
            self.notify_observers();
        }
        inserted
    }

    pub fn erase(&mut self, page_id: PageId) -> bool {
        let removed = self.free_pages.remove(&page_id);
        if removed {
            self.notify_observers();
        }
        removed
    }

    /// Largest tracked id, the reference "recently used" approximation.
    pub fn largest(&self) -> Option<PageId> {
        self.free_pages.iter().next_back().copied()
    }

    pub fn is_full(&self) -> bool {
        self.free_pages.len() >= self.capacity()
    }
}

// next_page_id(8) + prev_page_id(8) + min(8) + max(8)
const FIXED_HEADER: usize = 8 + 8 + 8 + 8;

impl Page for FslPage {
    fn type_id(&self) -> crate::common::PageTypeId {
        PAGE_TYPE_FSL
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
        let remaining_slots = self.capacity().saturating_sub(self.free_pages.len());
        match op {
            Operation::Insert => remaining_slots.saturating_sub(1) * 8,
            Operation::Update => remaining_slots * 8,
        }
    }

    fn load_body(&mut self, span: &mut Span) -> Result<()> {
        use crate::codec::Load;

        self.next_page_id = PageId::new(u64::load(span)?);
        self.prev_page_id = PageId::new(u64::load(span)?);
        self.min = PageId::new(u64::load(span)?);
        self.max = PageId::new(u64::load(span)?);
        let ids: Vec<u64> = load_container(span)?;
        self.free_pages = ids.into_iter().map(PageId::new).collect();
        Ok(())
    }

    fn dump_body(&self, span: &mut Span) -> Result<()> {
        use crate::codec::Dump;

        self.next_page_id.as_u64().dump(span)?;
        self.prev_page_id.as_u64().dump(span)?;
        self.min.as_u64().dump(span)?;
        self.max.as_u64().dump(span)?;

        let ids: Vec<u64> = self.free_pages.iter().map(|p| p.as_u64()).collect();
        crate::codec::dump_container(&ids, span)?;

        let written = FIXED_HEADER + 8 + ids.len() * 8;
        let padding = self.body_len().saturating_sub(written);
        span.put(&vec![0u8; padding])
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

impl NewPage for FslPage {
    fn new_empty(id: PageId, page_size: usize) -> Self {
        Self {
            id,
            page_size,
            next_page_id: PageId::NULL,
            prev_page_id: PageId::NULL,
            min: PageId::NULL,
            max: PageId::NULL,
            free_pages: BTreeSet::new(),
            observers: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn largest_tracks_the_max_inserted_id() {
        let mut p = FslPage::new_empty(PageId::new(1), 512);
        p.insert(PageId::new(3));
        p.insert(PageId::new(9));
        p.insert(PageId::new(5));
        assert_eq!(p.largest(), Some(PageId::new(9)));
        p.erase(PageId::new(9));
        assert_eq!(p.largest(), Some(PageId::new(5)));
    }

    #[test]
    fn dump_then_load_round_trips() {
        let mut p = FslPage::new_empty(PageId::new(1), 512);
        p.set_range(PageId::new(1), PageId::new(100));
        p.insert(PageId::new(4));
        p.insert(PageId::new(7));

        let body_len = p.body_len();
        let mut buf = vec![0u8; body_len];
        p.dump_body(&mut Span::new(&mut buf)).unwrap();

        let mut reloaded = FslPage::new_empty(PageId::new(1), 512);
        reloaded.load_body(&mut Span::new(&mut buf)).unwrap();

        assert_eq!(reloaded.range(), (PageId::new(1), PageId::new(100)));
        assert!(reloaded.contains(PageId::new(4)));
        assert!(reloaded.contains(PageId::new(7)));
    }
}
