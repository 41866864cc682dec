use std::sync::Arc;

use crate::buffer::{BufferManager, ReadPageGuard, WritePageGuard};
use crate::common::{PageId, Result};
use crate::fsl::FreeSpaceManager;
use crate::page::{PageObserver, RecordPage};

/// Composes the record-page buffer manager with the free-space manager: the
/// one place that knows both "give me this page" and "give me a page with
/// room." Wires the FSL as an observer on every write-path acquisition;
/// eviction drops a page's in-memory observer list along with everything
/// else about it, so "wired once" can't be tracked by page id across a
/// reload — `Page::add_observer` itself de-duplicates by observer identity,
/// making re-registering on every acquisition a no-op once it's already
/// there.
pub struct PageManager {
    buffer: Arc<BufferManager<RecordPage>>,
    fsl: Arc<FreeSpaceManager>,
}

impl PageManager {
    pub fn new(buffer: Arc<BufferManager<RecordPage>>, fsl: Arc<FreeSpaceManager>) -> Self {
        Self { buffer, fsl }
    }

    pub fn start(&self) -> Result<()> {
        self.buffer.start()?;
        self.fsl.start()
    }

    pub fn stop(&self) -> Result<()> {
        self.buffer.stop()?;
        self.fsl.stop()
    }

    pub fn page_size(&self) -> usize {
        self.buffer.page_size()
    }

    /// Writes back a page if it is resident, modified, and unpinned.
    pub fn flush_page(&self, page_id: PageId) -> Result<bool> {
        self.buffer.flush(page_id)
    }

    fn wire_fsl(&self, guard: &mut WritePageGuard<RecordPage>) {
        guard.add_observer(self.fsl.clone() as Arc<dyn PageObserver>);
    }

    pub fn get_page(&self, page_id: PageId) -> Result<ReadPageGuard<RecordPage>> {
        self.buffer.get_read(page_id)
    }

    /// Loads an existing page for write, registering the free-space manager
    /// as an observer. Safe to call on a page that's already wired (e.g. one
    /// that was never evicted since its last acquisition): `add_observer`
    /// de-duplicates by observer identity.
    pub fn get_page_mut(&self, page_id: PageId) -> Result<WritePageGuard<RecordPage>> {
        let mut guard = self.buffer.get_write(page_id)?;
        self.wire_fsl(&mut guard);
        Ok(guard)
    }

    /// Allocates a fresh page, registers the FSL, and notifies it once so an
    /// empty page immediately enters the free set.
    pub fn get_new_page(&self) -> Result<WritePageGuard<RecordPage>> {
        let mut guard = self.buffer.get_new()?;
        self.wire_fsl(&mut guard);
        guard.notify_observers();
        Ok(guard)
    }

    /// Consults the FSL for a page with room; falls back to a fresh page.
    pub fn get_free_or_new_page(&self, size_hint: usize) -> Result<WritePageGuard<RecordPage>> {
        let candidate = self.fsl.page_id(size_hint);
        if candidate.is_null() {
            self.get_new_page()
        } else {
            self.get_page_mut(candidate)
        }
    }
}
