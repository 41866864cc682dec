use std::sync::Arc;

use parking_lot::Mutex;
use tracing::debug;

use crate::common::{PageId, Result};
use crate::page::{self, NewPage, Operation, Page, PageObserver};
use crate::storage::StorageBackend;

use super::FslPage;

struct State {
    pages: Vec<FslPage>,
}

/// Tracks which data pages have insertable room, partitioned across a
/// forward-linked chain of [`FslPage`]s covering disjoint `PageId` ranges.
/// The reference behavior reads the whole list on `start` and writes it back
/// whole on `stop`; it does not keep a warm per-page buffer manager.
pub struct FreeSpaceManager {
    backend: Arc<dyn StorageBackend>,
    page_size: usize,
    state: Mutex<State>,
}

impl FreeSpaceManager {
    pub fn new(backend: Arc<dyn StorageBackend>, page_size: usize) -> Self {
        Self {
            backend,
            page_size,
            state: Mutex::new(State { pages: Vec::new() }),
        }
    }

    fn capacity_per_page(&self) -> u64 {
        FslPage::new_empty(PageId::new(1), self.page_size).capacity() as u64
    }

    pub fn start(&self) -> Result<()> {
        self.backend.open()?;
        let mut state = self.state.lock();
        let count = self.backend.page_count();

        if count == 0 {
            let id = self.backend.allocate()?;
            let mut first = FslPage::new_empty(id, self.page_size);
            let max = self.capacity_per_page();
            first.set_range(PageId::new(1), PageId::new(max));
            state.pages.push(first);
        } else {
            for i in 1..=count {
                let bytes = self.backend.read_page(PageId::new(i))?;
                let fsl_page = page::load_typed_page::<FslPage>(&bytes, PageId::new(i), self.page_size)?;
                state.pages.push(fsl_page);
            }
        }
        Ok(())
    }

    pub fn stop(&self) -> Result<()> {
        let state = self.state.lock();
        for fsl_page in &state.pages {
            let image = page::dump_page(fsl_page)?;
            self.backend.write_page(fsl_page.id(), &image)?;
        }
        drop(state);
        self.backend.close()
    }

    /// Finds (extending the chain if necessary) the index of the FSL page
    /// whose declared range covers `page_id`.
    fn index_for(&self, state: &mut State, page_id: PageId) -> Result<usize> {
        loop {
            if let Some(idx) = state.pages.iter().position(|p| {
                let (min, max) = p.range();
                page_id.as_u64() >= min.as_u64() && page_id.as_u64() <= max.as_u64()
            }) {
                return Ok(idx);
            }

            let last = state.pages.last().expect("fsl always holds at least one page");
            let (_, last_max) = last.range();
            let last_id = last.id();

            let new_id = self.backend.allocate()?;
            let new_min = last_max.as_u64() + 1;
            let new_max = new_min + self.capacity_per_page() - 1;
            let mut new_page = FslPage::new_empty(new_id, self.page_size);
            new_page.set_range(PageId::new(new_min), PageId::new(new_max));
            new_page.set_prev_page_id(last_id);

            state.pages.last_mut().unwrap().set_next_page_id(new_id);
            state.pages.push(new_page);
        }
    }

    /// Observer entry point: a page with insertable room enters the free
    /// set; a full page leaves it.
    pub fn manage(&self, page_id: PageId, free_space_insert: usize) {
        let mut state = self.state.lock();
        let idx = match self.index_for(&mut state, page_id) {
            Ok(idx) => idx,
            Err(e) => {
                debug!(error = %e, %page_id, "fsl failed to extend its range");
                return;
            }
        };
        if free_space_insert > 0 {
            state.pages[idx].insert(page_id);
        } else {
            state.pages[idx].erase(page_id);
        }
    }

    /// Returns a page id with room, ignoring `size_hint` beyond "nonzero" per
    /// the reference's coarse-grained tracking; `PageId::NULL` if none.
    pub fn page_id(&self, _size_hint: usize) -> PageId {
        let state = self.state.lock();
        state
            .pages
            .iter()
            .filter_map(|p| p.largest())
            .max()
            .unwrap_or(PageId::NULL)
    }
}

impl PageObserver for FreeSpaceManager {
    fn on_mutate(&self, page_id: PageId, free_space_insert: usize) {
        self.manage(page_id, free_space_insert);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryBackend;

    #[test]
    fn tracks_and_untracks_pages_by_free_space() {
        let backend: Arc<dyn StorageBackend> = Arc::new(MemoryBackend::new(512));
        let fsl = FreeSpaceManager::new(backend, 512);
        fsl.start().unwrap();

        fsl.manage(PageId::new(7), 100);
        assert_eq!(fsl.page_id(1), PageId::new(7));

        fsl.manage(PageId::new(7), 0);
        assert_eq!(fsl.page_id(1), PageId::NULL);
    }

    #[test]
    fn extends_the_chain_past_a_single_page_capacity() {
        let backend: Arc<dyn StorageBackend> = Arc::new(MemoryBackend::new(512));
        let fsl = FreeSpaceManager::new(backend, 512);
        fsl.start().unwrap();

        let far = fsl.capacity_per_page() * 2;
        fsl.manage(PageId::new(far), 10);
        assert_eq!(fsl.page_id(1), PageId::new(far));
    }
}
