use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::debug;

use crate::common::{CrioError, FrameId, PageId, Result, MIN_BUFFER_CAPACITY};
use crate::page::{self, NewPage, Page, PageObserver};
use crate::storage::StorageBackend;

use super::{FrameHeader, ReadPageGuard, Replacer, WritePageGuard};

struct State<P: Page> {
    frames: Vec<Option<Arc<FrameHeader<P>>>>,
    frame_table: HashMap<PageId, FrameId>,
    free_list: Vec<FrameId>,
}

/// In-memory page cache of fixed capacity (`>= 2`). Loads, evicts, and
/// flushes pages of a single concrete kind `P`, handing out RAII handles
/// that keep the page pinned against eviction for their lifetime.
///
/// The buffer manager registers itself as an observer on every resident
/// page; on notification it marks that page's frame modified. It is the
/// caller's responsibility (via the transaction manager) to flush the log
/// manager before flushing any page modified under a transaction — the WAL
/// ordering invariant is enforced by collaboration, not by this type.
pub struct BufferManager<P: Page + NewPage + 'static> {
    backend: Arc<dyn StorageBackend>,
    replacer: Arc<dyn Replacer>,
    state: Mutex<State<P>>,
}

impl<P: Page + NewPage + 'static> BufferManager<P> {
    pub fn new(
        capacity: usize,
        replacer: Arc<dyn Replacer>,
        backend: Arc<dyn StorageBackend>,
    ) -> Result<Arc<Self>> {
        if capacity < MIN_BUFFER_CAPACITY {
            return Err(CrioError::StateError(format!(
                "buffer_capacity {capacity} is below the minimum of {MIN_BUFFER_CAPACITY}"
            )));
        }
        let mut frames = Vec::with_capacity(capacity);
        let mut free_list = Vec::with_capacity(capacity);
        for i in 0..capacity {
            frames.push(None);
            free_list.push(FrameId::new(i as u32));
        }
        Ok(Arc::new(Self {
            backend,
            replacer,
            state: Mutex::new(State {
                frames,
                frame_table: HashMap::new(),
                free_list,
            }),
        }))
    }

    pub fn start(&self) -> Result<()> {
        self.backend.open()
    }

    pub fn page_size(&self) -> usize {
        self.backend.page_size()
    }

    pub fn stop(&self) -> Result<()> {
        self.flush_all()?;
        self.backend.close()
    }

    fn evict_one(&self, state: &mut State<P>) -> Result<FrameId> {
        let victim = self.replacer.victim();
        if victim.is_null() {
            return Err(CrioError::BufferFull);
        }
        let frame_id = *state
            .frame_table
            .get(&victim)
            .expect("replacer tracked a page the frame table does not have");
        let cell = state.frames[frame_id.as_usize()].clone().unwrap();
        if cell.is_modified() {
            let image = page::dump_page(&*cell.page.read())?;
            self.backend.write_page(victim, &image)?;
        }
        state.frames[frame_id.as_usize()] = None;
        state.frame_table.remove(&victim);
        self.replacer.forget(victim);
        debug!(page_id = %victim, "evicted page");
        Ok(frame_id)
    }

    fn acquire_frame(&self, state: &mut State<P>) -> Result<FrameId> {
        if let Some(frame_id) = state.free_list.pop() {
            return Ok(frame_id);
        }
        self.evict_one(state)
    }

    fn resident(self: &Arc<Self>, page_id: PageId) -> Result<Arc<FrameHeader<P>>> {
        let mut state = self.state.lock();
        if let Some(&frame_id) = state.frame_table.get(&page_id) {
            return Ok(state.frames[frame_id.as_usize()].clone().unwrap());
        }

        let frame_id = self.acquire_frame(&mut state)?;
        let bytes = match self.backend.read_page(page_id) {
            Ok(bytes) => bytes,
            Err(e) => {
                state.free_list.push(frame_id);
                return Err(e);
            }
        };
        let mut page = match page::load_typed_page::<P>(&bytes, page_id, self.backend.page_size()) {
            Ok(page) => page,
            Err(e) => {
                state.free_list.push(frame_id);
                return Err(e);
            }
        };
        page.add_observer(self.clone() as Arc<dyn PageObserver>);
        let frame = Arc::new(FrameHeader::new(frame_id, page_id, page));
        state.frames[frame_id.as_usize()] = Some(frame.clone());
        state.frame_table.insert(page_id, frame_id);
        self.replacer.track(page_id);
        Ok(frame)
    }

    /// Pins and returns a read handle.
    pub fn get_read(self: &Arc<Self>, page_id: PageId) -> Result<ReadPageGuard<P>> {
        let frame = self.resident(page_id)?;
        self.replacer.pin(page_id);
        let this = self.clone();
        Ok(unsafe {
            ReadPageGuard::new(
                page_id,
                frame,
                Box::new(move |pid| this.replacer.unpin(pid)),
            )
        })
    }

    /// Pins and returns a write handle.
    pub fn get_write(self: &Arc<Self>, page_id: PageId) -> Result<WritePageGuard<P>> {
        let frame = self.resident(page_id)?;
        self.replacer.pin(page_id);
        let this = self.clone();
        Ok(unsafe {
            WritePageGuard::new(
                page_id,
                frame,
                Box::new(move |pid| this.replacer.unpin(pid)),
            )
        })
    }

    /// Allocates a new page id from storage, materializes an empty page of
    /// kind `P`, and returns it pinned for write.
    pub fn get_new(self: &Arc<Self>) -> Result<WritePageGuard<P>> {
        let mut state = self.state.lock();
        let frame_id = self.acquire_frame(&mut state)?;
        let page_id = match self.backend.allocate() {
            Ok(page_id) => page_id,
            Err(e) => {
                state.free_list.push(frame_id);
                return Err(e);
            }
        };
        let mut page = P::new_empty(page_id, self.backend.page_size());
        page.add_observer(self.clone() as Arc<dyn PageObserver>);

        let frame = Arc::new(FrameHeader::new(frame_id, page_id, page));
        frame.set_modified(true);
        state.frames[frame_id.as_usize()] = Some(frame.clone());
        state.frame_table.insert(page_id, frame_id);
        drop(state);

        self.replacer.track(page_id);
        self.replacer.pin(page_id);
        let this = self.clone();
        Ok(unsafe {
            WritePageGuard::new(
                page_id,
                frame,
                Box::new(move |pid| this.replacer.unpin(pid)),
            )
        })
    }

    /// Writes back if resident, modified, and unpinned; returns whether it
    /// did I/O.
    pub fn flush(&self, page_id: PageId) -> Result<bool> {
        let frame = {
            let state = self.state.lock();
            match state.frame_table.get(&page_id) {
                Some(&frame_id) => state.frames[frame_id.as_usize()].clone().unwrap(),
                None => return Ok(false),
            }
        };
        if self.replacer.is_pinned(page_id) || !frame.is_modified() {
            return Ok(false);
        }
        let image = page::dump_page(&*frame.page.read())?;
        self.backend.write_page(page_id, &image)?;
        frame.set_modified(false);
        Ok(true)
    }

    /// Flushes every modified, unpinned resident page.
    pub fn flush_all(&self) -> Result<()> {
        let page_ids: Vec<PageId> = {
            let state = self.state.lock();
            state.frame_table.keys().copied().collect()
        };
        for page_id in page_ids {
            self.flush(page_id)?;
        }
        Ok(())
    }
}

impl<P: Page + NewPage + 'static> PageObserver for BufferManager<P> {
    fn on_mutate(&self, page_id: PageId, _free_space_insert: usize) {
        let state = self.state.lock();
        if let Some(&frame_id) = state.frame_table.get(&page_id) {
            if let Some(frame) = &state.frames[frame_id.as_usize()] {
                frame.set_modified(true);
            }
        }
    }
}
