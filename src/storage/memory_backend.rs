use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use parking_lot::Mutex;

use crate::common::{CrioError, PageId, Result};

use super::StorageBackend;

/// Per-instance in-memory store, keyed by page id.
pub struct MemoryBackend {
    page_size: usize,
    pages: Mutex<HashMap<PageId, Vec<u8>>>,
    page_count: AtomicU64,
    open: AtomicBool,
}

impl MemoryBackend {
    pub fn new(page_size: usize) -> Self {
        Self {
            page_size,
            pages: Mutex::new(HashMap::new()),
            page_count: AtomicU64::new(0),
            open: AtomicBool::new(false),
        }
    }
}

impl StorageBackend for MemoryBackend {
    fn open(&self) -> Result<()> {
        self.open.store(true, Ordering::Release);
        Ok(())
    }

    fn close(&self) -> Result<()> {
        self.open.store(false, Ordering::Release);
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.open.load(Ordering::Acquire)
    }

    fn remove(&self) -> Result<()> {
        self.pages.lock().clear();
        self.page_count.store(0, Ordering::Release);
        Ok(())
    }

    fn page_size(&self) -> usize {
        self.page_size
    }

    fn page_count(&self) -> u64 {
        self.page_count.load(Ordering::Acquire)
    }

    fn allocate(&self) -> Result<PageId> {
        let next = self.page_count.fetch_add(1, Ordering::AcqRel) + 1;
        Ok(PageId::new(next))
    }

    fn read_page(&self, page_id: PageId) -> Result<Vec<u8>> {
        if page_id.as_u64() == 0 || page_id.as_u64() > self.page_count.load(Ordering::Acquire) {
            return Err(CrioError::PageNotFound(page_id));
        }
        let pages = self.pages.lock();
        match pages.get(&page_id) {
            Some(bytes) => Ok(bytes.clone()),
            None => Ok(vec![0u8; self.page_size]),
        }
    }

    fn write_page(&self, page_id: PageId, image: &[u8]) -> Result<()> {
        debug_assert_eq!(image.len(), self.page_size);
        self.pages.lock().insert(page_id, image.to_vec());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unwritten_page_reads_as_zeroed() {
        let backend = MemoryBackend::new(512);
        backend.open().unwrap();
        let id = backend.allocate().unwrap();
        let bytes = backend.read_page(id).unwrap();
        assert!(bytes.iter().all(|&b| b == 0));
    }

    #[test]
    fn write_then_read_round_trips() {
        let backend = MemoryBackend::new(512);
        backend.open().unwrap();
        let id = backend.allocate().unwrap();
        let mut image = vec![0u8; 512];
        image[10] = 99;
        backend.write_page(id, &image).unwrap();
        assert_eq!(backend.read_page(id).unwrap()[10], 99);
    }
}
