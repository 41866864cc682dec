use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;

use crate::common::{CrioError, PageId, Result};

use super::{StorageBackend, FILE_HEADER_SIZE, FORMAT_VERSION};

/// Single-file paged backend. Page `i` (1-based) occupies bytes
/// `[FILE_HEADER_SIZE + (i-1)*page_size, FILE_HEADER_SIZE + i*page_size)`.
pub struct FileBackend {
    path: PathBuf,
    page_size: usize,
    file: Mutex<Option<File>>,
    page_count: AtomicU64,
}

impl FileBackend {
    pub fn new(path: impl AsRef<Path>, page_size: usize) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            page_size,
            file: Mutex::new(None),
            page_count: AtomicU64::new(0),
        }
    }

    fn offset_of(&self, page_id: PageId) -> u64 {
        FILE_HEADER_SIZE as u64 + (page_id.as_u64() - 1) * self.page_size as u64
    }

    fn write_header(file: &mut File, page_size: usize) -> Result<()> {
        let mut header = [0u8; FILE_HEADER_SIZE];
        header[0..8].copy_from_slice(&(page_size as u64).to_le_bytes());
        header[8..12].copy_from_slice(&FORMAT_VERSION.to_le_bytes());
        file.seek(SeekFrom::Start(0))?;
        file.write_all(&header)?;
        Ok(())
    }

    fn read_header(file: &mut File) -> Result<(usize, u32)> {
        let mut header = [0u8; FILE_HEADER_SIZE];
        file.seek(SeekFrom::Start(0))?;
        file.read_exact(&mut header)?;
        let page_size = u64::from_le_bytes(header[0..8].try_into().unwrap()) as usize;
        let version = u32::from_le_bytes(header[8..12].try_into().unwrap());
        Ok((page_size, version))
    }
}

impl StorageBackend for FileBackend {
    fn open(&self) -> Result<()> {
        let mut guard = self.file.lock();
        if guard.is_some() {
            return Ok(());
        }
        let is_new = !self.path.exists();
        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .open(&self.path)?;

        if is_new {
            Self::write_header(&mut file, self.page_size)?;
            self.page_count.store(0, Ordering::Release);
        } else {
            let (on_disk_page_size, _version) = Self::read_header(&mut file)?;
            if on_disk_page_size != self.page_size {
                return Err(CrioError::StateError(format!(
                    "file page_size {} does not match configured page_size {}",
                    on_disk_page_size, self.page_size
                )));
            }
            let len = file.metadata()?.len();
            let body_len = len.saturating_sub(FILE_HEADER_SIZE as u64);
            let count = body_len / self.page_size as u64;
            self.page_count.store(count, Ordering::Release);
        }

        *guard = Some(file);
        Ok(())
    }

    fn close(&self) -> Result<()> {
        let mut guard = self.file.lock();
        if let Some(file) = guard.as_mut() {
            file.sync_all()?;
        }
        *guard = None;
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.file.lock().is_some()
    }

    fn remove(&self) -> Result<()> {
        if self.path.exists() {
            std::fs::remove_file(&self.path)?;
        }
        Ok(())
    }

    fn page_size(&self) -> usize {
        self.page_size
    }

    fn page_count(&self) -> u64 {
        self.page_count.load(Ordering::Acquire)
    }

    fn allocate(&self) -> Result<PageId> {
        let mut guard = self.file.lock();
        let file = guard
            .as_mut()
            .ok_or_else(|| CrioError::StateError("backend is not open".into()))?;
        let next = self.page_count.fetch_add(1, Ordering::AcqRel) + 1;
        let end = FILE_HEADER_SIZE as u64 + next * self.page_size as u64;
        file.set_len(end)?;
        Ok(PageId::new(next))
    }

    fn read_page(&self, page_id: PageId) -> Result<Vec<u8>> {
        let mut guard = self.file.lock();
        let file = guard
            .as_mut()
            .ok_or_else(|| CrioError::StateError("backend is not open".into()))?;
        if page_id.as_u64() == 0 || page_id.as_u64() > self.page_count.load(Ordering::Acquire) {
            return Err(CrioError::PageNotFound(page_id));
        }
        let mut buf = vec![0u8; self.page_size];
        file.seek(SeekFrom::Start(self.offset_of(page_id)))?;
        file.read_exact(&mut buf)?;
        Ok(buf)
    }

    fn write_page(&self, page_id: PageId, image: &[u8]) -> Result<()> {
        debug_assert_eq!(image.len(), self.page_size);
        let mut guard = self.file.lock();
        let file = guard
            .as_mut()
            .ok_or_else(|| CrioError::StateError("backend is not open".into()))?;
        file.seek(SeekFrom::Start(self.offset_of(page_id)))?;
        file.write_all(image)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allocate_read_write_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let backend = FileBackend::new(dir.path().join("data.db"), 512);
        backend.open().unwrap();

        let id = backend.allocate().unwrap();
        assert_eq!(id, PageId::new(1));

        let mut image = vec![0u8; 512];
        image[0] = 7;
        backend.write_page(id, &image).unwrap();

        let read_back = backend.read_page(id).unwrap();
        assert_eq!(read_back[0], 7);
    }

    #[test]
    fn reopen_recovers_page_count() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data.db");
        {
            let backend = FileBackend::new(&path, 512);
            backend.open().unwrap();
            backend.allocate().unwrap();
            backend.allocate().unwrap();
            backend.close().unwrap();
        }
        let backend = FileBackend::new(&path, 512);
        backend.open().unwrap();
        assert_eq!(backend.page_count(), 2);
    }

    #[test]
    fn read_beyond_page_count_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let backend = FileBackend::new(dir.path().join("data.db"), 512);
        backend.open().unwrap();
        assert!(matches!(
            backend.read_page(PageId::new(1)),
            Err(CrioError::PageNotFound(_))
        ));
    }
}
