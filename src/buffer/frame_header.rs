use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::RwLock;

use crate::common::{FrameId, PageId};
use crate::page::Page;

/// A single buffer frame: the resident page plus a dirty flag set by the
/// observer callback. `is_modified` lives outside the page's own lock so
/// that a mutating call on a pinned, write-locked page (which notifies
/// observers synchronously) never has to re-enter that lock.
pub struct FrameHeader<P: Page> {
    frame_id: FrameId,
    page_id: PageId,
    is_modified: AtomicBool,
    pub(crate) page: RwLock<P>,
}

impl<P: Page> FrameHeader<P> {
    pub(crate) fn new(frame_id: FrameId, page_id: PageId, page: P) -> Self {
        Self {
            frame_id,
            page_id,
            is_modified: AtomicBool::new(false),
            page: RwLock::new(page),
        }
    }

    pub fn frame_id(&self) -> FrameId {
        self.frame_id
    }

    pub fn page_id(&self) -> PageId {
        self.page_id
    }

    pub fn is_modified(&self) -> bool {
        self.is_modified.load(Ordering::Acquire)
    }

    pub(crate) fn set_modified(&self, modified: bool) {
        self.is_modified.store(modified, Ordering::Release);
    }
}
