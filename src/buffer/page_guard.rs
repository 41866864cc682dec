use std::ops::{Deref, DerefMut};
use std::sync::Arc;

use parking_lot::{RwLockReadGuard, RwLockWriteGuard};

use crate::common::PageId;
use crate::page::Page;

use super::FrameHeader;

type ReleaseCallback = Box<dyn FnOnce(PageId) + Send + Sync>;

/// RAII guard for read-only access to a resident page. Pins on
/// construction; unpins on drop. Dereferences to the underlying [`Page`],
/// per the core's page-handle contract.
pub struct ReadPageGuard<P: Page + 'static> {
    page_id: PageId,
    _frame: Arc<FrameHeader<P>>,
    release: Option<ReleaseCallback>,
    guard: RwLockReadGuard<'static, P>,
}

impl<P: Page + 'static> ReadPageGuard<P> {
    /// # Safety
    /// The caller must ensure `frame` outlives this guard; the buffer
    /// manager upholds this by keeping the `Arc<FrameHeader<P>>` reachable
    /// from its frame table for as long as any guard referencing it exists.
    pub(crate) unsafe fn new(
        page_id: PageId,
        frame: Arc<FrameHeader<P>>,
        release: ReleaseCallback,
    ) -> Self {
        let guard = frame.page.read();
        let guard: RwLockReadGuard<'static, P> = std::mem::transmute(guard);
        Self {
            page_id,
            _frame: frame,
            release: Some(release),
            guard,
        }
    }

    pub fn page_id(&self) -> PageId {
        self.page_id
    }
}

impl<P: Page + 'static> Deref for ReadPageGuard<P> {
    type Target = P;

    fn deref(&self) -> &P {
        &self.guard
    }
}

impl<P: Page + 'static> Drop for ReadPageGuard<P> {
    fn drop(&mut self) {
        if let Some(release) = self.release.take() {
            release(self.page_id);
        }
    }
}

/// RAII guard for read-write access. Any mutating method called through
/// `DerefMut` notifies the page's observers synchronously, which is how the
/// buffer manager learns to mark the frame modified (see
/// [`crate::buffer::BufferManager`]).
pub struct WritePageGuard<P: Page + 'static> {
    page_id: PageId,
    _frame: Arc<FrameHeader<P>>,
    release: Option<ReleaseCallback>,
    guard: Option<RwLockWriteGuard<'static, P>>,
}

impl<P: Page + 'static> WritePageGuard<P> {
    /// # Safety
    /// Same obligation as [`ReadPageGuard::new`].
    pub(crate) unsafe fn new(
        page_id: PageId,
        frame: Arc<FrameHeader<P>>,
        release: ReleaseCallback,
    ) -> Self {
        let guard = frame.page.write();
        let guard: RwLockWriteGuard<'static, P> = std::mem::transmute(guard);
        Self {
            page_id,
            _frame: frame,
            release: Some(release),
            guard: Some(guard),
        }
    }

    pub fn page_id(&self) -> PageId {
        self.page_id
    }
}

impl<P: Page + 'static> Deref for WritePageGuard<P> {
    type Target = P;

    fn deref(&self) -> &P {
        self.guard.as_ref().unwrap()
    }
}

impl<P: Page + 'static> DerefMut for WritePageGuard<P> {
    fn deref_mut(&mut self) -> &mut P {
        self.guard.as_mut().unwrap()
    }
}

impl<P: Page + 'static> Drop for WritePageGuard<P> {
    fn drop(&mut self) {
        self.guard.take();
        if let Some(release) = self.release.take() {
            release(self.page_id);
        }
    }
}
