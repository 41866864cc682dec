use std::sync::Arc;

use crate::codec::Span;
use crate::common::{PageId, PageTypeId, Result};

/// Distinguishes the two space-accounting queries a page answers: an insert
/// must also account for one more slot-directory entry than an update does.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Insert,
    Update,
}

/// Notified once, after a mutating page operation leaves the page in a
/// consistent state. A simple trait object stands in for the "enum of
/// observer kinds" described for the core: one channel per page.
pub trait PageObserver: Send + Sync {
    fn on_mutate(&self, page_id: PageId, free_space_insert: usize);
}

/// The shared contract every concrete page kind (record, log, free-space
/// list) satisfies. `size()` is constant for a page's lifetime;
/// `free_space(Insert) <= free_space(Update)` always holds.
pub trait Page: Send + Sync {
    fn type_id(&self) -> PageTypeId;
    fn id(&self) -> PageId;
    fn set_id(&mut self, id: PageId);
    fn size(&self) -> usize;
    fn free_space(&self, op: Operation) -> usize;

    fn load_body(&mut self, span: &mut Span) -> Result<()>;
    fn dump_body(&self, span: &mut Span) -> Result<()>;

    fn add_observer(&mut self, observer: Arc<dyn PageObserver>);
    fn notify_observers(&self);
}

/// Constructs an empty page of a concrete kind for a given id and page size.
/// Kept separate from [`Page`] so that [`Page`] itself stays object-safe.
pub trait NewPage: Page {
    fn new_empty(id: PageId, page_size: usize) -> Self;
}
