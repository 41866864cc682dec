mod factory;
mod fsl_page;
mod log_page;
mod page_slot;
mod page_trait;
mod record_page;

pub use factory::{PageRegistry, dump_page, load_page, load_typed_page};
pub use fsl_page::FslPage;
pub use log_page::LogPage;
pub use page_slot::PageSlot;
pub use page_trait::{NewPage, Operation, Page, PageObserver};
pub use record_page::RecordPage;

/// Bytes consumed by the type-tagged frame around every page body:
/// `type_id(u8) + checksum(u64)`.
pub const PAGE_FRAME_HEADER_SIZE: usize = 1 + 8;
