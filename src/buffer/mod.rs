mod buffer_manager;
mod frame_header;
mod page_guard;
mod replacer;

pub use buffer_manager::BufferManager;
pub use frame_header::FrameHeader;
pub use page_guard::{ReadPageGuard, WritePageGuard};
pub use replacer::{LruReplacer, Replacer};
