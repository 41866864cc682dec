use thiserror::Error;

use super::types::{PageId, RecordId, SlotId};

/// The error taxonomy named by kind rather than by exception class: every
/// fallible operation in the core returns one of these variants.
#[derive(Error, Debug)]
pub enum CrioError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// An input byte range was too small or structurally invalid.
    #[error("parse error: {0}")]
    ParseError(String),

    /// Checksum mismatch or an internal consistency violation.
    #[error("corrupt: {0}")]
    CorruptError(String),

    #[error("page {0} not found")]
    PageNotFound(PageId),

    #[error("slot {0} not found in page {1}")]
    SlotNotFound(SlotId, PageId),

    #[error("free-space-list has no entry for page {0}")]
    FslEntryNotFound(PageId),

    #[error("record {0} not found")]
    RecordNotFound(RecordId),

    /// A page cannot accept the requested insert/update.
    #[error("insufficient space: need {needed} bytes, have {available}")]
    InsufficientSpace { needed: usize, available: usize },

    /// All frames are pinned; no victim is available.
    #[error("buffer pool is full, no evictable frames available")]
    BufferFull,

    /// An operation was invoked on a component in an incompatible state.
    #[error("invalid state: {0}")]
    StateError(String),

    #[error("unknown page type {0}")]
    UnknownPageType(u8),
}

pub type Result<T> = std::result::Result<T, CrioError>;
