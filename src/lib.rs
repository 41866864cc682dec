//! Crio - an embeddable, single-node ACID storage engine.
//!
//! A paged backing store, a buffer manager, slotted record pages, a
//! free-space list, a write-ahead log, and a transaction manager compose
//! into a storage core an embedder can drive directly: begin a transaction,
//! insert/read/update/delete records through it, commit or abort, and
//! recover after a crash by replaying the log.
//!
//! # Architecture
//!
//! - **`storage`**: raw page I/O (`StorageBackend`, `FileBackend`,
//!   `MemoryBackend`).
//! - **`page`**: page framing and concrete page kinds (`RecordPage`,
//!   `LogPage`, `FslPage`) behind the object-safe `Page` trait.
//! - **`buffer`**: `BufferManager<P>`, an LRU-backed cache of pinned pages
//!   behind `ReadPageGuard`/`WritePageGuard`.
//! - **`fsl`**: `FreeSpaceManager`, tracking which data pages have room.
//! - **`page_manager`**: `PageManager`, composing the buffer manager and the
//!   free-space manager into a single page-acquisition surface.
//! - **`wal`**: `LogManager`, an append-only chain of `LogRecord`s.
//! - **`txn`**: `Transaction` and `TransactionManager`, the commit/abort/
//!   recover state machine.
//! - **`record`**: `RecordAccessor`, multi-page record chaining on top of
//!   `PageManager` and `TransactionManager`.
//! - **`connstring`**: parses the `<scheme>://<host>/<path>?<k>=<v>`
//!   connection strings embedders pass to open a database.
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use crio::buffer::{BufferManager, LruReplacer, Replacer};
//! use crio::fsl::FreeSpaceManager;
//! use crio::page_manager::PageManager;
//! use crio::record::RecordAccessor;
//! use crio::storage::MemoryBackend;
//! use crio::txn::TransactionManager;
//! use crio::wal::LogManager;
//!
//! let page_size = 4096;
//! let data_backend = Arc::new(MemoryBackend::new(page_size));
//! let fsl_backend = Arc::new(MemoryBackend::new(page_size));
//! let log_backend = Arc::new(MemoryBackend::new(page_size));
//!
//! let replacer: Arc<dyn Replacer> = Arc::new(LruReplacer::new());
//! let buffer = BufferManager::new(64, replacer, data_backend).unwrap();
//! let fsl = Arc::new(FreeSpaceManager::new(fsl_backend, page_size));
//! let page_manager = Arc::new(PageManager::new(buffer, fsl));
//! page_manager.start().unwrap();
//!
//! let log_manager = LogManager::new(log_backend, 8).unwrap();
//! log_manager.start().unwrap();
//! let txn_manager = Arc::new(TransactionManager::new(log_manager, page_manager.clone()));
//!
//! let records = RecordAccessor::new(page_manager, txn_manager.clone());
//!
//! let txn = txn_manager.begin().unwrap();
//! let head = records.insert(&txn, b"hello, world").unwrap();
//! assert_eq!(records.read(head).unwrap(), b"hello, world");
//! txn_manager.commit(&txn).unwrap();
//! ```

pub mod buffer;
pub mod codec;
pub mod common;
pub mod connstring;
pub mod fsl;
pub mod page;
pub mod page_manager;
pub mod record;
pub mod storage;
pub mod txn;
pub mod wal;

pub use common::{CrioError, EngineConfig, PageId, RecordId, Result, SlotId, TxnId};
