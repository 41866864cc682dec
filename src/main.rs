use std::sync::Arc;

use crio::buffer::{BufferManager, LruReplacer, Replacer};
use crio::common::EngineConfig;
use crio::fsl::FreeSpaceManager;
use crio::page_manager::PageManager;
use crio::record::RecordAccessor;
use crio::storage::FileBackend;
use crio::txn::TransactionManager;
use crio::wal::LogManager;

fn main() -> crio::Result<()> {
    tracing_subscriber::fmt::init();

    let config = EngineConfig::default();
    config.validate()?;

    let db_path = "demo.db";
    let fsl_path = "demo.db.fsl";
    let log_path = "demo.db.log";

    let data_backend = Arc::new(FileBackend::new(db_path, config.page_size));
    let buffer = BufferManager::new(config.buffer_capacity, lru(), data_backend)?;
    let fsl_backend = Arc::new(FileBackend::new(fsl_path, config.page_size));
    let fsl = Arc::new(FreeSpaceManager::new(fsl_backend, config.page_size));
    let page_manager = Arc::new(PageManager::new(buffer, fsl));
    page_manager.start()?;

    let log_backend = Arc::new(FileBackend::new(log_path, config.page_size));
    let log_manager = LogManager::new(log_backend, config.log_buffer_capacity)?;
    log_manager.start()?;

    let txn_manager = Arc::new(TransactionManager::new(log_manager.clone(), page_manager.clone()));
    let records = RecordAccessor::new(page_manager.clone(), txn_manager.clone());

    let txn = txn_manager.begin()?;
    let head = records.insert(&txn, b"hello, world")?;
    txn_manager.commit(&txn)?;

    let txn = txn_manager.begin()?;
    let payload = records.read(head)?;
    println!("read back: {}", String::from_utf8_lossy(&payload));
    txn_manager.commit(&txn)?;

    page_manager.stop()?;
    log_manager.stop()?;
    std::fs::remove_file(db_path).ok();
    std::fs::remove_file(fsl_path).ok();
    std::fs::remove_file(log_path).ok();
    Ok(())
}

fn lru() -> Arc<dyn Replacer> {
    Arc::new(LruReplacer::new())
}
