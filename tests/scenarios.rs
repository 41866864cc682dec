use std::sync::Arc;

use crio::buffer::{BufferManager, LruReplacer, Replacer};
use crio::common::{CrioError, PageId, RecordId, SlotId};
use crio::fsl::FreeSpaceManager;
use crio::page::{Operation, Page, PageSlot};
use crio::page_manager::PageManager;
use crio::record::RecordAccessor;
use crio::storage::MemoryBackend;
use crio::txn::TransactionManager;
use crio::wal::{LogManager, LogRecordBody};

struct Harness {
    page_manager: Arc<PageManager>,
    log_manager: Arc<LogManager>,
    txn_manager: Arc<TransactionManager>,
    records: RecordAccessor,
}

fn setup(page_size: usize, buffer_capacity: usize) -> Harness {
    let data_backend = Arc::new(MemoryBackend::new(page_size));
    let fsl_backend = Arc::new(MemoryBackend::new(page_size));
    let log_backend = Arc::new(MemoryBackend::new(page_size));

    let replacer: Arc<dyn Replacer> = Arc::new(LruReplacer::new());
    let buffer = BufferManager::new(buffer_capacity, replacer, data_backend).unwrap();
    let fsl = Arc::new(FreeSpaceManager::new(fsl_backend, page_size));
    let page_manager = Arc::new(PageManager::new(buffer, fsl));
    page_manager.start().unwrap();

    let log_manager = LogManager::new(log_backend, buffer_capacity.max(2)).unwrap();
    log_manager.start().unwrap();

    let txn_manager = Arc::new(TransactionManager::new(log_manager.clone(), page_manager.clone()));
    let records = RecordAccessor::new(page_manager.clone(), txn_manager.clone());

    Harness {
        page_manager,
        log_manager,
        txn_manager,
        records,
    }
}

/// S1 — insert, commit, read. The log holds BEGIN, INSERT, COMMIT, DONE in
/// order with consecutive sequence numbers starting at 1.
#[test]
fn insert_commit_read() {
    let h = setup(512, 2);

    let txn = h.txn_manager.begin().unwrap();
    let head = h.records.insert(&txn, b"testing").unwrap();
    assert_eq!(head, RecordId::new(PageId::new(1), SlotId::new(1)));
    h.txn_manager.commit(&txn).unwrap();

    assert_eq!(h.records.read(head).unwrap(), b"testing");

    let log = h.log_manager.replay_all().unwrap();
    assert_eq!(log.len(), 4);
    assert!(matches!(log[0].body, LogRecordBody::Begin));
    assert!(matches!(log[1].body, LogRecordBody::Insert(_)));
    assert!(matches!(log[2].body, LogRecordBody::Commit));
    assert!(matches!(log[3].body, LogRecordBody::Done));
    for (i, record) in log.iter().enumerate() {
        assert_eq!(record.seq_number.0, (i + 1) as u64);
    }
}

/// S2 — abort rolls back an insert, leaving a compensating DELETE in the log.
#[test]
fn abort_rolls_back_insert() {
    let h = setup(512, 2);

    let txn = h.txn_manager.begin().unwrap();
    let head = h.records.insert(&txn, b"x").unwrap();
    h.txn_manager.abort(&txn).unwrap();

    assert!(matches!(h.records.read(head), Err(CrioError::SlotNotFound(_, _))));

    let log = h.log_manager.replay_all().unwrap();
    assert_eq!(log.len(), 4);
    assert!(matches!(log[0].body, LogRecordBody::Begin));
    assert!(matches!(log[1].body, LogRecordBody::Insert(_)));
    assert!(matches!(log[2].body, LogRecordBody::Delete(_)));
    assert!(matches!(log[3].body, LogRecordBody::Abort));
}

/// S3 — page eviction under LRU. With buffer_capacity = 2, fetching a third
/// page evicts the least recently used one; reloading it returns the same
/// bytes it was written with.
#[test]
fn lru_eviction_round_trips_through_storage() {
    let h = setup(512, 2);

    let mut page_ids = Vec::new();
    for i in 0..3u8 {
        let mut page = h.page_manager.get_new_page().unwrap();
        let slot_id = page.insert(&PageSlot::new(vec![i; 32])).unwrap();
        assert_eq!(slot_id, SlotId::new(1));
        page_ids.push(page.id());
    }

    for &page_id in &page_ids {
        let _ = h.page_manager.get_page(page_id).unwrap();
    }

    let reloaded = h.page_manager.get_page(page_ids[0]).unwrap();
    assert_eq!(reloaded.get(SlotId::new(1)).unwrap().payload, vec![0u8; 32]);
}

/// S4 — a payload spanning more than one page is chained across exactly
/// three slots and reassembles byte-for-byte.
#[test]
fn multi_page_record_chains_and_reassembles() {
    let h = setup(512, 8);
    let txn = h.txn_manager.begin().unwrap();

    let payload = vec![0xABu8; 2 * 512 + 100];
    let head = h.records.insert(&txn, &payload).unwrap();
    h.txn_manager.commit(&txn).unwrap();

    assert_eq!(h.records.read(head).unwrap(), payload);

    let mut chunk_count = 0;
    let mut current = head;
    while !current.is_null() {
        let page = h.page_manager.get_page(current.page_id).unwrap();
        let slot = page.get(current.slot_id).unwrap();
        chunk_count += 1;
        current = slot.next;
    }
    assert_eq!(chunk_count, 3);
}

/// S5 — a transaction whose log reaches COMMIT/DONE before its data pages
/// are flushed survives a crash: recovery against a fresh buffer over the
/// same (durable) backends redoes it from the log.
#[test]
fn wal_protects_against_a_crash_before_data_flush() {
    let page_size = 512;
    let data_backend = Arc::new(MemoryBackend::new(page_size));
    let fsl_backend = Arc::new(MemoryBackend::new(page_size));
    let log_backend = Arc::new(MemoryBackend::new(page_size));

    let head;
    {
        let replacer: Arc<dyn Replacer> = Arc::new(LruReplacer::new());
        let buffer = BufferManager::new(4, replacer, data_backend.clone()).unwrap();
        let fsl = Arc::new(FreeSpaceManager::new(fsl_backend.clone(), page_size));
        let page_manager = Arc::new(PageManager::new(buffer, fsl));
        page_manager.start().unwrap();

        let log_manager = LogManager::new(log_backend.clone(), 4).unwrap();
        log_manager.start().unwrap();

        let txn_manager = Arc::new(TransactionManager::new(log_manager.clone(), page_manager.clone()));
        let records = RecordAccessor::new(page_manager.clone(), txn_manager.clone());

        let txn = txn_manager.begin().unwrap();
        head = records.insert(&txn, b"durable").unwrap();

        // Replicate commit's log-then-data ordering but stop after the log
        // side, modeling a crash before the staged data page is flushed.
        log_manager
            .add(txn.last_log_location().1, txn.txn_id(), RecordId::NULL, LogRecordBody::Commit)
            .unwrap();
        log_manager
            .add(txn.last_log_location().1, txn.txn_id(), RecordId::NULL, LogRecordBody::Done)
            .unwrap();
        log_manager.flush().unwrap();
        // page_manager and its buffer are dropped here without flushing.
    }

    let replacer: Arc<dyn Replacer> = Arc::new(LruReplacer::new());
    let buffer = BufferManager::new(4, replacer, data_backend).unwrap();
    let fsl = Arc::new(FreeSpaceManager::new(fsl_backend, page_size));
    let page_manager = Arc::new(PageManager::new(buffer, fsl));
    page_manager.start().unwrap();

    let log_manager = LogManager::new(log_backend, 4).unwrap();
    log_manager.start().unwrap();

    let txn_manager = Arc::new(TransactionManager::new(log_manager, page_manager.clone()));
    txn_manager.recover().unwrap();

    let records = RecordAccessor::new(page_manager, txn_manager);
    assert_eq!(records.read(head).unwrap(), b"durable");
}

/// S6 — free-space management: a full page drops out of the FSL and a new
/// insert moves to the next page; deleting room on the full page brings it
/// back.
#[test]
fn free_space_list_tracks_room_across_inserts_and_deletes() {
    let page_size = 512;
    let data_backend = Arc::new(MemoryBackend::new(page_size));
    let fsl_backend = Arc::new(MemoryBackend::new(page_size));
    let fsl = Arc::new(FreeSpaceManager::new(fsl_backend, page_size));

    let replacer: Arc<dyn Replacer> = Arc::new(LruReplacer::new());
    let buffer = BufferManager::new(4, replacer, data_backend).unwrap();
    let page_manager = Arc::new(PageManager::new(buffer, fsl.clone()));
    page_manager.start().unwrap();

    let page = page_manager.get_new_page().unwrap();
    assert_eq!(page.id(), PageId::new(1));
    drop(page);

    let mut slot_ids = Vec::new();
    loop {
        let mut page = page_manager.get_page_mut(PageId::new(1)).unwrap();
        if page.free_space(Operation::Insert) == 0 {
            break;
        }
        match page.insert(&PageSlot::new(vec![1u8; 64])) {
            Ok(slot_id) => slot_ids.push(slot_id),
            Err(_) => break,
        }
    }

    assert_eq!(
        page_manager
            .get_page(PageId::new(1))
            .unwrap()
            .free_space(Operation::Insert),
        0
    );
    assert_eq!(fsl.page_id(1), PageId::NULL);

    let mut page2 = page_manager.get_free_or_new_page(64).unwrap();
    assert_eq!(page2.id(), PageId::new(2));
    page2.insert(&PageSlot::new(vec![2u8; 64])).unwrap();
    drop(page2);

    let mut page1 = page_manager.get_page_mut(PageId::new(1)).unwrap();
    page1.remove(slot_ids[0]).unwrap();
    drop(page1);

    assert_eq!(fsl.page_id(1), PageId::new(1));
}

/// Eviction drops a page's in-memory observer list along with the rest of
/// its resident state; the FSL must still hear about mutations made after
/// the page is reloaded, not just those made before its first eviction.
#[test]
fn fsl_hears_about_mutations_after_a_page_is_evicted_and_reloaded() {
    let page_size = 512;
    let data_backend = Arc::new(MemoryBackend::new(page_size));
    let fsl_backend = Arc::new(MemoryBackend::new(page_size));
    let fsl = Arc::new(FreeSpaceManager::new(fsl_backend, page_size));

    let replacer: Arc<dyn Replacer> = Arc::new(LruReplacer::new());
    let buffer = BufferManager::new(2, replacer, data_backend).unwrap();
    let page_manager = Arc::new(PageManager::new(buffer, fsl.clone()));
    page_manager.start().unwrap();

    let mut page1 = page_manager.get_new_page().unwrap();
    assert_eq!(page1.id(), PageId::new(1));
    page1.insert(&PageSlot::new(vec![1u8; 16])).unwrap();
    drop(page1);
    assert_eq!(fsl.page_id(1), PageId::new(1));

    // Buffer capacity 2: page 1 and page 2 both fit, but allocating page 3
    // evicts the least-recently-used of the two resident pages (page 1),
    // dropping its in-memory Page object (and with it, its observer list)
    // entirely.
    let page2 = page_manager.get_new_page().unwrap();
    assert_eq!(page2.id(), PageId::new(2));
    drop(page2);
    let page3 = page_manager.get_new_page().unwrap();
    assert_eq!(page3.id(), PageId::new(3));
    drop(page3);

    // Reload page 1 and fill it completely. If the FSL observer were not
    // re-registered on this reload, it would never hear this mutation and
    // would keep reporting page 1 as free forever.
    let mut slot_ids = Vec::new();
    loop {
        let mut page = page_manager.get_page_mut(PageId::new(1)).unwrap();
        if page.free_space(Operation::Insert) == 0 {
            break;
        }
        match page.insert(&PageSlot::new(vec![2u8; 64])) {
            Ok(slot_id) => slot_ids.push(slot_id),
            Err(_) => break,
        }
    }

    assert_eq!(fsl.page_id(1), PageId::NULL);

    // Freeing room on the reloaded page must also be heard.
    let mut page = page_manager.get_page_mut(PageId::new(1)).unwrap();
    page.remove(slot_ids[0]).unwrap();
    drop(page);
    assert_eq!(fsl.page_id(1), PageId::new(1));
}
