use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tracing::{info, warn};

use crate::common::{CrioError, RecordId, Result, SeqNumber, TxnId};
use crate::page::PageSlot;
use crate::page_manager::PageManager;
use crate::wal::{LogManager, LogRecordBody};

use super::{Transaction, TxnState};

/// Owns transaction lifecycle: begin, operation logging, commit, abort, and
/// startup recovery. Collaborates with the log manager for durability and
/// the page manager for the data-page side of every operation.
pub struct TransactionManager {
    log_manager: Arc<LogManager>,
    page_manager: Arc<PageManager>,
    next_txn_id: AtomicU64,
}

impl TransactionManager {
    pub fn new(log_manager: Arc<LogManager>, page_manager: Arc<PageManager>) -> Self {
        Self {
            log_manager,
            page_manager,
            next_txn_id: AtomicU64::new(1),
        }
    }

    pub fn begin(&self) -> Result<Arc<Transaction>> {
        let txn_id = TxnId(self.next_txn_id.fetch_add(1, Ordering::AcqRel));
        let location = self.log_manager.add(
            SeqNumber::NONE,
            txn_id,
            RecordId::NULL,
            LogRecordBody::Begin,
        )?;
        Ok(Arc::new(Transaction::new(txn_id, location)))
    }

    fn log(&self, txn: &Transaction, location: RecordId, body: LogRecordBody) -> Result<()> {
        let prev = txn.last_log_location().1;
        let new_location = self.log_manager.add(prev, txn.txn_id(), location, body)?;
        txn.set_last_log_location(new_location);
        Ok(())
    }

    pub fn log_insert(&self, txn: &Transaction, location: RecordId, slot: PageSlot) -> Result<()> {
        self.log(txn, location, LogRecordBody::Insert(slot))?;
        txn.stage_page(location.page_id);
        Ok(())
    }

    pub fn log_update(
        &self,
        txn: &Transaction,
        location: RecordId,
        old: PageSlot,
        new: PageSlot,
    ) -> Result<()> {
        self.log(txn, location, LogRecordBody::Update { old, new })?;
        txn.stage_page(location.page_id);
        Ok(())
    }

    pub fn log_delete(&self, txn: &Transaction, location: RecordId, slot: PageSlot) -> Result<()> {
        self.log(txn, location, LogRecordBody::Delete(slot))?;
        txn.stage_page(location.page_id);
        Ok(())
    }

    pub fn commit(&self, txn: &Transaction) -> Result<()> {
        if txn.state() != TxnState::Active {
            return Err(CrioError::StateError(format!(
                "cannot commit transaction {} from state {:?}",
                txn.txn_id(),
                txn.state()
            )));
        }
        txn.set_state(TxnState::PartiallyCommitted);

        match self.try_commit(txn) {
            Ok(()) => Ok(()),
            Err(e) => {
                warn!(txn_id = %txn.txn_id(), error = %e, "commit failed, aborting");
                txn.set_state(TxnState::Failed);
                self.abort(txn)?;
                Err(e)
            }
        }
    }

    fn try_commit(&self, txn: &Transaction) -> Result<()> {
        self.log(txn, RecordId::NULL, LogRecordBody::Commit)?;
        self.log_manager.flush()?;

        for page_id in txn.staged_pages() {
            self.page_manager.flush_page(page_id)?;
        }

        self.log(txn, RecordId::NULL, LogRecordBody::Done)?;
        self.log_manager.flush()?;
        txn.set_state(TxnState::Committed);
        Ok(())
    }

    pub fn abort(&self, txn: &Transaction) -> Result<()> {
        txn.set_state(TxnState::Failed);

        let mut seq = txn.last_log_location().1;
        loop {
            let (_, record) = self.log_manager.find(seq)?;
            match record.body.clone() {
                LogRecordBody::Begin => break,
                LogRecordBody::Insert(slot) => {
                    let mut page = self.page_manager.get_page_mut(record.location.page_id)?;
                    page.remove(record.location.slot_id)?;
                    drop(page);
                    self.log(txn, record.location, LogRecordBody::Delete(slot))?;
                }
                LogRecordBody::Delete(slot) => {
                    let mut page = self.page_manager.get_page_mut(record.location.page_id)?;
                    page.undo_remove(record.location.slot_id, &slot)?;
                    drop(page);
                    self.log(txn, record.location, LogRecordBody::Insert(slot))?;
                }
                LogRecordBody::Update { old, new: _ } => {
                    let mut page = self.page_manager.get_page_mut(record.location.page_id)?;
                    page.update(record.location.slot_id, &old)?;
                    drop(page);
                    self.log(
                        txn,
                        record.location,
                        LogRecordBody::Update {
                            old: old.clone(),
                            new: old,
                        },
                    )?;
                }
                LogRecordBody::Commit | LogRecordBody::Abort | LogRecordBody::Done => {}
            }

            if record.prev_seq_number == SeqNumber::NONE {
                break;
            }
            seq = record.prev_seq_number;
        }

        self.log(txn, RecordId::NULL, LogRecordBody::Abort)?;
        self.log_manager.flush()?;
        txn.set_state(TxnState::Aborted);
        Ok(())
    }

    /// Startup recovery: replays committed transactions forward, discards
    /// (undoes) those lacking a DONE record. Not part of the steady-state
    /// path; call once after reopening storage.
    pub fn recover(&self) -> Result<()> {
        let records = self.log_manager.replay_all()?;
        let mut by_txn: HashMap<TxnId, Vec<_>> = HashMap::new();
        for record in records {
            by_txn.entry(record.txn_id).or_default().push(record);
        }

        for (txn_id, records) in by_txn {
            let committed = records.iter().any(|r| matches!(r.body, LogRecordBody::Done));
            let already_aborted = records.iter().any(|r| matches!(r.body, LogRecordBody::Abort));
            if already_aborted {
                continue;
            }

            if committed {
                info!(%txn_id, "recovery: redoing committed transaction");
                for record in &records {
                    match &record.body {
                        LogRecordBody::Insert(slot) => {
                            let mut page = self.page_manager.get_page_mut(record.location.page_id)?;
                            page.undo_remove(record.location.slot_id, slot)?;
                        }
                        LogRecordBody::Update { new, .. } => {
                            let mut page = self.page_manager.get_page_mut(record.location.page_id)?;
                            page.update(record.location.slot_id, new)?;
                        }
                        LogRecordBody::Delete(_) => {
                            let mut page = self.page_manager.get_page_mut(record.location.page_id)?;
                            let _ = page.remove(record.location.slot_id);
                        }
                        _ => {}
                    }
                }
            } else {
                info!(%txn_id, "recovery: rolling back incomplete transaction");
                for record in records.iter().rev() {
                    match &record.body {
                        LogRecordBody::Insert(_) => {
                            let mut page = self.page_manager.get_page_mut(record.location.page_id)?;
                            let _ = page.remove(record.location.slot_id);
                        }
                        LogRecordBody::Delete(slot) => {
                            let mut page = self.page_manager.get_page_mut(record.location.page_id)?;
                            page.undo_remove(record.location.slot_id, slot)?;
                        }
                        LogRecordBody::Update { old, .. } => {
                            let mut page = self.page_manager.get_page_mut(record.location.page_id)?;
                            page.update(record.location.slot_id, old)?;
                        }
                        _ => {}
                    }
                }
            }
        }
        Ok(())
    }
}
