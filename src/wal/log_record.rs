use crate::codec::{Dump, Load, Span};
use crate::common::{Checksum, CrioError, RecordId, Result, SeqNumber, TxnId};
use crate::page::PageSlot;

const BODY_BEGIN: u8 = 0;
const BODY_INSERT: u8 = 1;
const BODY_UPDATE: u8 = 2;
const BODY_DELETE: u8 = 3;
const BODY_COMMIT: u8 = 4;
const BODY_ABORT: u8 = 5;
const BODY_DONE: u8 = 6;

/// The payload of a [`LogRecord`]. Carries up to two slot images: both for
/// an update (old then new), one for an insert or delete, none for the
/// transaction-boundary markers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogRecordBody {
    Begin,
    Insert(PageSlot),
    Update { old: PageSlot, new: PageSlot },
    Delete(PageSlot),
    Commit,
    Abort,
    Done,
}

impl LogRecordBody {
    fn type_tag(&self) -> u8 {
        match self {
            LogRecordBody::Begin => BODY_BEGIN,
            LogRecordBody::Insert(_) => BODY_INSERT,
            LogRecordBody::Update { .. } => BODY_UPDATE,
            LogRecordBody::Delete(_) => BODY_DELETE,
            LogRecordBody::Commit => BODY_COMMIT,
            LogRecordBody::Abort => BODY_ABORT,
            LogRecordBody::Done => BODY_DONE,
        }
    }

    fn dump_size(&self) -> usize {
        let slot_size = |s: &PageSlot| 1 + s.dump_size();
        let empty = 1;
        match self {
            LogRecordBody::Begin | LogRecordBody::Commit | LogRecordBody::Abort | LogRecordBody::Done => {
                empty + empty
            }
            LogRecordBody::Insert(s) | LogRecordBody::Delete(s) => slot_size(s) + empty,
            LogRecordBody::Update { old, new } => slot_size(old) + slot_size(new),
        }
    }

    fn dump_slots(&self, span: &mut Span) -> Result<()> {
        let put_present = |present: bool, span: &mut Span| (present as u8).dump(span);
        match self {
            LogRecordBody::Begin | LogRecordBody::Commit | LogRecordBody::Abort | LogRecordBody::Done => {
                put_present(false, span)?;
                put_present(false, span)
            }
            LogRecordBody::Insert(s) | LogRecordBody::Delete(s) => {
                put_present(true, span)?;
                s.dump(span)?;
                put_present(false, span)
            }
            LogRecordBody::Update { old, new } => {
                put_present(true, span)?;
                old.dump(span)?;
                put_present(true, span)?;
                new.dump(span)
            }
        }
    }

    fn load(type_tag: u8, span: &mut Span) -> Result<Self> {
        let load_slot = |present: u8, span: &mut Span| -> Result<Option<PageSlot>> {
            if present != 0 {
                Ok(Some(PageSlot::load(span)?))
            } else {
                Ok(None)
            }
        };

        match type_tag {
            BODY_BEGIN | BODY_COMMIT | BODY_ABORT | BODY_DONE => {
                let a = u8::load(span)?;
                load_slot(a, span)?;
                let b = u8::load(span)?;
                load_slot(b, span)?;
                Ok(match type_tag {
                    BODY_BEGIN => LogRecordBody::Begin,
                    BODY_COMMIT => LogRecordBody::Commit,
                    BODY_ABORT => LogRecordBody::Abort,
                    _ => LogRecordBody::Done,
                })
            }
            BODY_INSERT | BODY_DELETE => {
                let a = u8::load(span)?;
                let slot = load_slot(a, span)?.ok_or_else(|| {
                    CrioError::CorruptError("insert/delete log record missing slot image".into())
                })?;
                let b = u8::load(span)?;
                load_slot(b, span)?;
                Ok(if type_tag == BODY_INSERT {
                    LogRecordBody::Insert(slot)
                } else {
                    LogRecordBody::Delete(slot)
                })
            }
            BODY_UPDATE => {
                let a = u8::load(span)?;
                let old = load_slot(a, span)?.ok_or_else(|| {
                    CrioError::CorruptError("update log record missing old slot image".into())
                })?;
                let b = u8::load(span)?;
                let new = load_slot(b, span)?.ok_or_else(|| {
                    CrioError::CorruptError("update log record missing new slot image".into())
                })?;
                Ok(LogRecordBody::Update { old, new })
            }
            other => Err(CrioError::CorruptError(format!(
                "unknown log record body type {other}"
            ))),
        }
    }
}

/// A single entry in the write-ahead log. `prev_seq_number` links backward
/// to the previous record of the same transaction, forming the chain abort
/// walks to undo a transaction's effects.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogRecord {
    pub seq_number: SeqNumber,
    pub prev_seq_number: SeqNumber,
    pub txn_id: TxnId,
    pub location: RecordId,
    pub body: LogRecordBody,
}

impl LogRecord {
    pub fn new(
        seq_number: SeqNumber,
        prev_seq_number: SeqNumber,
        txn_id: TxnId,
        location: RecordId,
        body: LogRecordBody,
    ) -> Self {
        Self {
            seq_number,
            prev_seq_number,
            txn_id,
            location,
            body,
        }
    }

    pub fn dump_size(&self) -> usize {
        8 + 8 + 8 + 8 + 1 + 8 + 8 + self.body.dump_size()
    }

    fn checksummed_tail(&self) -> Result<Vec<u8>> {
        let mut buf = vec![0u8; self.dump_size() - 8];
        let mut span = Span::new(&mut buf);
        self.seq_number.0.dump(&mut span)?;
        self.prev_seq_number.0.dump(&mut span)?;
        self.txn_id.0.dump(&mut span)?;
        self.body.type_tag().dump(&mut span)?;
        self.location.page_id.as_u64().dump(&mut span)?;
        self.location.slot_id.0.dump(&mut span)?;
        self.body.dump_slots(&mut span)?;
        Ok(buf)
    }

    pub fn dump(&self, span: &mut Span) -> Result<()> {
        let tail = self.checksummed_tail()?;
        self.seq_number.0.dump(span)?;
        self.prev_seq_number.0.dump(span)?;
        self.txn_id.0.dump(span)?;
        Checksum::compute(&tail).0.dump(span)?;
        self.body.type_tag().dump(span)?;
        self.location.page_id.as_u64().dump(span)?;
        self.location.slot_id.0.dump(span)?;
        self.body.dump_slots(span)
    }

    pub fn load(span: &mut Span) -> Result<Self> {
        let seq_number = SeqNumber(u64::load(span)?);
        let prev_seq_number = SeqNumber(u64::load(span)?);
        let txn_id = TxnId(u64::load(span)?);
        let checksum = Checksum(u64::load(span)?);

        let type_tag = u8::load(span)?;
        let page_id = u64::load(span)?;
        let slot_id = u64::load(span)?;
        let body = LogRecordBody::load(type_tag, span)?;

        let record = LogRecord {
            seq_number,
            prev_seq_number,
            txn_id,
            location: RecordId::new(crate::common::PageId::new(page_id), crate::common::SlotId(slot_id)),
            body,
        };

        let tail = record.checksummed_tail()?;
        if Checksum::compute(&tail) != checksum {
            return Err(CrioError::CorruptError(
                "log record checksum mismatch".into(),
            ));
        }
        Ok(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::PageId;

    fn round_trip(record: &LogRecord) -> LogRecord {
        let mut buf = vec![0u8; record.dump_size()];
        record.dump(&mut Span::new(&mut buf)).unwrap();
        LogRecord::load(&mut Span::new(&mut buf)).unwrap()
    }

    #[test]
    fn begin_record_round_trips() {
        let r = LogRecord::new(
            SeqNumber(1),
            SeqNumber::NONE,
            TxnId(7),
            RecordId::NULL,
            LogRecordBody::Begin,
        );
        assert_eq!(round_trip(&r), r);
    }

    #[test]
    fn insert_record_carries_its_slot_image() {
        let slot = PageSlot::new(b"row".to_vec());
        let r = LogRecord::new(
            SeqNumber(2),
            SeqNumber(1),
            TxnId(7),
            RecordId::new(PageId::new(3), crate::common::SlotId::new(1)),
            LogRecordBody::Insert(slot.clone()),
        );
        let loaded = round_trip(&r);
        assert_eq!(loaded.body, LogRecordBody::Insert(slot));
    }

    #[test]
    fn update_record_carries_both_images() {
        let old = PageSlot::new(b"before".to_vec());
        let new = PageSlot::new(b"after".to_vec());
        let r = LogRecord::new(
            SeqNumber(3),
            SeqNumber(2),
            TxnId(7),
            RecordId::new(PageId::new(3), crate::common::SlotId::new(1)),
            LogRecordBody::Update {
                old: old.clone(),
                new: new.clone(),
            },
        );
        let loaded = round_trip(&r);
        assert_eq!(loaded.body, LogRecordBody::Update { old, new });
    }

    #[test]
    fn corrupted_byte_fails_checksum() {
        let r = LogRecord::new(
            SeqNumber(1),
            SeqNumber::NONE,
            TxnId(1),
            RecordId::NULL,
            LogRecordBody::Commit,
        );
        let mut buf = vec![0u8; r.dump_size()];
        r.dump(&mut Span::new(&mut buf)).unwrap();
        *buf.last_mut().unwrap() ^= 0xFF;
        assert!(LogRecord::load(&mut Span::new(&mut buf)).is_err());
    }
}
