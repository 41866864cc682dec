use crate::codec::{Dump, Load, Span};
use crate::common::{Checksum, CrioError, RecordId};

/// A record fragment: header (previous/next fragment locations, checksum of
/// the payload plus links) and a variable-length payload. A logical record
/// exceeding the largest single-slot payload is split into a doubly-linked
/// chain of slots, possibly across pages; the chain is acyclic, `prev` of
/// the head is NULL, `next` of the tail is NULL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageSlot {
    pub prev: RecordId,
    pub next: RecordId,
    pub payload: Vec<u8>,
}

impl PageSlot {
    pub fn new(payload: Vec<u8>) -> Self {
        Self {
            prev: RecordId::NULL,
            next: RecordId::NULL,
            payload,
        }
    }

    pub fn dump_size(&self) -> usize {
        // prev(16) + next(16) + checksum(8) + payload length prefix(8) + payload
        16 + 16 + 8 + 8 + self.payload.len()
    }

    fn checksum(&self) -> Checksum {
        let mut buf = Vec::with_capacity(32 + self.payload.len());
        buf.extend_from_slice(&self.prev.page_id.as_u64().to_le_bytes());
        buf.extend_from_slice(&self.prev.slot_id.0.to_le_bytes());
        buf.extend_from_slice(&self.next.page_id.as_u64().to_le_bytes());
        buf.extend_from_slice(&self.next.slot_id.0.to_le_bytes());
        buf.extend_from_slice(&self.payload);
        Checksum::compute(&buf)
    }

    pub fn dump(&self, span: &mut Span) -> crate::common::Result<()> {
        self.prev.page_id.as_u64().dump(span)?;
        self.prev.slot_id.0.dump(span)?;
        self.next.page_id.as_u64().dump(span)?;
        self.next.slot_id.0.dump(span)?;
        self.checksum().0.dump(span)?;
        self.payload.dump(span)
    }

    pub fn load(span: &mut Span) -> crate::common::Result<Self> {
        let prev_page = u64::load(span)?;
        let prev_slot = u64::load(span)?;
        let next_page = u64::load(span)?;
        let next_slot = u64::load(span)?;
        let checksum = Checksum(u64::load(span)?);
        let payload = Vec::<u8>::load(span)?;

        let slot = PageSlot {
            prev: RecordId::new(crate::common::PageId::new(prev_page), crate::common::SlotId(prev_slot)),
            next: RecordId::new(crate::common::PageId::new(next_page), crate::common::SlotId(next_slot)),
            payload,
        };

        if slot.checksum() != checksum {
            return Err(CrioError::CorruptError(
                "page slot checksum mismatch".into(),
            ));
        }
        Ok(slot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_dump_and_load() {
        let slot = PageSlot::new(b"hello world".to_vec());
        let mut buf = vec![0u8; slot.dump_size()];
        slot.dump(&mut Span::new(&mut buf)).unwrap();
        let loaded = PageSlot::load(&mut Span::new(&mut buf)).unwrap();
        assert_eq!(loaded, slot);
    }

    #[test]
    fn single_byte_corruption_is_detected() {
        let slot = PageSlot::new(b"hello world".to_vec());
        let mut buf = vec![0u8; slot.dump_size()];
        slot.dump(&mut Span::new(&mut buf)).unwrap();
        *buf.last_mut().unwrap() ^= 0xFF;
        assert!(PageSlot::load(&mut Span::new(&mut buf)).is_err());
    }
}
