use crate::common::Result;

use super::parse_err;

/// A non-owning, mutable view of a byte region. Reads/writes consume the
/// front of the span; any operation that would exceed its bounds yields a
/// parse error.
pub struct Span<'a> {
    bytes: &'a mut [u8],
}

impl<'a> Span<'a> {
    pub fn new(bytes: &'a mut [u8]) -> Self {
        Self { bytes }
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Advances the span by `n` bytes without returning anything, shrinking
    /// its visible size.
    pub fn advance(&mut self, n: usize) -> Result<()> {
        if n > self.bytes.len() {
            return Err(parse_err(format!(
                "advance({n}) exceeds span of length {}",
                self.bytes.len()
            )));
        }
        let bytes = std::mem::take(&mut self.bytes);
        let (_, rest) = bytes.split_at_mut(n);
        self.bytes = rest;
        Ok(())
    }

    /// Returns a sub-span over `[offset, offset+len)` without copying,
    /// leaving this span untouched.
    pub fn sub_span(&mut self, offset: usize, len: usize) -> Result<Span<'_>> {
        if offset + len > self.bytes.len() {
            return Err(parse_err(format!(
                "sub_span({offset}, {len}) exceeds span of length {}",
                self.bytes.len()
            )));
        }
        Ok(Span::new(&mut self.bytes[offset..offset + len]))
    }

    /// Reads and consumes the next `n` bytes.
    pub fn take(&mut self, n: usize) -> Result<&[u8]> {
        if n > self.bytes.len() {
            return Err(parse_err(format!(
                "take({n}) exceeds span of length {}",
                self.bytes.len()
            )));
        }
        let bytes = std::mem::take(&mut self.bytes);
        let (head, rest) = bytes.split_at_mut(n);
        self.bytes = rest;
        Ok(head)
    }

    /// Writes `data` at the front of the span and consumes that many bytes.
    pub fn put(&mut self, data: &[u8]) -> Result<()> {
        if data.len() > self.bytes.len() {
            return Err(parse_err(format!(
                "put({}) exceeds span of length {}",
                data.len(),
                self.bytes.len()
            )));
        }
        let bytes = std::mem::take(&mut self.bytes);
        let (head, rest) = bytes.split_at_mut(data.len());
        head.copy_from_slice(data);
        self.bytes = rest;
        Ok(())
    }

    pub fn as_slice(&self) -> &[u8] {
        self.bytes
    }

    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        self.bytes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{Dump, Load};

    #[test]
    fn advance_and_take_shrink_the_view() {
        let mut buf = [1u8, 2, 3, 4, 5];
        let mut span = Span::new(&mut buf);
        assert_eq!(span.len(), 5);
        span.advance(2).unwrap();
        assert_eq!(span.len(), 3);
        let rest = span.take(3).unwrap();
        assert_eq!(rest, &[3, 4, 5]);
    }

    #[test]
    fn take_past_bounds_is_a_parse_error() {
        let mut buf = [0u8; 4];
        let mut span = Span::new(&mut buf);
        assert!(span.take(5).is_err());
    }

    #[test]
    fn primitive_round_trip() {
        let mut buf = [0u8; 8];
        {
            let mut span = Span::new(&mut buf);
            42u64.dump(&mut span).unwrap();
        }
        let mut span = Span::new(&mut buf);
        let v = u64::load(&mut span).unwrap();
        assert_eq!(v, 42);
    }

    #[test]
    fn byte_container_round_trip() {
        let payload = vec![9u8, 8, 7, 6];
        let mut buf = vec![0u8; payload.dump_size()];
        {
            let mut span = Span::new(&mut buf);
            payload.dump(&mut span).unwrap();
        }
        let mut span = Span::new(&mut buf);
        let loaded = Vec::<u8>::load(&mut span).unwrap();
        assert_eq!(loaded, payload);
    }
}
