mod span;

pub use span::Span;

use crate::common::{CrioError, Result};

/// Types that can be read out of a [`Span`], little-endian, fixed width for
/// primitives, `u64`-length-prefixed for containers.
pub trait Load: Sized {
    fn load(span: &mut Span) -> Result<Self>;
}

/// Types that can be written into a [`Span`].
pub trait Dump {
    fn dump(&self, span: &mut Span) -> Result<()>;

    /// Number of bytes [`Dump::dump`] will write.
    fn dump_size(&self) -> usize;
}

macro_rules! impl_primitive {
    ($ty:ty) => {
        impl Load for $ty {
            fn load(span: &mut Span) -> Result<Self> {
                let bytes = span.take(std::mem::size_of::<$ty>())?;
                Ok(<$ty>::from_le_bytes(bytes.try_into().unwrap()))
            }
        }

        impl Dump for $ty {
            fn dump(&self, span: &mut Span) -> Result<()> {
                span.put(&self.to_le_bytes())
            }

            fn dump_size(&self) -> usize {
                std::mem::size_of::<$ty>()
            }
        }
    };
}

impl_primitive!(u8);
impl_primitive!(u16);
impl_primitive!(u32);
impl_primitive!(u64);
impl_primitive!(i64);

impl Load for bool {
    fn load(span: &mut Span) -> Result<Self> {
        Ok(u8::load(span)? != 0)
    }
}

impl Dump for bool {
    fn dump(&self, span: &mut Span) -> Result<()> {
        (*self as u8).dump(span)
    }

    fn dump_size(&self) -> usize {
        1
    }
}

impl<A: Load, B: Load> Load for (A, B) {
    fn load(span: &mut Span) -> Result<Self> {
        let a = A::load(span)?;
        let b = B::load(span)?;
        Ok((a, b))
    }
}

impl<A: Dump, B: Dump> Dump for (A, B) {
    fn dump(&self, span: &mut Span) -> Result<()> {
        self.0.dump(span)?;
        self.1.dump(span)
    }

    fn dump_size(&self) -> usize {
        self.0.dump_size() + self.1.dump_size()
    }
}

/// `u64` length prefix followed by `length` encoded elements; no separator
/// bytes, no tags beyond the length prefix.
impl Load for Vec<u8> {
    fn load(span: &mut Span) -> Result<Self> {
        let len = u64::load(span)? as usize;
        Ok(span.take(len)?.to_vec())
    }
}

impl Dump for Vec<u8> {
    fn dump(&self, span: &mut Span) -> Result<()> {
        (self.len() as u64).dump(span)?;
        span.put(self)
    }

    fn dump_size(&self) -> usize {
        8 + self.len()
    }
}

/// Generic container load for element types other than raw bytes, which use
/// the specialized `Vec<u8>` impl above (a blanket `Vec<T>` impl would
/// conflict with it when `T = u8`).
pub fn load_container<T: Load>(span: &mut Span) -> Result<Vec<T>> {
    let len = u64::load(span)? as usize;
    let mut out = Vec::with_capacity(len);
    for _ in 0..len {
        out.push(T::load(span)?);
    }
    Ok(out)
}

/// Blanket container dump for element types other than raw bytes (which use
/// the specialized `Vec<u8>` impl above).
pub fn dump_container<T: Dump>(items: &[T], span: &mut Span) -> Result<()> {
    (items.len() as u64).dump(span)?;
    for item in items {
        item.dump(span)?;
    }
    Ok(())
}

pub fn container_dump_size<T: Dump>(items: &[T]) -> usize {
    8 + items.iter().map(Dump::dump_size).sum::<usize>()
}

pub(crate) fn parse_err(msg: impl Into<String>) -> CrioError {
    CrioError::ParseError(msg.into())
}
