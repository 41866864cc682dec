use std::collections::HashMap;

use crate::codec::{Dump, Load, Span};
use crate::common::{Checksum, CrioError, PageId, PageTypeId, Result, PAGE_TYPE_FSL, PAGE_TYPE_LOG, PAGE_TYPE_RECORD};

use super::{FslPage, LogPage, NewPage, Page, RecordPage, PAGE_FRAME_HEADER_SIZE};

type Builder = Box<dyn Fn(PageId, usize) -> Box<dyn Page> + Send + Sync>;

/// Maps a [`PageTypeId`] to a constructor for an empty page of that kind.
/// Populated at process init for built-in kinds; `register::<T>()` is open
/// for collection-defined kinds, matching the registry's only real
/// requirement: registration must complete before the first backend open.
pub struct PageRegistry {
    builders: HashMap<PageTypeId, Builder>,
}

impl PageRegistry {
    pub fn with_builtins() -> Self {
        let mut registry = Self {
            builders: HashMap::new(),
        };
        registry.register::<RecordPage>(PAGE_TYPE_RECORD);
        registry.register::<LogPage>(PAGE_TYPE_LOG);
        registry.register::<FslPage>(PAGE_TYPE_FSL);
        registry
    }

    /// Registers a new page kind. `type_id.0` must be `>= PAGE_TYPE_RESERVED`.
    pub fn register<T: NewPage + 'static>(&mut self, type_id: PageTypeId) {
        self.builders
            .insert(type_id, Box::new(|id, page_size| Box::new(T::new_empty(id, page_size))));
    }

    fn build(&self, type_id: PageTypeId, id: PageId, page_size: usize) -> Result<Box<dyn Page>> {
        self.builders
            .get(&type_id)
            .map(|builder| builder(id, page_size))
            .ok_or(CrioError::UnknownPageType(type_id.0))
    }
}

/// Reads the type header, constructs an empty page of the matching kind,
/// asks it to load its body, and verifies the checksum over the body.
pub fn load_page(
    bytes: &[u8],
    id: PageId,
    page_size: usize,
    registry: &PageRegistry,
) -> Result<Box<dyn Page>> {
    if bytes.len() != page_size {
        return Err(CrioError::ParseError(format!(
            "page image length {} does not match page_size {}",
            bytes.len(),
            page_size
        )));
    }

    let mut header = bytes[0..PAGE_FRAME_HEADER_SIZE].to_vec();
    let mut header_span = Span::new(&mut header);
    let type_id = PageTypeId(u8::load(&mut header_span)?);
    let checksum = Checksum(u64::load(&mut header_span)?);

    let body = &bytes[PAGE_FRAME_HEADER_SIZE..];
    if Checksum::compute(body) != checksum {
        return Err(CrioError::CorruptError(format!(
            "checksum mismatch loading page {id}"
        )));
    }

    let mut page = registry.build(type_id, id, page_size)?;
    let mut body_owned = body.to_vec();
    page.load_body(&mut Span::new(&mut body_owned))?;
    Ok(page)
}

/// Like [`load_page`] but for a statically-known concrete kind, used by a
/// [`crate::buffer::BufferManager`] instance, which is itself generic over a
/// single page kind and so has no need of the dynamic registry.
pub fn load_typed_page<P: NewPage + 'static>(bytes: &[u8], id: PageId, page_size: usize) -> Result<P> {
    if bytes.len() != page_size {
        return Err(CrioError::ParseError(format!(
            "page image length {} does not match page_size {}",
            bytes.len(),
            page_size
        )));
    }

    let mut header = bytes[0..PAGE_FRAME_HEADER_SIZE].to_vec();
    let checksum = Checksum(u64::load(&mut Span::new(&mut header[1..]))?);

    let body = &bytes[PAGE_FRAME_HEADER_SIZE..];
    if Checksum::compute(body) != checksum {
        return Err(CrioError::CorruptError(format!(
            "checksum mismatch loading page {id}"
        )));
    }

    let mut page = P::new_empty(id, page_size);
    let mut body_owned = body.to_vec();
    page.load_body(&mut Span::new(&mut body_owned))?;
    Ok(page)
}

/// Reserves the type-header prefix, asks the page to dump its body into the
/// suffix, computes the checksum over the body, then writes the header.
pub fn dump_page(page: &dyn Page) -> Result<Vec<u8>> {
    let page_size = page.size();
    let body_len = page_size - PAGE_FRAME_HEADER_SIZE;

    let mut body = vec![0u8; body_len];
    page.dump_body(&mut Span::new(&mut body))?;
    let checksum = Checksum::compute(&body);

    let mut image = vec![0u8; page_size];
    {
        let mut header_span = Span::new(&mut image[0..PAGE_FRAME_HEADER_SIZE]);
        page.type_id().0.dump(&mut header_span)?;
        checksum.0.dump(&mut header_span)?;
    }
    image[PAGE_FRAME_HEADER_SIZE..].copy_from_slice(&body);
    Ok(image)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::page::PageSlot;

    #[test]
    fn record_page_round_trips_through_the_factory() {
        let registry = PageRegistry::with_builtins();
        let mut page = RecordPage::new_empty(PageId::new(1), 512);
        page.insert(&PageSlot::new(b"payload".to_vec())).unwrap();

        let image = dump_page(&page).unwrap();
        let loaded = load_page(&image, PageId::new(1), 512, &registry).unwrap();
        assert_eq!(loaded.type_id(), PAGE_TYPE_RECORD);
    }

    #[test]
    fn single_byte_corruption_is_rejected() {
        let registry = PageRegistry::with_builtins();
        let page = RecordPage::new_empty(PageId::new(1), 512);
        let mut image = dump_page(&page).unwrap();
        let last = image.len() - 1;
        image[last] ^= 0xFF;
        assert!(load_page(&image, PageId::new(1), 512, &registry).is_err());
    }
}
