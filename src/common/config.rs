/// Smallest page size the reference implementation accepts.
pub const MIN_PAGE_SIZE: usize = 512;

/// Default page size for a freshly created backend.
pub const DEFAULT_PAGE_SIZE: usize = 4096;

/// Default buffer pool capacity, in frames. Must be >= 2 (see
/// [`MIN_BUFFER_CAPACITY`]).
pub const DEFAULT_BUFFER_CAPACITY: usize = 64;

/// Capacity 1 is rejected at buffer manager construction: some operations
/// (an update spanning two pages) hold two handles simultaneously.
pub const MIN_BUFFER_CAPACITY: usize = 2;

/// Default size of the log manager's own buffered window of log pages.
pub const DEFAULT_LOG_BUFFER_CAPACITY: usize = 8;

/// Engine-wide tunables, assembled programmatically or from a parsed
/// connection string (see [`crate::connstring`]).
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub page_size: usize,
    pub buffer_capacity: usize,
    pub log_buffer_capacity: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            page_size: DEFAULT_PAGE_SIZE,
            buffer_capacity: DEFAULT_BUFFER_CAPACITY,
            log_buffer_capacity: DEFAULT_LOG_BUFFER_CAPACITY,
        }
    }
}

impl EngineConfig {
    pub fn validate(&self) -> crate::common::Result<()> {
        if self.page_size < MIN_PAGE_SIZE {
            return Err(crate::common::CrioError::StateError(format!(
                "page_size {} is below the minimum of {}",
                self.page_size, MIN_PAGE_SIZE
            )));
        }
        if self.buffer_capacity < MIN_BUFFER_CAPACITY {
            return Err(crate::common::CrioError::StateError(format!(
                "buffer_capacity {} is below the minimum of {}",
                self.buffer_capacity, MIN_BUFFER_CAPACITY
            )));
        }
        Ok(())
    }
}
