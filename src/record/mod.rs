mod accessor;

pub use accessor::RecordAccessor;
