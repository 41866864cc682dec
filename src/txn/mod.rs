mod transaction;
mod transaction_manager;

pub use transaction::{Transaction, TxnState};
pub use transaction_manager::TransactionManager;
