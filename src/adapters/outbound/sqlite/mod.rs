/// SQLite persistence for the scan tree and its aggregate views
mod db_array;
mod schema;
mod store;
mod transaction;
mod views;

pub use store::{SqliteScanStore, DEFAULT_BUSY_TIMEOUT};
pub use transaction::SqliteTreeTransaction;
