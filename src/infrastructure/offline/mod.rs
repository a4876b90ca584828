mod mappers;
pub mod provider;
mod rows;
pub mod sqlite_operation_store;
pub mod sqlite_record_store;

pub use provider::ReadyPersistence;
pub use sqlite_operation_store::SqliteOperationStore;
pub use sqlite_record_store::SqliteRecordStore;
