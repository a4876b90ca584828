pub mod offline_record_store;
pub mod retry_queue;
pub mod sync_scheduler;

pub use offline_record_store::{
    FetchResult, FetchSource, OfflineRecordStore, OfflineRecordStoreBuilder, StoreStatus,
    WriteOutcome,
};
pub use retry_queue::{RetryQueue, RetryQueueBuilder};
pub use sync_scheduler::SyncScheduler;
