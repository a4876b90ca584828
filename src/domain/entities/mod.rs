pub mod drain_report;
pub mod local_record;
pub mod pending_change;
pub mod pending_operation;

pub use drain_report::{ChangeDrainReport, DrainOutcome, RetryDrainReport, SkipReason};
pub use local_record::{LocalRecord, RemoteRecord};
pub use pending_change::{ChangeAction, ChangeBody, PendingChange, PendingChangeDraft};
pub use pending_operation::PendingOperation;
