pub mod operation_id;
pub mod operation_kind;
pub mod operation_payload;
pub mod record_data;
pub mod record_id;
pub mod sync_flag;

pub use operation_id::OperationId;
pub use operation_kind::OperationKind;
pub use operation_payload::OperationPayload;
pub use record_data::RecordData;
pub use record_id::{LOCAL_ID_PREFIX, RecordId};
pub use sync_flag::SyncFlag;
