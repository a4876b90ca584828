pub mod http_client;
pub mod operation_handler;

pub use http_client::{ApiClient, HttpRecordRemote};
pub use operation_handler::HttpOperationHandler;
