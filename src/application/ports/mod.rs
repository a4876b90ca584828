pub mod connectivity;
pub mod credentials;
pub mod operation_handler;
pub mod operation_store;
pub mod record_store;
pub mod remote_api;

pub use connectivity::ConnectivitySignal;
pub use credentials::{CredentialProvider, StaticCredentials};
pub use operation_handler::{FnHandler, HandlerError, OperationHandler, handler_fn};
pub use operation_store::OperationStore;
pub use record_store::{PersistenceProvider, RecordPersistence};
pub use remote_api::{RecordRemote, RemoteError};
