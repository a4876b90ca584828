pub mod clock;
pub mod config;
pub mod error;
pub mod events;
pub mod metrics;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::AppConfig;
pub use error::{AppError, Result};
pub use events::{EventBus, SyncEvent};
pub use metrics::{SyncMetrics, SyncMetricsSnapshot};
