//! Built-in plugins available from configuration by `kind`.

mod file_collector;
mod file_publisher;
mod snapshot_hook;
mod summary_hook;

pub use file_collector::{FileCollector, FOLDER_TYPE};
pub use file_publisher::{FilePublisher, PUBLISH_DATA};
pub use snapshot_hook::TreeSnapshotHook;
pub use summary_hook::{summarize, SummaryHook};
