pub mod export;
pub mod snapshot;

pub use export::write_csv;
pub use snapshot::{create_shared_snapshot, PipelineSnapshot, SharedSnapshot};
