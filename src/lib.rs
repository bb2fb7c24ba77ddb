pub mod acquisition;
pub mod config;
pub mod error;
pub mod output;
pub mod processing;

pub use acquisition::simulated::{SimulatedMotor, SimulationConfig};
pub use config::{load_config, save_config, Config};
pub use error::{PipelineError, Result};
pub use output::snapshot::{PipelineSnapshot, SharedSnapshot};
pub use processing::signal_processor::MotorPipeline;
