use thiserror::Error;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Sensor bus transfer failed: {0}")]
    Bus(String),

    #[error("Digital line read failed: {0}")]
    Lines(String),

    #[error("Bus frame has {actual} bytes, expected {expected}")]
    FrameLength { expected: usize, actual: usize },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse config file: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("CSV export failed: {0}")]
    Csv(#[from] csv::Error),
}

impl PipelineError {
    /// True for faults raised by the hardware front end rather than by the host.
    pub fn is_hardware_fault(&self) -> bool {
        matches!(
            self,
            PipelineError::Bus(_) | PipelineError::Lines(_) | PipelineError::FrameLength { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, PipelineError>;
