use thiserror::Error;

use crate::http_probe::result::Protocol;

#[derive(Error, Debug)]
pub enum ProbeError {
    #[error("invalid URL '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("insufficient {protocol} samples: at least 2 are needed, got {found}")]
    InsufficientSamples { protocol: Protocol, found: usize },
    #[error("probe run interrupted")]
    Interrupted,
    #[error("batch was never evaluated")]
    NotEvaluated,
    #[error("classifier error: {0}")]
    Classifier(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("HTTP client error: {0}")]
    Client(#[from] reqwest::Error),
}

impl ProbeError {
    /// Configuration problems are reported before any probe is sent and end the process.
    pub fn is_config(&self) -> bool {
        matches!(
            self,
            ProbeError::InvalidUrl { .. } | ProbeError::InvalidConfig(_) | ProbeError::Yaml(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, ProbeError>;
