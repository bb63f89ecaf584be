use thiserror::Error;

use super::steps::StepId;

#[derive(Error, Debug)]
pub enum SetupError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("no step at index {0}")]
    UnknownStep(usize),

    #[error("step graph does not terminate from step {start} ({last:?} revisits the walk)")]
    NonTerminating { start: usize, last: StepId },

    #[error("step job failed: {0}")]
    JobFailed(String),

    #[error("collection store already initialized")]
    CollectionAlreadyInitialized,

    #[error("app reports configured but {0} is empty")]
    ConfigurationInconsistent(&'static str),
}

pub type Result<T> = std::result::Result<T, SetupError>;
