use thiserror::Error;

#[derive(Error, Debug)]
pub enum VocabgateError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("setup error: {0}")]
    Setup(#[from] crate::wizard::error::SetupError),
}

pub type Result<T> = std::result::Result<T, VocabgateError>;
