use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Invalid configuration: {0}")]
    Configuration(String),

    #[error("Insufficient training data: need at least one match and one distinct example (have {matches} matches, {distincts} distinct)")]
    InsufficientTrainingData { matches: usize, distincts: usize },

    #[error("Model is not trained: call train() or load settings first")]
    NotTrained,

    #[error("Block index is not built: call build() or index() first")]
    IndexNotBuilt,

    #[error("Persistence format error: {0}")]
    PersistenceFormat(String),

    #[error("Labeling was cancelled")]
    LabelingCancelled,

    #[error("Record not found: {0}")]
    RecordNotFound(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl Error {
    pub fn config<S: Into<String>>(msg: S) -> Self {
        Error::Configuration(msg.into())
    }

    /// Configuration and not-trained errors must reach the caller; nothing
    /// in the pipeline should retry or fall back on them.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Error::Configuration(_) | Error::NotTrained)
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}
