use thiserror::Error;

/// Fatal, document-level failures. A pipeline that returns one of these
/// produces no output for its library.
#[derive(Error, Debug)]
pub enum RollupError {
    #[error("Malformed input document: {0}")]
    MalformedInput(String),
}

/// Why a single entity was left out of a rollup. These never abort a run.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    #[error("missing media/part record")]
    MissingMedia,
    #[error("missing required field '{0}'")]
    MissingRequiredField(&'static str),
    #[error("invalid record: {0}")]
    InvalidRecord(String),
}
