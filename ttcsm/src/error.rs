use geoproc::GeoprocError;
use std::path::PathBuf;
use thiserror::Error;

/// Bad or missing configuration, detected before any stage runs.
#[derive(Error, Debug, PartialEq)]
pub enum ValidationError {
    #[error("missing required parameter '{0}'")]
    Missing(&'static str),

    #[error("parameter '{field}': cannot parse '{value}'")]
    Parse { field: &'static str, value: String },

    #[error("parameter '{field}' = {value} is out of range {range}")]
    OutOfRange {
        field: &'static str,
        value: String,
        range: &'static str,
    },

    #[error("parameter '{field}': unrecognized value '{value}'")]
    Unrecognized { field: &'static str, value: String },

    #[error("least cost paths requested without destinations")]
    MissingDestinations,

    #[error("vertical graph Table requires a vertical table")]
    MissingVerticalTable,
}

/// Outcome of a stage which could not produce its output.
#[derive(Error, Debug)]
pub enum StageError {
    /// A failure the stage's contract anticipates (missing input,
    /// invalid class mapping, destination outside the traversable area).
    #[error("{0}")]
    Failure(String),

    /// A fault outside the stage's contract.
    #[error("{0}")]
    Unexpected(#[from] GeoprocError),
}

pub type StageResult<T> = Result<T, StageError>;

/// Converts engine errors the stage anticipates into declared failures.
pub trait OrFail<T> {
    fn or_fail(self, context: impl FnOnce() -> String) -> StageResult<T>;
}

impl<T> OrFail<T> for Result<T, GeoprocError> {
    fn or_fail(self, context: impl FnOnce() -> String) -> StageResult<T> {
        self.map_err(|e| StageError::Failure(format!("{}: {e}", context())))
    }
}

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("pipeline log {path}: {source}")]
    Log {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("{stage} failed: {message}")]
    Stage { stage: &'static str, message: String },

    #[error("unexpected error in {stage}: {source}")]
    Unexpected {
        stage: &'static str,
        source: GeoprocError,
    },
}
