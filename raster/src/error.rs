use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RasterError {
    #[error("{0}")]
    Io(#[from] std::io::Error),

    #[error("invalid grid header {0}: {1}")]
    Header(PathBuf, String),

    #[error("expected {expected} samples, found {found}")]
    Len { expected: usize, found: usize },

    #[error("unsupported grid format {0}")]
    Format(PathBuf),

    #[error("invalid ASCII grid value '{0}'")]
    Value(String),

    #[error("extent does not overlap grid")]
    Extent,
}
