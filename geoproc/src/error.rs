use raster::RasterError;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum GeoprocError {
    #[error("{0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Raster(#[from] RasterError),

    #[error("{0}")]
    GeoJson(#[from] geojson::Error),

    #[error("{0}")]
    Json(#[from] serde_json::Error),

    #[error("workspace {0} is not a directory")]
    Workspace(PathBuf),

    #[error("grids do not share the same extent and resolution")]
    GridMismatch,

    #[error("{path}: expected a feature collection")]
    NotFeatureCollection { path: PathBuf },

    #[error("{path}: feature {feature} has unsupported geometry {kind}")]
    UnsupportedGeometry {
        path: PathBuf,
        feature: usize,
        kind: String,
    },

    #[error("{path}: feature {feature} has no numeric '{field}' attribute")]
    MissingAttribute {
        path: PathBuf,
        feature: usize,
        field: String,
    },

    #[error("no source cells")]
    NoSources,

    #[error("source cell ({0}, {1}) is outside the grid or has no data")]
    ExcludedSource(usize, usize),

    #[error("location '{0}' lies outside the grid")]
    OutsideGrid(String),

    #[error("location '{0}' lies in an excluded or unreachable cell")]
    Unreachable(String),

    #[error("broken back-link chain while tracing '{0}'")]
    BrokenBacklink(String),

    #[error("vertical factor table {path}: {msg}")]
    VerticalTable { path: PathBuf, msg: String },
}
