//! Grid geoprocessing engine.
//!
//! Capabilities consumed by the travel time pipeline: slope derivation,
//! masking and cell-wise algebra, network rasterization, multi-source
//! cost accumulation, least-cost path tracing, path merging and GeoJSON
//! vector I/O. Grids are stored and shared through a [`Workspace`].

mod accumulate;
mod algebra;
mod error;
mod merge;
mod rasterize;
mod slope;
mod trace;
mod vector;
mod vertical_factor;
mod workspace;

pub use crate::{
    accumulate::{accumulate, Accumulation, CellTime, Direction, Surface, NEIGHBORS},
    algebra::{apply_mask, clamp, combine, map, mask, resample, select},
    error::GeoprocError,
    merge::{merge_round_trips, RoundTripPath},
    rasterize::{rasterize_lines, NetworkLine},
    slope::slope,
    trace::{trace_paths, CostPath, Site},
    vector::{read_lines, read_sites, write_features},
    vertical_factor::{UnknownGraph, VerticalFactor, VerticalGraph},
    workspace::{Workspace, GRID_EXT},
};
pub use {geo, geojson, raster};
