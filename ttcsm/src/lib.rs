//! Travel time cost surface model.
//!
//! Derives travel time from one or more start locations across a
//! landscape. A validated [`ParameterSet`] drives a [`Pipeline`] of
//! stages: terrain preparation, cost surface, speed surface, travel
//! cost fusion, outbound accumulation and, for round trips, return
//! accumulation. Every stage outcome is appended to a [`PipelineLog`].

mod error;
pub mod logfile;
mod names;
pub mod params;
mod pipeline;
pub mod stages;

pub use crate::{
    error::{OrFail, PipelineError, StageError, StageResult, ValidationError},
    logfile::{Outcome, PipelineLog},
    names::OutputNames,
    params::{ParameterSet, RawParameters, RawValue, TimeCalculation, UnknownTimeCalculation},
    pipeline::{Pipeline, PipelineReport, PipelineState},
};
pub use geoproc;
