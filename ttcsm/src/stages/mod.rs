//! Pipeline stages.
//!
//! Every stage reads its inputs from the parameter set and the
//! workspace, persists its outputs to the workspace and returns their
//! paths. Grids written by one stage are never modified by another.

pub mod back;
pub mod cost;
pub mod dem;
pub mod fusion;
pub mod outbound;
pub mod speed;

use crate::{OutputNames, ParameterSet};
use geoproc::Workspace;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    DemPreparation,
    CostSurface,
    SpeedSurface,
    TravelCost,
    TravelTimeOut,
    TravelTimeBack,
}

impl Stage {
    /// Returns the name written to the pipeline log.
    pub fn name(&self) -> &'static str {
        match self {
            Self::DemPreparation => "dem_preparation",
            Self::CostSurface => "cost_surface",
            Self::SpeedSurface => "speed_surface",
            Self::TravelCost => "travel_cost",
            Self::TravelTimeOut => "travel_time_out",
            Self::TravelTimeBack => "travel_time_back",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Everything a stage may read.
pub struct StageContext<'a> {
    pub params: &'a ParameterSet,
    pub workspace: &'a Workspace,
    pub names: &'a OutputNames,
}
