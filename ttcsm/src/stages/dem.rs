//! Terrain preparation: clip, slope and traversability.

use super::StageContext;
use crate::{OrFail, StageError, StageResult};
use geoproc::{map, mask, slope};
use log::info;
use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DemOutputs {
    /// Terrain model clipped to the analysis extent.
    pub extent_dem: PathBuf,
    pub slope: PathBuf,
    /// 1 where slope is at most the maximum slope, no data elsewhere.
    pub below_slope: PathBuf,
}

pub fn run(ctx: &StageContext<'_>) -> StageResult<DemOutputs> {
    let params = ctx.params;
    let dem = ctx
        .workspace
        .open(&params.dem)
        .or_fail(|| format!("terrain model {:?}", params.dem))?;

    let dem = match params.extent {
        Some(extent) => dem.clip(extent).map_err(|e| {
            StageError::Failure(format!(
                "terrain model {:?} and extent {:?} do not overlap: {e}",
                params.dem, extent
            ))
        })?,
        None => map(&dem, Some),
    };
    if dem.iter().all(|sample| sample.value().is_none()) {
        return Err(StageError::Failure(format!(
            "terrain model {:?} has no data within the extent",
            params.dem
        )));
    }
    let (nrows, ncols) = dem.dimensions();
    info!("terrain model {nrows}x{ncols} cells of {} m", dem.cell_size());

    let slope = slope(&dem);
    #[allow(clippy::cast_possible_truncation)]
    let max_slope = params.max_slope as f32;
    let below_slope = mask(&slope, |degrees| degrees <= max_slope);

    let names = ctx.names;
    Ok(DemOutputs {
        extent_dem: ctx.workspace.store(&names.extent_dem, dem)?,
        slope: ctx.workspace.store(&names.slope, slope)?,
        below_slope: ctx.workspace.store(&names.below_slope, below_slope)?,
    })
}
