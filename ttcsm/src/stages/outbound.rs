//! Outbound travel time from the start locations.

use super::{dem::DemOutputs, StageContext};
use crate::{OrFail, StageError, StageResult};
use geoproc::{
    accumulate, geojson::Feature, raster::Grid, read_sites, trace_paths, write_features,
    Accumulation, CostPath, Direction, GeoprocError, Site, Surface, VerticalFactor, VerticalGraph,
};
use log::info;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq)]
pub struct OutboundOutputs {
    pub travel_time: PathBuf,
    pub backlink: PathBuf,
    /// 1 where the true travel time exceeds the cap.
    pub capped: PathBuf,
    pub cost_paths: Option<PathBuf>,

    /// Cells of the start locations.
    pub sources: Vec<(usize, usize)>,
    pub destinations: Vec<Site>,
    pub paths: Vec<CostPath>,
}

pub fn run(
    ctx: &StageContext<'_>,
    dem: &DemOutputs,
    travel_cost: &Path,
) -> StageResult<OutboundOutputs> {
    let params = ctx.params;
    let friction = ctx.workspace.open(travel_cost)?;
    let starts = read_sites(&params.start_locations)
        .or_fail(|| format!("start locations {:?}", params.start_locations))?;
    let sources = source_cells(&starts, &friction)?;
    info!("{} start cells", sources.len());

    let vertical_factor = vertical_factor(ctx)?;
    let elevation = ctx.workspace.open(&dem.extent_dem)?;
    let surface = vertical_factor.as_ref().map(|vertical_factor| Surface {
        elevation: &elevation,
        vertical_factor,
    });
    let acc = accumulate(
        &sources,
        &friction,
        surface,
        Direction::Outbound,
        f64::from(params.time_cap),
    )?;

    // Destinations are only read when paths are requested.
    let traced = if params.least_cost_path {
        Some(read_destinations(ctx).and_then(|destinations| {
            let paths = trace(&acc, &destinations, Direction::Outbound)?;
            Ok((destinations, paths))
        }))
    } else {
        None
    };

    let names = ctx.names;
    let (time, beyond_cap, backlink) = acc.into_grids();
    let travel_time = ctx.workspace.store(&names.travel_time_out, time)?;
    let capped = ctx.workspace.store(&names.capped_out, beyond_cap)?;
    let backlink = ctx.workspace.store(&names.backlink_out, backlink)?;

    let (destinations, paths, cost_paths) = match traced.transpose()? {
        Some((destinations, paths)) => {
            let path = ctx.workspace.path(&names.cost_paths_out);
            write_features(&path, paths.iter().map(Feature::from).collect())?;
            (destinations, paths, Some(path))
        }
        None => (Vec::new(), Vec::new(), None),
    };

    Ok(OutboundOutputs {
        travel_time,
        backlink,
        capped,
        cost_paths,
        sources,
        destinations,
        paths,
    })
}

/// Returns the cell of every start location.
pub(crate) fn source_cells(starts: &[Site], friction: &Grid) -> StageResult<Vec<(usize, usize)>> {
    if starts.is_empty() {
        return Err(StageError::Failure("no start locations".into()));
    }
    starts
        .iter()
        .map(|site| {
            let (row, col) = friction.coord_to_cell(site.coord).ok_or_else(|| {
                StageError::Failure(format!(
                    "start location '{}' lies outside the analysis extent",
                    site.id
                ))
            })?;
            match friction.get(row, col) {
                Some(_) => Ok((row, col)),
                None => Err(StageError::Failure(format!(
                    "start location '{}' lies on an excluded cell",
                    site.id
                ))),
            }
        })
        .collect()
}

/// Returns the vertical factor of path distance runs, or `None` for
/// cost distance.
pub(crate) fn vertical_factor(ctx: &StageContext<'_>) -> StageResult<Option<VerticalFactor>> {
    let params = ctx.params;
    if !params.path_distance {
        return Ok(None);
    }
    let vf = match (params.vertical_graph, &params.vertical_table) {
        (VerticalGraph::Table, Some(path)) => {
            let points =
                VerticalFactor::load_table(path).or_fail(|| "vertical graph Table".into())?;
            VerticalFactor::with_table(params.vertical_zero, points)
        }
        (VerticalGraph::Table, None) => {
            return Err(StageError::Failure("no vertical table".into()));
        }
        (graph, _) => VerticalFactor::new(graph, params.vertical_zero),
    };
    Ok(Some(vf))
}

/// Reads the destination layer.
pub(crate) fn read_destinations(ctx: &StageContext<'_>) -> StageResult<Vec<Site>> {
    let path = ctx
        .params
        .destinations
        .as_ref()
        .ok_or_else(|| StageError::Failure("no destinations".into()))?;
    let destinations = read_sites(path).or_fail(|| format!("destinations {path:?}"))?;
    if destinations.is_empty() {
        return Err(StageError::Failure(format!("destinations {path:?}: no locations")));
    }
    Ok(destinations)
}

/// Traces a path to every destination.
pub(crate) fn trace(
    acc: &Accumulation,
    destinations: &[Site],
    direction: Direction,
) -> StageResult<Vec<CostPath>> {
    trace_paths(acc, destinations, direction).map_err(|e| match e {
        GeoprocError::OutsideGrid(id) => StageError::Failure(format!(
            "destination '{id}' lies outside the analysis extent"
        )),
        GeoprocError::Unreachable(id) => StageError::Failure(format!(
            "destination '{id}' lies in an excluded or unreachable cell"
        )),
        other => StageError::Unexpected(other),
    })
}
