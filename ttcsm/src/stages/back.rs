//! Return travel time to the start locations and round-trip paths.

use super::{
    dem::DemOutputs,
    outbound::{trace, vertical_factor, OutboundOutputs},
    StageContext,
};
use crate::StageResult;
use geoproc::{
    accumulate, clamp, combine, geojson::Feature, merge_round_trips, write_features, Direction,
    Surface,
};
use log::info;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackOutputs {
    pub travel_time: PathBuf,
    pub backlink: PathBuf,
    /// 1 where the true return time exceeds the cap.
    pub capped: PathBuf,
    /// Outbound plus return time, clamped to the cap.
    pub round_trip: PathBuf,
    /// 1 where the true round-trip time exceeds the cap.
    pub round_trip_capped: PathBuf,
    pub cost_paths: Option<PathBuf>,
}

pub fn run(
    ctx: &StageContext<'_>,
    dem: &DemOutputs,
    travel_cost: &Path,
    outbound: &OutboundOutputs,
) -> StageResult<BackOutputs> {
    let params = ctx.params;
    let friction = ctx.workspace.open(travel_cost)?;
    let vertical_factor = vertical_factor(ctx)?;
    let elevation = ctx.workspace.open(&dem.extent_dem)?;
    let surface = vertical_factor.as_ref().map(|vertical_factor| Surface {
        elevation: &elevation,
        vertical_factor,
    });
    let cap = f64::from(params.time_cap);
    let acc = accumulate(&outbound.sources, &friction, surface, Direction::Inbound, cap)?;

    let traced = if params.least_cost_path {
        Some(trace(&acc, &outbound.destinations, Direction::Inbound))
    } else {
        None
    };

    let (time, beyond_cap, backlink) = acc.into_grids();
    let time_out = ctx.workspace.open(&outbound.travel_time)?;
    let capped_out = ctx.workspace.open(&outbound.capped)?;
    #[allow(clippy::cast_possible_truncation)]
    let cap = cap as f32;
    // A leg already beyond the cap keeps the total beyond it.
    let total = combine(&time_out, &time, |out, back| Some(out + back))?;
    let either_capped = combine(&capped_out, &beyond_cap, |out, back| Some(out.max(back)))?;
    let round_trip_capped = combine(&total, &either_capped, |total, flag| {
        Some(if flag > 0.5 || total > cap { 1.0 } else { 0.0 })
    })?;
    let round_trip = clamp(&total, cap);

    let names = ctx.names;
    let travel_time = ctx.workspace.store(&names.travel_time_back, time)?;
    let backlink = ctx.workspace.store(&names.backlink_back, backlink)?;
    let capped = ctx.workspace.store(&names.capped_back, beyond_cap)?;
    let round_trip = ctx.workspace.store(&names.travel_time_round_trip, round_trip)?;
    let round_trip_capped = ctx
        .workspace
        .store(&names.capped_round_trip, round_trip_capped)?;

    let cost_paths = match traced.transpose()? {
        Some(back_paths) => {
            let merged = merge_round_trips(&outbound.paths, &back_paths);
            info!("{} round-trip paths", merged.len());
            let path = ctx.workspace.path(&names.cost_paths_round_trip);
            write_features(&path, merged.iter().map(Feature::from).collect())?;
            Some(path)
        }
        None => None,
    };

    Ok(BackOutputs {
        travel_time,
        backlink,
        capped,
        round_trip,
        round_trip_capped,
        cost_paths,
    })
}
