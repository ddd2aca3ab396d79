//! Speed surface: network speeds over a base walking speed.

use super::{dem::DemOutputs, StageContext};
use crate::{OrFail, StageError, StageResult};
use geoproc::{apply_mask, map, rasterize_lines, read_lines, select, NetworkLine};
use log::info;
use std::path::{Path, PathBuf};

/// Converts km/h to seconds per meter.
pub fn seconds_per_meter(km_h: f32) -> f32 {
    3.6 / km_h
}

/// Tobler's slope attenuation of a flat-ground walking speed.
pub fn tobler(walking_km_h: f64, slope_degrees: f64) -> f64 {
    walking_km_h * (-3.5 * slope_degrees.to_radians().tan()).exp()
}

pub fn run(ctx: &StageContext<'_>, dem: &DemOutputs) -> StageResult<PathBuf> {
    let params = ctx.params;
    let terrain = ctx.workspace.open(&dem.extent_dem)?;
    let slope = ctx.workspace.open(&dem.slope)?;
    let below_slope = ctx.workspace.open(&dem.below_slope)?;
    let header = terrain.header();

    let roads = read_network(&params.roads, &params.speed_field, "road")?;
    let road_speed = rasterize_lines(&roads, header);
    info!("{} road lines", roads.len());

    #[allow(clippy::cast_possible_truncation)]
    let walking = if params.slope_adjusted_walking {
        map(&slope, |degrees| {
            Some(tobler(params.walking_speed, f64::from(degrees)) as f32)
        })
    } else {
        let speed = params.walking_speed as f32;
        map(&slope, |_| Some(speed))
    };

    // Roads take precedence over trails, trails over walking.
    let off_road = match &params.trails {
        Some(path) => {
            let trails = read_network(path, &params.speed_field, "trail")?;
            info!("{} trail lines", trails.len());
            let trail_speed = rasterize_lines(&trails, header);
            let off_road = select(&trail_speed, &walking)?;
            ctx.workspace.store(&ctx.names.trail_speed, trail_speed)?;
            off_road
        }
        None => walking,
    };
    let km_h = select(&road_speed, &off_road)?;
    ctx.workspace.store(&ctx.names.road_speed, road_speed)?;

    let speed = apply_mask(&map(&km_h, |v| Some(seconds_per_meter(v))), &below_slope)?;
    Ok(ctx.workspace.store(&ctx.names.speed_surface, speed)?)
}

fn read_network(path: &Path, field: &str, kind: &str) -> StageResult<Vec<NetworkLine>> {
    let lines = read_lines(path, field).or_fail(|| format!("{kind} network {path:?}"))?;
    if let Some(line) = lines.iter().find(|line| line.value <= 0.0) {
        return Err(StageError::Failure(format!(
            "{kind} network {path:?}: non-positive speed {}",
            line.value
        )));
    }
    Ok(lines)
}
