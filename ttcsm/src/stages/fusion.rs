//! Travel cost: cost multiplier times seconds per meter.

use super::StageContext;
use crate::StageResult;
use geoproc::combine;
use std::path::{Path, PathBuf};

pub fn run(ctx: &StageContext<'_>, cost_surface: &Path, speed_surface: &Path) -> StageResult<PathBuf> {
    let cost = ctx.workspace.open(cost_surface)?;
    let speed = ctx.workspace.open(speed_surface)?;
    let travel_cost = combine(&cost, &speed, |cost, speed| Some(cost * speed))?;
    Ok(ctx.workspace.store(&ctx.names.travel_cost, travel_cost)?)
}
