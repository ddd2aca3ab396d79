//! Cost surface: land cover classes joined against the cost table.

use super::{dem::DemOutputs, StageContext};
use crate::{OrFail, StageError, StageResult};
use geoproc::{apply_mask, map, resample};
use log::{debug, info};
use serde::Deserialize;
use std::{
    collections::{btree_map::Entry, BTreeMap, BTreeSet},
    path::{Path, PathBuf},
};

/// Cost multiplier of each land cover class.
pub type CostTable = BTreeMap<i64, f64>;

#[derive(Debug, Deserialize)]
struct CostRow {
    class: i64,
    cost: f64,
}

/// Reads a `class,cost` CSV table.
///
/// Classes must be unique and costs positive and finite.
pub fn read_cost_table(path: &Path) -> StageResult<CostTable> {
    let fail = |msg: String| StageError::Failure(format!("cost table {path:?}: {msg}"));
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_path(path)
        .map_err(|e| fail(e.to_string()))?;
    let mut table = CostTable::new();
    for row in reader.deserialize::<CostRow>() {
        let CostRow { class, cost } = row.map_err(|e| fail(e.to_string()))?;
        if !(cost.is_finite() && cost > 0.0) {
            return Err(fail(format!("class {class} has invalid cost {cost}")));
        }
        match table.entry(class) {
            Entry::Occupied(_) => return Err(fail(format!("class {class} appears twice"))),
            Entry::Vacant(entry) => {
                entry.insert(cost);
            }
        }
    }
    if table.is_empty() {
        return Err(fail("no classes".into()));
    }
    debug!("read {} cost classes from {path:?}", table.len());
    Ok(table)
}

pub fn run(ctx: &StageContext<'_>, dem: &DemOutputs) -> StageResult<PathBuf> {
    let params = ctx.params;
    let table = read_cost_table(&params.cost_table)?;

    let terrain = ctx.workspace.open(&dem.extent_dem)?;
    let below_slope = ctx.workspace.open(&dem.below_slope)?;
    let land_cover = ctx
        .workspace
        .open(&params.land_cover)
        .or_fail(|| format!("land cover {:?}", params.land_cover))?;
    let land_cover = resample(&land_cover, terrain.header());

    let mut classes = BTreeSet::new();
    for value in land_cover.iter().filter_map(|sample| sample.value()) {
        let class = value.round();
        if (value - class).abs() > 1e-4 {
            return Err(StageError::Failure(format!(
                "land cover {:?} holds non-integer class {value}",
                params.land_cover
            )));
        }
        #[allow(clippy::cast_possible_truncation)]
        let class = class as i64;
        classes.insert(class);
    }

    let unpriced: Vec<String> = classes
        .iter()
        .filter(|class| !table.contains_key(*class))
        .map(ToString::to_string)
        .collect();
    if !unpriced.is_empty() {
        return Err(StageError::Failure(format!(
            "cost table {:?} has no entry for land cover class {}",
            params.cost_table,
            unpriced.join(", ")
        )));
    }
    let absent: Vec<String> = table
        .keys()
        .filter(|class| !classes.contains(*class))
        .map(ToString::to_string)
        .collect();
    if !absent.is_empty() {
        return Err(StageError::Failure(format!(
            "cost table {:?} lists class {} absent from land cover {:?}",
            params.cost_table,
            absent.join(", "),
            params.land_cover
        )));
    }
    info!("{} land cover classes priced", classes.len());

    #[allow(clippy::cast_possible_truncation)]
    let cost = map(&land_cover, |value| {
        table.get(&(value.round() as i64)).map(|&cost| cost as f32)
    });
    let cost = apply_mask(&cost, &below_slope)?;

    ctx.workspace.store(&ctx.names.land_cover, land_cover)?;
    Ok(ctx.workspace.store(&ctx.names.cost_surface, cost)?)
}
