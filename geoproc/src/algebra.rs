//! Cell-wise raster algebra.
//!
//! Every operation yields no data wherever an operand has no data,
//! except [`select`] whose whole purpose is to fill gaps.

use crate::GeoprocError;
use raster::{Grid, Header};
use rayon::prelude::*;

/// Returns a mask holding 1 where `predicate` holds and no data
/// elsewhere (including cells without data).
pub fn mask<P>(grid: &Grid, predicate: P) -> Grid
where
    P: Fn(f32) -> bool + Sync,
{
    map(grid, |value| predicate(value).then_some(1.0))
}

/// Returns `f` applied to every cell with data.
pub fn map<F>(grid: &Grid, f: F) -> Grid
where
    F: Fn(f32) -> Option<f32> + Sync,
{
    let values = (0..grid.len())
        .into_par_iter()
        .map(|index| grid.get_index(index).and_then(&f))
        .collect();
    from_values(*grid.header(), values)
}

/// Returns `f(a, b)` for every cell where both grids have data.
pub fn combine<F>(a: &Grid, b: &Grid, f: F) -> Result<Grid, GeoprocError>
where
    F: Fn(f32, f32) -> Option<f32> + Sync,
{
    ensure_aligned(a, b)?;
    let values = (0..a.len())
        .into_par_iter()
        .map(|index| match (a.get_index(index), b.get_index(index)) {
            (Some(a), Some(b)) => f(a, b),
            _ => None,
        })
        .collect();
    Ok(from_values(*a.header(), values))
}

/// Returns `primary` where it has data and `fallback` elsewhere.
pub fn select(primary: &Grid, fallback: &Grid) -> Result<Grid, GeoprocError> {
    ensure_aligned(primary, fallback)?;
    let values = (0..primary.len())
        .into_par_iter()
        .map(|index| primary.get_index(index).or_else(|| fallback.get_index(index)))
        .collect();
    Ok(from_values(*primary.header(), values))
}

/// Returns `grid` with every cell outside `mask` set to no data.
pub fn apply_mask(grid: &Grid, mask: &Grid) -> Result<Grid, GeoprocError> {
    combine(grid, mask, |value, _| Some(value))
}

/// Returns `grid` with every value above `max` replaced by `max`.
pub fn clamp(grid: &Grid, max: f32) -> Grid {
    map(grid, |value| Some(value.min(max)))
}

/// Returns `grid` sampled at the cell centers of `template`
/// (nearest neighbor).
pub fn resample(grid: &Grid, template: &Header) -> Grid {
    if grid.header().same_geometry(template) {
        return map(grid, Some);
    }
    let target = Grid::filled(*template, None);
    Grid::from_fn(*template, |row, col| grid.sample_at(target.cell_center(row, col)))
}

fn ensure_aligned(a: &Grid, b: &Grid) -> Result<(), GeoprocError> {
    if a.same_geometry(b) {
        Ok(())
    } else {
        Err(GeoprocError::GridMismatch)
    }
}

fn from_values(header: Header, values: Vec<Option<f32>>) -> Grid {
    let mut values = values.into_iter();
    Grid::from_fn(header, |_, _| values.next().flatten())
}
