//! Least-cost path tracing over an accumulated surface.

use crate::{Accumulation, CellTime, Direction, GeoprocError};
use geo::{Coord, LineString};

/// A named location (start or destination).
#[derive(Debug, Clone, PartialEq)]
pub struct Site {
    pub id: String,
    pub coord: Coord<f64>,
}

/// Least-cost route between a destination and its nearest source.
#[derive(Debug, Clone, PartialEq)]
pub struct CostPath {
    pub destination: String,

    /// Cell centers in the direction of travel.
    pub path: LineString<f64>,

    /// Accumulated cost at the destination, clamped to the cap.
    pub time: f64,

    /// True if the destination's true cost exceeds the cap.
    pub capped: bool,
}

/// Traces the least-cost path from every destination back to the
/// source it was reached from.
///
/// Outbound paths run source to destination; inbound paths run
/// destination to source.
pub fn trace_paths(
    acc: &Accumulation,
    destinations: &[Site],
    direction: Direction,
) -> Result<Vec<CostPath>, GeoprocError> {
    destinations
        .iter()
        .map(|site| trace_path(acc, site, direction))
        .collect()
}

fn trace_path(
    acc: &Accumulation,
    site: &Site,
    direction: Direction,
) -> Result<CostPath, GeoprocError> {
    let grid = acc.time();
    let (mut row, mut col) = grid
        .coord_to_cell(site.coord)
        .ok_or_else(|| GeoprocError::OutsideGrid(site.id.clone()))?;
    let (time, capped) = match acc.cell(row, col) {
        CellTime::Unreachable => return Err(GeoprocError::Unreachable(site.id.clone())),
        CellTime::Reached(time) => (time, false),
        CellTime::BeyondCap => (acc.cap(), true),
    };

    let mut coords = vec![grid.cell_center(row, col)];
    while acc.backlink().get(row, col) != Some(0.0) {
        // A chain longer than the grid has a cycle.
        if coords.len() > grid.len() {
            return Err(GeoprocError::BrokenBacklink(site.id.clone()));
        }
        (row, col) = acc
            .step(row, col)
            .ok_or_else(|| GeoprocError::BrokenBacklink(site.id.clone()))?;
        coords.push(grid.cell_center(row, col));
    }
    if direction == Direction::Outbound {
        coords.reverse();
    }

    Ok(CostPath {
        destination: site.id.clone(),
        path: LineString::new(coords),
        time,
        capped,
    })
}
