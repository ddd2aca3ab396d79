//! Multi-source cost accumulation over the 8-connected cell graph.
//!
//! Friction values are costs per meter of travel. Moving between two
//! adjacent cells costs their mean friction times the distance between
//! their centers. With a [`Surface`] the distance becomes the surface
//! distance over the elevation grid and the cost is further scaled by
//! the vertical factor of the move's slope.

use crate::{GeoprocError, VerticalFactor};
use raster::Grid;
use std::{cmp::Ordering, collections::BinaryHeap, f64::consts::SQRT_2};

/// Row/column offsets of back-link codes 1 through 8 (E, SE, S, SW, W,
/// NW, N, NE). Code 0 marks a source cell.
pub const NEIGHBORS: [(isize, isize); 8] = [
    (0, 1),
    (1, 1),
    (1, 0),
    (1, -1),
    (0, -1),
    (-1, -1),
    (-1, 0),
    (-1, 1),
];

/// Which way travel is measured.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Cost of travelling from the sources to every cell.
    Outbound,
    /// Cost of travelling from every cell to the sources.
    Inbound,
}

/// Elevation model and vertical factor for anisotropic accumulation.
#[derive(Debug, Clone, Copy)]
pub struct Surface<'a> {
    pub elevation: &'a Grid,
    pub vertical_factor: &'a VerticalFactor,
}

/// Accumulated cost of a single cell.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CellTime {
    /// No traversable route connects the cell to a source.
    Unreachable,
    /// Cumulative cost at or below the cap.
    Reached(f64),
    /// Cumulative cost above the cap; its stored value is the cap.
    BeyondCap,
}

/// Output of [`accumulate`].
#[derive(Debug)]
pub struct Accumulation {
    /// Cumulative cost clamped to `cap`; no data where unreachable.
    time: Grid,

    /// 1 where the true cumulative cost exceeds `cap`, 0 where it does
    /// not, no data where unreachable.
    beyond_cap: Grid,

    /// Back-link code of every reached cell.
    backlink: Grid,

    cap: f64,
}

impl Accumulation {
    pub fn time(&self) -> &Grid {
        &self.time
    }

    pub fn beyond_cap(&self) -> &Grid {
        &self.beyond_cap
    }

    pub fn backlink(&self) -> &Grid {
        &self.backlink
    }

    pub fn cap(&self) -> f64 {
        self.cap
    }

    pub fn cell(&self, row: usize, col: usize) -> CellTime {
        match (self.time.get(row, col), self.beyond_cap.get(row, col)) {
            (Some(_), Some(flag)) if flag > 0.5 => CellTime::BeyondCap,
            (Some(time), _) => CellTime::Reached(f64::from(time)),
            _ => CellTime::Unreachable,
        }
    }

    /// Returns the cell `(row, col)`'s back-link points to, or `None`
    /// for sources and unreached cells.
    pub fn step(&self, row: usize, col: usize) -> Option<(usize, usize)> {
        let code = self.backlink.get(row, col)?;
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let code = code as usize;
        let (dr, dc) = *NEIGHBORS.get(code.checked_sub(1)?)?;
        let (nrows, ncols) = self.backlink.dimensions();
        let r = row.checked_add_signed(dr).filter(|&r| r < nrows)?;
        let c = col.checked_add_signed(dc).filter(|&c| c < ncols)?;
        Some((r, c))
    }

    pub fn into_grids(self) -> (Grid, Grid, Grid) {
        (self.time, self.beyond_cap, self.backlink)
    }
}

/// Accumulates the least cumulative cost from `sources` to every cell of
/// `friction`, clamping reported values to `cap`.
///
/// Cells without friction are barriers. Every source must be a cell with
/// friction.
pub fn accumulate(
    sources: &[(usize, usize)],
    friction: &Grid,
    surface: Option<Surface<'_>>,
    direction: Direction,
    cap: f64,
) -> Result<Accumulation, GeoprocError> {
    if sources.is_empty() {
        return Err(GeoprocError::NoSources);
    }
    if let Some(surface) = surface {
        if !surface.elevation.same_geometry(friction) {
            return Err(GeoprocError::GridMismatch);
        }
    }

    let (nrows, ncols) = friction.dimensions();
    let cs = friction.cell_size();
    let mut cost = vec![f64::INFINITY; friction.len()];
    let mut link: Vec<Option<u8>> = vec![None; friction.len()];
    let mut settled = vec![false; friction.len()];
    let mut heap = BinaryHeap::new();

    for &(row, col) in sources {
        if friction.get(row, col).is_none() {
            return Err(GeoprocError::ExcludedSource(row, col));
        }
        let index = friction.xy_to_linear_index(row, col);
        cost[index] = 0.0;
        link[index] = Some(0);
        heap.push(HeapItem { cost: 0.0, index });
    }

    while let Some(HeapItem { cost: acc, index }) = heap.pop() {
        if settled[index] {
            continue;
        }
        settled[index] = true;
        let (row, col) = friction.linear_index_to_xy(index);
        let Some(fa) = friction.get_index(index) else {
            continue;
        };

        for (code, &(dr, dc)) in (1u8..).zip(NEIGHBORS.iter()) {
            let Some(r) = row.checked_add_signed(dr).filter(|&r| r < nrows) else {
                continue;
            };
            let Some(c) = col.checked_add_signed(dc).filter(|&c| c < ncols) else {
                continue;
            };
            let next = friction.xy_to_linear_index(r, c);
            if settled[next] {
                continue;
            }
            let Some(fb) = friction.get_index(next) else {
                continue;
            };
            let h = if dr != 0 && dc != 0 { cs * SQRT_2 } else { cs };
            let mean = (f64::from(fa) + f64::from(fb)) / 2.0;
            let weight = match surface {
                None => Some(h * mean),
                Some(surface) => surface_weight(surface, direction, index, next, h, mean),
            };
            let Some(weight) = weight else {
                continue;
            };
            let total = acc + weight;
            if total < cost[next] {
                cost[next] = total;
                // The neighbor links back along the opposite direction.
                link[next] = Some((code + 3) % 8 + 1);
                heap.push(HeapItem {
                    cost: total,
                    index: next,
                });
            }
        }
    }

    let header = *friction.header();
    let mut cells = cost.iter();
    let time = Grid::from_fn(header, |_, _| {
        let total = *cells.next()?;
        #[allow(clippy::cast_possible_truncation)]
        total.is_finite().then(|| total.min(cap) as f32)
    });
    let mut cells = cost.iter();
    let beyond_cap = Grid::from_fn(header, |_, _| {
        let total = *cells.next()?;
        total
            .is_finite()
            .then(|| if total > cap { 1.0 } else { 0.0 })
    });
    let mut links = link.into_iter();
    let backlink = Grid::from_fn(header, |_, _| links.next().flatten().map(f32::from));

    Ok(Accumulation {
        time,
        beyond_cap,
        backlink,
        cap,
    })
}

/// Returns the cost of moving between cells `from` and `to` over the
/// surface, or `None` if the move is impassable.
fn surface_weight(
    surface: Surface<'_>,
    direction: Direction,
    from: usize,
    to: usize,
    h: f64,
    mean: f64,
) -> Option<f64> {
    let za = f64::from(surface.elevation.get_index(from)?);
    let zb = f64::from(surface.elevation.get_index(to)?);
    // Inbound searches run against the direction of travel.
    let dz = match direction {
        Direction::Outbound => zb - za,
        Direction::Inbound => za - zb,
    };
    let vrma = dz.atan2(h).to_degrees();
    let factor = surface.vertical_factor.factor(vrma)?;
    Some(h.hypot(dz) * mean * factor)
}

#[derive(Clone, Copy, Debug)]
struct HeapItem {
    cost: f64,
    index: usize,
}

impl PartialEq for HeapItem {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for HeapItem {}

// Min-heap by cost via reversed ordering.
impl PartialOrd for HeapItem {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for HeapItem {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .cost
            .total_cmp(&self.cost)
            .then_with(|| other.index.cmp(&self.index))
    }
}
