//! Network-to-raster conversion.

use geo::{Coord, LineString};
use itertools::Itertools;
use raster::{Grid, Header};

/// A network line carrying an attribute value (e.g. a speed).
#[derive(Debug, Clone, PartialEq)]
pub struct NetworkLine {
    pub geometry: LineString<f64>,
    pub value: f32,
}

/// Returns a grid holding, for every cell crossed by a line, the
/// largest value of the lines crossing it. Cells crossed by no line
/// have no data.
///
/// Each segment is walked in steps of a quarter cell so that no cell
/// it passes through is skipped.
pub fn rasterize_lines(lines: &[NetworkLine], header: &Header) -> Grid {
    let template = Grid::filled(*header, None);
    let mut cells: Vec<Option<f32>> = vec![None; header.len()];
    let step = header.cell_size / 4.0;

    for line in lines {
        let mut burn = |coord: Coord<f64>| {
            if let Some((row, col)) = template.coord_to_cell(coord) {
                let cell = &mut cells[template.xy_to_linear_index(row, col)];
                *cell = Some(cell.map_or(line.value, |v| v.max(line.value)));
            }
        };
        for (&start, &end) in line.geometry.coords().tuple_windows() {
            let delta = end - start;
            let length = delta.x.hypot(delta.y);
            #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
            let steps = (length / step).ceil() as usize;
            for i in 0..=steps {
                #[allow(clippy::cast_precision_loss)]
                let t = if steps == 0 { 0.0 } else { i as f64 / steps as f64 };
                burn(start + delta * t);
            }
        }
        if let [only] = line.geometry.0.as_slice() {
            burn(*only);
        }
    }

    let mut cells = cells.into_iter();
    Grid::from_fn(*header, |_, _| cells.next().flatten())
}
