use raster::Grid;

/// Returns the slope, in degrees, of every cell of `dem`.
///
/// Uses Horn's third-order finite difference over the 3x3 neighborhood.
/// Neighbors which are off the grid or have no data take the center
/// cell's elevation; cells without elevation have no slope.
pub fn slope(dem: &Grid) -> Grid {
    let cs = dem.cell_size();
    let (nrows, ncols) = dem.dimensions();
    Grid::from_fn(*dem.header(), |row, col| {
        let center = f64::from(dem.get(row, col)?);
        let z = |dr: isize, dc: isize| {
            let r = row.checked_add_signed(dr).filter(|&r| r < nrows);
            let c = col.checked_add_signed(dc).filter(|&c| c < ncols);
            r.zip(c)
                .and_then(|(r, c)| dem.get(r, c))
                .map_or(center, f64::from)
        };
        let dz_dx = ((z(-1, 1) + 2.0 * z(0, 1) + z(1, 1)) - (z(-1, -1) + 2.0 * z(0, -1) + z(1, -1)))
            / (8.0 * cs);
        let dz_dy = ((z(1, -1) + 2.0 * z(1, 0) + z(1, 1)) - (z(-1, -1) + 2.0 * z(-1, 0) + z(-1, 1)))
            / (8.0 * cs);
        #[allow(clippy::cast_possible_truncation)]
        let degrees = dz_dx.hypot(dz_dy).atan().to_degrees() as f32;
        Some(degrees)
    })
}

#[cfg(test)]
mod tests {
    use super::slope;
    use approx::assert_relative_eq;
    use raster::{Grid, Header};

    #[test]
    fn test_flat_dem_has_no_slope() {
        let dem = Grid::filled(Header::new(5, 5, 0.0, 0.0, 30.0), Some(1500.0));
        let slope = slope(&dem);
        for sample in slope.iter() {
            assert_eq!(sample.value(), Some(0.0));
        }
    }

    #[test]
    #[allow(clippy::cast_precision_loss)]
    fn test_one_to_one_ramp_is_45_degrees() {
        // Rises 10 m per 10 m cell towards the east.
        let dem = Grid::from_fn(Header::new(5, 5, 0.0, 0.0, 10.0), |_, col| {
            Some(col as f32 * 10.0)
        });
        let slope = slope(&dem);
        assert_relative_eq!(slope.get(2, 2).unwrap(), 45.0, epsilon = 1e-4);
        // Edge cells see half the rise.
        assert!(slope.get(2, 0).unwrap() < 45.0);
    }

    #[test]
    fn test_nodata_stays_nodata() {
        let dem = Grid::from_fn(Header::new(3, 3, 0.0, 0.0, 10.0), |row, col| {
            (row, col).ne(&(1, 1)).then_some(100.0)
        });
        let slope = slope(&dem);
        assert_eq!(slope.get(1, 1), None);
        assert_eq!(slope.get(0, 0), Some(0.0));
    }
}
