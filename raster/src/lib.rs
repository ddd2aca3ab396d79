//! Single band raster grids.
//!
//! Grids are stored row-major with row 0 being the northern-most row, the
//! same layout used by ESRI ASCII (`.asc`) and binary float (`.flt` +
//! `.hdr`) grids, both of which can be read and written here.
//!
//! # References
//!
//! 1. [ESRI ASCII raster format](https://desktop.arcgis.com/en/arcmap/latest/manage-data/raster-and-images/esri-ascii-raster-format.htm)
//! 1. [Float to Raster](https://desktop.arcgis.com/en/arcmap/latest/tools/conversion-toolbox/float-to-raster.htm)

mod error;
mod header;

pub use crate::{
    error::RasterError,
    header::{ByteOrder, Header, DEFAULT_NODATA},
};
use byteorder::{BigEndian as BE, LittleEndian as LE, ReadBytesExt, WriteBytesExt};
use geo::geometry::{Coord, Rect};
use memmap2::Mmap;
use std::{
    ffi::OsStr,
    fmt,
    fs::File,
    io::{BufReader, BufWriter, Read, Write},
    mem::size_of,
    path::{Path, PathBuf},
};

/// Floating point type used for all coordinates.
pub type C = f64;

/// How to hold grid samples.
///
/// ASCII grids are always parsed into memory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GridMode {
    /// Parse samples into memory.
    #[default]
    InMem,

    /// Memory map `.flt` sample files.
    MemMap,
}

pub struct Grid {
    header: Header,
    samples: SampleStore,
}

impl fmt::Debug for Grid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let storage = match self.samples {
            SampleStore::InMem(_) => "InMem",
            SampleStore::MemMap(_) => "MemMap",
        };
        f.debug_struct("Grid")
            .field("header", &self.header)
            .field("storage", &storage)
            .finish_non_exhaustive()
    }
}

enum SampleStore {
    InMem(Box<[f32]>),
    MemMap(Mmap),
}

impl SampleStore {
    fn get_unchecked(&self, index: usize, byte_order: ByteOrder) -> f32 {
        match self {
            Self::InMem(samples) => samples[index],
            Self::MemMap(raw) => {
                let start = index * size_of::<f32>();
                let bytes = &mut &raw.as_ref()[start..start + size_of::<f32>()];
                // Length was validated when mapping.
                match byte_order {
                    ByteOrder::LsbFirst => bytes.read_f32::<LE>().unwrap_or(f32::NAN),
                    ByteOrder::MsbFirst => bytes.read_f32::<BE>().unwrap_or(f32::NAN),
                }
            }
        }
    }
}

impl Grid {
    /// Returns a grid holding raw `samples`, where values equal to
    /// `header.nodata` mean "no data".
    pub fn new(header: Header, samples: Vec<f32>) -> Result<Self, RasterError> {
        if samples.len() != header.len() {
            return Err(RasterError::Len {
                expected: header.len(),
                found: samples.len(),
            });
        }
        Ok(Self {
            header,
            samples: SampleStore::InMem(samples.into_boxed_slice()),
        })
    }

    /// Returns a grid where every cell holds `value`.
    pub fn filled(header: Header, value: Option<f32>) -> Self {
        let raw = value.unwrap_or(header.nodata);
        Self {
            header,
            samples: SampleStore::InMem(vec![raw; header.len()].into_boxed_slice()),
        }
    }

    /// Returns a grid where cell `(row, col)` holds `f(row, col)`.
    pub fn from_fn<F>(header: Header, mut f: F) -> Self
    where
        F: FnMut(usize, usize) -> Option<f32>,
    {
        let mut samples = Vec::with_capacity(header.len());
        for row in 0..header.nrows {
            for col in 0..header.ncols {
                samples.push(f(row, col).unwrap_or(header.nodata));
            }
        }
        Self {
            header,
            samples: SampleStore::InMem(samples.into_boxed_slice()),
        }
    }

    /// Returns a grid built from optional per-cell values in row-major
    /// order.
    pub fn from_values(header: Header, values: Vec<Option<f32>>) -> Result<Self, RasterError> {
        let samples = values
            .into_iter()
            .map(|value| value.unwrap_or(header.nodata))
            .collect();
        Self::new(header, samples)
    }

    /// Opens the grid at `path`, choosing the reader from its extension.
    pub fn open<P: AsRef<Path>>(path: P, mode: GridMode) -> Result<Self, RasterError> {
        let path = path.as_ref();
        match path.extension().and_then(OsStr::to_str) {
            Some("asc") => Self::load_ascii(path),
            Some("flt") => match mode {
                GridMode::InMem => Self::load(path),
                GridMode::MemMap => Self::memmap(path),
            },
            _ => Err(RasterError::Format(path.to_owned())),
        }
    }

    /// Returns a grid read into memory from the `.flt` file at `path`.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, RasterError> {
        let header = read_sidecar(path.as_ref())?;
        let mut file = BufReader::new(File::open(path)?);
        let mut samples = Vec::with_capacity(header.len());
        for _ in 0..header.len() {
            let sample = match header.byte_order {
                ByteOrder::LsbFirst => file.read_f32::<LE>()?,
                ByteOrder::MsbFirst => file.read_f32::<BE>()?,
            };
            samples.push(sample);
        }
        Self::new(header, samples)
    }

    /// Returns a grid using the memory-mapped `.flt` file as storage.
    pub fn memmap<P: AsRef<Path>>(path: P) -> Result<Self, RasterError> {
        let header = read_sidecar(path.as_ref())?;
        let file = File::open(path)?;
        let mmap = unsafe { Mmap::map(&file)? };
        let found = mmap.len() / size_of::<f32>();
        if found != header.len() {
            return Err(RasterError::Len {
                expected: header.len(),
                found,
            });
        }
        Ok(Self {
            header,
            samples: SampleStore::MemMap(mmap),
        })
    }

    /// Returns a grid parsed from the ESRI ASCII file at `path`.
    pub fn load_ascii<P: AsRef<Path>>(path: P) -> Result<Self, RasterError> {
        let path = path.as_ref();
        let mut text = String::new();
        File::open(path)?.read_to_string(&mut text)?;
        let (mut header, consumed) = Header::parse(path, &text)?;
        header.byte_order = ByteOrder::LsbFirst;
        let samples = text
            .lines()
            .skip(consumed)
            .flat_map(str::split_whitespace)
            .map(|token| {
                token
                    .parse::<f32>()
                    .map_err(|_| RasterError::Value(token.to_owned()))
            })
            .collect::<Result<Vec<f32>, RasterError>>()?;
        Self::new(header, samples)
    }

    /// Writes this grid to `path`.
    ///
    /// `.asc` paths are written as ASCII grids, anything else as a
    /// little-endian `.flt` with a `.hdr` sidecar.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), RasterError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        if path.extension().and_then(OsStr::to_str) == Some("asc") {
            let mut wtr = BufWriter::new(File::create(path)?);
            write!(wtr, "{}", self.header)?;
            for row in 0..self.header.nrows {
                let line = (0..self.header.ncols)
                    .map(|col| self.raw(row, col).to_string())
                    .collect::<Vec<_>>()
                    .join(" ");
                writeln!(wtr, "{line}")?;
            }
            wtr.flush()?;
        } else {
            let mut hdr = BufWriter::new(File::create(path.with_extension("hdr"))?);
            write!(hdr, "{}", self.header)?;
            writeln!(hdr, "byteorder     LSBFIRST")?;
            hdr.flush()?;
            let mut wtr = BufWriter::new(File::create(path)?);
            for index in 0..self.len() {
                wtr.write_f32::<LE>(self.samples.get_unchecked(index, self.header.byte_order))?;
            }
            wtr.flush()?;
        }
        Ok(())
    }

    pub fn header(&self) -> &Header {
        &self.header
    }

    /// Returns (rows, columns).
    pub fn dimensions(&self) -> (usize, usize) {
        (self.header.nrows, self.header.ncols)
    }

    /// Returns the number of cells in this grid.
    #[allow(clippy::len_without_is_empty)]
    pub fn len(&self) -> usize {
        self.header.len()
    }

    pub fn cell_size(&self) -> C {
        self.header.cell_size
    }

    pub fn contains(&self, row: usize, col: usize) -> bool {
        row < self.header.nrows && col < self.header.ncols
    }

    /// Returns the value at `(row, col)`, or `None` for no data and
    /// out-of-bounds cells.
    pub fn get(&self, row: usize, col: usize) -> Option<f32> {
        if self.contains(row, col) {
            self.get_index(self.xy_to_linear_index(row, col))
        } else {
            None
        }
    }

    /// Returns the value at linear (row-major) `index`.
    pub fn get_index(&self, index: usize) -> Option<f32> {
        let raw = self.samples.get_unchecked(index, self.header.byte_order);
        if raw.is_nan() || raw == self.header.nodata {
            None
        } else {
            Some(raw)
        }
    }

    /// Returns the value of the cell containing `coord`.
    pub fn sample_at(&self, coord: Coord<C>) -> Option<f32> {
        let (row, col) = self.coord_to_cell(coord)?;
        self.get(row, col)
    }

    /// Returns the `(row, col)` of the cell containing `coord`, if any.
    #[allow(clippy::cast_precision_loss)]
    pub fn coord_to_cell(&self, coord: Coord<C>) -> Option<(usize, usize)> {
        let Header {
            ncols,
            nrows,
            xll_corner,
            yll_corner,
            cell_size,
            ..
        } = self.header;
        let col = ((coord.x - xll_corner) / cell_size).floor();
        let row_from_south = ((coord.y - yll_corner) / cell_size).floor();
        if col < 0.0 || row_from_south < 0.0 || col >= ncols as C || row_from_south >= nrows as C
        {
            return None;
        }
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let (col, row_from_south) = (col as usize, row_from_south as usize);
        Some((nrows - 1 - row_from_south, col))
    }

    /// Returns the coordinate of the center of cell `(row, col)`.
    #[allow(clippy::cast_precision_loss)]
    pub fn cell_center(&self, row: usize, col: usize) -> Coord<C> {
        let Header {
            nrows,
            xll_corner,
            yll_corner,
            cell_size,
            ..
        } = self.header;
        Coord {
            x: xll_corner + (col as C + 0.5) * cell_size,
            y: yll_corner + ((nrows - row) as C - 0.5) * cell_size,
        }
    }

    /// Returns the bounding rectangle of this grid.
    #[allow(clippy::cast_precision_loss)]
    pub fn extent(&self) -> Rect<C> {
        let Header {
            ncols,
            nrows,
            xll_corner,
            yll_corner,
            cell_size,
            ..
        } = self.header;
        Rect::new(
            Coord {
                x: xll_corner,
                y: yll_corner,
            },
            Coord {
                x: xll_corner + ncols as C * cell_size,
                y: yll_corner + nrows as C * cell_size,
            },
        )
    }

    pub fn same_geometry(&self, other: &Self) -> bool {
        self.header.same_geometry(&other.header)
    }

    /// Returns the sub-grid of every cell whose center lies within
    /// `extent`.
    pub fn clip(&self, extent: Rect<C>) -> Result<Self, RasterError> {
        let cs = self.header.cell_size;
        let own = self.extent();
        let min_x = extent.min().x.max(own.min().x);
        let max_x = extent.max().x.min(own.max().x);
        let min_y = extent.min().y.max(own.min().y);
        let max_y = extent.max().y.min(own.max().y);

        // Snap to cell centers so that clipping never shifts the lattice.
        let first_col = ((min_x - own.min().x) / cs - 0.5).ceil().max(0.0);
        let last_col = ((max_x - own.min().x) / cs - 0.5).floor();
        let first_row = ((own.max().y - max_y) / cs - 0.5).ceil().max(0.0);
        let last_row = ((own.max().y - min_y) / cs - 0.5).floor();
        if last_col < first_col || last_row < first_row {
            return Err(RasterError::Extent);
        }

        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let (first_col, last_col, first_row, last_row) = (
            first_col as usize,
            (last_col as usize).min(self.header.ncols - 1),
            first_row as usize,
            (last_row as usize).min(self.header.nrows - 1),
        );
        let ncols = last_col - first_col + 1;
        let nrows = last_row - first_row + 1;
        #[allow(clippy::cast_precision_loss)]
        let header = Header {
            ncols,
            nrows,
            xll_corner: own.min().x + first_col as C * cs,
            yll_corner: own.max().y - (last_row + 1) as C * cs,
            ..self.header
        };
        Ok(Self::from_fn(header, |row, col| {
            self.get(first_row + row, first_col + col)
        }))
    }

    /// Returns an iterator over this grid's cells.
    pub fn iter(&self) -> impl Iterator<Item = Sample<'_>> + '_ {
        (0..self.len()).map(|index| Sample { grid: self, index })
    }

    /// Returns the row-major index of `(row, col)`.
    pub fn xy_to_linear_index(&self, row: usize, col: usize) -> usize {
        row * self.header.ncols + col
    }

    /// Returns the `(row, col)` of row-major `index`.
    pub fn linear_index_to_xy(&self, index: usize) -> (usize, usize) {
        (index / self.header.ncols, index % self.header.ncols)
    }
}

/// Private API
impl Grid {
    fn raw(&self, row: usize, col: usize) -> f32 {
        self.get(row, col).unwrap_or(self.header.nodata)
    }
}

/// A single grid cell.
pub struct Sample<'a> {
    grid: &'a Grid,
    index: usize,
}

impl<'a> Sample<'a> {
    pub fn value(&self) -> Option<f32> {
        self.grid.get_index(self.index)
    }

    /// Returns `(row, col)`.
    pub fn position(&self) -> (usize, usize) {
        self.grid.linear_index_to_xy(self.index)
    }

    pub fn center(&self) -> Coord<C> {
        let (row, col) = self.position();
        self.grid.cell_center(row, col)
    }
}

fn read_sidecar(path: &Path) -> Result<Header, RasterError> {
    let hdr_path: PathBuf = path.with_extension("hdr");
    let mut text = String::new();
    File::open(&hdr_path)?.read_to_string(&mut text)?;
    let (header, _) = Header::parse(&hdr_path, &text)?;
    Ok(header)
}

#[cfg(test)]
mod tests {
    use super::{Coord, Grid, GridMode, Header, Rect};
    use approx::assert_relative_eq;
    use tempfile::tempdir;

    /// 3 rows x 4 columns of 10 m cells with the lower left corner at
    /// (100, 200). Cell (1, 2) has no data.
    #[allow(clippy::cast_precision_loss)]
    fn sample_grid() -> Grid {
        let header = Header::new(4, 3, 100.0, 200.0, 10.0);
        Grid::from_fn(header, |row, col| {
            (row, col).ne(&(1, 2)).then(|| (row * 4 + col) as f32)
        })
    }

    #[test]
    fn test_nodata_reads_as_none() {
        let grid = sample_grid();
        assert_eq!(grid.get(1, 2), None);
        assert_eq!(grid.get(1, 3), Some(7.0));
        assert_eq!(grid.get(3, 0), None);
    }

    #[test]
    fn test_coord_to_cell() {
        let grid = sample_grid();
        // North west corner cell.
        assert_eq!(grid.coord_to_cell(Coord { x: 101.0, y: 229.0 }), Some((0, 0)));
        // South east corner cell.
        assert_eq!(grid.coord_to_cell(Coord { x: 139.0, y: 201.0 }), Some((2, 3)));
        // Smidge west, south, east and north of the grid.
        assert_eq!(grid.coord_to_cell(Coord { x: 99.9, y: 210.0 }), None);
        assert_eq!(grid.coord_to_cell(Coord { x: 110.0, y: 199.9 }), None);
        assert_eq!(grid.coord_to_cell(Coord { x: 140.1, y: 210.0 }), None);
        assert_eq!(grid.coord_to_cell(Coord { x: 110.0, y: 230.1 }), None);
    }

    #[test]
    fn test_cell_center_round_trips_through_coord_to_cell() {
        let grid = sample_grid();
        for sample in grid.iter() {
            assert_eq!(grid.coord_to_cell(sample.center()), Some(sample.position()));
        }
        let center = grid.cell_center(2, 0);
        assert_relative_eq!(center.x, 105.0);
        assert_relative_eq!(center.y, 205.0);
    }

    #[test]
    fn test_clip_snaps_to_cells() {
        let grid = sample_grid();
        let clipped = grid
            .clip(Rect::new(
                Coord { x: 112.0, y: 203.0 },
                Coord { x: 128.0, y: 218.0 },
            ))
            .unwrap();
        assert_eq!(clipped.dimensions(), (2, 2));
        assert_relative_eq!(clipped.header().xll_corner, 110.0);
        assert_relative_eq!(clipped.header().yll_corner, 200.0);
        assert_eq!(clipped.get(0, 0), Some(5.0));
        assert_eq!(clipped.get(0, 1), None);
        assert_eq!(clipped.get(1, 1), Some(10.0));
    }

    #[test]
    fn test_clip_outside_is_an_error() {
        let grid = sample_grid();
        let far_away = Rect::new(Coord { x: 0.0, y: 0.0 }, Coord { x: 10.0, y: 10.0 });
        assert!(grid.clip(far_away).is_err());
    }

    #[test]
    fn test_save_and_open_all_formats() {
        let dir = tempdir().unwrap();
        let grid = sample_grid();
        for (name, mode) in [
            ("grid.asc", GridMode::InMem),
            ("grid.flt", GridMode::InMem),
            ("grid.flt", GridMode::MemMap),
        ] {
            let path = dir.path().join(name);
            grid.save(&path).unwrap();
            let reopened = Grid::open(&path, mode).unwrap();
            assert!(reopened.same_geometry(&grid));
            for sample in grid.iter() {
                let (row, col) = sample.position();
                assert_eq!(reopened.get(row, col), sample.value(), "{name} {mode:?}");
            }
        }
    }

    #[test]
    fn test_debug_omits_samples() {
        let text = format!("{:?}", sample_grid());
        assert!(text.starts_with("Grid { header: Header {"), "{text}");
        assert!(text.contains("storage: \"InMem\""), "{text}");
        assert!(!text.contains("samples"), "{text}");
    }

    #[test]
    fn test_wrong_sample_count_is_an_error() {
        let header = Header::new(2, 2, 0.0, 0.0, 1.0);
        assert!(Grid::new(header, vec![1.0; 3]).is_err());
    }

    #[test]
    fn test_unknown_extension_is_an_error() {
        assert!(Grid::open("dem.tif", GridMode::InMem).is_err());
    }
}
