//! ESRI grid header (`.hdr` sidecar and `.asc` preamble).

use crate::{RasterError, C};
use std::{fmt, path::Path};

/// Byte order of a binary `.flt` sample file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ByteOrder {
    LsbFirst,
    MsbFirst,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Header {
    /// Number of columns.
    pub ncols: usize,

    /// Number of rows.
    pub nrows: usize,

    /// X coordinate of the lower left corner of the lower left cell.
    pub xll_corner: C,

    /// Y coordinate of the lower left corner of the lower left cell.
    pub yll_corner: C,

    /// Edge length of a (square) cell.
    pub cell_size: C,

    /// Sample value marking a cell without data.
    pub nodata: f32,

    pub byte_order: ByteOrder,
}

pub const DEFAULT_NODATA: f32 = -9999.0;

impl Header {
    pub fn new(ncols: usize, nrows: usize, xll_corner: C, yll_corner: C, cell_size: C) -> Self {
        Self {
            ncols,
            nrows,
            xll_corner,
            yll_corner,
            cell_size,
            nodata: DEFAULT_NODATA,
            byte_order: ByteOrder::LsbFirst,
        }
    }

    /// Returns the number of cells described by this header.
    pub fn len(&self) -> usize {
        self.ncols * self.nrows
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns true if both headers describe the same cells.
    ///
    /// Nodata value and byte order are storage details and ignored.
    pub fn same_geometry(&self, other: &Self) -> bool {
        let tolerance = self.cell_size * 1e-6;
        self.ncols == other.ncols
            && self.nrows == other.nrows
            && (self.cell_size - other.cell_size).abs() <= tolerance
            && (self.xll_corner - other.xll_corner).abs() <= tolerance
            && (self.yll_corner - other.yll_corner).abs() <= tolerance
    }

    /// Parses `key value` lines. Returns the header and the number of
    /// lines consumed.
    pub fn parse(path: &Path, text: &str) -> Result<(Self, usize), RasterError> {
        let mk_err = |msg: String| RasterError::Header(path.to_owned(), msg);

        let mut ncols = None;
        let mut nrows = None;
        let mut xll = None;
        let mut yll = None;
        let mut x_is_center = false;
        let mut y_is_center = false;
        let mut cell_size = None;
        let mut nodata = DEFAULT_NODATA;
        let mut byte_order = ByteOrder::LsbFirst;
        let mut consumed = 0;

        for line in text.lines() {
            let mut parts = line.split_whitespace();
            let (Some(key), Some(value)) = (parts.next(), parts.next()) else {
                if line.trim().is_empty() {
                    consumed += 1;
                    continue;
                }
                break;
            };
            let key = key.to_ascii_lowercase();
            let number = || {
                value
                    .parse::<C>()
                    .map_err(|_| mk_err(format!("{key} is not a number: {value}")))
            };
            match key.as_str() {
                "ncols" => ncols = Some(number()? as usize),
                "nrows" => nrows = Some(number()? as usize),
                "xllcorner" => xll = Some(number()?),
                "yllcorner" => yll = Some(number()?),
                "xllcenter" => {
                    xll = Some(number()?);
                    x_is_center = true;
                }
                "yllcenter" => {
                    yll = Some(number()?);
                    y_is_center = true;
                }
                "cellsize" => cell_size = Some(number()?),
                #[allow(clippy::cast_possible_truncation)]
                "nodata_value" => nodata = number()? as f32,
                "byteorder" => {
                    byte_order = match value.to_ascii_uppercase().as_str() {
                        "LSBFIRST" | "I" => ByteOrder::LsbFirst,
                        "MSBFIRST" | "M" => ByteOrder::MsbFirst,
                        other => return Err(mk_err(format!("unknown byte order {other}"))),
                    }
                }
                // First data row of an ASCII grid.
                _ if key.parse::<f64>().is_ok() => break,
                _ => return Err(mk_err(format!("unknown key {key}"))),
            }
            consumed += 1;
        }

        let ncols = ncols.ok_or_else(|| mk_err("missing ncols".into()))?;
        let nrows = nrows.ok_or_else(|| mk_err("missing nrows".into()))?;
        let cell_size = cell_size.ok_or_else(|| mk_err("missing cellsize".into()))?;
        if cell_size <= 0.0 {
            return Err(mk_err(format!("cellsize must be positive, got {cell_size}")));
        }
        let half = cell_size / 2.0;
        let xll_corner = xll.ok_or_else(|| mk_err("missing xllcorner".into()))?
            - if x_is_center { half } else { 0.0 };
        let yll_corner = yll.ok_or_else(|| mk_err("missing yllcorner".into()))?
            - if y_is_center { half } else { 0.0 };

        Ok((
            Self {
                ncols,
                nrows,
                xll_corner,
                yll_corner,
                cell_size,
                nodata,
                byte_order,
            },
            consumed,
        ))
    }
}

/// Formats the header as an ASCII grid preamble.
impl fmt::Display for Header {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "ncols         {}", self.ncols)?;
        writeln!(f, "nrows         {}", self.nrows)?;
        writeln!(f, "xllcorner     {}", self.xll_corner)?;
        writeln!(f, "yllcorner     {}", self.yll_corner)?;
        writeln!(f, "cellsize      {}", self.cell_size)?;
        writeln!(f, "NODATA_value  {}", self.nodata)
    }
}
