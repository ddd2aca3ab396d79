//! Vertical factor graphs for anisotropic (path distance) accumulation.
//!
//! A vertical factor maps the vertical relative moving angle (VRMA), the
//! slope in degrees of a move in its direction of travel, to a multiplier
//! of the move's cost. Angles outside a graph's cut angles are
//! impassable.
//!
//! Curve shapes and default parameters follow the published ArcGIS Path
//! Distance vertical factor family.
//!
//! # References
//!
//! 1. [How the horizontal and vertical factors affect path distance](https://desktop.arcgis.com/en/arcmap/latest/tools/spatial-analyst-toolbox/how-the-horizonal-and-vertical-factors-affect-path-distance.htm)

use crate::GeoprocError;
use std::{fmt, fs, path::Path, str::FromStr};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VerticalGraph {
    Binary,
    Linear,
    SymLinear,
    InverseLinear,
    SymInverseLinear,
    Cos,
    Sec,
    CosSec,
    SecCos,
    Table,
}

impl VerticalGraph {
    pub const ALL: [Self; 10] = [
        Self::Binary,
        Self::Linear,
        Self::SymLinear,
        Self::InverseLinear,
        Self::SymInverseLinear,
        Self::Cos,
        Self::Sec,
        Self::CosSec,
        Self::SecCos,
        Self::Table,
    ];

    /// Returns the canonical keyword.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Binary => "Binary",
            Self::Linear => "Linear",
            Self::SymLinear => "Sym_Linear",
            Self::InverseLinear => "Inverse_Linear",
            Self::SymInverseLinear => "Sym_Inverse_Linear",
            Self::Cos => "Cos",
            Self::Sec => "Sec",
            Self::CosSec => "Cos_Sec",
            Self::SecCos => "Sec_Cos",
            Self::Table => "Table",
        }
    }
}

impl fmt::Display for VerticalGraph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("unknown vertical factor graph '{0}'")]
pub struct UnknownGraph(pub String);

/// Parses keywords case-insensitively (`Sym_linear` and `sym_linear`
/// both name [`VerticalGraph::SymLinear`]).
impl FromStr for VerticalGraph {
    type Err = UnknownGraph;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|graph| graph.name().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| UnknownGraph(s.to_owned()))
    }
}

/// A parameterized vertical factor graph.
#[derive(Debug, Clone, PartialEq)]
pub struct VerticalFactor {
    graph: VerticalGraph,

    /// Factor at a VRMA of zero.
    zero_factor: f64,

    /// VRMA (degrees) at or below which moves are impassable.
    low_cut: f64,

    /// VRMA (degrees) at or above which moves are impassable.
    high_cut: f64,

    /// Rate of change of the linear graphs, per degree.
    slope: f64,

    /// Exponent of the trigonometric graphs.
    power: f64,

    /// `(vrma, factor)` points sorted by VRMA, for [`VerticalGraph::Table`].
    table: Vec<(f64, f64)>,
}

impl VerticalFactor {
    /// Returns `graph` with its default cut angles, slope and power.
    ///
    /// A [`VerticalGraph::Table`] built this way has no points and makes
    /// every move impassable; use [`VerticalFactor::with_table`].
    pub fn new(graph: VerticalGraph, zero_factor: f64) -> Self {
        let (cut, slope) = match graph {
            VerticalGraph::Binary => (30.0, 0.0),
            VerticalGraph::Linear | VerticalGraph::SymLinear => (90.0, 1.0 / 90.0),
            VerticalGraph::InverseLinear | VerticalGraph::SymInverseLinear => {
                (45.0, -1.0 / 45.0)
            }
            VerticalGraph::Cos
            | VerticalGraph::Sec
            | VerticalGraph::CosSec
            | VerticalGraph::SecCos
            | VerticalGraph::Table => (90.0, 0.0),
        };
        Self {
            graph,
            zero_factor,
            low_cut: -cut,
            high_cut: cut,
            slope,
            power: 1.0,
            table: Vec::new(),
        }
    }

    /// Returns a table graph interpolating `points`.
    pub fn with_table(zero_factor: f64, mut points: Vec<(f64, f64)>) -> Self {
        points.sort_by(|a, b| a.0.total_cmp(&b.0));
        let low_cut = points.first().map_or(0.0, |p| p.0);
        let high_cut = points.last().map_or(0.0, |p| p.0);
        Self {
            table: points,
            low_cut,
            high_cut,
            ..Self::new(VerticalGraph::Table, zero_factor)
        }
    }

    /// Reads a table of whitespace separated `vrma factor` rows.
    ///
    /// Blank lines and lines starting with `#` are skipped.
    pub fn load_table(path: &Path) -> Result<Vec<(f64, f64)>, GeoprocError> {
        let mk_err = |msg: String| GeoprocError::VerticalTable {
            path: path.to_owned(),
            msg,
        };
        let text = fs::read_to_string(path)?;
        let mut points = Vec::new();
        for (n, line) in text.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let mut fields = line.split_whitespace().map(str::parse::<f64>);
            match (fields.next(), fields.next(), fields.next()) {
                (Some(Ok(vrma)), Some(Ok(factor)), None) if vrma.is_finite() && factor >= 0.0 => {
                    points.push((vrma, factor));
                }
                _ => return Err(mk_err(format!("line {}: expected 'vrma factor'", n + 1))),
            }
        }
        if points.len() < 2 {
            return Err(mk_err("need at least two points".into()));
        }
        Ok(points)
    }

    /// Returns the cost multiplier for a move at `vrma` degrees, or
    /// `None` if the move is impassable.
    pub fn factor(&self, vrma: f64) -> Option<f64> {
        if self.graph != VerticalGraph::Table && (vrma <= self.low_cut || vrma >= self.high_cut) {
            return None;
        }
        let zf = self.zero_factor;
        let trig = |f: fn(f64) -> f64| zf * f(vrma.to_radians()).powf(self.power);
        let cos = |a: f64| a.cos();
        let sec = |a: f64| a.cos().recip();
        let factor = match self.graph {
            VerticalGraph::Binary => zf,
            VerticalGraph::Linear | VerticalGraph::InverseLinear => zf + self.slope * vrma,
            VerticalGraph::SymLinear | VerticalGraph::SymInverseLinear => {
                zf + self.slope * vrma.abs()
            }
            VerticalGraph::Cos => trig(cos),
            VerticalGraph::Sec => trig(sec),
            VerticalGraph::CosSec if vrma < 0.0 => trig(cos),
            VerticalGraph::CosSec => trig(sec),
            VerticalGraph::SecCos if vrma < 0.0 => trig(sec),
            VerticalGraph::SecCos => trig(cos),
            VerticalGraph::Table => self.interpolate(vrma)?,
        };
        (factor.is_finite() && factor > 0.0).then_some(factor)
    }
}

/// Private API
impl VerticalFactor {
    fn interpolate(&self, vrma: f64) -> Option<f64> {
        if vrma < self.low_cut || vrma > self.high_cut {
            return None;
        }
        let upper = self.table.iter().position(|&(angle, _)| angle >= vrma)?;
        let (a1, f1) = self.table[upper];
        if upper == 0 || a1 == vrma {
            return Some(f1);
        }
        let (a0, f0) = self.table[upper - 1];
        Some(f0 + (f1 - f0) * (vrma - a0) / (a1 - a0))
    }
}
