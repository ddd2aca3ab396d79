//! Parameter set and its validation.

use crate::ValidationError;
use geoproc::{
    geo::{coord, Rect},
    VerticalGraph,
};
use log::debug;
use serde::Deserialize;
use std::{fmt, path::PathBuf, str::FromStr};
use thiserror::Error;

/// Log file name used when none is configured.
pub const DEFAULT_LOG_FILE: &str = "AA_TTCSM_logfile.txt";

/// Suffix of outputs produced without path distance.
pub const COST_DISTANCE_SUFFIX: &str = "Cost_Distance";

/// A configuration scalar as it appears in a parameter file.
///
/// Numbers may be given as JSON numbers or numeric strings; flags as JSON
/// booleans or `"yes"`/`"no"`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum RawValue {
    Bool(bool),
    Number(f64),
    Text(String),
}

/// Unvalidated configuration.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RawParameters {
    pub start_locations: Option<PathBuf>,
    pub roads: Option<PathBuf>,
    pub trails: Option<PathBuf>,
    pub dem: Option<PathBuf>,
    pub land_cover: Option<PathBuf>,
    pub destinations: Option<PathBuf>,
    pub cost_table: Option<PathBuf>,
    pub workspace: Option<PathBuf>,
    pub log_file: Option<PathBuf>,
    pub extent: Option<[f64; 4]>,
    pub walking_speed: Option<RawValue>,
    pub slope_adjusted_walking: Option<RawValue>,
    pub speed_field: Option<String>,
    pub max_slope: Option<RawValue>,
    pub time_cap: Option<RawValue>,
    pub trails_available: Option<RawValue>,
    pub path_distance: Option<RawValue>,
    pub vertical_graph: Option<String>,
    pub vertical_zero: Option<RawValue>,
    pub vertical_table: Option<PathBuf>,
    pub time_calculation: Option<String>,
    pub least_cost_path: Option<RawValue>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeCalculation {
    OneWay,
    RoundTrip,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("unknown time calculation '{0}'")]
pub struct UnknownTimeCalculation(pub String);

/// Ignores case, underscores and spaces (`Round_Trip`, `round trip`).
impl FromStr for TimeCalculation {
    type Err = UnknownTimeCalculation;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace(['_', ' '], "").as_str() {
            "oneway" => Ok(Self::OneWay),
            "roundtrip" => Ok(Self::RoundTrip),
            _ => Err(UnknownTimeCalculation(s.to_owned())),
        }
    }
}

impl fmt::Display for TimeCalculation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::OneWay => f.write_str("OneWay"),
            Self::RoundTrip => f.write_str("RoundTrip"),
        }
    }
}

/// Validated, immutable configuration of one pipeline run.
#[derive(Debug, Clone, PartialEq)]
pub struct ParameterSet {
    pub start_locations: PathBuf,
    pub roads: PathBuf,
    /// `None` unless trails were both supplied and declared available.
    pub trails: Option<PathBuf>,
    pub dem: PathBuf,
    /// Class grid joined against the cost table.
    pub land_cover: PathBuf,
    pub destinations: Option<PathBuf>,
    pub cost_table: PathBuf,
    pub workspace: PathBuf,
    pub log_file: PathBuf,
    pub extent: Option<Rect<f64>>,
    /// Base walking speed, km/h.
    pub walking_speed: f64,
    pub slope_adjusted_walking: bool,
    /// Network attribute carrying speed in km/h.
    pub speed_field: String,
    /// Steepest traversable slope, degrees.
    pub max_slope: f64,
    /// Seconds.
    pub time_cap: u32,
    pub path_distance: bool,
    pub vertical_graph: VerticalGraph,
    pub vertical_zero: f64,
    /// `Some` only when `vertical_graph` is `Table`.
    pub vertical_table: Option<PathBuf>,
    pub time_calculation: TimeCalculation,
    pub least_cost_path: bool,
}

impl ParameterSet {
    /// Returns the discriminator appended to output names.
    pub fn suffix(&self) -> &'static str {
        if self.path_distance {
            self.vertical_graph.name()
        } else {
            COST_DISTANCE_SUFFIX
        }
    }

    pub fn round_trip(&self) -> bool {
        self.time_calculation == TimeCalculation::RoundTrip
    }
}

impl RawParameters {
    /// Checks ranges, enumerations and cross-field invariants.
    ///
    /// Never touches the file system.
    pub fn validate(self) -> Result<ParameterSet, ValidationError> {
        let workspace = required("workspace", self.workspace)?;
        let dem = required("dem", self.dem)?;

        let walking_speed = number("walking_speed", self.walking_speed)?;
        if !(walking_speed.is_finite() && walking_speed > 0.0) {
            return Err(out_of_range("walking_speed", walking_speed, "(0, inf)"));
        }
        let max_slope = number("max_slope", self.max_slope)?;
        if !(0.0..=90.0).contains(&max_slope) {
            return Err(out_of_range("max_slope", max_slope, "[0, 90]"));
        }
        let time_cap = time_cap(self.time_cap)?;
        let vertical_zero = match self.vertical_zero {
            None => 1.0,
            some => number("vertical_zero", some)?,
        };
        if !vertical_zero.is_finite() {
            return Err(out_of_range("vertical_zero", vertical_zero, "finite"));
        }

        // The graph only matters, and is only required, for path distance.
        let path_distance = flag("path_distance", self.path_distance)?;
        let vertical_graph = match self.vertical_graph.as_deref().map(str::trim) {
            None | Some("") if path_distance => {
                return Err(ValidationError::Missing("vertical_graph"));
            }
            None | Some("") => VerticalGraph::Binary,
            Some(name) => name
                .parse()
                .map_err(|_| unrecognized("vertical_graph", name))?,
        };
        let time_calculation = match self.time_calculation.as_deref().map(str::trim) {
            None | Some("") => TimeCalculation::OneWay,
            Some(name) => name
                .parse()
                .map_err(|_| unrecognized("time_calculation", name))?,
        };

        let trails_available = flag("trails_available", self.trails_available)?;
        let least_cost_path = flag("least_cost_path", self.least_cost_path)?;
        let destinations = optional(self.destinations);
        if least_cost_path && destinations.is_none() {
            return Err(ValidationError::MissingDestinations);
        }

        let vertical_table = optional(self.vertical_table);
        let vertical_table = if vertical_graph == VerticalGraph::Table {
            Some(vertical_table.ok_or(ValidationError::MissingVerticalTable)?)
        } else {
            if let Some(table) = vertical_table {
                debug!("ignoring vertical table {table:?} for graph {vertical_graph}");
            }
            None
        };

        let trails = optional(self.trails).filter(|_| trails_available);

        let extent = self
            .extent
            .map(|[xmin, ymin, xmax, ymax]| {
                if xmin < xmax && ymin < ymax {
                    Ok(Rect::new(coord! { x: xmin, y: ymin }, coord! { x: xmax, y: ymax }))
                } else {
                    Err(ValidationError::OutOfRange {
                        field: "extent",
                        value: format!("[{xmin}, {ymin}, {xmax}, {ymax}]"),
                        range: "xmin < xmax, ymin < ymax",
                    })
                }
            })
            .transpose()?;

        let log_file = optional(self.log_file).unwrap_or_else(|| workspace.join(DEFAULT_LOG_FILE));

        Ok(ParameterSet {
            start_locations: required("start_locations", self.start_locations)?,
            roads: required("roads", self.roads)?,
            trails,
            land_cover: optional(self.land_cover).unwrap_or_else(|| dem.clone()),
            dem,
            destinations,
            cost_table: required("cost_table", self.cost_table)?,
            log_file,
            workspace,
            extent,
            walking_speed,
            slope_adjusted_walking: flag("slope_adjusted_walking", self.slope_adjusted_walking)?,
            speed_field: self
                .speed_field
                .filter(|field| !field.trim().is_empty())
                .unwrap_or_else(|| "speed".to_owned()),
            max_slope,
            time_cap,
            path_distance,
            vertical_graph,
            vertical_zero,
            vertical_table,
            time_calculation,
            least_cost_path,
        })
    }
}

/// Empty paths count as absent.
fn optional(path: Option<PathBuf>) -> Option<PathBuf> {
    path.filter(|p| !p.as_os_str().is_empty())
}

fn required(field: &'static str, path: Option<PathBuf>) -> Result<PathBuf, ValidationError> {
    optional(path).ok_or(ValidationError::Missing(field))
}

fn number(field: &'static str, value: Option<RawValue>) -> Result<f64, ValidationError> {
    match value.ok_or(ValidationError::Missing(field))? {
        RawValue::Number(n) => Ok(n),
        RawValue::Text(s) => s.trim().parse().map_err(|_| ValidationError::Parse {
            field,
            value: s.clone(),
        }),
        RawValue::Bool(b) => Err(ValidationError::Parse {
            field,
            value: b.to_string(),
        }),
    }
}

fn flag(field: &'static str, value: Option<RawValue>) -> Result<bool, ValidationError> {
    match value {
        None => Ok(false),
        Some(RawValue::Bool(b)) => Ok(b),
        Some(RawValue::Text(s)) => match s.trim().to_ascii_lowercase().as_str() {
            "yes" | "true" => Ok(true),
            "no" | "false" | "" => Ok(false),
            _ => Err(unrecognized(field, &s)),
        },
        Some(RawValue::Number(n)) => Err(unrecognized(field, &n.to_string())),
    }
}

fn time_cap(value: Option<RawValue>) -> Result<u32, ValidationError> {
    let seconds = number("time_cap", value)?;
    if seconds.fract() != 0.0 {
        return Err(ValidationError::Parse {
            field: "time_cap",
            value: seconds.to_string(),
        });
    }
    if !(seconds >= 1.0 && seconds <= f64::from(u32::MAX)) {
        return Err(out_of_range("time_cap", seconds, "[1, 4294967295]"));
    }
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let seconds = seconds as u32;
    Ok(seconds)
}

fn out_of_range(field: &'static str, value: f64, range: &'static str) -> ValidationError {
    ValidationError::OutOfRange {
        field,
        value: value.to_string(),
        range,
    }
}

fn unrecognized(field: &'static str, value: &str) -> ValidationError {
    ValidationError::Unrecognized {
        field,
        value: value.to_owned(),
    }
}
