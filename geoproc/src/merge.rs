//! Merging of outbound and return paths into round-trip records.

use crate::CostPath;
use geo::{LineString, MultiLineString};
use std::collections::HashMap;

/// Outbound and return routes of one destination.
#[derive(Debug, Clone, PartialEq)]
pub struct RoundTripPath {
    pub destination: String,

    /// Outbound lines followed by return lines.
    pub lines: MultiLineString<f64>,

    pub time_out: Option<f64>,

    pub time_back: Option<f64>,

    /// True if either leg exceeds the cap.
    pub capped: bool,
}

impl RoundTripPath {
    /// Returns the sum of both legs, or `None` if a leg is missing.
    pub fn total_time(&self) -> Option<f64> {
        Some(self.time_out? + self.time_back?)
    }
}

/// Dissolves `outbound` and `back` paths into exactly one record per
/// destination, ordered by first appearance.
pub fn merge_round_trips(outbound: &[CostPath], back: &[CostPath]) -> Vec<RoundTripPath> {
    let mut merged: Vec<RoundTripPath> = Vec::new();
    let mut by_id: HashMap<&str, usize> = HashMap::new();
    let mut out_lines: Vec<Vec<LineString<f64>>> = Vec::new();
    let mut back_lines: Vec<Vec<LineString<f64>>> = Vec::new();

    for (leg, paths) in [(Leg::Out, outbound), (Leg::Back, back)] {
        for path in paths {
            let slot = *by_id.entry(path.destination.as_str()).or_insert_with(|| {
                merged.push(RoundTripPath {
                    destination: path.destination.clone(),
                    lines: MultiLineString::new(Vec::new()),
                    time_out: None,
                    time_back: None,
                    capped: false,
                });
                out_lines.push(Vec::new());
                back_lines.push(Vec::new());
                merged.len() - 1
            });
            let record = &mut merged[slot];
            record.capped |= path.capped;
            let (time, lines) = match leg {
                Leg::Out => (&mut record.time_out, &mut out_lines[slot]),
                Leg::Back => (&mut record.time_back, &mut back_lines[slot]),
            };
            *time = Some(time.map_or(path.time, |t| t.min(path.time)));
            lines.push(path.path.clone());
        }
    }

    for ((record, out), back) in merged.iter_mut().zip(out_lines).zip(back_lines) {
        record.lines = MultiLineString::new(out.into_iter().chain(back).collect());
    }
    merged
}

#[derive(Clone, Copy)]
enum Leg {
    Out,
    Back,
}
