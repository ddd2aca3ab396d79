//! Workspace-relative names of every pipeline output.

/// Output names of one run, fixed by the run's suffix.
///
/// Grid names get the workspace grid extension when stored; vector
/// names carry their own.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputNames {
    pub suffix: &'static str,
    pub extent_dem: String,
    pub slope: String,
    pub below_slope: String,
    pub land_cover: String,
    pub road_speed: String,
    pub trail_speed: String,
    pub cost_surface: String,
    pub speed_surface: String,
    pub travel_cost: String,
    pub travel_time_out: String,
    pub backlink_out: String,
    pub capped_out: String,
    pub cost_paths_out: String,
    pub travel_time_back: String,
    pub backlink_back: String,
    pub capped_back: String,
    pub travel_time_round_trip: String,
    pub capped_round_trip: String,
    pub cost_paths_round_trip: String,
}

impl OutputNames {
    pub fn new(suffix: &'static str) -> Self {
        Self {
            suffix,
            extent_dem: "extentDEM".into(),
            slope: "slope".into(),
            below_slope: "belowSlope".into(),
            land_cover: "landCover".into(),
            road_speed: "roadSpeed".into(),
            trail_speed: "trailSpeed".into(),
            cost_surface: "output/costSurface".into(),
            speed_surface: "output/speedSurface".into(),
            travel_cost: "output/travelCost".into(),
            travel_time_out: format!("travelTimeOut_{suffix}"),
            backlink_out: format!("backlinkOut_{suffix}"),
            capped_out: format!("cappedOut_{suffix}"),
            cost_paths_out: format!("output/costPathsOut_{suffix}.geojson"),
            travel_time_back: format!("travelTimeBack_{suffix}"),
            backlink_back: format!("backlinkBack_{suffix}"),
            capped_back: format!("cappedBack_{suffix}"),
            travel_time_round_trip: format!("travelTimeRoundTrip_{suffix}"),
            capped_round_trip: format!("cappedRoundTrip_{suffix}"),
            cost_paths_round_trip: format!("output/costPathsRoundTrip_{suffix}.geojson"),
        }
    }
}
