use approx::assert_relative_eq;
use serde_json::{json, Value};
use std::{fs, path::PathBuf};
use tempfile::TempDir;
use ttcsm::{
    geoproc::{
        geojson::GeoJson,
        raster::{Grid, GridMode, Header},
    },
    Pipeline, PipelineError, PipelineReport, PipelineState, RawParameters,
};

const SUCCESS_LOG: &str = "\
dem_preparation << 1
cost_surface << 1
speed_surface << 1
travel_cost << 1
travel_time_out << 1
";

/// Input layers over a 10 x 5 grid of 100 m cells with its lower left
/// corner at the origin.
///
/// Row 0 carries a 36 km/h road, row 1 a 7.2 km/h trail. The start lies
/// in cell (2, 0), destination "east" in cell (2, 9) and destination
/// "north" in cell (0, 4). Walking at 3.6 km/h over unit cost land
/// takes one second per meter.
struct Fixture {
    dir: TempDir,
    raw: Value,
}

impl Fixture {
    #[allow(clippy::cast_precision_loss)]
    fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().to_owned();
        let header = Header::new(10, 5, 0.0, 0.0, 100.0);

        Grid::filled(header, Some(1000.0))
            .save(root.join("dem.asc"))
            .unwrap();
        Grid::from_fn(header, |_, col| {
            Some(if col >= 7 { 1000.0 + 500.0 * (col - 6) as f32 } else { 1000.0 })
        })
        .save(root.join("steep.asc"))
        .unwrap();
        Grid::from_fn(header, |_, col| Some(if col < 5 { 1.0 } else { 2.0 }))
            .save(root.join("landcover.asc"))
            .unwrap();

        fs::write(root.join("cost.csv"), "class,cost\n1,1.0\n2,1.0\n").unwrap();
        fs::write(root.join("cost_missing.csv"), "class,cost\n1,1.0\n").unwrap();
        fs::write(root.join("cost_extra.csv"), "class,cost\n1,1.0\n2,1.0\n3,4.0\n").unwrap();

        write_lines(&root.join("roads.geojson"), &[(36.0, [(0.0, 450.0), (1000.0, 450.0)])]);
        write_lines(
            &root.join("trails.geojson"),
            &[
                (7.2, [(0.0, 350.0), (1000.0, 350.0)]),
                (7.2, [(0.0, 450.0), (300.0, 450.0)]),
            ],
        );
        write_points(&root.join("start.geojson"), &[("trailhead", 50.0, 250.0)]);
        write_points(
            &root.join("destinations.geojson"),
            &[("east", 950.0, 250.0), ("north", 450.0, 450.0)],
        );

        let raw = json!({
            "start_locations": root.join("start.geojson"),
            "roads": root.join("roads.geojson"),
            "trails": root.join("trails.geojson"),
            "dem": root.join("dem.asc"),
            "land_cover": root.join("landcover.asc"),
            "destinations": root.join("destinations.geojson"),
            "cost_table": root.join("cost.csv"),
            "workspace": root.join("ws"),
            "walking_speed": "3.6",
            "max_slope": "40",
            "time_cap": "28800",
            "trails_available": "no",
            "path_distance": "no",
            "vertical_graph": "Binary",
            "time_calculation": "OneWay",
            "least_cost_path": "yes"
        });
        Self { dir, raw }
    }

    fn path(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }

    fn run(&self, overrides: Value) -> Result<PipelineReport, PipelineError> {
        let mut raw = self.raw.clone();
        if let (Value::Object(base), Value::Object(extra)) = (&mut raw, overrides) {
            base.extend(extra);
        }
        let raw: RawParameters = serde_json::from_value(raw).unwrap();
        Pipeline::new(raw.validate().unwrap(), GridMode::InMem).run()
    }

    fn grid(&self, name: &str) -> Grid {
        Grid::open(self.path("ws").join(format!("{name}.flt")), GridMode::InMem).unwrap()
    }

    fn ws_exists(&self, name: &str) -> bool {
        self.path("ws").join(name).exists()
    }

    fn log(&self) -> String {
        fs::read_to_string(self.path("ws").join("AA_TTCSM_logfile.txt")).unwrap()
    }
}

fn write_lines(path: &std::path::Path, lines: &[(f64, [(f64, f64); 2])]) {
    let features: Vec<Value> = lines
        .iter()
        .map(|(speed, [a, b])| {
            json!({
                "type": "Feature",
                "properties": {"speed": speed},
                "geometry": {"type": "LineString", "coordinates": [[a.0, a.1], [b.0, b.1]]}
            })
        })
        .collect();
    let collection = json!({"type": "FeatureCollection", "features": features});
    fs::write(path, collection.to_string()).unwrap();
}

fn write_points(path: &std::path::Path, points: &[(&str, f64, f64)]) {
    let features: Vec<Value> = points
        .iter()
        .map(|(id, x, y)| {
            json!({
                "type": "Feature",
                "id": id,
                "properties": {},
                "geometry": {"type": "Point", "coordinates": [x, y]}
            })
        })
        .collect();
    let collection = json!({"type": "FeatureCollection", "features": features});
    fs::write(path, collection.to_string()).unwrap();
}

fn feature_count(path: PathBuf) -> usize {
    let text = fs::read_to_string(path).unwrap();
    match text.parse::<GeoJson>().unwrap() {
        GeoJson::FeatureCollection(collection) => collection.features.len(),
        other => panic!("expected a feature collection, got {other:?}"),
    }
}

#[test]
fn test_one_way_cost_distance() {
    let fixture = Fixture::new();
    let report = fixture.run(json!({})).unwrap();

    assert_eq!(report.suffix, "Cost_Distance");
    assert_eq!(report.state(), PipelineState::Done);
    assert!(!report.states.contains(&PipelineState::ReturnReady));
    assert!(report.outputs.iter().all(|path| path.exists()));

    let time = fixture.grid("travelTimeOut_Cost_Distance");
    assert_eq!(time.get(2, 0), Some(0.0));
    assert_relative_eq!(time.get(2, 1).unwrap(), 100.0, epsilon = 1e-3);
    assert_relative_eq!(time.get(2, 3).unwrap(), 300.0, epsilon = 1e-3);

    assert!(fixture.ws_exists("output/costPathsOut_Cost_Distance.geojson"));
    assert_eq!(
        feature_count(fixture.path("ws/output/costPathsOut_Cost_Distance.geojson")),
        2
    );
    assert!(!fixture.ws_exists("travelTimeBack_Cost_Distance.flt"));
    assert!(!fixture.ws_exists("output/costPathsRoundTrip_Cost_Distance.geojson"));
    assert_eq!(fixture.log(), SUCCESS_LOG);
}

#[test]
fn test_round_trip_merges_paths_per_destination() {
    let fixture = Fixture::new();
    let report = fixture
        .run(json!({"time_calculation": "RoundTrip"}))
        .unwrap();

    assert_eq!(
        report.states,
        vec![
            PipelineState::Init,
            PipelineState::DemReady,
            PipelineState::CostReady,
            PipelineState::SpeedReady,
            PipelineState::TravelCostReady,
            PipelineState::OutboundReady,
            PipelineState::ReturnReady,
            PipelineState::Done,
        ]
    );

    // Flat isotropic ground costs the same both ways.
    let out = fixture.grid("travelTimeOut_Cost_Distance");
    let back = fixture.grid("travelTimeBack_Cost_Distance");
    let round_trip = fixture.grid("travelTimeRoundTrip_Cost_Distance");
    assert_relative_eq!(back.get(2, 3).unwrap(), out.get(2, 3).unwrap(), epsilon = 1e-3);
    assert_relative_eq!(round_trip.get(2, 3).unwrap(), 600.0, epsilon = 1e-3);

    assert_eq!(
        feature_count(fixture.path("ws/output/costPathsRoundTrip_Cost_Distance.geojson")),
        2
    );
    assert_eq!(fixture.log(), format!("{SUCCESS_LOG}travel_time_back << 1\n"));
}

#[test]
fn test_missing_cost_class_halts_pipeline() {
    let fixture = Fixture::new();
    let err = fixture
        .run(json!({"cost_table": fixture.path("cost_missing.csv")}))
        .unwrap_err();

    match &err {
        PipelineError::Stage { stage, message } => {
            assert_eq!(*stage, "cost_surface");
            assert!(message.contains("class 2"), "{message}");
        }
        other => panic!("unexpected error {other:?}"),
    }

    let log = fixture.log();
    let lines: Vec<&str> = log.lines().collect();
    assert_eq!(lines.len(), 2);
    assert_eq!(lines[0], "dem_preparation << 1");
    assert!(lines[1].starts_with("cost_surface << 0 ("));
    assert_eq!(log.matches("<< 0").count(), 1);

    // Earlier outputs stay on disk, later stages never ran.
    assert!(fixture.ws_exists("extentDEM.flt"));
    assert!(!fixture.ws_exists("output/speedSurface.flt"));
    assert!(!fixture.ws_exists("travelTimeOut_Cost_Distance.flt"));
}

#[test]
fn test_cost_class_absent_from_land_cover_fails() {
    let fixture = Fixture::new();
    let err = fixture
        .run(json!({"cost_table": fixture.path("cost_extra.csv")}))
        .unwrap_err();
    assert!(
        matches!(&err, PipelineError::Stage { stage: "cost_surface", message } if message.contains('3'))
    );
}

#[test]
fn test_destinations_unread_without_least_cost_paths() {
    let fixture = Fixture::new();
    let report = fixture
        .run(json!({
            "least_cost_path": "no",
            "destinations": fixture.path("does/not/exist.geojson"),
        }))
        .unwrap();
    assert_eq!(report.state(), PipelineState::Done);
    assert!(!fixture.ws_exists("output/costPathsOut_Cost_Distance.geojson"));
}

#[test]
fn test_road_speed_overrides_trail_speed() {
    let fixture = Fixture::new();
    fixture.run(json!({"trails_available": "yes"})).unwrap();
    let speed = fixture.grid("output/speedSurface");
    // Road and trail both cover (0, 1).
    assert_relative_eq!(speed.get(0, 1).unwrap(), 0.1, epsilon = 1e-6);
    assert_relative_eq!(speed.get(0, 6).unwrap(), 0.1, epsilon = 1e-6);
    assert_relative_eq!(speed.get(1, 4).unwrap(), 0.5, epsilon = 1e-6);
    assert_relative_eq!(speed.get(3, 4).unwrap(), 1.0, epsilon = 1e-6);
    assert!(fixture.ws_exists("trailSpeed.flt"));
}

#[test]
fn test_unavailable_trails_are_ignored() {
    let fixture = Fixture::new();
    fixture.run(json!({"trails_available": "no"})).unwrap();
    let speed = fixture.grid("output/speedSurface");
    assert_relative_eq!(speed.get(1, 4).unwrap(), 1.0, epsilon = 1e-6);
    assert!(!fixture.ws_exists("trailSpeed.flt"));
}

#[test]
fn test_steep_cells_are_excluded_everywhere() {
    let fixture = Fixture::new();
    fixture
        .run(json!({"dem": fixture.path("steep.asc"), "least_cost_path": "no"}))
        .unwrap();

    for name in ["output/costSurface", "output/speedSurface", "output/travelCost"] {
        let grid = fixture.grid(name);
        for col in 6..10 {
            assert_eq!(grid.get(2, col), None, "{name} ({col})");
        }
        assert!(grid.get(2, 5).is_some(), "{name}");
    }
    // The road crosses the cliff but does not make it passable.
    assert_eq!(fixture.grid("output/speedSurface").get(0, 9), None);
    assert_eq!(fixture.grid("travelTimeOut_Cost_Distance").get(2, 9), None);
}

#[test]
fn test_destination_on_excluded_cell_fails() {
    let fixture = Fixture::new();
    let err = fixture
        .run(json!({"dem": fixture.path("steep.asc")}))
        .unwrap_err();
    assert!(
        matches!(&err, PipelineError::Stage { stage: "travel_time_out", message } if message.contains("east"))
    );
    // Travel time grids were stored before tracing failed.
    assert!(fixture.ws_exists("travelTimeOut_Cost_Distance.flt"));
    assert!(fixture
        .log()
        .ends_with("travel_time_out << 0 (destination 'east' lies in an excluded or unreachable cell)\n"));
}

#[test]
fn test_time_cap_clamps_and_flags() {
    let fixture = Fixture::new();
    fixture
        .run(json!({"time_cap": 250, "least_cost_path": "no"}))
        .unwrap();
    let time = fixture.grid("travelTimeOut_Cost_Distance");
    let capped = fixture.grid("cappedOut_Cost_Distance");

    assert_relative_eq!(time.get(2, 2).unwrap(), 200.0, epsilon = 1e-3);
    assert_eq!(capped.get(2, 2), Some(0.0));
    assert_eq!(time.get(2, 3), Some(250.0));
    assert_eq!(capped.get(2, 3), Some(1.0));
    assert!(time.iter().filter_map(|s| s.value()).all(|t| t <= 250.0));
}

#[test]
fn test_round_trip_cap_flags() {
    let fixture = Fixture::new();
    let report = fixture
        .run(json!({"time_calculation": "RoundTrip", "time_cap": 400, "least_cost_path": "no"}))
        .unwrap();
    let round_trip = fixture.grid("travelTimeRoundTrip_Cost_Distance");
    let round_trip_capped = fixture.grid("cappedRoundTrip_Cost_Distance");
    let back_capped = fixture.grid("cappedBack_Cost_Distance");

    // 200 s each way lands exactly on the cap, 300 s each way exceeds it.
    assert_eq!(round_trip.get(2, 2), Some(400.0));
    assert_eq!(round_trip_capped.get(2, 2), Some(0.0));
    assert_eq!(round_trip.get(2, 3), Some(400.0));
    assert_eq!(round_trip_capped.get(2, 3), Some(1.0));

    assert_eq!(back_capped.get(2, 3), Some(0.0));
    assert_eq!(back_capped.get(2, 5), Some(1.0));
    assert_eq!(round_trip_capped.get(2, 9), Some(1.0));

    for name in ["cappedBack_Cost_Distance.flt", "cappedRoundTrip_Cost_Distance.flt"] {
        assert!(report.outputs.contains(&fixture.path("ws").join(name)), "{name}");
    }
}

#[test]
fn test_path_distance_round_trip_on_a_ramp() {
    let fixture = Fixture::new();
    let report = fixture
        .run(json!({
            "dem": fixture.path("steep.asc"),
            "max_slope": "90",
            "path_distance": "yes",
            "vertical_graph": "Linear",
            "time_calculation": "RoundTrip",
        }))
        .unwrap();
    assert_eq!(report.state(), PipelineState::Done);

    let out = fixture.grid("travelTimeOut_Linear");
    let back = fixture.grid("travelTimeBack_Linear");
    let round_trip = fixture.grid("travelTimeRoundTrip_Linear");
    let round_trip_capped = fixture.grid("cappedRoundTrip_Linear");

    // Flat ground costs the same both ways.
    assert_relative_eq!(out.get(2, 3).unwrap(), 300.0, epsilon = 1e-2);
    assert_relative_eq!(back.get(2, 3).unwrap(), 300.0, epsilon = 1e-2);

    // Climbing the ramp on the way out is dearer than descending it on
    // the way back, whether along the road or across open ground.
    let (up, down) = (out.get(2, 9).unwrap(), back.get(2, 9).unwrap());
    assert!(up - down > 100.0, "out {up} back {down}");
    assert_relative_eq!(round_trip.get(2, 9).unwrap(), up + down, max_relative = 1e-5);
    assert_eq!(round_trip_capped.get(2, 9), Some(0.0));

    assert_eq!(
        feature_count(fixture.path("ws/output/costPathsRoundTrip_Linear.geojson")),
        2
    );
}

#[test]
fn test_empty_destination_layer_fails_outbound() {
    let fixture = Fixture::new();
    let empty = fixture.path("nowhere.geojson");
    write_points(&empty, &[]);
    let err = fixture.run(json!({"destinations": empty})).unwrap_err();
    assert!(
        matches!(&err, PipelineError::Stage { stage: "travel_time_out", message } if message.contains("no locations")),
        "{err:?}"
    );
    assert!(!fixture.ws_exists("output/costPathsOut_Cost_Distance.geojson"));
}

#[test]
fn test_path_distance_names_outputs_by_graph() {
    let fixture = Fixture::new();
    let report = fixture
        .run(json!({"path_distance": "yes", "vertical_graph": "binary"}))
        .unwrap();
    assert_eq!(report.suffix, "Binary");
    // Flat ground: the surface distance is the planar distance.
    let time = fixture.grid("travelTimeOut_Binary");
    assert_relative_eq!(time.get(2, 3).unwrap(), 300.0, epsilon = 1e-3);
    assert!(fixture.ws_exists("output/costPathsOut_Binary.geojson"));
    assert!(!fixture.ws_exists("travelTimeOut_Cost_Distance.flt"));
}

#[test]
fn test_missing_vertical_table_file_fails_outbound() {
    let fixture = Fixture::new();
    let err = fixture
        .run(json!({
            "path_distance": "yes",
            "vertical_graph": "Table",
            "vertical_table": fixture.path("no_table.txt"),
        }))
        .unwrap_err();
    assert!(matches!(err, PipelineError::Stage { stage: "travel_time_out", .. }));
}

#[test]
fn test_unexpected_error_is_logged() {
    let fixture = Fixture::new();
    let not_a_dir = fixture.path("cost.csv");
    let log_file = fixture.path("run.log");
    let err = fixture
        .run(json!({"workspace": not_a_dir, "log_file": log_file}))
        .unwrap_err();
    assert!(matches!(err, PipelineError::Unexpected { stage: "pipeline", .. }));
    let log = fs::read_to_string(log_file).unwrap();
    assert!(log.starts_with("pipeline << error ("), "{log}");
    assert_eq!(log.lines().count(), 1);
}

#[test]
fn test_log_is_appended_across_runs() {
    let fixture = Fixture::new();
    fixture.run(json!({"least_cost_path": "no"})).unwrap();
    fixture.run(json!({"least_cost_path": "no"})).unwrap();
    assert_eq!(fixture.log(), SUCCESS_LOG.repeat(2));
}
