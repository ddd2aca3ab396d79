//! Stage sequencing and failure handling.

use crate::{
    logfile::{Outcome, PipelineLog},
    stages::{back, cost, dem, fusion, outbound, speed, Stage, StageContext},
    OutputNames, ParameterSet, PipelineError, StageError, StageResult,
};
use geoproc::{raster::GridMode, Workspace};
use log::{debug, info, warn};
use std::{
    any::Any,
    fmt,
    panic::{self, AssertUnwindSafe},
    path::PathBuf,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    Init,
    DemReady,
    CostReady,
    SpeedReady,
    TravelCostReady,
    OutboundReady,
    ReturnReady,
    Done,
    Failed,
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Summary of a completed run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineReport {
    pub suffix: &'static str,

    /// States entered, in order, ending with `Done`.
    pub states: Vec<PipelineState>,

    /// Every grid and vector written, in order.
    pub outputs: Vec<PathBuf>,
}

impl PipelineReport {
    pub fn state(&self) -> PipelineState {
        self.states.last().copied().unwrap_or(PipelineState::Init)
    }
}

pub struct Pipeline {
    params: ParameterSet,
    grid_mode: GridMode,
}

impl Pipeline {
    pub fn new(params: ParameterSet, grid_mode: GridMode) -> Self {
        Self { params, grid_mode }
    }

    /// Runs every stage in order, stopping at the first failure.
    ///
    /// The log is opened before the first stage and released on every
    /// exit path, including a panicking stage, which is logged as a
    /// pipeline error before the panic resumes. Outputs of completed
    /// stages are left in place when a later stage fails.
    pub fn run(&self) -> Result<PipelineReport, PipelineError> {
        let log_path = &self.params.log_file;
        let log = PipelineLog::open(log_path).map_err(|source| PipelineError::Log {
            path: log_path.clone(),
            source,
        })?;
        let mut run = Run {
            log,
            report: PipelineReport {
                suffix: self.params.suffix(),
                states: vec![PipelineState::Init],
                outputs: Vec::new(),
            },
        };

        let result = run.unwind_logged(|run| self.run_stages(run));
        let Run { mut log, report } = run;
        match &result {
            Ok(()) => info!("pipeline done, {} outputs", report.outputs.len()),
            Err(PipelineError::Unexpected { stage, source }) => {
                warn!("unexpected error in {stage}: {source}");
                log.error(&format!("{stage}: {source}"));
            }
            Err(e) => warn!("{e}"),
        }
        log.close().map_err(|source| PipelineError::Log {
            path: log_path.clone(),
            source,
        })?;
        result.map(|()| report)
    }
}

/// Private API
impl Pipeline {
    fn run_stages(&self, run: &mut Run) -> Result<(), PipelineError> {
        let params = &self.params;
        let workspace =
            Workspace::new(params.workspace.clone(), self.grid_mode).map_err(|source| {
                run.enter(PipelineState::Failed);
                PipelineError::Unexpected {
                    stage: "pipeline",
                    source,
                }
            })?;
        let names = OutputNames::new(params.suffix());
        let ctx = StageContext {
            params,
            workspace: &workspace,
            names: &names,
        };
        info!(
            "running {} {} into {:?}",
            params.time_calculation,
            names.suffix,
            workspace.root()
        );

        let dem = run.stage(Stage::DemPreparation, || dem::run(&ctx))?;
        run.produced([&dem.extent_dem, &dem.slope, &dem.below_slope]);
        run.enter(PipelineState::DemReady);

        let cost_surface = run.stage(Stage::CostSurface, || cost::run(&ctx, &dem))?;
        run.produced([&cost_surface]);
        run.enter(PipelineState::CostReady);

        let speed_surface = run.stage(Stage::SpeedSurface, || speed::run(&ctx, &dem))?;
        run.produced([&speed_surface]);
        run.enter(PipelineState::SpeedReady);

        let travel_cost = run.stage(Stage::TravelCost, || {
            fusion::run(&ctx, &cost_surface, &speed_surface)
        })?;
        run.produced([&travel_cost]);
        run.enter(PipelineState::TravelCostReady);

        let out = run.stage(Stage::TravelTimeOut, || {
            outbound::run(&ctx, &dem, &travel_cost)
        })?;
        run.produced([&out.travel_time, &out.backlink, &out.capped]);
        run.produced(&out.cost_paths);
        run.enter(PipelineState::OutboundReady);

        if params.round_trip() {
            let back = run.stage(Stage::TravelTimeBack, || {
                back::run(&ctx, &dem, &travel_cost, &out)
            })?;
            run.produced([
                &back.travel_time,
                &back.backlink,
                &back.capped,
                &back.round_trip,
                &back.round_trip_capped,
            ]);
            run.produced(&back.cost_paths);
            run.enter(PipelineState::ReturnReady);
        } else {
            debug!("one way run, skipping {}", Stage::TravelTimeBack);
        }

        run.enter(PipelineState::Done);
        Ok(())
    }
}

/// State of a single run.
struct Run {
    log: PipelineLog,
    report: PipelineReport,
}

impl Run {
    /// Runs `f`, logging a panic as a pipeline error before resuming it.
    fn unwind_logged<T>(&mut self, f: impl FnOnce(&mut Self) -> T) -> T {
        match panic::catch_unwind(AssertUnwindSafe(|| f(self))) {
            Ok(value) => value,
            Err(payload) => {
                self.report.states.push(PipelineState::Failed);
                self.log
                    .error(&format!("pipeline: panic: {}", panic_message(&*payload)));
                panic::resume_unwind(payload)
            }
        }
    }

    fn enter(&mut self, state: PipelineState) {
        debug!("pipeline state {state}");
        self.report.states.push(state);
    }

    fn produced<'p>(&mut self, paths: impl IntoIterator<Item = &'p PathBuf>) {
        self.report.outputs.extend(paths.into_iter().cloned());
    }

    /// Runs `stage` and records its outcome.
    ///
    /// Unexpected errors are not recorded here; [`Pipeline::run`] logs
    /// them once as a pipeline error.
    fn stage<T>(
        &mut self,
        stage: Stage,
        f: impl FnOnce() -> StageResult<T>,
    ) -> Result<T, PipelineError> {
        info!("{stage}");
        let result = f();
        let log_path = self.log.path().to_owned();
        let log_err = |source: std::io::Error| PipelineError::Log {
            path: log_path.clone(),
            source,
        };
        match result {
            Ok(output) => {
                self.log
                    .record(stage.name(), &Outcome::Success)
                    .map_err(log_err)?;
                Ok(output)
            }
            Err(StageError::Failure(message)) => {
                self.enter(PipelineState::Failed);
                self.log
                    .record(stage.name(), &Outcome::Failure(message.clone()))
                    .map_err(log_err)?;
                Err(PipelineError::Stage {
                    stage: stage.name(),
                    message,
                })
            }
            Err(StageError::Unexpected(source)) => {
                self.enter(PipelineState::Failed);
                Err(PipelineError::Unexpected {
                    stage: stage.name(),
                    source,
                })
            }
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message
    } else {
        "unknown cause"
    }
}

#[cfg(test)]
mod tests {
    use super::{PipelineReport, PipelineState, Run};
    use crate::PipelineLog;
    use std::{
        fs,
        panic::{self, AssertUnwindSafe},
    };
    use tempfile::tempdir;

    fn run_logging_to(path: &std::path::Path) -> Run {
        Run {
            log: PipelineLog::open(path).unwrap(),
            report: PipelineReport {
                suffix: "Cost_Distance",
                states: vec![PipelineState::Init],
                outputs: Vec::new(),
            },
        }
    }

    #[test]
    fn test_panicking_stage_is_logged() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("log.txt");
        let mut run = run_logging_to(&path);

        let unwound = panic::catch_unwind(AssertUnwindSafe(|| {
            run.unwind_logged(|_| -> () { panic!("grid vanished") })
        }));
        assert!(unwound.is_err());
        assert_eq!(run.report.state(), PipelineState::Failed);
        drop(run);
        assert_eq!(
            fs::read_to_string(&path).unwrap(),
            "pipeline << error (pipeline: panic: grid vanished)\n"
        );
    }

    #[test]
    fn test_values_pass_through() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("log.txt");
        let mut run = run_logging_to(&path);
        assert_eq!(run.unwind_logged(|_| 42), 42);
        drop(run);
        assert_eq!(fs::read_to_string(&path).unwrap(), "");
    }
}
