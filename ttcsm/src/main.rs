mod options;

use anyhow::{Context, Error as AnyError};
use clap::Parser;
use options::Cli;
use std::fs::File;
use ttcsm::{geoproc::raster::GridMode, Pipeline, RawParameters};

fn main() -> Result<(), AnyError> {
    let Cli { params, memmap } = Cli::parse();

    env_logger::init();

    let raw: RawParameters = serde_json::from_reader(
        File::open(&params).with_context(|| format!("opening {params:?}"))?,
    )
    .with_context(|| format!("parsing {params:?}"))?;
    let params = raw.validate()?;
    let grid_mode = if memmap {
        GridMode::MemMap
    } else {
        GridMode::InMem
    };

    let report = Pipeline::new(params, grid_mode).run()?;
    println!("suffix: {}", report.suffix);
    println!("state:  {}", report.state());
    for output in &report.outputs {
        println!("{}", output.display());
    }
    Ok(())
}
