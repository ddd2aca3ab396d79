use clap::Parser;
use std::path::PathBuf;

/// Compute travel time surfaces and least-cost paths.
#[derive(Parser, Debug, Clone)]
pub struct Cli {
    /// JSON parameter file.
    #[arg(short, long)]
    pub params: PathBuf,

    /// Memory-map binary grids instead of reading them into memory.
    #[arg(long, default_value_t = false)]
    pub memmap: bool,
}
