//! Grid store rooted at an output directory.

use crate::GeoprocError;
use dashmap::DashMap;
use log::debug;
use raster::{Grid, GridMode};
use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

/// Extension given to grids written by [`Workspace::store`].
pub const GRID_EXT: &str = "flt";

pub struct Workspace {
    /// Directory receiving every stored grid and vector.
    root: PathBuf,

    /// How to load grids (in-memory or mapped).
    grid_mode: GridMode,

    /// Grids which have been loaded or stored, keyed by path.
    grids: DashMap<PathBuf, Arc<Grid>>,
}

impl Workspace {
    /// Returns a workspace rooted at `root`, creating the directory if
    /// needed.
    pub fn new(root: PathBuf, grid_mode: GridMode) -> Result<Self, GeoprocError> {
        if root.exists() && !root.is_dir() {
            return Err(GeoprocError::Workspace(root));
        }
        std::fs::create_dir_all(&root)?;
        Ok(Self {
            root,
            grid_mode,
            grids: DashMap::new(),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Returns the path of `name` relative to this workspace.
    pub fn path(&self, name: &str) -> PathBuf {
        self.root.join(name)
    }

    /// Returns the grid at `path`.
    ///
    /// Grids are read from disk once and shared afterwards.
    pub fn open(&self, path: &Path) -> Result<Arc<Grid>, GeoprocError> {
        self.grids
            .entry(path.to_owned())
            .or_try_insert_with(|| {
                debug!("loading {path:?}");
                Ok::<_, GeoprocError>(Arc::new(Grid::open(path, self.grid_mode)?))
            })
            .map(|r| r.clone())
    }

    /// Writes `grid` as `<root>/<name>.flt` and returns its path.
    pub fn store(&self, name: &str, grid: Grid) -> Result<PathBuf, GeoprocError> {
        let path = self.path(&format!("{name}.{GRID_EXT}"));
        debug!("storing {path:?}");
        grid.save(&path)?;
        self.grids.insert(path.clone(), Arc::new(grid));
        Ok(path)
    }
}
