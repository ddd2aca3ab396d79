//! Append-only audit log of stage outcomes.

use log::debug;
use std::{
    fmt,
    fs::{self, File, OpenOptions},
    io::{self, BufWriter, Write},
    path::{Path, PathBuf},
};

/// Outcome recorded for a stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Success,
    Failure(String),
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Success => f.write_str("1"),
            Self::Failure(message) => write!(f, "0 ({message})"),
        }
    }
}

/// A log file held open for the duration of one pipeline run.
///
/// Lines are only ever appended. The file is flushed when the log is
/// closed or dropped, so every exit path releases it.
pub struct PipelineLog {
    path: PathBuf,
    file: BufWriter<File>,
}

impl PipelineLog {
    /// Opens `path` for appending, creating it and its parent directory
    /// if needed.
    pub fn open(path: &Path) -> io::Result<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self {
            path: path.to_owned(),
            file: BufWriter::new(file),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Appends `<stage> << <outcome>`.
    pub fn record(&mut self, stage: &str, outcome: &Outcome) -> io::Result<()> {
        debug!("{:?}: {stage} << {outcome}", self.path);
        writeln!(self.file, "{stage} << {outcome}")?;
        self.file.flush()
    }

    /// Appends a best-effort `pipeline << error (<message>)` line.
    pub fn error(&mut self, message: &str) {
        if writeln!(self.file, "pipeline << error ({message})").is_ok() {
            let _ = self.file.flush();
        }
    }

    /// Flushes and releases the log.
    pub fn close(mut self) -> io::Result<()> {
        self.file.flush()
    }
}

impl Drop for PipelineLog {
    fn drop(&mut self) {
        let _ = self.file.flush();
    }
}

#[cfg(test)]
mod tests {
    use super::{Outcome, PipelineLog};
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_lines_are_appended_across_runs() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("logs").join("run.txt");

        let mut log = PipelineLog::open(&path).unwrap();
        log.record("dem_preparation", &Outcome::Success).unwrap();
        log.close().unwrap();

        let mut log = PipelineLog::open(&path).unwrap();
        log.record("cost_surface", &Outcome::Failure("no class 7".into()))
            .unwrap();
        log.error("disk on fire");
        drop(log);

        let text = fs::read_to_string(&path).unwrap();
        assert_eq!(
            text,
            "dem_preparation << 1\ncost_surface << 0 (no class 7)\npipeline << error (disk on fire)\n"
        );
    }
}
