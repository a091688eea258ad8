//! Flat-file persistence: timestamp-suffixed CSV files in one directory.

use anyhow::{Context, Result};
use chrono::Local;
use polars::prelude::*;
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use tracing::{debug, info};

const EXTENSION: &str = "csv";

/// Where tables are read from and written to.
pub trait TableStore {
    /// Every table file in the store.
    fn files(&self) -> Result<Vec<PathBuf>>;

    fn load(&self, path: &Path) -> Result<DataFrame>;

    /// Write `df` as `{stem}_{YYYY-MM-DD_HH-MM-SS}` and return the path.
    fn save(&self, df: &mut DataFrame, stem: &str) -> Result<PathBuf>;

    /// Newest file whose name starts with `prefix`.
    fn latest(&self, prefix: &str) -> Result<Option<PathBuf>> {
        let mut candidates = Vec::new();
        for path in self.files()? {
            let matches = path
                .file_name()
                .and_then(|name| name.to_str())
                .is_some_and(|name| name.starts_with(prefix));
            if matches {
                let modified = fs::metadata(&path)
                    .and_then(|meta| meta.modified())
                    .unwrap_or(SystemTime::UNIX_EPOCH);
                candidates.push((modified, path));
            }
        }
        Ok(candidates.into_iter().max().map(|(_, path)| path))
    }

    fn load_latest(&self, prefix: &str) -> Result<Option<(PathBuf, DataFrame)>> {
        match self.latest(prefix)? {
            Some(path) => {
                let df = self.load(&path)?;
                Ok(Some((path, df)))
            }
            None => Ok(None),
        }
    }
}

#[derive(Debug, Clone)]
pub struct CsvStore {
    dir: PathBuf,
}

impl CsvStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

impl TableStore for CsvStore {
    fn files(&self) -> Result<Vec<PathBuf>> {
        if !self.dir.exists() {
            return Ok(Vec::new());
        }
        let mut files = Vec::new();
        for entry in fs::read_dir(&self.dir)
            .with_context(|| format!("Unable to list {}", self.dir.display()))?
        {
            let path = entry?.path();
            if path.is_file() && path.extension().is_some_and(|ext| ext == EXTENSION) {
                files.push(path);
            }
        }
        files.sort();
        Ok(files)
    }

    fn load(&self, path: &Path) -> Result<DataFrame> {
        let df = CsvReadOptions::default()
            .with_has_header(true)
            .with_infer_schema_length(Some(10_000))
            .try_into_reader_with_file_path(Some(path.to_path_buf()))
            .with_context(|| format!("Failed to open {}", path.display()))?
            .finish()
            .with_context(|| format!("Unable to read {} into a DataFrame", path.display()))?;
        debug!(path = %path.display(), rows = df.height(), "table loaded");
        Ok(df)
    }

    fn save(&self, df: &mut DataFrame, stem: &str) -> Result<PathBuf> {
        fs::create_dir_all(&self.dir)
            .with_context(|| format!("Unable to create {}", self.dir.display()))?;

        let stamp = Local::now().format("%Y-%m-%d_%H-%M-%S");
        let path = self.dir.join(format!("{stem}_{stamp}.{EXTENSION}"));
        let mut file =
            File::create(&path).with_context(|| format!("Unable to create {}", path.display()))?;
        CsvWriter::new(&mut file)
            .include_header(true)
            .finish(df)
            .with_context(|| format!("Failed to write {}", path.display()))?;

        info!(
            path = %path.display(),
            rows = df.height(),
            columns = df.width(),
            "table saved"
        );
        Ok(path)
    }
}
