use hpcheck_core::StimulusPool;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum DataLoadError {
    #[error("failed to read stimulus pool from {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed stimulus pool: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("stimulus source unavailable: {0}")]
    Unavailable(String),
}

/// Supplies the raw stimulus and calibration pool.
pub trait StimulusSource {
    fn fetch(&mut self) -> Result<StimulusPool, DataLoadError>;
}

/// Pool held in memory.
#[derive(Debug, Clone)]
pub struct StaticSource {
    pool: StimulusPool,
}

impl StaticSource {
    pub fn new(pool: StimulusPool) -> Self {
        Self { pool }
    }
}

impl StimulusSource for StaticSource {
    fn fetch(&mut self) -> Result<StimulusPool, DataLoadError> {
        Ok(self.pool.clone())
    }
}

/// Pool read from a JSON file on every fetch.
#[derive(Debug, Clone)]
pub struct JsonFileSource {
    path: PathBuf,
}

impl JsonFileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl StimulusSource for JsonFileSource {
    fn fetch(&mut self) -> Result<StimulusPool, DataLoadError> {
        let json = fs::read_to_string(&self.path).map_err(|source| DataLoadError::Io {
            path: self.path.clone(),
            source,
        })?;
        let pool = StimulusPool::from_json_str(&json)?;
        debug!(path = %self.path.display(), stimuli = pool.len(), "fetched stimulus pool");
        Ok(pool)
    }
}
