//! Content-addressed script and log files.
//!
//! Files are named by a prefix of the md5 of the script text, so rerunning an
//! unchanged script lands on the same log. Two runs of the same text may race
//! on one log path; the last writer wins. Nothing is ever evicted, so the
//! directory grows until something outside this crate cleans it.

use std::{
    fs,
    path::{Path, PathBuf},
};

use crate::{
    config::{Config, MAX_HASH_LENGTH, MIN_HASH_LENGTH},
    error::CacheError,
};

#[derive(Debug, Clone)]
pub struct LogCache {
    hash_length: usize,
    cache_path: PathBuf,
}

impl LogCache {
    pub fn from_config(cfg: &Config) -> Self {
        Self::new(cfg.cache_path(), cfg.hash_length())
    }

    pub fn new(cache_path: impl Into<PathBuf>, hash_length: usize) -> Self {
        Self {
            hash_length: hash_length.clamp(MIN_HASH_LENGTH, MAX_HASH_LENGTH),
            cache_path: cache_path.into(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.cache_path
    }

    pub fn ensure_dir(&self) -> Result<(), CacheError> {
        fs::create_dir_all(&self.cache_path).map_err(|source| CacheError::CreateDir {
            path: self.cache_path.clone(),
            source,
        })
    }

    pub fn key_for(&self, script: &str) -> String {
        let digest = md5::compute(script.as_bytes());
        let mut hex = format!("{:x}", digest);
        hex.truncate(self.hash_length);
        hex
    }

    pub fn script_path(&self, key: &str) -> PathBuf {
        self.cache_path.join(format!("{key}.do"))
    }

    pub fn log_path(&self, key: &str) -> PathBuf {
        self.cache_path.join(format!("{key}.log"))
    }

    pub fn wrapper_path(&self, key: &str) -> PathBuf {
        self.cache_path.join(format!("{key}.run.do"))
    }

    /// Write script text under its content key and return the file path.
    pub fn store_script(&self, key: &str, script: &str) -> Result<PathBuf, CacheError> {
        self.ensure_dir()?;
        let p = self.script_path(key);
        write(&p, script)?;
        Ok(p)
    }

    pub fn store_wrapper(&self, key: &str, body: &str) -> Result<PathBuf, CacheError> {
        self.ensure_dir()?;
        let p = self.wrapper_path(key);
        write(&p, body)?;
        Ok(p)
    }

    /// Remove a stale log so a failed launch can't be mistaken for output.
    pub fn clear_log(&self, key: &str) {
        let _ = fs::remove_file(self.log_path(key));
    }

    pub fn read_log(&self, key: &str) -> Option<String> {
        fs::read(self.log_path(key))
            .ok()
            .map(|b| String::from_utf8_lossy(&b).into_owned())
    }
}

fn write(p: &Path, body: &str) -> Result<(), CacheError> {
    fs::write(p, body).map_err(|source| CacheError::Write { path: p.to_path_buf(), source })
}
