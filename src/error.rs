//! Error types surfaced before a process exists.
//!
//! Anything that goes wrong once the executor takes over is reported through
//! `ExecutionResult` instead.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum LocateError {
    #[error("no usable Stata installation found; searched:\n{}", format_searched(.searched))]
    NotFound { searched: Vec<PathBuf> },
}

impl LocateError {
    pub fn searched(&self) -> &[PathBuf] {
        match self {
            LocateError::NotFound { searched } => searched,
        }
    }
}

fn format_searched(searched: &[PathBuf]) -> String {
    if searched.is_empty() {
        return "  (no search locations for this platform)".to_string();
    }
    searched
        .iter()
        .map(|p| format!("  {}", p.display()))
        .collect::<Vec<_>>()
        .join("\n")
}

#[derive(Debug, Error)]
pub enum GuardError {
    #[error("invalid danger pattern for rule `{rule_id}`: {source}")]
    InvalidPattern {
        rule_id: String,
        #[source]
        source: regex::Error,
    },
}

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cannot create cache directory {}: {source}", .path.display())]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("cannot write {}: {source}", .path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
