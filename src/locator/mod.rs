//! Find a usable Stata executable on the host.
//!
//! Resolution order, first hit wins:
//! 1. an explicit path from the caller,
//! 2. the `stata_cli` / `STATA_CLI` override,
//! 3. the platform's fixed list of install directories, probing
//!    `mp → se → be → ic → default` inside each one.

use std::{
    env, fs,
    path::{Path, PathBuf},
    sync::Mutex,
};

use directories::BaseDirs;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::{
    config::Config,
    edition::{self, Edition, InstalledEdition},
    error::LocateError,
};

pub mod linux;
pub mod macos;
pub mod windows;

/// Major versions probed in versioned install folders, newest first.
pub(crate) const VERSIONS: [&str; 8] = ["19", "18", "17", "16", "15", "14", "13", "Now"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    MacOs,
    Linux,
    Windows,
}

impl Platform {
    /// Other Unix flavours follow the Linux layout.
    pub fn detect() -> Self {
        match env::consts::OS {
            "macos" => Platform::MacOs,
            "windows" => Platform::Windows,
            _ => Platform::Linux,
        }
    }

    pub fn is_unix(self) -> bool {
        !matches!(self, Platform::Windows)
    }

    pub fn search_bases(self) -> Vec<PathBuf> {
        let home = BaseDirs::new().map(|b| b.home_dir().to_path_buf());
        let home = home.as_deref();
        match self {
            Platform::MacOs => macos::search_bases(home),
            Platform::Linux => linux::search_bases(home),
            Platform::Windows => windows::search_bases(home),
        }
    }

    pub fn candidate_names(self, edition: Edition) -> &'static [&'static str] {
        match self {
            Platform::MacOs => macos::candidate_names(edition),
            Platform::Linux => linux::candidate_names(edition),
            Platform::Windows => windows::candidate_names(edition),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum ResolutionSource {
    Explicit,
    Environment(String),
    Search,
}

/// The interpreter chosen for a session. Never mutated after resolution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedInterpreter {
    pub path: PathBuf,
    pub edition: Edition,
    pub source: ResolutionSource,
}

impl ResolvedInterpreter {
    fn new(path: PathBuf, source: ResolutionSource) -> Self {
        let edition = path
            .file_name()
            .map(|n| Edition::from_file_name(&n.to_string_lossy()))
            .unwrap_or(Edition::Unknown);
        Self { path, edition, source }
    }
}

#[derive(Debug, Clone)]
pub struct Locator {
    platform: Platform,
    bases: Vec<PathBuf>,
    priority: Vec<Edition>,
}

impl Locator {
    pub fn detect() -> Self {
        Self::for_platform(Platform::detect())
    }

    pub fn for_platform(platform: Platform) -> Self {
        Self {
            platform,
            bases: platform.search_bases(),
            priority: Edition::PRIORITY.to_vec(),
        }
    }

    /// Replace the platform's search directories, keeping its naming rules.
    pub fn with_bases(mut self, bases: Vec<PathBuf>) -> Self {
        self.bases = bases;
        self
    }

    pub fn with_priority(mut self, priority: &[Edition]) -> Self {
        self.priority = priority.to_vec();
        self
    }

    pub fn platform(&self) -> Platform {
        self.platform
    }

    pub fn bases(&self) -> &[PathBuf] {
        &self.bases
    }

    fn candidates_in<'a>(&'a self, base: &'a Path) -> impl Iterator<Item = PathBuf> + 'a {
        self.priority.iter().flat_map(move |ed| {
            self.platform
                .candidate_names(*ed)
                .iter()
                .map(move |name| base.join(name))
        })
    }

    /// First executable in directory order. Directory order is authoritative;
    /// edition only orders the probes inside one directory.
    pub fn locate(&self) -> Option<InstalledEdition> {
        for base in &self.bases {
            for candidate in self.candidates_in(base) {
                let ok = is_executable(&candidate);
                debug!(path = %candidate.display(), found = ok, "probe");
                if ok {
                    return Some(InstalledEdition::from_path(&candidate));
                }
            }
        }
        None
    }

    /// Every executable candidate across all directories, in search order.
    pub fn enumerate(&self) -> Vec<InstalledEdition> {
        let mut found: Vec<InstalledEdition> = Vec::new();
        for base in &self.bases {
            for candidate in self.candidates_in(base) {
                if is_executable(&candidate) && !found.iter().any(|f| f.path == candidate) {
                    found.push(InstalledEdition::from_path(&candidate));
                }
            }
        }
        found
    }

    /// Highest-ranked installation among everything found.
    pub fn best(&self) -> Option<InstalledEdition> {
        edition::best(&self.enumerate()).cloned()
    }

    pub fn resolve(
        &self,
        explicit: Option<&Path>,
        cfg: &Config,
    ) -> Result<ResolvedInterpreter, LocateError> {
        let mut searched = Vec::new();

        if let Some(path) = explicit {
            match validate_override(path) {
                Some(p) => {
                    info!(path = %p.display(), "using explicit Stata path");
                    return Ok(ResolvedInterpreter::new(p, ResolutionSource::Explicit));
                }
                None => {
                    warn!(path = %path.display(), "explicit Stata path is not executable, ignoring");
                    searched.push(path.to_path_buf());
                }
            }
        }

        if let Some((key, path)) = cfg.stata_cli() {
            match validate_override(&path) {
                Some(p) => {
                    info!(key, path = %p.display(), "using Stata path from environment");
                    return Ok(ResolvedInterpreter::new(
                        p,
                        ResolutionSource::Environment(key.to_string()),
                    ));
                }
                None => {
                    warn!(key, path = %path.display(), "Stata override is not executable, ignoring");
                    searched.push(path);
                }
            }
        }

        if let Some(found) = self.locate() {
            info!(path = %found.path.display(), edition = %found.edition, "found Stata");
            return Ok(ResolvedInterpreter::new(found.path, ResolutionSource::Search));
        }

        searched.extend(self.bases.iter().cloned());
        Err(LocateError::NotFound { searched })
    }
}

/// An override may be a full path or a bare command name found on `PATH`.
fn validate_override(path: &Path) -> Option<PathBuf> {
    if is_executable(path) {
        return Some(path.to_path_buf());
    }
    if path.components().count() != 1 {
        return None;
    }
    let dirs = env::var_os("PATH")?;
    env::split_paths(&dirs)
        .map(|d| d.join(path))
        .find(|p| is_executable(p))
}

/// Regular file with an execute bit (any file on non-Unix hosts).
pub fn is_executable(p: &Path) -> bool {
    let Ok(meta) = fs::metadata(p) else {
        return false;
    };
    if !meta.is_file() {
        return false;
    }
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        meta.permissions().mode() & 0o111 != 0
    }
    #[cfg(not(unix))]
    {
        true
    }
}

/// Memoises one resolution per override value. A different explicit path or
/// environment override triggers a fresh lookup.
#[derive(Debug, Default)]
pub struct ResolutionCache {
    slot: Mutex<Option<(Option<PathBuf>, ResolvedInterpreter)>>,
}

impl ResolutionCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn resolve(
        &self,
        locator: &Locator,
        explicit: Option<&Path>,
        cfg: &Config,
    ) -> Result<ResolvedInterpreter, LocateError> {
        let key = explicit
            .map(Path::to_path_buf)
            .or_else(|| cfg.stata_cli().map(|(_, p)| p));
        let mut slot = self.slot.lock().unwrap_or_else(|e| e.into_inner());
        if let Some((cached_key, resolved)) = slot.as_ref() {
            if *cached_key == key {
                return Ok(resolved.clone());
            }
        }
        let resolved = locator.resolve(explicit, cfg)?;
        *slot = Some((key, resolved.clone()));
        Ok(resolved)
    }
}
