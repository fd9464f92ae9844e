use std::{
    collections::HashMap,
    env,
    fs,
    io::{BufRead, BufReader},
    path::PathBuf,
    time::Duration,
};

use directories::BaseDirs;

/// Interpreter override keys, checked in this order. Both spellings have been
/// used historically and are treated as distinct keys.
pub const STATA_CLI_KEYS: [&str; 2] = ["stata_cli", "STATA_CLI"];

pub const DEFAULT_TIMEOUT_SECS: u64 = 600;
pub const DEFAULT_HASH_LENGTH: usize = 12;
pub const MIN_HASH_LENGTH: usize = 4;
pub const MAX_HASH_LENGTH: usize = 32;

#[derive(Debug, Clone)]
pub struct Config {
    inner: HashMap<String, String>,
    pub config_path: PathBuf,
}

impl Config {
    pub fn load() -> Self {
        let mut map = default_map();
        let config_path = default_config_path();

        // Read .statarc if exists
        if config_path.exists() {
            if let Ok(file) = fs::File::open(&config_path) {
                let reader = BufReader::new(file);
                for line in reader.lines().map_while(Result::ok) {
                    if let Some((k, v)) = parse_line(&line) {
                        map.insert(k, v);
                    }
                }
            }
        }

        // Overlay environment variables (take precedence)
        for (k, v) in env::vars() {
            if is_config_key(&k) {
                map.insert(k, v);
            }
        }

        Self { inner: map, config_path }
    }

    /// Build from explicit pairs on top of the defaults, ignoring the process
    /// environment and the rc file.
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let mut map = default_map();
        for (k, v) in pairs {
            map.insert(k.into(), v.into());
        }
        Self { inner: map, config_path: default_config_path() }
    }

    pub fn get(&self, key: &str) -> Option<String> {
        self.inner.get(key).cloned()
    }

    pub fn get_bool(&self, key: &str) -> bool {
        self.get(key)
            .map(|v| v.trim().eq_ignore_ascii_case("true"))
            .unwrap_or(false)
    }

    pub fn get_u64(&self, key: &str) -> Option<u64> {
        self.get(key).and_then(|v| v.trim().parse::<u64>().ok())
    }

    pub fn get_usize(&self, key: &str) -> Option<usize> {
        self.get(key).and_then(|v| v.trim().parse::<usize>().ok())
    }

    /// First non-empty interpreter override, with the key it came from.
    pub fn stata_cli(&self) -> Option<(&'static str, PathBuf)> {
        STATA_CLI_KEYS.iter().find_map(|k| {
            self.get(k)
                .filter(|v| !v.trim().is_empty())
                .map(|v| (*k, PathBuf::from(v.trim())))
        })
    }

    pub fn dangerous_mode(&self) -> bool {
        self.get_bool("STATA_RUNNER_DANGEROUS_MODE")
    }

    pub fn debug(&self) -> bool {
        self.get_bool("STATA_RUNNER_DEBUG")
    }

    pub fn cache_path(&self) -> PathBuf {
        self.get("STATA_RUNNER_CACHE_DIR")
            .filter(|v| !v.trim().is_empty())
            .map(PathBuf::from)
            .unwrap_or_else(default_cache_path)
    }

    pub fn timeout(&self) -> Duration {
        let secs = self
            .get_u64("STATA_RUNNER_TIMEOUT")
            .filter(|s| *s > 0)
            .unwrap_or(DEFAULT_TIMEOUT_SECS);
        Duration::from_secs(secs)
    }

    pub fn hash_length(&self) -> usize {
        self.get_usize("STATA_RUNNER_HASH_LENGTH")
            .unwrap_or(DEFAULT_HASH_LENGTH)
            .clamp(MIN_HASH_LENGTH, MAX_HASH_LENGTH)
    }

    /// Tracing filter directive for the binary.
    pub fn log_filter(&self) -> String {
        match self.get("STATA_RUNNER_LOG").filter(|v| !v.trim().is_empty()) {
            Some(v) => v,
            None if self.debug() => "stata_runner=debug".to_string(),
            None => "stata_runner=info".to_string(),
        }
    }
}

fn parse_line(line: &str) -> Option<(String, String)> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return None;
    }
    let (k, v) = line.split_once('=')?;
    let v = v.trim().trim_matches('"');
    Some((k.trim().to_string(), v.to_string()))
}

fn is_config_key(k: &str) -> bool {
    STATA_CLI_KEYS.contains(&k) || k.starts_with("STATA_RUNNER_")
}

fn default_config_path() -> PathBuf {
    let base = BaseDirs::new()
        .map(|b| b.config_dir().to_path_buf())
        .unwrap_or_else(|| PathBuf::from("~/.config"));
    base.join("stata-runner").join(".statarc")
}

fn default_cache_path() -> PathBuf {
    BaseDirs::new()
        .map(|b| b.cache_dir().to_path_buf())
        .unwrap_or_else(env::temp_dir)
        .join("stata-runner")
        .join("logs")
}

fn default_map() -> HashMap<String, String> {
    let mut m = HashMap::new();
    m.insert(
        "STATA_RUNNER_CACHE_DIR".into(),
        default_cache_path().to_string_lossy().into_owned(),
    );
    m.insert("STATA_RUNNER_TIMEOUT".into(), DEFAULT_TIMEOUT_SECS.to_string());
    m.insert("STATA_RUNNER_HASH_LENGTH".into(), DEFAULT_HASH_LENGTH.to_string());

    // Bools as strings
    m.insert("STATA_RUNNER_DANGEROUS_MODE".into(), "false".into());
    m.insert("STATA_RUNNER_DEBUG".into(), "false".into());

    m
}
