//! Run a screened do-file through the resolved interpreter.
//!
//! Every outcome, including launch problems and policy denials, comes back as
//! an `ExecutionResult`; nothing here returns an error or retries.

use std::{
    fs,
    path::{Path, PathBuf},
    sync::LazyLock,
    time::{Duration, Instant},
};

use regex::Regex;
use serde::{Serialize, Serializer};
use tokio::{
    io::{AsyncRead, AsyncReadExt, AsyncWriteExt},
    process::Command,
    task::JoinHandle,
    time::timeout,
};
use tracing::{debug, info, warn};

use crate::{
    cache::LogCache,
    guard::{GuardReport, GuardVerdict, Policy},
    locator::{Platform, ResolvedInterpreter},
    process::build_invocation,
};

pub mod slots;

/// Stata prints `r(<code>);` on its own line when a command aborts the do-file.
static ERROR_MARKER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^r\((\d+)\);").expect("error marker regex compiles"));

/// How long to wait for output pipes after the process is gone.
const PIPE_GRACE: Duration = Duration::from_millis(500);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExitStatus {
    Success,
    Failure,
    Timeout,
    Denied,
    LaunchError,
}

impl ExitStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            ExitStatus::Success => "SUCCESS",
            ExitStatus::Failure => "FAILURE",
            ExitStatus::Timeout => "TIMEOUT",
            ExitStatus::Denied => "DENIED",
            ExitStatus::LaunchError => "LAUNCH_ERROR",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScriptSource {
    Text(String),
    File(PathBuf),
}

/// A script as received from the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptSubmission {
    pub source: ScriptSource,
    pub dangerous_mode: bool,
}

impl ScriptSubmission {
    pub fn text(script: impl Into<String>) -> Self {
        Self { source: ScriptSource::Text(script.into()), dangerous_mode: false }
    }

    pub fn file(path: impl Into<PathBuf>) -> Self {
        Self { source: ScriptSource::File(path.into()), dangerous_mode: false }
    }

    pub fn dangerous(mut self, on: bool) -> Self {
        self.dangerous_mode = on;
        self
    }

    pub fn read(&self) -> std::io::Result<String> {
        match &self.source {
            ScriptSource::Text(s) => Ok(s.clone()),
            ScriptSource::File(p) => fs::read_to_string(p),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ExecuteOptions {
    pub timeout: Duration,
    pub working_dir: Option<PathBuf>,
    /// The caller has confirmed an ask-level script.
    pub confirmed: bool,
}

impl ExecuteOptions {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout, working_dir: None, confirmed: false }
    }

    pub fn working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    pub fn confirmed(mut self, yes: bool) -> Self {
        self.confirmed = yes;
        self
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ExecutionResult {
    pub exit_status: ExitStatus,
    pub log_text: String,
    pub log_file_path: Option<PathBuf>,
    #[serde(serialize_with = "secs")]
    pub duration: Duration,
    pub guard: Option<GuardReport>,
    /// Stata return code of the first runtime error in the log.
    pub error_code: Option<u32>,
    pub os_exit_code: Option<i32>,
    pub message: Option<String>,
}

fn secs<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_f64(d.as_secs_f64())
}

impl ExecutionResult {
    fn early(status: ExitStatus, started: Instant, guard: Option<GuardReport>, msg: String) -> Self {
        Self {
            exit_status: status,
            log_text: String::new(),
            log_file_path: None,
            duration: started.elapsed(),
            guard,
            error_code: None,
            os_exit_code: None,
            message: Some(msg),
        }
    }

    pub fn is_success(&self) -> bool {
        self.exit_status == ExitStatus::Success
    }

    /// Denied only because an ask-level command was not confirmed.
    pub fn needs_confirmation(&self) -> bool {
        self.exit_status == ExitStatus::Denied
            && self.guard.as_ref().is_some_and(GuardReport::needs_confirmation)
    }
}

/// First `r(NNN);` code in a log, if the script aborted.
pub fn find_error_code(log: &str) -> Option<u32> {
    ERROR_MARKER
        .captures(log)
        .and_then(|c| c.get(1))
        .and_then(|m| m.as_str().parse().ok())
}

#[derive(Debug, Clone)]
pub struct Executor {
    interpreter: ResolvedInterpreter,
    platform: Platform,
    cache: LogCache,
    policy: Policy,
}

impl Executor {
    pub fn new(interpreter: ResolvedInterpreter, cache: LogCache) -> Self {
        Self { interpreter, platform: Platform::detect(), cache, policy: Policy::default() }
    }

    pub fn with_policy(mut self, policy: Policy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_platform(mut self, platform: Platform) -> Self {
        self.platform = platform;
        self
    }

    pub fn interpreter(&self) -> &ResolvedInterpreter {
        &self.interpreter
    }

    pub fn cache(&self) -> &LogCache {
        &self.cache
    }

    pub async fn execute(&self, submission: &ScriptSubmission, opts: &ExecuteOptions) -> ExecutionResult {
        let started = Instant::now();

        let text = match submission.read() {
            Ok(t) => t,
            Err(e) => {
                let msg = format!("cannot read script: {e}");
                warn!("{msg}");
                return ExecutionResult::early(ExitStatus::LaunchError, started, None, msg);
            }
        };

        let report = self.policy.evaluate(&text, submission.dangerous_mode);
        if !report.permits_execution(opts.confirmed) {
            let msg = match &report.verdict {
                GuardVerdict::Ask { reason, rule } => {
                    format!("confirmation required ({rule}): {reason}")
                }
                GuardVerdict::Deny { reason, rule } => format!("blocked by rule {rule}: {reason}"),
                GuardVerdict::Allow => "blocked".to_string(),
            };
            warn!(rule = report.verdict.rule(), "{msg}");
            return ExecutionResult::early(ExitStatus::Denied, started, Some(report), msg);
        }
        if report.bypassed() {
            warn!(
                rule = report.verdict.rule(),
                line = report.finding.as_ref().map(|f| f.line_no),
                "dangerous mode: running script that policy would block"
            );
        }

        let key = self.cache.key_for(&text);
        let script_path = match self.script_path(submission, &key, &text) {
            Ok(p) => p,
            Err(msg) => {
                return ExecutionResult::early(ExitStatus::LaunchError, started, Some(report), msg);
            }
        };
        let log_path = self.cache.log_path(&key);

        let _slot = slots::acquire(&self.interpreter.path).await;
        self.cache.clear_log(&key);

        let invocation = build_invocation(
            self.platform,
            &self.interpreter.path,
            &script_path,
            &log_path,
            &self.cache.wrapper_path(&key),
        );
        if let Some((_, body)) = &invocation.wrapper {
            if let Err(e) = self.cache.store_wrapper(&key, body) {
                return ExecutionResult::early(ExitStatus::LaunchError, started, Some(report), e.to_string());
            }
        }

        info!(
            interpreter = %self.interpreter.path.display(),
            script = %script_path.display(),
            "running do-file"
        );

        let mut cmd = Command::new(&invocation.program);
        cmd.args(&invocation.args)
            .stdin(if invocation.stdin.is_some() {
                std::process::Stdio::piped()
            } else {
                std::process::Stdio::null()
            })
            .stdout(std::process::Stdio::piped())
            .stderr(std::process::Stdio::piped())
            .kill_on_drop(true);
        if let Some(dir) = &opts.working_dir {
            cmd.current_dir(dir);
        }

        let mut child = match cmd.spawn() {
            Ok(c) => c,
            Err(e) => {
                let msg = format!("failed to launch {}: {e}", self.interpreter.path.display());
                warn!("{msg}");
                return ExecutionResult::early(ExitStatus::LaunchError, started, Some(report), msg);
            }
        };

        let stdout = child.stdout.take().map(drain);
        let stderr = child.stderr.take().map(drain);
        if let (Some(mut stdin), Some(body)) = (child.stdin.take(), invocation.stdin.as_deref()) {
            if let Err(e) = stdin.write_all(body.as_bytes()).await {
                debug!("interpreter closed stdin early: {e}");
            }
        }

        let (status, timed_out) = match timeout(opts.timeout, child.wait()).await {
            Ok(Ok(status)) => (Some(status), false),
            Ok(Err(e)) => {
                let msg = format!("lost track of interpreter process: {e}");
                warn!("{msg}");
                return ExecutionResult::early(ExitStatus::LaunchError, started, Some(report), msg);
            }
            Err(_) => {
                warn!(timeout = ?opts.timeout, "do-file timed out, killing interpreter");
                if let Err(e) = child.kill().await {
                    debug!("kill after timeout failed: {e}");
                }
                (None, true)
            }
        };

        let mut console = collect(stdout).await;
        let err_text = collect(stderr).await;
        if !err_text.is_empty() {
            if !console.is_empty() {
                console.push('\n');
            }
            console.push_str(&err_text);
        }

        let log_file = self.cache.read_log(&key);
        let log_file_path = log_file.as_ref().map(|_| log_path.clone());
        let log_text = log_file.clone().unwrap_or(console);
        let error_code = find_error_code(&log_text);
        let os_exit_code = status.and_then(|s| s.code());

        let (exit_status, message) = if timed_out {
            (ExitStatus::Timeout, Some(format!("exceeded timeout of {:?}", opts.timeout)))
        } else if let Some(code) = error_code {
            (ExitStatus::Failure, Some(format!("do-file aborted with r({code})")))
        } else if !status.is_some_and(|s| s.success()) {
            (ExitStatus::Failure, Some(format!("interpreter exited with {os_exit_code:?}")))
        } else if log_file.is_none() {
            (ExitStatus::Failure, Some("interpreter produced no log".to_string()))
        } else {
            (ExitStatus::Success, None)
        };

        let duration = started.elapsed();
        info!(status = exit_status.as_str(), ?duration, "do-file finished");

        ExecutionResult {
            exit_status,
            log_text,
            log_file_path,
            duration,
            guard: Some(report),
            error_code,
            os_exit_code,
            message,
        }
    }

    fn script_path(&self, submission: &ScriptSubmission, key: &str, text: &str) -> Result<PathBuf, String> {
        match &submission.source {
            ScriptSource::Text(_) => self.cache.store_script(key, text).map_err(|e| e.to_string()),
            ScriptSource::File(p) => {
                // the log still goes to the cache
                self.cache.ensure_dir().map_err(|e| e.to_string())?;
                Ok(absolute(p))
            }
        }
    }
}

fn absolute(p: &Path) -> PathBuf {
    fs::canonicalize(p).unwrap_or_else(|_| p.to_path_buf())
}

fn drain<R>(mut reader: R) -> JoinHandle<Vec<u8>>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut buf = Vec::new();
        let _ = reader.read_to_end(&mut buf).await;
        buf
    })
}

/// A killed interpreter may leave children holding the pipe; don't wait on them.
async fn collect(handle: Option<JoinHandle<Vec<u8>>>) -> String {
    let Some(mut handle) = handle else {
        return String::new();
    };
    match timeout(PIPE_GRACE, &mut handle).await {
        Ok(Ok(buf)) => String::from_utf8_lossy(&buf).trim_end().to_string(),
        Ok(Err(_)) => String::new(),
        Err(_) => {
            handle.abort();
            String::new()
        }
    }
}
