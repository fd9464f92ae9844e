#![cfg(unix)]

mod common;

use std::{fs, path::Path, time::Duration};

use stata_runner::{
    cache::LogCache,
    locator::{ResolutionSource, ResolvedInterpreter},
    Edition, ExecuteOptions, ExecutionResult, Executor, ExitStatus, Platform, ScriptSubmission,
};

use common::make_exe;

struct Fixture {
    dir: tempfile::TempDir,
    cache: LogCache,
}

impl Fixture {
    fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let cache = LogCache::new(dir.path().join("cache"), 12);
        Self { dir, cache }
    }

    fn log_for(&self, script: &str) -> String {
        self.cache.log_path(&self.cache.key_for(script)).display().to_string()
    }

    /// A stand-in for console Stata: swallows stdin, then runs `body`.
    fn interpreter(&self, body: &str) -> ResolvedInterpreter {
        let path = self.dir.path().join("bin").join("stata-mp");
        make_exe(&path, &format!("cat > /dev/null\n{body}"));
        ResolvedInterpreter { path, edition: Edition::Mp, source: ResolutionSource::Explicit }
    }

    fn executor(&self, interp: ResolvedInterpreter) -> Executor {
        Executor::new(interp, self.cache.clone()).with_platform(Platform::Linux)
    }

    async fn run(&self, body: &str, sub: ScriptSubmission, opts: ExecuteOptions) -> ExecutionResult {
        self.executor(self.interpreter(body)).execute(&sub, &opts).await
    }
}

fn opts() -> ExecuteOptions {
    ExecuteOptions::new(Duration::from_secs(10))
}

fn write_log(log: &str, text: &str) -> String {
    format!("cat > '{log}' <<'EOF'\n{text}\nEOF")
}

#[tokio::test]
async fn clean_log_is_success() {
    let fx = Fixture::new();
    let script = "sysuse auto, clear\nsummarize price";
    let body = write_log(&fx.log_for(script), ". summarize price\n\nend of do-file");
    let r = fx.run(&body, ScriptSubmission::text(script), opts()).await;

    assert_eq!(r.exit_status, ExitStatus::Success, "{r:?}");
    assert!(r.log_text.contains("end of do-file"));
    assert_eq!(r.log_file_path, Some(fx.cache.log_path(&fx.cache.key_for(script))));
    assert_eq!(r.os_exit_code, Some(0));
    assert_eq!(r.error_code, None);
}

#[tokio::test]
async fn error_marker_beats_zero_exit() {
    let fx = Fixture::new();
    let script = "regress price nosuchvar";
    let body = write_log(
        &fx.log_for(script),
        ". regress price nosuchvar\nvariable nosuchvar not found\nr(111);\n\nend of do-file\nr(111);",
    );
    let r = fx.run(&body, ScriptSubmission::text(script), opts()).await;

    assert_eq!(r.exit_status, ExitStatus::Failure);
    assert_eq!(r.error_code, Some(111));
    assert_eq!(r.os_exit_code, Some(0));
}

#[tokio::test]
async fn nonzero_exit_without_marker_is_failure() {
    let fx = Fixture::new();
    let script = "display 1";
    let body = format!("{}\nexit 3", write_log(&fx.log_for(script), "1"));
    let r = fx.run(&body, ScriptSubmission::text(script), opts()).await;
    assert_eq!(r.exit_status, ExitStatus::Failure);
    assert_eq!(r.os_exit_code, Some(3));
}

#[tokio::test]
async fn missing_log_is_failure() {
    let fx = Fixture::new();
    let r = fx.run("echo console output\nexit 0", ScriptSubmission::text("display 1"), opts()).await;
    assert_eq!(r.exit_status, ExitStatus::Failure);
    assert_eq!(r.log_file_path, None);
    assert_eq!(r.log_text, "console output");
}

#[tokio::test]
async fn denied_script_never_spawns() {
    let fx = Fixture::new();
    let marker = fx.dir.path().join("spawned");
    let body = format!("touch '{}'", marker.display());
    let r = fx.run(&body, ScriptSubmission::text("! rm -rf /"), opts()).await;

    assert_eq!(r.exit_status, ExitStatus::Denied);
    assert_eq!(r.guard.as_ref().and_then(|g| g.verdict.rule()), Some("shell-escape"));
    assert!(!r.needs_confirmation());
    assert!(!marker.exists());
}

#[tokio::test]
async fn ask_needs_confirmation() {
    let fx = Fixture::new();
    let script = "rm tempfile.dta";
    let body = write_log(&fx.log_for(script), ". rm tempfile.dta\n\nend of do-file");

    let r = fx.run(&body, ScriptSubmission::text(script), opts()).await;
    assert_eq!(r.exit_status, ExitStatus::Denied);
    assert!(r.needs_confirmation());

    let r = fx.run(&body, ScriptSubmission::text(script), opts().confirmed(true)).await;
    assert_eq!(r.exit_status, ExitStatus::Success);
}

#[tokio::test]
async fn dangerous_mode_runs_and_keeps_the_rule() {
    let fx = Fixture::new();
    let script = "shell ls";
    let body = write_log(&fx.log_for(script), ". shell ls\n\nend of do-file");
    let r = fx.run(&body, ScriptSubmission::text(script).dangerous(true), opts()).await;

    assert_eq!(r.exit_status, ExitStatus::Success);
    let guard = r.guard.expect("guard report");
    assert!(guard.verdict.is_deny());
    assert_eq!(guard.verdict.rule(), Some("shell"));
    assert!(guard.bypassed());
}

#[tokio::test]
async fn dangerous_mode_skips_confirmation() {
    let fx = Fixture::new();
    let script = "rm tempfile.dta";
    let body = write_log(&fx.log_for(script), ". rm tempfile.dta\n\nend of do-file");
    let r = fx.run(&body, ScriptSubmission::text(script).dangerous(true), opts()).await;

    assert_eq!(r.exit_status, ExitStatus::Success);
    assert!(!r.needs_confirmation());
    let guard = r.guard.expect("guard report");
    assert!(guard.verdict.is_ask());
    assert_eq!(guard.verdict.rule(), Some("rm"));
    assert!(guard.bypassed());
}

#[tokio::test]
async fn timeout_wins_over_eventual_success() {
    let fx = Fixture::new();
    let script = "sleep 60000";
    let log = fx.log_for(script);
    let body = format!(
        "printf '. sleep 60000\\n' > '{log}'\nexec sleep 5\n{}",
        write_log(&log, "end of do-file")
    );
    let r = fx
        .run(&body, ScriptSubmission::text(script), ExecuteOptions::new(Duration::from_millis(300)))
        .await;

    assert_eq!(r.exit_status, ExitStatus::Timeout);
    assert!(r.log_text.contains(". sleep 60000"));
    assert!(r.duration < Duration::from_secs(4));
}

#[tokio::test]
async fn missing_binary_is_a_launch_error() {
    let fx = Fixture::new();
    let interp = ResolvedInterpreter {
        path: fx.dir.path().join("gone").join("stata-mp"),
        edition: Edition::Mp,
        source: ResolutionSource::Explicit,
    };
    let r = fx.executor(interp).execute(&ScriptSubmission::text("display 1"), &opts()).await;
    assert_eq!(r.exit_status, ExitStatus::LaunchError);
    assert!(r.message.unwrap().contains("failed to launch"));
}

#[tokio::test]
async fn unreadable_script_file_is_a_launch_error() {
    let fx = Fixture::new();
    let sub = ScriptSubmission::file(fx.dir.path().join("nope.do"));
    let r = fx.run("exit 0", sub, opts()).await;
    assert_eq!(r.exit_status, ExitStatus::LaunchError);
    assert!(r.guard.is_none());
}

#[tokio::test]
async fn stdin_runs_the_cached_script_with_a_named_log() {
    let fx = Fixture::new();
    let script = "display 42";
    let key = fx.cache.key_for(script);
    let seen = fx.dir.path().join("stdin.txt");
    let path = fx.dir.path().join("bin").join("stata-mp");
    make_exe(&path, &format!("cat > '{}'\n{}", seen.display(), write_log(&fx.log_for(script), "42")));
    let interp = ResolvedInterpreter { path, edition: Edition::Mp, source: ResolutionSource::Search };

    let r = fx.executor(interp).execute(&ScriptSubmission::text(script), &opts()).await;
    assert_eq!(r.exit_status, ExitStatus::Success);

    let stdin = fs::read_to_string(&seen).unwrap();
    let script_path = fx.cache.script_path(&key);
    assert!(stdin.contains(&format!("do `\"{}\"'", script_path.display())));
    assert!(stdin.contains(&format!("log using `\"{}\"'", fx.cache.log_path(&key).display())));
    assert_eq!(fs::read_to_string(script_path).unwrap(), script);
}

#[tokio::test]
async fn runs_in_the_requested_directory() {
    let fx = Fixture::new();
    let work = fx.dir.path().join("work");
    fs::create_dir_all(&work).unwrap();
    let script = "pwd";
    let body = format!("pwd -P > '{}'", fx.log_for(script));
    let r = fx.run(&body, ScriptSubmission::text(script), opts().working_dir(&work)).await;

    assert_eq!(r.exit_status, ExitStatus::Success);
    assert_eq!(Path::new(r.log_text.trim()), fs::canonicalize(&work).unwrap());
}

#[tokio::test]
async fn file_submission_is_run_in_place() {
    let fx = Fixture::new();
    let dofile = fx.dir.path().join("analysis.do");
    fs::write(&dofile, "display 1\n").unwrap();
    let body = write_log(&fx.log_for("display 1\n"), "1");
    let r = fx.run(&body, ScriptSubmission::file(&dofile), opts()).await;

    assert_eq!(r.exit_status, ExitStatus::Success);
    assert!(!fx.cache.script_path(&fx.cache.key_for("display 1\n")).exists());
}

#[tokio::test]
async fn session_resolves_then_runs() {
    use stata_runner::{Config, Locator, Session};

    let dir = tempfile::tempdir().unwrap();
    let bin = dir.path().join("bin");
    let cache_dir = dir.path().join("logs");
    let cfg = Config::from_pairs([("STATA_RUNNER_CACHE_DIR", cache_dir.display().to_string())]);
    let cache = LogCache::from_config(&cfg);
    let script = "display 2";
    let log = cache.log_path(&cache.key_for(script)).display().to_string();
    make_exe(&bin.join("stata-se"), &format!("cat > /dev/null\n{}", write_log(&log, "2")));

    let session = Session::new(cfg)
        .with_locator(Locator::for_platform(Platform::Linux).with_bases(vec![bin.clone()]));
    let r = session
        .run(None, &ScriptSubmission::text(script), &opts())
        .await
        .unwrap();
    assert_eq!(r.exit_status, ExitStatus::Success);
    assert_eq!(r.log_text.trim(), "2");

    let err = session
        .run(Some(&dir.path().join("nope")), &ScriptSubmission::text(script), &opts())
        .await;
    // a bad explicit path falls back to search
    assert!(err.is_ok());

    let empty = Session::new(common::empty_config())
        .with_locator(Locator::for_platform(Platform::Linux).with_bases(vec![dir.path().join("none")]));
    assert!(empty.run(None, &ScriptSubmission::text(script), &opts()).await.is_err());
}
