//! How the interpreter is launched for one script.
//!
//! Everything platform- or edition-specific about the command line lives in
//! `build_invocation`; the executor only runs what it gets back.

use std::path::{Path, PathBuf};

use crate::locator::Platform;

/// Named so a `log close` inside the user's script leaves ours open.
pub const LOG_NAME: &str = "stata_runner";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub program: PathBuf,
    pub args: Vec<String>,
    /// Fed to the process and then closed.
    pub stdin: Option<String>,
    /// File the executor must write before launching.
    pub wrapper: Option<(PathBuf, String)>,
}

pub fn build_invocation(
    platform: Platform,
    interpreter: &Path,
    script: &Path,
    log_file: &Path,
    wrapper_path: &Path,
) -> Invocation {
    let block = command_block(script, log_file);
    match platform {
        // Console Stata reads commands from stdin without prompting.
        Platform::Linux | Platform::MacOs => Invocation {
            program: interpreter.to_path_buf(),
            args: vec!["-q".to_string()],
            stdin: Some(block),
            wrapper: None,
        },
        // The Windows build is GUI-only; `/e` runs a do-file and exits.
        Platform::Windows => Invocation {
            program: interpreter.to_path_buf(),
            args: vec![
                "/e".to_string(),
                "do".to_string(),
                wrapper_path.to_string_lossy().into_owned(),
            ],
            stdin: None,
            wrapper: Some((wrapper_path.to_path_buf(), block)),
        },
    }
}

/// Commands that run `script` with its output captured in `log_file`.
pub fn command_block(script: &Path, log_file: &Path) -> String {
    format!(
        "log using {}, replace text name({LOG_NAME})\n\
         do {}\n\
         capture log close {LOG_NAME}\n\
         exit, STATA clear\n",
        quote(log_file),
        quote(script),
    )
}

/// Stata compound quotes survive embedded double quotes in paths.
fn quote(p: &Path) -> String {
    format!("`\"{}\"'", p.display())
}
