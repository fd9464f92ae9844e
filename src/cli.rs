use std::path::PathBuf;

use clap::{ArgGroup, Args, Parser, Subcommand};

#[derive(Parser, Debug, Clone)]
#[command(name = "stata-runner", about = "Run Stata do-files safely from scripts and agents", version)]
pub struct Cli {
    /// Path to the Stata executable (overrides stata_cli/STATA_CLI and search).
    #[arg(long, global = true, value_name = "PATH")]
    pub stata: Option<PathBuf>,

    /// Print machine-readable JSON instead of text.
    #[arg(long, global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Screen and run a do-file.
    Run(RunArgs),
    /// Screen a do-file against the command policy without running it.
    ///
    /// Exits 0 for allow, 1 for ask, 2 for deny.
    Check(ScriptArgs),
    /// Show the Stata executable that would be used.
    Locate {
        /// List every installation found, best first. A usable --stata or
        /// STATA_CLI override is listed ahead of the search results.
        #[arg(long)]
        all: bool,
    },
    /// Check whether Stata can be used on this machine.
    Usable,
}

#[derive(Args, Debug, Clone)]
#[command(group(ArgGroup::new("script").args(["file", "code"]).required(true).multiple(false)))]
pub struct ScriptArgs {
    /// Do-file to run.
    #[arg(value_name = "DOFILE")]
    pub file: Option<PathBuf>,

    /// Inline do-file text.
    #[arg(short = 'c', long)]
    pub code: Option<String>,

    /// Let denied and confirmation-required commands run (also STATA_RUNNER_DANGEROUS_MODE=true).
    #[arg(long)]
    pub dangerous: bool,
}

#[derive(Args, Debug, Clone)]
pub struct RunArgs {
    #[command(flatten)]
    pub script: ScriptArgs,

    /// Wall-clock limit in seconds (default STATA_RUNNER_TIMEOUT or 600).
    #[arg(long, value_name = "SECS")]
    pub timeout: Option<u64>,

    /// Working directory for the run.
    #[arg(long, value_name = "DIR")]
    pub cwd: Option<PathBuf>,

    /// Confirm commands that need confirmation (e.g. file deletion) without prompting.
    #[arg(short = 'y', long)]
    pub yes: bool,
}

impl Cli {
    pub fn parse() -> Self {
        <Self as Parser>::parse()
    }
}
