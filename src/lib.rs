//! Locate a local Stata installation, screen do-files against a command
//! policy, and run them in batch with a timeout.

pub mod cache;
pub mod config;
pub mod edition;
pub mod error;
pub mod executor;
pub mod guard;
pub mod locator;
pub mod logging;
pub mod printer;
pub mod process;
pub mod session;

pub use config::Config;
pub use edition::{Edition, InstalledEdition};
pub use error::{CacheError, GuardError, LocateError};
pub use executor::{ExecuteOptions, ExecutionResult, Executor, ExitStatus, ScriptSubmission};
pub use guard::{GuardReport, GuardVerdict, Policy};
pub use locator::{Locator, Platform, ResolvedInterpreter};
pub use session::Session;
