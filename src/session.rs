//! Ties the pieces together for one process: resolve once, screen, run.

use std::path::Path;

use crate::{
    cache::LogCache,
    config::Config,
    edition::{self, InstalledEdition},
    error::LocateError,
    executor::{ExecuteOptions, ExecutionResult, Executor, ScriptSubmission},
    guard::{GuardReport, Policy},
    locator::{Locator, ResolutionCache, ResolutionSource, ResolvedInterpreter},
};

#[derive(Debug)]
pub struct Session {
    cfg: Config,
    locator: Locator,
    resolved: ResolutionCache,
    cache: LogCache,
    policy: Policy,
}

impl Session {
    pub fn new(cfg: Config) -> Self {
        let cache = LogCache::from_config(&cfg);
        Self {
            cfg,
            locator: Locator::detect(),
            resolved: ResolutionCache::new(),
            cache,
            policy: Policy::default(),
        }
    }

    pub fn with_locator(mut self, locator: Locator) -> Self {
        self.locator = locator;
        self.resolved = ResolutionCache::new();
        self
    }

    pub fn with_policy(mut self, policy: Policy) -> Self {
        self.policy = policy;
        self
    }

    pub fn config(&self) -> &Config {
        &self.cfg
    }

    pub fn locator(&self) -> &Locator {
        &self.locator
    }

    pub fn resolve(&self, explicit: Option<&Path>) -> Result<ResolvedInterpreter, LocateError> {
        self.resolved.resolve(&self.locator, explicit, &self.cfg)
    }

    /// Every known installation, best first. A usable override (explicit or
    /// from the environment) leads the list since it wins resolution.
    pub fn installations(&self, explicit: Option<&Path>) -> Vec<InstalledEdition> {
        let mut found = self.locator.enumerate();
        edition::sort(&mut found);
        found.reverse();
        if let Ok(r) = self.resolve(explicit) {
            if r.source != ResolutionSource::Search {
                found.retain(|e| e.path != r.path);
                found.insert(0, InstalledEdition::from_path(&r.path));
            }
        }
        found
    }

    pub fn check(&self, script: &str, dangerous_mode: bool) -> GuardReport {
        self.policy.evaluate(script, dangerous_mode)
    }

    /// Resolution failures surface as errors; everything after that is
    /// reported in the result.
    pub async fn run(
        &self,
        explicit: Option<&Path>,
        submission: &ScriptSubmission,
        opts: &ExecuteOptions,
    ) -> Result<ExecutionResult, LocateError> {
        let interpreter = self.resolve(explicit)?;
        let executor = Executor::new(interpreter, self.cache.clone())
            .with_platform(self.locator.platform())
            .with_policy(self.policy.clone());
        Ok(executor.execute(submission, opts).await)
    }
}
