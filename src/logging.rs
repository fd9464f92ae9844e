use anyhow::Result;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::config::Config;

/// Install the stderr subscriber. Stdout stays free for results.
pub fn init(cfg: &Config) -> Result<()> {
    let filter = EnvFilter::try_new(cfg.log_filter())
        .unwrap_or_else(|_| EnvFilter::new("stata_runner=info"));
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr).with_target(false))
        .with(filter)
        .try_init()?;
    Ok(())
}
