use anyhow::{Result, anyhow};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::filter::LevelFilter;

/// Installs the global subscriber. Output goes to stderr so prompts on
/// stdout stay readable.
pub fn init(level: &str) -> Result<()> {
    let default_level: LevelFilter = level
        .parse()
        .map_err(|_| anyhow!("invalid log level {level:?}; expected trace, debug, info, warn or error"))?;

    let env_filter = EnvFilter::builder()
        .with_default_directive(default_level.into())
        .from_env_lossy();

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init()
        .map_err(|e| anyhow!("failed to install log subscriber: {e}"))
}
