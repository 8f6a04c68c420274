use std::io::IsTerminal as _;

use anyhow::Context as _;

/// Installs the stderr fmt subscriber. `RUST_LOG` overrides the `info` default.
///
/// Colour is only emitted when stderr is a terminal and `NO_COLOR` is unset, so
/// logs captured from CI jobs stay plain text.
pub fn init() -> anyhow::Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .or_else(|_| tracing_subscriber::EnvFilter::try_new("info"))
        .context("build log filter")?;

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_ansi(use_ansi())
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|err| anyhow::anyhow!("initialize tracing subscriber: {err}"))?;

    Ok(())
}

fn use_ansi() -> bool {
    std::env::var_os("NO_COLOR").is_none() && std::io::stderr().is_terminal()
}
