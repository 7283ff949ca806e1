//! pdfsuite binary
//!
//! Logs go to stderr so stdout only carries command output.

use anyhow::Result;
use clap::Parser;
use pdfsuite_cli::{run, Cli, CliConfig};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let config = CliConfig::from_env()?.with_overrides(
        cli.output_dir.clone(),
        cli.dpi(),
        cli.font.clone(),
    )?;

    tracing::debug!(?config, "configuration");

    let written = run(&cli, &config, &mut std::io::stdout().lock())?;
    for path in written {
        println!("{}", path.display());
    }

    Ok(())
}
