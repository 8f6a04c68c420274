use std::process::ExitCode;

use anyhow::Context as _;
use clap::Parser as _;

fn main() -> ExitCode {
    match try_main() {
        Ok(code) => code,
        Err(err) => {
            eprintln!("{err:#}");
            ExitCode::from(sitekit::error::exit_code_for(&err))
        }
    }
}

fn try_main() -> anyhow::Result<ExitCode> {
    sitekit::logging::init().context("init logging")?;

    let cli = sitekit::cli::Cli::parse();
    tracing::debug!(?cli, "parsed cli");

    match cli.command {
        sitekit::cli::Command::Archive(args) => {
            sitekit::archive::run(args).context("archive")?;
        }
        sitekit::cli::Command::CheckLinks(args) => {
            let report = sitekit::links::run(args).context("check links")?;
            tracing::debug!(
                files = report.files_scanned,
                broken = report.broken.len(),
                "link check finished"
            );
            if !report.is_clean() {
                return Ok(ExitCode::FAILURE);
            }
        }
        sitekit::cli::Command::RenderDerivatives(args) => {
            sitekit::derivatives::run(args).context("render derivatives")?;
        }
        sitekit::cli::Command::UpdateSignals(args) => {
            sitekit::signals::run(args).context("update signals")?;
        }
    }

    Ok(ExitCode::SUCCESS)
}
