use clap::{Args, Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(author, version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Package a directory into a deterministic zip.
    Archive(ArchiveArgs),
    /// Report broken internal links in a static site.
    CheckLinks(CheckLinksArgs),
    /// Render `derivatives/index.html` from `derivatives/derivatives.json`.
    RenderDerivatives(RenderDerivativesArgs),
    /// Regenerate `signals.json` from the commit feed and the local Atom feed.
    UpdateSignals(UpdateSignalsArgs),
}

#[derive(Debug, Args)]
pub struct ArchiveArgs {
    /// Directory whose files are archived.
    #[arg(long, default_value = "template")]
    pub source: String,

    /// Output path for the zip.
    #[arg(long, default_value = "assets/starter-kit.zip")]
    pub out: String,

    /// Leading directory for every entry name (default: the source directory's name).
    #[arg(long)]
    pub entry_prefix: Option<String>,
}

#[derive(Debug, Args)]
pub struct CheckLinksArgs {
    /// Site root scanned for `.html` files.
    #[arg(long, default_value = ".")]
    pub root: String,

    /// Deployment path prefix (e.g. `/my-project`) stripped when absent locally.
    /// First matching prefix wins.
    #[arg(
        long = "base-prefix",
        env = "SITEKIT_BASE_PREFIXES",
        value_delimiter = ','
    )]
    pub base_prefixes: Vec<String>,
}

#[derive(Debug, Args)]
pub struct RenderDerivativesArgs {
    /// Site root containing `derivatives/`.
    #[arg(long, default_value = ".")]
    pub site_root: String,
}

#[derive(Debug, Args)]
pub struct UpdateSignalsArgs {
    /// Site root containing `feed.xml`; `signals.json` is written here.
    #[arg(long, default_value = ".")]
    pub site_root: String,

    /// Repository whose public commits are listed.
    #[arg(long, env = "SITEKIT_SIGNALS_REPO", default_value = "NubzParmesan/minnow-oc")]
    pub repo: String,

    /// Base URL of the commits API.
    #[arg(
        long,
        env = "SITEKIT_GITHUB_API_BASE",
        default_value = "https://api.github.com"
    )]
    pub api_base: String,
}
