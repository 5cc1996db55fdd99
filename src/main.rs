use std::path::PathBuf;

use civitai_html_to_json::{run, Mode};
use clap::Parser;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Cli {
    /// Directory of saved gallery pages to convert
    #[arg(value_name = "DIR")]
    root: PathBuf,

    /// One JSON file per page, or all pages combined into one file
    #[arg(long, value_enum, default_value_t = Mode::OneToOne)]
    mode: Mode,

    /// Where to save the combined JSON (many-to-one only)
    #[arg(long, short, value_name = "FILE")]
    output: Option<PathBuf>,

    /// Show progress to stderr
    #[arg(long, default_value_t = true, action = clap::ArgAction::Set)]
    progress: bool,

    /// Log debug details such as degraded gallery blocks
    #[arg(long, short)]
    verbose: bool,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    run(&cli.root, cli.mode, cli.output.as_deref(), cli.progress)
        .map(|_| ())
        .map_err(|e| anyhow::anyhow!(e))
}
