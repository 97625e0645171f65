//! sitepost - Blog post-processor

use std::io;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use sitepost::config::CONFIG_FILE;
use sitepost::{Config, KatexCommand};

#[derive(Parser)]
#[command(name = "sitepost")]
#[command(version, about = "Post-process a generated blog in place", long_about = None)]
#[command(after_help = "EXAMPLES:
    mdbook build | sitepost book          Rewrite book/ once the build finishes
    sitepost --no-wait site               Rewrite site/ right away
    sitepost -c blog.toml --katex katex   Use another config and KaTeX binary")]
struct Cli {
    /// Directory holding the generated HTML
    #[arg(value_name = "ROOT", default_value = "site")]
    root: PathBuf,

    /// Configuration file [default: sitepost.toml next to ROOT]
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Start immediately instead of waiting for stdin to close
    #[arg(long)]
    no_wait: bool,

    /// KaTeX CLI to render math with
    #[arg(long, value_name = "PROGRAM")]
    katex: Option<String>,
}

fn main() -> ExitCode {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "sitepost=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .init();

    let cli = Cli::parse();
    match run(&cli) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

/// Returns whether every page was processed.
fn run(cli: &Cli) -> sitepost::Result<bool> {
    let candidate = cli
        .root
        .parent()
        .map(|p| p.join(CONFIG_FILE))
        .unwrap_or_else(|| PathBuf::from(CONFIG_FILE));
    let mut config = Config::discover(cli.config.as_deref(), &candidate)?;
    if let Some(katex) = &cli.katex {
        config.math.command = vec![katex.clone()];
    }
    let katex = KatexCommand::new(&config.math.command)?;

    if !cli.no_wait {
        sitepost::wait_for_ready(io::stdin().lock())?;
    }

    let report = sitepost::run(&cli.root, &config, &katex)?;
    for failure in &report.failures {
        eprintln!("failed: {failure}");
    }
    Ok(report.is_success())
}
