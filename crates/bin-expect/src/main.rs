//! The `bin-expect` command-line entry point.

use clap::Parser;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = bin_expect::cli::Cli::parse();
    if let Err(err) = bin_expect::cli::run(cli).await {
        eprintln!("bin-expect: {err}");
        std::process::exit(1);
    }
}
