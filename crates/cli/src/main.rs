mod cli;
mod config;

use clap::Parser;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    //  Logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,ovgenai=debug")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = cli::Cli::parse();

    match args.command {
        cli::Commands::Probe => cli::probe::execute(args.global).await,
        cli::Commands::Encode(a) => cli::tokenize::encode(args.global, a).await,
        cli::Commands::Decode(a) => cli::tokenize::decode(args.global, a).await,
        cli::Commands::Generate(a) => cli::generate::execute(args.global, a).await,
        cli::Commands::Config(c) => cli::config_cmd::execute(c).await,
    }
}
