use anomaly_kit::cli::Cli;
use anyhow::Result;
use clap::Parser;

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("anomaly_kit=info".parse()?),
        )
        .init();

    let cli = Cli::parse();
    cli.run()
}
