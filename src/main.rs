use std::process::ExitCode;

use anyhow::Context as _;
use clap::Parser as _;

#[tokio::main]
async fn main() -> ExitCode {
    if let Err(err) = try_main().await {
        eprintln!("{err:#}");
        return ExitCode::FAILURE;
    }

    ExitCode::SUCCESS
}

async fn try_main() -> anyhow::Result<()> {
    webtoepub::logging::init().context("init logging")?;

    let cli = webtoepub::cli::Cli::parse();
    tracing::debug!(?cli, "parsed cli");

    match cli.command {
        webtoepub::cli::Command::Analyze(args) => {
            webtoepub::analyze::run(args).await.context("analyze")?;
        }
        webtoepub::cli::Command::Build(args) => {
            webtoepub::build::run(args).await.context("build")?;
        }
    }

    Ok(())
}
