//! podcheck -- container entrypoint/args override conformance checker.
//!
//! Loads `podcheck.toml`, initializes logging and dispatches to the
//! subcommand handlers in [`commands`].

mod cli;
mod commands;
mod error;
mod logging;
mod output;

use std::path::Path;

use clap::Parser;
use colored::Colorize;
use tracing::debug;

use podcheck_core::config::PodcheckConfig;
use podcheck_core::error::{ConfigError, PodcheckError};

use crate::cli::{Cli, Commands, DEFAULT_CONFIG_PATH};
use crate::error::CliError;
use crate::output::OutputWriter;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if let Err(err) = run(cli).await {
        eprintln!("{} {err}", "error:".red().bold());
        std::process::exit(err.exit_code());
    }
}

async fn run(cli: Cli) -> Result<(), CliError> {
    let mut config = load_config(&cli.config).await?;
    if let Some(level) = &cli.log_level {
        config.general.log_level = level.clone();
        config.validate()?;
    }

    logging::init_tracing(&config.general)?;
    podcheck_core::metrics::describe_all();
    debug!(config = %cli.config.display(), "configuration loaded");

    let writer = OutputWriter::new(cli.output);
    match cli.command {
        Commands::Run(args) => commands::run::execute(args, &config, &writer).await,
        Commands::List(args) => commands::list::execute(args, &writer),
        Commands::Verify(args) => commands::verify::execute(args, &writer).await,
        Commands::Config(args) => commands::config::execute(args, &cli.config, &writer).await,
    }
}

/// 설정 파일을 로드합니다.
///
/// 기본 경로의 파일이 없으면 기본값과 환경변수 오버라이드로 대체합니다.
/// 명시적으로 지정한 경로의 파일이 없으면 에러입니다.
async fn load_config(path: &Path) -> Result<PodcheckConfig, CliError> {
    match PodcheckConfig::load(path).await {
        Ok(config) => Ok(config),
        Err(PodcheckError::Config(ConfigError::FileNotFound { .. }))
            if path == Path::new(DEFAULT_CONFIG_PATH) =>
        {
            let mut config = PodcheckConfig::default();
            config.apply_env_overrides();
            config.validate()?;
            Ok(config)
        }
        Err(e) => Err(e.into()),
    }
}
