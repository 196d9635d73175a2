//! CLI argument parsing using clap derive API
//!
//! Purely declarative: no side effects or I/O happen here.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

/// 기본 설정 파일 경로
pub const DEFAULT_CONFIG_PATH: &str = "podcheck.toml";

/// podcheck -- container entrypoint/args override conformance checker.
///
/// Use `podcheck <COMMAND> --help` for subcommand details.
#[derive(Parser, Debug)]
#[command(name = "podcheck", version, about, long_about = None)]
pub struct Cli {
    /// Path to the podcheck.toml configuration file.
    #[arg(short, long, default_value = DEFAULT_CONFIG_PATH)]
    pub config: PathBuf,

    /// Override log level (trace, debug, info, warn, error).
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    /// Output format.
    #[arg(long, global = true, default_value = "text")]
    pub output: OutputFormat,

    #[command(subcommand)]
    pub command: Commands,
}

/// Supported output formats.
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable table / text output.
    Text,
    /// Machine-readable JSON.
    Json,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run verification cases against the Docker daemon.
    Run(RunArgs),

    /// List the cases that `run` would execute.
    List(ListArgs),

    /// Check text against expected patterns without a daemon.
    Verify(VerifyArgs),

    /// Manage configuration.
    Config(ConfigArgs),
}

// ---- run ----

#[derive(Args, Debug)]
pub struct RunArgs {
    /// Only run the named case (repeatable).
    #[arg(long = "case")]
    pub cases: Vec<String>,

    /// Load cases from a TOML file instead of the built-in suite.
    #[arg(long)]
    pub cases_file: Option<PathBuf>,

    /// Override the per-case completion timeout in seconds.
    #[arg(long)]
    pub timeout: Option<u64>,

    /// Override the number of cases executed concurrently.
    #[arg(long)]
    pub concurrency: Option<usize>,

    /// Override the Docker socket path.
    #[arg(long)]
    pub socket: Option<String>,
}

// ---- list ----

#[derive(Args, Debug)]
pub struct ListArgs {
    /// Load cases from a TOML file instead of the built-in suite.
    #[arg(long)]
    pub cases_file: Option<PathBuf>,
}

// ---- verify ----

#[derive(Args, Debug)]
pub struct VerifyArgs {
    /// Expected pattern, matched in order (repeatable). Prefix with `re:` for a regex.
    #[arg(short = 'e', long = "expect", required = true)]
    pub expect: Vec<String>,

    /// File containing the output to check (`-` reads stdin).
    #[arg(default_value = "-")]
    pub input: String,

    /// Maximum characters of output quoted in a mismatch report.
    #[arg(long)]
    pub excerpt_len: Option<usize>,
}

// ---- config ----

#[derive(Args, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub action: ConfigAction,
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Validate the configuration file.
    Validate,

    /// Show the effective configuration (file + env overrides + defaults).
    Show {
        /// Only show one section (general, harness, image).
        #[arg(long)]
        section: Option<String>,
    },
}
