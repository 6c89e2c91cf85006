use clap::{Args as ClapArgs, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// monitor-clippy CLI options.
#[derive(Debug, Parser)]
#[command(
    name = "monitor-clippy",
    version,
    about = "Detect deadlocks, UI-thread starvation and Strict Mode violations",
    args_conflicts_with_subcommands = true,
    subcommand_precedence_over_arg = true
)]
pub struct Args {
    #[command(subcommand)]
    pub command: Option<Command>,

    #[command(flatten)]
    pub analyze: AnalyzeArgs,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Analyze a program dump.
    Analyze(AnalyzeArgs),

    /// List available checks.
    ListChecks,

    /// Explain a check.
    Explain {
        /// Check name.
        check: String,
    },
}

#[derive(Debug, Clone, ClapArgs)]
pub struct AnalyzeArgs {
    /// JSON program dump produced by a frontend. Reads stdin when absent.
    #[arg(value_name = "PROGRAM")]
    pub program: Option<PathBuf>,

    /// Path to a monitor-clippy.toml config file. If omitted, monitor-clippy
    /// searches parent directories of the program file.
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Output format.
    #[arg(long, value_enum, default_value_t = OutputFormat::Pretty)]
    pub format: OutputFormat,

    /// Exit with code 1 if any issues are emitted.
    #[arg(long)]
    pub deny_warnings: bool,

    /// Report every finding; do not collapse reports sharing a source line.
    #[arg(long)]
    pub no_dedup: bool,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum OutputFormat {
    Pretty,
    Json,
}
