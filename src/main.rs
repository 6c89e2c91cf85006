use clap::Parser;
use monitor_clippy::AnalysisEngine;
use monitor_clippy::cli::{AnalyzeArgs, Args, Command, OutputFormat};
use monitor_clippy::config::{self, CheckSettings};
use monitor_clippy::ir::Program;
use monitor_clippy::issue::{CHECKS, find_descriptor};
use monitor_clippy::level::CheckLevel;
use monitor_clippy::telemetry;
use std::io::Read;
use std::path::Path;
use std::process::ExitCode;

fn main() -> ExitCode {
    telemetry::init_tracing();
    match run() {
        Ok(code) => code,
        Err(err) => {
            eprintln!("{err:#}");
            ExitCode::from(2)
        }
    }
}

fn run() -> anyhow::Result<ExitCode> {
    let args = Args::parse();

    match args.command {
        Some(Command::ListChecks) => {
            list_checks();
            Ok(ExitCode::SUCCESS)
        }
        Some(Command::Explain { check }) => {
            explain_check(&check)?;
            Ok(ExitCode::SUCCESS)
        }
        Some(Command::Analyze(analyze)) => analyze_command(analyze),
        None => analyze_command(args.analyze),
    }
}

fn list_checks() {
    for d in CHECKS {
        println!("{}\t{}\t{}", d.name, d.default_level.as_str(), d.description);
    }
}

fn explain_check(check: &str) -> anyhow::Result<()> {
    let Some(d) = find_descriptor(check) else {
        anyhow::bail!("unknown check: {check}");
    };
    println!("name: {}", d.name);
    println!("default level: {}", d.default_level.as_str());
    println!("description: {}", d.description);
    Ok(())
}

fn analyze_command(args: AnalyzeArgs) -> anyhow::Result<ExitCode> {
    let raw = match &args.program {
        Some(path) => std::fs::read_to_string(path)?,
        None => {
            let mut buf = String::new();
            std::io::stdin().read_to_string(&mut buf)?;
            buf
        }
    };
    let program: Program = serde_json::from_str(&raw)?;

    let start_dir = args
        .program
        .as_deref()
        .and_then(Path::parent)
        .unwrap_or_else(|| Path::new("."));
    let loaded_cfg = config::load_config(args.config.as_deref(), start_dir)?;
    let mut settings = match loaded_cfg.as_ref() {
        Some((_path, cfg)) => CheckSettings::from_config(cfg),
        None => CheckSettings::default(),
    };
    if args.no_dedup {
        settings = settings.without_dedup();
    }

    let engine = AnalysisEngine::new(program).with_settings(settings);
    let report = engine.analyze()?;

    for (procname, failure) in &report.failures {
        eprintln!("analysis of `{procname}` aborted: {failure}");
    }

    let mut has_error = false;
    match args.format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&report.issues)?);
            has_error = report
                .issues
                .iter()
                .any(|issue| issue.level == CheckLevel::Error);
        }
        OutputFormat::Pretty => {
            for issue in &report.issues {
                println!(
                    "{}[{}]: {}",
                    issue.level.as_str(),
                    issue.kind,
                    issue.message
                );
                println!("  --> {}", issue.loc);
                for line in &issue.trace {
                    println!("  {line}");
                }
                if issue.level == CheckLevel::Error {
                    has_error = true;
                }
            }
            if report.issues.is_empty() {
                println!("no issues found");
            } else {
                println!("{} issue(s)", report.issues.len());
            }
        }
    }

    if has_error || (args.deny_warnings && !report.issues.is_empty()) {
        return Ok(ExitCode::from(1));
    }
    Ok(ExitCode::SUCCESS)
}
