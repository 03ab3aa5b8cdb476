//! teralens CLI - Teradata SQL dependency extraction

use anyhow::{Context, Result};
use clap::Parser;
use std::fs;
use std::io::{self, Write};
use std::process::ExitCode;
use teralens_core::{extract, ExtractRequest};

use teralens_cli::cli::Args;
use teralens_cli::{input, output};

fn main() -> ExitCode {
    match run() {
        Ok(code) => code,
        Err(err) => {
            eprintln!("teralens: error: {err:#}");
            ExitCode::from(1)
        }
    }
}

fn run() -> Result<ExitCode> {
    let args = Args::parse();
    let sql = input::read_input(&args.files)?;

    let request = ExtractRequest {
        sql,
        dialect: args.dialect.into(),
    };

    match extract(&request) {
        Ok(report) => {
            if !args.quiet {
                output::print_warnings(&report.warnings);
            }
            emit(&output::format_report(&report, args.compact), &args)?;
            Ok(ExitCode::SUCCESS)
        }
        Err(err) if args.soft_errors => {
            // Soft mode: the payload replaces the report and the process
            // still reports success.
            emit(&output::format_envelope(&err.envelope(), args.compact), &args)?;
            Ok(ExitCode::SUCCESS)
        }
        Err(err) => {
            eprintln!("teralens: error: {err}");
            Ok(ExitCode::from(1))
        }
    }
}

fn emit(payload: &str, args: &Args) -> Result<()> {
    match &args.output {
        Some(path) => {
            fs::write(path, format!("{payload}\n"))
                .with_context(|| format!("Failed to write output: {}", path.display()))?;
        }
        None => {
            let stdout = io::stdout();
            let mut handle = stdout.lock();
            writeln!(handle, "{payload}").context("Failed to write to stdout")?;
        }
    }
    Ok(())
}
