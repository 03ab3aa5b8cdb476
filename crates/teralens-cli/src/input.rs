//! Input handling for file reading and stdin support.

use anyhow::{Context, Result};
use std::io::{self, Read};
use std::path::PathBuf;

/// Read SQL input from files or stdin.
///
/// If no files are provided, reads from stdin. Multiple files are joined
/// with newlines so the extractor sees one multi-statement input.
pub fn read_input(files: &[PathBuf]) -> Result<String> {
    if files.is_empty() {
        read_from_stdin()
    } else {
        read_from_files(files)
    }
}

/// Read SQL from stdin
fn read_from_stdin() -> Result<String> {
    let mut content = String::new();
    io::stdin()
        .read_to_string(&mut content)
        .context("Failed to read from stdin")?;
    Ok(content)
}

/// Read SQL from multiple files
fn read_from_files(files: &[PathBuf]) -> Result<String> {
    let contents: Result<Vec<String>> = files
        .iter()
        .map(|path| {
            std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read file: {}", path.display()))
        })
        .collect();
    Ok(contents?.join("\n"))
}
