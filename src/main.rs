// ═══════════════════════════════════════════════════════════════════════════════
//  ██████╗ ███████╗ ██████╗ ██████╗ ███████╗
//  ██╔══██╗██╔════╝██╔═══██╗██╔══██╗██╔════╝
//  ██║  ██║█████╗  ██║   ██║██████╔╝█████╗
//  ██║  ██║██╔══╝  ██║   ██║██╔══██╗██╔══╝
//  ██████╔╝███████╗╚██████╔╝██████╔╝██║
//  ╚═════╝ ╚══════╝ ╚═════╝ ╚═════╝ ╚═╝
//
//  deobfuscate-js - AST-based JavaScript deobfuscator
//
//  Reverses the common string-array / proxy-object / control-flow
//  flattening obfuscation class back into readable source:
//  - Detects and side-loads the obfuscator's own decoder functions
//  - Collapses proxy-object property dispatch
//  - Folds constant expressions and dead branches
//  - Unflattens switch-based control flow
//  - Renames hex-pattern identifiers by semantic hint
//
// ═══════════════════════════════════════════════════════════════════════════════

use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;
use thiserror::Error;

/// AST-based deobfuscator for string-array / proxy-object /
/// control-flow-flattened JavaScript.
#[derive(Parser, Debug)]
#[command(name = "deobfuscate-js")]
#[command(author = "SENTINEL Team")]
#[command(version = "0.1.0")]
#[command(about = "AST-based deobfuscator for obfuscated JavaScript")]
struct Args {
    /// Path to the obfuscated .js source file
    input: PathBuf,

    /// Enable verbose (debug-level) logging
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Error, Debug)]
enum CliError {
    #[error("unsupported file extension: expected .js, got {0}")]
    UnsupportedExtension(String),

    #[error("failed to read {path}: {source}")]
    Read { path: PathBuf, #[source] source: std::io::Error },

    #[error("failed to write {path}: {source}")]
    Write { path: PathBuf, #[source] source: std::io::Error },

    #[error(transparent)]
    Optimize(#[from] deobfuscate_js::error::OptimizeError),
}

fn cleaned_output_path(input: &Path) -> PathBuf {
    let stem = input.file_stem().and_then(|s| s.to_str()).unwrap_or("output");
    let mut name = stem.to_string();
    name.push_str("-cleaned.js");
    input.with_file_name(name)
}

fn run(args: &Args) -> Result<PathBuf, CliError> {
    let extension = args.input.extension().and_then(|e| e.to_str()).unwrap_or_default();
    if extension != "js" {
        return Err(CliError::UnsupportedExtension(extension.to_string()));
    }

    let source = fs::read_to_string(&args.input)
        .map_err(|source| CliError::Read { path: args.input.clone(), source })?;

    let cleaned = deobfuscate_js::optimize(&source)?;

    let output_path = cleaned_output_path(&args.input);
    fs::write(&output_path, cleaned).map_err(|source| CliError::Write { path: output_path.clone(), source })?;

    Ok(output_path)
}

fn main() -> ExitCode {
    let args = Args::parse();

    if args.verbose {
        tracing_subscriber::fmt().with_env_filter("debug").init();
    } else {
        tracing_subscriber::fmt().with_env_filter("warn").init();
    }

    match run(&args).context("deobfuscate-js failed") {
        Ok(output_path) => {
            println!("wrote {}", output_path.display());
            ExitCode::SUCCESS
        }
        Err(err) => {
            eprintln!("error: {err:?}");
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::cleaned_output_path;

    #[test]
    fn names_output_alongside_input() {
        let input = PathBuf::from("/tmp/sample.js");
        let output = cleaned_output_path(&input);
        assert_eq!(output, PathBuf::from("/tmp/sample-cleaned.js"));
    }

    #[test]
    fn strips_only_the_final_extension() {
        let input = PathBuf::from("bundle.min.js");
        let output = cleaned_output_path(&input);
        assert_eq!(output, PathBuf::from("bundle.min-cleaned.js"));
    }
}
