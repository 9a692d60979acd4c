//! Stage driver: input loading, error rendering, artifact writing.

use std::fs;
use std::path::Path;
use std::process;

use anyhow::Context;
use rotlang::CompileError;
use tracing_subscriber::EnvFilter;

/// Installs the stderr tracing subscriber. Verbosity follows `RUST_LOG`;
/// the default keeps the binaries quiet apart from errors.
pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();
}

/// Reads the whole input artifact.
///
/// # Errors
///
/// Fails when the file cannot be read; the error names the path.
pub fn read_input(path: &Path) -> anyhow::Result<String> {
    fs::read_to_string(path).with_context(|| format!("Failed to read input file '{}'", path.display()))
}

/// Writes the finished artifact. Nothing is written until a stage has
/// fully succeeded, so downstream stages never see partial output.
///
/// # Errors
///
/// Fails when the file cannot be written; the error names the path.
pub fn write_output(path: &Path, content: &str) -> anyhow::Result<()> {
    fs::write(path, content)
        .with_context(|| format!("Failed to write output file '{}'", path.display()))
}

/// Prints the line containing `offset` with a caret underneath, the way
/// the stage drivers report every positioned error.
fn print_error_context(source: &str, offset: usize) {
    if source.is_empty() {
        return;
    }
    let bytes = source.as_bytes();
    let offset = offset.min(bytes.len());

    let mut line_start = offset;
    while line_start > 0 && bytes[line_start - 1] != b'\n' && bytes[line_start - 1] != b'\r' {
        line_start -= 1;
    }
    let mut line_end = offset;
    while line_end < bytes.len() && bytes[line_end] != b'\n' && bytes[line_end] != b'\r' {
        line_end += 1;
    }

    eprintln!("{}", &source[line_start..line_end]);
    let mut caret_pad = String::new();
    for &b in &bytes[line_start..offset.min(line_end)] {
        caret_pad.push(if b == b'\t' { '\t' } else { ' ' });
    }
    eprintln!("{caret_pad}^");
}

/// Reports a stage failure and terminates with exit code 1. When the
/// error is a positioned [`CompileError`], the offending input line and
/// a caret go with it.
pub fn fail(source: &str, error: &anyhow::Error) -> ! {
    eprintln!("{error}");
    if let Some(compile_error) = error.downcast_ref::<CompileError>() {
        print_error_context(source, compile_error.pos().offset);
    }
    tracing::error!("{error}");
    process::exit(1);
}
