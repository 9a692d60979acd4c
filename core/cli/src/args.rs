//! Command line interface shared by the stage binaries.

use std::path::PathBuf;

use clap::Parser;

/// Arguments common to every pipeline stage: one input artifact in, one
/// output artifact out.
#[derive(Parser)]
#[command(author, version)]
pub struct StageArgs {
    /// Path to the input artifact.
    #[clap(long = "infile")]
    pub infile: PathBuf,

    /// Path to the output artifact. When omitted, stages that can derive
    /// a safe default do so by swapping the input extension; the
    /// middleend requires it explicitly.
    #[clap(long = "outfile")]
    pub outfile: Option<PathBuf>,
}

impl StageArgs {
    /// The output path, defaulting to the input with `ext` substituted.
    #[must_use]
    pub fn outfile_or_ext(&self, ext: &str) -> PathBuf {
        self.outfile
            .clone()
            .unwrap_or_else(|| self.infile.with_extension(ext))
    }
}
