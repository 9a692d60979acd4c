//! Middleend stage binary: `.east` in, optimized `.east` out.
//!
//! Unlike the other stages, the output path must be explicit: input and
//! output share the `.east` extension, so a defaulted name would clobber
//! the input artifact.

use std::process;

use clap::Parser;
use rotlang_cli::args::StageArgs;
use rotlang_cli::driver;
use tracing::info;

fn main() {
    driver::init_tracing();
    let args = StageArgs::parse();

    let Some(out_path) = args.outfile.clone() else {
        eprintln!("Output file not specified. Use --outfile <file.east>");
        process::exit(1);
    };

    let east_in = match driver::read_input(&args.infile) {
        Ok(text) => text,
        Err(error) => driver::fail("", &error),
    };

    let mut tree = match rotlang::read_east(&east_in) {
        Ok(tree) => tree,
        Err(error) => driver::fail(&east_in, &anyhow::Error::new(error)),
    };

    let changed = rotlang::optimize(&mut tree);
    info!(changed, "optimizer pass finished");

    let east_out = rotlang::write_east(&tree);
    if let Err(error) = driver::write_output(&out_path, &east_out) {
        driver::fail(&east_in, &error);
    }

    println!("Wrote optimized AST: {}", out_path.display());
}
