//! Reverse frontend stage binary: `.east` in, regenerated `.rot` source out.

use clap::Parser;
use rotlang_cli::args::StageArgs;
use rotlang_cli::driver;
use tracing::info;

fn main() {
    driver::init_tracing();
    let args = StageArgs::parse();

    let east = match driver::read_input(&args.infile) {
        Ok(text) => text,
        Err(error) => driver::fail("", &error),
    };

    let tree = match rotlang::read_east(&east) {
        Ok(tree) => tree,
        Err(error) => driver::fail(&east, &anyhow::Error::new(error)),
    };

    let source = match rotlang::unparse(&tree) {
        Ok(source) => source,
        Err(error) => driver::fail(&east, &anyhow::Error::new(error)),
    };
    info!("source regenerated");

    let out_path = args.outfile_or_ext("rot");
    if let Err(error) = driver::write_output(&out_path, &source) {
        driver::fail(&east, &error);
    }

    println!("Wrote source: {}", out_path.display());
}
