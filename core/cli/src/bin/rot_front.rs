//! Frontend stage binary: `.rot` source in, `.east` AST out.

use clap::Parser;
use rotlang_cli::args::StageArgs;
use rotlang_cli::driver;
use tracing::info;

fn main() {
    driver::init_tracing();
    let args = StageArgs::parse();

    let source = match driver::read_input(&args.infile) {
        Ok(source) => source,
        Err(error) => driver::fail("", &error),
    };

    let tree = match rotlang::parse(&source) {
        Ok(tree) => tree,
        Err(error) => driver::fail(&source, &anyhow::Error::new(error)),
    };
    info!("parsed {}", args.infile.display());

    let out_path = args.outfile_or_ext("east");
    let east = rotlang::write_east(&tree);
    if let Err(error) = driver::write_output(&out_path, &east) {
        driver::fail(&source, &error);
    }

    println!("Wrote AST: {}", out_path.display());
}
