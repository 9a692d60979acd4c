//! Backend stage binary: `.east` in, `.asm` stack-machine assembly out.

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

    let asm = match rotlang::emit_asm(&tree) {
        Ok(asm) => asm,
        Err(error) => driver::fail(&east, &anyhow::Error::new(error)),
    };
    info!("assembly generated");

    let out_path = args.outfile_or_ext("asm");
    if let Err(error) = driver::write_output(&out_path, &asm) {
        driver::fail(&east, &error);
    }

    println!("Wrote assembly: {}", out_path.display());
}
