use clap::Parser;
use treetrader::cli::{run, Cli};

fn main() -> std::process::ExitCode {
    run(Cli::parse())
}
