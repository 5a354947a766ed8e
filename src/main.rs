use std::process::ExitCode;

use clap::Parser;

use photomark::{cli, logger};

fn main() -> ExitCode {
    let args = cli::CliArgs::parse();
    logger::init();
    logger::set_verbose(args.verbose);
    if args.verbose
        && let Some(path) = logger::log_path()
    {
        eprintln!("Session log: {}", path.display());
    }
    photomark::log_info!("CLI run with {} input pattern(s)", args.input.len());
    cli::run(args)
}
