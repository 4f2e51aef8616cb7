mod cli;
mod scripts;

use clap::Parser;
use std::error::Error;

fn main() -> Result<(), Box<dyn Error>> {
    let app = cli::App::parse();

    match app.command {
        Some(cli::Commands::Build(args)) => scripts::build(&args),
        Some(cli::Commands::Install(args)) => scripts::install(&args),
        Some(cli::Commands::Test(args)) => scripts::test(&args),
        Some(cli::Commands::Lint) => scripts::lint(),
        None => {
            bunt::println!("{$yellow}No command given. Run with --help to list the tasks.{/$}");
            Ok(())
        }
    }
}
