//! reexec controller CLI - demonstrations of work running in re-executed processes

mod cli;
mod commands;
mod logging;
mod work;

use clap::Parser;
use cli::{Cli, Commands};
use commands::{list_catalog, run_demo, run_fail, run_fanout, run_socket};
use console::style;
use reexec_rs::{ProcessRegistry, bootstrap};

fn main() {
    // Workers are copies of this binary and must stop here.
    let catalog = work::catalog();
    bootstrap(&catalog);

    let cli = Cli::parse();

    logging::init_logger(cli.verbose);

    let registry = ProcessRegistry::new();
    let result = match cli.command {
        Commands::Demo => run_demo(&registry),
        Commands::Fanout { count } => run_fanout(&registry, count),
        Commands::Fail { message } => run_fail(&registry, message),
        Commands::Socket { port } => run_socket(&registry, port),
        Commands::Catalog => {
            list_catalog(&catalog);
            Ok(())
        }
    };

    if let Err(e) = result {
        eprintln!("{} {}", style("error:").red().bold(), e);
        drop(registry);
        std::process::exit(1);
    }
}
