mod lupin_input;
mod run_build;
mod run_navigate;

use clap::{Parser, Subcommand};
use run_build::*;
use run_navigate::*;

#[derive(Parser, Debug)]
#[command(
    version,
    about = "LUPIN",
    long_about = "Layered, User-driven Partition INspection\n\
		  Coarsen a kNN graph of cells into a hierarchy of levels,\n\
		  then expand, zoom into and filter the displayed cut."
)]
struct Cli {
    #[command(subcommand)]
    commands: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    #[command(
        about = "Build the hierarchy and embed its coarsest level",
        long_about = "Build a multi-resolution hierarchy in four stages:\n\
		      (1) Select highly variable features\n\
		      (2) Construct a kNN graph on principal components\n\
		      (3) Coarsen the graph by heavy-edge matching\n\
		      (4) Summarise weights, features and cross-level adjacency.\n\
		      Writes `{out}.levels.tsv` and `{out}.coords.tsv`."
    )]
    Build(BuildArgs),

    #[command(
        about = "Navigate the hierarchy interactively",
        long_about = "Build the hierarchy, then read commands line by line\n\
		      (`expand`, `zoom`, `filter`, `reset`, ...) from stdin\n\
		      or from a script file. Type `help` for the list."
    )]
    Navigate(NavigateArgs),
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match &cli.commands {
        Commands::Build(args) => {
            run_build(args)?;
        }
        Commands::Navigate(args) => {
            run_navigate(args)?;
        }
    }

    log::info!("Done");
    Ok(())
}
