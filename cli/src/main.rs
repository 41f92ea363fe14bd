mod commands;
mod error;
mod logger;
mod runner;
mod writer;
use crate::commands::Commands;
use crate::logger::Logger;
use crate::runner::{Runnable, Runner};
use crate::writer::Writer;
use clap::{ArgAction, Parser};

#[derive(Parser)]
#[command(
    name = "stackgraph",
    version,
    about = "Build and synthesize the resource graph of a load-balanced Fargate service",
    long_about = "Builds the declarative resource graph (network, cluster, service) for a deployment target and synthesizes it into a template for the provisioning engine."
)]
struct Cli {
    /// Output structured JSON instead of plain text
    #[arg(long, global = true, action = ArgAction::SetTrue)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Derive a runner from the command and run it
fn run(command: impl Runnable, writer: &Writer) -> Result<(), error::Error> {
    command.runner(writer).run()
}

fn main() {
    Logger::init();
    let cli = Cli::parse();
    let writer = Writer::new(cli.json);

    // Match all commands here, in one place
    let result = match cli.command {
        Commands::Show(cmd) => run(cmd, &writer),
        Commands::Synth(cmd) => run(cmd, &writer),
    };

    if let Err(error) = result {
        let _ = writer.error(&format!("\n{}\n{error}\n", console::style("Error").red().bold()));
        std::process::exit(1);
    }
}
