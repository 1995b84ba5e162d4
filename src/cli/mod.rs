use crate::Result;
use clap::Parser;

mod run;

#[derive(Debug, clap::Parser)]
#[clap(name = "spot", version, about)]
struct Cli {
    #[clap(subcommand)]
    command: Command,
}

#[derive(Debug, clap::Subcommand)]
enum Command {
    Run(run::Run),
}

pub async fn run() -> Result<()> {
    let args = Cli::parse();
    match args.command {
        Command::Run(run) => run.run().await,
    }
}
