use clap::Parser;

use uexpmesh::cli::commands::Commands;

#[derive(Parser)]
#[command(name = "uexpmesh-cli")]
#[command(about = "UE4 mesh asset toolkit", long_about = None)]
#[command(version = uexpmesh::VERSION)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

fn main() -> anyhow::Result<()> {
    // Setup logging
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    cli.command.execute()?;

    Ok(())
}
