//! HBA CLI - attribute raster statistics to HydroBASINS units and
//! aggregate them upstream and up the Pfafstetter hierarchy.

use clap::Parser;

#[derive(Parser)]
#[command(
    name = "hba-cli",
    version,
    about = "HydroBASINS attribution toolkit"
)]
struct Cli {
    #[command(subcommand)]
    command: hba_cmd::Command,
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let cli = Cli::parse();
    hba_cmd::run(cli.command)
}
