use chirps_power_wth::cli::{run, Cli};
use chirps_power_wth::error::Result;
use clap::Parser;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    run(cli).await
}
