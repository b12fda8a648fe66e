//! labfleet — provision and tear down lab VM fleets on Proxmox VE

use std::process::ExitCode;

use clap::Parser;

use labfleet_cli::cli::Cli;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    match cli.run().await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        }
    }
}
