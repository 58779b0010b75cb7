//! Helm CLI Entry Point

use std::process;

#[tokio::main]
async fn main() {
    if let Err(e) = helm_interface::run_cli().await {
        eprintln!("Error: {e:#}");
        process::exit(1);
    }
}
