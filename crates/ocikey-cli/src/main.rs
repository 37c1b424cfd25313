use clap::Parser;
use ocikey_cli::{init_tracing, run_cli, Cli, EXIT_FAILURE};
use tracing::error;

#[tokio::main(flavor = "current_thread")]
async fn main() {
    init_tracing();
    let cli = Cli::parse();
    let code = match run_cli(cli).await {
        Ok(code) => code,
        Err(failure) => {
            error!(error = %format!("{failure:#}"), "ocikey failed");
            EXIT_FAILURE
        }
    };
    std::process::exit(code);
}
