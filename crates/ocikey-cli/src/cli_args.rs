use std::path::PathBuf;

use clap::{ArgAction, Parser};

use crate::CliRunMode;

fn parse_positive_u64(value: &str) -> Result<u64, String> {
    let parsed = value
        .parse::<u64>()
        .map_err(|error| format!("failed to parse integer: {error}"))?;
    if parsed == 0 {
        return Err("value must be greater than 0".to_string());
    }
    Ok(parsed)
}

#[derive(Debug, Parser)]
#[command(
    name = "ocikey",
    about = "Provision an OCI API signing key through the web console and write an SDK credential file",
    version
)]
pub struct Cli {
    #[arg(
        long,
        env = "OCIKEY_CONFIG",
        help = "Destination of the credential file. Required in packaged mode; defaults to ./config in development mode."
    )]
    pub config: Option<PathBuf>,

    #[arg(
        long = "run-mode",
        env = "OCIKEY_RUN_MODE",
        value_enum,
        help = "Validation and window policy. Defaults to packaged in release builds and development in debug builds."
    )]
    pub run_mode: Option<CliRunMode>,

    #[arg(
        long = "key-dir",
        env = "OCIKEY_KEY_DIR",
        help = "Directory receiving private.pem and public.pem. Defaults to the working directory."
    )]
    pub key_dir: Option<PathBuf>,

    #[arg(
        long = "show-window",
        env = "OCIKEY_SHOW_WINDOW",
        default_value_t = false,
        action = ArgAction::Set,
        num_args = 0..=1,
        require_equals = true,
        default_missing_value = "true",
        help = "Keep the browser window visible after sign-in in packaged mode."
    )]
    pub show_window: bool,

    #[arg(
        long = "node-bin",
        env = "OCIKEY_NODE_BIN",
        default_value = "node",
        help = "Node.js executable that hosts the Playwright driver."
    )]
    pub node_bin: String,

    #[arg(
        long = "playwright-module",
        env = "OCIKEY_PLAYWRIGHT_MODULE",
        default_value = "playwright",
        help = "Module name or path the driver requires for Playwright."
    )]
    pub playwright_module: String,

    #[arg(
        long = "max-runtime-secs",
        env = "OCIKEY_MAX_RUNTIME_SECS",
        default_value_t = 600,
        value_parser = parse_positive_u64,
        help = "Watchdog limit for the whole run, in seconds."
    )]
    pub max_runtime_secs: u64,

    #[arg(
        long = "recover-public-key",
        default_value_t = false,
        help = "Rebuild public.pem from private.pem in the key directory and exit."
    )]
    pub recover_public_key: bool,
}
