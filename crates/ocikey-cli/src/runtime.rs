use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use ocikey_browser_automation::{DriverLaunchConfig, PlaywrightDriver};
use ocikey_core::absolute_path;
use ocikey_credential::KeyFiles;
use ocikey_provisioning::{ProvisioningConfig, ProvisioningMachine, RsaKeyPairGenerator, RunMode};
use tracing::{error, info, warn};

use crate::{resolve_credential_path, Cli};

pub const EXIT_SUCCESS: i32 = 0;
pub const EXIT_FAILURE: i32 = 1;

/// Executes the parsed command line and returns the process exit code.
pub async fn run_cli(cli: Cli) -> Result<i32> {
    let cwd = std::env::current_dir().context("failed to resolve the working directory")?;
    let key_dir = resolve_key_dir(cli.key_dir.as_deref(), &cwd);

    if cli.recover_public_key {
        return recover_public_key(&key_dir);
    }

    let run_mode = cli
        .run_mode
        .map(RunMode::from)
        .unwrap_or_else(RunMode::build_default);
    let credential_path = match resolve_credential_path(cli.config.as_deref(), run_mode, &cwd) {
        Ok(path) => path,
        Err(config_error) => {
            error!(error = %config_error, run_mode = %run_mode, "invalid credential destination");
            return Ok(EXIT_FAILURE);
        }
    };

    let mut config = ProvisioningConfig::new(credential_path, key_dir);
    config.run_mode = run_mode;
    config.show_window = cli.show_window;
    config.max_runtime = Duration::from_secs(cli.max_runtime_secs);

    let driver = PlaywrightDriver::new(DriverLaunchConfig {
        node_bin: cli.node_bin,
        playwright_module: cli.playwright_module,
        ..DriverLaunchConfig::default()
    })?;

    info!(
        run_mode = %run_mode,
        destination = %config.credential_path.display(),
        key_dir = %config.key_dir.display(),
        "starting provisioning"
    );
    let mut machine = ProvisioningMachine::new(config, driver, RsaKeyPairGenerator);
    let code = tokio::select! {
        result = machine.run() => match result {
            Ok(outcome) => outcome.exit_code(),
            Err(failure) => failure.exit_code(),
        },
        _ = tokio::signal::ctrl_c() => {
            warn!("interrupted; closing the browser");
            EXIT_FAILURE
        }
    };
    Ok(code)
}

fn resolve_key_dir(requested: Option<&Path>, cwd: &Path) -> PathBuf {
    match requested {
        Some(dir) if dir.is_absolute() => dir.to_path_buf(),
        Some(dir) => cwd.join(dir),
        None => absolute_path(cwd),
    }
}

fn recover_public_key(key_dir: &Path) -> Result<i32> {
    let key_files = KeyFiles::new(key_dir);
    let fingerprint = key_files.recover_public_key().with_context(|| {
        format!(
            "failed to recover the public key from {}",
            key_files.private_key_path().display()
        )
    })?;
    info!(
        path = %key_files.public_key_path().display(),
        fingerprint = %fingerprint,
        "public key recovered"
    );
    Ok(EXIT_SUCCESS)
}
