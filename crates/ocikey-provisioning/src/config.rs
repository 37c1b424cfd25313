use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use ocikey_browser_automation::{FrameTarget, PollPolicy};

/// Packaged runs validate the destination strictly and hide the window after
/// login; development runs are lenient and keep it visible.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
    Packaged,
    Development,
}

impl RunMode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Packaged => "packaged",
            Self::Development => "development",
        }
    }

    pub fn build_default() -> Self {
        if cfg!(debug_assertions) {
            Self::Development
        } else {
            Self::Packaged
        }
    }
}

impl fmt::Display for RunMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsoleEndpoints {
    pub sign_in_url: String,
    /// Host that signals a completed sign-in once a `region` parameter is set.
    pub console_host: String,
    pub profile_url: String,
    pub api_keys_url: String,
    pub tenancy_url: String,
    /// URL fragment identifying the identity micro-frontend frame.
    pub embedded_frame_marker: String,
}

impl Default for ConsoleEndpoints {
    fn default() -> Self {
        Self {
            sign_in_url: "https://www.oracle.com/cloud/sign-in.html".to_string(),
            console_host: "cloud.oracle.com".to_string(),
            profile_url: "https://cloud.oracle.com/identity/domains/my-profile".to_string(),
            api_keys_url: "https://cloud.oracle.com/identity/domains/my-profile/auth-tokens"
                .to_string(),
            tenancy_url: "https://cloud.oracle.com/tenancy".to_string(),
            embedded_frame_marker: "maui-preact".to_string(),
        }
    }
}

impl ConsoleEndpoints {
    pub fn embedded_target(&self) -> FrameTarget {
        FrameTarget::prefer_embedded(self.embedded_frame_marker.clone())
    }
}

/// Poll policies and settle delays for each phase.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhaseTimings {
    pub login_check_interval: Duration,
    pub profile: PollPolicy,
    pub add_key_button: PollPolicy,
    pub after_add_key_click: Duration,
    pub paste_radio: PollPolicy,
    pub after_radio: Duration,
    pub paste_text: PollPolicy,
    pub after_paste: Duration,
    pub confirm_add: PollPolicy,
    pub fingerprint: PollPolicy,
    pub tenancy: PollPolicy,
}

impl Default for PhaseTimings {
    fn default() -> Self {
        Self {
            login_check_interval: Duration::from_millis(250),
            profile: PollPolicy::bounded(60, Duration::from_secs(1))
                .with_initial_delay(Duration::from_secs(5)),
            add_key_button: PollPolicy::bounded(60, Duration::from_secs(1))
                .with_initial_delay(Duration::from_secs(10)),
            after_add_key_click: Duration::from_secs(3),
            paste_radio: PollPolicy::bounded(5, Duration::from_secs(2)),
            after_radio: Duration::from_secs(1),
            paste_text: PollPolicy::bounded(5, Duration::from_millis(1_500)),
            after_paste: Duration::from_millis(1_500),
            confirm_add: PollPolicy::bounded(3, Duration::from_secs(1)),
            fingerprint: PollPolicy::unbounded(Duration::from_millis(1_500)),
            tenancy: PollPolicy::unbounded(Duration::from_secs(1))
                .with_initial_delay(Duration::from_secs(8)),
        }
    }
}

pub const DEFAULT_MAX_RUNTIME: Duration = Duration::from_secs(600);

/// Overlays removed before interacting with console widgets.
pub const SPINNER_SELECTORS: &[&str] = &[
    ".modal-loader",
    ".ProgressCircleBaseTheme_baseTheme__1qsbny60",
    ".loading-indicator",
    ".spinner",
    "[role=\"progressbar\"]",
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProvisioningConfig {
    pub credential_path: PathBuf,
    pub key_dir: PathBuf,
    pub run_mode: RunMode,
    pub show_window: bool,
    pub endpoints: ConsoleEndpoints,
    pub timings: PhaseTimings,
    pub max_runtime: Duration,
}

impl ProvisioningConfig {
    pub fn new(credential_path: impl Into<PathBuf>, key_dir: impl Into<PathBuf>) -> Self {
        Self {
            credential_path: credential_path.into(),
            key_dir: key_dir.into(),
            run_mode: RunMode::build_default(),
            show_window: false,
            endpoints: ConsoleEndpoints::default(),
            timings: PhaseTimings::default(),
            max_runtime: DEFAULT_MAX_RUNTIME,
        }
    }

    /// Whether the window is minimized once sign-in completes.
    pub fn hide_window_after_login(&self) -> bool {
        self.run_mode == RunMode::Packaged && !self.show_window
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use ocikey_browser_automation::AttemptBound;

    use super::{PhaseTimings, ProvisioningConfig, RunMode};

    #[test]
    fn unit_run_mode_displays_lowercase_name() {
        assert_eq!(RunMode::Packaged.to_string(), "packaged");
        assert_eq!(RunMode::Development.to_string(), "development");
    }

    #[test]
    fn unit_window_hidden_only_for_packaged_runs_without_show_window() {
        let mut config = ProvisioningConfig::new("config", ".");
        config.run_mode = RunMode::Packaged;
        assert!(config.hide_window_after_login());
        config.show_window = true;
        assert!(!config.hide_window_after_login());
        config.run_mode = RunMode::Development;
        config.show_window = false;
        assert!(!config.hide_window_after_login());
    }

    #[test]
    fn regression_default_timings_keep_attempt_bounds() {
        let timings = PhaseTimings::default();
        assert_eq!(timings.paste_radio.bound, AttemptBound::Bounded(5));
        assert_eq!(timings.paste_text.bound, AttemptBound::Bounded(5));
        assert_eq!(timings.confirm_add.bound, AttemptBound::Bounded(3));
        assert_eq!(timings.fingerprint.bound, AttemptBound::Unbounded);
        assert_eq!(timings.tenancy.initial_delay, Duration::from_secs(8));
        assert_eq!(timings.login_check_interval, Duration::from_millis(250));
    }
}
