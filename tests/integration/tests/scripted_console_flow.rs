use std::{
    fs,
    sync::{Arc, Mutex, OnceLock},
};

use async_trait::async_trait;
use ocikey_browser_automation::{PageExecutor, PageQuery, PageQueryError, SessionEvent};
use ocikey_credential::{compute_fingerprint, generate_key_pair, CredentialError, KeyPair};
use ocikey_provisioning::{
    ConsoleEndpoints, KeyPairGenerator, Phase, ProvisioningConfig, ProvisioningError,
    ProvisioningMachine, ProvisioningOutcome, RunMode,
};
use serde_json::{json, Value};
use tempfile::TempDir;
use tokio::sync::mpsc;

const USER_OCID: &str = "ocid1.user.oc1..aaaa";
const TENANCY_OCID: &str = "ocid1.tenancy.oc1..bbbb";
const LOGIN_URL: &str = "https://cloud.oracle.com/some/path?region=us-ashburn-1";

fn shared_key_pair() -> KeyPair {
    static KEY_PAIR: OnceLock<KeyPair> = OnceLock::new();
    KEY_PAIR
        .get_or_init(|| generate_key_pair().expect("key pair"))
        .clone()
}

struct CachedKeyPair;

impl KeyPairGenerator for CachedKeyPair {
    fn generate(&self) -> Result<KeyPair, CredentialError> {
        Ok(shared_key_pair())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FingerprintDisplay {
    Exact,
    Padded,
    OneCharacterOff,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Page {
    SignIn,
    Profile,
    ApiKeys,
    Tenancy,
    Elsewhere,
}

#[derive(Debug)]
struct ConsoleState {
    page: Page,
    navigations: Vec<String>,
    add_dialog_open: bool,
    paste_selected: bool,
    pasted_key: Option<String>,
    key_added: bool,
    spinner_sweeps: usize,
    hidden: bool,
    automated: bool,
    shutdowns: usize,
    fingerprint_display: FingerprintDisplay,
    add_button_rendered: bool,
    radios_rendered: bool,
    textarea_rendered: bool,
    confirm_enabled: bool,
    blank_fingerprint_renders: usize,
    fingerprint_renders: usize,
    close_after_add_click: bool,
    disconnect_on_tenancy: bool,
    relaunch_failures: usize,
}

impl Default for ConsoleState {
    fn default() -> Self {
        Self {
            page: Page::SignIn,
            navigations: Vec::new(),
            add_dialog_open: false,
            paste_selected: false,
            pasted_key: None,
            key_added: false,
            spinner_sweeps: 0,
            hidden: false,
            automated: false,
            shutdowns: 0,
            fingerprint_display: FingerprintDisplay::Exact,
            add_button_rendered: true,
            radios_rendered: true,
            textarea_rendered: true,
            confirm_enabled: true,
            blank_fingerprint_renders: 0,
            fingerprint_renders: 0,
            close_after_add_click: false,
            disconnect_on_tenancy: false,
            relaunch_failures: 0,
        }
    }
}

/// In-memory stand-in for the identity console, rendered as DOM snapshots.
struct ScriptedConsole {
    state: Arc<Mutex<ConsoleState>>,
    endpoints: ConsoleEndpoints,
    login_events: Vec<SessionEvent>,
    sender: Option<mpsc::Sender<SessionEvent>>,
}

impl ScriptedConsole {
    fn new(state: Arc<Mutex<ConsoleState>>, login_events: Vec<SessionEvent>) -> Self {
        Self {
            state,
            endpoints: ConsoleEndpoints::default(),
            login_events,
            sender: None,
        }
    }

    fn render(&self, state: &ConsoleState) -> Value {
        let frame_url = "https://cloud.oracle.com/identity/maui-preact/index.html";
        match state.page {
            Page::Profile => json!([{
                "frame_url": frame_url,
                "elements": [{
                    "handle": "user-ocid",
                    "tag": "bdi",
                    "text": USER_OCID,
                    "ancestor_test_ids": ["jet-meta-label-1-text-container"],
                    "visible": true,
                }],
            }]),
            Page::ApiKeys => json!([{
                "frame_url": frame_url,
                "elements": api_keys_elements(state),
            }]),
            Page::Tenancy => json!([
                {"frame_url": self.endpoints.tenancy_url, "elements": []},
                {
                    "frame_url": frame_url,
                    "elements": [{
                        "handle": "tenancy-ocid",
                        "tag": "textarea",
                        "attributes": {"aria-hidden": "true"},
                        "value": format!("  {TENANCY_OCID}\n"),
                    }],
                },
            ]),
            Page::SignIn | Page::Elsewhere => json!([{"elements": []}]),
        }
    }
}

fn api_keys_elements(state: &ConsoleState) -> Vec<Value> {
    let mut elements = Vec::new();
    if state.add_button_rendered {
        elements.push(json!({
            "handle": "add-api-key",
            "tag": "button",
            "attributes": {"aria-label": "Add API key"},
            "text": "Add API key",
            "visible": true,
        }));
    }
    if state.key_added {
        let fingerprint = displayed_fingerprint(state);
        elements.push(json!({
            "handle": "fingerprint",
            "tag": "div",
            "attributes": {
                "role": "textbox",
                "class": "ReadonlyTextFieldInputStyles_readOnlyTextFieldInputBase__x1",
            },
            "text": fingerprint,
            "visible": true,
        }));
        return elements;
    }
    if !state.add_dialog_open || !state.radios_rendered {
        return elements;
    }
    for (index, (value, label)) in [
        ("generate", "Generate API key pair"),
        ("file", "Choose public key file"),
        ("text", "Paste a public key"),
    ]
    .into_iter()
    .enumerate()
    {
        elements.push(json!({
            "handle": format!("radio-{index}"),
            "tag": "input",
            "attributes": {"type": "radio", "value": value},
            "label_text": label,
            "visible": true,
            "checked": value == "text" && state.paste_selected,
        }));
    }
    if state.paste_selected && state.textarea_rendered {
        elements.push(json!({
            "handle": "public-key",
            "tag": "textarea",
            "attributes": {"aria-label": "Public key"},
            "value": state.pasted_key.clone().unwrap_or_default(),
            "visible": true,
        }));
        elements.push(json!({
            "handle": "confirm-add",
            "tag": "button",
            "attributes": {"type": "button"},
            "text": "Add",
            "visible": true,
            "disabled": state.pasted_key.is_none() || !state.confirm_enabled,
        }));
    }
    elements
}

fn displayed_fingerprint(state: &ConsoleState) -> String {
    if state.fingerprint_renders < state.blank_fingerprint_renders {
        return String::new();
    }
    let pasted = state.pasted_key.as_deref().unwrap_or_default();
    let actual = compute_fingerprint(pasted).expect("console parses the pasted key");
    match state.fingerprint_display {
        FingerprintDisplay::Exact => actual,
        FingerprintDisplay::Padded => format!("\n   {actual}  \t"),
        FingerprintDisplay::OneCharacterOff => {
            let mut altered = actual.into_bytes();
            let last = altered.len() - 1;
            altered[last] = if altered[last] == b'0' { b'1' } else { b'0' };
            String::from_utf8(altered).expect("ascii")
        }
    }
}

#[async_trait]
impl PageExecutor for ScriptedConsole {
    async fn start_session(
        &mut self,
        _start_url: &str,
    ) -> Result<mpsc::Receiver<SessionEvent>, PageQueryError> {
        let (sender, receiver) = mpsc::channel(64);
        for event in self.login_events.drain(..) {
            sender.send(event).await.expect("queue login events");
        }
        self.sender = Some(sender);
        Ok(receiver)
    }

    async fn navigate(&mut self, url: &str) -> Result<(), PageQueryError> {
        let mut state = self.state.lock().expect("lock");
        state.navigations.push(url.to_string());
        state.page = if url == self.endpoints.profile_url {
            Page::Profile
        } else if url == self.endpoints.api_keys_url {
            Page::ApiKeys
        } else if url == self.endpoints.tenancy_url {
            if state.disconnect_on_tenancy {
                state.disconnect_on_tenancy = false;
                state.relaunch_failures = 3;
                if let Some(sender) = &self.sender {
                    let _ = sender.try_send(SessionEvent::Closed);
                }
            }
            Page::Tenancy
        } else {
            Page::Elsewhere
        };
        Ok(())
    }

    async fn evaluate(&mut self, query: &PageQuery) -> Result<Value, PageQueryError> {
        let mut state = self.state.lock().expect("lock");
        if state.relaunch_failures > 0 {
            state.relaunch_failures -= 1;
            return Err(PageQueryError::PageClosed);
        }
        match query {
            PageQuery::CurrentUrl => Ok(json!(state
                .navigations
                .last()
                .cloned()
                .unwrap_or_else(|| self.endpoints.sign_in_url.clone()))),
            PageQuery::Snapshot { .. } => {
                let rendered = self.render(&state);
                if state.page == Page::ApiKeys && state.key_added {
                    state.fingerprint_renders += 1;
                }
                Ok(rendered)
            }
            PageQuery::RemoveSpinners { .. } => {
                state.spinner_sweeps += 1;
                Ok(json!(0))
            }
            PageQuery::Click { handle, .. } => match handle.as_str() {
                "add-api-key" => {
                    state.add_dialog_open = true;
                    if state.close_after_add_click {
                        if let Some(sender) = &self.sender {
                            let _ = sender.try_send(SessionEvent::Closed);
                            let _ = sender.try_send(SessionEvent::DownloadCancelled {
                                suggested_filename: "oci_api_key.pem".to_string(),
                            });
                        }
                    }
                    Ok(json!(true))
                }
                "confirm-add" if state.pasted_key.is_some() => {
                    state.key_added = true;
                    state.add_dialog_open = false;
                    Ok(json!(true))
                }
                _ => Ok(json!(false)),
            },
            PageQuery::SelectRadio { handle, .. } if handle == "radio-2" => {
                state.paste_selected = true;
                Ok(json!(true))
            }
            PageQuery::FillText { handle, text, .. } if handle == "public-key" => {
                state.pasted_key = Some(text.clone());
                Ok(json!(true))
            }
            _ => Ok(json!(false)),
        }
    }

    async fn set_window_visible(&mut self, visible: bool) -> Result<(), PageQueryError> {
        self.state.lock().expect("lock").hidden = !visible;
        Ok(())
    }

    async fn set_automated_flow(&mut self, enabled: bool) -> Result<(), PageQueryError> {
        self.state.lock().expect("lock").automated = enabled;
        Ok(())
    }

    async fn shutdown_session(&mut self) -> Result<(), PageQueryError> {
        self.sender = None;
        self.state.lock().expect("lock").shutdowns += 1;
        Ok(())
    }
}

struct Harness {
    temp: TempDir,
    state: Arc<Mutex<ConsoleState>>,
    machine: ProvisioningMachine<ScriptedConsole, CachedKeyPair>,
}

impl Harness {
    fn new(login_events: Vec<SessionEvent>, tweak: impl FnOnce(&mut ConsoleState)) -> Self {
        let temp = tempfile::tempdir().expect("tempdir");
        let mut config = ProvisioningConfig::new(temp.path().join("config"), temp.path());
        config.run_mode = RunMode::Packaged;
        let mut console_state = ConsoleState::default();
        tweak(&mut console_state);
        let state = Arc::new(Mutex::new(console_state));
        let console = ScriptedConsole::new(state.clone(), login_events);
        Self {
            temp,
            state,
            machine: ProvisioningMachine::new(config, console, CachedKeyPair),
        }
    }

    fn signed_in(tweak: impl FnOnce(&mut ConsoleState)) -> Self {
        Self::new(
            vec![
                SessionEvent::Navigated {
                    url: "https://www.oracle.com/cloud/sign-in.html".to_string(),
                },
                SessionEvent::Navigated {
                    url: LOGIN_URL.to_string(),
                },
            ],
            tweak,
        )
    }

    fn credential_path(&self) -> std::path::PathBuf {
        self.temp.path().join("config")
    }

    fn navigations(&self) -> Vec<String> {
        self.state.lock().expect("lock").navigations.clone()
    }
}

#[tokio::test(start_paused = true)]
async fn integration_full_flow_writes_exact_credential_layout() {
    let mut harness = Harness::signed_in(|_| {});

    let outcome = harness.machine.run().await.expect("provisioning succeeds");
    assert_eq!(outcome.exit_code(), 0);
    assert_eq!(
        outcome,
        ProvisioningOutcome::Completed {
            credential_path: harness.credential_path(),
        }
    );
    assert_eq!(harness.machine.phase(), Phase::Done);

    let key_pair = shared_key_pair();
    let key_file = harness
        .temp
        .path()
        .join("private.pem")
        .to_string_lossy()
        .replace('\\', "/");
    let expected = format!(
        "[DEFAULT]\nuser={USER_OCID}\nfingerprint={}\nkey_file={key_file}\ntenancy={TENANCY_OCID}\nregion=us-ashburn-1\n",
        key_pair.fingerprint
    );
    let written = fs::read_to_string(harness.credential_path()).expect("credential file");
    assert_eq!(written, expected);
    assert_eq!(
        fs::read_to_string(harness.temp.path().join("public.pem")).expect("public key"),
        key_pair.public_key_pem
    );

    let state = harness.state.lock().expect("lock");
    assert_eq!(state.pasted_key.as_deref(), Some(key_pair.public_key_pem.as_str()));
    assert!(state.hidden);
    assert!(state.automated);
    assert!(state.spinner_sweeps > 0);
    assert_eq!(state.shutdowns, 1);
}

#[tokio::test(start_paused = true)]
async fn functional_login_url_region_is_recorded() {
    let mut harness = Harness::signed_in(|_| {});
    harness.machine.run().await.expect("provisioning succeeds");
    assert_eq!(harness.machine.context().region(), Some("us-ashburn-1"));
}

#[tokio::test(start_paused = true)]
async fn functional_profile_identifier_recorded_before_api_key_page() {
    let mut harness = Harness::signed_in(|_| {});
    harness.machine.run().await.expect("provisioning succeeds");

    assert_eq!(harness.machine.context().user_ocid(), Some(USER_OCID));
    let endpoints = ConsoleEndpoints::default();
    let navigations = harness.navigations();
    assert_eq!(
        navigations,
        vec![
            endpoints.profile_url,
            endpoints.api_keys_url,
            endpoints.tenancy_url,
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn functional_padded_console_fingerprint_still_matches() {
    let mut harness = Harness::signed_in(|state| {
        state.fingerprint_display = FingerprintDisplay::Padded;
    });
    let outcome = harness.machine.run().await.expect("padding is ignored");
    assert_eq!(outcome.exit_code(), 0);
    assert_eq!(
        harness.machine.context().fingerprint(),
        Some(shared_key_pair().fingerprint.as_str())
    );
}

#[tokio::test(start_paused = true)]
async fn regression_fingerprint_mismatch_aborts_without_credential_file() {
    let mut harness = Harness::signed_in(|state| {
        state.fingerprint_display = FingerprintDisplay::OneCharacterOff;
    });

    let error = harness.machine.run().await.expect_err("mismatch is fatal");
    assert!(matches!(error, ProvisioningError::FingerprintMismatch { .. }));
    assert_eq!(error.exit_code(), 1);
    assert_eq!(harness.machine.phase(), Phase::Aborted);
    assert!(!harness.credential_path().exists());
    assert_eq!(harness.machine.context().tenancy_ocid(), None);

    let endpoints = ConsoleEndpoints::default();
    assert!(!harness.navigations().contains(&endpoints.tenancy_url));
    assert!(!harness
        .machine
        .tracker()
        .history()
        .contains(&Phase::TenancyDiscovery));
}

#[tokio::test(start_paused = true)]
async fn regression_missing_add_button_exhausts_bounded_retries() {
    let mut harness = Harness::signed_in(|state| {
        state.add_button_rendered = false;
    });

    let error = harness.machine.run().await.expect_err("button never renders");
    assert!(matches!(
        error,
        ProvisioningError::ExhaustedRetries {
            phase: Phase::KeyUpload,
            attempts: 60,
            ..
        }
    ));
    assert_eq!(error.exit_code(), 1);
    assert!(!harness.credential_path().exists());
    assert!(!harness.temp.path().join("private.pem").exists());
}

#[tokio::test(start_paused = true)]
async fn regression_window_close_after_login_does_not_stop_the_run() {
    let mut harness = Harness::signed_in(|state| {
        state.close_after_add_click = true;
    });
    let outcome = harness
        .machine
        .run()
        .await
        .expect("post-login close is ignored");
    assert_eq!(outcome.exit_code(), 0);
    assert!(harness.credential_path().is_file());
}

#[tokio::test(start_paused = true)]
async fn regression_window_close_before_login_is_user_abort() {
    let mut harness = Harness::new(vec![SessionEvent::Closed], |_| {});
    let outcome = harness.machine.run().await.expect("abort is not an error");
    assert_eq!(outcome, ProvisioningOutcome::UserAborted);
    assert_eq!(outcome.exit_code(), 0);
    assert!(harness.navigations().is_empty());
    assert!(!harness.credential_path().exists());
    assert_eq!(harness.state.lock().expect("lock").shutdowns, 1);
}

#[tokio::test(start_paused = true)]
async fn regression_watchdog_aborts_a_run_stuck_at_sign_in() {
    let mut harness = Harness::new(Vec::new(), |_| {});
    let error = harness.machine.run().await.expect_err("watchdog fires");
    assert_eq!(error, ProvisioningError::WatchdogExpired(600));
    assert_eq!(error.exit_code(), 1);
    assert_eq!(harness.machine.phase(), Phase::Aborted);
    assert!(!harness.credential_path().exists());
}

fn assert_key_upload_exhausted(error: &ProvisioningError, finder: &str, expected_attempts: usize) {
    match error {
        ProvisioningError::ExhaustedRetries {
            phase,
            label,
            attempts,
            ..
        } => {
            assert_eq!(*phase, Phase::KeyUpload);
            assert_eq!(label, finder);
            assert_eq!(*attempts, expected_attempts);
        }
        other => panic!("expected exhausted retries, got {other:?}"),
    }
}

#[tokio::test(start_paused = true)]
async fn regression_missing_paste_radio_gives_up_after_five_attempts() {
    let mut harness = Harness::signed_in(|state| {
        state.radios_rendered = false;
    });

    let error = harness.machine.run().await.expect_err("radio never renders");
    assert_key_upload_exhausted(&error, "paste_public_key_radio", 5);
    assert_eq!(error.exit_code(), 1);
    assert!(!harness.credential_path().exists());
    assert!(!harness.state.lock().expect("lock").paste_selected);
}

#[tokio::test(start_paused = true)]
async fn regression_missing_key_textarea_gives_up_after_five_attempts() {
    let mut harness = Harness::signed_in(|state| {
        state.textarea_rendered = false;
    });

    let error = harness.machine.run().await.expect_err("textarea never renders");
    assert_key_upload_exhausted(&error, "public_key_textarea", 5);
    let state = harness.state.lock().expect("lock");
    assert!(state.paste_selected);
    assert_eq!(state.pasted_key, None);
}

#[tokio::test(start_paused = true)]
async fn regression_disabled_confirm_button_gives_up_after_three_attempts() {
    let mut harness = Harness::signed_in(|state| {
        state.confirm_enabled = false;
    });

    let error = harness.machine.run().await.expect_err("confirm never enables");
    assert_key_upload_exhausted(&error, "confirm_add_button", 3);
    let state = harness.state.lock().expect("lock");
    assert!(state.pasted_key.is_some());
    assert!(!state.key_added);
    assert!(!harness.credential_path().exists());
}

#[tokio::test(start_paused = true)]
async fn regression_blank_fingerprint_is_polled_until_it_renders() {
    let mut harness = Harness::signed_in(|state| {
        state.blank_fingerprint_renders = 3;
    });

    let outcome = harness
        .machine
        .run()
        .await
        .expect("blank fingerprint is not a mismatch");
    assert_eq!(outcome.exit_code(), 0);
    assert_eq!(
        harness.machine.context().fingerprint(),
        Some(shared_key_pair().fingerprint.as_str())
    );
    assert!(harness.state.lock().expect("lock").fingerprint_renders > 3);
}

#[tokio::test(start_paused = true)]
async fn integration_browser_disconnect_after_login_recovers_after_relaunch() {
    let mut harness = Harness::signed_in(|state| {
        state.disconnect_on_tenancy = true;
    });

    let outcome = harness
        .machine
        .run()
        .await
        .expect("post-login disconnect is survived");
    assert_eq!(outcome.exit_code(), 0);
    assert_eq!(harness.machine.context().tenancy_ocid(), Some(TENANCY_OCID));
    assert!(harness.credential_path().is_file());

    let state = harness.state.lock().expect("lock");
    assert_eq!(state.relaunch_failures, 0);
    assert!(!state.disconnect_on_tenancy);
    assert_eq!(state.shutdowns, 1);
}
