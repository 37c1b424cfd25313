use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use futures_util::FutureExt;
use ocikey_browser_automation::{
    poll_until, BrowserSession, ElementFinder, FrameTarget, PageExecutor, PageQueryError,
    PollPolicy, SessionEvent,
};
use ocikey_core::forward_slash_path;
use ocikey_credential::{
    fingerprints_match, write_credential_file, CredentialError, CredentialRecord, KeyFiles,
};
use tracing::{debug, error, info, warn};

use crate::config::{ProvisioningConfig, SPINNER_SELECTORS};
use crate::console_finders::{
    element_value, ADD_API_KEY_BUTTON, CONFIRM_ADD_BUTTON, FINGERPRINT_FIELD, PASTE_KEY_RADIO,
    PUBLIC_KEY_TEXTAREA, TENANCY_OCID, USER_OCID,
};
use crate::context::{ContextError, ContextField, ProvisioningContext};
use crate::error::{ProvisioningError, ProvisioningOutcome};
use crate::key_source::KeyPairGenerator;
use crate::login::region_from_login_url;
use crate::phase::{Phase, PhaseTracker};
use crate::watchdog::run_with_watchdog;

/// Longest wait for an orderly browser close before the process is killed.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

#[derive(Debug, Clone)]
enum Interaction {
    Inspect,
    Click,
    SelectRadio,
    Fill(String),
}

#[derive(Debug, Clone)]
struct Located {
    value: String,
    strategy: &'static str,
}

enum LoginWake {
    Event(Option<SessionEvent>),
    Tick,
}

enum LoginResult {
    SignedIn,
    WindowClosed,
}

/// Drives one provisioning run over a browser session.
pub struct ProvisioningMachine<E, G>
where
    E: PageExecutor + 'static,
    G: KeyPairGenerator,
{
    config: ProvisioningConfig,
    session: BrowserSession<E>,
    generator: Arc<G>,
    context: ProvisioningContext,
    tracker: PhaseTracker,
}

impl<E, G> ProvisioningMachine<E, G>
where
    E: PageExecutor + 'static,
    G: KeyPairGenerator + 'static,
{
    pub fn new(config: ProvisioningConfig, executor: E, generator: G) -> Self {
        Self {
            config,
            session: BrowserSession::new(executor),
            generator: Arc::new(generator),
            context: ProvisioningContext::new(),
            tracker: PhaseTracker::new(),
        }
    }

    pub fn context(&self) -> &ProvisioningContext {
        &self.context
    }

    pub fn phase(&self) -> Phase {
        self.tracker.current()
    }

    pub fn tracker(&self) -> &PhaseTracker {
        &self.tracker
    }

    pub fn session(&self) -> &BrowserSession<E> {
        &self.session
    }

    /// Runs the whole flow under the watchdog and always tears the session
    /// down afterwards. A run stopped by the watchdog kills the browser
    /// outright instead of waiting on it.
    pub async fn run(&mut self) -> Result<ProvisioningOutcome, ProvisioningError> {
        let max_runtime = self.config.max_runtime;
        let result = run_with_watchdog(max_runtime, self.drive()).await;

        match &result {
            Ok(ProvisioningOutcome::Completed { credential_path }) => {
                info!(path = %credential_path.display(), "provisioning completed");
            }
            Ok(ProvisioningOutcome::UserAborted) => {
                info!("window closed before sign-in; nothing was provisioned");
            }
            Err(failure) => {
                error!(phase = %self.tracker.current(), error = %failure, "provisioning aborted");
                self.tracker.abort(&failure.to_string());
            }
        }

        if matches!(result, Err(ProvisioningError::WatchdogExpired(_))) {
            self.session.abandon();
        } else {
            self.close_session().await;
        }
        result
    }

    async fn close_session(&mut self) {
        match tokio::time::timeout(SHUTDOWN_GRACE, self.session.shutdown()).await {
            Ok(Ok(())) => {}
            Ok(Err(shutdown_error)) => {
                warn!(error = %shutdown_error, "browser teardown failed");
            }
            Err(_) => {
                warn!(grace = ?SHUTDOWN_GRACE, "browser teardown timed out");
                self.session.abandon();
            }
        }
    }

    async fn drive(&mut self) -> Result<ProvisioningOutcome, ProvisioningError> {
        let sign_in_url = self.config.endpoints.sign_in_url.clone();
        self.session.start(&sign_in_url).await?;
        info!(phase = %self.tracker.current(), "waiting for interactive sign-in");

        if let LoginResult::WindowClosed = self.await_login().await? {
            self.tracker.abort("window closed before sign-in");
            return Ok(ProvisioningOutcome::UserAborted);
        }
        self.discover_profile().await?;
        self.upload_key().await?;
        self.verify_fingerprint().await?;
        self.discover_tenancy().await?;
        let credential_path = self.persist()?;
        Ok(ProvisioningOutcome::Completed { credential_path })
    }

    async fn await_login(&mut self) -> Result<LoginResult, ProvisioningError> {
        let mut ticker = tokio::time::interval(self.config.timings.login_check_interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            let wake = tokio::select! {
                event = self.session.next_event() => LoginWake::Event(event),
                _ = ticker.tick() => LoginWake::Tick,
            };
            let candidate = match wake {
                LoginWake::Event(Some(SessionEvent::Navigated { url })) => url,
                LoginWake::Event(Some(SessionEvent::Closed)) => {
                    return Ok(LoginResult::WindowClosed);
                }
                LoginWake::Event(Some(SessionEvent::DownloadCancelled { .. })) => continue,
                LoginWake::Event(None) => {
                    return Err(PageQueryError::SessionGone(
                        "browser event stream ended before sign-in".to_string(),
                    )
                    .into());
                }
                LoginWake::Tick => match self.session.current_url().await {
                    Ok(url) => url,
                    Err(query_error) if query_error.is_transient() => {
                        debug!(error = %query_error, "url check skipped");
                        continue;
                    }
                    Err(query_error) => return Err(query_error.into()),
                },
            };

            let Some(region) =
                region_from_login_url(&candidate, &self.config.endpoints.console_host)
            else {
                continue;
            };
            if !self.context.latch_login() {
                continue;
            }
            self.context.set_region(&region)?;
            info!(region = %region, "sign-in detected");
            self.enter_automated_flow().await?;
            self.tracker.advance(Phase::ProfileDiscovery)?;
            return Ok(LoginResult::SignedIn);
        }
    }

    async fn enter_automated_flow(&mut self) -> Result<(), ProvisioningError> {
        if self.config.hide_window_after_login() {
            tolerate(self.session.set_window_visible(false).await, "hide window")?;
        }
        tolerate(
            self.session.set_automated_flow(true).await,
            "arm download interception",
        )?;
        Ok(())
    }

    async fn discover_profile(&mut self) -> Result<(), ProvisioningError> {
        let profile_url = self.config.endpoints.profile_url.clone();
        self.open(&profile_url).await?;

        let located = self
            .locate(
                Phase::ProfileDiscovery,
                USER_OCID,
                self.config.endpoints.embedded_target(),
                self.config.timings.profile,
                false,
                Interaction::Inspect,
            )
            .await?;
        self.context.set_user_ocid(&located.value)?;
        info!(user_ocid = %located.value, "user identifier recorded");

        let api_keys_url = self.config.endpoints.api_keys_url.clone();
        self.open(&api_keys_url).await?;
        self.tracker.advance(Phase::KeyUpload)?;
        Ok(())
    }

    async fn upload_key(&mut self) -> Result<(), ProvisioningError> {
        let target = self.config.endpoints.embedded_target();
        let timings = self.config.timings.clone();

        self.locate(
            Phase::KeyUpload,
            ADD_API_KEY_BUTTON,
            target.clone(),
            timings.add_key_button,
            false,
            Interaction::Click,
        )
        .await?;
        settle(timings.after_add_key_click).await;
        self.clear_spinners().await?;

        let generator = Arc::clone(&self.generator);
        let key_pair = tokio::task::spawn_blocking(move || generator.generate())
            .await
            .map_err(|join_error| {
                CredentialError::KeyGeneration(format!("key generation task failed: {join_error}"))
            })??;
        KeyFiles::new(&self.config.key_dir).write(&key_pair)?;
        self.context.set_fingerprint(&key_pair.fingerprint)?;
        info!(fingerprint = %key_pair.fingerprint, "api key pair generated");
        let public_key_pem = key_pair.public_key_pem.clone();

        self.clear_spinners().await?;
        self.locate(
            Phase::KeyUpload,
            PASTE_KEY_RADIO,
            target.clone(),
            timings.paste_radio,
            true,
            Interaction::SelectRadio,
        )
        .await?;
        settle(timings.after_radio).await;
        self.clear_spinners().await?;

        self.locate(
            Phase::KeyUpload,
            PUBLIC_KEY_TEXTAREA,
            target.clone(),
            timings.paste_text,
            true,
            Interaction::Fill(public_key_pem),
        )
        .await?;
        settle(timings.after_paste).await;
        self.clear_spinners().await?;

        self.locate(
            Phase::KeyUpload,
            CONFIRM_ADD_BUTTON,
            target,
            timings.confirm_add,
            true,
            Interaction::Click,
        )
        .await?;
        info!("public key submitted");
        self.tracker.advance(Phase::FingerprintVerification)?;
        Ok(())
    }

    async fn verify_fingerprint(&mut self) -> Result<(), ProvisioningError> {
        let expected = self
            .context
            .fingerprint()
            .ok_or(ContextError::Missing(ContextField::Fingerprint))?
            .to_string();

        let displayed = self
            .locate(
                Phase::FingerprintVerification,
                FINGERPRINT_FIELD,
                self.config.endpoints.embedded_target(),
                self.config.timings.fingerprint,
                false,
                Interaction::Inspect,
            )
            .await?
            .value;

        if !fingerprints_match(&expected, &displayed) {
            error!(expected = %expected, displayed = %displayed, "fingerprint mismatch");
            return Err(ProvisioningError::FingerprintMismatch {
                expected,
                displayed,
            });
        }
        info!(fingerprint = %expected, "console fingerprint matches");
        self.tracker.advance(Phase::TenancyDiscovery)?;
        Ok(())
    }

    async fn discover_tenancy(&mut self) -> Result<(), ProvisioningError> {
        let tenancy_url = self.config.endpoints.tenancy_url.clone();
        self.open(&tenancy_url).await?;

        let located = self
            .locate(
                Phase::TenancyDiscovery,
                TENANCY_OCID,
                FrameTarget::AllFrames,
                self.config.timings.tenancy,
                true,
                Interaction::Inspect,
            )
            .await?;
        self.context.set_tenancy_ocid(&located.value)?;
        info!(tenancy_ocid = %located.value, "tenancy identifier recorded");
        self.tracker.advance(Phase::Persisting)?;
        Ok(())
    }

    fn persist(&mut self) -> Result<PathBuf, ProvisioningError> {
        let complete = self.context.require_complete()?;
        let key_file = KeyFiles::new(&self.config.key_dir).private_key_path();
        let record = CredentialRecord {
            user: complete.user_ocid.to_string(),
            fingerprint: complete.fingerprint.to_string(),
            key_file: forward_slash_path(&key_file),
            tenancy: complete.tenancy_ocid.to_string(),
            region: complete.region.to_string(),
        };
        let path = self.config.credential_path.clone();
        write_credential_file(&path, &record)
            .map_err(|persist_error| ProvisioningError::Persist(format!("{persist_error:#}")))?;
        info!(path = %path.display(), "credential file written");
        self.tracker.advance(Phase::Done)?;
        Ok(path)
    }

    async fn open(&mut self, url: &str) -> Result<(), ProvisioningError> {
        tolerate(self.session.navigate(url).await, "navigate")
    }

    async fn clear_spinners(&mut self) -> Result<(), ProvisioningError> {
        match self.session.remove_spinners(SPINNER_SELECTORS).await {
            Ok(removed) => {
                if removed > 0 {
                    debug!(removed, "removed loading overlays");
                }
                Ok(())
            }
            Err(query_error) => tolerate(Err(query_error), "remove spinners"),
        }
    }

    /// Polls `finder` until it matches, applying `interaction` to the match
    /// within the same attempt.
    async fn locate(
        &mut self,
        phase: Phase,
        finder: ElementFinder,
        target: FrameTarget,
        policy: PollPolicy,
        clear_spinners: bool,
        interaction: Interaction,
    ) -> Result<Located, ProvisioningError> {
        let located = poll_until(
            finder.name,
            &policy,
            &mut self.session,
            move |session, attempt| {
                locate_attempt(
                    session,
                    finder,
                    target.clone(),
                    clear_spinners,
                    interaction.clone(),
                    attempt,
                )
                .boxed()
            },
        )
        .await
        .map_err(|poll_error| ProvisioningError::from_poll(phase, poll_error))?;

        info!(
            phase = %phase,
            finder = finder.name,
            strategy = located.strategy,
            "console element located"
        );
        Ok(located)
    }
}

async fn locate_attempt<E: PageExecutor>(
    session: &mut BrowserSession<E>,
    finder: ElementFinder,
    target: FrameTarget,
    clear_spinners: bool,
    interaction: Interaction,
    attempt: usize,
) -> Result<Option<Located>, PageQueryError> {
    for event in session.drain_events() {
        if event == SessionEvent::Closed {
            info!(attempt, "window closed during automated flow; continuing");
        }
    }
    if clear_spinners {
        session.remove_spinners(SPINNER_SELECTORS).await?;
    }
    let snapshots = session.snapshot(&target, finder.snapshot_selector).await?;
    let Some(found) = finder.find_in(&snapshots) else {
        return Ok(None);
    };
    let handle = found.element.handle.clone();
    let located = Located {
        value: element_value(found.element),
        strategy: found.strategy,
    };
    if matches!(interaction, Interaction::Inspect) && located.value.is_empty() {
        debug!(finder = finder.name, attempt, "element rendered without a value yet");
        return Ok(None);
    }
    match interaction {
        Interaction::Inspect => {}
        Interaction::Click => session.click(&target, &handle).await?,
        Interaction::SelectRadio => session.select_radio(&target, &handle).await?,
        Interaction::Fill(text) => session.fill_text(&target, &handle, &text).await?,
    }
    Ok(Some(located))
}

async fn settle(duration: Duration) {
    if !duration.is_zero() {
        tokio::time::sleep(duration).await;
    }
}

/// Transient failures outside a poll are logged and skipped; the next poll
/// covers them.
fn tolerate(result: Result<(), PageQueryError>, step: &str) -> Result<(), ProvisioningError> {
    match result {
        Ok(()) => Ok(()),
        Err(query_error) if query_error.is_transient() => {
            warn!(step, error = %query_error, "browser step failed; continuing");
            Ok(())
        }
        Err(query_error) => Err(query_error.into()),
    }
}
