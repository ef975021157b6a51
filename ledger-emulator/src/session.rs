// SPDX-License-Identifier: Apache-2.0

//! Emulator session: start, drive, always close

use std::{future::Future, sync::Mutex, time::Duration};

use futures::future::BoxFuture;
use ledger_apdu::APDUCommand;
use ledger_transport_speculos::TransportSpeculosTcp;
use log::{debug, info, warn};
use tokio::time::Instant;

use crate::{
    api::SpeculosApi,
    config::SessionConfig,
    errors::SessionError,
    navigation::ClickSchedule,
    process::EmulatorProcess,
    snapshot::{same_screen, SnapshotStore},
};

/// Interval between two screenshots while waiting for the screen to change
pub const SCREEN_POLL_INTERVAL: Duration = Duration::from_millis(100);
/// How long a press may take to redraw before the screen is taken as is
pub const CLICK_SETTLE_TIMEOUT: Duration = Duration::from_secs(5);

/// Lifecycle of a [`Session`]
///
/// `NotStarted -> Running -> AwaitingScreenChange -> Interacting -> Closed`,
/// going back to `Running` once an interaction is over.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SessionState {
    #[default]
    NotStarted,
    Running,
    AwaitingScreenChange,
    Interacting,
    Closed,
}

/// One emulated device, exclusively owned by a scenario
pub struct Session {
    config: SessionConfig,
    process: EmulatorProcess,
    transport: TransportSpeculosTcp,
    api: SpeculosApi,
    snapshots: Option<SnapshotStore>,
    main_menu: Vec<u8>,
    state: Mutex<SessionState>,
}

/// Start an emulator, run `scenario` against it and close it
///
/// The emulator is closed whether the scenario succeeds, fails or exceeds
/// the test timeout. A scenario error wins over a teardown error.
///
/// ```no_run
/// # use ledger_emulator::{with_session, SessionConfig, SessionError};
/// # use futures::FutureExt;
/// # async fn run() -> Result<(), SessionError> {
/// let config = SessionConfig::from_env()?;
/// with_session(config, |session| {
///     async move {
///         session.send_apdu_hex("e006000000").await?;
///         Ok::<_, SessionError>(())
///     }
///     .boxed()
/// })
/// .await
/// # }
/// ```
pub async fn with_session<T, Err, F>(config: SessionConfig, scenario: F) -> Result<T, Err>
where
    F: for<'a> FnOnce(&'a Session) -> BoxFuture<'a, Result<T, Err>>,
    Err: From<SessionError>,
{
    let test_timeout = config.test_timeout;
    let session = Session::start(config).await?;

    let outcome = tokio::time::timeout(test_timeout, scenario(&session)).await;
    let closed = session.close().await;

    let result = match outcome {
        Ok(result) => result,
        Err(_) => Err(SessionError::TestTimeout(test_timeout).into()),
    };

    match (result, closed) {
        (Err(err), Err(close_err)) => {
            warn!("teardown after a failed scenario also failed: {}", close_err);
            Err(err)
        }
        (Err(err), Ok(())) => Err(err),
        (Ok(_), Err(close_err)) => Err(close_err.into()),
        (Ok(value), Ok(())) => Ok(value),
    }
}

impl Session {
    /// Launch the emulator and wait until the app shows its start text
    pub async fn start(config: SessionConfig) -> Result<Self, SessionError> {
        let mut process = EmulatorProcess::spawn(&config)?;
        let api = SpeculosApi::new(config.api_url());

        match Self::boot(&config, &mut process, &api).await {
            Ok((transport, main_menu)) => {
                info!(
                    "{} ready, apdu on {}",
                    config.model,
                    transport.addr()
                );
                let snapshots = config
                    .snapshots
                    .clone()
                    .map(|snapshots| SnapshotStore::new(snapshots, config.model));

                Ok(Self {
                    config,
                    process,
                    transport,
                    api,
                    snapshots,
                    main_menu,
                    state: Mutex::new(SessionState::Running),
                })
            }
            Err(err) => {
                if let Err(close_err) = process.close().await {
                    warn!("closing emulator after failed start: {}", close_err);
                }
                Err(err)
            }
        }
    }

    async fn boot(
        config: &SessionConfig,
        process: &mut EmulatorProcess,
        api: &SpeculosApi,
    ) -> Result<(TransportSpeculosTcp, Vec<u8>), SessionError> {
        tokio::time::sleep(config.start_delay).await;

        let started = Instant::now();
        loop {
            process.ensure_running()?;

            match api.screen_contains(&config.start_text).await {
                Ok(true) => break,
                Ok(false) => {}
                Err(err) => debug!("emulator api not ready: {}", err),
            }

            if started.elapsed() >= config.start_timeout {
                return Err(SessionError::StartTimeout {
                    text: config.start_text.clone(),
                    timeout: config.start_timeout,
                });
            }
            tokio::time::sleep(SCREEN_POLL_INTERVAL).await;
        }

        let remaining = config.start_timeout.saturating_sub(started.elapsed());
        let transport =
            TransportSpeculosTcp::connect_with_retry(config.apdu_addr(), remaining).await?;
        let main_menu = api.screenshot().await?;

        Ok((transport, main_menu))
    }

    /// Process id of the emulator, `None` once it was reaped
    pub fn pid(&self) -> Option<u32> {
        self.process.id()
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// APDU transport, usable with any app client
    pub fn transport(&self) -> &TransportSpeculosTcp {
        &self.transport
    }

    pub fn api(&self) -> &SpeculosApi {
        &self.api
    }

    pub fn state(&self) -> SessionState {
        *self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn set_state(&self, state: SessionState) {
        let mut current = self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        if *current != state {
            debug!("session {:?} -> {:?}", *current, state);
            *current = state;
        }
    }

    /// Screenshot taken once the app displayed its start text
    pub fn main_menu_snapshot(&self) -> &[u8] {
        &self.main_menu
    }

    pub async fn screenshot(&self) -> Result<Vec<u8>, SessionError> {
        self.api.screenshot().await
    }

    /// Poll until the screen differs from `reference`, returning the new screen
    pub async fn wait_until_screen_is_not(
        &self,
        reference: &[u8],
        timeout: Duration,
    ) -> Result<Vec<u8>, SessionError> {
        self.set_state(SessionState::AwaitingScreenChange);
        let started = Instant::now();

        loop {
            let screen = self.api.screenshot().await?;
            if !same_screen(&screen, reference)? {
                self.set_state(SessionState::Interacting);
                return Ok(screen);
            }

            if started.elapsed() >= timeout {
                self.set_state(SessionState::Running);
                return Err(SessionError::ScreenUnchanged(timeout));
            }
            tokio::time::sleep(SCREEN_POLL_INTERVAL).await;
        }
    }

    /// Wait for the app to leave its main menu, e.g. for a review to start
    pub async fn wait_for_app_screen(&self) -> Result<Vec<u8>, SessionError> {
        self.wait_until_screen_is_not(&self.main_menu, self.config.screen_change_timeout)
            .await
    }

    /// Press the buttons of `schedule`, snapshotting the screen before the
    /// first press and after each one, then compare with the references
    ///
    /// Snapshot `0` is the screen before any press. Without snapshot
    /// settings the buttons are pressed and nothing is recorded.
    pub async fn navigate_and_compare(
        &self,
        scenario: &str,
        schedule: &ClickSchedule,
    ) -> Result<(), SessionError> {
        let store = self.snapshots.as_ref();
        self.set_state(SessionState::Interacting);

        let mut screen = self.api.screenshot().await?;
        if let Some(store) = store {
            store.reset(scenario).await?;
            store.record(scenario, 0, &screen).await?;
        }

        for (i, button) in schedule.presses().enumerate() {
            self.api.press(button).await?;

            screen = match self.wait_until_screen_is_not(&screen, CLICK_SETTLE_TIMEOUT).await {
                Ok(next) => next,
                Err(SessionError::ScreenUnchanged(_)) => {
                    debug!("press {} did not redraw the screen", i + 1);
                    self.set_state(SessionState::Interacting);
                    self.api.screenshot().await?
                }
                Err(err) => return Err(err),
            };
            if let Some(store) = store {
                store.record(scenario, i + 1, &screen).await?;
            }
        }

        self.set_state(SessionState::Running);

        match store {
            Some(store) if !store.is_updating() => {
                store.compare(scenario, schedule.press_count() + 1).await
            }
            _ => Ok(()),
        }
    }

    /// Drive a request that needs on-screen approval
    ///
    /// `pending` is polled first, so the command is on the wire before any
    /// click. Navigation starts once the screen left `reference` and then
    /// always runs to the end, snapshot comparison included, even though the
    /// device answers on the last press. When the device answers before the
    /// screen left `reference`, e.g. with a rejection, the answer is returned
    /// without navigating.
    pub async fn approve<P>(
        &self,
        pending: P,
        reference: &[u8],
        scenario: &str,
        schedule: &ClickSchedule,
    ) -> Result<P::Output, SessionError>
    where
        P: Future,
    {
        tokio::pin!(pending);

        {
            let review =
                self.wait_until_screen_is_not(reference, self.config.screen_change_timeout);
            tokio::pin!(review);

            tokio::select! {
                biased;

                answer = &mut pending => {
                    debug!("device answered before the review was shown");
                    self.set_state(SessionState::Running);
                    return Ok(answer);
                }
                shown = &mut review => {
                    shown?;
                }
            }
        }

        let navigation = self.navigate_and_compare(scenario, schedule);
        tokio::pin!(navigation);

        let mut answer = None;
        loop {
            tokio::select! {
                biased;

                out = &mut pending, if answer.is_none() => answer = Some(out),
                navigated = &mut navigation => {
                    navigated?;
                    break;
                }
            }
        }

        match answer {
            Some(answer) => Ok(answer),
            None => Ok(pending.await),
        }
    }

    /// Decode `hex` as an APDU and send it
    ///
    /// A status word other than `0x9000` is returned as
    /// [`SessionError::Status`] carrying its value.
    pub async fn send_apdu_hex(&self, hex: &str) -> Result<Vec<u8>, SessionError> {
        let command = APDUCommand::from_hex(hex)?;
        let answer = self.transport.exchange(&command).await?;

        if !answer.is_success() {
            return Err(SessionError::from_status_word(answer.retcode()));
        }
        Ok(answer.data().to_vec())
    }

    /// Stop the emulator
    pub async fn close(self) -> Result<(), SessionError> {
        self.set_state(SessionState::Closed);

        let result = self.process.close().await;
        info!("{} closed", self.config.model);
        result
    }
}
