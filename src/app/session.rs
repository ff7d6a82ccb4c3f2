use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use tokio::sync::Mutex;
use tracing::{info, warn};

use super::driver::RemoteDriver;
use super::error::AuthenticationError;
use super::pacing::Pacing;
use super::site::SiteSelectors;

const BADGE_PROBE: Duration = Duration::from_secs(2);
const FORM_WAIT: Duration = Duration::from_secs(10);

#[derive(Clone)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

#[derive(Debug, Default)]
struct SessionState {
    authenticated: bool,
}

/// Owns the login state of the shared browser session.
///
/// Every successful (re-)login bumps a generation counter. Workers remember the
/// generation they fetched under; [`SessionManager::relogin`] only logs in again
/// when no other worker has done so since, so a burst of expiry signals collapses
/// into one login.
pub struct SessionManager {
    driver: Arc<dyn RemoteDriver>,
    selectors: Arc<SiteSelectors>,
    credentials: Credentials,
    pacing: Pacing,
    state: Mutex<SessionState>,
    generation: AtomicU64,
}

impl SessionManager {
    pub fn new(
        driver: Arc<dyn RemoteDriver>,
        selectors: Arc<SiteSelectors>,
        credentials: Credentials,
        pacing: Pacing,
    ) -> Self {
        Self {
            driver,
            selectors,
            credentials,
            pacing,
            state: Mutex::new(SessionState::default()),
            generation: AtomicU64::new(0),
        }
    }

    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }

    /// Checks the logged-in badge with a short wait. Absence means "not logged in".
    pub async fn is_authenticated(&self) -> Result<bool, AuthenticationError> {
        Ok(self
            .driver
            .find_element(self.selectors.logged_in_badge, None, BADGE_PROBE)
            .await?
            .is_some())
    }

    /// Logs in unless already authenticated. `Ok(false)` means the site rejected
    /// the credentials.
    pub async fn login(&self) -> Result<bool, AuthenticationError> {
        let mut state = self.state.lock().await;
        self.login_locked(&mut state).await
    }

    /// Like [`login`](Self::login) but treats rejection as an error.
    pub async fn ensure_authenticated(&self) -> Result<(), AuthenticationError> {
        if self.login().await? {
            Ok(())
        } else {
            Err(self.rejected())
        }
    }

    /// Re-authenticates after a fetch made under `observed` hit the expiry banner.
    /// Returns immediately if another caller already re-logged in since then.
    pub async fn relogin(&self, observed: u64) -> Result<(), AuthenticationError> {
        let mut state = self.state.lock().await;
        if self.generation() > observed {
            return Ok(());
        }

        warn!("session expired, logging in again");
        state.authenticated = false;
        // Reload so the badge check reflects the server-side session.
        self.driver.navigate(self.selectors.home_url).await?;
        self.pacing.after_navigation().await;

        if self.login_locked(&mut state).await? {
            Ok(())
        } else {
            Err(self.rejected())
        }
    }

    async fn login_locked(&self, state: &mut SessionState) -> Result<bool, AuthenticationError> {
        if self.is_authenticated().await? {
            if !state.authenticated {
                info!("already logged in");
                state.authenticated = true;
                self.generation.fetch_add(1, Ordering::AcqRel);
            }
            return Ok(true);
        }

        let sel = &self.selectors;
        if let Some(icon) = self.driver.find_element(sel.login_icon, None, FORM_WAIT).await? {
            self.driver.click(&icon).await?;
        }
        let Some(user) = self
            .driver
            .find_element(sel.username_input, None, FORM_WAIT)
            .await?
        else {
            return Err(AuthenticationError::LoginFormMissing);
        };

        let prefilled = self.driver.property(&user, "value").await?;
        if prefilled.as_deref() != Some(self.credentials.username.as_str()) {
            self.driver.type_text(&user, &self.credentials.username).await?;
            let password = self
                .driver
                .find_element(sel.password_input, None, FORM_WAIT)
                .await?
                .ok_or(AuthenticationError::LoginFormMissing)?;
            self.driver
                .type_text(&password, &self.credentials.password)
                .await?;
        }

        let button = self
            .driver
            .find_by_text(sel.login_button_tag, sel.login_button_text, FORM_WAIT)
            .await?
            .ok_or(AuthenticationError::LoginFormMissing)?;
        self.driver.click(&button).await?;
        self.pacing.after_login().await;

        let ok = self
            .driver
            .find_element(sel.logged_in_badge, None, FORM_WAIT)
            .await?
            .is_some();
        state.authenticated = ok;
        if ok {
            self.generation.fetch_add(1, Ordering::AcqRel);
            info!(user = %self.credentials.username, "login successful");
        } else {
            warn!(user = %self.credentials.username, "login failed");
        }
        Ok(ok)
    }

    fn rejected(&self) -> AuthenticationError {
        AuthenticationError::Rejected {
            username: self.credentials.username.clone(),
        }
    }
}
