//! Session lifecycle
//!
//! One browser session spans a whole run. `close` persists the session state and
//! shuts the browser down exactly once, whatever the stages returned.

use crate::browser::chromium::LaunchOptions;
use crate::browser::{BrowserSession, ChromiumSession};
use crate::error::BrowserError;
use std::path::PathBuf;
use tracing::{info, warn};

pub struct SessionManager {
    session: Box<dyn BrowserSession>,
    state_file: Option<PathBuf>,
}

impl SessionManager {
    /// Launch Chrome with `options`; state is saved to `state_file` on close.
    pub async fn launch(
        options: &LaunchOptions,
        state_file: Option<PathBuf>,
    ) -> Result<Self, BrowserError> {
        info!("Starting browser session...");
        let session = ChromiumSession::launch(options).await?;
        Ok(Self::with_session(Box::new(session), state_file))
    }

    /// Wrap an already running session.
    pub fn with_session(session: Box<dyn BrowserSession>, state_file: Option<PathBuf>) -> Self {
        Self {
            session,
            state_file,
        }
    }

    pub fn session(&self) -> &dyn BrowserSession {
        self.session.as_ref()
    }

    /// Persist state, then close the browser. A failed save does not keep the browser open.
    pub async fn close(self) -> Result<(), BrowserError> {
        let saved = match &self.state_file {
            Some(path) => {
                info!(path = %path.display(), "Saving session state");
                self.session.persist_state(path).await
            }
            None => Ok(()),
        };
        if let Err(e) = &saved {
            warn!(error = %e, "Failed to save session state");
        }
        self.session.close().await?;
        info!("Browser session closed");
        saved
    }
}
