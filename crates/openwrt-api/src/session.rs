// Shared session state
//
// One `Session` per client, held behind an `Arc` by every facade. The token
// slot starts empty and is filled exactly once by a successful login; facades
// read it on every call, so a token set after their construction is picked
// up without re-wiring anything.

use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwapOption;
use secrecy::{ExposeSecret, SecretString};
use url::Url;

use crate::error::Error;
use crate::timeouts::{Operation, TimeoutConfig};

/// Remote address, resolved timeouts, and the opaque login token.
#[derive(Debug)]
pub struct Session {
    remote: Url,
    token: ArcSwapOption<SecretString>,
    timeouts: TimeoutConfig,
}

impl Session {
    pub fn new(remote: Url, timeouts: TimeoutConfig) -> Self {
        Self {
            remote,
            token: ArcSwapOption::empty(),
            timeouts,
        }
    }

    /// The device's base URL (e.g. `http://192.168.1.1`).
    pub fn remote(&self) -> &Url {
        &self.remote
    }

    pub fn timeouts(&self) -> &TimeoutConfig {
        &self.timeouts
    }

    pub fn timeout(&self, operation: Operation) -> Duration {
        self.timeouts.get(operation)
    }

    pub fn is_authenticated(&self) -> bool {
        self.token().is_some()
    }

    /// The current token, if a login has completed.
    pub(crate) fn token(&self) -> Option<Arc<SecretString>> {
        self.token
            .load_full()
            .filter(|token| !token.expose_secret().is_empty())
    }

    /// Store the login token. The slot is write-once: of several
    /// concurrent writers exactly one succeeds.
    pub(crate) fn set_token(&self, token: SecretString) -> Result<(), Error> {
        if token.expose_secret().is_empty() {
            return Err(Error::EmptyToken);
        }
        let previous = self
            .token
            .compare_and_swap(&None::<Arc<SecretString>>, Some(Arc::new(token)));
        if previous.is_some() {
            return Err(Error::AlreadyAuthenticated);
        }
        Ok(())
    }
}
