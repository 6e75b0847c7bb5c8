use std::sync::Mutex;
use tokio_util::sync::CancellationToken;

/// Holds the single live abort handle. Aborting fires it and installs a fresh one.
#[derive(Debug, Default)]
pub struct AbortSwitch {
    token: Mutex<CancellationToken>,
}

impl AbortSwitch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Handle for the request about to start.
    pub fn current(&self) -> CancellationToken {
        match self.token.lock() {
            Ok(token) => token.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn abort(&self) {
        let mut token = match self.token.lock() {
            Ok(token) => token,
            Err(poisoned) => poisoned.into_inner(),
        };
        token.cancel();
        *token = CancellationToken::new();
    }
}
