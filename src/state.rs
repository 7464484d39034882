//! Application state management

use parking_lot::{Mutex, MutexGuard};
use std::sync::Arc;

use crate::config::Config;
use crate::error::{AppError, Result};
use crate::session::Session;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: Config,
    /// The one annotation session this server owns. Handlers hold the lock
    /// for a single synchronous mutation, which keeps mutations serialized.
    session: Mutex<Session>,
}

impl AppState {
    /// Create a new application state
    pub fn new(config: Config, session: Session) -> Self {
        Self {
            inner: Arc::new(AppStateInner {
                config,
                session: Mutex::new(session),
            }),
        }
    }

    /// Get the configuration
    pub fn config(&self) -> &Config {
        &self.inner.config
    }

    /// Lock the session for a read
    pub fn session(&self) -> MutexGuard<'_, Session> {
        self.inner.session.lock()
    }

    /// Run a mutation on the blocking pool. Every mutation ends in a
    /// snapshot write, which must not stall the async workers.
    pub async fn mutate<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Session) -> T + Send + 'static,
        T: Send + 'static,
    {
        let state = self.clone();
        tokio::task::spawn_blocking(move || f(&mut state.session()))
            .await
            .map_err(|e| AppError::Internal(format!("Session task failed: {}", e)))
    }
}
