use std::sync::{Arc, Mutex, MutexGuard};

use rusqlite::Connection;

use crate::config::AppConfig;
use crate::errors::AppError;
use crate::services::email::{EmailProvider, Notifier};
use crate::services::tokens::TokenService;

pub struct AppState {
    pub db: Arc<Mutex<Connection>>,
    pub config: AppConfig,
    pub tokens: TokenService,
    pub email: Arc<dyn EmailProvider>,
    pub notifier: Notifier,
}

impl AppState {
    /// Spawns the notification worker, so must run inside a tokio runtime.
    pub fn new(conn: Connection, config: AppConfig, email: Arc<dyn EmailProvider>) -> Self {
        let tokens = TokenService::new(&config.jwt_secret, config.jwt_expiry_hours);
        let notifier = Notifier::spawn(Arc::clone(&email));
        Self {
            db: Arc::new(Mutex::new(conn)),
            config,
            tokens,
            email,
            notifier,
        }
    }

    pub fn conn(&self) -> Result<MutexGuard<'_, Connection>, AppError> {
        self.db
            .lock()
            .map_err(|_| AppError::Internal(anyhow::anyhow!("database mutex poisoned")))
    }
}
