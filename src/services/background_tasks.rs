// Background task scheduler
// Periodic maintenance of login counters and stale verifications

use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{error, info};

use crate::app_config::AuthSettings;
use crate::repository::CredentialStore;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CleanupReport {
    pub login_attempts_removed: usize,
    pub verifications_removed: usize,
}

/// Background task manager for credential maintenance
pub struct BackgroundTaskManager {
    credentials: Arc<dyn CredentialStore>,
    settings: AuthSettings,
    interval: Duration,
}

impl BackgroundTaskManager {
    pub fn new(credentials: Arc<dyn CredentialStore>, settings: AuthSettings, interval: Duration) -> Self {
        Self {
            credentials,
            settings,
            interval,
        }
    }

    /// One cleanup pass; a failing step is logged and the other still runs
    pub async fn run_cleanup(&self) -> CleanupReport {
        let mut report = CleanupReport::default();

        match self
            .credentials
            .cleanup_expired_attempts(self.settings.login_attempt_reset_period())
            .await
        {
            Ok(removed) => report.login_attempts_removed = removed,
            Err(e) => error!("Login attempt cleanup failed: {}", e),
        }

        match self.credentials.cleanup_expired_verifications().await {
            Ok(removed) => report.verifications_removed = removed,
            Err(e) => error!("Verification cleanup failed: {}", e),
        }

        info!(
            login_attempts_removed = report.login_attempts_removed,
            verifications_removed = report.verifications_removed,
            "Credential cleanup finished"
        );
        report
    }

    /// Start all background tasks. The first pass runs one interval after start.
    pub fn start_all_tasks(self) -> JoinHandle<()> {
        info!("Starting background tasks (cleanup every {:?})", self.interval);

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(self.interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            ticker.tick().await;

            loop {
                ticker.tick().await;
                self.run_cleanup().await;
            }
        })
    }
}

/// Initialize background tasks (call this in main.rs)
pub fn initialize_background_tasks(
    credentials: Arc<dyn CredentialStore>,
    settings: AuthSettings,
    interval: Duration,
) -> JoinHandle<()> {
    BackgroundTaskManager::new(credentials, settings, interval).start_all_tasks()
}
