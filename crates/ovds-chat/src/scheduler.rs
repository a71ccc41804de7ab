//! Background resubmission of stuck or failed sends.

use crate::delivery::DeliveryStateMachine;
use crate::error::{ChatError, Result};
use crate::message::{DeliveryStatus, Message, UserId};
use crate::notify::NotificationChannel;
use chrono::Utc;
use ovds_store::{DocumentStore, MESSAGES};
use ovds_sync::SyncError;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Host-environment connectivity signal. The scheduler never probes the
/// network itself.
pub trait ConnectivityProbe: Send + Sync + 'static {
    fn is_reachable(&self) -> bool;
}

/// Settable probe for tests and simulation.
pub struct MemoryConnectivity {
    online: AtomicBool,
}

impl MemoryConnectivity {
    pub fn new(online: bool) -> Self {
        Self {
            online: AtomicBool::new(online),
        }
    }

    pub fn set_online(&self, online: bool) {
        self.online.store(online, Ordering::SeqCst);
    }
}

impl ConnectivityProbe for MemoryConnectivity {
    fn is_reachable(&self) -> bool {
        self.online.load(Ordering::SeqCst)
    }
}

/// Configuration for the retry scheduler.
#[derive(Clone, Debug)]
pub struct SchedulerConfig {
    /// How often a sweep runs.
    pub interval: Duration,
    /// How old a SENDING message must be before a sweep resubmits it.
    /// Anything younger may still be a send in flight. FAILED messages
    /// carry a definitive transport verdict and are not age-gated.
    pub min_age: Duration,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(15 * 60),
            min_age: Duration::from_secs(15 * 60),
        }
    }
}

/// Outcome of one retry sweep.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RetryReport {
    /// Sweep skipped entirely: network unreachable.
    pub skipped_offline: bool,
    /// Messages successfully resubmitted.
    pub resubmitted: usize,
    /// Resubmissions rejected by the transition table (already advanced).
    pub rejected: usize,
    /// Resubmissions that failed for other reasons.
    pub failed: usize,
}

impl RetryReport {
    fn skipped() -> Self {
        Self {
            skipped_offline: true,
            ..Self::default()
        }
    }
}

/// Periodically resubmits the local user's SENDING/FAILED messages through
/// the state machine's send path.
///
/// Resubmission is idempotent: the transition table rejects anything
/// already delivered or read, and the store-level update is keyed by
/// message id.
pub struct OfflineRetryScheduler<S, N, C>
where
    S: DocumentStore,
    N: NotificationChannel,
    C: ConnectivityProbe,
{
    delivery: Arc<DeliveryStateMachine<S, N>>,
    connectivity: Arc<C>,
    local_user: UserId,
    config: SchedulerConfig,
    trigger: Notify,
}

impl<S, N, C> OfflineRetryScheduler<S, N, C>
where
    S: DocumentStore,
    N: NotificationChannel,
    C: ConnectivityProbe,
{
    pub fn new(
        delivery: Arc<DeliveryStateMachine<S, N>>,
        connectivity: Arc<C>,
        local_user: UserId,
    ) -> Self {
        Self::with_config(delivery, connectivity, local_user, SchedulerConfig::default())
    }

    pub fn with_config(
        delivery: Arc<DeliveryStateMachine<S, N>>,
        connectivity: Arc<C>,
        local_user: UserId,
        config: SchedulerConfig,
    ) -> Self {
        Self {
            delivery,
            connectivity,
            local_user,
            config,
            trigger: Notify::new(),
        }
    }

    /// Request an immediate sweep from the background loop.
    pub fn trigger_now(&self) {
        self.trigger.notify_one();
    }

    /// Run one sweep. A no-op while the network is unreachable.
    pub async fn run_once(&self) -> Result<RetryReport> {
        let monitor = self.delivery.versioning().monitor().clone();

        if !self.connectivity.is_reachable() {
            monitor.offline_operation("retry sweep skipped: network unreachable");
            return Ok(RetryReport::skipped());
        }

        monitor.background_operation("retry sweep started");
        let mut report = RetryReport::default();

        let docs = self
            .delivery
            .versioning()
            .store()
            .list(MESSAGES)
            .await
            .map_err(SyncError::from)?;

        for (path, doc) in docs {
            let message = match Message::from_stored(&path, &doc) {
                Ok(message) => message,
                Err(err) => {
                    warn!(%path, %err, "skipping malformed message document");
                    continue;
                }
            };

            if !self.needs_resubmission(&message) {
                continue;
            }

            match self.delivery.resend(&message.id, &self.local_user).await {
                Ok(_) => report.resubmitted += 1,
                Err(ChatError::IllegalTransition { from, to }) => {
                    // Another device advanced it first; nothing to do.
                    debug!(%path, %from, %to, "resubmission superseded");
                    report.rejected += 1;
                }
                Err(err) => {
                    warn!(%path, %err, "resubmission failed");
                    report.failed += 1;
                }
            }
        }

        monitor.background_operation(format!(
            "retry sweep finished: {} resubmitted, {} superseded, {} failed",
            report.resubmitted, report.rejected, report.failed
        ));
        Ok(report)
    }

    fn needs_resubmission(&self, message: &Message) -> bool {
        if message.sender != self.local_user {
            return false;
        }
        match message.delivery_status {
            DeliveryStatus::Failed => true,
            DeliveryStatus::Sending => {
                let min_age = chrono::Duration::from_std(self.config.min_age)
                    .unwrap_or(chrono::Duration::MAX);
                Utc::now().signed_duration_since(message.timestamp) >= min_age
            }
            _ => false,
        }
    }

    /// Run sweeps on the configured interval, plus on-demand triggers.
    pub fn spawn(self: Arc<Self>) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(self.config.interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            // interval fires immediately; consume that tick so the first
            // sweep waits for a full window or an explicit trigger.
            ticker.tick().await;

            loop {
                tokio::select! {
                    _ = ticker.tick() => {}
                    _ = self.trigger.notified() => {}
                }
                if let Err(err) = self.run_once().await {
                    warn!(%err, "retry sweep errored");
                }
            }
        })
    }
}
