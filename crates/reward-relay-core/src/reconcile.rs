//! Periodic reconciliation against the provider.
//!
//! Remote hooks drift: operators delete them in the provider UI or edit the
//! subscribed events. Each cycle walks every registration and makes the local
//! store agree with the remote state. The remote side wins: a vanished hook
//! removes the registration, a changed event set is adopted as the new
//! trigger list.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::error::RelayError;
use crate::model::WebhookRegistration;
use crate::provider::HooksProvider;
use crate::store::WebhookStore;

#[cfg(test)]
#[path = "reconcile_tests.rs"]
mod tests;

/// Tally of one reconciliation cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ReconcileSummary {
    /// Registrations the walk reached.
    pub examined: usize,
    /// Registrations whose trigger list was updated to the remote event set.
    pub adopted: usize,
    /// Registrations removed because the remote hook no longer exists.
    pub removed: usize,
    /// Registrations skipped: unusable token or a provider error.
    pub skipped: usize,
}

enum HookFate {
    Unchanged,
    Adopted,
    Removed,
    Skipped,
}

/// Walks registrations and converges them with the provider.
///
/// A single guard serializes cycles between the interval loop and the forced
/// runs triggered over the management API; a cycle that finds the guard held
/// yields instead of queueing.
pub struct Reconciler {
    store: Arc<dyn WebhookStore>,
    provider: Arc<dyn HooksProvider>,
    running: AtomicBool,
}

impl Reconciler {
    pub fn new(store: Arc<dyn WebhookStore>, provider: Arc<dyn HooksProvider>) -> Self {
        Self {
            store,
            provider,
            running: AtomicBool::new(false),
        }
    }

    /// Run one cycle, or return `None` when another cycle is already
    /// running.
    pub async fn run_cycle(&self) -> Result<Option<ReconcileSummary>, RelayError> {
        if self.running.swap(true, Ordering::SeqCst) {
            debug!("reconciliation already running, yielding");
            return Ok(None);
        }
        let result = self.cycle().await;
        self.running.store(false, Ordering::SeqCst);
        result.map(Some)
    }

    async fn cycle(&self) -> Result<ReconcileSummary, RelayError> {
        // Start from live provider state, not what earlier requests cached
        self.provider.clear_cache().await;

        let mut summary = ReconcileSummary::default();
        for id in self.store.list_ids().await? {
            // Re-read per hook so a registration deleted mid-walk is skipped
            let Some(hook) = self.store.find_by_id(id).await? else {
                continue;
            };
            summary.examined += 1;
            match self.reconcile_hook(&hook).await {
                Ok(HookFate::Unchanged) => {}
                Ok(HookFate::Adopted) => summary.adopted += 1,
                Ok(HookFate::Removed) => summary.removed += 1,
                Ok(HookFate::Skipped) => summary.skipped += 1,
                Err(e) => {
                    warn!(
                        organization = %hook.organization_name,
                        error = %e,
                        "skipping registration after a reconciliation failure"
                    );
                    summary.skipped += 1;
                }
            }
        }
        info!(
            examined = summary.examined,
            adopted = summary.adopted,
            removed = summary.removed,
            skipped = summary.skipped,
            "reconciliation cycle finished"
        );
        Ok(summary)
    }

    async fn reconcile_hook(&self, hook: &WebhookRegistration) -> Result<HookFate, RelayError> {
        let status = self.provider.token_status(&hook.token).await?;
        if !status.is_usable() {
            debug!(organization = %hook.organization_name, "token unusable, leaving registration as is");
            return Ok(HookFate::Skipped);
        }

        match self
            .provider
            .get_hook(hook.organization_id, hook.webhook_id, &hook.token)
            .await?
        {
            None => {
                self.store.delete(hook.id).await?;
                info!(
                    organization = %hook.organization_name,
                    "remote hook is gone, removed the registration"
                );
                Ok(HookFate::Removed)
            }
            Some(remote) => {
                if same_event_set(&remote.events, &hook.triggers) {
                    Ok(HookFate::Unchanged)
                } else {
                    self.store.update_triggers(hook.id, &remote.events).await?;
                    info!(
                        organization = %hook.organization_name,
                        events = ?remote.events,
                        "adopted the remote event set"
                    );
                    Ok(HookFate::Adopted)
                }
            }
        }
    }
}

/// Order-insensitive comparison of event name sets.
fn same_event_set(remote: &[String], local: &[String]) -> bool {
    let mut remote = remote.to_vec();
    let mut local = local.to_vec();
    remote.sort();
    local.sort();
    remote == local
}

/// Spawn the interval loop. The first cycle runs immediately so drift that
/// accumulated while the service was down is repaired at startup. Abort the
/// returned handle to stop the loop.
pub fn spawn_reconciliation(reconciler: Arc<Reconciler>, every: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            match reconciler.run_cycle().await {
                Ok(Some(_)) => {}
                Ok(None) => debug!("skipped scheduled cycle, a forced run is in progress"),
                Err(e) => warn!(error = %e, "reconciliation cycle failed"),
            }
        }
    })
}
