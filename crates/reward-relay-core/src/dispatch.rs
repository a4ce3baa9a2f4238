//! Webhook delivery dispatch.
//!
//! The HTTP surface hands raw deliveries to a bounded worker pool and answers
//! the provider immediately; verification, gating, classification, and engine
//! submission all happen on the workers. A delivery that fails any gate is
//! dropped silently, matching how webhook providers expect consumers to
//! behave: the provider retries on 5xx, and nothing here is worth a retry.

use std::fmt;
use std::sync::Arc;

use bytes::Bytes;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use crate::engine::RewardEngine;
use crate::error::RelayError;
use crate::gate::RepositoryGate;
use crate::identity::IdentityResolver;
use crate::model::{DomainEvent, ScoredEvent};
use crate::payload::WebhookPayload;
use crate::plugin::TriggerRegistry;
use crate::signature::SignatureVerifier;
use crate::store::WebhookStore;

#[cfg(test)]
#[path = "dispatch_tests.rs"]
mod tests;

/// One raw webhook delivery as received from the provider: the event-type
/// header, the signature header, and the unparsed body bytes. The signature
/// is computed over exactly these bytes, so the body must never be
/// re-serialized before verification.
#[derive(Clone)]
pub struct WebhookDelivery {
    pub event_type: String,
    pub signature: String,
    pub body: Bytes,
}

impl fmt::Debug for WebhookDelivery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WebhookDelivery")
            .field("event_type", &self.event_type)
            .field("body_bytes", &self.body.len())
            .finish()
    }
}

/// What became of one delivery, for logging and tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// The payload could not be tied to a registration whose secret signs it:
    /// unparseable body, no organization, no registration, or a bad
    /// signature.
    Unverified,
    /// Verified, but the repository is switched off.
    RepositoryDisabled,
    /// Verified and classified; carries the number of engine submissions.
    Processed { submitted: usize },
}

/// Runs one delivery through the full pipeline.
pub struct EventDispatcher {
    verifier: SignatureVerifier,
    registry: TriggerRegistry,
    store: Arc<dyn WebhookStore>,
    gate: Arc<RepositoryGate>,
    engine: Arc<dyn RewardEngine>,
    identities: Arc<dyn IdentityResolver>,
}

impl EventDispatcher {
    pub fn new(
        verifier: SignatureVerifier,
        registry: TriggerRegistry,
        store: Arc<dyn WebhookStore>,
        gate: Arc<RepositoryGate>,
        engine: Arc<dyn RewardEngine>,
        identities: Arc<dyn IdentityResolver>,
    ) -> Self {
        Self {
            verifier,
            registry,
            store,
            gate,
            engine,
            identities,
        }
    }

    /// Verify, gate, classify, and submit one delivery.
    ///
    /// Err is reserved for infrastructure failures (store or engine lookups);
    /// everything about the delivery itself is an outcome, not an error.
    pub async fn process(&self, delivery: &WebhookDelivery) -> Result<DispatchOutcome, RelayError> {
        let Some(payload) = WebhookPayload::parse(&delivery.body) else {
            debug!(event_type = %delivery.event_type, "discarding unparseable delivery");
            return Ok(DispatchOutcome::Unverified);
        };
        let Some(organization_id) = payload.organization_id() else {
            debug!(event_type = %delivery.event_type, "discarding delivery without an organization");
            return Ok(DispatchOutcome::Unverified);
        };
        let Some(registration) = self.store.find_by_organization(organization_id).await? else {
            debug!(%organization_id, "discarding delivery for an unwatched organization");
            return Ok(DispatchOutcome::Unverified);
        };
        if !self
            .verifier
            .verify(&registration.secret, &delivery.body, &delivery.signature)
        {
            debug!(%organization_id, "discarding delivery with a bad signature");
            return Ok(DispatchOutcome::Unverified);
        }

        if !self.gate.allows(&payload).await? {
            debug!(%organization_id, "discarding delivery from a disabled repository");
            return Ok(DispatchOutcome::RepositoryDisabled);
        }

        let events = self.registry.classify(&delivery.event_type, &payload);
        let mut submitted = 0;
        for event in events {
            if let Some(org) = event.organization_id {
                if !self.engine.event_enabled(event.name, org).await? {
                    debug!(event = %event.name, %org, "event switched off for organization");
                    continue;
                }
            }
            submitted += self.submit_event(&event).await?;
        }
        Ok(DispatchOutcome::Processed { submitted })
    }

    /// Resolve identities and hand one domain event to the engine. Returns
    /// the number of submissions it produced.
    async fn submit_event(&self, event: &DomainEvent) -> Result<usize, RelayError> {
        let receiver_id = self.identities.resolve(&event.receiver).await?;
        let sender_id = match &event.sender {
            Some(sender) if *sender != event.receiver => self.identities.resolve(sender).await?,
            _ => receiver_id.clone(),
        };
        let Some(sender_id) = sender_id.filter(|id| !id.is_empty()) else {
            debug!(event = %event.name, login = %event.receiver, "dropping event for an unlinked login");
            return Ok(0);
        };

        let scored = |rule_title: String| ScoredEvent {
            rule_title,
            sender_id: sender_id.clone(),
            receiver_id: receiver_id.clone(),
            object_id: event.object_id.clone(),
            object_type: event.object_type,
        };

        let mut submitted = 0;
        if self.engine.rule_exists(event.name).await? {
            match self.engine.submit(scored(event.name.as_str().to_string())).await {
                Ok(()) => {
                    submitted += 1;
                    info!(event = %event.name, user = %sender_id, "action submitted");
                }
                Err(e) => error!(event = %event.name, error = %e, "engine submission failed"),
            }
        } else {
            for rule_title in self.engine.cancellation_rules(event.name).await? {
                match self.engine.submit_cancellation(scored(rule_title.clone())).await {
                    Ok(()) => {
                        submitted += 1;
                        info!(event = %event.name, rule = %rule_title, user = %sender_id, "cancellation submitted");
                    }
                    Err(e) => error!(event = %event.name, error = %e, "engine cancellation failed"),
                }
            }
        }
        Ok(submitted)
    }
}

// ============================================================================
// Worker pool
// ============================================================================

/// Bounded queue plus workers that drain it. Enqueueing never blocks the
/// HTTP handler: a full queue is reported to the caller instead.
pub struct DispatchPool {
    tx: mpsc::Sender<WebhookDelivery>,
    workers: Vec<JoinHandle<()>>,
}

impl DispatchPool {
    /// Spawn `workers` tasks draining a queue of at most `queue_depth`
    /// deliveries. Zero values are lifted to one.
    pub fn start(dispatcher: Arc<EventDispatcher>, queue_depth: usize, workers: usize) -> Self {
        let (tx, rx) = mpsc::channel(queue_depth.max(1));
        let rx = Arc::new(Mutex::new(rx));

        let workers = (0..workers.max(1))
            .map(|worker| {
                let rx = Arc::clone(&rx);
                let dispatcher = Arc::clone(&dispatcher);
                tokio::spawn(async move {
                    loop {
                        let delivery = rx.lock().await.recv().await;
                        let Some(delivery) = delivery else {
                            break;
                        };
                        match dispatcher.process(&delivery).await {
                            Ok(outcome) => {
                                debug!(worker, event_type = %delivery.event_type, ?outcome, "delivery processed");
                            }
                            Err(e) => {
                                error!(worker, event_type = %delivery.event_type, error = %e, "delivery processing failed");
                            }
                        }
                    }
                })
            })
            .collect();

        Self { tx, workers }
    }

    /// Enqueue one delivery. Fails with [`RelayError::QueueFull`] when the
    /// queue is at capacity.
    pub fn submit(&self, delivery: WebhookDelivery) -> Result<(), RelayError> {
        self.tx.try_send(delivery).map_err(|e| match e {
            TrySendError::Full(_) => RelayError::QueueFull,
            TrySendError::Closed(_) => RelayError::storage("dispatch pool is stopped"),
        })
    }

    /// Stop accepting deliveries, drain the queue, and wait for the workers.
    pub async fn shutdown(self) {
        drop(self.tx);
        for worker in self.workers {
            let _ = worker.await;
        }
    }
}
