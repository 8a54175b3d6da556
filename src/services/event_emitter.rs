// Best-effort domain event log
// Emission is detached from the request; each write is bounded by a timeout and
// counted so shutdown can wait for in-flight writes.

use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::models::{
    ActorType, EventLog, EventType, NewEventLog, Redemption, RedemptionStatus, Reward, Transaction,
};
use crate::repository::EventLogStore;
use crate::utils::ServiceError;

#[derive(Clone)]
pub struct EventEmitter {
    store: Arc<dyn EventLogStore>,
    write_timeout: Duration,
    in_flight: Arc<watch::Sender<usize>>,
}

/// Decrements the in-flight count when the write finishes, even on panic
struct InFlightGuard(Arc<watch::Sender<usize>>);

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.0.send_modify(|n| *n = n.saturating_sub(1));
    }
}

impl EventEmitter {
    pub fn new(store: Arc<dyn EventLogStore>, write_timeout: Duration) -> Self {
        let (tx, _rx) = watch::channel(0usize);
        Self {
            store,
            write_timeout,
            in_flight: Arc::new(tx),
        }
    }

    /// Persist the event in the background; failures are logged only
    pub fn emit(&self, event: NewEventLog) {
        self.in_flight.send_modify(|n| *n += 1);
        let guard = InFlightGuard(self.in_flight.clone());
        let store = self.store.clone();
        let write_timeout = self.write_timeout;

        tokio::spawn(async move {
            let _guard = guard;
            let event_type = event.event_type;
            match tokio::time::timeout(write_timeout, store.insert_event(event)).await {
                Ok(Ok(logged)) => {
                    debug!(event_id = %logged.id, event_type = %event_type, "Event logged")
                },
                Ok(Err(e)) => warn!(event_type = %event_type, "Failed to log event: {}", e),
                Err(_) => warn!(
                    event_type = %event_type,
                    "Event log write timed out after {:?}", write_timeout
                ),
            }
        });
    }

    pub async fn events_for_reference(&self, reference_id: Uuid) -> Result<Vec<EventLog>, ServiceError> {
        Ok(self.store.events_by_reference(reference_id).await?)
    }

    pub fn in_flight(&self) -> usize {
        *self.in_flight.borrow()
    }

    /// Wait until every emitted write has finished. Returns false on timeout.
    pub async fn drain(&self, timeout: Duration) -> bool {
        let mut rx = self.in_flight.subscribe();
        tokio::time::timeout(timeout, rx.wait_for(|n| *n == 0))
            .await
            .map(|r| r.is_ok())
            .unwrap_or(false)
    }
}

pub fn transaction_created(transaction: &Transaction, points_delta: i64) -> NewEventLog {
    NewEventLog {
        event_type: EventType::TransactionCreated,
        actor_id: transaction.merchant_id,
        actor_type: ActorType::Merchant,
        details: json!({
            "merchant_id": transaction.merchant_id,
            "transaction_type": transaction.transaction_type,
            "transaction_amount": transaction.transaction_amount,
            "points_delta": points_delta,
            "branch_id": transaction.branch_id,
        }),
        reference_id: Some(transaction.transaction_id),
    }
}

pub fn reward_redeemed(redemption: &Redemption, reward: &Reward) -> NewEventLog {
    NewEventLog {
        event_type: EventType::RewardRedeemed,
        actor_id: redemption.merchant_customers_id,
        actor_type: ActorType::Client,
        details: json!({
            "reward_id": reward.id,
            "points_used": redemption.points_used,
            "redemption_id": redemption.id,
            "program_id": reward.program_id,
        }),
        reference_id: Some(redemption.id),
    }
}

pub fn redemption_status_changed(
    actor_id: Uuid,
    redemption: &Redemption,
    from: RedemptionStatus,
    refunded_points: i64,
) -> NewEventLog {
    NewEventLog {
        event_type: EventType::RedemptionStatusChanged,
        actor_id,
        actor_type: ActorType::MerchantUser,
        details: json!({
            "from": from,
            "to": redemption.status,
            "refunded_points": refunded_points,
        }),
        reference_id: Some(redemption.id),
    }
}
