// Redemption pipeline: exchange points for a reward, and the status changes
// that follow (cancel refunds the points once).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::models::{
    Amount, NewRedemption, NewTransaction, PointsLedger, Redemption, RedemptionStatus, Reward,
    Transaction, TransactionStatus, TransactionType,
};
use crate::repository::{CatalogStore, RedemptionStore, RefundPlan, StoreError};
use crate::services::event_emitter::{self, EventEmitter};
use crate::services::transaction::{CreateTransactionRequest, TransactionService};
use crate::services::PointsService;
use crate::utils::ServiceError;

#[derive(Debug, Clone, Deserialize)]
pub struct RedeemRewardRequest {
    pub customer_id: Uuid,
    pub reward_id: Uuid,
    pub redemption_date: Option<DateTime<Utc>>,
    pub initial_status: Option<RedemptionStatus>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UpdateRedemptionStatusRequest {
    pub status: RedemptionStatus,
}

#[derive(Debug, Clone, Serialize)]
pub struct RedemptionOutcome {
    pub redemption: Redemption,
    pub transaction: Transaction,
    pub ledger_entry: Option<PointsLedger>,
}

#[derive(Debug, Clone, Serialize)]
pub struct StatusChangeOutcome {
    pub redemption: Redemption,
    pub previous_status: RedemptionStatus,
    pub refunded_points: i64,
    pub refund_transaction: Option<Transaction>,
    pub refund_entry: Option<PointsLedger>,
}

#[derive(Clone)]
pub struct RedemptionService {
    catalog: Arc<dyn CatalogStore>,
    redemptions: Arc<dyn RedemptionStore>,
    transactions: TransactionService,
    points: PointsService,
    events: EventEmitter,
}

impl RedemptionService {
    pub fn new(
        catalog: Arc<dyn CatalogStore>,
        redemptions: Arc<dyn RedemptionStore>,
        transactions: TransactionService,
        points: PointsService,
        events: EventEmitter,
    ) -> Self {
        Self {
            catalog,
            redemptions,
            transactions,
            points,
            events,
        }
    }

    #[instrument(skip(self, req), fields(customer_id = %req.customer_id, reward_id = %req.reward_id))]
    pub async fn redeem_reward(
        &self,
        req: RedeemRewardRequest,
    ) -> Result<RedemptionOutcome, ServiceError> {
        let initial_status = req.initial_status.unwrap_or(RedemptionStatus::Pending);
        if !initial_status.holds_points() {
            return Err(ServiceError::Validation(format!(
                "a redemption cannot start as {}",
                initial_status
            )));
        }

        let reward = self.catalog.get_reward(req.reward_id).await?;
        if !reward.is_available() {
            return Err(StoreError::RewardUnavailable.into());
        }

        let customer = self.catalog.get_customer(req.customer_id).await?;
        let program = self.catalog.get_program(reward.program_id).await?;
        if program.merchant_id != customer.merchant_id {
            return Err(ServiceError::Forbidden(
                "reward belongs to another merchant".to_string(),
            ));
        }

        let available = self.points.get_balance(customer.id, reward.program_id).await?;
        if available < reward.points_required {
            return Err(StoreError::InsufficientPoints {
                available,
                requested: reward.points_required,
            }
            .into());
        }

        let reward = self.redemptions.reserve_reward(reward.id).await?;
        let redemption = match self
            .redemptions
            .insert_redemption(NewRedemption {
                merchant_customers_id: customer.id,
                reward_id: reward.id,
                points_used: reward.points_required,
                redemption_date: req.redemption_date.unwrap_or_else(Utc::now),
                status: initial_status,
            })
            .await
        {
            Ok(redemption) => redemption,
            Err(e) => {
                self.release(reward.id).await;
                return Err(e.into());
            },
        };

        let debit = CreateTransactionRequest {
            merchant_customers_id: customer.id,
            program_id: reward.program_id,
            transaction_type: TransactionType::Redemption,
            transaction_amount: Amount::from_whole_units(reward.points_required)?,
            transaction_date: Some(redemption.redemption_date),
            branch_id: None,
        };
        let outcome = match self.transactions.create_transaction(debit).await {
            Ok(outcome) => outcome,
            Err(e) => {
                self.abandon(&redemption).await;
                return Err(e);
            },
        };

        let redemption = self
            .redemptions
            .attach_redemption_transaction(redemption.id, outcome.transaction.transaction_id)
            .await?;

        info!(
            redemption_id = %redemption.id,
            points_used = redemption.points_used,
            "Reward redeemed"
        );
        self.events
            .emit(event_emitter::reward_redeemed(&redemption, &reward));

        Ok(RedemptionOutcome {
            redemption,
            transaction: outcome.transaction,
            ledger_entry: outcome.ledger_entry,
        })
    }

    pub async fn get_redemption(&self, redemption_id: Uuid) -> Result<Redemption, ServiceError> {
        Ok(self.redemptions.get_redemption(redemption_id).await?)
    }

    /// Free-form status change. Canceling a pending redemption credits its points
    /// back with a refund transaction; canceling from any other status credits nothing.
    #[instrument(skip(self))]
    pub async fn update_status(
        &self,
        actor_id: Uuid,
        redemption_id: Uuid,
        status: RedemptionStatus,
    ) -> Result<StatusChangeOutcome, ServiceError> {
        let current = self.redemptions.get_redemption(redemption_id).await?;
        let refund = if status == RedemptionStatus::Canceled {
            Some(self.refund_plan(&current).await?)
        } else {
            None
        };

        let transition = self
            .redemptions
            .transition_redemption(redemption_id, status, refund)
            .await?;

        let (refund_transaction, refund_entry) = match transition.refund {
            Some(r) => (Some(r.transaction), Some(r.entry)),
            None => (None, None),
        };
        let refunded_points = refund_entry.as_ref().map_or(0, |e| e.points_earned);

        if transition.previous != transition.redemption.status {
            info!(
                %redemption_id,
                from = %transition.previous,
                to = %transition.redemption.status,
                refunded_points,
                "Redemption status changed"
            );
            self.events.emit(event_emitter::redemption_status_changed(
                actor_id,
                &transition.redemption,
                transition.previous,
                refunded_points,
            ));
        }

        Ok(StatusChangeOutcome {
            redemption: transition.redemption,
            previous_status: transition.previous,
            refunded_points,
            refund_transaction,
            refund_entry,
        })
    }

    async fn refund_plan(&self, redemption: &Redemption) -> Result<RefundPlan, ServiceError> {
        let reward: Reward = self.catalog.get_reward(redemption.reward_id).await?;
        let customer = self
            .catalog
            .get_customer(redemption.merchant_customers_id)
            .await?;

        Ok(RefundPlan {
            transaction: NewTransaction {
                merchant_id: customer.merchant_id,
                merchant_customers_id: customer.id,
                program_id: reward.program_id,
                transaction_type: TransactionType::Refund,
                transaction_amount: Amount::from_whole_units(redemption.points_used)?,
                transaction_date: Utc::now(),
                branch_id: None,
                status: TransactionStatus::Pending,
            },
            points: redemption.points_used,
        })
    }

    /// Undo the bookkeeping of a redemption whose debit never reached the ledger
    async fn abandon(&self, redemption: &Redemption) {
        if let Err(e) = self
            .redemptions
            .transition_redemption(redemption.id, RedemptionStatus::Failed, None)
            .await
        {
            warn!(redemption_id = %redemption.id, "Failed to mark redemption failed: {}", e);
        }
        self.release(redemption.reward_id).await;
    }

    async fn release(&self, reward_id: Uuid) {
        if let Err(e) = self.redemptions.release_reward(reward_id).await {
            warn!(%reward_id, "Failed to release reward stock: {}", e);
        }
    }
}
