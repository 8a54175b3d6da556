use async_trait::async_trait;
use diesel_async::AsyncConnection;
use uuid::Uuid;

use super::PgStore;
use crate::models::{
    NewRedemption, PointsLedger, PointsMovement, Redemption, RedemptionStatus, Reward,
    Transaction, TransactionStatus,
};
use crate::repository::{
    check_redemption_transition, RedemptionStore, RedemptionTransition, RefundOutcome,
    RefundPlan, StoreError, StoreResult,
};

#[async_trait]
impl RedemptionStore for PgStore {
    async fn reserve_reward(&self, reward_id: Uuid) -> StoreResult<Reward> {
        let mut conn = self.primary().await?;
        Reward::reserve_unit(&mut conn, reward_id).await
    }

    async fn release_reward(&self, reward_id: Uuid) -> StoreResult<()> {
        let mut conn = self.primary().await?;
        Reward::release_unit(&mut conn, reward_id).await
    }

    async fn insert_redemption(&self, new_redemption: NewRedemption) -> StoreResult<Redemption> {
        let mut conn = self.primary().await?;
        Redemption::create(&mut conn, new_redemption).await
    }

    async fn get_redemption(&self, redemption_id: Uuid) -> StoreResult<Redemption> {
        let mut conn = self.primary().await?;
        Redemption::find_by_id(&mut conn, redemption_id).await
    }

    async fn attach_redemption_transaction(
        &self,
        redemption_id: Uuid,
        transaction_id: Uuid,
    ) -> StoreResult<Redemption> {
        let mut conn = self.primary().await?;
        Redemption::attach_transaction(&mut conn, redemption_id, transaction_id).await
    }

    async fn transition_redemption(
        &self,
        redemption_id: Uuid,
        to: RedemptionStatus,
        refund: Option<RefundPlan>,
    ) -> StoreResult<RedemptionTransition> {
        let mut conn = self.primary().await?;

        conn.transaction::<_, StoreError, _>(|tx| {
            Box::pin(async move {
                let current = Redemption::find_for_update(tx, redemption_id).await?;
                let previous = current.status;

                if previous == to {
                    return Ok(RedemptionTransition {
                        redemption: current,
                        previous,
                        refund: None,
                    });
                }
                check_redemption_transition(previous, to)?;

                let mut outcome = None;
                if to == RedemptionStatus::Canceled && previous.refunds_on_cancel() {
                    let plan = refund.ok_or_else(|| {
                        StoreError::Validation("refund details required to cancel".to_string())
                    })?;
                    let movement = PointsMovement::earn(plan.points)?;

                    let mut refund_tx = plan.transaction;
                    refund_tx.status = TransactionStatus::Completed;
                    let transaction = Transaction::create(tx, refund_tx).await?;

                    let entry = PointsLedger::append_in_transaction(
                        tx,
                        current.merchant_customers_id,
                        transaction.program_id,
                        transaction.transaction_id,
                        movement,
                    )
                    .await?;

                    Reward::release_unit(tx, current.reward_id).await?;
                    outcome = Some(RefundOutcome { transaction, entry });
                }

                let redemption = Redemption::set_status(tx, redemption_id, to).await?;
                Ok(RedemptionTransition {
                    redemption,
                    previous,
                    refund: outcome,
                })
            })
        })
        .await
    }
}
