use async_trait::async_trait;
use uuid::Uuid;

use super::PgStore;
use crate::models::{PointsLedger, PointsMovement};
use crate::repository::{LedgerStore, StoreResult};

#[async_trait]
impl LedgerStore for PgStore {
    async fn balance(&self, customer_id: Uuid, program_id: Uuid) -> StoreResult<i64> {
        let mut conn = self.primary().await?;
        PointsLedger::latest_balance(&mut conn, customer_id, program_id).await
    }

    async fn entries(&self, customer_id: Uuid, program_id: Uuid) -> StoreResult<Vec<PointsLedger>> {
        let mut conn = self.replica().await?;
        PointsLedger::list_for_pair(&mut conn, customer_id, program_id).await
    }

    async fn entry_for_transaction(&self, transaction_id: Uuid) -> StoreResult<PointsLedger> {
        let mut conn = self.primary().await?;
        PointsLedger::find_by_transaction(&mut conn, transaction_id).await
    }

    async fn append_entry(
        &self,
        customer_id: Uuid,
        program_id: Uuid,
        transaction_id: Uuid,
        movement: PointsMovement,
    ) -> StoreResult<PointsLedger> {
        let mut conn = self.primary().await?;
        PointsLedger::append(&mut conn, customer_id, program_id, transaction_id, movement).await
    }
}
