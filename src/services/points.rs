// Points engine: balance reads and earn/redeem against the ledger

use serde::Deserialize;
use std::sync::Arc;
use tracing::{info, instrument};
use uuid::Uuid;

use crate::models::{PointsLedger, PointsMovement};
use crate::repository::LedgerStore;
use crate::utils::ServiceError;

/// A direct earn or redeem request; `points` is always a positive magnitude
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct PointsRequest {
    pub customer_id: Uuid,
    pub program_id: Uuid,
    pub points: i64,
    pub transaction_id: Uuid,
}

#[derive(Clone)]
pub struct PointsService {
    ledger: Arc<dyn LedgerStore>,
}

impl PointsService {
    pub fn new(ledger: Arc<dyn LedgerStore>) -> Self {
        Self { ledger }
    }

    /// Balance of the latest entry, 0 when the pair has none
    pub async fn get_balance(&self, customer_id: Uuid, program_id: Uuid) -> Result<i64, ServiceError> {
        Ok(self.ledger.balance(customer_id, program_id).await?)
    }

    /// Full ledger for the pair, newest first
    pub async fn get_ledger(
        &self,
        customer_id: Uuid,
        program_id: Uuid,
    ) -> Result<Vec<PointsLedger>, ServiceError> {
        Ok(self.ledger.entries(customer_id, program_id).await?)
    }

    pub async fn entry_for_transaction(&self, transaction_id: Uuid) -> Result<PointsLedger, ServiceError> {
        Ok(self.ledger.entry_for_transaction(transaction_id).await?)
    }

    #[instrument(skip(self), fields(customer_id = %req.customer_id, program_id = %req.program_id))]
    pub async fn earn(&self, req: PointsRequest) -> Result<PointsLedger, ServiceError> {
        let movement = PointsMovement::earn(req.points)?;
        self.apply(req.customer_id, req.program_id, req.transaction_id, movement)
            .await
    }

    #[instrument(skip(self), fields(customer_id = %req.customer_id, program_id = %req.program_id))]
    pub async fn redeem(&self, req: PointsRequest) -> Result<PointsLedger, ServiceError> {
        let movement = PointsMovement::redeem(req.points)?;
        self.apply(req.customer_id, req.program_id, req.transaction_id, movement)
            .await
    }

    /// Append one movement; the store serializes it per (customer, program)
    pub async fn apply(
        &self,
        customer_id: Uuid,
        program_id: Uuid,
        transaction_id: Uuid,
        movement: PointsMovement,
    ) -> Result<PointsLedger, ServiceError> {
        let entry = self
            .ledger
            .append_entry(customer_id, program_id, transaction_id, movement)
            .await?;

        info!(
            ledger_id = %entry.ledger_id,
            transaction_id = %transaction_id,
            delta = movement.signed(),
            balance = entry.points_balance,
            "Ledger entry appended"
        );
        Ok(entry)
    }
}
