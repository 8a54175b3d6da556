// Transaction pipeline
// Persist the transaction, price it with the points policy, apply the ledger
// effect, then log the event in the background.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::models::{
    Amount, NewTransaction, PaginatedResponse, Pagination, PointsLedger, PointsMovement,
    Transaction, TransactionStatus, TransactionType,
};
use crate::repository::{CatalogStore, TransactionStore};
use crate::services::event_emitter::{self, EventEmitter};
use crate::services::points::PointsService;
use crate::services::points_policy::{PointsPolicy, TransactionContext};
use crate::utils::ServiceError;

#[derive(Debug, Clone, Deserialize)]
pub struct CreateTransactionRequest {
    pub merchant_customers_id: Uuid,
    pub program_id: Uuid,
    pub transaction_type: TransactionType,
    pub transaction_amount: Amount,
    pub transaction_date: Option<DateTime<Utc>>,
    pub branch_id: Option<Uuid>,
}

#[derive(Debug, Clone, Serialize)]
pub struct TransactionOutcome {
    pub transaction: Transaction,
    pub points_delta: i64,
    pub ledger_entry: Option<PointsLedger>,
}

#[derive(Clone)]
pub struct TransactionService {
    catalog: Arc<dyn CatalogStore>,
    transactions: Arc<dyn TransactionStore>,
    points: PointsService,
    policy: Arc<dyn PointsPolicy>,
    events: EventEmitter,
}

impl TransactionService {
    pub fn new(
        catalog: Arc<dyn CatalogStore>,
        transactions: Arc<dyn TransactionStore>,
        points: PointsService,
        policy: Arc<dyn PointsPolicy>,
        events: EventEmitter,
    ) -> Self {
        Self {
            catalog,
            transactions,
            points,
            policy,
            events,
        }
    }

    #[instrument(skip(self, req), fields(customer_id = %req.merchant_customers_id, kind = %req.transaction_type))]
    pub async fn create_transaction(
        &self,
        req: CreateTransactionRequest,
    ) -> Result<TransactionOutcome, ServiceError> {
        if req.transaction_amount.is_zero() {
            return Err(ServiceError::Validation(
                "transaction amount must be greater than zero".to_string(),
            ));
        }

        let customer = self.catalog.get_customer(req.merchant_customers_id).await?;
        let program = self.catalog.get_program(req.program_id).await?;
        if program.merchant_id != customer.merchant_id {
            return Err(ServiceError::Validation(
                "program does not belong to the customer's merchant".to_string(),
            ));
        }

        let transaction = self
            .transactions
            .insert_transaction(NewTransaction {
                merchant_id: customer.merchant_id,
                merchant_customers_id: customer.id,
                program_id: program.id,
                transaction_type: req.transaction_type,
                transaction_amount: req.transaction_amount,
                transaction_date: req.transaction_date.unwrap_or_else(Utc::now),
                branch_id: req.branch_id,
                status: TransactionStatus::Pending,
            })
            .await?;

        let ctx = TransactionContext {
            transaction: transaction.clone(),
            customer,
            now: Utc::now(),
        };

        let (points_delta, ledger_entry) = match self.apply_points(&ctx).await {
            Ok(applied) => applied,
            Err(e) => {
                self.mark_failed(transaction.transaction_id).await;
                return Err(e);
            },
        };

        let transaction = self
            .transactions
            .update_transaction_status(transaction.transaction_id, TransactionStatus::Completed)
            .await?;

        info!(
            transaction_id = %transaction.transaction_id,
            points_delta,
            "Transaction completed"
        );
        self.events
            .emit(event_emitter::transaction_created(&transaction, points_delta));

        Ok(TransactionOutcome {
            transaction,
            points_delta,
            ledger_entry,
        })
    }

    async fn apply_points(
        &self,
        ctx: &TransactionContext,
    ) -> Result<(i64, Option<PointsLedger>), ServiceError> {
        let delta = self.policy.points_delta(ctx).await?;
        let entry = match PointsMovement::from_delta(delta) {
            Some(movement) => Some(
                self.points
                    .apply(
                        ctx.transaction.merchant_customers_id,
                        ctx.transaction.program_id,
                        ctx.transaction.transaction_id,
                        movement,
                    )
                    .await?,
            ),
            None => None,
        };
        Ok((delta, entry))
    }

    async fn mark_failed(&self, transaction_id: Uuid) {
        if let Err(e) = self
            .transactions
            .update_transaction_status(transaction_id, TransactionStatus::Failed)
            .await
        {
            warn!(%transaction_id, "Failed to mark transaction failed: {}", e);
        }
    }

    pub async fn get_transaction(&self, transaction_id: Uuid) -> Result<Transaction, ServiceError> {
        Ok(self.transactions.get_transaction(transaction_id).await?)
    }

    /// Status is the only column that ever changes
    pub async fn update_status(
        &self,
        transaction_id: Uuid,
        status: TransactionStatus,
    ) -> Result<Transaction, ServiceError> {
        Ok(self
            .transactions
            .update_transaction_status(transaction_id, status)
            .await?)
    }

    pub async fn list_for_customer(
        &self,
        customer_id: Uuid,
        pagination: Pagination,
    ) -> Result<PaginatedResponse<Transaction>, ServiceError> {
        self.catalog.get_customer(customer_id).await?;
        let (data, total) = self
            .transactions
            .list_customer_transactions(customer_id, pagination)
            .await?;
        Ok(PaginatedResponse::new(data, total, pagination))
    }
}
