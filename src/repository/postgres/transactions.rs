use async_trait::async_trait;
use uuid::Uuid;

use super::PgStore;
use crate::models::{NewTransaction, Pagination, Transaction, TransactionStatus};
use crate::repository::{StoreResult, TransactionStore};

#[async_trait]
impl TransactionStore for PgStore {
    async fn insert_transaction(&self, new_transaction: NewTransaction) -> StoreResult<Transaction> {
        let mut conn = self.primary().await?;
        Transaction::create(&mut conn, new_transaction).await
    }

    async fn get_transaction(&self, transaction_id: Uuid) -> StoreResult<Transaction> {
        let mut conn = self.primary().await?;
        Transaction::find_by_id(&mut conn, transaction_id).await
    }

    async fn update_transaction_status(
        &self,
        transaction_id: Uuid,
        status: TransactionStatus,
    ) -> StoreResult<Transaction> {
        let mut conn = self.primary().await?;
        Transaction::update_status(&mut conn, transaction_id, status).await
    }

    async fn list_customer_transactions(
        &self,
        customer_id: Uuid,
        pagination: Pagination,
    ) -> StoreResult<(Vec<Transaction>, i64)> {
        let mut conn = self.replica().await?;
        Transaction::list_for_customer(&mut conn, customer_id, pagination.limit, pagination.offset())
            .await
    }

    async fn count_customer_program_transactions(
        &self,
        customer_id: Uuid,
        program_id: Uuid,
    ) -> StoreResult<i64> {
        let mut conn = self.replica().await?;
        Transaction::count_for_customer_program(&mut conn, customer_id, program_id).await
    }
}
