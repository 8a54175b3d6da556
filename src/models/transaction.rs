// Monetary transactions
// Append-only: the status column is the only thing ever updated

use chrono::{DateTime, Utc};
use diesel::prelude::*;
use diesel_async::{AsyncPgConnection, RunQueryDsl};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::Amount;
use crate::repository::StoreError;
use crate::schema::transactions;

text_enum! {
    TransactionType {
        Purchase => "purchase",
        Refund => "refund",
        Bonus => "bonus",
        Redemption => "redemption",
    }
}

text_enum! {
    TransactionStatus {
        Pending => "pending",
        Completed => "completed",
        Failed => "failed",
        Canceled => "canceled",
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Queryable, Selectable, Identifiable)]
#[diesel(table_name = transactions)]
#[diesel(primary_key(transaction_id))]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct Transaction {
    pub transaction_id: Uuid,
    pub merchant_id: Uuid,
    pub merchant_customers_id: Uuid,
    pub program_id: Uuid,
    pub transaction_type: TransactionType,
    pub transaction_amount: Amount,
    pub transaction_date: DateTime<Utc>,
    pub branch_id: Option<Uuid>,
    pub status: TransactionStatus,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = transactions)]
pub struct NewTransaction {
    pub merchant_id: Uuid,
    pub merchant_customers_id: Uuid,
    pub program_id: Uuid,
    pub transaction_type: TransactionType,
    pub transaction_amount: Amount,
    pub transaction_date: DateTime<Utc>,
    pub branch_id: Option<Uuid>,
    pub status: TransactionStatus,
}

impl Transaction {
    pub async fn create(
        conn: &mut AsyncPgConnection,
        new_transaction: NewTransaction,
    ) -> Result<Self, StoreError> {
        use crate::schema::transactions::dsl::*;

        let transaction = diesel::insert_into(transactions)
            .values(&new_transaction)
            .returning(Transaction::as_returning())
            .get_result::<Transaction>(conn)
            .await?;

        Ok(transaction)
    }

    pub async fn find_by_id(
        conn: &mut AsyncPgConnection,
        id: Uuid,
    ) -> Result<Self, StoreError> {
        use crate::schema::transactions::dsl::*;

        transactions
            .filter(transaction_id.eq(id))
            .select(Transaction::as_select())
            .first::<Transaction>(conn)
            .await
            .map_err(|e| match e {
                diesel::result::Error::NotFound => StoreError::not_found("transaction"),
                _ => e.into(),
            })
    }

    /// The only permitted mutation
    pub async fn update_status(
        conn: &mut AsyncPgConnection,
        id: Uuid,
        new_status: TransactionStatus,
    ) -> Result<Self, StoreError> {
        use crate::schema::transactions::dsl::*;

        diesel::update(transactions.filter(transaction_id.eq(id)))
            .set(status.eq(new_status))
            .returning(Transaction::as_returning())
            .get_result::<Transaction>(conn)
            .await
            .map_err(|e| match e {
                diesel::result::Error::NotFound => StoreError::not_found("transaction"),
                _ => e.into(),
            })
    }

    /// Newest first
    pub async fn list_for_customer(
        conn: &mut AsyncPgConnection,
        customer_id: Uuid,
        limit: i64,
        offset: i64,
    ) -> Result<(Vec<Self>, i64), StoreError> {
        use crate::schema::transactions::dsl::*;

        let total: i64 = transactions
            .filter(merchant_customers_id.eq(customer_id))
            .count()
            .get_result(conn)
            .await?;

        let page = transactions
            .filter(merchant_customers_id.eq(customer_id))
            .order((created_at.desc(), transaction_id.desc()))
            .limit(limit)
            .offset(offset)
            .select(Transaction::as_select())
            .load::<Transaction>(conn)
            .await?;

        Ok((page, total))
    }

    pub async fn count_for_customer_program(
        conn: &mut AsyncPgConnection,
        customer_id: Uuid,
        program_id_val: Uuid,
    ) -> Result<i64, StoreError> {
        use crate::schema::transactions::dsl::*;

        let count = transactions
            .filter(merchant_customers_id.eq(customer_id))
            .filter(program_id.eq(program_id_val))
            .count()
            .get_result(conn)
            .await?;

        Ok(count)
    }
}
