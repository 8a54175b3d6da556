// Merchants (tenants) and the customers scoped to them

use chrono::{DateTime, Utc};
use diesel::prelude::*;
use diesel_async::{AsyncPgConnection, RunQueryDsl};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::repository::StoreError;
use crate::schema::{merchant_customers, merchants};

text_enum! {
    MerchantType {
        Bank => "bank",
        Ecommerce => "ecommerce",
        RepairShop => "repair_shop",
    }
}

text_enum! {
    MerchantStatus {
        Active => "active",
        Deactivated => "deactivated",
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Queryable, Selectable, Identifiable)]
#[diesel(table_name = merchants)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct Merchant {
    pub id: Uuid,
    pub user_id: Uuid,
    pub name: String,
    pub merchant_type: MerchantType,
    pub status: MerchantStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = merchants)]
pub struct NewMerchant {
    pub user_id: Uuid,
    pub name: String,
    pub merchant_type: MerchantType,
    pub status: MerchantStatus,
}

#[derive(Debug, Clone, Serialize, Deserialize, Queryable, Selectable, Identifiable)]
#[diesel(table_name = merchant_customers)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct MerchantCustomer {
    pub id: Uuid,
    pub merchant_id: Uuid,
    pub email: String,
    pub phone: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = merchant_customers)]
pub struct NewMerchantCustomer {
    pub merchant_id: Uuid,
    pub email: String,
    pub phone: String,
    pub password_hash: String,
    pub name: String,
}

impl Merchant {
    /// Insert a merchant while holding the owner's row lock, so the
    /// per-owner limit cannot be raced past
    pub async fn create_within_limit(
        conn: &mut AsyncPgConnection,
        new_merchant: NewMerchant,
        limit: i64,
    ) -> Result<Self, StoreError> {
        use diesel_async::AsyncConnection;

        conn.transaction::<_, StoreError, _>(|tx| {
            Box::pin(async move {
                use crate::schema::merchants::dsl::*;
                use crate::schema::users;

                users::table
                    .filter(users::id.eq(new_merchant.user_id))
                    .select(users::id)
                    .for_update()
                    .first::<Uuid>(tx)
                    .await
                    .map_err(|e| match e {
                        diesel::result::Error::NotFound => StoreError::not_found("user"),
                        _ => e.into(),
                    })?;

                let owned: i64 = merchants
                    .filter(user_id.eq(new_merchant.user_id))
                    .count()
                    .get_result(tx)
                    .await?;
                if owned >= limit {
                    return Err(StoreError::MerchantLimitReached { limit });
                }

                diesel::insert_into(merchants)
                    .values(&new_merchant)
                    .returning(Merchant::as_returning())
                    .get_result::<Merchant>(tx)
                    .await
                    .map_err(|e| match StoreError::from(e) {
                        StoreError::Conflict(_) => StoreError::Conflict(
                            "merchant name already used by this owner".to_string(),
                        ),
                        other => other,
                    })
            })
        })
        .await
    }

    pub async fn find_by_id(
        conn: &mut AsyncPgConnection,
        merchant_id: Uuid,
    ) -> Result<Self, StoreError> {
        use crate::schema::merchants::dsl::*;

        merchants
            .filter(id.eq(merchant_id))
            .select(Merchant::as_select())
            .first::<Merchant>(conn)
            .await
            .map_err(|e| match e {
                diesel::result::Error::NotFound => StoreError::not_found("merchant"),
                _ => e.into(),
            })
    }
}

impl MerchantCustomer {
    pub async fn create(
        conn: &mut AsyncPgConnection,
        new_customer: NewMerchantCustomer,
    ) -> Result<Self, StoreError> {
        use crate::schema::merchant_customers::dsl::*;

        diesel::insert_into(merchant_customers)
            .values(&new_customer)
            .returning(MerchantCustomer::as_returning())
            .get_result::<MerchantCustomer>(conn)
            .await
            .map_err(|e| match StoreError::from(e) {
                StoreError::Conflict(_) => {
                    StoreError::Conflict("customer email or phone already registered".to_string())
                },
                other => other,
            })
    }

    pub async fn find_by_id(
        conn: &mut AsyncPgConnection,
        customer_id: Uuid,
    ) -> Result<Self, StoreError> {
        use crate::schema::merchant_customers::dsl::*;

        merchant_customers
            .filter(id.eq(customer_id))
            .select(MerchantCustomer::as_select())
            .first::<MerchantCustomer>(conn)
            .await
            .map_err(|e| match e {
                diesel::result::Error::NotFound => StoreError::not_found("customer"),
                _ => e.into(),
            })
    }
}
