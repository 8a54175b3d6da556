// Rewards and the redemptions made against them

use chrono::{DateTime, Utc};
use diesel::prelude::*;
use diesel_async::{AsyncPgConnection, RunQueryDsl};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::repository::StoreError;
use crate::schema::{redemptions, rewards};

text_enum! {
    RedemptionStatus {
        Pending => "pending",
        Completed => "completed",
        Failed => "failed",
        Canceled => "canceled",
    }
}

impl RedemptionStatus {
    /// Statuses whose points have left the ledger
    pub fn holds_points(&self) -> bool {
        matches!(self, RedemptionStatus::Pending | RedemptionStatus::Completed)
    }

    /// Only a pending redemption gets its points back when canceled
    pub fn refunds_on_cancel(&self) -> bool {
        *self == RedemptionStatus::Pending
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Queryable, Selectable, Identifiable)]
#[diesel(table_name = rewards)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct Reward {
    pub id: Uuid,
    pub program_id: Uuid,
    pub name: String,
    pub description: String,
    pub points_required: i64,
    pub quantity: i32,
    pub available_quantity: Option<i32>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = rewards)]
pub struct NewReward {
    pub program_id: Uuid,
    pub name: String,
    pub description: String,
    pub points_required: i64,
    pub quantity: i32,
    pub available_quantity: Option<i32>,
    pub is_active: bool,
}

#[derive(
    Debug, Clone, PartialEq, Serialize, Deserialize, Queryable, QueryableByName, Selectable, Identifiable,
)]
#[diesel(table_name = redemptions)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct Redemption {
    pub id: Uuid,
    pub merchant_customers_id: Uuid,
    pub reward_id: Uuid,
    pub points_used: i64,
    pub redemption_date: DateTime<Utc>,
    pub status: RedemptionStatus,
    pub transaction_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = redemptions)]
pub struct NewRedemption {
    pub merchant_customers_id: Uuid,
    pub reward_id: Uuid,
    pub points_used: i64,
    pub redemption_date: DateTime<Utc>,
    pub status: RedemptionStatus,
}

impl Reward {
    /// Active and, when stock is tracked, not sold out
    pub fn is_available(&self) -> bool {
        self.is_active && self.available_quantity.map_or(true, |left| left > 0)
    }

    pub async fn create(
        conn: &mut AsyncPgConnection,
        new_reward: NewReward,
    ) -> Result<Self, StoreError> {
        use crate::schema::rewards::dsl::*;

        let reward = diesel::insert_into(rewards)
            .values(&new_reward)
            .returning(Reward::as_returning())
            .get_result::<Reward>(conn)
            .await?;

        Ok(reward)
    }

    pub async fn find_by_id(
        conn: &mut AsyncPgConnection,
        reward_id: Uuid,
    ) -> Result<Self, StoreError> {
        use crate::schema::rewards::dsl::*;

        rewards
            .filter(id.eq(reward_id))
            .select(Reward::as_select())
            .first::<Reward>(conn)
            .await
            .map_err(|e| match e {
                diesel::result::Error::NotFound => StoreError::not_found("reward"),
                _ => e.into(),
            })
    }

    /// Take one unit of stock; untracked stock is left alone
    pub async fn reserve_unit(
        conn: &mut AsyncPgConnection,
        reward_id: Uuid,
    ) -> Result<Self, StoreError> {
        use crate::schema::rewards::dsl::*;

        let reward = Self::find_by_id(conn, reward_id).await?;
        if !reward.is_active {
            return Err(StoreError::RewardUnavailable);
        }
        if reward.available_quantity.is_none() {
            return Ok(reward);
        }

        diesel::update(
            rewards
                .filter(id.eq(reward_id))
                .filter(is_active.eq(true))
                .filter(available_quantity.gt(0)),
        )
        .set((
            available_quantity.eq(available_quantity - 1),
            updated_at.eq(Utc::now()),
        ))
        .returning(Reward::as_returning())
        .get_result::<Reward>(conn)
        .await
        .map_err(|e| match e {
            diesel::result::Error::NotFound => StoreError::RewardUnavailable,
            _ => e.into(),
        })
    }

    /// Give a unit back after a failed or canceled redemption
    pub async fn release_unit(
        conn: &mut AsyncPgConnection,
        reward_id: Uuid,
    ) -> Result<(), StoreError> {
        use crate::schema::rewards::dsl::*;

        diesel::update(
            rewards
                .filter(id.eq(reward_id))
                .filter(available_quantity.is_not_null()),
        )
        .set((
            available_quantity.eq(available_quantity + 1),
            updated_at.eq(Utc::now()),
        ))
        .execute(conn)
        .await?;

        Ok(())
    }
}

impl Redemption {
    pub async fn create(
        conn: &mut AsyncPgConnection,
        new_redemption: NewRedemption,
    ) -> Result<Self, StoreError> {
        use crate::schema::redemptions::dsl::*;

        let redemption = diesel::insert_into(redemptions)
            .values(&new_redemption)
            .returning(Redemption::as_returning())
            .get_result::<Redemption>(conn)
            .await?;

        Ok(redemption)
    }

    pub async fn find_by_id(
        conn: &mut AsyncPgConnection,
        redemption_id: Uuid,
    ) -> Result<Self, StoreError> {
        use crate::schema::redemptions::dsl::*;

        redemptions
            .filter(id.eq(redemption_id))
            .select(Redemption::as_select())
            .first::<Redemption>(conn)
            .await
            .map_err(|e| match e {
                diesel::result::Error::NotFound => StoreError::not_found("redemption"),
                _ => e.into(),
            })
    }

    /// Row-locked read; only meaningful inside a transaction
    pub async fn find_for_update(
        tx: &mut AsyncPgConnection,
        redemption_id: Uuid,
    ) -> Result<Self, StoreError> {
        use diesel::sql_query;
        use diesel::sql_types::Uuid as SqlUuid;

        sql_query(
            "SELECT id, merchant_customers_id, reward_id, points_used, redemption_date, \
             status, transaction_id, created_at, updated_at \
             FROM redemptions \
             WHERE id = $1 \
             FOR UPDATE",
        )
        .bind::<SqlUuid, _>(redemption_id)
        .get_result::<Redemption>(tx)
        .await
        .map_err(|e| match e {
            diesel::result::Error::NotFound => StoreError::not_found("redemption"),
            _ => e.into(),
        })
    }

    pub async fn set_status(
        conn: &mut AsyncPgConnection,
        redemption_id: Uuid,
        new_status: RedemptionStatus,
    ) -> Result<Self, StoreError> {
        use crate::schema::redemptions::dsl::*;

        diesel::update(redemptions.filter(id.eq(redemption_id)))
            .set((status.eq(new_status), updated_at.eq(Utc::now())))
            .returning(Redemption::as_returning())
            .get_result::<Redemption>(conn)
            .await
            .map_err(|e| match e {
                diesel::result::Error::NotFound => StoreError::not_found("redemption"),
                _ => e.into(),
            })
    }

    pub async fn attach_transaction(
        conn: &mut AsyncPgConnection,
        redemption_id: Uuid,
        transaction: Uuid,
    ) -> Result<Self, StoreError> {
        use crate::schema::redemptions::dsl::*;

        diesel::update(redemptions.filter(id.eq(redemption_id)))
            .set((transaction_id.eq(Some(transaction)), updated_at.eq(Utc::now())))
            .returning(Redemption::as_returning())
            .get_result::<Redemption>(conn)
            .await
            .map_err(|e| match e {
                diesel::result::Error::NotFound => StoreError::not_found("redemption"),
                _ => e.into(),
            })
    }
}
