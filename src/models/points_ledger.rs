// Points ledger
// Append-only, one balance-carrying entry per earn or redeem. Entries for a
// (customer, program) pair are totally ordered by `entry_seq`.

use chrono::{DateTime, Utc};
use diesel::prelude::*;
use diesel_async::{AsyncPgConnection, RunQueryDsl};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::repository::StoreError;
use crate::schema::points_ledger;

/// Which side of the ledger an entry lands on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PointsDirection {
    Earn,
    Redeem,
}

/// A points magnitude paired with its direction; the magnitude is always positive
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PointsMovement {
    pub direction: PointsDirection,
    pub points: i64,
}

impl PointsMovement {
    pub fn earn(points: i64) -> Result<Self, StoreError> {
        Self::new(PointsDirection::Earn, points)
    }

    pub fn redeem(points: i64) -> Result<Self, StoreError> {
        Self::new(PointsDirection::Redeem, points)
    }

    pub fn new(direction: PointsDirection, points: i64) -> Result<Self, StoreError> {
        if points <= 0 {
            return Err(StoreError::Validation(
                "points must be greater than zero".to_string(),
            ));
        }
        Ok(Self { direction, points })
    }

    /// Split a signed delta; zero yields no movement
    pub fn from_delta(delta: i64) -> Option<Self> {
        match delta {
            d if d > 0 => Some(Self { direction: PointsDirection::Earn, points: d }),
            d if d < 0 => Some(Self {
                direction: PointsDirection::Redeem,
                points: d.checked_neg().unwrap_or(i64::MAX),
            }),
            _ => None,
        }
    }

    pub fn signed(&self) -> i64 {
        match self.direction {
            PointsDirection::Earn => self.points,
            PointsDirection::Redeem => -self.points,
        }
    }

    /// Balance after applying this movement, or the shortfall error
    pub fn apply_to(&self, current: i64) -> Result<i64, StoreError> {
        match self.direction {
            PointsDirection::Earn => current
                .checked_add(self.points)
                .ok_or_else(|| StoreError::Validation("points balance overflow".to_string())),
            PointsDirection::Redeem if current < self.points => {
                Err(StoreError::InsufficientPoints {
                    available: current,
                    requested: self.points,
                })
            },
            PointsDirection::Redeem => Ok(current - self.points),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Queryable, Selectable, Identifiable)]
#[diesel(table_name = points_ledger)]
#[diesel(primary_key(ledger_id))]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct PointsLedger {
    pub ledger_id: Uuid,
    #[serde(skip)]
    pub entry_seq: i64,
    pub merchant_customers_id: Uuid,
    pub program_id: Uuid,
    pub points_earned: i64,
    pub points_redeemed: i64,
    pub points_balance: i64,
    pub transaction_id: Uuid,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = points_ledger)]
pub struct NewLedgerEntry {
    pub merchant_customers_id: Uuid,
    pub program_id: Uuid,
    pub points_earned: i64,
    pub points_redeemed: i64,
    pub points_balance: i64,
    pub transaction_id: Uuid,
}

impl NewLedgerEntry {
    /// Build the entry that moves `current` by `movement`
    pub fn for_movement(
        customer_id: Uuid,
        program_id: Uuid,
        transaction_id: Uuid,
        movement: PointsMovement,
        current: i64,
    ) -> Result<Self, StoreError> {
        let balance = movement.apply_to(current)?;
        let (earned, redeemed) = match movement.direction {
            PointsDirection::Earn => (movement.points, 0),
            PointsDirection::Redeem => (0, movement.points),
        };

        Ok(Self {
            merchant_customers_id: customer_id,
            program_id,
            points_earned: earned,
            points_redeemed: redeemed,
            points_balance: balance,
            transaction_id,
        })
    }
}

impl PointsLedger {
    /// Advisory lock key for a (customer, program) pair
    pub fn lock_key(customer_id: Uuid, program_id: Uuid) -> String {
        format!("{}:{}", customer_id, program_id)
    }

    /// Balance carried by the latest entry, 0 when the pair has none
    pub async fn latest_balance(
        conn: &mut AsyncPgConnection,
        customer_id: Uuid,
        program_id_val: Uuid,
    ) -> Result<i64, StoreError> {
        use crate::schema::points_ledger::dsl::*;

        let balance = points_ledger
            .filter(merchant_customers_id.eq(customer_id))
            .filter(program_id.eq(program_id_val))
            .order(entry_seq.desc())
            .select(points_balance)
            .first::<i64>(conn)
            .await
            .optional()?;

        Ok(balance.unwrap_or(0))
    }

    /// Full history for the pair, newest first
    pub async fn list_for_pair(
        conn: &mut AsyncPgConnection,
        customer_id: Uuid,
        program_id_val: Uuid,
    ) -> Result<Vec<Self>, StoreError> {
        use crate::schema::points_ledger::dsl::*;

        let entries = points_ledger
            .filter(merchant_customers_id.eq(customer_id))
            .filter(program_id.eq(program_id_val))
            .order(entry_seq.desc())
            .select(PointsLedger::as_select())
            .load::<PointsLedger>(conn)
            .await?;

        Ok(entries)
    }

    pub async fn find_by_transaction(
        conn: &mut AsyncPgConnection,
        transaction_id_val: Uuid,
    ) -> Result<Self, StoreError> {
        use crate::schema::points_ledger::dsl::*;

        points_ledger
            .filter(transaction_id.eq(transaction_id_val))
            .order(entry_seq.desc())
            .select(PointsLedger::as_select())
            .first::<PointsLedger>(conn)
            .await
            .map_err(|e| match e {
                diesel::result::Error::NotFound => StoreError::not_found("ledger entry"),
                _ => e.into(),
            })
    }

    /// Serialize on the pair's advisory lock, then read the balance and append.
    /// Runs on the caller's open transaction; the lock is released at commit.
    pub async fn append_in_transaction(
        tx: &mut AsyncPgConnection,
        customer_id: Uuid,
        program_id_val: Uuid,
        transaction_id_val: Uuid,
        movement: PointsMovement,
    ) -> Result<Self, StoreError> {
        use diesel::sql_query;
        use diesel::sql_types::Text;

        sql_query("SELECT pg_advisory_xact_lock(hashtextextended($1, 0))")
            .bind::<Text, _>(Self::lock_key(customer_id, program_id_val))
            .execute(tx)
            .await?;

        let current = Self::latest_balance(tx, customer_id, program_id_val).await?;
        let entry = NewLedgerEntry::for_movement(
            customer_id,
            program_id_val,
            transaction_id_val,
            movement,
            current,
        )?;

        let inserted = diesel::insert_into(crate::schema::points_ledger::table)
            .values(&entry)
            .returning(PointsLedger::as_returning())
            .get_result::<PointsLedger>(tx)
            .await
            .map_err(|e| match e {
                diesel::result::Error::DatabaseError(
                    diesel::result::DatabaseErrorKind::ForeignKeyViolation,
                    _,
                ) => StoreError::not_found("transaction"),
                _ => e.into(),
            })?;

        Ok(inserted)
    }

    /// `append_in_transaction` wrapped in its own transaction
    pub async fn append(
        conn: &mut AsyncPgConnection,
        customer_id: Uuid,
        program_id_val: Uuid,
        transaction_id_val: Uuid,
        movement: PointsMovement,
    ) -> Result<Self, StoreError> {
        use diesel_async::AsyncConnection;

        conn.transaction::<_, StoreError, _>(|tx| {
            Box::pin(async move {
                Self::append_in_transaction(
                    tx,
                    customer_id,
                    program_id_val,
                    transaction_id_val,
                    movement,
                )
                .await
            })
        })
        .await
    }
}
