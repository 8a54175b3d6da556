// Login attempt counters, one row per email

use chrono::{DateTime, Utc};
use diesel::prelude::*;
use diesel_async::{AsyncPgConnection, RunQueryDsl};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::repository::StoreError;
use crate::schema::login_attempts;

#[derive(
    Debug, Clone, Serialize, Deserialize, Queryable, QueryableByName, Selectable, Identifiable,
)]
#[diesel(table_name = login_attempts)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct LoginAttempt {
    pub id: Uuid,
    pub email: String,
    pub attempt_count: i32,
    pub last_attempt_at: DateTime<Utc>,
    pub locked_until: Option<DateTime<Utc>>,
}

impl LoginAttempt {
    pub fn is_locked_at(&self, now: DateTime<Utc>) -> bool {
        self.locked_until.map(|until| until > now).unwrap_or(false)
    }

    /// Atomic per-email upsert: increment, or reset count and lock
    pub async fn record(
        conn: &mut AsyncPgConnection,
        email: &str,
        increment: bool,
    ) -> Result<Self, StoreError> {
        use diesel::sql_query;
        use diesel::sql_types::{Bool, Text};

        let attempt = sql_query(
            "INSERT INTO login_attempts (email, attempt_count, last_attempt_at) \
             VALUES ($1, CASE WHEN $2 THEN 1 ELSE 0 END, NOW()) \
             ON CONFLICT (email) DO UPDATE SET \
                attempt_count = CASE WHEN $2 THEN login_attempts.attempt_count + 1 ELSE 0 END, \
                locked_until = CASE WHEN $2 THEN login_attempts.locked_until ELSE NULL END, \
                last_attempt_at = NOW() \
             RETURNING id, email, attempt_count, last_attempt_at, locked_until",
        )
        .bind::<Text, _>(email)
        .bind::<Bool, _>(increment)
        .get_result::<LoginAttempt>(conn)
        .await?;

        Ok(attempt)
    }

    pub async fn find_by_email(
        conn: &mut AsyncPgConnection,
        email_val: &str,
    ) -> Result<Option<Self>, StoreError> {
        use crate::schema::login_attempts::dsl::*;

        let attempt = login_attempts
            .filter(email.eq(email_val))
            .select(LoginAttempt::as_select())
            .first::<LoginAttempt>(conn)
            .await
            .optional()?;

        Ok(attempt)
    }

    pub async fn set_lockout(
        conn: &mut AsyncPgConnection,
        email_val: &str,
        until: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        use crate::schema::login_attempts::dsl::*;

        diesel::update(login_attempts.filter(email.eq(email_val)))
            .set(locked_until.eq(Some(until)))
            .execute(conn)
            .await?;

        Ok(())
    }

    /// Delete counters whose last attempt predates `cutoff`
    pub async fn delete_stale(
        conn: &mut AsyncPgConnection,
        cutoff: DateTime<Utc>,
    ) -> Result<usize, StoreError> {
        use crate::schema::login_attempts::dsl::*;

        let deleted = diesel::delete(login_attempts.filter(last_attempt_at.lt(cutoff)))
            .execute(conn)
            .await?;

        Ok(deleted)
    }
}
