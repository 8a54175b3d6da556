// Registration OTP verifications
// Several may be outstanding per user; the newest matching row wins

use chrono::{DateTime, Utc};
use diesel::prelude::*;
use diesel_async::{AsyncPgConnection, RunQueryDsl};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::repository::StoreError;
use crate::schema::registration_verifications;

#[derive(Debug, Clone, Serialize, Deserialize, Queryable, Selectable, Identifiable)]
#[diesel(table_name = registration_verifications)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct RegistrationVerification {
    pub id: Uuid,
    pub user_id: Uuid,
    #[serde(skip_serializing)]
    pub otp: String,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub used_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = registration_verifications)]
pub struct NewRegistrationVerification {
    pub user_id: Uuid,
    pub otp: String,
    pub expires_at: DateTime<Utc>,
}

impl RegistrationVerification {
    pub fn is_used(&self) -> bool {
        self.used_at.is_some()
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }

    pub async fn create(
        conn: &mut AsyncPgConnection,
        new_verification: NewRegistrationVerification,
    ) -> Result<Self, StoreError> {
        use crate::schema::registration_verifications::dsl::*;

        let verification = diesel::insert_into(registration_verifications)
            .values(&new_verification)
            .returning(RegistrationVerification::as_returning())
            .get_result::<RegistrationVerification>(conn)
            .await?;

        Ok(verification)
    }

    /// Newest verification for the user carrying this OTP
    pub async fn find_by_user_and_otp(
        conn: &mut AsyncPgConnection,
        user_id_val: Uuid,
        otp_val: &str,
    ) -> Result<Self, StoreError> {
        use crate::schema::registration_verifications::dsl::*;

        registration_verifications
            .filter(user_id.eq(user_id_val))
            .filter(otp.eq(otp_val))
            .order(created_at.desc())
            .select(RegistrationVerification::as_select())
            .first::<RegistrationVerification>(conn)
            .await
            .map_err(|e| match e {
                diesel::result::Error::NotFound => StoreError::not_found("verification"),
                _ => e.into(),
            })
    }

    /// Newest verification issued to the user, used or not
    pub async fn find_latest_for_user(
        conn: &mut AsyncPgConnection,
        user_id_val: Uuid,
    ) -> Result<Option<Self>, StoreError> {
        use crate::schema::registration_verifications::dsl::*;

        let verification = registration_verifications
            .filter(user_id.eq(user_id_val))
            .order(created_at.desc())
            .select(RegistrationVerification::as_select())
            .first::<RegistrationVerification>(conn)
            .await
            .optional()?;

        Ok(verification)
    }

    /// Set `used_at` only if it is still NULL; zero rows means already consumed
    pub async fn mark_used(conn: &mut AsyncPgConnection, verification_id: Uuid) -> Result<(), StoreError> {
        Self::mark_used_in_transaction(conn, verification_id).await
    }

    /// Same as `mark_used`, but runs on the caller's open transaction
    pub async fn mark_used_in_transaction(
        tx: &mut AsyncPgConnection,
        verification_id: Uuid,
    ) -> Result<(), StoreError> {
        use crate::schema::registration_verifications::dsl::*;

        let updated = diesel::update(
            registration_verifications
                .filter(id.eq(verification_id))
                .filter(used_at.is_null()),
        )
        .set(used_at.eq(Some(Utc::now())))
        .execute(tx)
        .await?;

        if updated == 0 {
            return Err(StoreError::not_found("unused verification"));
        }
        Ok(())
    }

    /// Delete unused verifications past their expiry
    pub async fn delete_expired(conn: &mut AsyncPgConnection) -> Result<usize, StoreError> {
        use crate::schema::registration_verifications::dsl::*;

        let deleted = diesel::delete(
            registration_verifications
                .filter(expires_at.lt(Utc::now()))
                .filter(used_at.is_null()),
        )
        .execute(conn)
        .await?;

        Ok(deleted)
    }
}
