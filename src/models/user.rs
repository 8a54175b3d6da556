// User Database Model
// Operators of the loyalty platform; created pending, activated by OTP

use chrono::{DateTime, Utc};
use diesel::prelude::*;
use diesel_async::{AsyncPgConnection, RunQueryDsl};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::repository::StoreError;
use crate::schema::users;

text_enum! {
    /// Account lifecycle status
    UserStatus {
        Pending => "pending",
        Active => "active",
        Locked => "locked",
        Banned => "banned",
    }
}

/// User database model - queryable from database
#[derive(Debug, Clone, Serialize, Deserialize, Queryable, Selectable, Identifiable)]
#[diesel(table_name = users)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct User {
    pub id: Uuid,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub name: String,
    pub phone: String,
    pub status: UserStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// New user for insertion
#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = users)]
pub struct NewUser {
    pub email: String,
    pub password_hash: String,
    pub name: String,
    pub phone: String,
    pub status: UserStatus,
}

impl User {
    pub fn is_active(&self) -> bool {
        self.status == UserStatus::Active
    }

    /// Find user by ID
    pub async fn find_by_id(
        conn: &mut AsyncPgConnection,
        user_id: Uuid,
    ) -> Result<Self, StoreError> {
        use crate::schema::users::dsl::*;

        users
            .filter(id.eq(user_id))
            .select(User::as_select())
            .first::<User>(conn)
            .await
            .map_err(|e| match e {
                diesel::result::Error::NotFound => StoreError::not_found("user"),
                _ => e.into(),
            })
    }

    /// Find user by email; callers pass the normalized (lowercase) address
    pub async fn find_by_email(
        conn: &mut AsyncPgConnection,
        email_str: &str,
    ) -> Result<Option<Self>, StoreError> {
        use crate::schema::users::dsl::*;

        let user = users
            .filter(email.eq(email_str))
            .select(User::as_select())
            .first::<User>(conn)
            .await
            .optional()?;

        Ok(user)
    }

    /// Create a new user
    pub async fn create(
        conn: &mut AsyncPgConnection,
        new_user: NewUser,
    ) -> Result<Self, StoreError> {
        use crate::schema::users::dsl::*;

        diesel::insert_into(users)
            .values(&new_user)
            .returning(User::as_returning())
            .get_result::<User>(conn)
            .await
            .map_err(|e| match StoreError::from(e) {
                StoreError::Conflict(_) => {
                    StoreError::Conflict("email or phone already registered".to_string())
                },
                other => other,
            })
    }

    pub async fn update_password_hash(
        conn: &mut AsyncPgConnection,
        user_id: Uuid,
        new_hash: &str,
    ) -> Result<(), StoreError> {
        use crate::schema::users::dsl::*;

        let updated = diesel::update(users.filter(id.eq(user_id)))
            .set((password_hash.eq(new_hash), updated_at.eq(Utc::now())))
            .execute(conn)
            .await?;

        if updated == 0 {
            return Err(StoreError::not_found("user"));
        }
        Ok(())
    }

    /// Activate a pending user; participates in the caller's transaction
    pub async fn activate_in_transaction(
        tx: &mut AsyncPgConnection,
        user_id: Uuid,
    ) -> Result<Self, StoreError> {
        use crate::schema::users::dsl::*;

        diesel::update(
            users
                .filter(id.eq(user_id))
                .filter(status.eq(UserStatus::Pending)),
        )
        .set((status.eq(UserStatus::Active), updated_at.eq(Utc::now())))
        .returning(User::as_returning())
        .get_result::<User>(tx)
        .await
        .map_err(|e| match e {
            diesel::result::Error::NotFound => StoreError::Conflict("user already verified".to_string()),
            _ => e.into(),
        })
    }
}
