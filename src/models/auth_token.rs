// Bearer token records
// One row per user; re-login overwrites the previous token

use chrono::{DateTime, Utc};
use diesel::pg::upsert::excluded;
use diesel::prelude::*;
use diesel_async::{AsyncPgConnection, RunQueryDsl};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::repository::StoreError;
use crate::schema::auth_tokens;

#[derive(Debug, Clone, Serialize, Deserialize, Queryable, Selectable, Identifiable)]
#[diesel(table_name = auth_tokens)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct AuthToken {
    pub id: Uuid,
    pub user_id: Uuid,
    #[serde(skip_serializing)]
    pub token_hash: String,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub last_used_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = auth_tokens)]
pub struct NewAuthToken {
    pub user_id: Uuid,
    pub token_hash: String,
    pub expires_at: DateTime<Utc>,
}

impl AuthToken {
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }

    /// Insert or overwrite the user's token, clearing `last_used_at`
    pub async fn upsert(
        conn: &mut AsyncPgConnection,
        new_token: NewAuthToken,
    ) -> Result<Self, StoreError> {
        use crate::schema::auth_tokens::dsl::*;

        let now = Utc::now();
        let token = diesel::insert_into(auth_tokens)
            .values(&new_token)
            .on_conflict(user_id)
            .do_update()
            .set((
                token_hash.eq(excluded(token_hash)),
                expires_at.eq(excluded(expires_at)),
                created_at.eq(now),
                last_used_at.eq(None::<DateTime<Utc>>),
            ))
            .returning(AuthToken::as_returning())
            .get_result::<AuthToken>(conn)
            .await?;

        Ok(token)
    }

    pub async fn find_by_hash(
        conn: &mut AsyncPgConnection,
        hash: &str,
    ) -> Result<Self, StoreError> {
        use crate::schema::auth_tokens::dsl::*;

        auth_tokens
            .filter(token_hash.eq(hash))
            .select(AuthToken::as_select())
            .first::<AuthToken>(conn)
            .await
            .map_err(|e| match e {
                diesel::result::Error::NotFound => StoreError::not_found("token"),
                _ => e.into(),
            })
    }

    /// Expire the user's live token; returns rows affected
    pub async fn invalidate_for_user(
        conn: &mut AsyncPgConnection,
        user_id_val: Uuid,
    ) -> Result<usize, StoreError> {
        use crate::schema::auth_tokens::dsl::*;

        let now = Utc::now();
        let updated = diesel::update(
            auth_tokens
                .filter(user_id.eq(user_id_val))
                .filter(expires_at.gt(now)),
        )
        .set((expires_at.eq(now), last_used_at.eq(Some(now))))
        .execute(conn)
        .await?;

        Ok(updated)
    }

    pub async fn touch(conn: &mut AsyncPgConnection, token_id: Uuid) -> Result<(), StoreError> {
        use crate::schema::auth_tokens::dsl::*;

        diesel::update(auth_tokens.filter(id.eq(token_id)))
            .set(last_used_at.eq(Some(Utc::now())))
            .execute(conn)
            .await?;

        Ok(())
    }
}
