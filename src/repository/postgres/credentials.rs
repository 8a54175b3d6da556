use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use diesel_async::AsyncConnection;
use uuid::Uuid;

use super::PgStore;
use crate::models::{
    AuthToken, LoginAttempt, NewAuthToken, NewRegistrationVerification, NewUser,
    RegistrationVerification, User,
};
use crate::repository::{CredentialStore, StoreError, StoreResult, UserStore};

#[async_trait]
impl UserStore for PgStore {
    async fn create_user(&self, new_user: NewUser) -> StoreResult<User> {
        let mut conn = self.primary().await?;
        User::create(&mut conn, new_user).await
    }

    async fn find_user_by_id(&self, user_id: Uuid) -> StoreResult<User> {
        let mut conn = self.primary().await?;
        User::find_by_id(&mut conn, user_id).await
    }

    async fn find_user_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        let mut conn = self.primary().await?;
        User::find_by_email(&mut conn, email).await
    }

    async fn update_password_hash(&self, user_id: Uuid, password_hash: &str) -> StoreResult<()> {
        let mut conn = self.primary().await?;
        User::update_password_hash(&mut conn, user_id, password_hash).await
    }
}

#[async_trait]
impl CredentialStore for PgStore {
    async fn create_verification(
        &self,
        user_id: Uuid,
        otp: &str,
        expires_at: DateTime<Utc>,
    ) -> StoreResult<RegistrationVerification> {
        let mut conn = self.primary().await?;
        RegistrationVerification::create(
            &mut conn,
            NewRegistrationVerification {
                user_id,
                otp: otp.to_string(),
                expires_at,
            },
        )
        .await
    }

    async fn get_verification(
        &self,
        user_id: Uuid,
        otp: &str,
    ) -> StoreResult<RegistrationVerification> {
        let mut conn = self.primary().await?;
        RegistrationVerification::find_by_user_and_otp(&mut conn, user_id, otp).await
    }

    async fn latest_verification(
        &self,
        user_id: Uuid,
    ) -> StoreResult<Option<RegistrationVerification>> {
        let mut conn = self.primary().await?;
        RegistrationVerification::find_latest_for_user(&mut conn, user_id).await
    }

    async fn mark_verification_used(&self, verification_id: Uuid) -> StoreResult<()> {
        let mut conn = self.primary().await?;
        RegistrationVerification::mark_used(&mut conn, verification_id).await
    }

    async fn consume_verification(
        &self,
        verification_id: Uuid,
        user_id: Uuid,
    ) -> StoreResult<User> {
        let mut conn = self.primary().await?;

        conn.transaction::<_, StoreError, _>(|tx| {
            Box::pin(async move {
                RegistrationVerification::mark_used_in_transaction(tx, verification_id).await?;
                User::activate_in_transaction(tx, user_id).await
            })
        })
        .await
    }

    async fn create_token(&self, token: NewAuthToken) -> StoreResult<AuthToken> {
        let mut conn = self.primary().await?;
        AuthToken::upsert(&mut conn, token).await
    }

    async fn get_token_by_hash(&self, token_hash: &str) -> StoreResult<AuthToken> {
        let mut conn = self.primary().await?;
        AuthToken::find_by_hash(&mut conn, token_hash).await
    }

    async fn touch_token(&self, token_id: Uuid) -> StoreResult<()> {
        let mut conn = self.primary().await?;
        AuthToken::touch(&mut conn, token_id).await
    }

    async fn invalidate_token(&self, user_id: Uuid) -> StoreResult<()> {
        let mut conn = self.primary().await?;
        let updated = AuthToken::invalidate_for_user(&mut conn, user_id).await?;
        if updated == 0 {
            return Err(StoreError::Validation("no active tokens".to_string()));
        }
        Ok(())
    }

    async fn update_login_attempts(
        &self,
        email: &str,
        increment: bool,
    ) -> StoreResult<LoginAttempt> {
        let mut conn = self.primary().await?;
        LoginAttempt::record(&mut conn, email, increment).await
    }

    async fn get_login_attempt(&self, email: &str) -> StoreResult<Option<LoginAttempt>> {
        let mut conn = self.primary().await?;
        LoginAttempt::find_by_email(&mut conn, email).await
    }

    async fn set_lockout(&self, email: &str, until: DateTime<Utc>) -> StoreResult<()> {
        let mut conn = self.primary().await?;
        LoginAttempt::set_lockout(&mut conn, email, until).await
    }

    async fn cleanup_expired_attempts(&self, reset_period: Duration) -> StoreResult<usize> {
        let mut conn = self.primary().await?;
        LoginAttempt::delete_stale(&mut conn, Utc::now() - reset_period).await
    }

    async fn cleanup_expired_verifications(&self) -> StoreResult<usize> {
        let mut conn = self.primary().await?;
        RegistrationVerification::delete_expired(&mut conn).await
    }
}
