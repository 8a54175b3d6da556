// Auth engine: registration with OTP verification, login with attempt
// counting and lockout, and logout.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;
use validator::Validate;

use crate::app_config::AuthSettings;
use crate::models::{NewAuthToken, NewUser, Session, User, UserStatus};
use crate::repository::{CredentialStore, SessionCache, StoreError, UserStore};
use crate::utils::tokens::token_fingerprint;
use crate::utils::validation::{
    is_valid_email, normalize_email, validate_phone, PASSWORD_MAX_LEN, PASSWORD_MIN_LEN,
};
use crate::utils::{
    generate_otp, generate_session_token, hash_password_with_config, log_auth_failure,
    needs_rehash, verify_password, AuditAction, AuditLogger, AuthError, PasswordConfig,
};

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    #[validate(length(min = 1, max = 255, message = "Name must be 1-255 characters"))]
    pub name: String,
    #[validate(custom(function = "validate_phone"))]
    pub phone: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct VerifyRequest {
    pub email: String,
    pub otp: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ResendVerificationRequest {
    pub email: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// A freshly issued OTP. Delivery is out of band.
#[derive(Debug, Clone)]
pub struct IssuedVerification {
    pub user: User,
    pub otp: String,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct LoginOutcome {
    pub token: String,
    pub user: User,
    pub expires_at: DateTime<Utc>,
}

#[derive(Clone)]
pub struct AuthService {
    users: Arc<dyn UserStore>,
    credentials: Arc<dyn CredentialStore>,
    sessions: Arc<dyn SessionCache>,
    settings: AuthSettings,
    password_config: PasswordConfig,
}

impl AuthService {
    pub fn new(
        users: Arc<dyn UserStore>,
        credentials: Arc<dyn CredentialStore>,
        sessions: Arc<dyn SessionCache>,
        settings: AuthSettings,
        password_config: PasswordConfig,
    ) -> Self {
        Self {
            users,
            credentials,
            sessions,
            settings,
            password_config,
        }
    }

    pub fn settings(&self) -> &AuthSettings {
        &self.settings
    }

    #[instrument(skip(self, req))]
    pub async fn register(&self, req: RegisterRequest) -> Result<IssuedVerification, AuthError> {
        let email = normalize_email(&req.email);
        if !is_valid_email(&email) {
            return Err(AuthError::Validation("Invalid email format".to_string()));
        }
        let password_len = req.password.chars().count();
        if !(PASSWORD_MIN_LEN..=PASSWORD_MAX_LEN).contains(&password_len) {
            return Err(AuthError::Validation(format!(
                "Password must be {}-{} characters",
                PASSWORD_MIN_LEN, PASSWORD_MAX_LEN
            )));
        }
        req.validate()
            .map_err(|e| AuthError::Validation(e.to_string()))?;

        if self.users.find_user_by_email(&email).await?.is_some() {
            return Err(AuthError::AlreadyRegistered);
        }

        let password_hash = hash_password_with_config(&req.password, &self.password_config)?;
        let user = self
            .users
            .create_user(NewUser {
                email: email.clone(),
                password_hash,
                name: req.name.trim().to_string(),
                phone: req.phone.trim().to_string(),
                status: UserStatus::Pending,
            })
            .await
            .map_err(|e| match e {
                StoreError::Conflict(_) => AuthError::AlreadyRegistered,
                other => other.into(),
            })?;

        let issued = self.issue_verification(user).await?;
        AuditLogger::log_auth_event(
            AuditAction::UserRegistered,
            Some(issued.user.id),
            Some(&email),
            None,
        );
        Ok(issued)
    }

    #[instrument(skip(self, req))]
    pub async fn resend_verification(
        &self,
        req: ResendVerificationRequest,
    ) -> Result<IssuedVerification, AuthError> {
        let email = normalize_email(&req.email);
        let user = self
            .users
            .find_user_by_email(&email)
            .await?
            .ok_or(AuthError::UserNotFound)?;
        self.ensure_pending(&user)?;

        if let Some(latest) = self.credentials.latest_verification(user.id).await? {
            let age = Utc::now() - latest.created_at;
            if !latest.is_used() && age < self.settings.otp_resend_cooldown() {
                return Err(AuthError::ResendTooSoon);
            }
        }

        let issued = self.issue_verification(user).await?;
        AuditLogger::log_auth_event(
            AuditAction::VerificationResent,
            Some(issued.user.id),
            Some(&email),
            None,
        );
        Ok(issued)
    }

    #[instrument(skip(self, req))]
    pub async fn verify(&self, req: VerifyRequest) -> Result<User, AuthError> {
        let email = normalize_email(&req.email);
        let user = self
            .users
            .find_user_by_email(&email)
            .await?
            .ok_or(AuthError::UserNotFound)?;
        self.ensure_pending(&user)?;

        let verification = match self
            .credentials
            .get_verification(user.id, req.otp.trim())
            .await
        {
            Ok(v) => v,
            Err(StoreError::NotFound(_)) => return Err(AuthError::InvalidVerification),
            Err(e) => return Err(e.into()),
        };
        if verification.is_used() {
            return Err(AuthError::InvalidVerification);
        }
        if verification.is_expired_at(Utc::now()) {
            return Err(AuthError::VerificationExpired);
        }

        let user = self
            .credentials
            .consume_verification(verification.id, user.id)
            .await
            .map_err(|e| match e {
                StoreError::NotFound(_) => AuthError::InvalidVerification,
                StoreError::Conflict(_) => AuthError::AlreadyVerified,
                other => other.into(),
            })?;

        info!(user_id = %user.id, "User verified");
        AuditLogger::log_auth_event(AuditAction::EmailVerified, Some(user.id), Some(&email), None);
        Ok(user)
    }

    #[instrument(skip(self, req))]
    pub async fn login(&self, req: LoginRequest) -> Result<LoginOutcome, AuthError> {
        let email = normalize_email(&req.email);
        let now = Utc::now();

        if let Some(attempt) = self.credentials.get_login_attempt(&email).await? {
            if attempt.is_locked_at(now) {
                let locked_until = attempt.locked_until.unwrap_or(now);
                let err = AuthError::AccountLocked { locked_until };
                log_auth_failure(&email, &err);
                return Err(err);
            }

            let stale = now - attempt.last_attempt_at > self.settings.login_attempt_reset_period();
            let lock_served = attempt.locked_until.is_some();
            if stale || lock_served {
                self.credentials.update_login_attempts(&email, false).await?;
            }
        }

        let user = match self.check_credentials(&email, &req.password).await {
            Ok(user) => user,
            Err(err) => {
                if err.is_credential_failure() {
                    self.record_failure(&email, &err).await?;
                }
                log_auth_failure(&email, &err);
                return Err(err);
            },
        };

        self.credentials.update_login_attempts(&email, false).await?;
        self.upgrade_password_hash(&user, &req.password).await;

        let token = generate_session_token();
        let expires_at = now + self.settings.token_ttl();
        self.credentials
            .create_token(NewAuthToken {
                user_id: user.id,
                token_hash: token.clone(),
                expires_at,
            })
            .await?;

        let session = Session {
            user_id: user.id,
            token_hash: token.clone(),
            expires_at,
        };
        if let Err(e) = self.sessions.store(&session).await {
            warn!(user_id = %user.id, "Failed to cache session: {}", e);
        }

        info!(
            user_id = %user.id,
            token = %token_fingerprint(&token),
            "Login succeeded"
        );
        AuditLogger::log_auth_event(AuditAction::LoginSucceeded, Some(user.id), Some(&email), None);

        Ok(LoginOutcome {
            token,
            user,
            expires_at,
        })
    }

    #[instrument(skip(self))]
    pub async fn logout(&self, user_id: Uuid) -> Result<(), AuthError> {
        if let Err(e) = self.sessions.delete(user_id).await {
            warn!(%user_id, "Failed to drop cached session: {}", e);
        }

        match self.credentials.invalidate_token(user_id).await {
            Ok(()) => {},
            Err(StoreError::Validation(reason)) => debug!(%user_id, "Logout: {}", reason),
            Err(e) => return Err(e.into()),
        }

        AuditLogger::log_auth_event(AuditAction::LoggedOut, Some(user_id), None, None);
        Ok(())
    }

    pub async fn current_user(&self, user_id: Uuid) -> Result<User, AuthError> {
        match self.users.find_user_by_id(user_id).await {
            Ok(user) => Ok(user),
            Err(StoreError::NotFound(_)) => Err(AuthError::UserNotFound),
            Err(e) => Err(e.into()),
        }
    }

    fn ensure_pending(&self, user: &User) -> Result<(), AuthError> {
        match user.status {
            UserStatus::Pending => Ok(()),
            UserStatus::Active => Err(AuthError::AlreadyVerified),
            other => Err(AuthError::Validation(format!("account is {}", other))),
        }
    }

    async fn issue_verification(&self, user: User) -> Result<IssuedVerification, AuthError> {
        let otp = generate_otp();
        let expires_at = Utc::now() + self.settings.otp_ttl();
        self.credentials
            .create_verification(user.id, &otp, expires_at)
            .await?;

        // Stand-in delivery channel until an email/SMS sender is wired in
        info!(user_id = %user.id, email = %user.email, otp = %otp, "Verification code issued");

        Ok(IssuedVerification {
            user,
            otp,
            expires_at,
        })
    }

    async fn check_credentials(&self, email: &str, password: &str) -> Result<User, AuthError> {
        let user = self
            .users
            .find_user_by_email(email)
            .await?
            .ok_or(AuthError::InvalidCredentials)?;

        if !user.is_active() {
            return Err(AuthError::AccountNotVerified);
        }
        if !verify_password(password, &user.password_hash)? {
            return Err(AuthError::InvalidCredentials);
        }
        Ok(user)
    }

    /// Re-hash bcrypt or outdated Argon2 hashes with the current parameters.
    /// Failures are logged and never block the login.
    async fn upgrade_password_hash(&self, user: &User, password: &str) {
        match needs_rehash(&user.password_hash, &self.password_config) {
            Ok(true) => {},
            Ok(false) => return,
            Err(e) => {
                warn!(user_id = %user.id, "Stored password hash unreadable: {}", e);
                return;
            },
        }

        let upgraded = match hash_password_with_config(password, &self.password_config) {
            Ok(hash) => hash,
            Err(e) => {
                warn!(user_id = %user.id, "Password re-hash failed: {}", e);
                return;
            },
        };
        match self.users.update_password_hash(user.id, &upgraded).await {
            Ok(()) => debug!(user_id = %user.id, "Password hash upgraded"),
            Err(e) => warn!(user_id = %user.id, "Failed to store upgraded hash: {}", e),
        }
    }

    async fn record_failure(&self, email: &str, err: &AuthError) -> Result<(), AuthError> {
        let attempt = self.credentials.update_login_attempts(email, true).await?;
        AuditLogger::log_auth_event(
            AuditAction::LoginFailed,
            None,
            Some(email),
            Some(json!({
                "attempt_count": attempt.attempt_count,
                "error_code": err.error_code(),
            })),
        );

        if attempt.attempt_count >= self.settings.max_login_attempts {
            let until = Utc::now() + self.settings.lock_duration();
            self.credentials.set_lockout(email, until).await?;
            warn!(
                email = email,
                attempt_count = attempt.attempt_count,
                locked_until = %until.to_rfc3339(),
                "Account locked after repeated failures"
            );
            AuditLogger::log_auth_event(
                AuditAction::AccountLocked,
                None,
                Some(email),
                Some(json!({ "locked_until": until.to_rfc3339() })),
            );
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::{MemorySessionCache, MemoryStore};
    use chrono::Duration;

    struct Harness {
        store: Arc<MemoryStore>,
        sessions: Arc<MemorySessionCache>,
        service: AuthService,
    }

    fn harness() -> Harness {
        let store = Arc::new(MemoryStore::new());
        let sessions = Arc::new(MemorySessionCache::new());
        let service = AuthService::new(
            store.clone(),
            store.clone(),
            sessions.clone(),
            AuthSettings::default(),
            PasswordConfig::fast(),
        );
        Harness {
            store,
            sessions,
            service,
        }
    }

    fn register_request(email: &str) -> RegisterRequest {
        RegisterRequest {
            email: email.to_string(),
            password: "hunter22".to_string(),
            name: "A".to_string(),
            phone: "+1".to_string(),
        }
    }

    fn login_request(email: &str, password: &str) -> LoginRequest {
        LoginRequest {
            email: email.to_string(),
            password: password.to_string(),
        }
    }

    async fn active_user(h: &Harness, email: &str) -> User {
        let issued = h.service.register(register_request(email)).await.unwrap();
        h.service
            .verify(VerifyRequest {
                email: email.to_string(),
                otp: issued.otp,
            })
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_register_verify_login() {
        let h = harness();
        let issued = h.service.register(register_request("A@B.co")).await.unwrap();
        assert_eq!(issued.user.status, UserStatus::Pending);
        assert_eq!(issued.user.email, "a@b.co");
        assert_eq!(issued.otp.len(), 6);
        assert!(issued.user.password_hash.starts_with("$argon2"));

        let pending = h
            .service
            .login(login_request("a@b.co", "hunter22"))
            .await
            .unwrap_err();
        assert!(matches!(pending, AuthError::AccountNotVerified));

        let user = h
            .service
            .verify(VerifyRequest {
                email: "a@b.co".into(),
                otp: issued.otp.clone(),
            })
            .await
            .unwrap();
        assert_eq!(user.status, UserStatus::Active);

        let outcome = h
            .service
            .login(login_request("a@b.co", "hunter22"))
            .await
            .unwrap();
        assert_eq!(outcome.token.len(), 64);
        assert_eq!(outcome.user.id, user.id);
        assert_eq!(h.sessions.len().await, 1);

        let again = h
            .service
            .verify(VerifyRequest {
                email: "a@b.co".into(),
                otp: issued.otp,
            })
            .await
            .unwrap_err();
        assert!(matches!(again, AuthError::AlreadyVerified));
    }

    #[tokio::test]
    async fn test_login_upgrades_legacy_bcrypt_hash() {
        let h = harness();
        let legacy = bcrypt::hash("hunter22", 4).unwrap();
        let user = h
            .store
            .create_user(NewUser {
                email: "old@b.co".into(),
                password_hash: legacy.clone(),
                name: "Old".into(),
                phone: "+19".into(),
                status: UserStatus::Active,
            })
            .await
            .unwrap();

        h.service.login(login_request("old@b.co", "hunter22")).await.unwrap();
        let upgraded = h.store.find_user_by_id(user.id).await.unwrap().password_hash;
        assert!(upgraded.starts_with("$argon2id$"));
        assert!(verify_password("hunter22", &upgraded).unwrap());

        // Current hashes are left alone
        h.service.login(login_request("old@b.co", "hunter22")).await.unwrap();
        let again = h.store.find_user_by_id(user.id).await.unwrap().password_hash;
        assert_eq!(again, upgraded);
    }

    #[tokio::test]
    async fn test_register_rejects_bad_input_and_duplicates() {
        let h = harness();
        let err = h.service.register(register_request("ab.co")).await.unwrap_err();
        assert!(matches!(err, AuthError::Validation(_)));

        let mut short = register_request("a@b.co");
        short.password = "short".into();
        let err = h.service.register(short).await.unwrap_err();
        assert!(matches!(err, AuthError::Validation(_)));

        h.service.register(register_request("a@b.co")).await.unwrap();
        let err = h.service.register(register_request("a@b.co")).await.unwrap_err();
        assert!(matches!(err, AuthError::AlreadyRegistered));
    }

    #[tokio::test]
    async fn test_wrong_or_expired_otp() {
        let h = harness();
        let issued = h.service.register(register_request("a@b.co")).await.unwrap();
        let wrong = if issued.otp == "000000" { "111111" } else { "000000" };

        let err = h
            .service
            .verify(VerifyRequest {
                email: "a@b.co".into(),
                otp: wrong.into(),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::InvalidVerification));

        h.store
            .backdate_verifications(issued.user.id, Duration::hours(25))
            .await;
        let err = h
            .service
            .verify(VerifyRequest {
                email: "a@b.co".into(),
                otp: issued.otp,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::VerificationExpired));
    }

    #[tokio::test]
    async fn test_resend_cooldown() {
        let h = harness();
        let issued = h.service.register(register_request("a@b.co")).await.unwrap();

        let err = h
            .service
            .resend_verification(ResendVerificationRequest {
                email: "a@b.co".into(),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::ResendTooSoon));

        h.store
            .backdate_verifications(issued.user.id, Duration::seconds(120))
            .await;
        let fresh = h
            .service
            .resend_verification(ResendVerificationRequest {
                email: "a@b.co".into(),
            })
            .await
            .unwrap();
        h.service
            .verify(VerifyRequest {
                email: "a@b.co".into(),
                otp: fresh.otp,
            })
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_lockout_after_repeated_failures() {
        let h = harness();
        active_user(&h, "a@b.co").await;

        for _ in 0..5 {
            let err = h
                .service
                .login(login_request("a@b.co", "wrong-password"))
                .await
                .unwrap_err();
            assert!(matches!(err, AuthError::InvalidCredentials));
        }

        let locked = h
            .service
            .login(login_request("a@b.co", "hunter22"))
            .await
            .unwrap_err();
        assert!(matches!(locked, AuthError::AccountLocked { .. }));

        h.store
            .backdate_login_attempt("a@b.co", Duration::minutes(31))
            .await;
        h.service
            .login(login_request("a@b.co", "hunter22"))
            .await
            .unwrap();

        let attempt = h.store.get_login_attempt("a@b.co").await.unwrap().unwrap();
        assert_eq!(attempt.attempt_count, 0);
        assert!(attempt.locked_until.is_none());
    }

    #[tokio::test]
    async fn test_unknown_email_counts_as_failure() {
        let h = harness();
        let err = h
            .service
            .login(login_request("ghost@b.co", "whatever1"))
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::InvalidCredentials));

        let attempt = h.store.get_login_attempt("ghost@b.co").await.unwrap().unwrap();
        assert_eq!(attempt.attempt_count, 1);
    }

    #[tokio::test]
    async fn test_logout_expires_token_and_session() {
        let h = harness();
        let user = active_user(&h, "a@b.co").await;
        let outcome = h
            .service
            .login(login_request("a@b.co", "hunter22"))
            .await
            .unwrap();

        h.service.logout(user.id).await.unwrap();
        assert!(h.sessions.is_empty().await);
        let token = h.store.get_token_by_hash(&outcome.token).await.unwrap();
        assert!(token.is_expired_at(Utc::now()));

        // a second logout has nothing left to expire
        h.service.logout(user.id).await.unwrap();
    }
}
