// Store contracts
// Each domain store owns its rows; services only see these traits. Postgres
// and Redis back them in production, `memory` backs them in tests.

pub mod error;
pub mod memory;
pub mod postgres;
pub mod redis_session;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;
use uuid::Uuid;

use crate::models::{
    AuthToken, EventLog, LoginAttempt, Merchant, MerchantCustomer, NewAuthToken, NewEventLog,
    NewMerchant, NewMerchantCustomer, NewProgram, NewProgramRule, NewRedemption, NewReward,
    NewTransaction, NewUser, Pagination, PointsLedger, PointsMovement, Program, ProgramRule,
    Redemption, RedemptionStatus, RegistrationVerification, Reward, Session, Transaction,
    TransactionStatus, User,
};

pub use error::StoreError;
pub use memory::{MemorySessionCache, MemoryStore};
pub use postgres::PgStore;
pub use redis_session::RedisSessionCache;

pub type StoreResult<T> = Result<T, StoreError>;

#[async_trait]
pub trait UserStore: Send + Sync {
    async fn create_user(&self, new_user: NewUser) -> StoreResult<User>;

    async fn find_user_by_id(&self, user_id: Uuid) -> StoreResult<User>;

    async fn find_user_by_email(&self, email: &str) -> StoreResult<Option<User>>;

    async fn update_password_hash(&self, user_id: Uuid, password_hash: &str) -> StoreResult<()>;
}

/// Password-adjacent state: OTP verifications, bearer tokens and login counters
#[async_trait]
pub trait CredentialStore: Send + Sync {
    async fn create_verification(
        &self,
        user_id: Uuid,
        otp: &str,
        expires_at: DateTime<Utc>,
    ) -> StoreResult<RegistrationVerification>;

    /// Newest verification for the user carrying `otp`
    async fn get_verification(&self, user_id: Uuid, otp: &str)
        -> StoreResult<RegistrationVerification>;

    async fn latest_verification(&self, user_id: Uuid)
        -> StoreResult<Option<RegistrationVerification>>;

    /// NULL -> now on `used_at`; `NotFound` when it was already set
    async fn mark_verification_used(&self, verification_id: Uuid) -> StoreResult<()>;

    /// Mark the verification used and activate the user in one transaction
    async fn consume_verification(&self, verification_id: Uuid, user_id: Uuid)
        -> StoreResult<User>;

    /// Upsert on user_id; a re-login overwrites the previous token
    async fn create_token(&self, token: NewAuthToken) -> StoreResult<AuthToken>;

    async fn get_token_by_hash(&self, token_hash: &str) -> StoreResult<AuthToken>;

    async fn touch_token(&self, token_id: Uuid) -> StoreResult<()>;

    /// Expire the user's live token; `Validation("no active tokens")` when there is none
    async fn invalidate_token(&self, user_id: Uuid) -> StoreResult<()>;

    /// Atomic per email: create or increment, or reset to zero
    async fn update_login_attempts(&self, email: &str, increment: bool)
        -> StoreResult<LoginAttempt>;

    async fn get_login_attempt(&self, email: &str) -> StoreResult<Option<LoginAttempt>>;

    async fn set_lockout(&self, email: &str, until: DateTime<Utc>) -> StoreResult<()>;

    /// Delete counters idle for longer than `reset_period`
    async fn cleanup_expired_attempts(&self, reset_period: Duration) -> StoreResult<usize>;

    /// Delete unused verifications past expiry
    async fn cleanup_expired_verifications(&self) -> StoreResult<usize>;
}

/// Short-lived session snapshots keyed by user id. Misses are normal.
#[async_trait]
pub trait SessionCache: Send + Sync {
    async fn store(&self, session: &Session) -> StoreResult<()>;

    async fn get(&self, user_id: Uuid) -> StoreResult<Option<Session>>;

    async fn delete(&self, user_id: Uuid) -> StoreResult<()>;

    /// Swap token and expiry of an existing snapshot; `NotFound` when absent
    async fn refresh(&self, user_id: Uuid, new_token: &str, ttl: Duration) -> StoreResult<Session>;

    async fn delete_all(&self) -> StoreResult<usize>;
}

#[async_trait]
pub trait LedgerStore: Send + Sync {
    async fn balance(&self, customer_id: Uuid, program_id: Uuid) -> StoreResult<i64>;

    /// Newest first
    async fn entries(&self, customer_id: Uuid, program_id: Uuid) -> StoreResult<Vec<PointsLedger>>;

    async fn entry_for_transaction(&self, transaction_id: Uuid) -> StoreResult<PointsLedger>;

    /// Read the balance and append the next entry as one critical section per
    /// (customer, program). A redeem beyond the balance writes nothing.
    async fn append_entry(
        &self,
        customer_id: Uuid,
        program_id: Uuid,
        transaction_id: Uuid,
        movement: PointsMovement,
    ) -> StoreResult<PointsLedger>;
}

#[async_trait]
pub trait TransactionStore: Send + Sync {
    async fn insert_transaction(&self, new_transaction: NewTransaction) -> StoreResult<Transaction>;

    async fn get_transaction(&self, transaction_id: Uuid) -> StoreResult<Transaction>;

    async fn update_transaction_status(
        &self,
        transaction_id: Uuid,
        status: TransactionStatus,
    ) -> StoreResult<Transaction>;

    /// Newest first, with the total row count
    async fn list_customer_transactions(
        &self,
        customer_id: Uuid,
        pagination: Pagination,
    ) -> StoreResult<(Vec<Transaction>, i64)>;

    async fn count_customer_program_transactions(
        &self,
        customer_id: Uuid,
        program_id: Uuid,
    ) -> StoreResult<i64>;
}

/// Merchants, customers, programs, rules and rewards
#[async_trait]
pub trait CatalogStore: Send + Sync {
    /// Fails `MerchantLimitReached` once the owner holds `limit` merchants
    async fn create_merchant(&self, new_merchant: NewMerchant, limit: i64) -> StoreResult<Merchant>;

    async fn get_merchant(&self, merchant_id: Uuid) -> StoreResult<Merchant>;

    async fn create_customer(&self, new_customer: NewMerchantCustomer)
        -> StoreResult<MerchantCustomer>;

    async fn get_customer(&self, customer_id: Uuid) -> StoreResult<MerchantCustomer>;

    async fn create_program(&self, new_program: NewProgram) -> StoreResult<Program>;

    async fn get_program(&self, program_id: Uuid) -> StoreResult<Program>;

    async fn create_rule(&self, new_rule: NewProgramRule) -> StoreResult<ProgramRule>;

    async fn active_rules(&self, program_id: Uuid, now: DateTime<Utc>)
        -> StoreResult<Vec<ProgramRule>>;

    async fn create_reward(&self, new_reward: NewReward) -> StoreResult<Reward>;

    async fn get_reward(&self, reward_id: Uuid) -> StoreResult<Reward>;
}

/// Points returned to the customer when a redemption is canceled
#[derive(Debug, Clone)]
pub struct RefundPlan {
    pub transaction: NewTransaction,
    pub points: i64,
}

#[derive(Debug, Clone)]
pub struct RefundOutcome {
    pub transaction: Transaction,
    pub entry: PointsLedger,
}

#[derive(Debug, Clone)]
pub struct RedemptionTransition {
    pub redemption: Redemption,
    pub previous: RedemptionStatus,
    pub refund: Option<RefundOutcome>,
}

#[async_trait]
pub trait RedemptionStore: Send + Sync {
    /// Take one unit of tracked stock; `RewardUnavailable` when inactive or sold out
    async fn reserve_reward(&self, reward_id: Uuid) -> StoreResult<Reward>;

    async fn release_reward(&self, reward_id: Uuid) -> StoreResult<()>;

    async fn insert_redemption(&self, new_redemption: NewRedemption) -> StoreResult<Redemption>;

    async fn get_redemption(&self, redemption_id: Uuid) -> StoreResult<Redemption>;

    async fn attach_redemption_transaction(
        &self,
        redemption_id: Uuid,
        transaction_id: Uuid,
    ) -> StoreResult<Redemption>;

    /// Change status with the redemption row locked. When the target is
    /// `Canceled` and the current status is `Pending`, `refund` is
    /// applied in the same unit of work: refund transaction, earn entry and
    /// one unit of stock back. Repeating a cancel is a no-op.
    async fn transition_redemption(
        &self,
        redemption_id: Uuid,
        to: RedemptionStatus,
        refund: Option<RefundPlan>,
    ) -> StoreResult<RedemptionTransition>;
}

#[async_trait]
pub trait EventLogStore: Send + Sync {
    async fn insert_event(&self, new_event: NewEventLog) -> StoreResult<EventLog>;

    /// Oldest first
    async fn events_by_reference(&self, reference_id: Uuid) -> StoreResult<Vec<EventLog>>;
}

/// Handles to every store contract, shared by the services
#[derive(Clone)]
pub struct Stores {
    pub users: Arc<dyn UserStore>,
    pub credentials: Arc<dyn CredentialStore>,
    pub sessions: Arc<dyn SessionCache>,
    pub ledger: Arc<dyn LedgerStore>,
    pub transactions: Arc<dyn TransactionStore>,
    pub catalog: Arc<dyn CatalogStore>,
    pub redemptions: Arc<dyn RedemptionStore>,
    pub events: Arc<dyn EventLogStore>,
}

impl Stores {
    pub fn postgres(store: PgStore, sessions: RedisSessionCache) -> Self {
        let store = Arc::new(store);
        Self {
            users: store.clone(),
            credentials: store.clone(),
            sessions: Arc::new(sessions),
            ledger: store.clone(),
            transactions: store.clone(),
            catalog: store.clone(),
            redemptions: store.clone(),
            events: store,
        }
    }

    pub fn in_memory(store: Arc<MemoryStore>, sessions: Arc<MemorySessionCache>) -> Self {
        Self {
            users: store.clone(),
            credentials: store.clone(),
            sessions,
            ledger: store.clone(),
            transactions: store.clone(),
            catalog: store.clone(),
            redemptions: store.clone(),
            events: store,
        }
    }
}

/// Rejects moves that would put points back on hold without debiting them again
pub fn check_redemption_transition(
    from: RedemptionStatus,
    to: RedemptionStatus,
) -> StoreResult<()> {
    if !from.holds_points() && to.holds_points() {
        return Err(StoreError::Validation(format!(
            "cannot move a {} redemption back to {}",
            from, to
        )));
    }
    Ok(())
}
