// In-memory stores
// Same contracts as the Postgres and Redis stores, for tests and ENVIRONMENT=test.
// Lock order is always: ledger pair lock, then the state lock.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use uuid::Uuid;

use super::{
    check_redemption_transition, CatalogStore, CredentialStore, EventLogStore, LedgerStore,
    RedemptionStore, RedemptionTransition, RefundOutcome, RefundPlan, SessionCache, StoreError,
    StoreResult, TransactionStore, UserStore,
};
use crate::models::{
    AuthToken, EventLog, LoginAttempt, Merchant, MerchantCustomer, NewAuthToken, NewEventLog,
    NewLedgerEntry, NewMerchant, NewMerchantCustomer, NewProgram, NewProgramRule, NewRedemption,
    NewReward, NewTransaction, NewUser, Pagination, PointsLedger, PointsMovement, Program,
    ProgramRule, Redemption, RedemptionStatus, RegistrationVerification, Reward, Session,
    Transaction, TransactionStatus, User, UserStatus,
};

type PairKey = (Uuid, Uuid);

#[derive(Default)]
struct MemoryState {
    users: HashMap<Uuid, User>,
    verifications: Vec<RegistrationVerification>,
    tokens: HashMap<Uuid, AuthToken>,
    login_attempts: HashMap<String, LoginAttempt>,
    merchants: HashMap<Uuid, Merchant>,
    customers: HashMap<Uuid, MerchantCustomer>,
    programs: HashMap<Uuid, Program>,
    rules: Vec<ProgramRule>,
    rewards: HashMap<Uuid, Reward>,
    transactions: Vec<Transaction>,
    ledger: Vec<PointsLedger>,
    next_entry_seq: i64,
    redemptions: HashMap<Uuid, Redemption>,
    events: Vec<EventLog>,
}

impl MemoryState {
    fn latest_balance(&self, customer_id: Uuid, program_id: Uuid) -> i64 {
        self.ledger
            .iter()
            .rev()
            .find(|e| e.merchant_customers_id == customer_id && e.program_id == program_id)
            .map(|e| e.points_balance)
            .unwrap_or(0)
    }

    fn transaction_mut(&mut self, transaction_id: Uuid) -> StoreResult<&mut Transaction> {
        self.transactions
            .iter_mut()
            .find(|t| t.transaction_id == transaction_id)
            .ok_or_else(|| StoreError::not_found("transaction"))
    }

    fn insert_transaction(&mut self, new: NewTransaction) -> StoreResult<Transaction> {
        if !self.merchants.contains_key(&new.merchant_id) {
            return Err(StoreError::not_found("merchant"));
        }
        if !self.customers.contains_key(&new.merchant_customers_id) {
            return Err(StoreError::not_found("customer"));
        }
        if !self.programs.contains_key(&new.program_id) {
            return Err(StoreError::not_found("program"));
        }

        let transaction = Transaction {
            transaction_id: Uuid::new_v4(),
            merchant_id: new.merchant_id,
            merchant_customers_id: new.merchant_customers_id,
            program_id: new.program_id,
            transaction_type: new.transaction_type,
            transaction_amount: new.transaction_amount,
            transaction_date: new.transaction_date,
            branch_id: new.branch_id,
            status: new.status,
            created_at: Utc::now(),
        };
        self.transactions.push(transaction.clone());
        Ok(transaction)
    }

    /// Caller must hold the pair lock
    fn append_entry(
        &mut self,
        customer_id: Uuid,
        program_id: Uuid,
        transaction_id: Uuid,
        movement: PointsMovement,
    ) -> StoreResult<PointsLedger> {
        if !self.transactions.iter().any(|t| t.transaction_id == transaction_id) {
            return Err(StoreError::not_found("transaction"));
        }

        let current = self.latest_balance(customer_id, program_id);
        let entry =
            NewLedgerEntry::for_movement(customer_id, program_id, transaction_id, movement, current)?;

        self.next_entry_seq += 1;
        let stored = PointsLedger {
            ledger_id: Uuid::new_v4(),
            entry_seq: self.next_entry_seq,
            merchant_customers_id: entry.merchant_customers_id,
            program_id: entry.program_id,
            points_earned: entry.points_earned,
            points_redeemed: entry.points_redeemed,
            points_balance: entry.points_balance,
            transaction_id: entry.transaction_id,
            created_at: Utc::now(),
        };
        self.ledger.push(stored.clone());
        Ok(stored)
    }

    fn release_reward(&mut self, reward_id: Uuid) {
        if let Some(reward) = self.rewards.get_mut(&reward_id) {
            if let Some(left) = reward.available_quantity.as_mut() {
                *left += 1;
                reward.updated_at = Utc::now();
            }
        }
    }
}

/// Every store contract except the session cache, held in process memory
#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<MemoryState>,
    pair_locks: Mutex<HashMap<PairKey, Arc<Mutex<()>>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    async fn pair_lock(&self, customer_id: Uuid, program_id: Uuid) -> Arc<Mutex<()>> {
        let mut locks = self.pair_locks.lock().await;
        locks
            .entry((customer_id, program_id))
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Number of ledger entries across all pairs
    pub async fn ledger_len(&self) -> usize {
        self.state.lock().await.ledger.len()
    }

    /// Push a login counter's last attempt into the past
    pub async fn backdate_login_attempt(&self, email: &str, by: Duration) {
        let mut state = self.state.lock().await;
        if let Some(attempt) = state.login_attempts.get_mut(email) {
            attempt.last_attempt_at -= by;
            if let Some(until) = attempt.locked_until.as_mut() {
                *until -= by;
            }
        }
    }

    /// Push a user's verifications into the past
    pub async fn backdate_verifications(&self, user_id: Uuid, by: Duration) {
        let mut state = self.state.lock().await;
        for verification in state.verifications.iter_mut().filter(|v| v.user_id == user_id) {
            verification.created_at -= by;
            verification.expires_at -= by;
        }
    }
}

#[async_trait]
impl UserStore for MemoryStore {
    async fn create_user(&self, new_user: NewUser) -> StoreResult<User> {
        let mut state = self.state.lock().await;
        if state
            .users
            .values()
            .any(|u| u.email == new_user.email || u.phone == new_user.phone)
        {
            return Err(StoreError::Conflict(
                "email or phone already registered".to_string(),
            ));
        }

        let now = Utc::now();
        let user = User {
            id: Uuid::new_v4(),
            email: new_user.email,
            password_hash: new_user.password_hash,
            name: new_user.name,
            phone: new_user.phone,
            status: new_user.status,
            created_at: now,
            updated_at: now,
        };
        state.users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn find_user_by_id(&self, user_id: Uuid) -> StoreResult<User> {
        let state = self.state.lock().await;
        state
            .users
            .get(&user_id)
            .cloned()
            .ok_or_else(|| StoreError::not_found("user"))
    }

    async fn find_user_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        let state = self.state.lock().await;
        Ok(state.users.values().find(|u| u.email == email).cloned())
    }

    async fn update_password_hash(&self, user_id: Uuid, password_hash: &str) -> StoreResult<()> {
        let mut state = self.state.lock().await;
        let user = state
            .users
            .get_mut(&user_id)
            .ok_or_else(|| StoreError::not_found("user"))?;
        user.password_hash = password_hash.to_string();
        user.updated_at = Utc::now();
        Ok(())
    }
}

#[async_trait]
impl CredentialStore for MemoryStore {
    async fn create_verification(
        &self,
        user_id: Uuid,
        otp: &str,
        expires_at: DateTime<Utc>,
    ) -> StoreResult<RegistrationVerification> {
        let mut state = self.state.lock().await;
        if !state.users.contains_key(&user_id) {
            return Err(StoreError::not_found("user"));
        }

        let verification = RegistrationVerification {
            id: Uuid::new_v4(),
            user_id,
            otp: otp.to_string(),
            expires_at,
            created_at: Utc::now(),
            used_at: None,
        };
        state.verifications.push(verification.clone());
        Ok(verification)
    }

    async fn get_verification(
        &self,
        user_id: Uuid,
        otp: &str,
    ) -> StoreResult<RegistrationVerification> {
        let state = self.state.lock().await;
        state
            .verifications
            .iter()
            .filter(|v| v.user_id == user_id && v.otp == otp)
            .max_by_key(|v| v.created_at)
            .cloned()
            .ok_or_else(|| StoreError::not_found("verification"))
    }

    async fn latest_verification(
        &self,
        user_id: Uuid,
    ) -> StoreResult<Option<RegistrationVerification>> {
        let state = self.state.lock().await;
        Ok(state
            .verifications
            .iter()
            .filter(|v| v.user_id == user_id)
            .max_by_key(|v| v.created_at)
            .cloned())
    }

    async fn mark_verification_used(&self, verification_id: Uuid) -> StoreResult<()> {
        let mut state = self.state.lock().await;
        let verification = state
            .verifications
            .iter_mut()
            .find(|v| v.id == verification_id && v.used_at.is_none())
            .ok_or_else(|| StoreError::not_found("unused verification"))?;
        verification.used_at = Some(Utc::now());
        Ok(())
    }

    async fn consume_verification(
        &self,
        verification_id: Uuid,
        user_id: Uuid,
    ) -> StoreResult<User> {
        let mut state = self.state.lock().await;

        let unused = state
            .verifications
            .iter()
            .any(|v| v.id == verification_id && v.used_at.is_none());
        if !unused {
            return Err(StoreError::not_found("unused verification"));
        }
        match state.users.get(&user_id) {
            None => return Err(StoreError::not_found("user")),
            Some(user) if user.status != UserStatus::Pending => {
                return Err(StoreError::Conflict("user already verified".to_string()))
            },
            Some(_) => {},
        }

        let now = Utc::now();
        if let Some(verification) = state.verifications.iter_mut().find(|v| v.id == verification_id) {
            verification.used_at = Some(now);
        }
        let user = state
            .users
            .get_mut(&user_id)
            .ok_or_else(|| StoreError::not_found("user"))?;
        user.status = UserStatus::Active;
        user.updated_at = now;
        Ok(user.clone())
    }

    async fn create_token(&self, token: NewAuthToken) -> StoreResult<AuthToken> {
        let mut state = self.state.lock().await;
        let now = Utc::now();
        let id = state
            .tokens
            .get(&token.user_id)
            .map(|existing| existing.id)
            .unwrap_or_else(Uuid::new_v4);

        let stored = AuthToken {
            id,
            user_id: token.user_id,
            token_hash: token.token_hash,
            expires_at: token.expires_at,
            created_at: now,
            last_used_at: None,
        };
        state.tokens.insert(stored.user_id, stored.clone());
        Ok(stored)
    }

    async fn get_token_by_hash(&self, token_hash: &str) -> StoreResult<AuthToken> {
        let state = self.state.lock().await;
        state
            .tokens
            .values()
            .find(|t| t.token_hash == token_hash)
            .cloned()
            .ok_or_else(|| StoreError::not_found("token"))
    }

    async fn touch_token(&self, token_id: Uuid) -> StoreResult<()> {
        let mut state = self.state.lock().await;
        if let Some(token) = state.tokens.values_mut().find(|t| t.id == token_id) {
            token.last_used_at = Some(Utc::now());
        }
        Ok(())
    }

    async fn invalidate_token(&self, user_id: Uuid) -> StoreResult<()> {
        let mut state = self.state.lock().await;
        let now = Utc::now();
        match state.tokens.get_mut(&user_id) {
            Some(token) if token.expires_at > now => {
                token.expires_at = now;
                token.last_used_at = Some(now);
                Ok(())
            },
            _ => Err(StoreError::Validation("no active tokens".to_string())),
        }
    }

    async fn update_login_attempts(
        &self,
        email: &str,
        increment: bool,
    ) -> StoreResult<LoginAttempt> {
        let mut state = self.state.lock().await;
        let now = Utc::now();

        let attempt = state
            .login_attempts
            .entry(email.to_string())
            .or_insert_with(|| LoginAttempt {
                id: Uuid::new_v4(),
                email: email.to_string(),
                attempt_count: 0,
                last_attempt_at: now,
                locked_until: None,
            });

        if increment {
            attempt.attempt_count += 1;
        } else {
            attempt.attempt_count = 0;
            attempt.locked_until = None;
        }
        attempt.last_attempt_at = now;
        Ok(attempt.clone())
    }

    async fn get_login_attempt(&self, email: &str) -> StoreResult<Option<LoginAttempt>> {
        let state = self.state.lock().await;
        Ok(state.login_attempts.get(email).cloned())
    }

    async fn set_lockout(&self, email: &str, until: DateTime<Utc>) -> StoreResult<()> {
        let mut state = self.state.lock().await;
        if let Some(attempt) = state.login_attempts.get_mut(email) {
            attempt.locked_until = Some(until);
        }
        Ok(())
    }

    async fn cleanup_expired_attempts(&self, reset_period: Duration) -> StoreResult<usize> {
        let mut state = self.state.lock().await;
        let cutoff = Utc::now() - reset_period;
        let before = state.login_attempts.len();
        state.login_attempts.retain(|_, a| a.last_attempt_at >= cutoff);
        Ok(before - state.login_attempts.len())
    }

    async fn cleanup_expired_verifications(&self) -> StoreResult<usize> {
        let mut state = self.state.lock().await;
        let now = Utc::now();
        let before = state.verifications.len();
        state
            .verifications
            .retain(|v| !(v.expires_at < now && v.used_at.is_none()));
        Ok(before - state.verifications.len())
    }
}

#[async_trait]
impl LedgerStore for MemoryStore {
    async fn balance(&self, customer_id: Uuid, program_id: Uuid) -> StoreResult<i64> {
        let state = self.state.lock().await;
        Ok(state.latest_balance(customer_id, program_id))
    }

    async fn entries(&self, customer_id: Uuid, program_id: Uuid) -> StoreResult<Vec<PointsLedger>> {
        let state = self.state.lock().await;
        Ok(state
            .ledger
            .iter()
            .rev()
            .filter(|e| e.merchant_customers_id == customer_id && e.program_id == program_id)
            .cloned()
            .collect())
    }

    async fn entry_for_transaction(&self, transaction_id: Uuid) -> StoreResult<PointsLedger> {
        let state = self.state.lock().await;
        state
            .ledger
            .iter()
            .rev()
            .find(|e| e.transaction_id == transaction_id)
            .cloned()
            .ok_or_else(|| StoreError::not_found("ledger entry"))
    }

    async fn append_entry(
        &self,
        customer_id: Uuid,
        program_id: Uuid,
        transaction_id: Uuid,
        movement: PointsMovement,
    ) -> StoreResult<PointsLedger> {
        let pair = self.pair_lock(customer_id, program_id).await;
        let _serialized = pair.lock().await;

        let mut state = self.state.lock().await;
        state.append_entry(customer_id, program_id, transaction_id, movement)
    }
}

#[async_trait]
impl TransactionStore for MemoryStore {
    async fn insert_transaction(&self, new_transaction: NewTransaction) -> StoreResult<Transaction> {
        let mut state = self.state.lock().await;
        state.insert_transaction(new_transaction)
    }

    async fn get_transaction(&self, transaction_id: Uuid) -> StoreResult<Transaction> {
        let state = self.state.lock().await;
        state
            .transactions
            .iter()
            .find(|t| t.transaction_id == transaction_id)
            .cloned()
            .ok_or_else(|| StoreError::not_found("transaction"))
    }

    async fn update_transaction_status(
        &self,
        transaction_id: Uuid,
        status: TransactionStatus,
    ) -> StoreResult<Transaction> {
        let mut state = self.state.lock().await;
        let transaction = state.transaction_mut(transaction_id)?;
        transaction.status = status;
        Ok(transaction.clone())
    }

    async fn list_customer_transactions(
        &self,
        customer_id: Uuid,
        pagination: Pagination,
    ) -> StoreResult<(Vec<Transaction>, i64)> {
        let state = self.state.lock().await;
        let matching: Vec<&Transaction> = state
            .transactions
            .iter()
            .rev()
            .filter(|t| t.merchant_customers_id == customer_id)
            .collect();

        let total = matching.len() as i64;
        let page = matching
            .into_iter()
            .skip(pagination.offset() as usize)
            .take(pagination.limit as usize)
            .cloned()
            .collect();
        Ok((page, total))
    }

    async fn count_customer_program_transactions(
        &self,
        customer_id: Uuid,
        program_id: Uuid,
    ) -> StoreResult<i64> {
        let state = self.state.lock().await;
        Ok(state
            .transactions
            .iter()
            .filter(|t| t.merchant_customers_id == customer_id && t.program_id == program_id)
            .count() as i64)
    }
}

#[async_trait]
impl CatalogStore for MemoryStore {
    async fn create_merchant(&self, new_merchant: NewMerchant, limit: i64) -> StoreResult<Merchant> {
        let mut state = self.state.lock().await;
        if !state.users.contains_key(&new_merchant.user_id) {
            return Err(StoreError::not_found("user"));
        }

        let owned: Vec<&Merchant> = state
            .merchants
            .values()
            .filter(|m| m.user_id == new_merchant.user_id)
            .collect();
        if owned.len() as i64 >= limit {
            return Err(StoreError::MerchantLimitReached { limit });
        }
        if owned.iter().any(|m| m.name == new_merchant.name) {
            return Err(StoreError::Conflict(
                "merchant name already used by this owner".to_string(),
            ));
        }

        let now = Utc::now();
        let merchant = Merchant {
            id: Uuid::new_v4(),
            user_id: new_merchant.user_id,
            name: new_merchant.name,
            merchant_type: new_merchant.merchant_type,
            status: new_merchant.status,
            created_at: now,
            updated_at: now,
        };
        state.merchants.insert(merchant.id, merchant.clone());
        Ok(merchant)
    }

    async fn get_merchant(&self, merchant_id: Uuid) -> StoreResult<Merchant> {
        let state = self.state.lock().await;
        state
            .merchants
            .get(&merchant_id)
            .cloned()
            .ok_or_else(|| StoreError::not_found("merchant"))
    }

    async fn create_customer(
        &self,
        new_customer: NewMerchantCustomer,
    ) -> StoreResult<MerchantCustomer> {
        let mut state = self.state.lock().await;
        if !state.merchants.contains_key(&new_customer.merchant_id) {
            return Err(StoreError::not_found("merchant"));
        }
        if state
            .customers
            .values()
            .any(|c| c.email == new_customer.email || c.phone == new_customer.phone)
        {
            return Err(StoreError::Conflict(
                "customer email or phone already registered".to_string(),
            ));
        }

        let now = Utc::now();
        let customer = MerchantCustomer {
            id: Uuid::new_v4(),
            merchant_id: new_customer.merchant_id,
            email: new_customer.email,
            phone: new_customer.phone,
            password_hash: new_customer.password_hash,
            name: new_customer.name,
            created_at: now,
            updated_at: now,
        };
        state.customers.insert(customer.id, customer.clone());
        Ok(customer)
    }

    async fn get_customer(&self, customer_id: Uuid) -> StoreResult<MerchantCustomer> {
        let state = self.state.lock().await;
        state
            .customers
            .get(&customer_id)
            .cloned()
            .ok_or_else(|| StoreError::not_found("customer"))
    }

    async fn create_program(&self, new_program: NewProgram) -> StoreResult<Program> {
        let mut state = self.state.lock().await;
        if !state.merchants.contains_key(&new_program.merchant_id) {
            return Err(StoreError::not_found("merchant"));
        }

        let now = Utc::now();
        let program = Program {
            id: Uuid::new_v4(),
            merchant_id: new_program.merchant_id,
            user_id: new_program.user_id,
            program_name: new_program.program_name,
            point_currency_name: new_program.point_currency_name,
            created_at: now,
            updated_at: now,
        };
        state.programs.insert(program.id, program.clone());
        Ok(program)
    }

    async fn get_program(&self, program_id: Uuid) -> StoreResult<Program> {
        let state = self.state.lock().await;
        state
            .programs
            .get(&program_id)
            .cloned()
            .ok_or_else(|| StoreError::not_found("program"))
    }

    async fn create_rule(&self, new_rule: NewProgramRule) -> StoreResult<ProgramRule> {
        let mut state = self.state.lock().await;
        if !state.programs.contains_key(&new_rule.program_id) {
            return Err(StoreError::not_found("program"));
        }

        let now = Utc::now();
        let rule = ProgramRule {
            id: Uuid::new_v4(),
            program_id: new_rule.program_id,
            rule_name: new_rule.rule_name,
            condition_type: new_rule.condition_type,
            condition_value: new_rule.condition_value,
            multiplier: new_rule.multiplier,
            points_awarded: new_rule.points_awarded,
            effective_from: new_rule.effective_from,
            effective_to: new_rule.effective_to,
            created_at: now,
            updated_at: now,
        };
        state.rules.push(rule.clone());
        Ok(rule)
    }

    async fn active_rules(
        &self,
        program_id: Uuid,
        now: DateTime<Utc>,
    ) -> StoreResult<Vec<ProgramRule>> {
        let state = self.state.lock().await;
        Ok(state
            .rules
            .iter()
            .filter(|r| r.program_id == program_id && r.is_active_at(now))
            .cloned()
            .collect())
    }

    async fn create_reward(&self, new_reward: NewReward) -> StoreResult<Reward> {
        let mut state = self.state.lock().await;
        if !state.programs.contains_key(&new_reward.program_id) {
            return Err(StoreError::not_found("program"));
        }

        let now = Utc::now();
        let reward = Reward {
            id: Uuid::new_v4(),
            program_id: new_reward.program_id,
            name: new_reward.name,
            description: new_reward.description,
            points_required: new_reward.points_required,
            quantity: new_reward.quantity,
            available_quantity: new_reward.available_quantity,
            is_active: new_reward.is_active,
            created_at: now,
            updated_at: now,
        };
        state.rewards.insert(reward.id, reward.clone());
        Ok(reward)
    }

    async fn get_reward(&self, reward_id: Uuid) -> StoreResult<Reward> {
        let state = self.state.lock().await;
        state
            .rewards
            .get(&reward_id)
            .cloned()
            .ok_or_else(|| StoreError::not_found("reward"))
    }
}

#[async_trait]
impl RedemptionStore for MemoryStore {
    async fn reserve_reward(&self, reward_id: Uuid) -> StoreResult<Reward> {
        let mut state = self.state.lock().await;
        let reward = state
            .rewards
            .get_mut(&reward_id)
            .ok_or_else(|| StoreError::not_found("reward"))?;

        if !reward.is_available() {
            return Err(StoreError::RewardUnavailable);
        }
        if let Some(left) = reward.available_quantity.as_mut() {
            *left -= 1;
            reward.updated_at = Utc::now();
        }
        Ok(reward.clone())
    }

    async fn release_reward(&self, reward_id: Uuid) -> StoreResult<()> {
        let mut state = self.state.lock().await;
        state.release_reward(reward_id);
        Ok(())
    }

    async fn insert_redemption(&self, new_redemption: NewRedemption) -> StoreResult<Redemption> {
        let mut state = self.state.lock().await;
        if !state.customers.contains_key(&new_redemption.merchant_customers_id) {
            return Err(StoreError::not_found("customer"));
        }
        if !state.rewards.contains_key(&new_redemption.reward_id) {
            return Err(StoreError::not_found("reward"));
        }

        let now = Utc::now();
        let redemption = Redemption {
            id: Uuid::new_v4(),
            merchant_customers_id: new_redemption.merchant_customers_id,
            reward_id: new_redemption.reward_id,
            points_used: new_redemption.points_used,
            redemption_date: new_redemption.redemption_date,
            status: new_redemption.status,
            transaction_id: None,
            created_at: now,
            updated_at: now,
        };
        state.redemptions.insert(redemption.id, redemption.clone());
        Ok(redemption)
    }

    async fn get_redemption(&self, redemption_id: Uuid) -> StoreResult<Redemption> {
        let state = self.state.lock().await;
        state
            .redemptions
            .get(&redemption_id)
            .cloned()
            .ok_or_else(|| StoreError::not_found("redemption"))
    }

    async fn attach_redemption_transaction(
        &self,
        redemption_id: Uuid,
        transaction_id: Uuid,
    ) -> StoreResult<Redemption> {
        let mut state = self.state.lock().await;
        let redemption = state
            .redemptions
            .get_mut(&redemption_id)
            .ok_or_else(|| StoreError::not_found("redemption"))?;
        redemption.transaction_id = Some(transaction_id);
        redemption.updated_at = Utc::now();
        Ok(redemption.clone())
    }

    async fn transition_redemption(
        &self,
        redemption_id: Uuid,
        to: RedemptionStatus,
        refund: Option<RefundPlan>,
    ) -> StoreResult<RedemptionTransition> {
        // A refund touches the ledger, so take the pair lock before the state lock
        let pair = match &refund {
            Some(plan) => {
                let customer_id = self.get_redemption(redemption_id).await?.merchant_customers_id;
                Some(self.pair_lock(customer_id, plan.transaction.program_id).await)
            },
            None => None,
        };
        let _serialized = match &pair {
            Some(lock) => Some(lock.lock().await),
            None => None,
        };

        let mut state = self.state.lock().await;
        let current = state
            .redemptions
            .get(&redemption_id)
            .cloned()
            .ok_or_else(|| StoreError::not_found("redemption"))?;
        let previous = current.status;

        if previous == to {
            return Ok(RedemptionTransition {
                redemption: current,
                previous,
                refund: None,
            });
        }
        check_redemption_transition(previous, to)?;

        let mut outcome = None;
        if to == RedemptionStatus::Canceled && previous.refunds_on_cancel() {
            let plan = refund.ok_or_else(|| {
                StoreError::Validation("refund details required to cancel".to_string())
            })?;
            let movement = PointsMovement::earn(plan.points)?;

            let mut refund_tx = plan.transaction;
            refund_tx.status = TransactionStatus::Completed;
            let transaction = state.insert_transaction(refund_tx)?;
            let entry = state.append_entry(
                current.merchant_customers_id,
                transaction.program_id,
                transaction.transaction_id,
                movement,
            )?;
            state.release_reward(current.reward_id);
            outcome = Some(RefundOutcome { transaction, entry });
        }

        let redemption = state
            .redemptions
            .get_mut(&redemption_id)
            .ok_or_else(|| StoreError::not_found("redemption"))?;
        redemption.status = to;
        redemption.updated_at = Utc::now();

        Ok(RedemptionTransition {
            redemption: redemption.clone(),
            previous,
            refund: outcome,
        })
    }
}

#[async_trait]
impl EventLogStore for MemoryStore {
    async fn insert_event(&self, new_event: NewEventLog) -> StoreResult<EventLog> {
        let mut state = self.state.lock().await;
        let now = Utc::now();
        let event = EventLog {
            id: Uuid::new_v4(),
            event_type: new_event.event_type,
            actor_id: new_event.actor_id,
            actor_type: new_event.actor_type,
            details: new_event.details,
            event_timestamp: now,
            reference_id: new_event.reference_id,
            created_at: now,
        };
        state.events.push(event.clone());
        Ok(event)
    }

    async fn events_by_reference(&self, reference_id: Uuid) -> StoreResult<Vec<EventLog>> {
        let state = self.state.lock().await;
        Ok(state
            .events
            .iter()
            .filter(|e| e.reference_id == Some(reference_id))
            .cloned()
            .collect())
    }
}

/// Session cache held in process memory; honours expiry like Redis TTLs
#[derive(Default)]
pub struct MemorySessionCache {
    sessions: RwLock<HashMap<Uuid, Session>>,
}

impl MemorySessionCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }
}

#[async_trait]
impl SessionCache for MemorySessionCache {
    async fn store(&self, session: &Session) -> StoreResult<()> {
        if session.is_expired_at(Utc::now()) {
            return Err(StoreError::Validation("session already expired".to_string()));
        }
        self.sessions
            .write()
            .await
            .insert(session.user_id, session.clone());
        Ok(())
    }

    async fn get(&self, user_id: Uuid) -> StoreResult<Option<Session>> {
        let mut sessions = self.sessions.write().await;
        match sessions.get(&user_id) {
            Some(session) if session.is_expired_at(Utc::now()) => {
                sessions.remove(&user_id);
                Ok(None)
            },
            other => Ok(other.cloned()),
        }
    }

    async fn delete(&self, user_id: Uuid) -> StoreResult<()> {
        self.sessions.write().await.remove(&user_id);
        Ok(())
    }

    async fn refresh(&self, user_id: Uuid, new_token: &str, ttl: Duration) -> StoreResult<Session> {
        let mut sessions = self.sessions.write().await;
        let session = sessions
            .get_mut(&user_id)
            .filter(|s| !s.is_expired_at(Utc::now()))
            .ok_or_else(|| StoreError::not_found("session"))?;

        session
            .rotate(new_token, ttl, Utc::now())
            .ok_or_else(|| StoreError::Validation("refresh ttl must be positive".to_string()))?;
        Ok(session.clone())
    }

    async fn delete_all(&self) -> StoreResult<usize> {
        let mut sessions = self.sessions.write().await;
        let removed = sessions.len();
        sessions.clear();
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Amount, MerchantStatus, MerchantType, TransactionType};

    struct Fixture {
        store: Arc<MemoryStore>,
        customer: Uuid,
        program: Uuid,
        merchant: Uuid,
    }

    async fn fixture() -> Fixture {
        let store = Arc::new(MemoryStore::new());
        let owner = store
            .create_user(NewUser {
                email: "owner@shop.io".to_string(),
                password_hash: "x".to_string(),
                name: "Owner".to_string(),
                phone: "+100".to_string(),
                status: UserStatus::Active,
            })
            .await
            .unwrap();
        let merchant = store
            .create_merchant(
                NewMerchant {
                    user_id: owner.id,
                    name: "Shop".to_string(),
                    merchant_type: MerchantType::Ecommerce,
                    status: MerchantStatus::Active,
                },
                5,
            )
            .await
            .unwrap();
        let customer = store
            .create_customer(NewMerchantCustomer {
                merchant_id: merchant.id,
                email: "c@shop.io".to_string(),
                phone: "+200".to_string(),
                password_hash: "x".to_string(),
                name: "Cust".to_string(),
            })
            .await
            .unwrap();
        let program = store
            .create_program(NewProgram {
                merchant_id: merchant.id,
                user_id: owner.id,
                program_name: "Stars".to_string(),
                point_currency_name: "star".to_string(),
            })
            .await
            .unwrap();

        Fixture {
            store,
            customer: customer.id,
            program: program.id,
            merchant: merchant.id,
        }
    }

    async fn transaction(f: &Fixture) -> Uuid {
        f.store
            .insert_transaction(NewTransaction {
                merchant_id: f.merchant,
                merchant_customers_id: f.customer,
                program_id: f.program,
                transaction_type: TransactionType::Purchase,
                transaction_amount: Amount::from_whole_units(1).unwrap(),
                transaction_date: Utc::now(),
                branch_id: None,
                status: TransactionStatus::Pending,
            })
            .await
            .unwrap()
            .transaction_id
    }

    #[tokio::test]
    async fn test_concurrent_appends_keep_running_sum() {
        let f = fixture().await;
        let tx = transaction(&f).await;
        f.store
            .append_entry(f.customer, f.program, tx, PointsMovement::earn(100).unwrap())
            .await
            .unwrap();

        let mut handles = Vec::new();
        for i in 0..40 {
            let store = f.store.clone();
            let (customer, program) = (f.customer, f.program);
            handles.push(tokio::spawn(async move {
                let movement = if i % 2 == 0 {
                    PointsMovement::earn(3).unwrap()
                } else {
                    PointsMovement::redeem(7).unwrap()
                };
                store.append_entry(customer, program, tx, movement).await
            }));
        }

        let mut expected = 100;
        for handle in handles {
            if let Ok(entry) = handle.await.unwrap() {
                expected += entry.points_earned - entry.points_redeemed;
            }
        }

        let entries = f.store.entries(f.customer, f.program).await.unwrap();
        assert_eq!(entries[0].points_balance, expected);
        assert!(entries.iter().all(|e| e.points_balance >= 0));
        let sum: i64 = entries.iter().map(|e| e.points_earned - e.points_redeemed).sum();
        assert_eq!(sum, expected);
    }

    #[tokio::test]
    async fn test_append_requires_existing_transaction() {
        let f = fixture().await;
        let err = f
            .store
            .append_entry(f.customer, f.program, Uuid::new_v4(), PointsMovement::earn(5).unwrap())
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_merchant_limit_and_unique_name() {
        let f = fixture().await;
        let owner = f.store.get_merchant(f.merchant).await.unwrap().user_id;

        let duplicate = f
            .store
            .create_merchant(
                NewMerchant {
                    user_id: owner,
                    name: "Shop".to_string(),
                    merchant_type: MerchantType::Bank,
                    status: MerchantStatus::Active,
                },
                5,
            )
            .await
            .unwrap_err();
        assert!(matches!(duplicate, StoreError::Conflict(_)));

        let over_limit = f
            .store
            .create_merchant(
                NewMerchant {
                    user_id: owner,
                    name: "Second".to_string(),
                    merchant_type: MerchantType::Bank,
                    status: MerchantStatus::Active,
                },
                1,
            )
            .await
            .unwrap_err();
        assert!(matches!(over_limit, StoreError::MerchantLimitReached { limit: 1 }));
    }

    #[tokio::test]
    async fn test_login_attempts_increment_and_reset() {
        let store = MemoryStore::new();
        assert_eq!(store.update_login_attempts("a@b.co", true).await.unwrap().attempt_count, 1);
        assert_eq!(store.update_login_attempts("a@b.co", true).await.unwrap().attempt_count, 2);
        store.set_lockout("a@b.co", Utc::now() + Duration::minutes(5)).await.unwrap();

        let reset = store.update_login_attempts("a@b.co", false).await.unwrap();
        assert_eq!(reset.attempt_count, 0);
        assert!(reset.locked_until.is_none());
    }

    #[tokio::test]
    async fn test_session_cache_refresh_requires_existing_session() {
        let cache = MemorySessionCache::new();
        let user_id = Uuid::new_v4();
        assert!(cache.refresh(user_id, "t2", Duration::hours(1)).await.is_err());

        cache
            .store(&Session {
                user_id,
                token_hash: "t1".to_string(),
                expires_at: Utc::now() + Duration::hours(1),
            })
            .await
            .unwrap();
        let refreshed = cache.refresh(user_id, "t2", Duration::hours(2)).await.unwrap();
        assert_eq!(refreshed.token_hash, "t2");
        assert_eq!(cache.get(user_id).await.unwrap().unwrap().token_hash, "t2");

        assert_eq!(cache.delete_all().await.unwrap(), 1);
        assert!(cache.is_empty().await);
    }
}
