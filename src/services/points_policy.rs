// Translation of a monetary transaction into a signed points delta

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::app_config::PointsPolicyKind;
use crate::models::{
    Amount, MerchantCustomer, ProgramRule, RuleCondition, Transaction, TransactionType,
};
use crate::repository::{CatalogStore, TransactionStore};
use crate::utils::ServiceError;

/// Everything a policy may look at when pricing a transaction
#[derive(Debug, Clone)]
pub struct TransactionContext {
    pub transaction: Transaction,
    pub customer: MerchantCustomer,
    pub now: DateTime<Utc>,
}

#[async_trait]
pub trait PointsPolicy: Send + Sync {
    /// Positive earns, negative redeems, zero leaves the ledger alone
    async fn points_delta(&self, ctx: &TransactionContext) -> Result<i64, ServiceError>;
}

/// Per-type formula: purchase +floor(a), refund -floor(a), bonus +floor(2a), redemption -floor(a)
#[derive(Debug, Clone, Copy, Default)]
pub struct FixedPolicy;

impl FixedPolicy {
    pub fn delta(transaction_type: TransactionType, amount: Amount) -> i64 {
        match transaction_type {
            TransactionType::Purchase => amount.whole_units(),
            TransactionType::Refund => -amount.whole_units(),
            TransactionType::Bonus => amount.doubled_whole_units(),
            TransactionType::Redemption => -amount.whole_units(),
        }
    }
}

#[async_trait]
impl PointsPolicy for FixedPolicy {
    async fn points_delta(&self, ctx: &TransactionContext) -> Result<i64, ServiceError> {
        let tx = &ctx.transaction;
        Ok(Self::delta(tx.transaction_type, tx.transaction_amount))
    }
}

/// Active program rules on top of the fixed formula.
///
/// Amount rules whose threshold is met replace the base with
/// `multiplier * floor(amount)`; the other rule kinds add a bonus of
/// `points_awarded * multiplier` (or `points_awarded` when the multiplier is 0).
/// Refunds and redemptions always use the fixed formula.
pub struct RulesPolicy {
    catalog: Arc<dyn CatalogStore>,
    transactions: Arc<dyn TransactionStore>,
}

impl RulesPolicy {
    pub fn new(catalog: Arc<dyn CatalogStore>, transactions: Arc<dyn TransactionStore>) -> Self {
        Self {
            catalog,
            transactions,
        }
    }

    fn scaled(multiplier: f64, base: i64) -> i64 {
        (multiplier * base as f64).floor() as i64
    }

    fn bonus_award(rule: &ProgramRule) -> i64 {
        if rule.multiplier == 0.0 {
            rule.points_awarded
        } else {
            Self::scaled(rule.multiplier, rule.points_awarded)
        }
    }

    fn add_points(total: i64, award: i64) -> Result<i64, ServiceError> {
        total
            .checked_add(award)
            .ok_or_else(|| ServiceError::Validation("points award overflow".to_string()))
    }

    fn parse_threshold<T: std::str::FromStr>(rule: &ProgramRule) -> Option<T> {
        let parsed = rule.condition_value.trim().parse::<T>().ok();
        if parsed.is_none() {
            warn!(
                rule_id = %rule.id,
                condition_value = %rule.condition_value,
                "Ignoring rule with unparseable condition value"
            );
        }
        parsed
    }
}

#[async_trait]
impl PointsPolicy for RulesPolicy {
    async fn points_delta(&self, ctx: &TransactionContext) -> Result<i64, ServiceError> {
        let tx = &ctx.transaction;
        let fixed = FixedPolicy::delta(tx.transaction_type, tx.transaction_amount);

        if matches!(
            tx.transaction_type,
            TransactionType::Refund | TransactionType::Redemption
        ) {
            return Ok(fixed);
        }

        let rules = self.catalog.active_rules(tx.program_id, ctx.now).await?;
        if rules.is_empty() {
            return Ok(fixed);
        }

        let whole_units = tx.transaction_amount.whole_units();
        let mut base: Option<i64> = None;
        let mut bonus = 0i64;
        let mut prior_count: Option<i64> = None;

        for rule in &rules {
            let Some(condition) = rule.condition() else {
                warn!(
                    rule_id = %rule.id,
                    condition_type = %rule.condition_type,
                    "Ignoring rule with unknown condition type"
                );
                continue;
            };

            match condition {
                RuleCondition::TransactionAmount => {
                    if let Some(threshold) = Self::parse_threshold::<f64>(rule) {
                        if tx.transaction_amount.as_f64() >= threshold {
                            let earned = Self::scaled(rule.multiplier, whole_units);
                            base = Some(Self::add_points(base.unwrap_or(0), earned)?);
                        }
                    }
                },
                RuleCondition::TransactionType => {
                    if rule.condition_value.trim() == tx.transaction_type.as_str() {
                        bonus = Self::add_points(bonus, Self::bonus_award(rule))?;
                    }
                },
                RuleCondition::TransactionCount => {
                    if let Some(required) = Self::parse_threshold::<i64>(rule) {
                        let prior = match prior_count {
                            Some(count) => count,
                            None => {
                                // The transaction being priced is already stored
                                let total = self
                                    .transactions
                                    .count_customer_program_transactions(
                                        tx.merchant_customers_id,
                                        tx.program_id,
                                    )
                                    .await?;
                                let count = (total - 1).max(0);
                                prior_count = Some(count);
                                count
                            },
                        };
                        if prior >= required {
                            bonus = Self::add_points(bonus, Self::bonus_award(rule))?;
                        }
                    }
                },
                RuleCondition::Tenure => {
                    if let Some(days) = Self::parse_threshold::<i64>(rule) {
                        let tenure = (ctx.now - ctx.customer.created_at).num_days();
                        if tenure >= days {
                            bonus = Self::add_points(bonus, Self::bonus_award(rule))?;
                        }
                    }
                },
                RuleCondition::TransactionMerchant => {
                    if rule.condition_value.trim() == tx.merchant_id.to_string() {
                        bonus = Self::add_points(bonus, Self::bonus_award(rule))?;
                    }
                },
            }
        }

        let base = base.unwrap_or(fixed);
        let delta = Self::add_points(base, bonus)?;
        debug!(
            transaction_id = %tx.transaction_id,
            base,
            bonus,
            "Rules policy priced transaction"
        );
        Ok(delta)
    }
}

/// Build the configured policy
pub fn build_policy(
    kind: PointsPolicyKind,
    catalog: Arc<dyn CatalogStore>,
    transactions: Arc<dyn TransactionStore>,
) -> Arc<dyn PointsPolicy> {
    match kind {
        PointsPolicyKind::Fixed => Arc::new(FixedPolicy),
        PointsPolicyKind::Rules => Arc::new(RulesPolicy::new(catalog, transactions)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{
        MerchantStatus, MerchantType, NewMerchant, NewMerchantCustomer, NewProgram,
        NewProgramRule, NewTransaction, NewUser, TransactionStatus, UserStatus,
    };
    use crate::repository::{MemoryStore, UserStore};
    use chrono::Duration;

    fn amount(units: f64) -> Amount {
        Amount::from_decimal(units).unwrap()
    }

    #[test]
    fn test_fixed_policy_formula() {
        assert_eq!(FixedPolicy::delta(TransactionType::Purchase, amount(100.0)), 100);
        assert_eq!(FixedPolicy::delta(TransactionType::Purchase, amount(99.99)), 99);
        assert_eq!(FixedPolicy::delta(TransactionType::Refund, amount(12.5)), -12);
        assert_eq!(FixedPolicy::delta(TransactionType::Bonus, amount(10.75)), 21);
        assert_eq!(FixedPolicy::delta(TransactionType::Redemption, amount(40.0)), -40);
        assert_eq!(FixedPolicy::delta(TransactionType::Purchase, amount(0.5)), 0);
    }

    struct Setup {
        store: Arc<MemoryStore>,
        ctx: TransactionContext,
    }

    async fn setup(transaction_type: TransactionType, units: i64) -> Setup {
        let store = Arc::new(MemoryStore::new());
        let owner = store
            .create_user(NewUser {
                email: "owner@shop.io".into(),
                password_hash: "x".into(),
                name: "Owner".into(),
                phone: "+10".into(),
                status: UserStatus::Active,
            })
            .await
            .unwrap();
        let merchant = store
            .create_merchant(
                NewMerchant {
                    user_id: owner.id,
                    name: "Shop".into(),
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
                email: "c@shop.io".into(),
                phone: "+20".into(),
                password_hash: "x".into(),
                name: "C".into(),
            })
            .await
            .unwrap();
        let program = store
            .create_program(NewProgram {
                merchant_id: merchant.id,
                user_id: owner.id,
                program_name: "Stars".into(),
                point_currency_name: "star".into(),
            })
            .await
            .unwrap();
        let transaction = store
            .insert_transaction(NewTransaction {
                merchant_id: merchant.id,
                merchant_customers_id: customer.id,
                program_id: program.id,
                transaction_type,
                transaction_amount: Amount::from_whole_units(units).unwrap(),
                transaction_date: Utc::now(),
                branch_id: None,
                status: TransactionStatus::Pending,
            })
            .await
            .unwrap();

        Setup {
            store,
            ctx: TransactionContext {
                transaction,
                customer,
                now: Utc::now(),
            },
        }
    }

    async fn add_rule(setup: &Setup, condition_type: &str, value: &str, multiplier: f64, award: i64) {
        setup
            .store
            .create_rule(NewProgramRule {
                program_id: setup.ctx.transaction.program_id,
                rule_name: condition_type.to_string(),
                condition_type: condition_type.to_string(),
                condition_value: value.to_string(),
                multiplier,
                points_awarded: award,
                effective_from: Utc::now() - Duration::days(1),
                effective_to: None,
            })
            .await
            .unwrap();
    }

    fn policy(setup: &Setup) -> RulesPolicy {
        RulesPolicy::new(setup.store.clone(), setup.store.clone())
    }

    #[tokio::test]
    async fn test_rules_without_rules_fall_back_to_fixed() {
        let s = setup(TransactionType::Purchase, 100).await;
        assert_eq!(policy(&s).points_delta(&s.ctx).await.unwrap(), 100);
    }

    #[tokio::test]
    async fn test_amount_rule_multiplies_base() {
        let s = setup(TransactionType::Purchase, 100).await;
        add_rule(&s, "program_rule_transaction_amount", "50", 1.5, 0).await;
        add_rule(&s, "program_rule_transaction_amount", "500", 3.0, 0).await;

        assert_eq!(policy(&s).points_delta(&s.ctx).await.unwrap(), 150);
    }

    #[tokio::test]
    async fn test_bonus_rules_add_awards() {
        let s = setup(TransactionType::Purchase, 100).await;
        add_rule(&s, "program_rule_transaction_type", "purchase", 0.0, 25).await;
        add_rule(&s, "program_rule_transaction_merchant", &s.ctx.transaction.merchant_id.to_string(), 2.0, 5).await;
        add_rule(&s, "program_rule_tenure", "30", 0.0, 1000).await;
        add_rule(&s, "program_rule_transaction_count", "1", 0.0, 1000).await;
        add_rule(&s, "program_rule_mystery", "x", 1.0, 1000).await;

        // fixed base 100 + type 25 + merchant 10; tenure and count not yet met
        assert_eq!(policy(&s).points_delta(&s.ctx).await.unwrap(), 135);
    }

    #[tokio::test]
    async fn test_refund_ignores_rules() {
        let s = setup(TransactionType::Refund, 30).await;
        add_rule(&s, "program_rule_transaction_amount", "0", 10.0, 0).await;
        assert_eq!(policy(&s).points_delta(&s.ctx).await.unwrap(), -30);
    }

    #[tokio::test]
    async fn test_expired_rule_is_ignored() {
        let s = setup(TransactionType::Purchase, 10).await;
        s.store
            .create_rule(NewProgramRule {
                program_id: s.ctx.transaction.program_id,
                rule_name: "old".into(),
                condition_type: "program_rule_transaction_type".into(),
                condition_value: "purchase".into(),
                multiplier: 0.0,
                points_awarded: 99,
                effective_from: Utc::now() - Duration::days(10),
                effective_to: Some(Utc::now() - Duration::days(1)),
            })
            .await
            .unwrap();
        assert_eq!(policy(&s).points_delta(&s.ctx).await.unwrap(), 10);
    }

    #[tokio::test]
    async fn test_award_overflow_is_rejected() {
        let s = setup(TransactionType::Purchase, 100).await;
        add_rule(&s, "program_rule_transaction_type", "purchase", 0.0, i64::MAX).await;
        add_rule(&s, "program_rule_tenure", "0", 0.0, 1).await;

        let err = policy(&s).points_delta(&s.ctx).await.unwrap_err();
        assert!(matches!(err, ServiceError::Validation(_)));
    }
}
