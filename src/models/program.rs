// Loyalty programs and the rules attached to them

use chrono::{DateTime, Utc};
use diesel::prelude::*;
use diesel_async::{AsyncPgConnection, RunQueryDsl};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::repository::StoreError;
use crate::schema::{program_rules, programs};

#[derive(Debug, Clone, Serialize, Deserialize, Queryable, Selectable, Identifiable)]
#[diesel(table_name = programs)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct Program {
    pub id: Uuid,
    pub merchant_id: Uuid,
    pub user_id: Uuid,
    pub program_name: String,
    pub point_currency_name: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = programs)]
pub struct NewProgram {
    pub merchant_id: Uuid,
    pub user_id: Uuid,
    pub program_name: String,
    pub point_currency_name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Queryable, Selectable, Identifiable)]
#[diesel(table_name = program_rules)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct ProgramRule {
    pub id: Uuid,
    pub program_id: Uuid,
    pub rule_name: String,
    pub condition_type: String,
    pub condition_value: String,
    pub multiplier: f64,
    pub points_awarded: i64,
    pub effective_from: DateTime<Utc>,
    pub effective_to: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = program_rules)]
pub struct NewProgramRule {
    pub program_id: Uuid,
    pub rule_name: String,
    pub condition_type: String,
    pub condition_value: String,
    pub multiplier: f64,
    pub points_awarded: i64,
    pub effective_from: DateTime<Utc>,
    pub effective_to: Option<DateTime<Utc>>,
}

/// Condition kinds understood by the rules policy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleCondition {
    TransactionAmount,
    TransactionType,
    TransactionCount,
    Tenure,
    TransactionMerchant,
}

impl RuleCondition {
    pub fn parse(condition_type: &str) -> Option<Self> {
        match condition_type {
            "program_rule_transaction_amount" => Some(RuleCondition::TransactionAmount),
            "program_rule_transaction_type" => Some(RuleCondition::TransactionType),
            "program_rule_transaction_count" => Some(RuleCondition::TransactionCount),
            "program_rule_tenure" => Some(RuleCondition::Tenure),
            "program_rule_transaction_merchant" => Some(RuleCondition::TransactionMerchant),
            _ => None,
        }
    }
}

impl Program {
    pub async fn create(
        conn: &mut AsyncPgConnection,
        new_program: NewProgram,
    ) -> Result<Self, StoreError> {
        use crate::schema::programs::dsl::*;

        let program = diesel::insert_into(programs)
            .values(&new_program)
            .returning(Program::as_returning())
            .get_result::<Program>(conn)
            .await?;

        Ok(program)
    }

    pub async fn find_by_id(
        conn: &mut AsyncPgConnection,
        program_id: Uuid,
    ) -> Result<Self, StoreError> {
        use crate::schema::programs::dsl::*;

        programs
            .filter(id.eq(program_id))
            .select(Program::as_select())
            .first::<Program>(conn)
            .await
            .map_err(|e| match e {
                diesel::result::Error::NotFound => StoreError::not_found("program"),
                _ => e.into(),
            })
    }
}

impl ProgramRule {
    /// effective_from <= now and (effective_to is null or effective_to >= now)
    pub fn is_active_at(&self, now: DateTime<Utc>) -> bool {
        self.effective_from <= now && self.effective_to.map_or(true, |to| to >= now)
    }

    pub fn condition(&self) -> Option<RuleCondition> {
        RuleCondition::parse(&self.condition_type)
    }

    pub async fn create(
        conn: &mut AsyncPgConnection,
        new_rule: NewProgramRule,
    ) -> Result<Self, StoreError> {
        use crate::schema::program_rules::dsl::*;

        let rule = diesel::insert_into(program_rules)
            .values(&new_rule)
            .returning(ProgramRule::as_returning())
            .get_result::<ProgramRule>(conn)
            .await?;

        Ok(rule)
    }

    pub async fn active_for_program(
        conn: &mut AsyncPgConnection,
        program_id_val: Uuid,
        now: DateTime<Utc>,
    ) -> Result<Vec<Self>, StoreError> {
        use crate::schema::program_rules::dsl::*;

        let rules = program_rules
            .filter(program_id.eq(program_id_val))
            .filter(effective_from.le(now))
            .filter(effective_to.is_null().or(effective_to.ge(now)))
            .order(created_at.asc())
            .select(ProgramRule::as_select())
            .load::<ProgramRule>(conn)
            .await?;

        Ok(rules)
    }
}
