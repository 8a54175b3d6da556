use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::PgStore;
use crate::models::{
    Merchant, MerchantCustomer, NewMerchant, NewMerchantCustomer, NewProgram, NewProgramRule,
    NewReward, Program, ProgramRule, Reward,
};
use crate::repository::{CatalogStore, StoreResult};

#[async_trait]
impl CatalogStore for PgStore {
    async fn create_merchant(&self, new_merchant: NewMerchant, limit: i64) -> StoreResult<Merchant> {
        let mut conn = self.primary().await?;
        Merchant::create_within_limit(&mut conn, new_merchant, limit).await
    }

    async fn get_merchant(&self, merchant_id: Uuid) -> StoreResult<Merchant> {
        let mut conn = self.primary().await?;
        Merchant::find_by_id(&mut conn, merchant_id).await
    }

    async fn create_customer(
        &self,
        new_customer: NewMerchantCustomer,
    ) -> StoreResult<MerchantCustomer> {
        let mut conn = self.primary().await?;
        MerchantCustomer::create(&mut conn, new_customer).await
    }

    async fn get_customer(&self, customer_id: Uuid) -> StoreResult<MerchantCustomer> {
        let mut conn = self.primary().await?;
        MerchantCustomer::find_by_id(&mut conn, customer_id).await
    }

    async fn create_program(&self, new_program: NewProgram) -> StoreResult<Program> {
        let mut conn = self.primary().await?;
        Program::create(&mut conn, new_program).await
    }

    async fn get_program(&self, program_id: Uuid) -> StoreResult<Program> {
        let mut conn = self.primary().await?;
        Program::find_by_id(&mut conn, program_id).await
    }

    async fn create_rule(&self, new_rule: NewProgramRule) -> StoreResult<ProgramRule> {
        let mut conn = self.primary().await?;
        ProgramRule::create(&mut conn, new_rule).await
    }

    async fn active_rules(
        &self,
        program_id: Uuid,
        now: DateTime<Utc>,
    ) -> StoreResult<Vec<ProgramRule>> {
        let mut conn = self.primary().await?;
        ProgramRule::active_for_program(&mut conn, program_id, now).await
    }

    async fn create_reward(&self, new_reward: NewReward) -> StoreResult<Reward> {
        let mut conn = self.primary().await?;
        Reward::create(&mut conn, new_reward).await
    }

    async fn get_reward(&self, reward_id: Uuid) -> StoreResult<Reward> {
        let mut conn = self.primary().await?;
        Reward::find_by_id(&mut conn, reward_id).await
    }
}
