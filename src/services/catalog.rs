// Merchant catalog: merchants, their customers, programs, rules and rewards.
// Used for seeding; there are no HTTP handlers for it.

use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::sync::Arc;
use tracing::{info, instrument, warn};
use uuid::Uuid;
use validator::Validate;

use crate::app_config::PointsSettings;
use crate::models::{
    Merchant, MerchantCustomer, MerchantStatus, MerchantType, NewMerchant, NewMerchantCustomer,
    NewProgram, NewProgramRule, NewReward, Program, ProgramRule, Reward, RuleCondition,
};
use crate::repository::{CatalogStore, UserStore};
use crate::utils::validation::{normalize_email, validate_email_address, validate_phone};
use crate::utils::{hash_password_with_config, PasswordConfig, ServiceError};

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateMerchantRequest {
    pub user_id: Uuid,
    #[validate(length(min = 1, max = 255, message = "Merchant name must be 1-255 characters"))]
    pub name: String,
    pub merchant_type: MerchantType,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateCustomerRequest {
    pub merchant_id: Uuid,
    #[validate(custom(function = "validate_email_address"))]
    pub email: String,
    #[validate(custom(function = "validate_phone"))]
    pub phone: String,
    #[validate(length(min = 8, max = 128, message = "Password must be 8-128 characters"))]
    pub password: String,
    #[validate(length(min = 1, max = 255, message = "Name must be 1-255 characters"))]
    pub name: String,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateProgramRequest {
    pub merchant_id: Uuid,
    pub user_id: Uuid,
    #[validate(length(min = 1, max = 255, message = "Program name must be 1-255 characters"))]
    pub program_name: String,
    #[validate(length(min = 1, max = 64, message = "Currency name must be 1-64 characters"))]
    pub point_currency_name: String,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateRuleRequest {
    pub program_id: Uuid,
    #[validate(length(min = 1, max = 255, message = "Rule name must be 1-255 characters"))]
    pub rule_name: String,
    pub condition_type: String,
    pub condition_value: String,
    #[validate(range(min = 0.0, message = "Multiplier must not be negative"))]
    pub multiplier: f64,
    #[validate(range(min = 0, message = "Awarded points must not be negative"))]
    pub points_awarded: i64,
    pub effective_from: Option<DateTime<Utc>>,
    pub effective_to: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateRewardRequest {
    pub program_id: Uuid,
    #[validate(length(min = 1, max = 255, message = "Reward name must be 1-255 characters"))]
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[validate(range(min = 1, message = "Reward must cost at least one point"))]
    pub points_required: i64,
    /// Units in stock; `None` means unlimited
    #[validate(range(min = 0, message = "Stock must not be negative"))]
    pub stock: Option<i32>,
    #[serde(default = "default_active")]
    pub is_active: bool,
}

fn default_active() -> bool {
    true
}

#[derive(Clone)]
pub struct CatalogService {
    catalog: Arc<dyn CatalogStore>,
    users: Arc<dyn UserStore>,
    settings: PointsSettings,
    password_config: PasswordConfig,
}

impl CatalogService {
    pub fn new(
        catalog: Arc<dyn CatalogStore>,
        users: Arc<dyn UserStore>,
        settings: PointsSettings,
        password_config: PasswordConfig,
    ) -> Self {
        Self {
            catalog,
            users,
            settings,
            password_config,
        }
    }

    #[instrument(skip(self, req), fields(user_id = %req.user_id))]
    pub async fn create_merchant(&self, req: CreateMerchantRequest) -> Result<Merchant, ServiceError> {
        req.validate()?;
        self.users.find_user_by_id(req.user_id).await?;

        let merchant = self
            .catalog
            .create_merchant(
                NewMerchant {
                    user_id: req.user_id,
                    name: req.name.trim().to_string(),
                    merchant_type: req.merchant_type,
                    status: MerchantStatus::Active,
                },
                self.settings.max_merchants_per_user,
            )
            .await?;

        info!(merchant_id = %merchant.id, "Merchant created");
        Ok(merchant)
    }

    pub async fn get_merchant(&self, merchant_id: Uuid) -> Result<Merchant, ServiceError> {
        Ok(self.catalog.get_merchant(merchant_id).await?)
    }

    #[instrument(skip(self, req), fields(merchant_id = %req.merchant_id))]
    pub async fn create_customer(
        &self,
        req: CreateCustomerRequest,
    ) -> Result<MerchantCustomer, ServiceError> {
        req.validate()?;
        self.catalog.get_merchant(req.merchant_id).await?;

        let password_hash = hash_password_with_config(&req.password, &self.password_config)
            .map_err(|e| ServiceError::Internal(e.to_string()))?;

        let customer = self
            .catalog
            .create_customer(NewMerchantCustomer {
                merchant_id: req.merchant_id,
                email: normalize_email(&req.email),
                phone: req.phone.trim().to_string(),
                password_hash,
                name: req.name.trim().to_string(),
            })
            .await?;

        info!(customer_id = %customer.id, "Merchant customer created");
        Ok(customer)
    }

    pub async fn get_customer(&self, customer_id: Uuid) -> Result<MerchantCustomer, ServiceError> {
        Ok(self.catalog.get_customer(customer_id).await?)
    }

    pub async fn create_program(&self, req: CreateProgramRequest) -> Result<Program, ServiceError> {
        req.validate()?;
        let merchant = self.catalog.get_merchant(req.merchant_id).await?;
        if merchant.user_id != req.user_id {
            return Err(ServiceError::Forbidden(
                "merchant belongs to another user".to_string(),
            ));
        }

        Ok(self
            .catalog
            .create_program(NewProgram {
                merchant_id: req.merchant_id,
                user_id: req.user_id,
                program_name: req.program_name.trim().to_string(),
                point_currency_name: req.point_currency_name.trim().to_string(),
            })
            .await?)
    }

    pub async fn get_program(&self, program_id: Uuid) -> Result<Program, ServiceError> {
        Ok(self.catalog.get_program(program_id).await?)
    }

    pub async fn create_rule(&self, req: CreateRuleRequest) -> Result<ProgramRule, ServiceError> {
        req.validate()?;
        self.catalog.get_program(req.program_id).await?;

        let effective_from = req.effective_from.unwrap_or_else(Utc::now);
        if let Some(to) = req.effective_to {
            if to < effective_from {
                return Err(ServiceError::Validation(
                    "effective_to must not precede effective_from".to_string(),
                ));
            }
        }
        if RuleCondition::parse(&req.condition_type).is_none() {
            // Stored anyway; the rules policy skips it at evaluation time
            warn!(condition_type = %req.condition_type, "Unknown rule condition type");
        }

        Ok(self
            .catalog
            .create_rule(NewProgramRule {
                program_id: req.program_id,
                rule_name: req.rule_name.trim().to_string(),
                condition_type: req.condition_type,
                condition_value: req.condition_value.trim().to_string(),
                multiplier: req.multiplier,
                points_awarded: req.points_awarded,
                effective_from,
                effective_to: req.effective_to,
            })
            .await?)
    }

    pub async fn create_reward(&self, req: CreateRewardRequest) -> Result<Reward, ServiceError> {
        req.validate()?;
        self.catalog.get_program(req.program_id).await?;

        Ok(self
            .catalog
            .create_reward(NewReward {
                program_id: req.program_id,
                name: req.name.trim().to_string(),
                description: req.description,
                points_required: req.points_required,
                quantity: req.stock.unwrap_or(0),
                available_quantity: req.stock,
                is_active: req.is_active,
            })
            .await?)
    }

    pub async fn get_reward(&self, reward_id: Uuid) -> Result<Reward, ServiceError> {
        Ok(self.catalog.get_reward(reward_id).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app_config::PointsPolicyKind;
    use crate::models::{NewUser, UserStatus};
    use crate::repository::MemoryStore;
    use crate::utils::BusinessCode;

    async fn service(limit: i64) -> (CatalogService, Uuid) {
        let store = Arc::new(MemoryStore::new());
        let owner = store
            .create_user(NewUser {
                email: "o@x.io".into(),
                password_hash: "x".into(),
                name: "O".into(),
                phone: "+1".into(),
                status: UserStatus::Active,
            })
            .await
            .unwrap();
        let settings = PointsSettings {
            policy: PointsPolicyKind::Fixed,
            max_merchants_per_user: limit,
        };
        (
            CatalogService::new(store.clone(), store, settings, PasswordConfig::fast()),
            owner.id,
        )
    }

    fn merchant(user_id: Uuid, name: &str) -> CreateMerchantRequest {
        CreateMerchantRequest {
            user_id,
            name: name.to_string(),
            merchant_type: MerchantType::Bank,
        }
    }

    #[tokio::test]
    async fn test_merchant_entitlement() {
        let (service, owner) = service(2).await;
        service.create_merchant(merchant(owner, "One")).await.unwrap();

        let dup = service.create_merchant(merchant(owner, "One")).await.unwrap_err();
        assert!(matches!(dup, ServiceError::Conflict(_)));

        service.create_merchant(merchant(owner, "Two")).await.unwrap();
        let err = service.create_merchant(merchant(owner, "Three")).await.unwrap_err();
        assert!(err.is_business(BusinessCode::MaxMerchantsExceeded));
    }

    #[tokio::test]
    async fn test_customer_email_is_normalized_and_password_hashed() {
        let (service, owner) = service(5).await;
        let m = service.create_merchant(merchant(owner, "Shop")).await.unwrap();

        let customer = service
            .create_customer(CreateCustomerRequest {
                merchant_id: m.id,
                email: "  Buyer@Shop.IO ".into(),
                phone: "+44 20 7946 0000".into(),
                password: "correct horse".into(),
                name: "Buyer".into(),
            })
            .await
            .unwrap();
        assert_eq!(customer.email, "buyer@shop.io");
        assert!(customer.password_hash.starts_with("$argon2"));
    }

    #[tokio::test]
    async fn test_invalid_requests_rejected() {
        let (service, owner) = service(5).await;
        let m = service.create_merchant(merchant(owner, "Shop")).await.unwrap();

        let err = service
            .create_customer(CreateCustomerRequest {
                merchant_id: m.id,
                email: "not-an-email".into(),
                phone: "+1".into(),
                password: "longenough".into(),
                name: "B".into(),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Validation(_)));

        let program = service
            .create_program(CreateProgramRequest {
                merchant_id: m.id,
                user_id: owner,
                program_name: "Stars".into(),
                point_currency_name: "star".into(),
            })
            .await
            .unwrap();
        let err = service
            .create_reward(CreateRewardRequest {
                program_id: program.id,
                name: "Free".into(),
                description: String::new(),
                points_required: 0,
                stock: None,
                is_active: true,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Validation(_)));
    }

    #[tokio::test]
    async fn test_program_requires_merchant_owner() {
        let (service, owner) = service(5).await;
        let m = service.create_merchant(merchant(owner, "Shop")).await.unwrap();
        let err = service
            .create_program(CreateProgramRequest {
                merchant_id: m.id,
                user_id: Uuid::new_v4(),
                program_name: "Stars".into(),
                point_currency_name: "star".into(),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Forbidden(_)));
    }
}
