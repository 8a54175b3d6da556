// Application state and configuration
use std::sync::Arc;
use std::time::Duration;

use crate::{
    app_config::{AppConfig, AuthSettings, EventSettings, PointsSettings},
    db::{DatabasePools, RedisPool},
    handlers::cookies::CookiePolicy,
    repository::{MemorySessionCache, MemoryStore, Stores},
    services::{
        build_policy, AuthService, CatalogService, EventEmitter, PointsService, RedemptionService,
        SessionAuthenticator, TransactionService,
    },
    utils::PasswordConfig,
};

/// What the stores run on; the health check reports it
#[derive(Clone)]
pub enum Backend {
    Postgres {
        pools: DatabasePools,
        redis_pool: RedisPool,
    },
    Memory {
        store: Arc<MemoryStore>,
        sessions: Arc<MemorySessionCache>,
    },
}

/// Tunables the services are built from
#[derive(Clone)]
pub struct ServiceSettings {
    pub auth: AuthSettings,
    pub points: PointsSettings,
    pub events: EventSettings,
    pub cookie_secure: bool,
    pub password: PasswordConfig,
}

impl Default for ServiceSettings {
    fn default() -> Self {
        Self {
            auth: AuthSettings::default(),
            points: PointsSettings::default(),
            events: EventSettings::default(),
            cookie_secure: false,
            password: PasswordConfig::default(),
        }
    }
}

impl ServiceSettings {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            auth: config.auth.clone(),
            points: config.points.clone(),
            events: config.events.clone(),
            cookie_secure: config.security.cookie_secure,
            password: PasswordConfig::default(),
        }
    }

    /// Cheap password hashing for test suites
    pub fn for_tests() -> Self {
        Self {
            password: PasswordConfig::fast(),
            ..Self::default()
        }
    }
}

// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub stores: Stores,
    pub backend: Backend,
    pub auth_service: Arc<AuthService>,
    pub authenticator: Arc<SessionAuthenticator>,
    pub points_service: Arc<PointsService>,
    pub transaction_service: Arc<TransactionService>,
    pub redemption_service: Arc<RedemptionService>,
    pub catalog_service: Arc<CatalogService>,
    pub events: EventEmitter,
    pub cookies: CookiePolicy,
}

impl AppState {
    pub fn new(stores: Stores, backend: Backend, settings: ServiceSettings) -> Self {
        let events = EventEmitter::new(
            stores.events.clone(),
            Duration::from_millis(settings.events.emit_timeout_ms),
        );
        let points_service = PointsService::new(stores.ledger.clone());
        let policy = build_policy(
            settings.points.policy,
            stores.catalog.clone(),
            stores.transactions.clone(),
        );
        let transaction_service = TransactionService::new(
            stores.catalog.clone(),
            stores.transactions.clone(),
            points_service.clone(),
            policy,
            events.clone(),
        );
        let redemption_service = RedemptionService::new(
            stores.catalog.clone(),
            stores.redemptions.clone(),
            transaction_service.clone(),
            points_service.clone(),
            events.clone(),
        );
        let catalog_service = CatalogService::new(
            stores.catalog.clone(),
            stores.users.clone(),
            settings.points.clone(),
            settings.password.clone(),
        );
        let auth_service = AuthService::new(
            stores.users.clone(),
            stores.credentials.clone(),
            stores.sessions.clone(),
            settings.auth.clone(),
            settings.password.clone(),
        );
        let authenticator =
            SessionAuthenticator::new(stores.credentials.clone(), stores.sessions.clone());

        let cookies = CookiePolicy {
            secure: settings.cookie_secure,
            max_age_seconds: settings.auth.token_ttl_seconds,
        };

        Self {
            stores,
            backend,
            auth_service: Arc::new(auth_service),
            authenticator: Arc::new(authenticator),
            points_service: Arc::new(points_service),
            transaction_service: Arc::new(transaction_service),
            redemption_service: Arc::new(redemption_service),
            catalog_service: Arc::new(catalog_service),
            events,
            cookies,
        }
    }

    /// State over fresh in-memory stores
    pub fn in_memory(settings: ServiceSettings) -> Self {
        let store = Arc::new(MemoryStore::new());
        let sessions = Arc::new(MemorySessionCache::new());
        let stores = Stores::in_memory(store.clone(), sessions.clone());
        Self::new(stores, Backend::Memory { store, sessions }, settings)
    }

    pub fn memory_store(&self) -> Option<Arc<MemoryStore>> {
        match &self.backend {
            Backend::Memory { store, .. } => Some(store.clone()),
            Backend::Postgres { .. } => None,
        }
    }
}
