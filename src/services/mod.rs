// Services module for the loyalty backend
// Business logic layer between handlers and the store contracts

pub mod auth;
pub mod authenticator;
pub mod background_tasks;
pub mod catalog;
pub mod event_emitter;
pub mod points;
pub mod points_policy;
pub mod redemption;
pub mod transaction;

// Re-export commonly used services
pub use auth::{AuthService, IssuedVerification, LoginOutcome};
pub use authenticator::{AuthenticatedSession, SessionAuthenticator, SessionSource};
pub use background_tasks::{initialize_background_tasks, BackgroundTaskManager, CleanupReport};
pub use catalog::CatalogService;
pub use event_emitter::EventEmitter;
pub use points::{PointsRequest, PointsService};
pub use points_policy::{build_policy, FixedPolicy, PointsPolicy, RulesPolicy, TransactionContext};
pub use redemption::RedemptionService;
pub use transaction::{CreateTransactionRequest, TransactionOutcome, TransactionService};
