// Middleware modules for the loyalty backend
// Session authentication, CSRF double-submit check and CORS

pub mod auth;
pub mod auth_middleware;
pub mod cors;
pub mod csrf;

// Re-export auth types
pub use auth::AuthenticatedUser;
pub use auth_middleware::auth_middleware;
pub use cors::cors_layer;
pub use csrf::csrf_middleware;
