use axum::http::{header, HeaderName, HeaderValue, Method};
use tower_http::cors::{AllowOrigin, CorsLayer};
use tracing::{debug, warn};

use crate::handlers::cookies::{CSRF_HEADER, USER_ID_HEADER};

/// CORS with credentials. A `*` origin outside production reflects the caller's
/// origin; otherwise only listed origins are allowed.
pub fn cors_layer(allowed_origins: &[String], production: bool) -> CorsLayer {
    let has_wildcard = allowed_origins.iter().any(|o| o == "*");

    let allow_origin = if has_wildcard && !production {
        debug!("CORS: reflecting request origin");
        AllowOrigin::mirror_request()
    } else {
        let origins: Vec<HeaderValue> = allowed_origins
            .iter()
            .filter(|o| o.as_str() != "*")
            .filter_map(|o| match HeaderValue::from_str(o) {
                Ok(value) => Some(value),
                Err(_) => {
                    warn!("CORS: ignoring invalid origin {}", o);
                    None
                },
            })
            .collect();
        AllowOrigin::list(origins)
    };

    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_credentials(true)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([
            header::CONTENT_TYPE,
            header::AUTHORIZATION,
            header::ACCEPT,
            header::ORIGIN,
            HeaderName::from_static(CSRF_HEADER),
            HeaderName::from_static(USER_ID_HEADER),
        ])
        .expose_headers([HeaderName::from_static(CSRF_HEADER)])
        .max_age(std::time::Duration::from_secs(3600))
}
