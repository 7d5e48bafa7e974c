mod app_specific;
mod meets;

use salvo::Router;

use crate::middleware::auth::AuthMiddleware;

// Re-export route constants from core
pub use adventuremeets_core::constants::{
    API_ROUTE_COMPONENT, API_ROUTE_PREFIX, API_VERSION_COMPONENT, MEETS_ROUTE_COMPONENT,
    MEETS_ROUTE_PREFIX,
};

/// ## Summary
/// Constructs the API router: the healthcheck plus the versioned meet routes.
#[must_use]
pub fn routes() -> Router {
    Router::with_path(API_ROUTE_COMPONENT)
        .hoop(AuthMiddleware)
        .push(app_specific::routes())
        .push(Router::with_path(API_VERSION_COMPONENT).push(meets::routes()))
}
