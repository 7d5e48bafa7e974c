//! Request-scoped access to [`Settings`].
//!
//! The API reads the transition guard and the auth settings per request, so
//! the loaded settings ride along in the depot rather than in a global.

use std::sync::Arc;

use salvo::async_trait;
pub use adventuremeets_core::config::*;

use crate::error::{AppError, AppResult};
use adventuremeets_core::error::CoreError;

/// Hoop that exposes the meets API settings to every handler below it.
pub struct ConfigHandler {
    shared: Arc<Settings>,
}

impl ConfigHandler {
    #[must_use]
    pub fn new(settings: Settings) -> Self {
        Self {
            shared: Arc::new(settings),
        }
    }
}

#[async_trait]
impl salvo::Handler for ConfigHandler {
    async fn handle(
        &self,
        _req: &mut salvo::Request,
        depot: &mut salvo::Depot,
        _res: &mut salvo::Response,
        _ctrl: &mut salvo::FlowCtrl,
    ) {
        depot.inject(Arc::clone(&self.shared));
    }
}

/// ## Summary
/// Returns the settings injected by [`ConfigHandler`].
///
/// ## Errors
/// Returns `InvariantViolation` when the route was mounted without the hoop;
/// the auth middleware turns that into a 500.
pub fn get_config_from_depot(depot: &salvo::Depot) -> AppResult<Arc<Settings>> {
    depot
        .obtain::<Arc<Settings>>()
        .cloned()
        .map_err(|_err| AppError::CoreError(CoreError::InvariantViolation("Configuration not found in depot")))
}
