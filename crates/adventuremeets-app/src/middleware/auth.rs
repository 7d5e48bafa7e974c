use salvo::Depot;
use sha2::{Digest, Sha256};
use tracing::error;
use uuid::Uuid;

use crate::config::get_config_from_depot;
use crate::error::AppResult;
use adventuremeets_core::config::{AuthConfig, AuthMethod};
use adventuremeets_core::constants::{
    REMOTE_ORGANIZATIONS_HEADER, REMOTE_USER_HEADER, WORKER_API_KEY_HEADER,
};
use adventuremeets_service::error::ServiceError;
use adventuremeets_service::meet::Actor;

/// Depot key under which the resolved [`Actor`] is stored.
pub const AUTHENTICATED_ACTOR: &str = "authenticated_actor";

/// ## Summary
/// Compares two credentials without an early exit on the first differing byte.
///
/// Both sides are hashed first so the comparison also takes the same time for
/// keys of different lengths.
fn keys_match(presented: &str, expected: &str) -> bool {
    let presented = Sha256::digest(presented.as_bytes());
    let expected = Sha256::digest(expected.as_bytes());
    presented
        .iter()
        .zip(expected.iter())
        .fold(0u8, |acc, (a, b)| acc | (a ^ b))
        == 0
}

fn header<'a>(req: &'a salvo::Request, name: &str) -> Option<&'a str> {
    req.headers()
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
}

/// ## Summary
/// Works out who sent the request.
///
/// A worker credential on `x-api-key` must equal the configured key; a
/// mismatch is not retried as an organizer. In proxy mode the gateway's
/// `x-remote-user` (and optional comma-separated `x-remote-organizations`)
/// identify an organizer.
///
/// ## Returns
/// `None` for anonymous or unverifiable requests.
#[must_use]
pub fn resolve_actor(req: &salvo::Request, auth: &AuthConfig) -> Option<Actor> {
    if let Some(presented) = header(req, WORKER_API_KEY_HEADER) {
        let expected = auth
            .worker_api_key
            .as_deref()
            .map(str::trim)
            .filter(|key| !key.is_empty());
        return if expected.is_some_and(|expected| keys_match(presented, expected)) {
            Some(Actor::Worker)
        } else {
            tracing::warn!("Rejected worker credential");
            None
        };
    }

    if auth.method != AuthMethod::Proxy {
        return None;
    }

    let user_id = header(req, REMOTE_USER_HEADER)?.parse::<Uuid>().ok()?;
    let organization_ids = header(req, REMOTE_ORGANIZATIONS_HEADER)
        .map(|raw| {
            raw.split(',')
                .filter_map(|id| id.trim().parse::<Uuid>().ok())
                .collect()
        })
        .unwrap_or_default();

    Some(Actor::Organizer {
        user_id,
        organization_ids,
    })
}

/// ## Summary
/// Returns the actor stored by [`AuthMiddleware`].
///
/// ## Errors
/// Returns `NotAuthenticated` for anonymous requests.
pub fn require_actor(depot: &Depot) -> AppResult<Actor> {
    depot
        .get::<Actor>(AUTHENTICATED_ACTOR)
        .cloned()
        .map_err(|_err| ServiceError::NotAuthenticated.into())
}

/// ## Summary
/// Authentication middleware that resolves the caller and stores it in the depot.
/// Anonymous requests pass through; handlers that need a caller use
/// [`require_actor`].
///
/// ## Side Effects
/// Inserts the [`Actor`] under [`AUTHENTICATED_ACTOR`] when one is resolved.
#[salvo::async_trait]
impl salvo::Handler for AuthMiddleware {
    #[tracing::instrument(skip(self, req, depot, res, ctrl), fields(
        method = %req.method(),
        path = %req.uri().path()
    ))]
    async fn handle(
        &self,
        req: &mut salvo::Request,
        depot: &mut Depot,
        res: &mut salvo::Response,
        ctrl: &mut salvo::FlowCtrl,
    ) {
        tracing::trace!("Authenticating request");

        let config = match get_config_from_depot(depot) {
            Ok(cfg) => cfg,
            Err(e) => {
                error!(error = ?e, "Failed to get config from depot");
                res.status_code(salvo::http::StatusCode::INTERNAL_SERVER_ERROR);
                ctrl.skip_rest();
                return;
            }
        };

        match resolve_actor(req, &config.auth) {
            Some(actor) => {
                tracing::debug!(actor = ?actor, "Request authenticated");
                depot.insert(AUTHENTICATED_ACTOR, actor);
            }
            None => tracing::debug!("Request not authenticated, treating as public"),
        }
    }
}

/// ## Summary
/// Middleware handler for authentication.
pub struct AuthMiddleware;
