use salvo::writing::Json;
use salvo::{Depot, Request, handler};

use super::{repository, uuid_param};
use crate::config::get_config_from_depot;
use crate::error::AppResult;
use crate::middleware::auth::require_actor;
use adventuremeets_core::error::CoreError;
use adventuremeets_db::model::meet::Meet;
use adventuremeets_service::meet;
use adventuremeets_service::remote::StatusUpdate;

/// ## Summary
/// PATCH /api/v1/meets/{id}/status - Sets a meet's status.
///
/// Accepts the worker credential or an organizer who manages the meet. Body:
/// `{ "statusId": n }`. Whether the edge is checked against the transition
/// table depends on `status.transition_guard`.
///
/// ## Errors
/// Returns HTTP 400 for a malformed body or unknown status id, 401 without
/// credentials, 404 for an unknown meet, and 409 when the strict guard
/// refuses the edge.
#[handler]
pub async fn update_status(req: &mut Request, depot: &mut Depot) -> AppResult<Json<Meet>> {
    let actor = require_actor(depot)?;
    let meet_id = uuid_param(req, "id")?;
    let body: StatusUpdate = req.parse_json().await.map_err(|e| {
        tracing::debug!(error = %e, "Failed to parse status update");
        CoreError::InvalidInput("Body must be { \"statusId\": number }".to_string())
    })?;

    let repo = repository(depot)?;
    let settings = get_config_from_depot(depot)?;

    let meet = meet::change_status(
        repo.as_ref(),
        meet_id,
        body.status_id,
        &actor,
        settings.status.transition_guard,
    )
    .await?;
    Ok(Json(meet))
}
