use salvo::http::StatusCode;
use salvo::writing::Json;
use salvo::{Depot, Request, Response, handler};
use serde::{Deserialize, Serialize};

use super::{repository, uuid_param};
use crate::error::AppResult;
use crate::middleware::auth::require_actor;
use adventuremeets_core::attendee::AttendeeStatus;
use adventuremeets_core::error::CoreError;
use adventuremeets_db::model::attendee::AttendeeView;
use adventuremeets_service::signup::{self, AttendeeFilter, SignupRequest};

#[derive(Debug, Serialize)]
pub struct LookupResponse {
    pub attendee: Option<AttendeeView>,
}

#[derive(Debug, Serialize)]
pub struct AttendeeList {
    pub attendees: Vec<AttendeeView>,
}

#[derive(Debug, Deserialize)]
pub struct AttendeeStatusUpdate {
    pub status: AttendeeStatus,
}

/// ## Summary
/// POST /api/v1/meets/{id}/attendees - Public signup for an open meet.
///
/// ## Errors
/// Returns HTTP 400 without an email or phone, 404 for an unknown meet, and
/// 409 when the meet is not open or the contact is already signed up.
#[handler]
pub async fn sign_up(
    req: &mut Request,
    depot: &mut Depot,
    res: &mut Response,
) -> AppResult<Json<AttendeeView>> {
    let meet_id = uuid_param(req, "id")?;
    let body: SignupRequest = req.parse_json().await.map_err(|e| {
        tracing::debug!(error = %e, "Failed to parse signup");
        CoreError::InvalidInput("Invalid signup body".to_string())
    })?;
    let repo = repository(depot)?;

    let attendee = signup::sign_up(repo.as_ref(), meet_id, body).await?;
    res.status_code(StatusCode::CREATED);
    Ok(Json(attendee))
}

/// ## Summary
/// GET /api/v1/meets/{id}/attendees?filter=all|accepted - The meet's roster in
/// signup order.
///
/// ## Errors
/// Returns HTTP 401 without credentials, 400 for an unknown filter and 404
/// for an unknown meet.
#[handler]
pub async fn list(req: &mut Request, depot: &mut Depot) -> AppResult<Json<AttendeeList>> {
    let actor = require_actor(depot)?;
    let meet_id = uuid_param(req, "id")?;
    let filter = req
        .query::<String>("filter")
        .map(|filter| filter.parse::<AttendeeFilter>())
        .transpose()?
        .unwrap_or_default();
    let repo = repository(depot)?;

    let attendees = signup::list_attendees(repo.as_ref(), meet_id, &actor, filter).await?;
    Ok(Json(AttendeeList { attendees }))
}

/// ## Summary
/// DELETE /api/v1/meets/{id}/attendees/{attendee_id} - Removes a signup.
///
/// ## Errors
/// Returns HTTP 404 for an unknown meet or attendee.
#[handler]
pub async fn remove(req: &mut Request, depot: &mut Depot) -> AppResult<StatusCode> {
    let actor = require_actor(depot)?;
    let meet_id = uuid_param(req, "id")?;
    let attendee_id = uuid_param(req, "attendee_id")?;
    let repo = repository(depot)?;

    signup::remove_attendee(repo.as_ref(), meet_id, attendee_id, &actor).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// ## Summary
/// GET /api/v1/meets/{id}/attendees/lookup?email=&phone= - Finds an existing
/// signup by email or phone.
///
/// ## Errors
/// Returns HTTP 400 when neither query parameter is given.
#[handler]
pub async fn lookup(req: &mut Request, depot: &mut Depot) -> AppResult<Json<LookupResponse>> {
    let meet_id = uuid_param(req, "id")?;
    let email = req.query::<String>("email");
    let phone = req.query::<String>("phone");
    let repo = repository(depot)?;

    let attendee =
        signup::lookup_by_contact(repo.as_ref(), meet_id, email.as_deref(), phone.as_deref())
            .await?;
    Ok(Json(LookupResponse { attendee }))
}

/// ## Summary
/// PATCH /api/v1/meets/{id}/attendees/{attendee_id} - Changes an attendee's
/// status within the meet's capacity and waitlist.
///
/// ## Errors
/// Returns HTTP 400 for an unknown status, 404 for an unknown meet or
/// attendee, and 409 when the meet's limits refuse the change.
#[handler]
pub async fn update_status(req: &mut Request, depot: &mut Depot) -> AppResult<Json<AttendeeView>> {
    let actor = require_actor(depot)?;
    let meet_id = uuid_param(req, "id")?;
    let attendee_id = uuid_param(req, "attendee_id")?;
    let body: AttendeeStatusUpdate = req.parse_json().await.map_err(|e| {
        tracing::debug!(error = %e, "Failed to parse attendee status");
        CoreError::InvalidInput("Body must be { \"status\": string }".to_string())
    })?;
    let repo = repository(depot)?;

    let attendee =
        signup::change_attendee_status(repo.as_ref(), meet_id, attendee_id, body.status, &actor)
            .await?;
    Ok(Json(attendee))
}
