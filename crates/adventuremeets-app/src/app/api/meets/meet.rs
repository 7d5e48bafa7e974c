use salvo::http::StatusCode;
use salvo::writing::Json;
use salvo::{Depot, Request, Response, handler};
use serde::Serialize;

use super::{repository, uuid_param};
use crate::error::AppResult;
use crate::middleware::auth::require_actor;
use adventuremeets_core::error::CoreError;
use adventuremeets_db::model::meet::{Meet, MeetStatusRow};
use adventuremeets_service::meet::{self, MeetPage, MeetPatch, MeetView, MeetWithCounts, NewMeetRequest};

#[derive(Debug, Serialize)]
pub struct StatusCatalogue {
    pub statuses: Vec<MeetStatusRow>,
}

/// ## Summary
/// GET /api/v1/meets/statuses - Lists every meet status ordered by id.
#[handler]
pub async fn list_statuses(depot: &mut Depot) -> AppResult<Json<StatusCatalogue>> {
    let repo = repository(depot)?;
    let statuses = meet::list_statuses(repo.as_ref()).await?;
    Ok(Json(StatusCatalogue { statuses }))
}

/// ## Summary
/// GET /api/v1/meets?view=all|plan|reports&page=&limit= - Lists the caller's
/// meets with their counts, ordered by start time.
///
/// ## Errors
/// Returns HTTP 401 without credentials and 400 for an unknown view.
#[handler]
pub async fn list(req: &mut Request, depot: &mut Depot) -> AppResult<Json<MeetPage>> {
    let actor = require_actor(depot)?;
    let view = req
        .query::<String>("view")
        .map(|view| view.parse::<MeetView>())
        .transpose()?
        .unwrap_or_default();
    let page = req.query::<i64>("page");
    let limit = req.query::<i64>("limit");
    let repo = repository(depot)?;

    Ok(Json(
        meet::list_meets(repo.as_ref(), &actor, view, page, limit).await?,
    ))
}

/// ## Summary
/// POST /api/v1/meets - Creates a draft meet organized by the caller.
///
/// ## Errors
/// Returns HTTP 400 for an invalid body and 403 for the worker or a foreign
/// organization.
#[handler]
pub async fn create(req: &mut Request, depot: &mut Depot, res: &mut Response) -> AppResult<Json<Meet>> {
    let actor = require_actor(depot)?;
    let body: NewMeetRequest = req.parse_json().await.map_err(|e| {
        tracing::debug!(error = %e, "Failed to parse new meet");
        CoreError::InvalidInput("Invalid meet body".to_string())
    })?;
    let repo = repository(depot)?;

    let created = meet::create_meet(repo.as_ref(), &actor, body).await?;
    res.status_code(StatusCode::CREATED);
    Ok(Json(created))
}

/// ## Summary
/// PATCH /api/v1/meets/{id} - Edits a meet's details.
///
/// ## Errors
/// Returns HTTP 400 for an invalid body (including a `statusId`), 404 for an
/// unknown meet and 409 when the meet's state refuses the change.
#[handler]
pub async fn update(req: &mut Request, depot: &mut Depot) -> AppResult<Json<Meet>> {
    let actor = require_actor(depot)?;
    let meet_id = uuid_param(req, "id")?;
    let patch: MeetPatch = req.parse_json().await.map_err(|e| {
        tracing::debug!(error = %e, "Failed to parse meet changes");
        CoreError::InvalidInput("Invalid meet body".to_string())
    })?;
    let repo = repository(depot)?;

    Ok(Json(
        meet::update_meet(repo.as_ref(), meet_id, &actor, patch).await?,
    ))
}

/// ## Summary
/// GET /api/v1/meets/{id} - Returns a meet with its live attendee counts.
///
/// ## Errors
/// Returns HTTP 401 without credentials and 404 when the meet is unknown or
/// outside the caller's reach.
#[handler]
pub async fn show(req: &mut Request, depot: &mut Depot) -> AppResult<Json<MeetWithCounts>> {
    let actor = require_actor(depot)?;
    let meet_id = uuid_param(req, "id")?;
    let repo = repository(depot)?;

    Ok(Json(
        meet::meet_with_counts(repo.as_ref(), meet_id, &actor).await?,
    ))
}

/// ## Summary
/// DELETE /api/v1/meets/{id} - Deletes a draft meet.
///
/// ## Errors
/// Returns HTTP 409 once the meet has left the draft status.
#[handler]
pub async fn delete(req: &mut Request, depot: &mut Depot) -> AppResult<StatusCode> {
    let actor = require_actor(depot)?;
    let meet_id = uuid_param(req, "id")?;
    let repo = repository(depot)?;

    meet::delete_meet(repo.as_ref(), meet_id, &actor).await?;
    Ok(StatusCode::NO_CONTENT)
}
