//! `/api/v1/meets` routes.

use salvo::{Depot, Request, Router};
use uuid::Uuid;

use crate::error::AppResult;
use crate::repository_handler::get_repository_from_depot;
use adventuremeets_core::constants::MEETS_ROUTE_COMPONENT;
use adventuremeets_core::error::CoreError;
use adventuremeets_service::repository::MeetRepository;

mod attendees;
mod meet;
mod status;

#[cfg(test)]
mod testing;

/// ## Summary
/// Reads a UUID path parameter.
///
/// ## Errors
/// Returns `InvalidInput` if the parameter is missing or not a UUID.
fn uuid_param(req: &Request, name: &str) -> AppResult<Uuid> {
    req.param::<Uuid>(name)
        .ok_or_else(|| CoreError::InvalidInput(format!("Invalid {name}")).into())
}

fn repository(depot: &Depot) -> AppResult<std::sync::Arc<dyn MeetRepository>> {
    get_repository_from_depot(depot)
}

#[must_use]
pub fn routes() -> Router {
    Router::with_path(MEETS_ROUTE_COMPONENT)
        .get(meet::list)
        .post(meet::create)
        .push(Router::with_path("statuses").get(meet::list_statuses))
        .push(
            Router::with_path("{id}")
                .get(meet::show)
                .patch(meet::update)
                .delete(meet::delete)
                .push(Router::with_path("status").patch(status::update_status))
                .push(
                    Router::with_path("attendees")
                        .get(attendees::list)
                        .post(attendees::sign_up)
                        .push(Router::with_path("lookup").get(attendees::lookup))
                        .push(
                            Router::with_path("{attendee_id}")
                                .patch(attendees::update_status)
                                .delete(attendees::remove),
                        ),
                ),
        )
}
