use salvo::async_trait;
use std::sync::Arc;

use crate::error::AppResult;
use adventuremeets_core::error::CoreError;
use adventuremeets_service::repository::MeetRepository;

/// Makes the meet store available to handlers.
pub struct RepositoryHandler {
    pub repository: Arc<dyn MeetRepository>,
}

#[async_trait]
impl salvo::Handler for RepositoryHandler {
    #[tracing::instrument(skip(self, _req, depot, _res, _ctrl))]
    async fn handle(
        &self,
        _req: &mut salvo::Request,
        depot: &mut salvo::Depot,
        _res: &mut salvo::Response,
        _ctrl: &mut salvo::FlowCtrl,
    ) {
        depot.inject(Arc::clone(&self.repository));
    }
}

/// ## Summary
/// Retrieves the meet store from the depot.
///
/// ## Errors
/// Returns an error if the store is not found in the depot.
pub fn get_repository_from_depot(depot: &salvo::Depot) -> AppResult<Arc<dyn MeetRepository>> {
    depot
        .obtain::<Arc<dyn MeetRepository>>()
        .cloned()
        .map_err(|_err| CoreError::InvariantViolation("Meet repository not found in depot").into())
}
