use thiserror::Error;
use uuid::Uuid;

use adventuremeets_core::status::MeetStatus;

/// Service layer errors - combines all error types
#[derive(Error, Debug)]
pub enum ServiceError {
    #[error(transparent)]
    DatabaseError(#[from] adventuremeets_db::error::DbError),

    #[error(transparent)]
    CoreError(#[from] adventuremeets_core::error::CoreError),

    #[error("Diesel error: {0}")]
    DieselError(#[from] diesel::result::Error),

    #[error("HTTP client error: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("Not authenticated")]
    NotAuthenticated,

    #[error("Authorization error: {0}")]
    AuthorizationError(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Invalid transition from {from} to {to}")]
    InvalidTransition { from: MeetStatus, to: MeetStatus },

    #[error("Status update for meet {meet_id} rejected with HTTP {status}: {body}")]
    RemoteUpdateRejected {
        meet_id: Uuid,
        status: u16,
        body: String,
    },

    #[error("Scheduler skipped {consecutive_skips} consecutive ticks; previous tick never finished")]
    SchedulerStalled { consecutive_skips: u32 },
}

pub type ServiceResult<T> = std::result::Result<T, ServiceError>;
