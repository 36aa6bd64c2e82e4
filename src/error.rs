use thiserror::Error;
use uuid::Uuid;

/// Everything that can stop a reminder from being produced or dispatched.
#[derive(Debug, Error)]
pub enum NotificationError {
    /// No active messaging-provider configuration exists.
    #[error("no active messaging configuration")]
    Configuration,

    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: Uuid },

    /// The input is present but unusable, e.g. a client without a phone number.
    #[error("{0}")]
    Validation(String),

    /// Dedup hit: the appointment already has a sent (or in-flight) reminder.
    #[error("reminder already sent for appointment {appointment_id}")]
    AlreadySent { appointment_id: Uuid },

    /// The provider could not be reached or answered with something unusable.
    #[error("{0}")]
    Transport(String),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A detached send task panicked or was cancelled.
    #[error("send task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

pub type Result<T> = std::result::Result<T, NotificationError>;
