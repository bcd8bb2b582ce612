use thiserror::Error;

#[derive(Error, Debug)]
pub enum NotificationError {
    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error("Notification record not found: {0}")]
    NotFound(String),
}

impl From<shared_database::StoreError> for NotificationError {
    fn from(e: shared_database::StoreError) -> Self {
        match e {
            shared_database::StoreError::NotFound(collection, id) => {
                NotificationError::NotFound(format!("{}/{}", collection, id))
            }
            other => NotificationError::DatabaseError(other.to_string()),
        }
    }
}
