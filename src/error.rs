use actix_web::http::StatusCode;
use actix_web::ResponseError;
use thiserror::Error;

// Failures surfaced by the review store. Argument validation errors are
// raised before any database work; everything else comes out of the
// storage layer.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("No restaurant ID has been provided")]
    MissingRestaurantId,

    #[error("No review has been provided")]
    MissingReview,

    #[error("Rating is not a number: {0}")]
    InvalidRating(String),

    #[error("Restaurant not found: {0}")]
    RestaurantNotFound(String),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),
}

impl ResponseError for StoreError {
    fn status_code(&self) -> StatusCode {
        match self {
            StoreError::MissingRestaurantId
            | StoreError::MissingReview
            | StoreError::InvalidRating(_) => StatusCode::BAD_REQUEST,
            StoreError::RestaurantNotFound(_) => StatusCode::NOT_FOUND,
            StoreError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}
