use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct Review {
    pub id: String,               // Unique ID for the review
    pub restaurant_id: String,    // ID of the restaurant the review belongs to
    pub rating: f64,              // Star rating, nominally 1-5 (not validated)
    pub text: String,             // Free-text body of the review
    pub user_id: String,          // ID of the user who submitted the review
    pub timestamp: DateTime<Utc>, // Submission time (server-assigned)
}

// Input shape for a new review; the ID and timestamp are assigned inside
// the aggregate-update transaction.
#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct ReviewPayload {
    pub rating: f64,
    pub text: String,
    pub user_id: String,
}
