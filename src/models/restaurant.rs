use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct Restaurant {
    pub id: String,               // Unique ID for the restaurant
    pub name: String,             // Restaurant name
    pub category: String,         // Cuisine category (e.g., "Pizza")
    pub city: String,             // City the restaurant is in
    pub price: u8,                // Price tier, nominally 1-4
    pub num_ratings: i64,         // Count of submitted ratings
    pub sum_rating: f64,          // Running sum of all submitted ratings
    pub avg_rating: f64,          // sum_rating / num_ratings, 0 while unrated
    pub photo: String,            // Public image URL
    pub timestamp: DateTime<Utc>, // Creation time (server-assigned)
}

// Input shape for creating a restaurant; aggregates, ID and timestamp are
// assigned by the store.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct RestaurantPayload {
    pub name: String,
    pub category: String,
    pub city: String,
    pub price: u8,
    pub photo: String,
}
