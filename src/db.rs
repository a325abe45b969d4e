use std::sync::Arc;

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::types::Type;
use rusqlite::{params, params_from_iter, Connection, Row};
use tokio::sync::Mutex;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::error::StoreError;
use crate::models::restaurant::{Restaurant, RestaurantPayload};
use crate::models::review::{Review, ReviewPayload};
use crate::query::{apply_query_filters, RestaurantFilter, RestaurantQuery, RESTAURANT_COLUMNS};
use crate::watch::{
    ChangeEvent, RestaurantCallback, RestaurantsCallback, ReviewsCallback, Subscription, Watcher,
    WatcherRegistry,
};


// Shared handle to the review store: one SQLite connection guarded by a
// mutex, plus the registry of live watchers.
pub struct Database {
    conn: Arc<Mutex<Connection>>,
    watchers: Arc<WatcherRegistry>,
}

impl Database {
    // Open a database connection
    pub fn new(db_path: &str) -> Result<Self, StoreError> {
        let conn = Connection::open(db_path)?;
        info!("[DB] Connection established at: {db_path}");
        Ok(Database {
            conn: Arc::new(Mutex::new(conn)),
            watchers: Arc::new(WatcherRegistry::default()),
        })
    }

    // Create the database schema
    pub async fn create_schema(&self) -> Result<(), StoreError> {
        let conn = self.conn.lock().await;

        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS restaurants (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                category TEXT NOT NULL,
                city TEXT NOT NULL,
                price INTEGER NOT NULL,
                num_ratings INTEGER NOT NULL DEFAULT 0,
                sum_rating REAL NOT NULL DEFAULT 0,
                avg_rating REAL NOT NULL DEFAULT 0,
                photo TEXT NOT NULL DEFAULT '',
                timestamp TEXT NOT NULL
            );",
        )
        .map_err(|e| {
            error!("[DB] Failed creating restaurants table: {e}");
            e
        })?;

        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS ratings (
                id TEXT PRIMARY KEY,
                restaurant_id TEXT NOT NULL,
                rating REAL NOT NULL,
                text TEXT NOT NULL,
                user_id TEXT NOT NULL,
                timestamp TEXT NOT NULL,
                FOREIGN KEY (restaurant_id) REFERENCES restaurants(id) ON DELETE CASCADE
            );
            CREATE INDEX IF NOT EXISTS idx_ratings_restaurant_timestamp
                ON ratings (restaurant_id, timestamp DESC);",
        )
        .map_err(|e| {
            error!("[DB] Failed creating ratings table: {e}");
            e
        })?;

        Ok(())
    }

    // Insert a new restaurant with zero aggregates. The ID and creation
    // timestamp are server-assigned.
    pub async fn add_restaurant(&self, payload: &RestaurantPayload) -> Result<Restaurant, StoreError> {
        let restaurant = Restaurant {
            id: Uuid::new_v4().to_string(),
            name: payload.name.clone(),
            category: payload.category.clone(),
            city: payload.city.clone(),
            price: payload.price,
            num_ratings: 0,
            sum_rating: 0.0,
            avg_rating: 0.0,
            photo: payload.photo.clone(),
            timestamp: Utc::now(),
        };

        {
            let conn = self.conn.lock().await;
            conn.execute(
                "INSERT INTO restaurants
                    (id, name, category, city, price, num_ratings, sum_rating, avg_rating, photo, timestamp)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
                params![
                    restaurant.id,
                    restaurant.name,
                    restaurant.category,
                    restaurant.city,
                    restaurant.price,
                    restaurant.num_ratings,
                    restaurant.sum_rating,
                    restaurant.avg_rating,
                    restaurant.photo,
                    format_timestamp(&restaurant.timestamp),
                ],
            )?;
        }

        info!("[DB] Restaurant created: {}", restaurant.id);
        self.notify(ChangeEvent::Restaurant {
            restaurant_id: restaurant.id.clone(),
        })
        .await;
        Ok(restaurant)
    }

    // Point the restaurant's photo field at a new public URL. The image
    // itself lives in external storage.
    pub async fn update_restaurant_image_reference(
        &self,
        restaurant_id: &str,
        photo_url: &str,
    ) -> Result<(), StoreError> {
        if restaurant_id.is_empty() {
            return Err(StoreError::MissingRestaurantId);
        }

        let updated = {
            let conn = self.conn.lock().await;
            conn.execute(
                "UPDATE restaurants SET photo = ?1 WHERE id = ?2",
                params![photo_url, restaurant_id],
            )?
        };
        if updated == 0 {
            return Err(StoreError::RestaurantNotFound(restaurant_id.to_string()));
        }

        info!("[DB] Photo reference updated for restaurant: {restaurant_id}");
        self.notify(ChangeEvent::Restaurant {
            restaurant_id: restaurant_id.to_string(),
        })
        .await;
        Ok(())
    }

    // Add a review and recompute the parent restaurant's aggregate rating
    // in one transaction. The aggregates are read inside the transaction;
    // the connection mutex plus the transaction serialize concurrent
    // submissions for the same restaurant.
    pub async fn add_review_to_restaurant(
        &self,
        restaurant_id: &str,
        review: &ReviewPayload,
    ) -> Result<(), StoreError> {
        if restaurant_id.is_empty() {
            return Err(StoreError::MissingRestaurantId);
        }
        if !review.rating.is_finite() {
            return Err(StoreError::InvalidRating(review.rating.to_string()));
        }

        let review_id = Uuid::new_v4().to_string();
        let timestamp = format_timestamp(&Utc::now());

        {
            let mut conn = self.conn.lock().await;
            let tx = conn.transaction()?;

            let (num_ratings, sum_rating): (i64, f64) = match tx.query_row(
                "SELECT num_ratings, sum_rating FROM restaurants WHERE id = ?1",
                [restaurant_id],
                |row| Ok((row.get(0)?, row.get(1)?)),
            ) {
                Ok(aggregates) => aggregates,
                Err(rusqlite::Error::QueryReturnedNoRows) => {
                    return Err(StoreError::RestaurantNotFound(restaurant_id.to_string()))
                }
                Err(e) => return Err(e.into()),
            };

            let new_num_ratings = num_ratings + 1;
            let new_sum_rating = sum_rating + review.rating;
            let new_avg_rating = new_sum_rating / new_num_ratings as f64;

            tx.execute(
                "UPDATE restaurants
                 SET num_ratings = ?1, sum_rating = ?2, avg_rating = ?3
                 WHERE id = ?4",
                params![new_num_ratings, new_sum_rating, new_avg_rating, restaurant_id],
            )?;
            tx.execute(
                "INSERT INTO ratings (id, restaurant_id, rating, text, user_id, timestamp)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    review_id,
                    restaurant_id,
                    review.rating,
                    review.text,
                    review.user_id,
                    timestamp,
                ],
            )?;
            tx.commit()?;
        }

        info!("[DB] Review {review_id} added to restaurant {restaurant_id}");
        self.notify(ChangeEvent::Review {
            restaurant_id: restaurant_id.to_string(),
        })
        .await;
        Ok(())
    }

    // Fetch restaurants matching the filter, one-shot.
    pub async fn get_restaurants(
        &self,
        filter: &RestaurantFilter,
    ) -> Result<Vec<Restaurant>, StoreError> {
        let (sql, sql_params) = apply_query_filters(RestaurantQuery::new(), filter).to_sql();

        let conn = self.conn.lock().await;
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params_from_iter(sql_params), row_to_restaurant)?;

        let mut restaurants = Vec::new();
        for row in rows {
            restaurants.push(row?);
        }
        info!("[DB] Fetched {} restaurants", restaurants.len());
        Ok(restaurants)
    }

    // Fetch a single restaurant, one-shot. An empty ID is not an error;
    // it is logged and yields nothing.
    pub async fn get_restaurant_by_id(
        &self,
        restaurant_id: &str,
    ) -> Result<Option<Restaurant>, StoreError> {
        if restaurant_id.is_empty() {
            warn!("[DB] Invalid restaurant ID received: empty");
            return Ok(None);
        }

        let conn = self.conn.lock().await;
        match conn.query_row(
            &format!("SELECT {RESTAURANT_COLUMNS} FROM restaurants WHERE id = ?1"),
            [restaurant_id],
            row_to_restaurant,
        ) {
            Ok(restaurant) => Ok(Some(restaurant)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    // Fetch the reviews of one restaurant, newest first.
    pub async fn get_reviews_by_restaurant_id(
        &self,
        restaurant_id: &str,
    ) -> Result<Vec<Review>, StoreError> {
        if restaurant_id.is_empty() {
            warn!("[DB] Invalid restaurant ID received: empty");
            return Ok(Vec::new());
        }

        let conn = self.conn.lock().await;
        let mut stmt = conn.prepare(
            "SELECT id, restaurant_id, rating, text, user_id, timestamp
             FROM ratings WHERE restaurant_id = ?1
             ORDER BY timestamp DESC",
        )?;
        let rows = stmt.query_map([restaurant_id], row_to_review)?;

        let mut reviews = Vec::new();
        for row in rows {
            reviews.push(row?);
        }
        Ok(reviews)
    }

    // Live variant of `get_restaurants`. The callback receives the current
    // result set immediately, then again after every commit that can touch
    // the list. The caller must call `unsubscribe` on the returned handle
    // to release the watcher.
    pub async fn subscribe_restaurants(
        &self,
        filter: RestaurantFilter,
        callback: impl Fn(Vec<Restaurant>) + Send + Sync + 'static,
    ) -> Result<Subscription, StoreError> {
        let callback: RestaurantsCallback = Arc::new(callback);

        let snapshot = self.get_restaurants(&filter).await?;
        callback(snapshot);

        let id = self.watchers.register(Watcher::Restaurants { filter, callback });
        Ok(Subscription::new(id, self.watchers.clone()))
    }

    // Live variant of `get_restaurant_by_id`.
    pub async fn subscribe_restaurant_by_id(
        &self,
        restaurant_id: &str,
        callback: impl Fn(Option<Restaurant>) + Send + Sync + 'static,
    ) -> Result<Subscription, StoreError> {
        if restaurant_id.is_empty() {
            warn!("[DB] Invalid restaurant ID received: empty");
            return Err(StoreError::MissingRestaurantId);
        }
        let callback: RestaurantCallback = Arc::new(callback);

        let snapshot = self.get_restaurant_by_id(restaurant_id).await?;
        callback(snapshot);

        let id = self.watchers.register(Watcher::RestaurantById {
            restaurant_id: restaurant_id.to_string(),
            callback,
        });
        Ok(Subscription::new(id, self.watchers.clone()))
    }

    // Live variant of `get_reviews_by_restaurant_id`.
    pub async fn subscribe_reviews_by_restaurant_id(
        &self,
        restaurant_id: &str,
        callback: impl Fn(Vec<Review>) + Send + Sync + 'static,
    ) -> Result<Subscription, StoreError> {
        if restaurant_id.is_empty() {
            warn!("[DB] Invalid restaurant ID received: empty");
            return Err(StoreError::MissingRestaurantId);
        }
        let callback: ReviewsCallback = Arc::new(callback);

        let snapshot = self.get_reviews_by_restaurant_id(restaurant_id).await?;
        callback(snapshot);

        let id = self.watchers.register(Watcher::Reviews {
            restaurant_id: restaurant_id.to_string(),
            callback,
        });
        Ok(Subscription::new(id, self.watchers.clone()))
    }

    // Re-run the query of every watcher the event may affect and deliver
    // the fresh result set. Runs after the write released the connection
    // lock; watchers whose refresh fails are logged and skipped.
    async fn notify(&self, event: ChangeEvent) {
        for watcher in self.watchers.matching(&event) {
            match watcher {
                Watcher::Restaurants { filter, callback } => {
                    match self.get_restaurants(&filter).await {
                        Ok(restaurants) => callback(restaurants),
                        Err(e) => error!("[DB] Failed to refresh restaurant list watcher: {e}"),
                    }
                }
                Watcher::RestaurantById {
                    restaurant_id,
                    callback,
                } => match self.get_restaurant_by_id(&restaurant_id).await {
                    Ok(restaurant) => callback(restaurant),
                    Err(e) => {
                        error!("[DB] Failed to refresh watcher for restaurant {restaurant_id}: {e}")
                    }
                },
                Watcher::Reviews {
                    restaurant_id,
                    callback,
                } => match self.get_reviews_by_restaurant_id(&restaurant_id).await {
                    Ok(reviews) => callback(reviews),
                    Err(e) => {
                        error!("[DB] Failed to refresh review watcher for {restaurant_id}: {e}")
                    }
                },
            }
        }
    }
}

fn format_timestamp(timestamp: &DateTime<Utc>) -> String {
    // Fixed-width RFC 3339 so lexicographic ORDER BY matches time order.
    timestamp.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_timestamp(row: &Row<'_>, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let raw: String = row.get(idx)?;
    DateTime::parse_from_rfc3339(&raw)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn row_to_restaurant(row: &Row<'_>) -> rusqlite::Result<Restaurant> {
    Ok(Restaurant {
        id: row.get(0)?,
        name: row.get(1)?,
        category: row.get(2)?,
        city: row.get(3)?,
        price: row.get(4)?,
        num_ratings: row.get(5)?,
        sum_rating: row.get(6)?,
        avg_rating: row.get(7)?,
        photo: row.get(8)?,
        timestamp: parse_timestamp(row, 9)?,
    })
}

fn row_to_review(row: &Row<'_>) -> rusqlite::Result<Review> {
    Ok(Review {
        id: row.get(0)?,
        restaurant_id: row.get(1)?,
        rating: row.get(2)?,
        text: row.get(3)?,
        user_id: row.get(4)?,
        timestamp: parse_timestamp(row, 5)?,
    })
}
