use std::sync::Arc;

use actix_web::{web, HttpResponse, ResponseError};
use serde::Deserialize;
use tracing::{error, info};

use crate::db::Database;
use crate::error::StoreError;
use crate::models::restaurant::RestaurantPayload;
use crate::models::review::ReviewPayload;
use crate::query::RestaurantFilter;

// Form fields posted by the review submission form. Everything is optional
// at the wire level; validation happens in `review_from_form`.
#[derive(Deserialize, Debug, Clone)]
pub struct ReviewForm {
    #[serde(rename = "restaurantId")]
    pub restaurant_id: Option<String>,
    pub text: Option<String>,
    pub rating: Option<String>,
    #[serde(rename = "userId")]
    pub user_id: Option<String>,
}

#[derive(Deserialize, Debug)]
pub struct PhotoUpdate {
    pub photo: String,
}

// Extracts the review payload from the submitted form. Argument validation
// happens here, before any database work.
fn review_from_form(form: ReviewForm) -> Result<(String, ReviewPayload), StoreError> {
    let restaurant_id = match form.restaurant_id {
        Some(id) if !id.is_empty() => id,
        _ => return Err(StoreError::MissingRestaurantId),
    };
    let raw_rating = form.rating.ok_or(StoreError::MissingReview)?;
    let rating = raw_rating
        .trim()
        .parse::<f64>()
        .map_err(|_| StoreError::InvalidRating(raw_rating.clone()))?;
    Ok((
        restaurant_id,
        ReviewPayload {
            rating,
            text: form.text.unwrap_or_default(),
            user_id: form.user_id.unwrap_or_default(),
        },
    ))
}

// POST /reviews — the review submission entry point.
pub async fn submit_review(
    db: web::Data<Arc<Database>>,
    form: web::Form<ReviewForm>,
) -> HttpResponse {
    let (restaurant_id, payload) = match review_from_form(form.into_inner()) {
        Ok(parsed) => parsed,
        Err(err) => {
            error!("[API] Rejected review submission: {err}");
            return err.error_response();
        }
    };

    info!("[API] Review submission for restaurant: {restaurant_id}");
    match db.add_review_to_restaurant(&restaurant_id, &payload).await {
        Ok(()) => HttpResponse::Created().finish(),
        Err(err) => {
            error!("[API] Failed to add review to restaurant {restaurant_id}: {err}");
            err.error_response()
        }
    }
}

// GET /restaurants — filtered, sorted list.
pub async fn get_restaurants(
    db: web::Data<Arc<Database>>,
    filter: web::Query<RestaurantFilter>,
) -> HttpResponse {
    match db.get_restaurants(&filter).await {
        Ok(restaurants) => {
            info!("[API] Returning {} restaurants", restaurants.len());
            HttpResponse::Ok().json(restaurants)
        }
        Err(err) => {
            error!("[API] Failed to fetch restaurants: {err}");
            err.error_response()
        }
    }
}

// GET /restaurants/{id}
pub async fn get_restaurant(db: web::Data<Arc<Database>>, id: web::Path<String>) -> HttpResponse {
    let id = id.into_inner();
    match db.get_restaurant_by_id(&id).await {
        Ok(Some(restaurant)) => HttpResponse::Ok().json(restaurant),
        Ok(None) => HttpResponse::NotFound().body("Restaurant not found"),
        Err(err) => {
            error!("[API] Failed to fetch restaurant {id}: {err}");
            err.error_response()
        }
    }
}

// GET /restaurants/{id}/reviews — newest first.
pub async fn get_reviews(db: web::Data<Arc<Database>>, id: web::Path<String>) -> HttpResponse {
    let id = id.into_inner();
    match db.get_reviews_by_restaurant_id(&id).await {
        Ok(reviews) => {
            info!("[API] Returning {} reviews for restaurant {id}", reviews.len());
            HttpResponse::Ok().json(reviews)
        }
        Err(err) => {
            error!("[API] Failed to fetch reviews for restaurant {id}: {err}");
            err.error_response()
        }
    }
}

// POST /restaurants
pub async fn create_restaurant(
    db: web::Data<Arc<Database>>,
    payload: web::Json<RestaurantPayload>,
) -> HttpResponse {
    let payload = payload.into_inner();
    info!(
        "[API] Restaurant creation request: {}",
        serde_json::to_string(&payload).unwrap_or_default()
    );
    match db.add_restaurant(&payload).await {
        Ok(restaurant) => {
            info!("[API] Restaurant created: {}", restaurant.id);
            HttpResponse::Created().json(restaurant)
        }
        Err(err) => {
            error!("[API] Failed to create restaurant: {err}");
            err.error_response()
        }
    }
}

// PUT /restaurants/{id}/photo — repoint the photo reference after an
// external upload completed.
pub async fn update_restaurant_photo(
    db: web::Data<Arc<Database>>,
    id: web::Path<String>,
    update: web::Json<PhotoUpdate>,
) -> HttpResponse {
    let id = id.into_inner();
    match db.update_restaurant_image_reference(&id, &update.photo).await {
        Ok(()) => HttpResponse::NoContent().finish(),
        Err(err) => {
            error!("[API] Failed to update photo for restaurant {id}: {err}");
            err.error_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn form(
        restaurant_id: Option<&str>,
        rating: Option<&str>,
    ) -> ReviewForm {
        ReviewForm {
            restaurant_id: restaurant_id.map(Into::into),
            text: Some("fine".into()),
            rating: rating.map(Into::into),
            user_id: Some("user-1".into()),
        }
    }

    #[test]
    fn form_without_restaurant_id_is_invalid() {
        let err = review_from_form(form(None, Some("4"))).unwrap_err();
        assert!(matches!(err, StoreError::MissingRestaurantId));

        let err = review_from_form(form(Some(""), Some("4"))).unwrap_err();
        assert!(matches!(err, StoreError::MissingRestaurantId));
    }

    #[test]
    fn form_without_rating_is_invalid() {
        let err = review_from_form(form(Some("r1"), None)).unwrap_err();
        assert!(matches!(err, StoreError::MissingReview));
    }

    #[test]
    fn non_numeric_rating_is_invalid() {
        let err = review_from_form(form(Some("r1"), Some("five"))).unwrap_err();
        assert!(matches!(err, StoreError::InvalidRating(_)));
    }

    #[test]
    fn well_formed_submission_parses() {
        let (restaurant_id, payload) =
            review_from_form(form(Some("r1"), Some(" 4.5 "))).unwrap();
        assert_eq!(restaurant_id, "r1");
        assert_eq!(payload.rating, 4.5);
        assert_eq!(payload.user_id, "user-1");
    }
}
