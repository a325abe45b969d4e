use std::sync::Arc;

use actix_web::{web, App, HttpResponse, HttpServer};
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

use dineware::api;
use dineware::config::Config;
use dineware::db::Database;

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();

    let config = Config::load();

    // Initialize the database
    let db = Database::new(&config.db_path).unwrap();
    db.create_schema().await.unwrap();
    let db = Arc::new(db);
    info!("[SERVER] Schema created successfully");

    info!("[SERVER] Listening on http://{}", config.addr);

    HttpServer::new(move || {
        let db = db.clone();
        App::new()
            .app_data(web::Data::new(db))
            .route("/", web::get().to(index))
            .route("/reviews", web::post().to(api::submit_review))
            .route("/restaurants", web::get().to(api::get_restaurants))
            .route("/restaurants", web::post().to(api::create_restaurant))
            .route("/restaurants/{id}", web::get().to(api::get_restaurant))
            .route("/restaurants/{id}/reviews", web::get().to(api::get_reviews))
            .route(
                "/restaurants/{id}/photo",
                web::put().to(api::update_restaurant_photo),
            )
    })
    .bind(&config.addr)?
    .run()
    .await
}

async fn index() -> HttpResponse {
    HttpResponse::Ok().body("Welcome to Dineware!")
}
