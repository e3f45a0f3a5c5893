// src/api/mod.rs

pub mod admin;
pub mod auth;
pub mod cards;
pub mod games;
pub mod orders;
pub mod products;
pub mod site_config;

use actix_web::{get, web, HttpResponse};
use chrono::Utc;
use serde_json::json;

use crate::error::ApiError;

#[get("/health")]
async fn health() -> HttpResponse {
    HttpResponse::Ok().json(json!({ "status": "ok", "timestamp": Utc::now() }))
}

/// Mounts the whole REST surface under `/api`. Used by `main` and by the
/// integration tests, so both drive the exact same router.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.app_data(
        web::JsonConfig::default()
            .error_handler(|err, _req| ApiError::BadRequest(err.to_string()).into()),
    )
    .app_data(
        web::QueryConfig::default()
            .error_handler(|err, _req| ApiError::BadRequest(err.to_string()).into()),
    )
    .service(
        web::scope("/api")
            .service(health)
            // auth
            .service(auth::register)
            .service(auth::login)
            .service(auth::me)
            // cards (fixed paths before the parameterized delete)
            .service(cards::list_cards)
            .service(cards::upload_cards)
            .service(cards::verify_card)
            .service(cards::redeem_card)
            .service(cards::delete_card)
            // orders
            .service(orders::list_orders)
            .service(orders::create_order)
            .service(orders::pay_order)
            .service(orders::set_order_status)
            .service(orders::get_order)
            // catalog
            .service(games::list_games)
            .service(games::get_game_by_slug)
            .service(games::create_game)
            .service(games::update_game)
            .service(games::delete_game)
            .service(games::get_game)
            .service(products::list_products)
            .service(products::list_products_by_game)
            .service(products::create_product)
            .service(products::update_product)
            .service(products::delete_product)
            .service(products::get_product)
            // site config
            .service(site_config::list_all_configs)
            .service(site_config::get_configs)
            .service(site_config::set_configs)
            .service(site_config::get_config_value)
            .service(site_config::set_config_value)
            .service(site_config::delete_config_value)
            // admin back-office
            .service(admin::init_admin)
            .service(admin::check_init)
            .service(admin::stats)
            .service(admin::list_users)
            .service(admin::update_user_role),
    );
}
