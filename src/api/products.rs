// src/api/products.rs

use actix_web::{delete, get, post, put, web, HttpResponse};
use chrono::Utc;
use serde::Deserialize;
use serde_json::json;
use sqlx::{FromRow, QueryBuilder, Row, Sqlite};

use crate::api::auth::AdminUser;
use crate::api::games;
use crate::db;
use crate::error::{ApiError, ApiResult};
use crate::models::{GameSummary, PlanType, Product, ProductRow};
use crate::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductListQuery {
    pub game_id: Option<i64>,
    pub active: Option<String>,
}

#[get("/products")]
pub async fn list_products(
    state: web::Data<AppState>,
    query: web::Query<ProductListQuery>,
) -> ApiResult<HttpResponse> {
    let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new(
        "SELECT p.*, g.name AS game_name, g.slug AS game_slug
         FROM products p
         JOIN games g ON g.id = p.game_id
         WHERE 1=1",
    );
    if let Some(game_id) = query.game_id {
        qb.push(" AND p.game_id = ").push_bind(game_id);
    }
    if query.active.as_deref() == Some("true") {
        qb.push(" AND p.is_active = 1");
    }
    qb.push(" ORDER BY p.sort_order ASC, p.price ASC");

    let rows = qb.build().fetch_all(&state.pool).await?;
    let mut products = Vec::with_capacity(rows.len());
    for row in &rows {
        let product = ProductRow::from_row(row)?;
        let game = GameSummary {
            id: product.game_id,
            name: row.try_get("game_name")?,
            slug: row.try_get("game_slug")?,
        };
        products.push(product.into_product(Some(game)));
    }

    Ok(HttpResponse::Ok().json(products))
}

#[get("/products/game/{slug}")]
pub async fn list_products_by_game(
    state: web::Data<AppState>,
    path: web::Path<String>,
) -> ApiResult<HttpResponse> {
    let game = db::find_game_by_slug(&state.pool, &path.into_inner())
        .await?
        .ok_or_else(|| ApiError::NotFound("game not found".to_string()))?;

    let rows = sqlx::query_as::<_, ProductRow>(
        "SELECT * FROM products
         WHERE game_id = ? AND is_active = 1
         ORDER BY sort_order ASC, price ASC",
    )
    .bind(game.id)
    .fetch_all(&state.pool)
    .await?;

    let products: Vec<Product> = rows
        .into_iter()
        .map(|row| row.into_product(None))
        .collect();
    Ok(HttpResponse::Ok().json(products))
}

#[get("/products/{id}")]
pub async fn get_product(
    state: web::Data<AppState>,
    path: web::Path<i64>,
) -> ApiResult<HttpResponse> {
    let row = db::find_product(&state.pool, path.into_inner())
        .await?
        .ok_or_else(|| ApiError::NotFound("product not found".to_string()))?;

    let game = db::find_game(&state.pool, row.game_id).await?;
    let unused_cards = db::unused_card_count(&state.pool, row.plan_type).await?;

    let product = row.into_product(game.as_ref().map(games::summary));
    let mut body = serde_json::to_value(product)?;
    body["unusedCards"] = json!(unused_cards);
    Ok(HttpResponse::Ok().json(body))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateProductRequest {
    pub game_id: i64,
    pub name: String,
    pub plan_type: PlanType,
    pub price: f64,
    pub currency: Option<String>,
    pub duration: i64,
    pub description: Option<String>,
    pub features: Option<Vec<String>>,
    pub badge: Option<String>,
    pub is_popular: Option<bool>,
    pub is_premium: Option<bool>,
    pub is_active: Option<bool>,
    pub sort_order: Option<i64>,
}

#[post("/products")]
pub async fn create_product(
    state: web::Data<AppState>,
    _admin: AdminUser,
    payload: web::Json<CreateProductRequest>,
) -> ApiResult<HttpResponse> {
    if payload.name.trim().is_empty() {
        return Err(ApiError::BadRequest("name is required".to_string()));
    }
    let game = db::find_game(&state.pool, payload.game_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("game not found".to_string()))?;

    let features = serde_json::to_string(payload.features.as_deref().unwrap_or_default())?;
    let row = sqlx::query_as::<_, ProductRow>(
        "INSERT INTO products
            (game_id, name, plan_type, price, currency, duration, description, features,
             badge, is_popular, is_premium, is_active, sort_order, created_at)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?) RETURNING *",
    )
    .bind(game.id)
    .bind(payload.name.trim())
    .bind(payload.plan_type)
    .bind(payload.price)
    .bind(payload.currency.as_deref().unwrap_or(crate::config::CURRENCY))
    .bind(payload.duration)
    .bind(&payload.description)
    .bind(&features)
    .bind(&payload.badge)
    .bind(payload.is_popular.unwrap_or(false))
    .bind(payload.is_premium.unwrap_or(false))
    .bind(payload.is_active.unwrap_or(true))
    .bind(payload.sort_order.unwrap_or(0))
    .bind(Utc::now())
    .fetch_one(&state.pool)
    .await?;

    let product = row.into_product(Some(games::summary(&game)));
    Ok(HttpResponse::Created().json(product))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateProductRequest {
    pub game_id: Option<i64>,
    pub name: Option<String>,
    pub plan_type: Option<PlanType>,
    pub price: Option<f64>,
    pub currency: Option<String>,
    pub duration: Option<i64>,
    pub description: Option<String>,
    pub features: Option<Vec<String>>,
    pub badge: Option<String>,
    pub is_popular: Option<bool>,
    pub is_premium: Option<bool>,
    pub is_active: Option<bool>,
    pub sort_order: Option<i64>,
}

#[put("/products/{id}")]
pub async fn update_product(
    state: web::Data<AppState>,
    _admin: AdminUser,
    path: web::Path<i64>,
    payload: web::Json<UpdateProductRequest>,
) -> ApiResult<HttpResponse> {
    let existing = db::find_product(&state.pool, path.into_inner())
        .await?
        .ok_or_else(|| ApiError::NotFound("product not found".to_string()))?;

    // Moving the product to another game requires the target to exist.
    if let Some(game_id) = payload.game_id {
        if game_id != existing.game_id && db::find_game(&state.pool, game_id).await?.is_none() {
            return Err(ApiError::NotFound("target game not found".to_string()));
        }
    }

    let features = match &payload.features {
        Some(features) => serde_json::to_string(features)?,
        None => existing.features.clone(),
    };

    let row = sqlx::query_as::<_, ProductRow>(
        "UPDATE products SET
            game_id = ?, name = ?, plan_type = ?, price = ?, currency = ?, duration = ?,
            description = ?, features = ?, badge = ?, is_popular = ?, is_premium = ?,
            is_active = ?, sort_order = ?
         WHERE id = ? RETURNING *",
    )
    .bind(payload.game_id.unwrap_or(existing.game_id))
    .bind(payload.name.as_ref().unwrap_or(&existing.name))
    .bind(payload.plan_type.unwrap_or(existing.plan_type))
    .bind(payload.price.unwrap_or(existing.price))
    .bind(payload.currency.as_ref().unwrap_or(&existing.currency))
    .bind(payload.duration.unwrap_or(existing.duration))
    .bind(payload.description.as_ref().or(existing.description.as_ref()))
    .bind(&features)
    .bind(payload.badge.as_ref().or(existing.badge.as_ref()))
    .bind(payload.is_popular.unwrap_or(existing.is_popular))
    .bind(payload.is_premium.unwrap_or(existing.is_premium))
    .bind(payload.is_active.unwrap_or(existing.is_active))
    .bind(payload.sort_order.unwrap_or(existing.sort_order))
    .bind(existing.id)
    .fetch_one(&state.pool)
    .await?;

    let game = db::find_game(&state.pool, row.game_id).await?;
    let product = row.into_product(game.as_ref().map(games::summary));
    Ok(HttpResponse::Ok().json(product))
}

#[delete("/products/{id}")]
pub async fn delete_product(
    state: web::Data<AppState>,
    _admin: AdminUser,
    path: web::Path<i64>,
) -> ApiResult<HttpResponse> {
    let existing = db::find_product(&state.pool, path.into_inner())
        .await?
        .ok_or_else(|| ApiError::NotFound("product not found".to_string()))?;

    db::delete_product(&state.pool, existing.id).await?;
    Ok(HttpResponse::Ok().json(json!({ "message": "product deleted" })))
}
