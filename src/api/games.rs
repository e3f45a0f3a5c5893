// src/api/games.rs

use actix_web::{delete, get, post, put, web, HttpResponse};
use chrono::Utc;
use serde::Deserialize;
use serde_json::json;
use sqlx::{FromRow, Row};

use crate::api::auth::AdminUser;
use crate::db;
use crate::error::{ApiError, ApiResult};
use crate::models::{Game, GameSummary, ProductRow};
use crate::AppState;

const DEFAULT_THEME_COLOR: &str = "#ff4655";

#[derive(Debug, Deserialize)]
pub struct GameListQuery {
    pub active: Option<String>,
}

#[get("/games")]
pub async fn list_games(
    state: web::Data<AppState>,
    query: web::Query<GameListQuery>,
) -> ApiResult<HttpResponse> {
    let active_only = query.active.as_deref() == Some("true");
    let rows = sqlx::query(
        "SELECT g.*, (SELECT COUNT(*) FROM products p WHERE p.game_id = g.id) AS product_count
         FROM games g
         WHERE (? = 0 OR g.is_active = 1)
         ORDER BY g.sort_order ASC, g.created_at DESC",
    )
    .bind(active_only as i64)
    .fetch_all(&state.pool)
    .await?;

    let mut games = Vec::with_capacity(rows.len());
    for row in &rows {
        let game = Game::from_row(row)?;
        let product_count: i64 = row.try_get("product_count")?;
        let mut value = serde_json::to_value(&game)?;
        value["productCount"] = json!(product_count);
        games.push(value);
    }

    Ok(HttpResponse::Ok().json(games))
}

async fn products_for_game(
    state: &AppState,
    game: &Game,
    active_only: bool,
) -> ApiResult<Vec<serde_json::Value>> {
    let rows = sqlx::query_as::<_, ProductRow>(
        "SELECT * FROM products
         WHERE game_id = ? AND (? = 0 OR is_active = 1)
         ORDER BY sort_order ASC, price ASC",
    )
    .bind(game.id)
    .bind(active_only as i64)
    .fetch_all(&state.pool)
    .await?;

    let mut products = Vec::with_capacity(rows.len());
    for row in rows {
        products.push(serde_json::to_value(row.into_product(None))?);
    }
    Ok(products)
}

#[get("/games/slug/{slug}")]
pub async fn get_game_by_slug(
    state: web::Data<AppState>,
    path: web::Path<String>,
) -> ApiResult<HttpResponse> {
    let game = db::find_game_by_slug(&state.pool, &path.into_inner())
        .await?
        .ok_or_else(|| ApiError::NotFound("game not found".to_string()))?;

    let products = products_for_game(&state, &game, true).await?;
    let configs = db::configs_for_scope(&state.pool, Some(game.id)).await?;

    let mut body = serde_json::to_value(&game)?;
    body["products"] = json!(products);
    body["configs"] = json!(configs);
    Ok(HttpResponse::Ok().json(body))
}

#[get("/games/{id}")]
pub async fn get_game(state: web::Data<AppState>, path: web::Path<i64>) -> ApiResult<HttpResponse> {
    let game = db::find_game(&state.pool, path.into_inner())
        .await?
        .ok_or_else(|| ApiError::NotFound("game not found".to_string()))?;

    let products = products_for_game(&state, &game, false).await?;
    let configs = db::configs_for_scope(&state.pool, Some(game.id)).await?;
    let card_count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM cards WHERE game_id = ?")
        .bind(game.id)
        .fetch_one(&state.pool)
        .await?;

    let mut body = serde_json::to_value(&game)?;
    body["configs"] = json!(configs);
    body["productCount"] = json!(products.len());
    body["cardCount"] = json!(card_count);
    body["products"] = json!(products);
    Ok(HttpResponse::Ok().json(body))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateGameRequest {
    pub name: String,
    pub slug: String,
    pub description: Option<String>,
    pub icon: Option<String>,
    pub cover_image: Option<String>,
    pub theme_color: Option<String>,
    pub is_active: Option<bool>,
    pub sort_order: Option<i64>,
}

#[post("/games")]
pub async fn create_game(
    state: web::Data<AppState>,
    _admin: AdminUser,
    payload: web::Json<CreateGameRequest>,
) -> ApiResult<HttpResponse> {
    if payload.name.trim().is_empty() || payload.slug.trim().is_empty() {
        return Err(ApiError::BadRequest(
            "name and slug are required".to_string(),
        ));
    }
    if db::slug_taken(&state.pool, &payload.slug, None).await? {
        return Err(ApiError::Conflict("this slug is already in use".to_string()));
    }

    let game = sqlx::query_as::<_, Game>(
        "INSERT INTO games
            (name, slug, description, icon, cover_image, theme_color, is_active, sort_order, created_at)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?) RETURNING *",
    )
    .bind(payload.name.trim())
    .bind(payload.slug.trim())
    .bind(&payload.description)
    .bind(&payload.icon)
    .bind(&payload.cover_image)
    .bind(payload.theme_color.as_deref().unwrap_or(DEFAULT_THEME_COLOR))
    .bind(payload.is_active.unwrap_or(true))
    .bind(payload.sort_order.unwrap_or(0))
    .bind(Utc::now())
    .fetch_one(&state.pool)
    .await?;

    Ok(HttpResponse::Created().json(game))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateGameRequest {
    pub name: Option<String>,
    pub slug: Option<String>,
    pub description: Option<String>,
    pub icon: Option<String>,
    pub cover_image: Option<String>,
    pub theme_color: Option<String>,
    pub is_active: Option<bool>,
    pub sort_order: Option<i64>,
}

#[put("/games/{id}")]
pub async fn update_game(
    state: web::Data<AppState>,
    _admin: AdminUser,
    path: web::Path<i64>,
    payload: web::Json<UpdateGameRequest>,
) -> ApiResult<HttpResponse> {
    let existing = db::find_game(&state.pool, path.into_inner())
        .await?
        .ok_or_else(|| ApiError::NotFound("game not found".to_string()))?;

    if let Some(slug) = &payload.slug {
        if slug != &existing.slug && db::slug_taken(&state.pool, slug, Some(existing.id)).await? {
            return Err(ApiError::Conflict("this slug is already in use".to_string()));
        }
    }

    let game = sqlx::query_as::<_, Game>(
        "UPDATE games SET
            name = ?, slug = ?, description = ?, icon = ?, cover_image = ?,
            theme_color = ?, is_active = ?, sort_order = ?
         WHERE id = ? RETURNING *",
    )
    .bind(payload.name.as_ref().unwrap_or(&existing.name))
    .bind(payload.slug.as_ref().unwrap_or(&existing.slug))
    .bind(payload.description.as_ref().or(existing.description.as_ref()))
    .bind(payload.icon.as_ref().or(existing.icon.as_ref()))
    .bind(payload.cover_image.as_ref().or(existing.cover_image.as_ref()))
    .bind(payload.theme_color.as_ref().unwrap_or(&existing.theme_color))
    .bind(payload.is_active.unwrap_or(existing.is_active))
    .bind(payload.sort_order.unwrap_or(existing.sort_order))
    .bind(existing.id)
    .fetch_one(&state.pool)
    .await?;

    Ok(HttpResponse::Ok().json(game))
}

#[delete("/games/{id}")]
pub async fn delete_game(
    state: web::Data<AppState>,
    _admin: AdminUser,
    path: web::Path<i64>,
) -> ApiResult<HttpResponse> {
    let game = db::find_game(&state.pool, path.into_inner())
        .await?
        .ok_or_else(|| ApiError::NotFound("game not found".to_string()))?;

    // Products, game-scoped cards and configs go with it (ON DELETE CASCADE).
    db::delete_game(&state.pool, game.id).await?;
    Ok(HttpResponse::Ok().json(json!({ "message": "game deleted" })))
}

pub fn summary(game: &Game) -> GameSummary {
    GameSummary {
        id: game.id,
        name: game.name.clone(),
        slug: game.slug.clone(),
    }
}
