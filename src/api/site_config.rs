// src/api/site_config.rs
//
// Key/value site configuration, optionally scoped to a game. Stored values
// are raw strings; anything that parses as JSON is served structured, so a
// value is effectively {string | structured JSON}. Lookup layers:
// game-scoped row > global row > compiled-in default.

use actix_web::{delete, get, put, web, HttpResponse};
use serde::Deserialize;
use serde_json::{json, Map, Value};

use crate::api::auth::AdminUser;
use crate::db;
use crate::error::{ApiError, ApiResult};
use crate::AppState;

fn default_configs() -> Map<String, Value> {
    let mut defaults = Map::new();
    defaults.insert("siteName".into(), json!("DORA"));
    defaults.insert("siteTagline".into(), json!("Top-tier game enhancement"));
    defaults.insert("heroTitle".into(), json!("Conquer the battlefield"));
    defaults.insert(
        "heroSubtitle".into(),
        json!("Industry-leading assistance technology for an unmatched experience."),
    );
    defaults.insert("discordUrl".into(), json!("https://discord.gg/your-invite"));
    defaults.insert("discordOnline".into(), json!("100+"));
    defaults.insert("discordMembers".into(), json!("1000+"));
    defaults.insert(
        "stats".into(),
        json!([
            { "value": "99.9%", "label": "Uptime" },
            { "value": "24/7", "label": "Support" },
            { "value": "1000+", "label": "Active users" },
        ]),
    );
    defaults.insert(
        "footerCopyright".into(),
        json!("© 2024 DORA. All rights reserved."),
    );
    defaults.insert(
        "footerDisclaimer".into(),
        json!("For research and educational use only; use at your own risk."),
    );
    defaults
}

/// Stored strings that parse as JSON are served structured.
fn parse_value(raw: &str) -> Value {
    serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()))
}

/// Structured values are stored as their JSON encoding, plain strings as-is.
fn encode_value(value: &Value) -> Result<String, serde_json::Error> {
    match value {
        Value::String(s) => Ok(s.clone()),
        other => serde_json::to_string(other),
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigScopeQuery {
    pub game_id: Option<i64>,
}

#[get("/config")]
pub async fn get_configs(
    state: web::Data<AppState>,
    query: web::Query<ConfigScopeQuery>,
) -> ApiResult<HttpResponse> {
    let mut merged = default_configs();

    for config in db::configs_for_scope(&state.pool, None).await? {
        merged.insert(config.key, parse_value(&config.value));
    }
    if let Some(game_id) = query.game_id {
        for config in db::configs_for_scope(&state.pool, Some(game_id)).await? {
            merged.insert(config.key, parse_value(&config.value));
        }
    }

    Ok(HttpResponse::Ok().json(merged))
}

#[get("/config/{key}")]
pub async fn get_config_value(
    state: web::Data<AppState>,
    path: web::Path<String>,
    query: web::Query<ConfigScopeQuery>,
) -> ApiResult<HttpResponse> {
    let key = path.into_inner();

    if let Some(game_id) = query.game_id {
        if let Some(config) = db::find_site_config(&state.pool, Some(game_id), &key).await? {
            return Ok(HttpResponse::Ok().json(json!({ "value": parse_value(&config.value) })));
        }
    }
    if let Some(config) = db::find_site_config(&state.pool, None, &key).await? {
        return Ok(HttpResponse::Ok().json(json!({ "value": parse_value(&config.value) })));
    }
    if let Some(default) = default_configs().remove(&key) {
        return Ok(HttpResponse::Ok().json(json!({ "value": default })));
    }

    Err(ApiError::NotFound("config key not found".to_string()))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkConfigRequest {
    pub configs: Map<String, Value>,
    pub game_id: Option<i64>,
}

#[put("/config")]
pub async fn set_configs(
    state: web::Data<AppState>,
    _admin: AdminUser,
    payload: web::Json<BulkConfigRequest>,
) -> ApiResult<HttpResponse> {
    if payload.configs.is_empty() {
        return Err(ApiError::BadRequest("no config values given".to_string()));
    }
    if let Some(game_id) = payload.game_id {
        if db::find_game(&state.pool, game_id).await?.is_none() {
            return Err(ApiError::NotFound("game not found".to_string()));
        }
    }

    let mut count = 0;
    for (key, value) in &payload.configs {
        let encoded = encode_value(value)?;
        db::upsert_site_config(&state.pool, payload.game_id, key, &encoded).await?;
        count += 1;
    }

    Ok(HttpResponse::Ok().json(json!({ "message": "config updated", "count": count })))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetConfigRequest {
    pub value: Value,
    pub game_id: Option<i64>,
}

#[put("/config/{key}")]
pub async fn set_config_value(
    state: web::Data<AppState>,
    _admin: AdminUser,
    path: web::Path<String>,
    payload: web::Json<SetConfigRequest>,
) -> ApiResult<HttpResponse> {
    if payload.value.is_null() {
        return Err(ApiError::BadRequest("config value is required".to_string()));
    }
    if let Some(game_id) = payload.game_id {
        if db::find_game(&state.pool, game_id).await?.is_none() {
            return Err(ApiError::NotFound("game not found".to_string()));
        }
    }

    let encoded = encode_value(&payload.value)?;
    let config =
        db::upsert_site_config(&state.pool, payload.game_id, &path.into_inner(), &encoded).await?;
    Ok(HttpResponse::Ok().json(config))
}

#[delete("/config/{key}")]
pub async fn delete_config_value(
    state: web::Data<AppState>,
    _admin: AdminUser,
    path: web::Path<String>,
    query: web::Query<ConfigScopeQuery>,
) -> ApiResult<HttpResponse> {
    let deleted = db::delete_site_config(&state.pool, query.game_id, &path.into_inner()).await?;
    if !deleted {
        return Err(ApiError::NotFound("config key not found".to_string()));
    }
    Ok(HttpResponse::Ok().json(json!({ "message": "config deleted" })))
}

#[get("/config/admin/list")]
pub async fn list_all_configs(
    state: web::Data<AppState>,
    _admin: AdminUser,
) -> ApiResult<HttpResponse> {
    let rows = sqlx::query_as::<_, crate::models::SiteConfig>(
        "SELECT * FROM site_configs ORDER BY game_id ASC, key ASC",
    )
    .fetch_all(&state.pool)
    .await?;

    let mut configs = Vec::with_capacity(rows.len());
    for config in rows {
        let game = match config.game_id {
            Some(game_id) => db::find_game(&state.pool, game_id)
                .await?
                .map(|g| crate::api::games::summary(&g)),
            None => None,
        };
        let mut value = serde_json::to_value(&config)?;
        value["game"] = json!(game);
        configs.push(value);
    }

    Ok(HttpResponse::Ok().json(configs))
}
