// src/api/cards.rs

use std::collections::HashSet;

use actix_web::{delete, get, post, web, HttpResponse};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::json;
use sqlx::{FromRow, QueryBuilder, Row, Sqlite};
use utoipa::ToSchema;

use crate::api::auth::{AdminUser, AuthedUser};
use crate::card_keys::generate_unique_card_keys;
use crate::db;
use crate::error::{ApiError, ApiResult};
use crate::models::{Card, CardStatus, OrderStatus, Pagination, PlanType};
use crate::AppState;

/// Upload batches are bounded so the whole insert stays one fast call.
pub const MAX_UPLOAD_BATCH: usize = 500;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CardListQuery {
    pub status: Option<CardStatus>,
    pub plan_type: Option<PlanType>,
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CardWithRedeemer {
    #[serde(flatten)]
    card: Card,
    redeemed_by: Option<String>,
}

#[get("/cards")]
pub async fn list_cards(
    state: web::Data<AppState>,
    _admin: AdminUser,
    query: web::Query<CardListQuery>,
) -> ApiResult<HttpResponse> {
    let page = query.page.unwrap_or(1).max(1);
    let limit = query.limit.unwrap_or(20).clamp(1, 100);

    let mut count_qb: QueryBuilder<Sqlite> =
        QueryBuilder::new("SELECT COUNT(*) FROM cards WHERE 1=1");
    if let Some(status) = query.status {
        count_qb.push(" AND status = ").push_bind(status);
    }
    if let Some(plan) = query.plan_type {
        count_qb.push(" AND plan_type = ").push_bind(plan);
    }
    let total: i64 = count_qb.build_query_scalar().fetch_one(&state.pool).await?;

    let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new(
        "SELECT c.*, u.email AS redeemed_by
         FROM cards c
         LEFT JOIN orders o ON o.id = c.order_id
         LEFT JOIN users u ON u.id = o.user_id
         WHERE 1=1",
    );
    if let Some(status) = query.status {
        qb.push(" AND c.status = ").push_bind(status);
    }
    if let Some(plan) = query.plan_type {
        qb.push(" AND c.plan_type = ").push_bind(plan);
    }
    qb.push(" ORDER BY c.created_at DESC, c.id DESC LIMIT ")
        .push_bind(limit)
        .push(" OFFSET ")
        .push_bind((page - 1) * limit);

    let rows = qb.build().fetch_all(&state.pool).await?;
    let cards = rows
        .iter()
        .map(|row| {
            Ok(CardWithRedeemer {
                card: Card::from_row(row)?,
                redeemed_by: row.try_get("redeemed_by")?,
            })
        })
        .collect::<Result<Vec<_>, sqlx::Error>>()?;

    Ok(HttpResponse::Ok().json(json!({
        "cards": cards,
        "pagination": Pagination::new(page, limit, total),
    })))
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CardUploadRequest {
    pub plan_type: PlanType,
    /// Keys to import; blank lines are dropped, duplicates collapsed.
    pub card_keys: Option<Vec<String>>,
    /// Ask the server to generate this many keys instead of supplying them.
    pub generate: Option<u32>,
    pub game_id: Option<i64>,
}

#[utoipa::path(
    post,
    context_path = "/api",
    request_body = CardUploadRequest,
    responses(
        (status = 201, description = "Cards created"),
        (status = 400, description = "Empty or oversized batch"),
        (status = 409, description = "Some keys already exist; nothing was inserted")
    ),
    security(("bearer" = [])),
    tag = "cards"
)]
#[post("/cards/upload")]
pub async fn upload_cards(
    state: web::Data<AppState>,
    _admin: AdminUser,
    payload: web::Json<CardUploadRequest>,
) -> ApiResult<HttpResponse> {
    if let Some(game_id) = payload.game_id {
        if db::find_game(&state.pool, game_id).await?.is_none() {
            return Err(ApiError::NotFound("game not found".to_string()));
        }
    }

    let keys = match (payload.generate, &payload.card_keys) {
        (Some(count), _) => {
            let count = count as usize;
            if count == 0 || count > MAX_UPLOAD_BATCH {
                return Err(ApiError::BadRequest(format!(
                    "generate must be between 1 and {MAX_UPLOAD_BATCH}"
                )));
            }
            let existing: HashSet<String> =
                db::all_card_keys(&state.pool).await?.into_iter().collect();
            generate_unique_card_keys(count, &existing)
        }
        (None, Some(raw_keys)) => {
            if raw_keys.is_empty() {
                return Err(ApiError::BadRequest("card keys are required".to_string()));
            }
            if raw_keys.len() > MAX_UPLOAD_BATCH {
                return Err(ApiError::BadRequest(format!(
                    "at most {MAX_UPLOAD_BATCH} card keys per upload"
                )));
            }

            // Trim, drop empties, dedupe (keeping first occurrence).
            let mut seen = HashSet::new();
            let keys: Vec<String> = raw_keys
                .iter()
                .map(|key| key.trim().to_string())
                .filter(|key| !key.is_empty())
                .filter(|key| seen.insert(key.clone()))
                .collect();

            if keys.is_empty() {
                return Err(ApiError::BadRequest("no valid card keys".to_string()));
            }

            // All-or-nothing: any key that already exists rejects the batch.
            let duplicates = db::existing_card_keys(&state.pool, &keys).await?;
            if !duplicates.is_empty() {
                return Err(ApiError::DuplicateCardKeys(duplicates));
            }
            keys
        }
        (None, None) => {
            return Err(ApiError::BadRequest("card keys are required".to_string()));
        }
    };

    db::insert_cards(&state.pool, &keys, payload.plan_type, payload.game_id).await?;
    let cards = db::cards_by_keys(&state.pool, &keys).await?;

    Ok(HttpResponse::Created().json(json!({
        "message": format!("uploaded {} cards", cards.len()),
        "count": cards.len(),
        "cards": cards,
    })))
}

#[delete("/cards/{id}")]
pub async fn delete_card(
    state: web::Data<AppState>,
    _admin: AdminUser,
    path: web::Path<i64>,
) -> ApiResult<HttpResponse> {
    let id = path.into_inner();
    let card = db::find_card(&state.pool, id)
        .await?
        .ok_or_else(|| ApiError::NotFound("card not found".to_string()))?;

    if card.status != CardStatus::Unused {
        return Err(ApiError::Conflict(
            "only unused cards can be deleted".to_string(),
        ));
    }

    db::delete_card(&state.pool, id).await?;
    Ok(HttpResponse::Ok().json(json!({ "message": "card deleted" })))
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct VerifyCardRequest {
    pub card_key: String,
}

/// Checks whether a key is redeemable without consuming it.
#[utoipa::path(
    post,
    context_path = "/api",
    request_body = VerifyCardRequest,
    responses(
        (status = 200, description = "Card is redeemable"),
        (status = 404, description = "No such key"),
        (status = 409, description = "Already used or expired")
    ),
    security(("bearer" = [])),
    tag = "cards"
)]
#[post("/cards/verify")]
pub async fn verify_card(
    state: web::Data<AppState>,
    _user: AuthedUser,
    payload: web::Json<VerifyCardRequest>,
) -> ApiResult<HttpResponse> {
    let key = payload.card_key.trim();
    if key.is_empty() {
        return Err(ApiError::BadRequest("card key is required".to_string()));
    }

    let card = db::find_card_by_key(&state.pool, key)
        .await?
        .ok_or_else(|| ApiError::NotFound("card key not found".to_string()))?;

    match card.status {
        CardStatus::Used => Err(ApiError::Conflict(
            "this card key has already been used".to_string(),
        )),
        CardStatus::Expired => Err(ApiError::Conflict("this card key has expired".to_string())),
        CardStatus::Unused => Ok(HttpResponse::Ok().json(json!({
            "valid": true,
            "planType": card.plan_type,
            "message": "card key is valid",
        }))),
    }
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RedeemCardRequest {
    pub card_key: String,
}

/// Trades an unused card directly for a completed order: a zero-amount
/// `paid` order is created and the card is bound to it, both inside one
/// transaction so a failure of either write leaves no trace of the other.
#[utoipa::path(
    post,
    context_path = "/api",
    request_body = RedeemCardRequest,
    responses(
        (status = 200, description = "Card redeemed"),
        (status = 404, description = "No such key"),
        (status = 409, description = "Card is not redeemable")
    ),
    security(("bearer" = [])),
    tag = "cards"
)]
#[post("/cards/redeem")]
pub async fn redeem_card(
    state: web::Data<AppState>,
    user: AuthedUser,
    payload: web::Json<RedeemCardRequest>,
) -> ApiResult<HttpResponse> {
    let key = payload.card_key.trim();
    if key.is_empty() {
        return Err(ApiError::BadRequest("card key is required".to_string()));
    }

    let card = db::find_card_by_key(&state.pool, key)
        .await?
        .ok_or_else(|| ApiError::NotFound("card key not found".to_string()))?;

    if card.status != CardStatus::Unused {
        return Err(ApiError::Conflict(
            "this card key can no longer be used".to_string(),
        ));
    }

    let now = Utc::now();
    let mut tx = state.pool.begin().await?;
    let order = db::insert_order(
        &mut tx,
        user.0.id,
        card.plan_type,
        0.0,
        OrderStatus::Paid,
        Some("card_redeem"),
        now,
    )
    .await?;

    // Re-checked inside the transaction: a concurrent redemption of the same
    // key loses this compare-and-swap and the whole transaction rolls back.
    if !db::bind_card_to_order(&mut tx, card.id, order.id, now).await? {
        return Err(ApiError::Conflict(
            "this card key can no longer be used".to_string(),
        ));
    }
    tx.commit().await?;

    let card = db::find_card(&state.pool, card.id)
        .await?
        .ok_or_else(|| ApiError::Internal("card missing after redemption".to_string()))?;

    Ok(HttpResponse::Ok().json(json!({
        "message": "card redeemed",
        "order": order,
        "card": card,
    })))
}
