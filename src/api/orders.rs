// src/api/orders.rs

use actix_web::{get, post, put, web, HttpResponse};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::json;
use sqlx::{FromRow, QueryBuilder, Row, Sqlite};
use utoipa::ToSchema;

use crate::api::auth::{AdminUser, AuthedUser};
use crate::config;
use crate::db;
use crate::error::{ApiError, ApiResult};
use crate::models::{
    CardStatus, CardSummary, Order, OrderStatus, Pagination, PlanType, Role, UserSummary,
};
use crate::AppState;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct OrderWithDetails {
    #[serde(flatten)]
    order: Order,
    user: UserSummary,
    card: Option<CardSummary>,
}

#[derive(Debug, Deserialize)]
pub struct OrderListQuery {
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

#[get("/orders")]
pub async fn list_orders(
    state: web::Data<AppState>,
    user: AuthedUser,
    query: web::Query<OrderListQuery>,
) -> ApiResult<HttpResponse> {
    let page = query.page.unwrap_or(1).max(1);
    let limit = query.limit.unwrap_or(20).clamp(1, 100);
    let is_admin = user.0.role == Role::Admin;

    let mut count_qb: QueryBuilder<Sqlite> =
        QueryBuilder::new("SELECT COUNT(*) FROM orders WHERE 1=1");
    if !is_admin {
        count_qb.push(" AND user_id = ").push_bind(user.0.id);
    }
    let total: i64 = count_qb.build_query_scalar().fetch_one(&state.pool).await?;

    let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new(
        "SELECT o.*, u.email AS user_email, c.card_key, c.status AS card_status
         FROM orders o
         JOIN users u ON u.id = o.user_id
         LEFT JOIN cards c ON c.order_id = o.id
         WHERE 1=1",
    );
    if !is_admin {
        qb.push(" AND o.user_id = ").push_bind(user.0.id);
    }
    qb.push(" ORDER BY o.created_at DESC, o.id DESC LIMIT ")
        .push_bind(limit)
        .push(" OFFSET ")
        .push_bind((page - 1) * limit);

    let rows = qb.build().fetch_all(&state.pool).await?;
    let orders = rows
        .iter()
        .map(|row| {
            let order = Order::from_row(row)?;
            let card_key: Option<String> = row.try_get("card_key")?;
            let card = card_key.map(|card_key| -> Result<CardSummary, sqlx::Error> {
                Ok(CardSummary {
                    card_key,
                    status: row.try_get::<CardStatus, _>("card_status")?,
                })
            });
            Ok(OrderWithDetails {
                user: UserSummary {
                    id: order.user_id,
                    email: row.try_get("user_email")?,
                },
                card: card.transpose()?,
                order,
            })
        })
        .collect::<Result<Vec<_>, sqlx::Error>>()?;

    Ok(HttpResponse::Ok().json(json!({
        "orders": orders,
        "pagination": Pagination::new(page, limit, total),
    })))
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateOrderRequest {
    pub plan_type: PlanType,
    pub payment_method: Option<String>,
}

#[utoipa::path(
    post,
    context_path = "/api",
    request_body = CreateOrderRequest,
    responses(
        (status = 201, description = "Pending order created"),
        (status = 400, description = "Plan not currently offered")
    ),
    security(("bearer" = [])),
    tag = "orders"
)]
#[post("/orders")]
pub async fn create_order(
    state: web::Data<AppState>,
    user: AuthedUser,
    payload: web::Json<CreateOrderRequest>,
) -> ApiResult<HttpResponse> {
    let amount = config::plan_price(payload.plan_type);
    // Zero price is the "coming soon" sentinel.
    if amount == 0.0 {
        return Err(ApiError::BadRequest(
            "this plan is not currently available for purchase".to_string(),
        ));
    }

    let mut conn = state.pool.acquire().await?;
    let order = db::insert_order(
        &mut conn,
        user.0.id,
        payload.plan_type,
        amount,
        OrderStatus::Pending,
        payload.payment_method.as_deref(),
        Utc::now(),
    )
    .await?;

    Ok(HttpResponse::Created().json(json!({
        "message": "order created",
        "order": order,
        "payment": {
            "amount": amount,
            "currency": config::CURRENCY,
            "orderId": order.id,
        },
    })))
}

#[get("/orders/{id}")]
pub async fn get_order(
    state: web::Data<AppState>,
    user: AuthedUser,
    path: web::Path<i64>,
) -> ApiResult<HttpResponse> {
    let order = db::find_order(&state.pool, path.into_inner())
        .await?
        .ok_or_else(|| ApiError::NotFound("order not found".to_string()))?;

    if user.0.role != Role::Admin && order.user_id != user.0.id {
        return Err(ApiError::Forbidden(
            "you cannot view this order".to_string(),
        ));
    }

    let owner = db::find_user_by_id(&state.pool, order.user_id)
        .await?
        .ok_or_else(|| ApiError::Internal("order owner missing".to_string()))?;
    let card = db::card_for_order(&state.pool, order.id).await?;

    Ok(HttpResponse::Ok().json(json!({
        "order": OrderWithDetails {
            user: UserSummary::from(&owner),
            card: card.as_ref().map(CardSummary::from),
            order,
        },
    })))
}

/// Mock payment confirmation. On success one unused card of the order's plan
/// is bound to it; the order update and the card update commit together or
/// not at all. Paying an already-paid order is idempotent and returns the
/// existing binding.
#[utoipa::path(
    post,
    context_path = "/api",
    params(("id" = i64, Path, description = "Order id")),
    responses(
        (status = 200, description = "Paid, card assigned"),
        (status = 400, description = "No card available (errorCode NO_CARD_AVAILABLE)"),
        (status = 403, description = "Not the order's owner"),
        (status = 409, description = "Order is not payable")
    ),
    security(("bearer" = [])),
    tag = "orders"
)]
#[post("/orders/{id}/pay")]
pub async fn pay_order(
    state: web::Data<AppState>,
    user: AuthedUser,
    path: web::Path<i64>,
) -> ApiResult<HttpResponse> {
    let order = db::find_order(&state.pool, path.into_inner())
        .await?
        .ok_or_else(|| ApiError::NotFound("order not found".to_string()))?;

    if order.user_id != user.0.id {
        return Err(ApiError::Forbidden(
            "you cannot pay this order".to_string(),
        ));
    }

    if order.status == OrderStatus::Paid {
        let card = db::card_for_order(&state.pool, order.id).await?;
        return Ok(HttpResponse::Ok().json(json!({
            "success": true,
            "message": "order already paid",
            "order": order,
            "card": card.as_ref().map(CardSummary::from),
        })));
    }

    if order.status != OrderStatus::Pending {
        return Err(ApiError::Conflict(
            "order cannot be paid in its current state".to_string(),
        ));
    }

    let mut tx = state.pool.begin().await?;
    let Some(card) = db::allocate_card(&mut tx, order.plan_type, order.id, Utc::now()).await? else {
        // Rolls back the open transaction; the pool being empty is a
        // recoverable condition for the caller, not a server fault.
        return Err(ApiError::NoCardAvailable);
    };
    let order = db::mark_order_paid(&mut tx, order.id, "mock_payment").await?;
    tx.commit().await?;

    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "message": "payment successful",
        "order": order,
        "card": CardSummary::from(&card),
    })))
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateOrderRequest {
    pub status: OrderStatus,
}

/// Admin override: any status may be set from any other (there is no
/// transition graph here on purpose). Moving into `paid` tries to allocate a
/// card but tolerates an empty pool, so inventory can be backfilled later.
#[put("/orders/{id}")]
pub async fn set_order_status(
    state: web::Data<AppState>,
    _admin: AdminUser,
    path: web::Path<i64>,
    payload: web::Json<UpdateOrderRequest>,
) -> ApiResult<HttpResponse> {
    let order = db::find_order(&state.pool, path.into_inner())
        .await?
        .ok_or_else(|| ApiError::NotFound("order not found".to_string()))?;

    let mut tx = state.pool.begin().await?;
    let mut assigned_card = None;
    if payload.status == OrderStatus::Paid && order.status != OrderStatus::Paid {
        assigned_card = db::allocate_card(&mut tx, order.plan_type, order.id, Utc::now()).await?;
    }
    let order = db::update_order_status(&mut tx, order.id, payload.status).await?;
    tx.commit().await?;

    Ok(HttpResponse::Ok().json(json!({
        "message": "order status updated",
        "order": order,
        "assignedCard": assigned_card,
    })))
}
