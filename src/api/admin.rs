// src/api/admin.rs

use actix_web::{get, post, put, web, HttpResponse};
use serde::Deserialize;
use serde_json::json;
use sqlx::Row;

use crate::api::auth::{AdminUser, BCRYPT_COST};
use crate::db;
use crate::error::{ApiError, ApiResult};
use crate::models::{Pagination, Role};
use crate::AppState;

/// First-run setup: create (or promote) the admin account. Usable only
/// while no admin exists, so it cannot be abused once the system is live.
#[post("/admin/init")]
pub async fn init_admin(state: web::Data<AppState>) -> ApiResult<HttpResponse> {
    if db::count_admins(&state.pool).await? > 0 {
        return Err(ApiError::BadRequest(
            "admin account already exists".to_string(),
        ));
    }

    let admin_email =
        std::env::var("ADMIN_EMAIL").unwrap_or_else(|_| "admin@dora.com".to_string());
    let admin_password =
        std::env::var("ADMIN_PASSWORD").unwrap_or_else(|_| "Admin123456".to_string());

    if let Some(user) = db::find_user_by_email(&state.pool, &admin_email).await? {
        db::set_user_role(&state.pool, user.id, Role::Admin).await?;
        return Ok(HttpResponse::Ok().json(json!({
            "message": "existing user promoted to admin",
            "admin": { "email": admin_email, "note": "log in with the original password" },
        })));
    }

    let password_hash = bcrypt::hash(&admin_password, BCRYPT_COST)?;
    db::insert_user(&state.pool, &admin_email, &password_hash, Role::Admin).await?;

    Ok(HttpResponse::Created().json(json!({
        "message": "admin account created",
        "admin": {
            "email": admin_email,
            "password": admin_password,
            "note": "change this password after first login",
        },
    })))
}

#[get("/admin/check-init")]
pub async fn check_init(state: web::Data<AppState>) -> ApiResult<HttpResponse> {
    let initialized = db::count_admins(&state.pool).await? > 0;
    Ok(HttpResponse::Ok().json(json!({ "initialized": initialized })))
}

#[get("/admin/stats")]
pub async fn stats(state: web::Data<AppState>, _admin: AdminUser) -> ApiResult<HttpResponse> {
    let total_users: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users")
        .fetch_one(&state.pool)
        .await?;
    let total_orders: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM orders")
        .fetch_one(&state.pool)
        .await?;
    let total_cards: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM cards")
        .fetch_one(&state.pool)
        .await?;
    let unused_cards: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM cards WHERE status = 'unused'")
            .fetch_one(&state.pool)
            .await?;
    let total_revenue: f64 = sqlx::query_scalar(
        "SELECT COALESCE(SUM(amount), 0.0) FROM orders WHERE status = 'paid'",
    )
    .fetch_one(&state.pool)
    .await?;

    let cards_by_plan = sqlx::query(
        "SELECT plan_type, status, COUNT(*) AS count FROM cards GROUP BY plan_type, status",
    )
    .fetch_all(&state.pool)
    .await?
    .iter()
    .map(|row| {
        Ok(json!({
            "planType": row.try_get::<String, _>("plan_type")?,
            "status": row.try_get::<String, _>("status")?,
            "count": row.try_get::<i64, _>("count")?,
        }))
    })
    .collect::<Result<Vec<_>, sqlx::Error>>()?;

    let orders_by_status =
        sqlx::query("SELECT status, COUNT(*) AS count FROM orders GROUP BY status")
            .fetch_all(&state.pool)
            .await?
            .iter()
            .map(|row| {
                Ok(json!({
                    "status": row.try_get::<String, _>("status")?,
                    "count": row.try_get::<i64, _>("count")?,
                }))
            })
            .collect::<Result<Vec<_>, sqlx::Error>>()?;

    let recent_orders = sqlx::query(
        "SELECT o.id, o.plan_type, o.amount, o.status, o.created_at, u.email
         FROM orders o JOIN users u ON u.id = o.user_id
         ORDER BY o.created_at DESC, o.id DESC LIMIT 5",
    )
    .fetch_all(&state.pool)
    .await?
    .iter()
    .map(|row| {
        Ok(json!({
            "id": row.try_get::<i64, _>("id")?,
            "planType": row.try_get::<String, _>("plan_type")?,
            "amount": row.try_get::<f64, _>("amount")?,
            "status": row.try_get::<String, _>("status")?,
            "createdAt": row.try_get::<chrono::DateTime<chrono::Utc>, _>("created_at")?,
            "user": { "email": row.try_get::<String, _>("email")? },
        }))
    })
    .collect::<Result<Vec<_>, sqlx::Error>>()?;

    Ok(HttpResponse::Ok().json(json!({
        "overview": {
            "totalUsers": total_users,
            "totalOrders": total_orders,
            "totalCards": total_cards,
            "unusedCards": unused_cards,
            "totalRevenue": total_revenue,
        },
        "cardsByPlan": cards_by_plan,
        "ordersByStatus": orders_by_status,
        "recentOrders": recent_orders,
    })))
}

#[derive(Debug, Deserialize)]
pub struct UserListQuery {
    pub page: Option<i64>,
    pub limit: Option<i64>,
    pub search: Option<String>,
}

#[get("/admin/users")]
pub async fn list_users(
    state: web::Data<AppState>,
    _admin: AdminUser,
    query: web::Query<UserListQuery>,
) -> ApiResult<HttpResponse> {
    let page = query.page.unwrap_or(1).max(1);
    let limit = query.limit.unwrap_or(20).clamp(1, 100);
    let pattern = query
        .search
        .as_deref()
        .filter(|s| !s.is_empty())
        .map(|s| format!("%{s}%"));

    let total: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM users WHERE email LIKE COALESCE(?, '%')")
            .bind(&pattern)
            .fetch_one(&state.pool)
            .await?;

    let users = sqlx::query(
        "SELECT u.id, u.email, u.role, u.created_at,
                (SELECT COUNT(*) FROM orders o WHERE o.user_id = u.id) AS order_count
         FROM users u
         WHERE u.email LIKE COALESCE(?, '%')
         ORDER BY u.created_at DESC, u.id DESC
         LIMIT ? OFFSET ?",
    )
    .bind(&pattern)
    .bind(limit)
    .bind((page - 1) * limit)
    .fetch_all(&state.pool)
    .await?
    .iter()
    .map(|row| {
        Ok(json!({
            "id": row.try_get::<i64, _>("id")?,
            "email": row.try_get::<String, _>("email")?,
            "role": row.try_get::<String, _>("role")?,
            "createdAt": row.try_get::<chrono::DateTime<chrono::Utc>, _>("created_at")?,
            "orderCount": row.try_get::<i64, _>("order_count")?,
        }))
    })
    .collect::<Result<Vec<_>, sqlx::Error>>()?;

    Ok(HttpResponse::Ok().json(json!({
        "users": users,
        "pagination": Pagination::new(page, limit, total),
    })))
}

#[derive(Debug, Deserialize)]
pub struct UpdateRoleRequest {
    pub role: Role,
}

#[put("/admin/users/{id}/role")]
pub async fn update_user_role(
    state: web::Data<AppState>,
    admin: AdminUser,
    path: web::Path<i64>,
    payload: web::Json<UpdateRoleRequest>,
) -> ApiResult<HttpResponse> {
    let user_id = path.into_inner();
    if user_id == admin.0.id {
        return Err(ApiError::BadRequest(
            "you cannot change your own role".to_string(),
        ));
    }

    let user = db::set_user_role(&state.pool, user_id, payload.role)
        .await?
        .ok_or_else(|| ApiError::NotFound("user not found".to_string()))?;

    Ok(HttpResponse::Ok().json(json!({
        "message": "user role updated",
        "user": { "id": user.id, "email": user.email, "role": user.role },
    })))
}
