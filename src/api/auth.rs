// src/api/auth.rs

use actix_web::dev::Payload;
use actix_web::http::header;
use actix_web::{get, post, web, FromRequest, HttpRequest, HttpResponse};
use chrono::{Duration, Utc};
use futures_util::future::LocalBoxFuture;
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use serde_json::json;
use utoipa::ToSchema;

use crate::db;
use crate::error::{ApiError, ApiResult};
use crate::models::{Role, User};
use crate::AppState;

pub const BCRYPT_COST: u32 = 10;
pub const TOKEN_TTL_DAYS: i64 = 7;
const MIN_PASSWORD_LEN: usize = 6;

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: i64,
    pub exp: usize,
}

pub fn generate_token(user_id: i64, secret: &str) -> Result<String, jsonwebtoken::errors::Error> {
    let exp = (Utc::now() + Duration::days(TOKEN_TTL_DAYS)).timestamp() as usize;
    let claims = Claims { sub: user_id, exp };
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
}

/// The authenticated caller, extracted from `Authorization: Bearer <jwt>`.
/// Missing header is 401; a bad/expired token or a token whose user no
/// longer exists is 403.
pub struct AuthedUser(pub User);

impl FromRequest for AuthedUser {
    type Error = ApiError;
    type Future = LocalBoxFuture<'static, Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        let req = req.clone();
        Box::pin(async move {
            let state = req
                .app_data::<web::Data<AppState>>()
                .ok_or_else(|| ApiError::Internal("app state missing".to_string()))?;

            let bearer = req
                .headers()
                .get(header::AUTHORIZATION)
                .and_then(|h| h.to_str().ok())
                .and_then(|h| h.strip_prefix("Bearer "));

            let Some(token) = bearer else {
                return Err(ApiError::Unauthorized("missing bearer token".to_string()));
            };

            let token_data = decode::<Claims>(
                token,
                &DecodingKey::from_secret(state.config.jwt_secret.as_bytes()),
                &Validation::default(),
            )
            .map_err(|_| ApiError::Forbidden("invalid or expired token".to_string()))?;

            let user = db::find_user_by_id(&state.pool, token_data.claims.sub)
                .await?
                .ok_or_else(|| ApiError::Forbidden("invalid or expired token".to_string()))?;

            Ok(AuthedUser(user))
        })
    }
}

/// An authenticated caller that must also hold the admin role.
pub struct AdminUser(pub User);

impl FromRequest for AdminUser {
    type Error = ApiError;
    type Future = LocalBoxFuture<'static, Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, payload: &mut Payload) -> Self::Future {
        let inner = AuthedUser::from_request(req, payload);
        Box::pin(async move {
            let AuthedUser(user) = inner.await?;
            if user.role != Role::Admin {
                return Err(ApiError::Forbidden("admin access required".to_string()));
            }
            Ok(AdminUser(user))
        })
    }
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct AuthResponse {
    pub message: String,
    pub token: String,
    #[schema(value_type = Object)]
    pub user: serde_json::Value,
}

fn user_json(user: &User) -> serde_json::Value {
    json!({
        "id": user.id,
        "email": user.email,
        "role": user.role,
        "createdAt": user.created_at,
    })
}

#[utoipa::path(
    post,
    context_path = "/api",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "Account created", body = AuthResponse),
        (status = 400, description = "Password too short or email taken")
    ),
    tag = "auth"
)]
#[post("/auth/register")]
pub async fn register(
    state: web::Data<AppState>,
    payload: web::Json<RegisterRequest>,
) -> ApiResult<HttpResponse> {
    if payload.email.is_empty() || payload.password.is_empty() {
        return Err(ApiError::BadRequest(
            "email and password are required".to_string(),
        ));
    }
    if payload.password.len() < MIN_PASSWORD_LEN {
        return Err(ApiError::BadRequest(
            "password must be at least 6 characters".to_string(),
        ));
    }

    if db::find_user_by_email(&state.pool, &payload.email)
        .await?
        .is_some()
    {
        return Err(ApiError::BadRequest(
            "this email is already registered".to_string(),
        ));
    }

    let password_hash = bcrypt::hash(&payload.password, BCRYPT_COST)?;
    let user = db::insert_user(&state.pool, &payload.email, &password_hash, Role::User).await?;
    let token = generate_token(user.id, &state.config.jwt_secret)?;

    Ok(HttpResponse::Created().json(AuthResponse {
        message: "registered".to_string(),
        token,
        user: user_json(&user),
    }))
}

#[utoipa::path(
    post,
    context_path = "/api",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Logged in", body = AuthResponse),
        (status = 401, description = "Invalid credentials")
    ),
    tag = "auth"
)]
#[post("/auth/login")]
pub async fn login(
    state: web::Data<AppState>,
    payload: web::Json<LoginRequest>,
) -> ApiResult<HttpResponse> {
    if payload.email.is_empty() || payload.password.is_empty() {
        return Err(ApiError::BadRequest(
            "email and password are required".to_string(),
        ));
    }

    // One generic message for both unknown email and wrong password, so the
    // endpoint cannot be used to enumerate accounts.
    let user = db::find_user_by_email(&state.pool, &payload.email)
        .await?
        .ok_or_else(|| ApiError::Unauthorized("invalid email or password".to_string()))?;

    if !bcrypt::verify(&payload.password, &user.password_hash)? {
        return Err(ApiError::Unauthorized(
            "invalid email or password".to_string(),
        ));
    }

    let token = generate_token(user.id, &state.config.jwt_secret)?;

    Ok(HttpResponse::Ok().json(AuthResponse {
        message: "logged in".to_string(),
        token,
        user: user_json(&user),
    }))
}

#[utoipa::path(
    get,
    context_path = "/api",
    responses(
        (status = 200, description = "Current user"),
        (status = 401, description = "No token"),
        (status = 403, description = "Bad token")
    ),
    security(("bearer" = [])),
    tag = "auth"
)]
#[get("/auth/me")]
pub async fn me(state: web::Data<AppState>, user: AuthedUser) -> ApiResult<HttpResponse> {
    let order_count = db::order_count_for_user(&state.pool, user.0.id).await?;
    let mut body = user_json(&user.0);
    body["orderCount"] = json!(order_count);
    Ok(HttpResponse::Ok().json(json!({ "user": body })))
}
