// src/main.rs

use std::str::FromStr;

use actix_web::{web, App, HttpResponse, HttpServer, Responder};
use dotenvy::dotenv;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use dora_shop::api::auth::BCRYPT_COST;
use dora_shop::config::Config;
use dora_shop::error::ApiError;
use dora_shop::models::Role;
use dora_shop::{api, db, docs, AppState};

// Well-known first-run admin credential; replaced the moment any other
// admin exists.
const BOOTSTRAP_ADMIN_EMAIL: &str = "dora@gmail.com";
const BOOTSTRAP_ADMIN_PASSWORD: &str = "doraai";

async fn index() -> impl Responder {
    HttpResponse::Ok().body("Service ready!")
}

/// Guarantees an admin account exists: promotes the well-known email if the
/// user is already registered, creates the account otherwise.
async fn bootstrap_admin(pool: &SqlitePool) -> Result<(), ApiError> {
    if db::count_admins(pool).await? > 0 {
        return Ok(());
    }

    match db::find_user_by_email(pool, BOOTSTRAP_ADMIN_EMAIL).await? {
        Some(user) => {
            db::set_user_role(pool, user.id, Role::Admin).await?;
            log::info!("promoted {BOOTSTRAP_ADMIN_EMAIL} to admin");
        }
        None => {
            let password_hash = bcrypt::hash(BOOTSTRAP_ADMIN_PASSWORD, BCRYPT_COST)?;
            db::insert_user(pool, BOOTSTRAP_ADMIN_EMAIL, &password_hash, Role::Admin).await?;
            log::info!("created default admin account {BOOTSTRAP_ADMIN_EMAIL}");
        }
    }
    Ok(())
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    dotenv().ok();
    env_logger::init();

    let config = Config::from_env();

    let options = SqliteConnectOptions::from_str(&config.database_url)
        .expect("invalid DATABASE_URL")
        .create_if_missing(true)
        .foreign_keys(true);
    let pool = SqlitePoolOptions::new()
        .connect_with(options)
        .await
        .expect("failed to connect to database");

    sqlx::migrate!()
        .run(&pool)
        .await
        .expect("failed to run migrations");

    if let Err(e) = bootstrap_admin(&pool).await {
        log::error!("admin bootstrap failed: {e}");
    }

    let port = config.port;
    let state = web::Data::new(AppState { pool, config });

    log::info!("server listening on http://0.0.0.0:{port}");
    log::info!("api docs at http://0.0.0.0:{port}/docs/");

    HttpServer::new(move || {
        App::new()
            .app_data(state.clone())
            .route("/", web::get().to(index))
            .service(
                SwaggerUi::new("/docs/{_:.*}").url("/api-docs/openapi.json", docs::ApiDoc::openapi()),
            )
            .configure(api::configure)
    })
    .bind(("0.0.0.0", port))?
    .run()
    .await
}
