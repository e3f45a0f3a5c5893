use std::path::PathBuf;

use chrono::Utc;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use uuid::Uuid;

use dora_shop::api::auth::generate_token;
use dora_shop::config::Config;
use dora_shop::db;
use dora_shop::models::{PlanType, Role};
use dora_shop::AppState;

pub const TEST_JWT_SECRET: &str = "test-secret";
pub const TEST_PASSWORD: &str = "password123";

/// A throwaway SQLite database under the temp dir, migrated and dropped
/// with the test.
pub struct TestDb {
    pub pool: SqlitePool,
    path: PathBuf,
}

impl Drop for TestDb {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.path);
        for suffix in ["-wal", "-shm"] {
            let mut side = self.path.clone().into_os_string();
            side.push(suffix);
            let _ = std::fs::remove_file(side);
        }
    }
}

pub async fn init_test_db() -> TestDb {
    let path = std::env::temp_dir().join(format!("dora_shop_test_{}.db", Uuid::new_v4()));
    let options = SqliteConnectOptions::new()
        .filename(&path)
        .create_if_missing(true)
        .foreign_keys(true);
    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(options)
        .await
        .expect("connect test db");
    sqlx::migrate!().run(&pool).await.expect("migrations");
    TestDb { pool, path }
}

pub fn build_state(pool: SqlitePool) -> AppState {
    AppState {
        pool,
        config: Config {
            port: 0,
            database_url: String::new(),
            jwt_secret: TEST_JWT_SECRET.to_string(),
        },
    }
}

/// Inserts a user and returns (id, bearer token). Low bcrypt cost keeps the
/// suite fast; login tests that need the real cost hash through the API.
#[allow(dead_code)]
pub async fn create_user(pool: &SqlitePool, email: &str, role: Role) -> (i64, String) {
    let password_hash = bcrypt::hash(TEST_PASSWORD, 4).expect("hash password");
    let user = db::insert_user(pool, email, &password_hash, role)
        .await
        .expect("insert user");
    let token = generate_token(user.id, TEST_JWT_SECRET).expect("token");
    (user.id, token)
}

#[allow(dead_code)]
pub async fn seed_card(pool: &SqlitePool, card_key: &str, plan_type: PlanType) -> i64 {
    sqlx::query(
        "INSERT INTO cards (card_key, plan_type, status, created_at) VALUES (?, ?, 'unused', ?)",
    )
    .bind(card_key)
    .bind(plan_type)
    .bind(Utc::now())
    .execute(pool)
    .await
    .expect("insert card")
    .last_insert_rowid()
}

#[allow(dead_code)]
pub fn bearer(token: &str) -> (&'static str, String) {
    ("Authorization", format!("Bearer {token}"))
}
