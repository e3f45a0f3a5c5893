pub mod api;
pub mod card_keys;
pub mod config;
pub mod db;
pub mod docs;
pub mod error;
pub mod models;

use sqlx::SqlitePool;

use crate::config::Config;

#[derive(Clone)]
pub struct AppState {
    pub pool: SqlitePool,
    pub config: Config,
}
