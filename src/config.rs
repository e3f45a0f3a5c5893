// src/config.rs

use std::env;

use crate::models::PlanType;

pub const CURRENCY: &str = "NT$";

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub database_url: String,
    pub jwt_secret: String,
}

impl Config {
    pub fn from_env() -> Self {
        Config {
            port: env::var("PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(8080),
            database_url: env::var("DATABASE_URL")
                .unwrap_or_else(|_| "sqlite://dora-shop.db".to_string()),
            jwt_secret: env::var("JWT_SECRET").unwrap_or_else(|_| "default-secret".to_string()),
        }
    }
}

/// Plan pricing in NT$. A zero price marks a plan that is not currently
/// sold (week is "coming soon").
pub fn plan_price(plan: PlanType) -> f64 {
    match plan {
        PlanType::Day => 120.0,
        PlanType::Week => 0.0,
        PlanType::Month => 1400.0,
        PlanType::Lifetime => 8000.0,
    }
}
