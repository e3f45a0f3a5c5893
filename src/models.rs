// src/models.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;

/// Subscription tier a card or order grants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum PlanType {
    Day,
    Week,
    Month,
    Lifetime,
}

impl PlanType {
    pub fn as_str(&self) -> &'static str {
        match self {
            PlanType::Day => "day",
            PlanType::Week => "week",
            PlanType::Month => "month",
            PlanType::Lifetime => "lifetime",
        }
    }
}

/// Card lifecycle. Transitions only move forward: unused -> used or
/// unused -> expired; a used card never changes again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum CardStatus {
    Unused,
    Used,
    Expired,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum OrderStatus {
    Pending,
    Paid,
    Cancelled,
    Refunded,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum Role {
    User,
    Admin,
}

#[derive(Debug, Clone, FromRow, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: i64,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub role: Role,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UserSummary {
    pub id: i64,
    pub email: String,
}

impl From<&User> for UserSummary {
    fn from(user: &User) -> Self {
        UserSummary {
            id: user.id,
            email: user.email.clone(),
        }
    }
}

#[derive(Debug, Clone, FromRow, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Game {
    pub id: i64,
    pub name: String,
    pub slug: String,
    pub description: Option<String>,
    pub icon: Option<String>,
    pub cover_image: Option<String>,
    pub theme_color: String,
    pub is_active: bool,
    pub sort_order: i64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct GameSummary {
    pub id: i64,
    pub name: String,
    pub slug: String,
}

/// Raw product row; `features` is the JSON-encoded TEXT column.
#[derive(Debug, Clone, FromRow)]
pub struct ProductRow {
    pub id: i64,
    pub game_id: i64,
    pub name: String,
    pub plan_type: PlanType,
    pub price: f64,
    pub currency: String,
    pub duration: i64,
    pub description: Option<String>,
    pub features: String,
    pub badge: Option<String>,
    pub is_popular: bool,
    pub is_premium: bool,
    pub is_active: bool,
    pub sort_order: i64,
    pub created_at: DateTime<Utc>,
}

/// Product as served by the API: features decoded into an ordered list,
/// optionally carrying the owning game's summary.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub id: i64,
    pub game_id: i64,
    pub name: String,
    pub plan_type: PlanType,
    pub price: f64,
    pub currency: String,
    pub duration: i64,
    pub description: Option<String>,
    pub features: Vec<String>,
    pub badge: Option<String>,
    pub is_popular: bool,
    pub is_premium: bool,
    pub is_active: bool,
    pub sort_order: i64,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub game: Option<GameSummary>,
}

impl ProductRow {
    pub fn into_product(self, game: Option<GameSummary>) -> Product {
        let features = serde_json::from_str(&self.features).unwrap_or_default();
        Product {
            id: self.id,
            game_id: self.game_id,
            name: self.name,
            plan_type: self.plan_type,
            price: self.price,
            currency: self.currency,
            duration: self.duration,
            description: self.description,
            features,
            badge: self.badge,
            is_popular: self.is_popular,
            is_premium: self.is_premium,
            is_active: self.is_active,
            sort_order: self.sort_order,
            created_at: self.created_at,
            game,
        }
    }
}

#[derive(Debug, Clone, FromRow, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Card {
    pub id: i64,
    pub card_key: String,
    pub plan_type: PlanType,
    pub game_id: Option<i64>,
    pub status: CardStatus,
    pub order_id: Option<i64>,
    pub used_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CardSummary {
    pub card_key: String,
    pub status: CardStatus,
}

impl From<&Card> for CardSummary {
    fn from(card: &Card) -> Self {
        CardSummary {
            card_key: card.card_key.clone(),
            status: card.status,
        }
    }
}

#[derive(Debug, Clone, FromRow, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub id: i64,
    pub user_id: i64,
    pub plan_type: PlanType,
    pub amount: f64,
    pub status: OrderStatus,
    pub payment_method: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SiteConfig {
    pub id: i64,
    pub game_id: Option<i64>,
    pub key: String,
    pub value: String,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    pub page: i64,
    pub limit: i64,
    pub total: i64,
    pub total_pages: i64,
}

impl Pagination {
    pub fn new(page: i64, limit: i64, total: i64) -> Self {
        Pagination {
            page,
            limit,
            total,
            total_pages: (total + limit - 1) / limit,
        }
    }
}
