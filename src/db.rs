// src/db.rs
//
// Query helpers shared across handlers. Functions that must run inside the
// allocation/redemption transaction take `&mut SqliteConnection` so callers
// can pass a `pool.begin()` transaction; everything else works on the pool.

use chrono::{DateTime, Utc};
use sqlx::{QueryBuilder, Sqlite, SqliteConnection, SqlitePool};

use crate::models::{
    Card, CardStatus, Game, Order, OrderStatus, PlanType, ProductRow, Role, SiteConfig, User,
};

// ---- users ----

pub async fn find_user_by_id(pool: &SqlitePool, id: i64) -> Result<Option<User>, sqlx::Error> {
    sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await
}

pub async fn find_user_by_email(
    pool: &SqlitePool,
    email: &str,
) -> Result<Option<User>, sqlx::Error> {
    sqlx::query_as::<_, User>("SELECT * FROM users WHERE email = ?")
        .bind(email)
        .fetch_optional(pool)
        .await
}

pub async fn insert_user(
    pool: &SqlitePool,
    email: &str,
    password_hash: &str,
    role: Role,
) -> Result<User, sqlx::Error> {
    sqlx::query_as::<_, User>(
        "INSERT INTO users (email, password_hash, role, created_at)
         VALUES (?, ?, ?, ?) RETURNING *",
    )
    .bind(email)
    .bind(password_hash)
    .bind(role)
    .bind(Utc::now())
    .fetch_one(pool)
    .await
}

pub async fn count_admins(pool: &SqlitePool) -> Result<i64, sqlx::Error> {
    sqlx::query_scalar("SELECT COUNT(*) FROM users WHERE role = 'admin'")
        .fetch_one(pool)
        .await
}

pub async fn set_user_role(
    pool: &SqlitePool,
    id: i64,
    role: Role,
) -> Result<Option<User>, sqlx::Error> {
    sqlx::query_as::<_, User>("UPDATE users SET role = ? WHERE id = ? RETURNING *")
        .bind(role)
        .bind(id)
        .fetch_optional(pool)
        .await
}

pub async fn order_count_for_user(pool: &SqlitePool, user_id: i64) -> Result<i64, sqlx::Error> {
    sqlx::query_scalar("SELECT COUNT(*) FROM orders WHERE user_id = ?")
        .bind(user_id)
        .fetch_one(pool)
        .await
}

// ---- cards ----

pub async fn find_card(pool: &SqlitePool, id: i64) -> Result<Option<Card>, sqlx::Error> {
    sqlx::query_as::<_, Card>("SELECT * FROM cards WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await
}

pub async fn find_card_by_key(
    pool: &SqlitePool,
    card_key: &str,
) -> Result<Option<Card>, sqlx::Error> {
    sqlx::query_as::<_, Card>("SELECT * FROM cards WHERE card_key = ?")
        .bind(card_key)
        .fetch_optional(pool)
        .await
}

pub async fn all_card_keys(pool: &SqlitePool) -> Result<Vec<String>, sqlx::Error> {
    sqlx::query_scalar("SELECT card_key FROM cards")
        .fetch_all(pool)
        .await
}

/// Which of `keys` are already persisted.
pub async fn existing_card_keys(
    pool: &SqlitePool,
    keys: &[String],
) -> Result<Vec<String>, sqlx::Error> {
    if keys.is_empty() {
        return Ok(Vec::new());
    }
    let mut qb: QueryBuilder<Sqlite> =
        QueryBuilder::new("SELECT card_key FROM cards WHERE card_key IN (");
    let mut separated = qb.separated(", ");
    for key in keys {
        separated.push_bind(key);
    }
    qb.push(")");
    qb.build_query_scalar().fetch_all(pool).await
}

pub async fn insert_cards(
    pool: &SqlitePool,
    keys: &[String],
    plan_type: PlanType,
    game_id: Option<i64>,
) -> Result<(), sqlx::Error> {
    let now = Utc::now();
    let mut qb: QueryBuilder<Sqlite> =
        QueryBuilder::new("INSERT INTO cards (card_key, plan_type, game_id, status, created_at) ");
    qb.push_values(keys, |mut row, key| {
        row.push_bind(key)
            .push_bind(plan_type)
            .push_bind(game_id)
            .push_bind(CardStatus::Unused)
            .push_bind(now);
    });
    qb.build().execute(pool).await?;
    Ok(())
}

pub async fn cards_by_keys(pool: &SqlitePool, keys: &[String]) -> Result<Vec<Card>, sqlx::Error> {
    if keys.is_empty() {
        return Ok(Vec::new());
    }
    let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new("SELECT * FROM cards WHERE card_key IN (");
    let mut separated = qb.separated(", ");
    for key in keys {
        separated.push_bind(key);
    }
    qb.push(") ORDER BY id");
    qb.build_query_as().fetch_all(pool).await
}

pub async fn delete_card(pool: &SqlitePool, id: i64) -> Result<(), sqlx::Error> {
    sqlx::query("DELETE FROM cards WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await?;
    Ok(())
}

pub async fn unused_card_count(pool: &SqlitePool, plan_type: PlanType) -> Result<i64, sqlx::Error> {
    sqlx::query_scalar("SELECT COUNT(*) FROM cards WHERE plan_type = ? AND status = 'unused'")
        .bind(plan_type)
        .fetch_one(pool)
        .await
}

/// Claims one unused card of `plan_type` for `order_id` inside the caller's
/// transaction. The UPDATE re-checks `status = 'unused'` so a card that a
/// concurrent transaction grabbed between SELECT and UPDATE is skipped and
/// the next candidate is tried; `None` means the pool is exhausted, which is
/// a normal outcome, not an error.
pub async fn allocate_card(
    conn: &mut SqliteConnection,
    plan_type: PlanType,
    order_id: i64,
    now: DateTime<Utc>,
) -> Result<Option<Card>, sqlx::Error> {
    loop {
        let candidate = sqlx::query_as::<_, Card>(
            "SELECT * FROM cards WHERE plan_type = ? AND status = 'unused' ORDER BY id LIMIT 1",
        )
        .bind(plan_type)
        .fetch_optional(&mut *conn)
        .await?;

        let Some(card) = candidate else {
            return Ok(None);
        };

        let claimed = sqlx::query(
            "UPDATE cards SET status = 'used', order_id = ?, used_at = ?
             WHERE id = ? AND status = 'unused'",
        )
        .bind(order_id)
        .bind(now)
        .bind(card.id)
        .execute(&mut *conn)
        .await?
        .rows_affected()
            == 1;

        if claimed {
            return sqlx::query_as::<_, Card>("SELECT * FROM cards WHERE id = ?")
                .bind(card.id)
                .fetch_optional(&mut *conn)
                .await;
        }
    }
}

/// Compare-and-swap bind of a specific card. Returns false if the card is no
/// longer unused.
pub async fn bind_card_to_order(
    conn: &mut SqliteConnection,
    card_id: i64,
    order_id: i64,
    now: DateTime<Utc>,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        "UPDATE cards SET status = 'used', order_id = ?, used_at = ?
         WHERE id = ? AND status = 'unused'",
    )
    .bind(order_id)
    .bind(now)
    .bind(card_id)
    .execute(&mut *conn)
    .await?;
    Ok(result.rows_affected() == 1)
}

// ---- orders ----

pub async fn find_order(pool: &SqlitePool, id: i64) -> Result<Option<Order>, sqlx::Error> {
    sqlx::query_as::<_, Order>("SELECT * FROM orders WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await
}

pub async fn card_for_order(pool: &SqlitePool, order_id: i64) -> Result<Option<Card>, sqlx::Error> {
    sqlx::query_as::<_, Card>("SELECT * FROM cards WHERE order_id = ? LIMIT 1")
        .bind(order_id)
        .fetch_optional(pool)
        .await
}

pub async fn insert_order(
    conn: &mut SqliteConnection,
    user_id: i64,
    plan_type: PlanType,
    amount: f64,
    status: OrderStatus,
    payment_method: Option<&str>,
    now: DateTime<Utc>,
) -> Result<Order, sqlx::Error> {
    sqlx::query_as::<_, Order>(
        "INSERT INTO orders (user_id, plan_type, amount, status, payment_method, created_at)
         VALUES (?, ?, ?, ?, ?, ?) RETURNING *",
    )
    .bind(user_id)
    .bind(plan_type)
    .bind(amount)
    .bind(status)
    .bind(payment_method)
    .bind(now)
    .fetch_one(&mut *conn)
    .await
}

pub async fn mark_order_paid(
    conn: &mut SqliteConnection,
    order_id: i64,
    payment_method: &str,
) -> Result<Order, sqlx::Error> {
    sqlx::query_as::<_, Order>(
        "UPDATE orders SET status = 'paid', payment_method = ? WHERE id = ? RETURNING *",
    )
    .bind(payment_method)
    .bind(order_id)
    .fetch_one(&mut *conn)
    .await
}

pub async fn update_order_status(
    conn: &mut SqliteConnection,
    order_id: i64,
    status: OrderStatus,
) -> Result<Order, sqlx::Error> {
    sqlx::query_as::<_, Order>("UPDATE orders SET status = ? WHERE id = ? RETURNING *")
        .bind(status)
        .bind(order_id)
        .fetch_one(&mut *conn)
        .await
}

// ---- games ----

pub async fn find_game(pool: &SqlitePool, id: i64) -> Result<Option<Game>, sqlx::Error> {
    sqlx::query_as::<_, Game>("SELECT * FROM games WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await
}

pub async fn find_game_by_slug(pool: &SqlitePool, slug: &str) -> Result<Option<Game>, sqlx::Error> {
    sqlx::query_as::<_, Game>("SELECT * FROM games WHERE slug = ?")
        .bind(slug)
        .fetch_optional(pool)
        .await
}

pub async fn slug_taken(
    pool: &SqlitePool,
    slug: &str,
    exclude_id: Option<i64>,
) -> Result<bool, sqlx::Error> {
    let count: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM games WHERE slug = ? AND id != COALESCE(?, -1)")
            .bind(slug)
            .bind(exclude_id)
            .fetch_one(pool)
            .await?;
    Ok(count > 0)
}

pub async fn delete_game(pool: &SqlitePool, id: i64) -> Result<(), sqlx::Error> {
    sqlx::query("DELETE FROM games WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await?;
    Ok(())
}

// ---- products ----

pub async fn find_product(pool: &SqlitePool, id: i64) -> Result<Option<ProductRow>, sqlx::Error> {
    sqlx::query_as::<_, ProductRow>("SELECT * FROM products WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await
}

pub async fn delete_product(pool: &SqlitePool, id: i64) -> Result<(), sqlx::Error> {
    sqlx::query("DELETE FROM products WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await?;
    Ok(())
}

// ---- site configs ----

pub async fn configs_for_scope(
    pool: &SqlitePool,
    game_id: Option<i64>,
) -> Result<Vec<SiteConfig>, sqlx::Error> {
    sqlx::query_as::<_, SiteConfig>("SELECT * FROM site_configs WHERE game_id IS ? ORDER BY key")
        .bind(game_id)
        .fetch_all(pool)
        .await
}

pub async fn find_site_config(
    pool: &SqlitePool,
    game_id: Option<i64>,
    key: &str,
) -> Result<Option<SiteConfig>, sqlx::Error> {
    sqlx::query_as::<_, SiteConfig>("SELECT * FROM site_configs WHERE game_id IS ? AND key = ?")
        .bind(game_id)
        .bind(key)
        .fetch_optional(pool)
        .await
}

/// Upsert keyed on (game_id, key), where a NULL game_id means global.
/// Select-then-write rather than ON CONFLICT because the global partition
/// lives on a separate partial index (SQLite NULL semantics).
pub async fn upsert_site_config(
    pool: &SqlitePool,
    game_id: Option<i64>,
    key: &str,
    value: &str,
) -> Result<SiteConfig, sqlx::Error> {
    if let Some(existing) = find_site_config(pool, game_id, key).await? {
        sqlx::query_as::<_, SiteConfig>("UPDATE site_configs SET value = ? WHERE id = ? RETURNING *")
            .bind(value)
            .bind(existing.id)
            .fetch_one(pool)
            .await
    } else {
        sqlx::query_as::<_, SiteConfig>(
            "INSERT INTO site_configs (game_id, key, value) VALUES (?, ?, ?) RETURNING *",
        )
        .bind(game_id)
        .bind(key)
        .bind(value)
        .fetch_one(pool)
        .await
    }
}

pub async fn delete_site_config(
    pool: &SqlitePool,
    game_id: Option<i64>,
    key: &str,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("DELETE FROM site_configs WHERE game_id IS ? AND key = ?")
        .bind(game_id)
        .bind(key)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}
