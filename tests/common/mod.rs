#![allow(dead_code)]

use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
    time::Duration,
};

use async_trait::async_trait;
use footwear_store_api::{
    cache::{InMemoryCache, NoCache},
    config::AppConfig,
    db::{create_pool, run_migrations},
    middleware::auth::AuthUser,
    services::auth_service::OtpSender,
    state::AppState,
};
use uuid::Uuid;

/// Captures issued codes so tests can complete the login.
#[derive(Default)]
pub struct RecordingOtpSender {
    codes: Mutex<HashMap<String, String>>,
}

impl RecordingOtpSender {
    pub fn last_code(&self, email: &str) -> Option<String> {
        self.codes.lock().ok()?.get(email).cloned()
    }
}

#[async_trait]
impl OtpSender for RecordingOtpSender {
    async fn send(&self, email: &str, code: &str) -> anyhow::Result<()> {
        if let Ok(mut codes) = self.codes.lock() {
            codes.insert(email.to_string(), code.to_string());
        }
        Ok(())
    }
}

pub fn database_url() -> Option<String> {
    match std::env::var("TEST_DATABASE_URL").or_else(|_| std::env::var("DATABASE_URL")) {
        Ok(url) => Some(url),
        Err(_) => {
            eprintln!(
                "Skipping test: set TEST_DATABASE_URL or DATABASE_URL to run integration flow tests."
            );
            None
        }
    }
}

/// Fresh schema state backed by an in-memory cache.
pub async fn setup_state(
    database_url: &str,
    sender: Arc<RecordingOtpSender>,
) -> anyhow::Result<AppState> {
    let pool = create_pool(database_url).await?;
    run_migrations(&pool).await?;

    sqlx::query(
        "TRUNCATE TABLE returns, order_items, orders, cart_items, addresses, product_images, \
         product_variants, products, colors, sizes, blog_posts, blog_categories, audit_logs, otp_codes, users CASCADE",
    )
    .execute(&pool)
    .await?;

    let config = AppConfig {
        database_url: database_url.to_string(),
        host: "127.0.0.1".into(),
        port: 0,
        jwt_secret: "integration-secret".into(),
        otp_ttl: Duration::from_secs(300),
        cache_default_ttl: Duration::from_secs(900),
        cache_enabled: true,
        cors_origins: Vec::new(),
    };
    let cache = Arc::new(InMemoryCache::new().with_default_ttl(config.cache_default_ttl));
    Ok(AppState::new(pool, cache, &config).with_otp_sender(sender))
}

/// Same database, caching switched off.
pub fn without_cache(state: &AppState) -> AppState {
    AppState {
        cache: Arc::new(NoCache),
        ..state.clone()
    }
}

pub async fn create_user(state: &AppState, username: &str, role: &str) -> anyhow::Result<AuthUser> {
    let (user_id,): (Uuid,) = sqlx::query_as(
        "INSERT INTO users (id, email, username, role) VALUES ($1, $2, $3, $4) RETURNING id",
    )
    .bind(Uuid::new_v4())
    .bind(format!("{username}@example.com"))
    .bind(username)
    .bind(role)
    .fetch_one(&state.pool)
    .await?;

    Ok(AuthUser {
        user_id,
        role: role.to_string(),
    })
}

pub struct SeededVariant {
    pub product_id: Uuid,
    pub variant_id: Uuid,
}

/// One product with a single black size-9 variant.
pub async fn seed_variant(
    state: &AppState,
    name: &str,
    stock: i32,
    price: i64,
) -> anyhow::Result<SeededVariant> {
    let (color_id,): (Uuid,) = sqlx::query_as(
        "INSERT INTO colors (id, code, name) VALUES ($1, '#000000', 'Black') \
         ON CONFLICT (code) DO UPDATE SET name = EXCLUDED.name RETURNING id",
    )
    .bind(Uuid::new_v4())
    .fetch_one(&state.pool)
    .await?;
    let (size_id,): (Uuid,) = sqlx::query_as(
        "INSERT INTO sizes (id, code) VALUES ($1, 9) \
         ON CONFLICT (code) DO UPDATE SET code = EXCLUDED.code RETURNING id",
    )
    .bind(Uuid::new_v4())
    .fetch_one(&state.pool)
    .await?;
    let (product_id,): (Uuid,) = sqlx::query_as(
        "INSERT INTO products (id, name, description, price, category, product_type) \
         VALUES ($1, $2, '', $3, 'MEN', 'SNEAKERS') RETURNING id",
    )
    .bind(Uuid::new_v4())
    .bind(name)
    .bind(price)
    .fetch_one(&state.pool)
    .await?;
    let (variant_id,): (Uuid,) = sqlx::query_as(
        "INSERT INTO product_variants (id, product_id, color_id, size_id, stock, price) \
         VALUES ($1, $2, $3, $4, $5, $6) RETURNING id",
    )
    .bind(Uuid::new_v4())
    .bind(product_id)
    .bind(color_id)
    .bind(size_id)
    .bind(stock)
    .bind(price)
    .fetch_one(&state.pool)
    .await?;

    Ok(SeededVariant {
        product_id,
        variant_id,
    })
}

pub async fn stock_of(state: &AppState, variant_id: Uuid) -> anyhow::Result<i32> {
    let (stock,): (i32,) = sqlx::query_as("SELECT stock FROM product_variants WHERE id = $1")
        .bind(variant_id)
        .fetch_one(&state.pool)
        .await?;
    Ok(stock)
}
