use std::{sync::Arc, time::Duration};

use crate::{
    cache::SharedCache,
    config::AppConfig,
    db::{DbPool, OrmConn, orm_from_pool},
    services::auth_service::{LogOtpSender, OtpSender},
};

#[derive(Clone)]
pub struct AuthSettings {
    pub jwt_secret: Arc<str>,
    pub token_ttl: chrono::Duration,
    pub otp_ttl: Duration,
}

#[derive(Clone)]
pub struct AppState {
    pub pool: DbPool,
    pub orm: OrmConn,
    pub cache: SharedCache,
    pub otp_sender: Arc<dyn OtpSender>,
    pub auth: AuthSettings,
}

impl AppState {
    pub fn new(pool: DbPool, cache: SharedCache, config: &AppConfig) -> Self {
        Self {
            orm: orm_from_pool(&pool),
            pool,
            cache,
            otp_sender: Arc::new(LogOtpSender),
            auth: AuthSettings {
                jwt_secret: Arc::from(config.jwt_secret.as_str()),
                token_ttl: chrono::Duration::hours(24),
                otp_ttl: config.otp_ttl,
            },
        }
    }

    pub fn with_otp_sender(mut self, sender: Arc<dyn OtpSender>) -> Self {
        self.otp_sender = sender;
        self
    }
}
