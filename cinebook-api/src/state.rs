use std::sync::Arc;

use cinebook_booking::ReservationEngine;
use cinebook_store::RedisClient;

#[derive(Clone)]
pub struct AuthConfig {
    pub secret: String,
}

/// Per-IP request budget, backed by Redis.
#[derive(Clone)]
pub struct RateLimit {
    pub redis: Arc<RedisClient>,
    pub per_minute: i64,
}

#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<ReservationEngine>,
    pub auth: AuthConfig,
    pub rate_limit: Option<RateLimit>,
}

impl AppState {
    pub fn new(engine: ReservationEngine, auth: AuthConfig) -> Self {
        Self {
            engine: Arc::new(engine),
            auth,
            rate_limit: None,
        }
    }

    pub fn with_rate_limit(mut self, redis: RedisClient, per_minute: i64) -> Self {
        self.rate_limit = Some(RateLimit { redis: Arc::new(redis), per_minute });
        self
    }
}
