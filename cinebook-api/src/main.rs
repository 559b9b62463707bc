use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use cinebook_api::{app, state::{AppState, AuthConfig}};
use cinebook_booking::{HoldPolicy, HoldSweeper, ReservationEngine};
use cinebook_store::app_config::{BookingRules, Config};
use cinebook_store::{DbClient, PostgresSeatRepository, RedisClient};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

fn hold_policy(rules: &BookingRules) -> HoldPolicy {
    HoldPolicy {
        ttl: Duration::from_secs(rules.hold_seconds),
        max_retries: rules.release_max_retries,
        retry_backoff: Duration::from_millis(rules.release_retry_backoff_ms),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "cinebook_api=debug,cinebook_booking=debug,tower_http=debug,axum::rejection=trace".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::load().expect("Failed to load config");
    tracing::info!("Starting Cinebook API on port {}", config.server.port);

    let db = DbClient::new(&config.database.url, config.database.max_connections)
        .await
        .expect("Failed to connect to Postgres");
    db.migrate().await.expect("Failed to run migrations");

    let repo = Arc::new(PostgresSeatRepository::new(db.pool.clone()));
    let policy = hold_policy(&config.booking);

    if config.booking.sweep_interval_seconds > 0 {
        HoldSweeper::new(
            repo.clone(),
            policy.clone(),
            Duration::from_secs(config.booking.sweep_interval_seconds),
        )
        .spawn();
    } else {
        tracing::info!("Hold sweeper disabled");
    }

    let engine = ReservationEngine::new(repo, policy).with_layout(config.layout.clone());
    let mut app_state = AppState::new(
        engine,
        AuthConfig { secret: config.auth.jwt_secret.clone() },
    );

    if let Some(redis) = &config.redis {
        let client = RedisClient::new(&redis.url).expect("Invalid Redis URL");
        app_state = app_state.with_rate_limit(client, redis.rate_limit_per_minute);
        tracing::info!("Rate limiting enabled ({} req/min per IP)", redis.rate_limit_per_minute);
    }

    let app = app(app_state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server.port));
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}
