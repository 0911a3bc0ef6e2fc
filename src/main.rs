mod config;
mod db;
mod models;
mod responses;
mod routes;
mod services;
mod state;
pub mod utils;

use axum::http::header::{AUTHORIZATION, CONTENT_TYPE};
use axum::http::HeaderValue;
use axum::http::Method;
use axum::{
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use config::Config;
use db::payment_repository::PaymentRepository;
use db::postgres_payment_repository::PostgresPaymentRepository;
use responses::JsonResponse;
use routes::billing::{create_plan, create_subscription, subscription_status};
use routes::webhook::razorpay_webhook;
use services::razorpay::{LiveRazorpayService, RazorpayService};
use sqlx::PgPool;
use std::{net::SocketAddr, sync::Arc};
use tokio::net::TcpListener;
use tower_governor::{governor::GovernorConfigBuilder, GovernorLayer};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use crate::state::AppState;
use crate::utils::jwt::JwtKeys;
use crate::utils::locks::KeyedLocks;

#[tokio::main]
async fn main() {
    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .finish();
    tracing::subscriber::set_global_default(subscriber).unwrap();

    let rate_limit_ms: u64 = std::env::var("RATE_LIMITER_MILLISECONDS")
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
        // Default: 200ms/token (~5 req/sec)
        .unwrap_or(200);
    let rate_limit_burst: u32 = std::env::var("RATE_LIMITER_BURST")
        .ok()
        .and_then(|v| v.parse::<u32>().ok())
        .unwrap_or(20);
    let governor_conf = Arc::new(
        GovernorConfigBuilder::default()
            .per_millisecond(rate_limit_ms)
            .burst_size(rate_limit_burst)
            .use_headers()
            .error_handler(|_err| {
                JsonResponse::too_many_requests(
                    "Too many requests. Please wait a moment and try again.",
                )
                .into_response()
            })
            .finish()
            .unwrap(),
    );

    // Background task to cleanup old rate-limiter entries
    let governor_limiter = governor_conf.limiter().clone();
    std::thread::spawn(move || {
        let interval = std::time::Duration::from_secs(60);
        loop {
            std::thread::sleep(interval);
            governor_limiter.retain_recent();
        }
    });

    let config = Config::from_env();

    let pg_pool = establish_connection(&config.database_url).await;
    let payment_repo = Arc::new(PostgresPaymentRepository {
        pool: pg_pool.clone(),
    }) as Arc<dyn PaymentRepository>;

    let razorpay =
        Arc::new(LiveRazorpayService::from_settings(&config.razorpay)) as Arc<dyn RazorpayService>;

    let jwt_keys = Arc::new(JwtKeys::from_env().expect("JWT secret must be configured"));

    let cors = CorsLayer::new()
        .allow_origin(config.frontend_origin.parse::<HeaderValue>().unwrap())
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([AUTHORIZATION, CONTENT_TYPE])
        .allow_credentials(true);

    let state = AppState {
        db: payment_repo,
        razorpay,
        config: Arc::new(config),
        jwt_keys,
        user_locks: Arc::new(KeyedLocks::new()),
    };

    // User-facing routes sit behind the limiter; the webhook route does not,
    // since throttled deliveries would only turn into provider retries.
    let billing_routes = Router::new()
        .route("/create-subscription", post(create_subscription))
        .route("/subscription-status", get(subscription_status))
        .route("/admin/create-plan", post(create_plan))
        .layer(GovernorLayer {
            config: governor_conf.clone(),
        });

    let webhook_routes = Router::new().route("/subscription-webhook", post(razorpay_webhook));

    let app = Router::new()
        .route("/", get(root))
        .nest("/api", billing_routes.merge(webhook_routes))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(cors);

    let make_service = app.into_make_service_with_connect_info::<SocketAddr>();
    let port: u16 = std::env::var("PORT")
        .ok()
        .and_then(|v| v.parse::<u16>().ok())
        .unwrap_or(3000);
    let addr = SocketAddr::from(([127, 0, 0, 1], port));

    let listener = TcpListener::bind(addr).await.unwrap();
    info!("Listening at http://{}", addr);
    axum::serve(listener, make_service).await.unwrap();
}

/// A simple root route.
async fn root() -> Response {
    JsonResponse::success("Revio billing service is running").into_response()
}

/// Establish a connection to the database and verify it.
async fn establish_connection(database_url: &str) -> PgPool {
    let pool = PgPool::connect(database_url)
        .await
        .expect("Failed to connect to the database");

    sqlx::query("SELECT 1")
        .execute(&pool)
        .await
        .expect("Failed to verify database connection");

    info!("Successfully connected to the database");
    pool
}
