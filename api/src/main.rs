use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use serde::Serialize;
use sqlx::postgres::PgPoolOptions;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

mod builtin;
mod collaborators;
mod engine;
mod error;
mod middleware;
mod routes;
mod state;
mod stores;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Coachline API",
        version = "0.1.0",
        description = "Conversation engine for collecting per-session workout preferences over SMS and in-app chat."
    ),
    paths(
        routes::health::health_check,
        routes::messages::handle_message,
        routes::preferences::get_preferences,
    ),
    components(schemas(
        HealthResponse,
        coachline_core::error::ApiError,
        coachline_core::messages::Channel,
        coachline_core::messages::InboundMessage,
        coachline_core::messages::TurnReply,
        coachline_core::preferences::Intensity,
        coachline_core::preferences::SessionGoal,
        coachline_core::preferences::SourceTag,
        coachline_core::preferences::PreferenceRecord,
        coachline_core::preferences::PartialPreferences,
        coachline_core::steps::ConversationStep,
    ))
)]
struct ApiDoc;

#[derive(Serialize, utoipa::ToSchema)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

#[tokio::main]
async fn main() {
    // Load .env if present (dev only)
    let _ = dotenvy::dotenv();

    // Structured JSON logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "coachline_api=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer().json())
        .init();

    // Database connection
    let database_url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");

    let pool = PgPoolOptions::new()
        .max_connections(20)
        .connect(&database_url)
        .await
        .expect("Failed to connect to database");

    // Run migrations
    sqlx::migrate!("../migrations")
        .run(&pool)
        .await
        .expect("Failed to run migrations");

    let preferences: Arc<dyn stores::PreferenceStore> =
        Arc::new(stores::postgres::PgPreferenceStore::new(pool.clone()));
    let conversation_engine = Arc::new(engine::ConversationEngine::new(
        preferences.clone(),
        Arc::new(stores::postgres::PgDisambiguationStore::new(pool.clone())),
        Arc::new(stores::postgres::PgFlowStateStore::new(pool.clone())),
        Arc::new(stores::postgres::PgSessionConfigStore::new(pool.clone())),
        Arc::new(stores::postgres::PgMessageLog::new(pool.clone())),
        Arc::new(builtin::KeywordPreferenceParser),
        Arc::new(builtin::CatalogExerciseMatcher::new(pool.clone())),
        Arc::new(builtin::LoggingSender),
    ));

    let app_state = state::AppState {
        db: pool,
        engine: conversation_engine,
        preferences,
    };

    let app = Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-doc/openapi.json", ApiDoc::openapi()))
        .merge(routes::health::router())
        .merge(routes::messages::router().layer(middleware::rate_limit::messages_layer()))
        .merge(routes::preferences::router().layer(middleware::rate_limit::reads_layer()))
        .layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()))
        .with_state(app_state);

    let port: u16 = std::env::var("PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(3000);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    tracing::info!("Coachline API listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await.unwrap();
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await
    .unwrap();
}
