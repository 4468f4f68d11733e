pub mod api;
pub mod config;
pub mod content;
pub mod error;
pub mod health;
pub mod lifeline;
pub mod registry;
pub mod room_actor;
pub mod room_manager;
pub mod state;
pub mod stats;
pub mod turn;
pub mod ws;

use axum::Router;
use axum::http::{HeaderValue, header};
use axum::middleware;
use axum::routing::{get, post};
use tower_http::cors::CorsLayer;
use tower_http::set_header::SetResponseHeaderLayer;

use config::ServerConfig;
use state::AppState;

/// Build the Axum router and application state from a config.
pub fn build_app(config: ServerConfig) -> (Router<()>, AppState) {
    let state = AppState::new(config);
    (router(state.clone()), state)
}

/// Build the router over an existing state.
pub fn router(state: AppState) -> Router<()> {
    let data_routes = Router::new()
        .route("/themes", get(api::get_themes))
        .route("/{bank}/questions", get(api::get_questions))
        .route(
            "/{bank}/answer/{level}/{question_index}",
            post(api::post_answer),
        )
        .route(
            "/{bank}/lifeline/fiftyfifty/{level}/{question_index}",
            get(api::get_fifty_fifty),
        )
        .route(
            "/{bank}/lifeline/audience/{level}/{question_index}",
            get(api::get_audience),
        )
        .route("/{bank}/lifeline/skip/{level}", get(api::get_skip));

    let stats_routes = Router::new()
        .route("/stats", get(api::get_stats))
        .route("/ranking", get(api::get_ranking));

    Router::new()
        .route("/api/ws/{kind}/{room}/{name}", get(ws::ws_handler))
        .route(
            "/api/ws/{kind}/{room}/{name}/{theme}",
            get(ws::ws_handler_with_theme),
        )
        .nest("/api/data", data_routes)
        .nest("/api/stats", stats_routes)
        .route("/api/rooms/{kind}", post(api::post_room))
        .route("/api/history/record", post(api::post_record))
        .route("/health", get(health::health_check))
        .route("/ready", get(health::readiness_check))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            count_requests,
        ))
        .layer(SetResponseHeaderLayer::overriding(
            header::X_CONTENT_TYPE_OPTIONS,
            HeaderValue::from_static("nosniff"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            header::X_FRAME_OPTIONS,
            HeaderValue::from_static("DENY"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            header::REFERRER_POLICY,
            HeaderValue::from_static("no-referrer"),
        ))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Counts every request for `/api/stats/stats`.
async fn count_requests(
    axum::extract::State(state): axum::extract::State<AppState>,
    request: axum::extract::Request,
    next: middleware::Next,
) -> axum::response::Response {
    state.stats.record_request();
    next.run(request).await
}
