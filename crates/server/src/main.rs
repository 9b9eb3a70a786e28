use std::{net::SocketAddr, sync::Arc};

use axum::{
    extract::State,
    http::StatusCode,
    middleware,
    response::Redirect,
    routing::{get, post},
    Json, Router,
};
use server_api::ApiContext;
use shared::{
    error::{ApiError, ErrorCode},
    messages::MessageCatalog,
};
use storage::Storage;
use tower_http::limit::RequestBodyLimitLayer;
use tracing::{error, info};

mod app_state;
mod config;
mod controller;
mod cookies;
mod flash;
mod locale;
mod resources;
mod session;

use app_state::AppState;
use config::{load_settings, prepare_database_url};
use controller::Resource;
use resources::{Persons, Roles, Users};
use session::SessionKey;

const MAX_FORM_BYTES: usize = 64 * 1024;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt().with_env_filter("info").init();

    let settings = load_settings();
    let database_url = prepare_database_url(&settings.database_url)?;
    let storage = Storage::new(&database_url).await.map_err(|error| {
        error!(
            %database_url,
            %error,
            "failed to open SQLite database; verify parent directory exists and permissions are correct"
        );
        error
    })?;
    let catalog = MessageCatalog::embedded()?;

    let state = AppState {
        api: ApiContext::new(storage),
        catalog,
        default_locale: settings.default_locale,
        session_key: SessionKey::from_secret(settings.session_secret.as_deref()),
    };
    let app = build_router(Arc::new(state));

    let addr: SocketAddr = settings.server_bind.parse()?;
    info!(%addr, locale = %settings.default_locale, "server listening");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

fn build_router(state: Arc<AppState>) -> Router {
    let admin = Router::new()
        .merge(resource_routes::<Roles>())
        .merge(resource_routes::<Persons>())
        .merge(resource_routes::<Users>())
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            session::require_session,
        ));

    Router::new()
        .route("/", get(|| async { Redirect::to(Persons::PATH) }))
        .route("/healthz", get(healthz))
        .route(
            session::LOGIN_PATH,
            get(session::login_page).post(session::login),
        )
        .route(session::LOGOUT_PATH, post(session::logout))
        .merge(admin)
        .layer(RequestBodyLimitLayer::new(MAX_FORM_BYTES))
        .with_state(state)
}

fn resource_routes<R: Resource>() -> Router<Arc<AppState>> {
    Router::new()
        .route(R::PATH, get(controller::show::<R>))
        .route(&format!("{}/create", R::PATH), post(controller::create::<R>))
        .route(&format!("{}/update", R::PATH), post(controller::update::<R>))
        .route(&format!("{}/delete", R::PATH), post(controller::delete::<R>))
}

async fn healthz(
    State(state): State<Arc<AppState>>,
) -> Result<&'static str, (StatusCode, Json<ApiError>)> {
    state.api.storage.health_check().await.map_err(|e| {
        error!(error = %e, "health check failed");
        (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(ApiError::new(ErrorCode::Internal, "storage unavailable")),
        )
    })?;
    Ok("ok")
}

#[cfg(test)]
#[path = "tests/main_tests.rs"]
mod tests;
