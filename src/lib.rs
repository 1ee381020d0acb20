pub mod auth;
pub mod backend;
pub mod editor;
pub mod error;
pub mod grid;
pub mod handlers;
pub mod ical;
pub mod models;
pub mod openapi;
pub mod registry;
pub mod settings;
pub mod validation;

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    Router,
    routing::{get, patch, put},
};
use handlers::{
    create_period, delete_entry, delete_period, get_days, get_ical, get_timetable,
    get_timetable_text, healthz_live, healthz_ready, list_periods, put_cell, root, update_period,
};
use tower_http::LatencyUnit;
use tower_http::cors::CorsLayer;
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::{Level, info};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::backend::SchoolApiClient;
use crate::ical::ICalExporter;
use crate::models::DayTable;
use crate::openapi::ApiDoc;
use crate::settings::Settings;

#[derive(Clone)]
pub struct AppState {
    pub settings: Settings,
    pub backend: Arc<SchoolApiClient>,
    pub exporter: Arc<ICalExporter>,
    pub days: Arc<DayTable>,
}

impl AppState {
    pub fn from_settings(settings: Settings) -> Result<Self, Box<dyn std::error::Error>> {
        let backend = SchoolApiClient::with_timeout(
            settings.backend_base_url.clone(),
            settings.request_timeout(),
        )?;
        let days = settings.day_table()?;
        let exporter = ICalExporter::new(settings.calendar_name.clone(), settings.timezone()?);
        Ok(Self {
            settings,
            backend: Arc::new(backend),
            exporter: Arc::new(exporter),
            days: Arc::new(days),
        })
    }
}

pub async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let settings = Settings::from_env()?;

    let env_filter = if settings.debug { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .without_time()
        .init();

    let state = AppState::from_settings(settings)?;
    let app = build_router(state.clone());

    let addr = SocketAddr::from(([0, 0, 0, 0], state.settings.port));
    info!(
        backend = %state.settings.backend_base_url,
        days = state.days.len(),
        "Starting School Timetable API on {addr}"
    );
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

pub fn build_router(state: AppState) -> Router {
    let trace_layer = TraceLayer::new_for_http()
        .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
        .on_response(
            DefaultOnResponse::new()
                .level(Level::INFO)
                .latency_unit(LatencyUnit::Millis),
        );

    let mut router = Router::new()
        .route("/", get(root))
        .route("/healthz/live", get(healthz_live))
        .route("/healthz/ready", get(healthz_ready))
        .route("/days", get(get_days))
        .route("/periods", get(list_periods).post(create_period))
        .route("/periods/{id}", patch(update_period).delete(delete_period))
        .route("/timetable", get(get_timetable))
        .route("/timetable.txt", get(get_timetable_text))
        .route("/timetable.ical", get(get_ical))
        .route("/timetable/cells", put(put_cell))
        .route("/timetable/entries/{id}", axum::routing::delete(delete_entry))
        .with_state(state.clone());

    if state.settings.enable_swagger {
        let openapi = ApiDoc::openapi();
        let swagger = SwaggerUi::new("/docs").url("/openapi.json", openapi);
        router = router.merge(swagger);
    }

    router.layer(CorsLayer::permissive()).layer(trace_layer)
}
