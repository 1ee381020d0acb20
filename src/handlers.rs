use axum::extract::{Path, Query, State};
use axum::{Json, http::StatusCode, response::IntoResponse};
use axum_extra::extract::TypedHeader;
use axum_extra::headers::{Authorization, authorization::Bearer};
use chrono::{Local, NaiveDate};
use serde::{Deserialize, Serialize};
use tracing::{error, info};
use utoipa::{IntoParams, ToSchema};

use crate::{
    AppState,
    auth::{Session, session_from_request},
    editor::{ClassScope, SlotAssignment, TimetableEditor},
    error::{ActionError, ApiError},
    grid::{GridOptions, GridView},
    models::{Day, EntryId, Notice, Period, PeriodDraft, PeriodId, TimetableEntry, TimetableFilter},
    registry::PeriodRegistry,
    validation::validate_week_start,
};

type BearerHeader = Option<TypedHeader<Authorization<Bearer>>>;

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct TokenQuery {
    /// Authentication token (alternative to Bearer header)
    pub token: Option<String>,
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ConfirmQuery {
    pub token: Option<String>,
    /// Must be `true` for the delete to be sent
    #[serde(default)]
    pub confirm: bool,
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct GridQuery {
    pub token: Option<String>,
    /// Render without add affordances and ignore clicks
    #[serde(default)]
    pub read_only: bool,
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ICalQuery {
    pub token: Option<String>,
    /// Monday the recurring events start from (defaults to this week)
    pub week_of: Option<NaiveDate>,
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct EntryDeleteQuery {
    pub token: Option<String>,
    #[serde(default)]
    pub confirm: bool,
    /// With `section_id`, the response carries the section's refreshed entries
    pub class_id: Option<i64>,
    pub section_id: Option<i64>,
    #[serde(default)]
    pub academic_year: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct CellRequest {
    #[serde(flatten)]
    pub scope: ClassScope,
    #[serde(flatten)]
    pub assignment: SlotAssignment,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct PeriodsResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub periods: Vec<Period>,
    pub next_order: i32,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct EntriesResponse {
    pub message: String,
    pub entries: Vec<TimetableEntry>,
}

fn session(auth: BearerHeader, token: Option<&str>) -> Result<Session, ApiError> {
    session_from_request(auth.map(|TypedHeader(a)| a), token)
}

fn periods_response(registry: &PeriodRegistry<'_>, message: Option<String>) -> PeriodsResponse {
    PeriodsResponse {
        message,
        periods: registry.list().to_vec(),
        next_order: registry.next_order(),
    }
}

#[utoipa::path(get, path = "/", tag = "timetable")]
pub async fn root() -> impl IntoResponse {
    Json(serde_json::json!({
        "message": "School Timetable API",
        "endpoints": {
            "/days": "Configured school days",
            "/periods": "Period registry",
            "/timetable": "Timetable grid as JSON",
            "/timetable.txt": "Timetable grid as a text table",
            "/timetable.ical": "Weekly timetable as iCal file"
        }
    }))
}

#[utoipa::path(get, path = "/healthz/live", tag = "timetable")]
pub async fn healthz_live() -> impl IntoResponse {
    Json(serde_json::json!({"status": "ok"}))
}

#[utoipa::path(get, path = "/healthz/ready", tag = "timetable")]
pub async fn healthz_ready() -> impl IntoResponse {
    Json(serde_json::json!({"status": "ok"}))
}

#[utoipa::path(
    get,
    path = "/days",
    responses((status = 200, description = "Rows of the timetable", body = [Day])),
    tag = "timetable"
)]
pub async fn get_days(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.days.as_ref().clone())
}

#[utoipa::path(
    get,
    path = "/periods",
    params(TokenQuery),
    responses(
        (status = 200, description = "Periods sorted by order", body = PeriodsResponse),
        (status = 401, description = "Missing or rejected token")
    ),
    security(("bearer_auth" = []), ("query_token" = [])),
    tag = "periods"
)]
pub async fn list_periods(
    State(state): State<AppState>,
    auth: BearerHeader,
    Query(query): Query<TokenQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let session = session(auth, query.token.as_deref())?;
    let mut registry = PeriodRegistry::new(&state.backend, &session);
    registry.refresh().await?;
    Ok(Json(periods_response(&registry, None)))
}

#[utoipa::path(
    post,
    path = "/periods",
    params(TokenQuery),
    request_body = PeriodDraft,
    responses(
        (status = 201, description = "Period created", body = PeriodsResponse),
        (status = 400, description = "Invalid period"),
        (status = 401, description = "Missing or rejected token")
    ),
    security(("bearer_auth" = []), ("query_token" = [])),
    tag = "periods"
)]
pub async fn create_period(
    State(state): State<AppState>,
    auth: BearerHeader,
    Query(query): Query<TokenQuery>,
    Json(mut draft): Json<PeriodDraft>,
) -> Result<impl IntoResponse, ApiError> {
    let session = session(auth, query.token.as_deref())?;
    let mut registry = PeriodRegistry::new(&state.backend, &session);
    if draft.order.is_none() {
        registry.refresh().await?;
        draft.order = Some(registry.next_order());
    }
    let notice = registry.create(&draft).await?;
    Ok((
        StatusCode::CREATED,
        Json(periods_response(&registry, Some(notice.to_string()))),
    ))
}

#[utoipa::path(
    patch,
    path = "/periods/{id}",
    params(("id" = i64, Path, description = "Period id"), TokenQuery),
    request_body = PeriodDraft,
    responses(
        (status = 200, description = "Period updated", body = PeriodsResponse),
        (status = 400, description = "Invalid period"),
        (status = 404, description = "Unknown period")
    ),
    security(("bearer_auth" = []), ("query_token" = [])),
    tag = "periods"
)]
pub async fn update_period(
    State(state): State<AppState>,
    auth: BearerHeader,
    Path(id): Path<PeriodId>,
    Query(query): Query<TokenQuery>,
    Json(draft): Json<PeriodDraft>,
) -> Result<impl IntoResponse, ApiError> {
    let session = session(auth, query.token.as_deref())?;
    let mut registry = PeriodRegistry::new(&state.backend, &session);
    let notice = registry.update(id, &draft).await?;
    Ok(Json(periods_response(&registry, Some(notice.to_string()))))
}

#[utoipa::path(
    delete,
    path = "/periods/{id}",
    params(("id" = i64, Path, description = "Period id"), ConfirmQuery),
    responses(
        (status = 200, description = "Period deleted", body = PeriodsResponse),
        (status = 428, description = "confirm=true missing")
    ),
    security(("bearer_auth" = []), ("query_token" = [])),
    tag = "periods"
)]
pub async fn delete_period(
    State(state): State<AppState>,
    auth: BearerHeader,
    Path(id): Path<PeriodId>,
    Query(query): Query<ConfirmQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let session = session(auth, query.token.as_deref())?;
    let mut registry = PeriodRegistry::new(&state.backend, &session);
    let notice = registry.delete(id, query.confirm).await?;
    Ok(Json(periods_response(&registry, Some(notice.to_string()))))
}

async fn fetch_timetable(
    state: &AppState,
    session: &Session,
    filter: &TimetableFilter,
) -> Result<(Vec<Period>, Vec<TimetableEntry>), ApiError> {
    let (periods, entries) = futures::try_join!(
        state.backend.list_periods(session),
        state.backend.list_entries(session, filter)
    )?;
    Ok((periods, entries))
}

#[utoipa::path(
    get,
    path = "/timetable",
    params(GridQuery, TimetableFilter),
    responses(
        (status = 200, description = "Days x periods grid"),
        (status = 401, description = "Missing or rejected token")
    ),
    security(("bearer_auth" = []), ("query_token" = [])),
    tag = "timetable"
)]
pub async fn get_timetable(
    State(state): State<AppState>,
    auth: BearerHeader,
    Query(query): Query<GridQuery>,
    Query(filter): Query<TimetableFilter>,
) -> Result<impl IntoResponse, ApiError> {
    let session = session(auth, query.token.as_deref())?;
    let (periods, entries) = fetch_timetable(&state, &session, &filter).await?;
    let options = GridOptions {
        read_only: query.read_only,
        collisions: state.settings.collision_policy,
    };
    let grid = GridView::build(&periods, &entries, &state.days, options)?;
    Ok(Json(serde_json::to_value(&grid).map_err(|err| ApiError::Internal(err.to_string()))?))
}

#[utoipa::path(
    get,
    path = "/timetable.txt",
    params(GridQuery, TimetableFilter),
    responses((status = 200, description = "Grid as a text table", content_type = "text/plain")),
    security(("bearer_auth" = []), ("query_token" = [])),
    tag = "timetable"
)]
pub async fn get_timetable_text(
    State(state): State<AppState>,
    auth: BearerHeader,
    Query(query): Query<GridQuery>,
    Query(filter): Query<TimetableFilter>,
) -> Result<impl IntoResponse, ApiError> {
    let session = session(auth, query.token.as_deref())?;
    let (periods, entries) = fetch_timetable(&state, &session, &filter).await?;
    let options = GridOptions {
        read_only: query.read_only,
        collisions: state.settings.collision_policy,
    };
    let grid = GridView::build(&periods, &entries, &state.days, options)?;
    Ok((
        StatusCode::OK,
        [("content-type", "text/plain; charset=utf-8")],
        grid.to_string(),
    ))
}

#[utoipa::path(
    get,
    path = "/timetable.ical",
    params(ICalQuery, TimetableFilter),
    responses(
        (status = 200, description = "iCal file", content_type = "text/calendar"),
        (status = 400, description = "week_of is not a recent Monday"),
        (status = 401, description = "Missing or rejected token"),
        (status = 404, description = "No assignments found")
    ),
    security(("bearer_auth" = []), ("query_token" = [])),
    tag = "timetable"
)]
pub async fn get_ical(
    State(state): State<AppState>,
    auth: BearerHeader,
    Query(query): Query<ICalQuery>,
    Query(filter): Query<TimetableFilter>,
) -> Result<impl IntoResponse, ApiError> {
    let session = session(auth, query.token.as_deref())?;
    let week_of = validate_week_start(query.week_of, Local::now().date_naive())?;
    let (periods, entries) = fetch_timetable(&state, &session, &filter).await?;
    let options = GridOptions {
        read_only: true,
        collisions: state.settings.collision_policy,
    };
    let grid = GridView::build(&periods, &entries, &state.days, options)?;

    let body = state.exporter.generate(&grid, week_of);
    if body.is_empty() {
        return Err(ApiError::NotFound("No assignments found".into()));
    }
    Ok((
        StatusCode::OK,
        [
            ("content-type", "text/calendar"),
            (
                "content-disposition",
                "attachment; filename=school_timetable.ics",
            ),
        ],
        body,
    ))
}

#[utoipa::path(
    put,
    path = "/timetable/cells",
    params(TokenQuery),
    request_body = CellRequest,
    responses(
        (status = 200, description = "Cell assigned or reassigned", body = EntriesResponse),
        (status = 400, description = "Break period, unknown slot or backend validation error")
    ),
    security(("bearer_auth" = []), ("query_token" = [])),
    tag = "timetable"
)]
pub async fn put_cell(
    State(state): State<AppState>,
    auth: BearerHeader,
    Query(query): Query<TokenQuery>,
    Json(request): Json<CellRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let session = session(auth, query.token.as_deref())?;
    let mut editor =
        TimetableEditor::load(&state.backend, &session, &state.days, request.scope).await?;
    let notice = editor.save(&request.assignment).await?;
    Ok(Json(EntriesResponse {
        message: notice.to_string(),
        entries: editor.entries().to_vec(),
    }))
}

#[utoipa::path(
    delete,
    path = "/timetable/entries/{id}",
    params(("id" = i64, Path, description = "Timetable entry id"), EntryDeleteQuery),
    responses(
        (status = 200, description = "Entry removed", body = EntriesResponse),
        (status = 428, description = "confirm=true missing")
    ),
    security(("bearer_auth" = []), ("query_token" = [])),
    tag = "timetable"
)]
pub async fn delete_entry(
    State(state): State<AppState>,
    auth: BearerHeader,
    Path(id): Path<EntryId>,
    Query(query): Query<EntryDeleteQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let session = session(auth, query.token.as_deref())?;
    if !query.confirm {
        return Err(ActionError::Cancelled.into());
    }
    let (Some(class_id), Some(section_id)) = (query.class_id, query.section_id) else {
        if let Err(err) = state.backend.delete_entry(&session, id).await {
            error!(error = %err, id, "failed to remove timetable entry");
            return Err(ActionError::backend("Failed to remove", err).into());
        }
        info!(id, "timetable entry removed");
        return Ok(Json(EntriesResponse {
            message: Notice::EntryRemoved.to_string(),
            entries: Vec::new(),
        }));
    };
    let scope = ClassScope {
        class_id,
        section_id,
        academic_year: query.academic_year,
    };
    let mut editor = TimetableEditor::load(&state.backend, &session, &state.days, scope).await?;
    let notice = editor.remove(id, true).await?;
    Ok(Json(EntriesResponse {
        message: notice.to_string(),
        entries: editor.entries().to_vec(),
    }))
}
