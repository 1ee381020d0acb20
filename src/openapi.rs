use utoipa::openapi::security::{ApiKey, ApiKeyValue, HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};

use crate::editor::{ClassScope, SlotAssignment};
use crate::handlers::{CellRequest, EntriesResponse, PeriodsResponse};
use crate::models::{Day, Period, PeriodDraft, TimetableEntry};

pub struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer_auth",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
        components.add_security_scheme(
            "query_token",
            SecurityScheme::ApiKey(ApiKey::Query(ApiKeyValue::new("token"))),
        );
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        crate::handlers::root,
        crate::handlers::healthz_live,
        crate::handlers::healthz_ready,
        crate::handlers::get_days,
        crate::handlers::list_periods,
        crate::handlers::create_period,
        crate::handlers::update_period,
        crate::handlers::delete_period,
        crate::handlers::get_timetable,
        crate::handlers::get_timetable_text,
        crate::handlers::get_ical,
        crate::handlers::put_cell,
        crate::handlers::delete_entry
    ),
    components(schemas(
        Day,
        Period,
        PeriodDraft,
        TimetableEntry,
        ClassScope,
        SlotAssignment,
        CellRequest,
        PeriodsResponse,
        EntriesResponse
    )),
    tags(
        (name = "periods", description = "Period registry"),
        (name = "timetable", description = "Timetable grid, editing and export")
    ),
    modifiers(&SecurityAddon),
)]
pub struct ApiDoc;
