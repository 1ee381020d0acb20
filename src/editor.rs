use serde::Deserialize;
use tracing::{error, info};
use utoipa::ToSchema;

use crate::auth::Session;
use crate::backend::SchoolApiClient;
use crate::error::ActionError;
use crate::grid::{CollisionPolicy, EntryIndex, GridError, GridOptions, GridView};
use crate::models::{
    DayId, DayTable, EntryDraft, EntryId, Notice, Period, PeriodId, TimetableEntry,
    TimetableFilter,
};
use crate::registry::Confirm;

pub const REMOVE_ENTRY_PROMPT: &str = "Remove this class from the schedule?";

/// The class section whose weekly timetable is being edited.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, ToSchema)]
pub struct ClassScope {
    pub class_id: i64,
    pub section_id: i64,
    pub academic_year: String,
}

/// Subject and teacher chosen for one cell.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, ToSchema)]
pub struct SlotAssignment {
    pub day: DayId,
    pub period_id: PeriodId,
    pub subject: i64,
    pub teacher: i64,
    #[serde(default)]
    pub room: Option<i64>,
}

/// Periods and entries of one class section, kept in sync with the backend
/// by re-fetching after each write.
pub struct TimetableEditor<'a> {
    client: &'a SchoolApiClient,
    session: &'a Session,
    days: &'a DayTable,
    scope: ClassScope,
    periods: Vec<Period>,
    entries: Vec<TimetableEntry>,
}

impl<'a> TimetableEditor<'a> {
    pub async fn load(
        client: &'a SchoolApiClient,
        session: &'a Session,
        days: &'a DayTable,
        scope: ClassScope,
    ) -> Result<Self, ActionError> {
        let filter = TimetableFilter::for_section(scope.class_id, scope.section_id);
        let (periods, entries) = futures::try_join!(
            client.list_periods(session),
            client.list_entries(session, &filter)
        )
        .map_err(|err| {
            error!(error = %err, class_id = scope.class_id, section_id = scope.section_id, "failed to load timetable");
            ActionError::backend("Failed to load timetable", err)
        })?;
        Ok(Self {
            client,
            session,
            days,
            scope,
            periods,
            entries,
        })
    }

    pub fn periods(&self) -> &[Period] {
        &self.periods
    }

    pub fn entries(&self) -> &[TimetableEntry] {
        &self.entries
    }

    pub fn grid(&self, options: GridOptions) -> Result<GridView<'_>, GridError> {
        GridView::build(&self.periods, &self.entries, self.days, options)
    }

    /// Creates the cell's entry, or patches it when the slot is already taken.
    pub async fn save(&mut self, assignment: &SlotAssignment) -> Result<Notice, ActionError> {
        let period = self
            .periods
            .iter()
            .find(|p| p.id == assignment.period_id)
            .ok_or_else(|| ActionError::Rejected(format!("Unknown period {}", assignment.period_id)))?;
        if period.is_break {
            return Err(ActionError::Rejected("Breaks cannot hold assignments".into()));
        }
        if !self.days.contains(assignment.day) {
            return Err(ActionError::Rejected(format!("Unknown day {}", assignment.day)));
        }

        let existing = EntryIndex::build(&self.entries, CollisionPolicy::FirstMatch)
            .ok()
            .and_then(|index| index.get(assignment.day, assignment.period_id))
            .map(|entry| entry.id);

        let draft = EntryDraft {
            class_obj: self.scope.class_id,
            section: self.scope.section_id,
            day_of_week: assignment.day,
            period: assignment.period_id,
            subject: assignment.subject,
            teacher: assignment.teacher,
            room: assignment.room,
            academic_year: self.scope.academic_year.clone(),
        };

        let (result, notice) = match existing {
            Some(id) => (
                self.client.update_entry(self.session, id, &draft).await,
                Notice::EntryUpdated,
            ),
            None => (
                self.client.create_entry(self.session, &draft).await,
                Notice::EntryAssigned,
            ),
        };
        if let Err(err) = result {
            error!(error = %err, day = draft.day_of_week, period = draft.period, "failed to save timetable entry");
            let message = err.validation_message().unwrap_or("Failed to save").to_string();
            return Err(ActionError::backend(message, err));
        }
        info!(day = draft.day_of_week, period = draft.period, "timetable entry saved");
        self.reload_entries().await;
        Ok(notice)
    }

    pub async fn remove<C: Confirm>(&mut self, id: EntryId, mut confirm: C) -> Result<Notice, ActionError> {
        if !confirm.confirm(REMOVE_ENTRY_PROMPT) {
            return Err(ActionError::Cancelled);
        }
        if let Err(err) = self.client.delete_entry(self.session, id).await {
            error!(error = %err, id, "failed to remove timetable entry");
            return Err(ActionError::backend("Failed to remove", err));
        }
        info!(id, "timetable entry removed");
        self.reload_entries().await;
        Ok(Notice::EntryRemoved)
    }

    async fn reload_entries(&mut self) {
        let filter = TimetableFilter::for_section(self.scope.class_id, self.scope.section_id);
        match self.client.list_entries(self.session, &filter).await {
            Ok(entries) => self.entries = entries,
            Err(err) => error!(error = %err, "failed to reload timetable"),
        }
    }
}
