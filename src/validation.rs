use std::fmt;

use chrono::{Datelike, Duration, NaiveDate};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;

use crate::error::ApiError;
use crate::models::{NewPeriod, PeriodDraft, wall_clock};

static TIME_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\d{2}:\d{2}(:\d{2})?$").expect("regex compiles"));

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub field: &'static str,
    pub message: String,
}

/// Every field problem found in a submitted form, in field order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ValidationErrors(pub Vec<FieldError>);

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for error in &self.0 {
            if !first {
                f.write_str("; ")?;
            }
            write!(f, "{}: {}", error.field, error.message)?;
            first = false;
        }
        Ok(())
    }
}

impl std::error::Error for ValidationErrors {}

impl ValidationErrors {
    pub fn field(&self, name: &str) -> Option<&FieldError> {
        self.0.iter().find(|e| e.field == name)
    }
}

fn check_time(field: &'static str, raw: &str, errors: &mut Vec<FieldError>) -> Option<chrono::NaiveTime> {
    let raw = raw.trim();
    if raw.is_empty() {
        errors.push(FieldError {
            field,
            message: "is required".into(),
        });
        return None;
    }
    let parsed = TIME_PATTERN
        .is_match(raw)
        .then(|| wall_clock::parse(raw))
        .flatten();
    if parsed.is_none() {
        errors.push(FieldError {
            field,
            message: "must be a time as HH:MM or HH:MM:SS".into(),
        });
    }
    parsed
}

/// Required-field and type checks for a period form. The backend stays the
/// authority on order uniqueness; end before start is not rejected here.
pub fn validate_period_draft(draft: &PeriodDraft) -> Result<NewPeriod, ValidationErrors> {
    let mut errors = Vec::new();

    let name = draft.name.trim();
    if name.is_empty() {
        errors.push(FieldError {
            field: "name",
            message: "is required".into(),
        });
    }
    let start_time = check_time("start_time", &draft.start_time, &mut errors);
    let end_time = check_time("end_time", &draft.end_time, &mut errors);
    let order = match draft.order {
        Some(order) if order >= 1 => Some(order),
        Some(_) => {
            errors.push(FieldError {
                field: "order",
                message: "must be a positive number".into(),
            });
            None
        }
        None => {
            errors.push(FieldError {
                field: "order",
                message: "is required".into(),
            });
            None
        }
    };

    match (start_time, end_time, order) {
        (Some(start_time), Some(end_time), Some(order)) if errors.is_empty() => Ok(NewPeriod {
            name: name.to_string(),
            start_time,
            end_time,
            is_break: draft.is_break,
            order,
        }),
        _ => Err(ValidationErrors(errors)),
    }
}

pub fn current_monday(today: NaiveDate) -> NaiveDate {
    today - Duration::days(today.weekday().num_days_from_monday() as i64)
}

/// Anchor week for calendar export: a Monday no older than two weeks.
pub fn validate_week_start(given: Option<NaiveDate>, today: NaiveDate) -> Result<NaiveDate, ApiError> {
    let Some(given) = given else {
        return Ok(current_monday(today));
    };
    if given.weekday().num_days_from_monday() != 0 {
        return Err(ApiError::BadRequest("week_of must be a Monday".into()));
    }
    if given < today - Duration::days(14) {
        return Err(ApiError::BadRequest(
            "week_of cannot be more than 2 weeks in the past".into(),
        ));
    }
    Ok(given)
}
