use chrono::{Duration, NaiveDate, NaiveDateTime};
use chrono_tz::Tz;
use icalendar::{Calendar, CalendarDateTime, Component, Event, EventLike};

use crate::grid::{Cell, GridView};

#[derive(Clone)]
pub struct ICalExporter {
    calendar_name: String,
    timezone: Option<Tz>,
}

impl ICalExporter {
    pub fn new(calendar_name: impl Into<String>, timezone: Option<Tz>) -> Self {
        Self {
            calendar_name: calendar_name.into(),
            timezone,
        }
    }

    fn at(&self, date_time: NaiveDateTime) -> CalendarDateTime {
        match self.timezone {
            Some(tz) => CalendarDateTime::WithTimezone {
                date_time,
                tzid: tz.name().to_string(),
            },
            None => CalendarDateTime::Floating(date_time),
        }
    }

    /// One weekly recurring event per assigned cell, anchored on `week_of`
    /// (a Monday). Empty when the grid holds no assignment.
    pub fn generate(&self, grid: &GridView<'_>, week_of: NaiveDate) -> Vec<u8> {
        let mut calendar = Calendar::new();
        calendar.name(&self.calendar_name);
        let mut events = 0;

        for row in &grid.rows {
            let date = week_of + Duration::days(row.day.offset_from_monday());
            for (period, cell) in grid.columns.iter().zip(&row.cells) {
                let Cell::Assigned(entry) = cell else {
                    continue;
                };

                let mut description = format!("Teacher: {}", entry.teacher_name);
                if let Some(room) = &entry.room_name {
                    description.push_str(&format!("\nRoom: {room}"));
                }

                let mut event = Event::new();
                event.summary(&entry.subject_name);
                event.starts(self.at(date.and_time(period.start_time)));
                event.ends(self.at(date.and_time(period.end_time)));
                event.add_property("RRULE", "FREQ=WEEKLY");
                event.description(&description);
                if let Some(room) = &entry.room_name {
                    event.location(room);
                }
                event.uid(&format!(
                    "{}-{}-{}-school-timetable",
                    entry.id, row.day.id, period.id
                ));
                calendar.push(event);
                events += 1;
            }
        }

        if events == 0 {
            return Vec::new();
        }
        calendar.to_string().into_bytes()
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveTime;

    use super::*;
    use crate::grid::GridOptions;
    use crate::models::{DayTable, Period, TimetableEntry};

    fn fixtures() -> (Vec<Period>, Vec<TimetableEntry>) {
        let periods = vec![Period {
            id: 1,
            name: "Period 1".into(),
            start_time: NaiveTime::from_hms_opt(8, 0, 0).unwrap(),
            end_time: NaiveTime::from_hms_opt(8, 45, 0).unwrap(),
            is_break: false,
            order: 1,
        }];
        let entries = vec![TimetableEntry {
            id: 40,
            day_of_week: 2,
            period: 1,
            subject_name: "Math".into(),
            teacher_name: "Ms. K".into(),
            room_name: Some("Lab 1".into()),
            ..TimetableEntry::default()
        }];
        (periods, entries)
    }

    #[test]
    fn test_generate_weekly_event() {
        let (periods, entries) = fixtures();
        let days = DayTable::school_week();
        let grid = GridView::build(&periods, &entries, &days, GridOptions::read_only()).unwrap();
        let monday = NaiveDate::from_ymd_opt(2025, 11, 24).unwrap();

        let exporter = ICalExporter::new("Class 3-A", None);
        let body = String::from_utf8(exporter.generate(&grid, monday)).unwrap();
        assert!(body.contains("BEGIN:VEVENT"));
        assert!(body.contains("SUMMARY:Math"));
        assert!(body.contains("RRULE:FREQ=WEEKLY"));
        assert!(body.contains("DTSTART:20251125T080000"));
        assert!(body.contains("LOCATION:Lab 1"));
        assert!(body.contains("40-2-1-school-timetable"));
    }

    #[test]
    fn test_generate_with_timezone() {
        let (periods, entries) = fixtures();
        let days = DayTable::school_week();
        let grid = GridView::build(&periods, &entries, &days, GridOptions::read_only()).unwrap();
        let monday = NaiveDate::from_ymd_opt(2025, 11, 24).unwrap();

        let exporter = ICalExporter::new("Class 3-A", Some(chrono_tz::Europe::Warsaw));
        let body = String::from_utf8(exporter.generate(&grid, monday)).unwrap();
        assert!(body.contains("TZID=Europe/Warsaw"));
    }

    #[test]
    fn test_generate_empty() {
        let (periods, _) = fixtures();
        let days = DayTable::school_week();
        let grid = GridView::build(&periods, &[], &days, GridOptions::read_only()).unwrap();
        let exporter = ICalExporter::new("Class 3-A", None);
        let monday = NaiveDate::from_ymd_opt(2025, 11, 24).unwrap();
        assert!(exporter.generate(&grid, monday).is_empty());
    }
}
