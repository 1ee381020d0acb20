//! Days × periods timetable matrix.
//!
//! A [`GridView`] is a pure function of its inputs: periods (any order),
//! entries, the day table and the read-only flag. It never mutates data;
//! clicks are resolved into [`CellClick`] events handed to the caller.

use std::borrow::Cow;
use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

use crate::models::{Day, DayId, DayTable, EntryId, Period, PeriodId, TimetableEntry};

/// What to do when two entries claim the same `(day, period)` slot.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CollisionPolicy {
    /// Keep the first entry in input order and report the rest.
    #[default]
    FirstMatch,
    /// Refuse to build the grid.
    Reject,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum GridError {
    #[error("Entries {kept} and {duplicate} both occupy day {day}, period {period}")]
    Collision {
        day: DayId,
        period: PeriodId,
        kept: EntryId,
        duplicate: EntryId,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct SlotKey {
    pub day: DayId,
    pub period: PeriodId,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct GridOptions {
    pub read_only: bool,
    pub collisions: CollisionPolicy,
}

impl GridOptions {
    pub fn read_only() -> Self {
        Self {
            read_only: true,
            ..Self::default()
        }
    }

    pub fn editable() -> Self {
        Self::default()
    }
}

/// Entries keyed by slot.
#[derive(Debug)]
pub struct EntryIndex<'a> {
    by_slot: HashMap<SlotKey, &'a TimetableEntry>,
    collisions: Vec<SlotKey>,
}

impl<'a> EntryIndex<'a> {
    pub fn build(entries: &'a [TimetableEntry], policy: CollisionPolicy) -> Result<Self, GridError> {
        let mut by_slot = HashMap::with_capacity(entries.len());
        let mut collisions = Vec::new();
        for entry in entries {
            let key = SlotKey {
                day: entry.day_of_week,
                period: entry.period,
            };
            match by_slot.entry(key) {
                Entry::Vacant(slot) => {
                    slot.insert(entry);
                }
                Entry::Occupied(slot) => {
                    let kept: &TimetableEntry = slot.get();
                    if policy == CollisionPolicy::Reject {
                        return Err(GridError::Collision {
                            day: key.day,
                            period: key.period,
                            kept: kept.id,
                            duplicate: entry.id,
                        });
                    }
                    warn!(
                        day = key.day,
                        period = key.period,
                        kept = kept.id,
                        hidden = entry.id,
                        "duplicate timetable entry hidden"
                    );
                    collisions.push(key);
                }
            }
        }
        Ok(Self {
            by_slot,
            collisions,
        })
    }

    pub fn get(&self, day: DayId, period: PeriodId) -> Option<&'a TimetableEntry> {
        self.by_slot.get(&SlotKey { day, period }).copied()
    }

    pub fn collisions(&self) -> &[SlotKey] {
        &self.collisions
    }
}

/// Periods sorted by `order`; ties keep their input order.
pub fn sorted_periods(periods: &[Period]) -> Vec<&Period> {
    let mut sorted: Vec<&Period> = periods.iter().collect();
    sorted.sort_by_key(|p| p.order);
    sorted
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "kind", content = "entry", rename_all = "snake_case")]
pub enum Cell<'a> {
    /// Break period. Never hosts an assignment and ignores clicks.
    Break,
    Assigned(&'a TimetableEntry),
    /// Empty slot in an editable grid, offered for assignment.
    Available,
    Empty,
}

impl<'a> Cell<'a> {
    pub fn entry(&self) -> Option<&'a TimetableEntry> {
        match *self {
            Cell::Assigned(entry) => Some(entry),
            _ => None,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct GridRow<'a> {
    pub day: &'a Day,
    pub cells: Vec<Cell<'a>>,
}

/// Delivered to the caller when an interactive cell is clicked.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CellClick<'a> {
    pub day: DayId,
    pub period: &'a Period,
    pub entry: Option<&'a TimetableEntry>,
}

#[derive(Debug, Serialize)]
pub struct GridView<'a> {
    pub read_only: bool,
    pub columns: Vec<&'a Period>,
    pub rows: Vec<GridRow<'a>>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub collisions: Vec<SlotKey>,
}

impl<'a> GridView<'a> {
    pub fn build(
        periods: &'a [Period],
        entries: &'a [TimetableEntry],
        days: &'a DayTable,
        options: GridOptions,
    ) -> Result<Self, GridError> {
        let index = EntryIndex::build(entries, options.collisions)?;
        let columns = sorted_periods(periods);

        let rows = days
            .iter()
            .map(|day| {
                let cells = columns
                    .iter()
                    .map(|period| {
                        if period.is_break {
                            return Cell::Break;
                        }
                        match index.get(day.id, period.id) {
                            Some(entry) => Cell::Assigned(entry),
                            None if options.read_only => Cell::Empty,
                            None => Cell::Available,
                        }
                    })
                    .collect();
                GridRow { day, cells }
            })
            .collect();

        Ok(Self {
            read_only: options.read_only,
            columns,
            rows,
            collisions: index.collisions().to_vec(),
        })
    }

    pub fn cell(&self, day: DayId, period: PeriodId) -> Option<Cell<'a>> {
        let column = self.columns.iter().position(|p| p.id == period)?;
        let row = self.rows.iter().find(|r| r.day.id == day)?;
        row.cells.get(column).copied()
    }

    /// Resolves a click into an event. Read-only grids, break cells and
    /// coordinates outside the grid produce nothing.
    pub fn click(&self, day: DayId, period: PeriodId) -> Option<CellClick<'a>> {
        if self.read_only {
            return None;
        }
        let cell = self.cell(day, period)?;
        if cell == Cell::Break {
            return None;
        }
        let period = self.columns.iter().copied().find(|p| p.id == period)?;
        Some(CellClick {
            day,
            period,
            entry: cell.entry(),
        })
    }

    /// Invokes `on_click` once if the click lands on an interactive cell.
    pub fn click_with<F>(&self, day: DayId, period: PeriodId, on_click: F) -> bool
    where
        F: FnOnce(CellClick<'a>),
    {
        match self.click(day, period) {
            Some(event) => {
                on_click(event);
                true
            }
            None => false,
        }
    }
}

/// Column separators inside names are written as `\|`.
fn escape_cell(text: &str) -> Cow<'_, str> {
    if text.contains('|') {
        Cow::Owned(text.replace('|', "\\|"))
    } else {
        Cow::Borrowed(text)
    }
}

impl fmt::Display for GridView<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Day")?;
        for period in &self.columns {
            write!(f, " | {} {}", escape_cell(&period.name), period.time_range())?;
        }
        writeln!(f)?;
        for row in &self.rows {
            write!(f, "{}", escape_cell(&row.day.label))?;
            for cell in &row.cells {
                match cell {
                    Cell::Break => write!(f, " | BREAK")?,
                    Cell::Assigned(entry) => write!(
                        f,
                        " | {} ({})",
                        escape_cell(&entry.subject_name),
                        escape_cell(&entry.teacher_name)
                    )?,
                    Cell::Available => write!(f, " | +")?,
                    Cell::Empty => write!(f, " |")?,
                }
            }
            writeln!(f)?;
        }
        Ok(())
    }
}

/// Whole-surface state: either still loading or a ready grid.
#[derive(Debug)]
pub enum GridPane<'a> {
    Loading,
    Ready(GridView<'a>),
}

impl fmt::Display for GridPane<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GridPane::Loading => writeln!(f, "Loading..."),
            GridPane::Ready(grid) => fmt::Display::fmt(grid, f),
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveTime;

    use super::*;

    fn period(id: PeriodId, order: i32, name: &str) -> Period {
        Period {
            id,
            name: name.to_string(),
            start_time: NaiveTime::from_hms_opt(8, 0, 0).unwrap(),
            end_time: NaiveTime::from_hms_opt(8, 45, 0).unwrap(),
            is_break: false,
            order,
        }
    }

    fn entry(id: EntryId, day: DayId, period: PeriodId, subject: &str) -> TimetableEntry {
        TimetableEntry {
            id,
            day_of_week: day,
            period,
            subject_name: subject.to_string(),
            teacher_name: format!("{subject} teacher"),
            ..TimetableEntry::default()
        }
    }

    fn names(grid: &GridView<'_>) -> Vec<String> {
        grid.columns.iter().map(|p| p.name.clone()).collect()
    }

    #[test]
    fn test_columns_sorted_by_order() {
        let periods = vec![period(1, 2, "P2"), period(2, 1, "P1")];
        let days = DayTable::school_week();
        let grid = GridView::build(&periods, &[], &days, GridOptions::editable()).unwrap();
        assert_eq!(names(&grid), vec!["P1", "P2"]);
        assert_eq!(grid.rows.len(), 6);
        assert!(grid.rows.iter().all(|r| r.cells.len() == 2));
    }

    #[test]
    fn test_equal_orders_keep_input_order() {
        let periods = vec![
            period(1, 3, "C"),
            period(2, 1, "A1"),
            period(3, 1, "A2"),
            period(4, 2, "B"),
        ];
        let days = DayTable::school_week();
        let grid = GridView::build(&periods, &[], &days, GridOptions::read_only()).unwrap();
        assert_eq!(names(&grid), vec!["A1", "A2", "B", "C"]);
    }

    #[test]
    fn test_assigned_and_empty_cells() {
        let periods = vec![period(1, 1, "P1")];
        let entries = vec![entry(10, 1, 1, "Math")];
        let days = DayTable::school_week();

        let grid = GridView::build(&periods, &entries, &days, GridOptions::read_only()).unwrap();
        let monday = grid.cell(1, 1).unwrap();
        assert_eq!(monday.entry().unwrap().subject_name, "Math");
        assert_eq!(grid.cell(2, 1), Some(Cell::Empty));

        let grid = GridView::build(&periods, &entries, &days, GridOptions::editable()).unwrap();
        assert_eq!(grid.cell(2, 1), Some(Cell::Available));
    }

    #[test]
    fn test_break_never_shows_entry() {
        let mut lunch = period(2, 2, "Lunch");
        lunch.is_break = true;
        let periods = vec![period(1, 1, "P1"), lunch];
        let entries = vec![entry(10, 1, 2, "Math")];
        let days = DayTable::school_week();
        let grid = GridView::build(&periods, &entries, &days, GridOptions::editable()).unwrap();
        for row in &grid.rows {
            assert_eq!(row.cells[1], Cell::Break);
        }
    }

    #[test]
    fn test_duplicate_slot_first_match_wins() {
        let periods = vec![period(1, 1, "P1")];
        let entries = vec![entry(10, 1, 1, "Math"), entry(11, 1, 1, "Art")];
        let days = DayTable::school_week();
        let grid = GridView::build(&periods, &entries, &days, GridOptions::editable()).unwrap();
        assert_eq!(grid.cell(1, 1).unwrap().entry().unwrap().id, 10);
        assert_eq!(grid.collisions, vec![SlotKey { day: 1, period: 1 }]);
    }

    #[test]
    fn test_duplicate_slot_rejected() {
        let periods = vec![period(1, 1, "P1")];
        let entries = vec![entry(10, 1, 1, "Math"), entry(11, 1, 1, "Art")];
        let days = DayTable::school_week();
        let options = GridOptions {
            read_only: false,
            collisions: CollisionPolicy::Reject,
        };
        let err = GridView::build(&periods, &entries, &days, options).unwrap_err();
        assert_eq!(
            err,
            GridError::Collision {
                day: 1,
                period: 1,
                kept: 10,
                duplicate: 11
            }
        );
    }

    #[test]
    fn test_entries_outside_day_table_are_not_shown() {
        let periods = vec![period(1, 1, "P1")];
        let entries = vec![entry(10, 7, 1, "Sunday school")];
        let days = DayTable::school_week();
        let grid = GridView::build(&periods, &entries, &days, GridOptions::read_only()).unwrap();
        assert!(grid.rows.iter().all(|r| r.cells[0] == Cell::Empty));
        assert!(grid.cell(7, 1).is_none());
    }

    #[test]
    fn test_read_only_click_never_fires() {
        let periods = vec![period(1, 1, "P1")];
        let entries = vec![entry(10, 1, 1, "Math")];
        let days = DayTable::school_week();
        let grid = GridView::build(&periods, &entries, &days, GridOptions::read_only()).unwrap();
        let mut calls = 0;
        assert!(!grid.click_with(1, 1, |_| calls += 1));
        assert!(!grid.click_with(2, 1, |_| calls += 1));
        assert_eq!(calls, 0);
    }

    #[test]
    fn test_editable_click_fires_once_with_slot() {
        let mut lunch = period(2, 2, "Lunch");
        lunch.is_break = true;
        let periods = vec![period(1, 1, "P1"), lunch];
        let entries = vec![entry(10, 1, 1, "Math")];
        let days = DayTable::school_week();
        let grid = GridView::build(&periods, &entries, &days, GridOptions::editable()).unwrap();

        let mut events = Vec::new();
        assert!(grid.click_with(1, 1, |e| events.push(e)));
        assert!(grid.click_with(3, 1, |e| events.push(e)));
        assert!(!grid.click_with(1, 2, |e| events.push(e)));
        assert!(!grid.click_with(1, 99, |e| events.push(e)));

        assert_eq!(events.len(), 2);
        assert_eq!(events[0].day, 1);
        assert_eq!(events[0].period.id, 1);
        assert_eq!(events[0].entry.unwrap().id, 10);
        assert_eq!(events[1].day, 3);
        assert!(events[1].entry.is_none());
    }

    #[test]
    fn test_text_rendering() {
        let mut lunch = period(2, 2, "Lunch");
        lunch.is_break = true;
        let periods = vec![period(1, 1, "P1"), lunch];
        let entries = vec![entry(10, 1, 1, "Math")];
        let days = DayTable::from_labels(&["Monday", "Tuesday"]).unwrap();
        let grid = GridView::build(&periods, &entries, &days, GridOptions::editable()).unwrap();
        let text = grid.to_string();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "Day | P1 08:00 - 08:45 | Lunch 08:00 - 08:45");
        assert_eq!(lines[1], "Monday | Math (Math teacher) | BREAK");
        assert_eq!(lines[2], "Tuesday | + | BREAK");
    }

    #[test]
    fn test_text_rendering_escapes_separators() {
        let periods = vec![period(1, 1, "P1 | A")];
        let mut math = entry(10, 1, 1, "Math");
        math.teacher_name = "Nowak | Kowalska".into();
        let entries = vec![math];
        let days = DayTable::from_labels(&["Monday"]).unwrap();
        let grid = GridView::build(&periods, &entries, &days, GridOptions::read_only()).unwrap();
        let text = grid.to_string();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], r"Day | P1 \| A 08:00 - 08:45");
        assert_eq!(lines[1], r"Monday | Math (Nowak \| Kowalska)");
    }

    #[test]
    fn test_pane_loading_hides_grid() {
        assert_eq!(GridPane::Loading.to_string(), "Loading...\n");
        let periods = vec![period(1, 1, "P1")];
        let days = DayTable::school_week();
        let grid = GridView::build(&periods, &[], &days, GridOptions::read_only()).unwrap();
        assert!(GridPane::Ready(grid).to_string().starts_with("Day | P1"));
    }

    #[test]
    fn test_json_shape() {
        let periods = vec![period(1, 1, "P1")];
        let entries = vec![entry(10, 1, 1, "Math")];
        let days = DayTable::school_week();
        let grid = GridView::build(&periods, &entries, &days, GridOptions::editable()).unwrap();
        let json = serde_json::to_value(&grid).unwrap();
        assert_eq!(json["rows"][0]["day"]["label"], "Monday");
        assert_eq!(json["rows"][0]["cells"][0]["kind"], "assigned");
        assert_eq!(json["rows"][0]["cells"][0]["entry"]["subject_name"], "Math");
        assert_eq!(json["rows"][1]["cells"][0]["kind"], "available");
        assert!(json.get("collisions").is_none());
    }
}
