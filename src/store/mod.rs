//! Tabular store the pipeline stages read from and write to.
//!
//! Every stage fully replaces its own output table. The solver appends one
//! decision-log row and one final row per accepted course-section through
//! [`TimetableStore::commit_assignment`], which must write both or neither.

mod error;
mod memory;
mod postgres;

use async_trait::async_trait;
use serde::Serialize;

use crate::models::{
    Assignment, CourseSection, DaySlot, DecisionRecord, EnrollmentForecast, Program,
    ProgramSection, ProspectusCourse, ReferenceData, Room, TimeSlot,
};

pub use error::{StoreError, StoreResult};
pub use memory::MemoryStore;
pub use postgres::PgStore;

/// Row counts of the reference tables, in readiness-check order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TableCounts {
    pub forecast: usize,
    pub programs: usize,
    pub prospectus: usize,
    pub rooms: usize,
    pub timeslots: usize,
    pub days: usize,
}

impl TableCounts {
    pub fn entries(&self) -> [(&'static str, usize); 6] {
        [
            ("Forecasting", self.forecast),
            ("Programs", self.programs),
            ("Prospectus", self.prospectus),
            ("Rooms", self.rooms),
            ("Timeslots", self.timeslots),
            ("Days", self.days),
        ]
    }

    /// First reference table without rows, if any.
    pub fn first_empty(&self) -> Option<&'static str> {
        self.entries()
            .into_iter()
            .find(|(_, count)| *count == 0)
            .map(|(name, _)| name)
    }
}

/// Reference table selector used by imports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum ReferenceTable {
    Forecast,
    Programs,
    Prospectus,
    Rooms,
    Timeslots,
    Days,
}

#[async_trait]
pub trait TimetableStore: Send + Sync {
    async fn health_check(&self) -> StoreResult<bool>;

    async fn table_counts(&self) -> StoreResult<TableCounts>;

    /// Clear-then-insert of every non-empty table in `data`.
    async fn replace_reference_data(&self, data: &ReferenceData) -> StoreResult<()>;

    async fn fetch_forecasts(&self) -> StoreResult<Vec<EnrollmentForecast>>;

    async fn fetch_programs(&self) -> StoreResult<Vec<Program>>;

    /// Catalog rows for one semester only.
    async fn fetch_prospectus(&self, semester: i32) -> StoreResult<Vec<ProspectusCourse>>;

    /// Rooms ordered by code.
    async fn fetch_rooms(&self) -> StoreResult<Vec<Room>>;

    /// Time slots ordered by key.
    async fn fetch_time_slots(&self) -> StoreResult<Vec<TimeSlot>>;

    /// Day slots ordered by key.
    async fn fetch_day_slots(&self) -> StoreResult<Vec<DaySlot>>;

    /// Ordered by (priority, department, program, year, group).
    async fn fetch_program_sections(&self) -> StoreResult<Vec<ProgramSection>>;

    async fn replace_program_sections(&self, rows: &[ProgramSection]) -> StoreResult<()>;

    /// Course sections of one semester in creation order.
    async fn fetch_course_sections(&self, semester: i32) -> StoreResult<Vec<CourseSection>>;

    async fn replace_course_sections(&self, rows: &[CourseSection]) -> StoreResult<()>;

    /// Empties both the decision log and the final assignment table.
    async fn clear_assignments(&self) -> StoreResult<()>;

    /// Appends the decision row, then the final row, atomically.
    async fn commit_assignment(
        &self,
        decision: &DecisionRecord,
        assignment: &Assignment,
    ) -> StoreResult<()>;

    async fn fetch_decisions(&self) -> StoreResult<Vec<DecisionRecord>>;

    async fn fetch_assignments(&self) -> StoreResult<Vec<Assignment>>;
}

/// Canonical ordering for program sections returned by every store.
pub(crate) fn sort_program_sections(rows: &mut [ProgramSection]) {
    rows.sort_by(|a, b| {
        (a.priority_index, &a.department, &a.program, a.year, a.group_letter.len(), &a.group_letter).cmp(&(
            b.priority_index,
            &b.department,
            &b.program,
            b.year,
            b.group_letter.len(),
            &b.group_letter,
        ))
    });
}
