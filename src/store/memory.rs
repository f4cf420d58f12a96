//! In-memory store for offline simulation and tests.

use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;

use super::{sort_program_sections, StoreError, StoreResult, TableCounts, TimetableStore};
use crate::models::{
    Assignment, CourseSection, DaySlot, DecisionRecord, EnrollmentForecast, Program,
    ProgramSection, ProspectusCourse, ReferenceData, Room, TimeSlot,
};

#[derive(Clone, Default)]
pub struct MemoryStore {
    data: Arc<RwLock<Tables>>,
}

#[derive(Default)]
struct Tables {
    reference: ReferenceData,
    program_sections: Vec<ProgramSection>,
    course_sections: Vec<CourseSection>,
    decisions: Vec<DecisionRecord>,
    assignments: Vec<Assignment>,
    #[cfg(test)]
    commits_before_failure: Option<usize>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_reference(reference: ReferenceData) -> Self {
        let store = Self::new();
        if let Ok(mut tables) = store.data.write() {
            tables.reference = reference;
        }
        store
    }

    /// Lets `successful` more commits through, then fails every later
    /// `commit_assignment` as a dropped connection would.
    #[cfg(test)]
    pub fn fail_commits_after(&self, successful: usize) {
        if let Ok(mut tables) = self.data.write() {
            tables.commits_before_failure = Some(successful);
        }
    }

    fn read(&self) -> StoreResult<RwLockReadGuard<'_, Tables>> {
        self.data
            .read()
            .map_err(|_| StoreError::Unavailable("memory store lock poisoned".into()))
    }

    fn write(&self) -> StoreResult<RwLockWriteGuard<'_, Tables>> {
        self.data
            .write()
            .map_err(|_| StoreError::Unavailable("memory store lock poisoned".into()))
    }
}

#[async_trait]
impl TimetableStore for MemoryStore {
    async fn health_check(&self) -> StoreResult<bool> {
        Ok(self.data.read().is_ok())
    }

    async fn table_counts(&self) -> StoreResult<TableCounts> {
        let tables = self.read()?;
        let reference = &tables.reference;
        Ok(TableCounts {
            forecast: reference.forecasts.len(),
            programs: reference.programs.len(),
            prospectus: reference.prospectus.len(),
            rooms: reference.rooms.len(),
            timeslots: reference.time_slots.len(),
            days: reference.day_slots.len(),
        })
    }

    async fn replace_reference_data(&self, data: &ReferenceData) -> StoreResult<()> {
        let mut tables = self.write()?;
        let reference = &mut tables.reference;
        if !data.forecasts.is_empty() {
            reference.forecasts = data.forecasts.clone();
        }
        if !data.programs.is_empty() {
            reference.programs = data.programs.clone();
        }
        if !data.prospectus.is_empty() {
            reference.prospectus = data.prospectus.clone();
        }
        if !data.rooms.is_empty() {
            reference.rooms = data.rooms.clone();
        }
        if !data.time_slots.is_empty() {
            reference.time_slots = data.time_slots.clone();
        }
        if !data.day_slots.is_empty() {
            reference.day_slots = data.day_slots.clone();
        }
        Ok(())
    }

    async fn fetch_forecasts(&self) -> StoreResult<Vec<EnrollmentForecast>> {
        Ok(self.read()?.reference.forecasts.clone())
    }

    async fn fetch_programs(&self) -> StoreResult<Vec<Program>> {
        Ok(self.read()?.reference.programs.clone())
    }

    async fn fetch_prospectus(&self, semester: i32) -> StoreResult<Vec<ProspectusCourse>> {
        Ok(self
            .read()?
            .reference
            .prospectus
            .iter()
            .filter(|course| course.semester == semester)
            .cloned()
            .collect())
    }

    async fn fetch_rooms(&self) -> StoreResult<Vec<Room>> {
        let mut rooms = self.read()?.reference.rooms.clone();
        rooms.sort_by(|a, b| a.code.cmp(&b.code));
        Ok(rooms)
    }

    async fn fetch_time_slots(&self) -> StoreResult<Vec<TimeSlot>> {
        let mut slots = self.read()?.reference.time_slots.clone();
        slots.sort_by_key(|slot| slot.key);
        Ok(slots)
    }

    async fn fetch_day_slots(&self) -> StoreResult<Vec<DaySlot>> {
        let mut days = self.read()?.reference.day_slots.clone();
        days.sort_by_key(|day| day.key);
        Ok(days)
    }

    async fn fetch_program_sections(&self) -> StoreResult<Vec<ProgramSection>> {
        let mut rows = self.read()?.program_sections.clone();
        sort_program_sections(&mut rows);
        Ok(rows)
    }

    async fn replace_program_sections(&self, rows: &[ProgramSection]) -> StoreResult<()> {
        self.write()?.program_sections = rows.to_vec();
        Ok(())
    }

    async fn fetch_course_sections(&self, semester: i32) -> StoreResult<Vec<CourseSection>> {
        let mut rows: Vec<CourseSection> = self
            .read()?
            .course_sections
            .iter()
            .filter(|section| section.semester == semester)
            .cloned()
            .collect();
        rows.sort_by_key(|section| section.ordinal);
        Ok(rows)
    }

    async fn replace_course_sections(&self, rows: &[CourseSection]) -> StoreResult<()> {
        self.write()?.course_sections = rows.to_vec();
        Ok(())
    }

    async fn clear_assignments(&self) -> StoreResult<()> {
        let mut tables = self.write()?;
        tables.decisions.clear();
        tables.assignments.clear();
        Ok(())
    }

    async fn commit_assignment(
        &self,
        decision: &DecisionRecord,
        assignment: &Assignment,
    ) -> StoreResult<()> {
        let mut tables = self.write()?;
        #[cfg(test)]
        {
            let budget = tables.commits_before_failure;
            match budget {
                Some(0) => return Err(StoreError::Unavailable("connection reset".into())),
                Some(remaining) => tables.commits_before_failure = Some(remaining - 1),
                None => {}
            }
        }
        tables.decisions.push(decision.clone());
        tables.assignments.push(assignment.clone());
        Ok(())
    }

    async fn fetch_decisions(&self) -> StoreResult<Vec<DecisionRecord>> {
        Ok(self.read()?.decisions.clone())
    }

    async fn fetch_assignments(&self) -> StoreResult<Vec<Assignment>> {
        Ok(self.read()?.assignments.clone())
    }
}
