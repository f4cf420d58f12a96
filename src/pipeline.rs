//! Runs the three stages against a [`TimetableStore`].
//!
//! Each stage reads a full snapshot, computes its output, and replaces its own
//! table. Stage 3 persists every accepted binding before deciding the next
//! course-section.

use chrono::Utc;
use serde::Serialize;
use uuid::Uuid;

use crate::assigner::{self, Catalog, SolverState, Unscheduled};
use crate::config::SchedulingRules;
use crate::merger::merge_sections;
use crate::models::{Assignment, CourseSection, DecisionRecord};
use crate::sectioner::section_forecasts;
use crate::store::{StoreResult, TableCounts, TimetableStore};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Readiness {
    pub counts: TableCounts,
    pub first_empty: Option<&'static str>,
}

impl Readiness {
    pub fn is_ready(&self) -> bool {
        self.first_empty.is_none()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SectionSummary {
    pub forecast_rows: usize,
    pub program_sections: usize,
    pub students: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MergeSummary {
    pub semester: i32,
    pub catalog_rows: usize,
    pub course_sections: usize,
    pub skipped_cross_references: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UnscheduledSection {
    pub course_section: String,
    pub course_type: String,
    pub population: u32,
    pub reason: Unscheduled,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AssignmentSummary {
    pub run_id: Uuid,
    pub semester: i32,
    pub scheduled: usize,
    pub unscheduled: Vec<UnscheduledSection>,
}

impl AssignmentSummary {
    pub fn unscheduled_count(&self) -> usize {
        self.unscheduled.len()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub sectioning: SectionSummary,
    pub merging: MergeSummary,
    pub assignment: AssignmentSummary,
}

pub async fn check_readiness(store: &dyn TimetableStore) -> StoreResult<Readiness> {
    let counts = store.table_counts().await?;
    let first_empty = counts.first_empty();
    Ok(Readiness {
        counts,
        first_empty,
    })
}

pub async fn run_sectioning(
    store: &dyn TimetableStore,
    rules: &SchedulingRules,
) -> StoreResult<SectionSummary> {
    let forecasts = store.fetch_forecasts().await?;
    let programs = store.fetch_programs().await?;
    let sections = section_forecasts(&forecasts, &programs, rules.section_cap);
    store.replace_program_sections(&sections).await?;

    let summary = SectionSummary {
        forecast_rows: forecasts.len(),
        program_sections: sections.len(),
        students: sections.iter().map(|s| u64::from(s.population)).sum(),
    };
    tracing::info!(
        forecast_rows = summary.forecast_rows,
        program_sections = summary.program_sections,
        "sectioning completed"
    );
    Ok(summary)
}

pub async fn run_merging(
    store: &dyn TimetableStore,
    semester: i32,
    rules: &SchedulingRules,
) -> StoreResult<MergeSummary> {
    let program_sections = store.fetch_program_sections().await?;
    let catalog = store.fetch_prospectus(semester).await?;
    tracing::info!(semester, catalog_rows = catalog.len(), "merging course sections");

    let outcome = merge_sections(&program_sections, &catalog, semester, rules);
    store.replace_course_sections(&outcome.course_sections).await?;

    let summary = MergeSummary {
        semester,
        catalog_rows: catalog.len(),
        course_sections: outcome.course_sections.len(),
        skipped_cross_references: outcome.skipped.len(),
    };
    tracing::info!(
        course_sections = summary.course_sections,
        skipped = summary.skipped_cross_references,
        "merging completed"
    );
    Ok(summary)
}

fn records_for(
    run_id: Uuid,
    section: &CourseSection,
    candidate: &assigner::Candidate<'_>,
) -> (DecisionRecord, Assignment) {
    let decision = DecisionRecord {
        run_id,
        course_section: section.label.clone(),
        room_code: candidate.room.code.clone(),
        day_abbr: candidate.day.abbreviation.clone(),
        start: candidate.time.start,
        end: candidate.time.end,
        decided_at: Utc::now(),
    };
    let assignment = Assignment {
        run_id,
        course_section: section.label.clone(),
        program_sections: section.members_display(),
        population: section.population,
        department: section.department.clone(),
        course_type: section.course_type.clone(),
        room_code: candidate.room.code.clone(),
        day_abbr: candidate.day.abbreviation.clone(),
        start: candidate.time.start,
        end: candidate.time.end,
        year: section.year,
        display_range: candidate.time.display_range(),
    };
    (decision, assignment)
}

/// Clears prior assignments, then decides and persists course-sections one at a time.
///
/// A store failure aborts the pass; bindings committed before it stay in place.
pub async fn run_assignment(
    store: &dyn TimetableStore,
    semester: i32,
    rules: &SchedulingRules,
) -> StoreResult<AssignmentSummary> {
    store.clear_assignments().await?;

    let sections = store.fetch_course_sections(semester).await?;
    let catalog = Catalog {
        rooms: store.fetch_rooms().await?,
        time_slots: store.fetch_time_slots().await?,
        day_slots: store.fetch_day_slots().await?,
    };

    let run_id = Uuid::new_v4();
    tracing::info!(%run_id, semester, course_sections = sections.len(), "assigning rooms");

    let mut state = SolverState::new();
    let mut unscheduled = Vec::new();

    for section in assigner::processing_order(&sections) {
        match assigner::decide(&state, section, &catalog, rules) {
            Ok(candidate) => {
                let (decision, assignment) = records_for(run_id, section, &candidate);
                store.commit_assignment(&decision, &assignment).await?;
                assigner::commit(&mut state, section, &candidate, rules);
                tracing::debug!(
                    section = %section.label,
                    course_type = %section.course_type,
                    room = %candidate.room.code,
                    affine = candidate.program_affine,
                    day = %candidate.day.abbreviation,
                    time = %assignment.display_range,
                    "assigned"
                );
            }
            Err(reason) => {
                tracing::warn!(
                    section = %section.label,
                    course_type = %section.course_type,
                    %reason,
                    "left unassigned"
                );
                unscheduled.push(UnscheduledSection {
                    course_section: section.label.clone(),
                    course_type: section.course_type.clone(),
                    population: section.population,
                    reason,
                });
            }
        }
    }

    let summary = AssignmentSummary {
        run_id,
        semester,
        scheduled: state.assigned_count(),
        unscheduled,
    };
    tracing::info!(
        scheduled = summary.scheduled,
        unscheduled = summary.unscheduled_count(),
        "assignment completed"
    );
    Ok(summary)
}

pub async fn run_all(
    store: &dyn TimetableStore,
    semester: i32,
    rules: &SchedulingRules,
) -> StoreResult<RunSummary> {
    let sectioning = run_sectioning(store, rules).await?;
    let merging = run_merging(store, semester, rules).await?;
    let assignment = run_assignment(store, semester, rules).await?;
    Ok(RunSummary {
        sectioning,
        merging,
        assignment,
    })
}
