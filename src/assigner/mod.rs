//! Stage 3: greedy room/day/time assignment.
//!
//! Course-sections are visited once, in tier order then by descending
//! population. Each one takes the first ranked candidate that passes every
//! check against the [`SolverState`]; there is no backtracking, so a section
//! with no feasible candidate stays unassigned.

pub mod rules;
pub mod state;

use std::fmt;

use chrono::Weekday;
use serde::Serialize;

use crate::config::SchedulingRules;
use crate::models::{CourseSection, DaySlot, Room, TimeSlot, Window};
use rules::{is_program_affine, priority_tier, requirement_for, size_preference, RequirementGap};
pub use state::SolverState;

/// Room, day and time reference data for one run.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    pub rooms: Vec<Room>,
    pub time_slots: Vec<TimeSlot>,
    pub day_slots: Vec<DaySlot>,
}

/// One (room, day, time) binding under consideration.
#[derive(Debug, Clone, Copy)]
pub struct Candidate<'a> {
    pub room: &'a Room,
    pub day: &'a DaySlot,
    pub time: &'a TimeSlot,
    pub program_affine: bool,
}

impl Candidate<'_> {
    pub fn window(&self) -> Window {
        self.time.window()
    }
}

/// A failed feasibility check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Violation {
    RoomConflict { room: String, day: Weekday },
    AlreadyAssigned,
    CohortOverlap { program_section: String, day: Weekday },
    FatigueLimit { program_section: String, day: Weekday, chain_minutes: u32 },
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Violation::RoomConflict { room, day } => write!(f, "room {room} taken on {day}"),
            Violation::AlreadyAssigned => write!(f, "section already assigned"),
            Violation::CohortOverlap { program_section, day } => {
                write!(f, "{program_section} already in class on {day}")
            }
            Violation::FatigueLimit {
                program_section,
                day,
                chain_minutes,
            } => write!(f, "{program_section} would sit {chain_minutes} minutes straight on {day}"),
        }
    }
}

/// Why a course-section was left without an assignment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum Unscheduled {
    /// Every ranked candidate failed a check.
    NoFeasibleCandidate { candidates: usize },
    /// Department, type, units or programs match no room rule.
    UnrecognizedRequirement { detail: String },
}

impl fmt::Display for Unscheduled {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Unscheduled::NoFeasibleCandidate { candidates } => {
                write!(f, "no feasible slot among {candidates} candidates")
            }
            Unscheduled::UnrecognizedRequirement { detail } => {
                write!(f, "no eligible rooms: {detail}")
            }
        }
    }
}

/// Visiting order: tier ascending, then population descending, then creation order.
pub fn processing_order(sections: &[CourseSection]) -> Vec<&CourseSection> {
    let mut ordered: Vec<&CourseSection> = sections.iter().collect();
    ordered.sort_by(|a, b| {
        priority_tier(a)
            .cmp(&priority_tier(b))
            .then(b.population.cmp(&a.population))
            .then(a.ordinal.cmp(&b.ordinal))
    });
    ordered
}

/// All candidates for `section`, program-affine rooms first, each group by size preference.
pub fn rank_candidates<'a>(
    section: &CourseSection,
    catalog: &'a Catalog,
) -> Result<Vec<Candidate<'a>>, Unscheduled> {
    let requirement = requirement_for(section).map_err(|gap| match gap {
        RequirementGap::UnsupportedUnits(units) => Unscheduled::UnrecognizedRequirement {
            detail: format!("{units} units are not schedulable for {}", section.course_type),
        },
        RequirementGap::NoRoomRule => Unscheduled::UnrecognizedRequirement {
            detail: format!(
                "no room rule for {} {} ({})",
                section.department,
                section.course_type,
                section.member_programs.join(", ")
            ),
        },
    })?;

    let eligible: Vec<&Room> = catalog
        .rooms
        .iter()
        .filter(|room| room.capacity >= section.population && requirement.filter.admits(room))
        .collect();

    let (affine, general): (Vec<&Room>, Vec<&Room>) = eligible
        .into_iter()
        .partition(|room| is_program_affine(section, room));

    let sizes = size_preference(section.population);
    let by_size = |rooms: &[&'a Room]| -> Vec<&'a Room> {
        sizes
            .iter()
            .flat_map(|size| rooms.iter().copied().filter(move |room| room.size == *size))
            .collect()
    };

    let days: Vec<&DaySlot> = catalog
        .day_slots
        .iter()
        .filter(|day| day.pattern == requirement.pattern)
        .collect();
    let times: Vec<&TimeSlot> = catalog
        .time_slots
        .iter()
        .filter(|slot| slot.duration_minutes == requirement.duration_minutes)
        .collect();

    let mut candidates = Vec::new();
    for (rooms, program_affine) in [(by_size(&affine), true), (by_size(&general), false)] {
        for room in rooms {
            for &day in &days {
                for &time in &times {
                    candidates.push(Candidate {
                        room,
                        day,
                        time,
                        program_affine,
                    });
                }
            }
        }
    }
    Ok(candidates)
}

/// Runs every feasibility check for one candidate.
pub fn check_candidate(
    state: &SolverState,
    section: &CourseSection,
    candidate: &Candidate<'_>,
    rules: &SchedulingRules,
) -> Result<(), Violation> {
    let window = candidate.window();

    for &day in &candidate.day.weekdays {
        if !state.room_is_free(&candidate.room.code, day, window) {
            return Err(Violation::RoomConflict {
                room: candidate.room.code.clone(),
                day,
            });
        }
    }

    if state.is_assigned(section.ordinal) {
        return Err(Violation::AlreadyAssigned);
    }

    for member in &section.member_sections {
        for &day in &candidate.day.weekdays {
            if !state.cohort_is_free(member, day, window) {
                return Err(Violation::CohortOverlap {
                    program_section: member.clone(),
                    day,
                });
            }
            let chain_minutes =
                state.cohort_chain_minutes(member, day, window, rules.min_break_minutes);
            if chain_minutes > rules.max_chain_minutes {
                return Err(Violation::FatigueLimit {
                    program_section: member.clone(),
                    day,
                    chain_minutes,
                });
            }
        }
    }

    Ok(())
}

/// First feasible candidate for `section`; reads `state` without changing it.
pub fn decide<'a>(
    state: &SolverState,
    section: &CourseSection,
    catalog: &'a Catalog,
    rules: &SchedulingRules,
) -> Result<Candidate<'a>, Unscheduled> {
    let candidates = rank_candidates(section, catalog)?;
    for candidate in &candidates {
        match check_candidate(state, section, candidate, rules) {
            Ok(()) => return Ok(*candidate),
            Err(violation) => tracing::trace!(
                section = %section.label,
                room = %candidate.room.code,
                day = %candidate.day.abbreviation,
                %violation,
                "candidate rejected"
            ),
        }
    }
    Err(Unscheduled::NoFeasibleCandidate {
        candidates: candidates.len(),
    })
}

/// Applies an accepted candidate to `state`.
pub fn commit(
    state: &mut SolverState,
    section: &CourseSection,
    candidate: &Candidate<'_>,
    rules: &SchedulingRules,
) {
    state.commit(
        section.ordinal,
        &candidate.room.code,
        &candidate.day.weekdays,
        candidate.window(),
        &section.member_sections,
        rules.min_break_minutes,
    );
}
