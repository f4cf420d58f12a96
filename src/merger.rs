//! Stage 2: bucket program-sections into joint course-sections.
//!
//! Catalog rows are grouped by (course code, year) across departments, in
//! first-seen order. For every department teaching the pair, the program
//! sections of that department/year whose program lists the course are sorted
//! by (priority, program) and packed first-fit into groups under the cap.

use std::collections::{HashMap, HashSet};

use serde::Serialize;

use crate::config::{LetterScope, SchedulingRules};
use crate::models::{section_letter, CourseSection, ProgramSection, ProspectusCourse};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MergeOutcome {
    pub course_sections: Vec<CourseSection>,
    /// (course code, year, department) combinations with no eligible program section.
    pub skipped: Vec<(String, i32, String)>,
}

struct CourseGroup<'a> {
    course_code: &'a str,
    year: i32,
    rows: Vec<&'a ProspectusCourse>,
}

fn group_catalog(catalog: &[ProspectusCourse]) -> Vec<CourseGroup<'_>> {
    let mut index: HashMap<(&str, i32), usize> = HashMap::new();
    let mut groups: Vec<CourseGroup<'_>> = Vec::new();
    for row in catalog {
        let key = (row.course_code.as_str(), row.year);
        let slot = *index.entry(key).or_insert_with(|| {
            groups.push(CourseGroup {
                course_code: &row.course_code,
                year: row.year,
                rows: Vec::new(),
            });
            groups.len() - 1
        });
        groups[slot].rows.push(row);
    }
    groups
}

fn departments_in_order<'a>(rows: &[&'a ProspectusCourse]) -> Vec<&'a str> {
    let mut seen = HashSet::new();
    rows.iter()
        .map(|row| row.department.as_str())
        .filter(|department| seen.insert(*department))
        .collect()
}

pub fn merge_sections(
    program_sections: &[ProgramSection],
    catalog: &[ProspectusCourse],
    semester: i32,
    rules: &SchedulingRules,
) -> MergeOutcome {
    let mut by_department_year: HashMap<(&str, i32), Vec<&ProgramSection>> = HashMap::new();
    for section in program_sections {
        by_department_year
            .entry((section.department.as_str(), section.year))
            .or_default()
            .push(section);
    }

    let mut outcome = MergeOutcome::default();
    let mut next_ordinal = 0u32;

    for group in group_catalog(catalog) {
        let mut letter_index = 0usize;

        for department in departments_in_order(&group.rows) {
            if rules.letter_scope == LetterScope::PerDepartment {
                letter_index = 0;
            }

            let offering_programs: HashSet<&str> = group
                .rows
                .iter()
                .filter(|row| row.department == department)
                .map(|row| row.program.as_str())
                .collect();

            let mut candidates: Vec<&ProgramSection> = by_department_year
                .get(&(department, group.year))
                .map(|sections| {
                    sections
                        .iter()
                        .copied()
                        .filter(|section| offering_programs.contains(section.program.as_str()))
                        .collect()
                })
                .unwrap_or_default();

            let Some(details) = group.rows.iter().find(|row| row.department == department) else {
                continue;
            };

            if candidates.is_empty() {
                tracing::debug!(
                    course = group.course_code,
                    year = group.year,
                    department,
                    "no program sections take this course, skipped"
                );
                outcome.skipped.push((
                    group.course_code.to_string(),
                    group.year,
                    department.to_string(),
                ));
                continue;
            }

            candidates.sort_by(|a, b| {
                (a.priority_index, &a.program).cmp(&(b.priority_index, &b.program))
            });

            let mut current: Vec<&ProgramSection> = Vec::new();
            let mut current_population = 0u32;
            let mut close_group = |members: &[&ProgramSection], population: u32, letter: usize| {
                let section = build_course_section(
                    next_ordinal,
                    group.course_code,
                    group.year,
                    details,
                    semester,
                    members,
                    population,
                    letter,
                );
                next_ordinal += 1;
                outcome.course_sections.push(section);
            };

            for candidate in candidates {
                if current_population + candidate.population <= rules.section_cap {
                    current.push(candidate);
                    current_population += candidate.population;
                    continue;
                }
                if !current.is_empty() {
                    close_group(&current, current_population, letter_index);
                    letter_index += 1;
                }
                current = vec![candidate];
                current_population = candidate.population;
            }

            if !current.is_empty() {
                close_group(&current, current_population, letter_index);
                letter_index += 1;
            }
        }
    }

    outcome
}

#[allow(clippy::too_many_arguments)]
fn build_course_section(
    ordinal: u32,
    course_code: &str,
    year: i32,
    details: &ProspectusCourse,
    semester: i32,
    members: &[&ProgramSection],
    population: u32,
    letter_index: usize,
) -> CourseSection {
    let mut member_programs: Vec<String> = Vec::new();
    for member in members {
        if !member_programs.contains(&member.program) {
            member_programs.push(member.program.clone());
        }
    }
    CourseSection {
        ordinal,
        label: format!("{course_code}-{year}-{}", section_letter(letter_index)),
        course_code: course_code.to_string(),
        year,
        department: details.department.clone(),
        course_type: details.course_type.clone(),
        units: details.units,
        semester,
        member_sections: members.iter().map(|m| m.final_label.clone()).collect(),
        member_programs,
        population,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn section(program: &str, department: &str, year: i32, letter: &str, population: u32, priority: i32) -> ProgramSection {
        ProgramSection {
            program: program.to_string(),
            department: department.to_string(),
            year,
            group_letter: letter.to_string(),
            final_label: format!("{program}-{year}-{letter}"),
            population,
            priority_index: priority,
        }
    }

    fn course(program: &str, department: &str, year: i32, code: &str, course_type: &str) -> ProspectusCourse {
        ProspectusCourse {
            program: program.to_string(),
            department: department.to_string(),
            year,
            course_code: code.to_string(),
            title: format!("{code} title"),
            units: 3,
            semester: 1,
            course_type: course_type.to_string(),
        }
    }

    #[test]
    fn packs_first_fit_in_priority_order() {
        let sections = vec![
            section("BSIT", "CSITE", 1, "A", 25, 2),
            section("BSCS", "CSITE", 1, "A", 15, 1),
            section("BSCS", "CSITE", 1, "B", 15, 1),
            section("BSIT", "CSITE", 1, "B", 10, 2),
        ];
        let catalog = vec![
            course("BSCS", "CSITE", 1, "GE101", "NGEC"),
            course("BSIT", "CSITE", 1, "GE101", "NGEC"),
        ];
        let outcome = merge_sections(&sections, &catalog, 1, &SchedulingRules::default());
        let merged = &outcome.course_sections;
        assert_eq!(merged.len(), 2);
        assert_eq!(merged[0].label, "GE101-1-A");
        assert_eq!(merged[0].member_sections, vec!["BSCS-1-A", "BSCS-1-B"]);
        assert_eq!(merged[0].population, 30);
        assert_eq!(merged[1].label, "GE101-1-B");
        assert_eq!(merged[1].member_sections, vec!["BSIT-1-A", "BSIT-1-B"]);
        assert_eq!(merged[1].population, 35);
        assert_eq!(merged[1].member_programs, vec!["BSIT"]);
        assert!(merged.iter().all(|cs| cs.population <= 40));
    }

    #[test]
    fn only_programs_listing_the_course_join() {
        let sections = vec![
            section("BSCS", "CSITE", 2, "A", 30, 1),
            section("BSIT", "CSITE", 2, "A", 30, 2),
        ];
        let catalog = vec![course("BSCS", "CSITE", 2, "CS201", "MSC")];
        let outcome = merge_sections(&sections, &catalog, 1, &SchedulingRules::default());
        assert_eq!(outcome.course_sections.len(), 1);
        assert_eq!(outcome.course_sections[0].member_sections, vec!["BSCS-2-A"]);
        assert_eq!(outcome.course_sections[0].course_type, "MSC");
    }

    #[test]
    fn missing_cross_reference_is_skipped() {
        let sections = vec![section("BSCS", "CSITE", 1, "A", 30, 1)];
        let catalog = vec![
            course("BSCS", "CSITE", 1, "GE101", "NGEC"),
            course("BSED", "SED", 1, "GE101", "NGEC"),
        ];
        let outcome = merge_sections(&sections, &catalog, 1, &SchedulingRules::default());
        assert_eq!(outcome.course_sections.len(), 1);
        assert_eq!(
            outcome.skipped,
            vec![("GE101".to_string(), 1, "SED".to_string())]
        );
    }

    #[test]
    fn letter_scope_controls_cross_department_labels() {
        let sections = vec![
            section("BSCS", "CSITE", 1, "A", 30, 1),
            section("BSED", "SED", 1, "A", 30, 4),
        ];
        let catalog = vec![
            course("BSCS", "CSITE", 1, "GE101", "NGEC"),
            course("BSED", "SED", 1, "GE101", "NGEC"),
        ];

        let per_department = merge_sections(&sections, &catalog, 1, &SchedulingRules::default());
        let labels: Vec<&str> = per_department
            .course_sections
            .iter()
            .map(|cs| cs.label.as_str())
            .collect();
        assert_eq!(labels, vec!["GE101-1-A", "GE101-1-A"]);
        assert_eq!(per_department.course_sections[1].department, "SED");
        assert_ne!(
            per_department.course_sections[0].ordinal,
            per_department.course_sections[1].ordinal
        );

        let rules = SchedulingRules::default().with_letter_scope(LetterScope::PerCourse);
        let per_course = merge_sections(&sections, &catalog, 1, &rules);
        let labels: Vec<&str> = per_course
            .course_sections
            .iter()
            .map(|cs| cs.label.as_str())
            .collect();
        assert_eq!(labels, vec!["GE101-1-A", "GE101-1-B"]);
    }

    #[test]
    fn oversized_single_candidate_opens_new_group() {
        let sections = vec![
            section("BSCS", "CSITE", 1, "A", 21, 1),
            section("BSCS", "CSITE", 1, "B", 20, 1),
            section("BSCS", "CSITE", 1, "C", 20, 1),
        ];
        let catalog = vec![course("BSCS", "CSITE", 1, "CS101", "MSC")];
        let outcome = merge_sections(&sections, &catalog, 1, &SchedulingRules::default());
        let populations: Vec<u32> = outcome.course_sections.iter().map(|cs| cs.population).collect();
        assert_eq!(populations, vec![21, 40]);
    }

    #[test]
    fn rerun_reproduces_identical_output() {
        let sections = vec![
            section("BSCS", "CSITE", 1, "A", 28, 1),
            section("BSIT", "CSITE", 1, "A", 12, 2),
        ];
        let catalog = vec![
            course("BSCS", "CSITE", 1, "GE101", "NGEC"),
            course("BSIT", "CSITE", 1, "GE101", "NGEC"),
        ];
        let rules = SchedulingRules::default();
        assert_eq!(
            merge_sections(&sections, &catalog, 1, &rules),
            merge_sections(&sections, &catalog, 1, &rules)
        );
    }

    proptest! {
        #[test]
        fn merged_populations_are_capped_and_add_up(
            populations in proptest::collection::vec((1u32..=40, 0usize..3), 1..24)
        ) {
            let programs = [("BSCS", 1), ("BSIT", 2), ("BSNMCA", 3)];
            let sections: Vec<ProgramSection> = populations
                .iter()
                .enumerate()
                .map(|(i, (population, program))| {
                    let (abbr, priority) = programs[*program];
                    section(abbr, "CSITE", 1, &section_letter(i), *population, priority)
                })
                .collect();
            let catalog: Vec<ProspectusCourse> = programs
                .iter()
                .map(|(abbr, _)| course(abbr, "CSITE", 1, "GE101", "NGEC"))
                .collect();

            let outcome = merge_sections(&sections, &catalog, 1, &SchedulingRules::default());
            let by_label: HashMap<&str, u32> = sections
                .iter()
                .map(|s| (s.final_label.as_str(), s.population))
                .collect();

            let mut placed = 0;
            for course_section in &outcome.course_sections {
                prop_assert!(course_section.population <= 40);
                let members: u32 = course_section
                    .member_sections
                    .iter()
                    .map(|label| by_label[label.as_str()])
                    .sum();
                prop_assert_eq!(course_section.population, members);
                placed += course_section.member_sections.len();
            }
            prop_assert_eq!(placed, sections.len());
        }
    }
}
