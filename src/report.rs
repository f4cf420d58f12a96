use std::collections::BTreeMap;
use std::fmt::Write;

use crate::models::Assignment;
use crate::pipeline::RunSummary;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoomLoad {
    pub room_code: String,
    pub bindings: usize,
    pub students: u32,
}

pub fn summarize_by_room(assignments: &[Assignment]) -> Vec<RoomLoad> {
    let mut map: BTreeMap<&str, (usize, u32)> = BTreeMap::new();
    for assignment in assignments {
        let entry = map.entry(assignment.room_code.as_str()).or_insert((0, 0));
        entry.0 += 1;
        entry.1 += assignment.population;
    }

    let mut loads: Vec<RoomLoad> = map
        .into_iter()
        .map(|(room_code, (bindings, students))| RoomLoad {
            room_code: room_code.to_string(),
            bindings,
            students,
        })
        .collect();
    loads.sort_by(|a, b| b.bindings.cmp(&a.bindings));
    loads
}

/// Classes per program section, ordered by day then start time.
pub fn timetable_by_cohort(assignments: &[Assignment]) -> BTreeMap<String, Vec<&Assignment>> {
    let mut cohorts: BTreeMap<String, Vec<&Assignment>> = BTreeMap::new();
    for assignment in assignments {
        for member in assignment.program_sections.split(", ").filter(|m| !m.is_empty()) {
            cohorts.entry(member.to_string()).or_default().push(assignment);
        }
    }
    for classes in cohorts.values_mut() {
        classes.sort_by(|a, b| (&a.day_abbr, a.start).cmp(&(&b.day_abbr, b.start)));
    }
    cohorts
}

pub fn build_report(summary: Option<&RunSummary>, assignments: &[Assignment]) -> String {
    let mut output = String::new();

    let _ = writeln!(output, "# Timetable Run Report");
    if let Some(summary) = summary {
        let _ = writeln!(
            output,
            "Semester {} (run {})",
            summary.assignment.semester, summary.assignment.run_id
        );
        let _ = writeln!(output);
        let _ = writeln!(output, "## Summary");
        let _ = writeln!(
            output,
            "- {} program sections from {} forecast rows ({} students)",
            summary.sectioning.program_sections,
            summary.sectioning.forecast_rows,
            summary.sectioning.students
        );
        let _ = writeln!(
            output,
            "- {} course sections from {} catalog rows ({} skipped without program sections)",
            summary.merging.course_sections,
            summary.merging.catalog_rows,
            summary.merging.skipped_cross_references
        );
        let _ = writeln!(
            output,
            "- {} scheduled, {} unscheduled",
            summary.assignment.scheduled,
            summary.assignment.unscheduled_count()
        );

        let _ = writeln!(output);
        let _ = writeln!(output, "## Unscheduled Course Sections");
        if summary.assignment.unscheduled.is_empty() {
            let _ = writeln!(output, "Every course section was scheduled.");
        } else {
            for item in &summary.assignment.unscheduled {
                let _ = writeln!(
                    output,
                    "- {} ({}, {} students): {}",
                    item.course_section, item.course_type, item.population, item.reason
                );
            }
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Room Load");
    let loads = summarize_by_room(assignments);
    if loads.is_empty() {
        let _ = writeln!(output, "No assignments recorded.");
    } else {
        for load in &loads {
            let _ = writeln!(
                output,
                "- {}: {} bindings ({} students)",
                load.room_code, load.bindings, load.students
            );
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Program Section Timetables");
    let cohorts = timetable_by_cohort(assignments);
    if cohorts.is_empty() {
        let _ = writeln!(output, "No assignments recorded.");
    }
    for (cohort, classes) in &cohorts {
        let _ = writeln!(output);
        let _ = writeln!(output, "### {cohort}");
        for class in classes {
            let _ = writeln!(
                output,
                "- {} {} in {}: {}",
                class.day_abbr, class.display_range, class.room_code, class.course_section
            );
        }
    }

    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SchedulingRules;
    use crate::pipeline::{run_all, sample};
    use crate::store::{MemoryStore, TimetableStore};
    use chrono::NaiveTime;
    use uuid::Uuid;

    fn assignment(label: &str, members: &str, room: &str, day: &str, hour: u32) -> Assignment {
        let start = NaiveTime::from_hms_opt(hour, 0, 0).unwrap();
        let end = NaiveTime::from_hms_opt(hour + 1, 20, 0).unwrap();
        Assignment {
            run_id: Uuid::nil(),
            course_section: label.to_string(),
            program_sections: members.to_string(),
            population: 30,
            department: "CSITE".to_string(),
            course_type: "NGEC".to_string(),
            room_code: room.to_string(),
            day_abbr: day.to_string(),
            start,
            end,
            year: 1,
            display_range: format!("{hour}:00 - {}:20", hour + 1),
        }
    }

    #[test]
    fn rooms_sorted_by_load() {
        let rows = vec![
            assignment("GE1-1-A", "BSCS-1-A", "R102", "MTh", 8),
            assignment("GE2-1-A", "BSCS-1-B", "R101", "MTh", 8),
            assignment("GE3-1-A", "BSCS-1-A", "R101", "TF", 10),
        ];
        let loads = summarize_by_room(&rows);
        assert_eq!(loads[0].room_code, "R101");
        assert_eq!(loads[0].bindings, 2);
        assert_eq!(loads[0].students, 60);
    }

    #[test]
    fn cohorts_list_their_classes_in_order() {
        let rows = vec![
            assignment("GE3-1-A", "BSCS-1-A, BSIT-1-A", "R101", "TF", 10),
            assignment("GE1-1-A", "BSCS-1-A", "R102", "MTh", 8),
        ];
        let cohorts = timetable_by_cohort(&rows);
        let bscs: Vec<&str> = cohorts["BSCS-1-A"]
            .iter()
            .map(|a| a.course_section.as_str())
            .collect();
        assert_eq!(bscs, vec!["GE1-1-A", "GE3-1-A"]);
        assert_eq!(cohorts["BSIT-1-A"].len(), 1);
    }

    #[tokio::test]
    async fn report_includes_summary_and_unscheduled() {
        let store = MemoryStore::with_reference(sample::reference());
        let summary = run_all(&store, 1, &SchedulingRules::default()).await.unwrap();
        let assignments = store.fetch_assignments().await.unwrap();
        let report = build_report(Some(&summary), &assignments);
        assert!(report.starts_with("# Timetable Run Report"));
        assert!(report.contains("## Unscheduled Course Sections"));
        assert!(report.contains("ED102-1-A (MAJOR, 35 students)"));
        assert!(report.contains("### BSCS-1-A"));
    }

    #[test]
    fn empty_report_says_so() {
        let report = build_report(None, &[]);
        assert!(report.contains("No assignments recorded."));
        assert!(!report.contains("## Summary"));
    }
}
