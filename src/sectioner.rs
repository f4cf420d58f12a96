//! Stage 1: split each program/year forecast into capped, balanced sections.

use std::collections::HashMap;

use crate::models::{section_letter, EnrollmentForecast, Program, ProgramSection};

/// Number of sections needed for `enrolled` students under `cap`.
pub fn section_count(enrolled: u32, cap: u32) -> u32 {
    if cap == 0 {
        return 0;
    }
    enrolled.div_ceil(cap)
}

/// Balanced populations: the first `enrolled % count` sections get one extra student.
pub fn balanced_populations(enrolled: u32, cap: u32) -> Vec<u32> {
    let count = section_count(enrolled, cap);
    if count == 0 {
        return Vec::new();
    }
    let base = enrolled / count;
    let remainder = enrolled % count;
    (0..count)
        .map(|i| if i < remainder { base + 1 } else { base })
        .collect()
}

/// Forecast rows whose program has no program row are skipped, since the
/// priority index and department come from the program table.
pub fn section_forecasts(
    forecasts: &[EnrollmentForecast],
    programs: &[Program],
    cap: u32,
) -> Vec<ProgramSection> {
    let by_abbr: HashMap<&str, &Program> = programs
        .iter()
        .map(|program| (program.abbreviation.as_str(), program))
        .collect();

    let mut sections = Vec::new();
    for forecast in forecasts {
        let Some(program) = by_abbr.get(forecast.program.as_str()) else {
            tracing::warn!(
                program = %forecast.program,
                year = forecast.year,
                "forecast row has no matching program, skipped"
            );
            continue;
        };

        for (index, population) in balanced_populations(forecast.enrolled_count, cap)
            .into_iter()
            .enumerate()
        {
            let group_letter = section_letter(index);
            sections.push(ProgramSection {
                program: forecast.program.clone(),
                department: program.department.clone(),
                year: forecast.year,
                final_label: format!("{}-{}-{}", forecast.program, forecast.year, group_letter),
                group_letter,
                population,
                priority_index: program.priority_index,
            });
        }
    }
    sections
}
