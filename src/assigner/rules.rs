//! Room eligibility, meeting requirements and processing priority.

use crate::models::{CourseSection, DayPattern, Room, RoomSize};

pub const PATHFIT: &str = "PATHFIT";
pub const FLAGSHIP_DEPARTMENT: &str = "CSITE";
pub const DEPARTMENT_GROUP: [&str; 3] = ["SLA", "SMA", "SED"];
/// Course types that follow departmental room rules.
pub const DEPARTMENTAL_TYPES: [&str; 6] = ["MSC", "ELEC", "MISC", "CMP", "CAE", "PEC"];
/// Course types that lift department-group sections into the second tier.
pub const TIER_TWO_TYPES: [&str; 3] = ["MSC", "ELEC", "MISC"];
pub const GENERAL_EDUCATION_TYPES: [&str; 4] = ["NGEC", "GEELECT", "NSTP", "CC"];
pub const PATHFIT_ROOM_PREFIX: &str = "MPCC";

/// Which rooms a course-section may use.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RoomFilter {
    /// Lecture rooms used as lecture rooms.
    Lecture,
    Gym,
    /// Any room whose function is listed.
    Functions(&'static [&'static str]),
    /// Rooms whose function is listed, or any LEC-type room.
    FunctionsOrLecture(&'static [&'static str]),
    /// LAB rooms whose function is listed, or any LEC-type room.
    LabFunctionsOrLecture(&'static [&'static str]),
    /// LAB rooms owned by the program, or any LEC-type room.
    OwnedLabOrLecture(&'static str),
}

impl RoomFilter {
    pub fn admits(&self, room: &Room) -> bool {
        let lecture_type = room.room_type == "LEC";
        match self {
            RoomFilter::Lecture => lecture_type && room.function == "LEC",
            RoomFilter::Gym => {
                room.room_type == "GYM"
                    && room.function == PATHFIT
                    && room.code.starts_with(PATHFIT_ROOM_PREFIX)
            }
            RoomFilter::Functions(functions) => functions.contains(&room.function.as_str()),
            RoomFilter::FunctionsOrLecture(functions) => {
                functions.contains(&room.function.as_str()) || lecture_type
            }
            RoomFilter::LabFunctionsOrLecture(functions) => {
                (room.room_type == "LAB" && functions.contains(&room.function.as_str()))
                    || lecture_type
            }
            RoomFilter::OwnedLabOrLecture(program) => {
                (room.room_type == "LAB" && room.program_owner.as_deref() == Some(*program))
                    || lecture_type
            }
        }
    }
}

/// Room filter for flagship-department programs, checked in this order.
const PROGRAM_FILTERS: [(&str, RoomFilter); 8] = [
    ("BSCS", RoomFilter::Functions(&["ADVANCED", "RESEARCH", "BASIC"])),
    ("BSIT", RoomFilter::FunctionsOrLecture(&["BASIC", "ADVANCED"])),
    ("BSNMCA", RoomFilter::FunctionsOrLecture(&["ANIMATION", "LEC"])),
    ("BSMATH", RoomFilter::OwnedLabOrLecture("BSMATH")),
    ("BSECE", RoomFilter::LabFunctionsOrLecture(&["ELECTRONICS", "ENGINEERING"])),
    ("BSCPE", RoomFilter::LabFunctionsOrLecture(&["ADVANCED", "ENGINEERING"])),
    ("BSCE", RoomFilter::Lecture),
    ("BSBME", RoomFilter::Lecture),
];

/// Preferred room functions per program; matching rooms are tried first.
const PROGRAM_AFFINITY: [(&str, &[&str]); 5] = [
    ("BSNMCA", &["ANIMATION"]),
    ("BSCS", &["ADVANCED", "BASIC"]),
    ("BSIT", &["BASIC", "ADVANCED"]),
    ("BSECE", &["ELECTRONICS", "ENGINEERING"]),
    ("BSCPE", &["ADVANCED", "ENGINEERING"]),
];

/// True when any member program prefers this room.
pub fn is_program_affine(section: &CourseSection, room: &Room) -> bool {
    let by_function = PROGRAM_AFFINITY.iter().any(|(program, functions)| {
        section.has_program(program) && functions.contains(&room.function.as_str())
    });
    let math_lab = section.has_program("BSMATH")
        && room.function == "LAB"
        && room.program_owner.as_deref() == Some("BSMATH");
    by_function || math_lab
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MeetingRequirement {
    pub duration_minutes: u32,
    pub pattern: DayPattern,
    pub filter: RoomFilter,
}

/// Why a course-section produced no candidate at all.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequirementGap {
    UnsupportedUnits(i32),
    NoRoomRule,
}

fn paired_by_units(units: i32, filter: RoomFilter) -> Result<MeetingRequirement, RequirementGap> {
    let duration_minutes = match units {
        3 => 80,
        6 => 170,
        other => return Err(RequirementGap::UnsupportedUnits(other)),
    };
    Ok(MeetingRequirement {
        duration_minutes,
        pattern: DayPattern::Paired,
        filter,
    })
}

pub fn requirement_for(section: &CourseSection) -> Result<MeetingRequirement, RequirementGap> {
    let course_type = section.course_type.as_str();
    let department = section.department.as_str();

    if course_type == PATHFIT {
        return Ok(MeetingRequirement {
            duration_minutes: 120,
            pattern: DayPattern::Single,
            filter: RoomFilter::Gym,
        });
    }

    if DEPARTMENTAL_TYPES.contains(&course_type) {
        if DEPARTMENT_GROUP.contains(&department) {
            return paired_by_units(section.units, RoomFilter::Lecture);
        }
        if department == FLAGSHIP_DEPARTMENT {
            return PROGRAM_FILTERS
                .iter()
                .find(|(program, _)| section.has_program(program))
                .ok_or(RequirementGap::NoRoomRule)
                .and_then(|(_, filter)| paired_by_units(section.units, filter.clone()));
        }
    }

    if GENERAL_EDUCATION_TYPES.contains(&course_type) {
        return paired_by_units(section.units, RoomFilter::Lecture);
    }

    Err(RequirementGap::NoRoomRule)
}

/// Processing tier; lower tiers are scheduled first.
pub fn priority_tier(section: &CourseSection) -> u8 {
    let department = section.department.as_str();
    if section.course_type == PATHFIT {
        1
    } else if DEPARTMENT_GROUP.contains(&department)
        && TIER_TWO_TYPES.contains(&section.course_type.as_str())
    {
        2
    } else if department == FLAGSHIP_DEPARTMENT {
        3
    } else {
        4
    }
}

/// Room sizes in preference order for a population.
pub fn size_preference(population: u32) -> [RoomSize; 3] {
    if population <= 10 {
        [RoomSize::Small, RoomSize::Medium, RoomSize::Large]
    } else if population <= 25 {
        [RoomSize::Medium, RoomSize::Small, RoomSize::Large]
    } else {
        [RoomSize::Large, RoomSize::Medium, RoomSize::Small]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn course_section(department: &str, course_type: &str, units: i32, programs: &[&str]) -> CourseSection {
        CourseSection {
            ordinal: 0,
            label: "X-1-A".to_string(),
            course_code: "X".to_string(),
            year: 1,
            department: department.to_string(),
            course_type: course_type.to_string(),
            units,
            semester: 1,
            member_sections: programs.iter().map(|p| format!("{p}-1-A")).collect(),
            member_programs: programs.iter().map(|p| p.to_string()).collect(),
            population: 30,
        }
    }

    fn room(code: &str, room_type: &str, function: &str, owner: Option<&str>) -> Room {
        Room {
            code: code.to_string(),
            building: "Main".to_string(),
            room_type: room_type.to_string(),
            function: function.to_string(),
            capacity: 40,
            size: RoomSize::Large,
            department_owner: None,
            program_owner: owner.map(str::to_string),
        }
    }

    #[test]
    fn units_drive_duration() {
        let three = requirement_for(&course_section("SLA", "MSC", 3, &["BAPSY"])).unwrap();
        assert_eq!(three.duration_minutes, 80);
        assert_eq!(three.pattern, DayPattern::Paired);
        let six = requirement_for(&course_section("SLA", "MSC", 6, &["BAPSY"])).unwrap();
        assert_eq!(six.duration_minutes, 170);
        assert_eq!(
            requirement_for(&course_section("SLA", "MSC", 2, &["BAPSY"])),
            Err(RequirementGap::UnsupportedUnits(2))
        );
    }

    #[test]
    fn pathfit_meets_once_a_week_in_the_gym() {
        let requirement = requirement_for(&course_section("SLA", PATHFIT, 2, &["BAPSY"])).unwrap();
        assert_eq!(requirement.duration_minutes, 120);
        assert_eq!(requirement.pattern, DayPattern::Single);
        assert!(requirement.filter.admits(&room("MPCC-1", "GYM", "PATHFIT", None)));
        assert!(!requirement.filter.admits(&room("GYM-2", "GYM", "PATHFIT", None)));
    }

    #[test]
    fn flagship_programs_pick_their_room_filter() {
        let bscs = requirement_for(&course_section("CSITE", "MSC", 3, &["BSCS"])).unwrap();
        assert!(bscs.filter.admits(&room("L1", "LAB", "RESEARCH", None)));
        assert!(!bscs.filter.admits(&room("R1", "LEC", "LEC", None)));

        let bsit = requirement_for(&course_section("CSITE", "MSC", 3, &["BSIT"])).unwrap();
        assert!(bsit.filter.admits(&room("R1", "LEC", "LEC", None)));

        let bsmath = requirement_for(&course_section("CSITE", "ELEC", 3, &["BSMATH"])).unwrap();
        assert!(bsmath.filter.admits(&room("M1", "LAB", "LAB", Some("BSMATH"))));
        assert!(!bsmath.filter.admits(&room("M2", "LAB", "LAB", Some("BSCS"))));

        assert_eq!(
            requirement_for(&course_section("CSITE", "MSC", 3, &["BSXX"])),
            Err(RequirementGap::NoRoomRule)
        );
    }

    #[test]
    fn unknown_type_has_no_rule() {
        assert_eq!(
            requirement_for(&course_section("SBA", "MAJOR", 3, &["BSBA"])),
            Err(RequirementGap::NoRoomRule)
        );
        assert_eq!(
            requirement_for(&course_section("SBA", "MSC", 3, &["BSBA"])),
            Err(RequirementGap::NoRoomRule)
        );
    }

    #[test]
    fn affinity_matches_any_member_program() {
        let mixed = course_section("CSITE", "MSC", 3, &["BSIT", "BSNMCA"]);
        assert!(is_program_affine(&mixed, &room("A1", "LAB", "ANIMATION", None)));
        assert!(is_program_affine(&mixed, &room("B1", "LAB", "BASIC", None)));
        assert!(!is_program_affine(&mixed, &room("R1", "LEC", "LEC", None)));
    }

    #[test]
    fn tiers_follow_fixed_order() {
        assert_eq!(priority_tier(&course_section("CSITE", PATHFIT, 2, &["BSCS"])), 1);
        assert_eq!(priority_tier(&course_section("SED", "ELEC", 3, &["BSED"])), 2);
        assert_eq!(priority_tier(&course_section("SED", "CMP", 3, &["BSED"])), 4);
        assert_eq!(priority_tier(&course_section("CSITE", "NGEC", 3, &["BSCS"])), 3);
        assert_eq!(priority_tier(&course_section("SBA", "NGEC", 3, &["BSBA"])), 4);
    }

    #[test]
    fn size_preference_tracks_population() {
        assert_eq!(size_preference(10)[0], RoomSize::Small);
        assert_eq!(size_preference(11)[0], RoomSize::Medium);
        assert_eq!(size_preference(25)[0], RoomSize::Medium);
        assert_eq!(size_preference(26)[0], RoomSize::Large);
    }
}
