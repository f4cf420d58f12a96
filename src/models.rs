use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveTime, Timelike, Utc, Weekday};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnrollmentForecast {
    pub program: String,
    pub department: String,
    pub year: i32,
    pub enrolled_count: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Program {
    pub abbreviation: String,
    pub name: String,
    pub department: String,
    pub priority_index: i32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgramSection {
    pub program: String,
    pub department: String,
    pub year: i32,
    pub group_letter: String,
    pub final_label: String,
    pub population: u32,
    pub priority_index: i32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProspectusCourse {
    pub program: String,
    pub department: String,
    pub year: i32,
    pub course_code: String,
    pub title: String,
    pub units: i32,
    pub semester: i32,
    pub course_type: String,
}

/// A merged teaching group for one course and year level.
///
/// `ordinal` is the creation order within a merge run and is the section's
/// identity; `label` may repeat across departments.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CourseSection {
    pub ordinal: u32,
    pub label: String,
    pub course_code: String,
    pub year: i32,
    pub department: String,
    pub course_type: String,
    pub units: i32,
    pub semester: i32,
    pub member_sections: Vec<String>,
    pub member_programs: Vec<String>,
    pub population: u32,
}

impl CourseSection {
    pub fn members_display(&self) -> String {
        self.member_sections.join(", ")
    }

    pub fn has_program(&self, program: &str) -> bool {
        self.member_programs.iter().any(|p| p == program)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RoomSize {
    Small,
    Medium,
    Large,
}

impl RoomSize {
    pub fn code(self) -> &'static str {
        match self {
            RoomSize::Small => "S",
            RoomSize::Medium => "M",
            RoomSize::Large => "L",
        }
    }
}

impl FromStr for RoomSize {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_uppercase().as_str() {
            "S" | "SMALL" => Ok(RoomSize::Small),
            "M" | "MEDIUM" => Ok(RoomSize::Medium),
            "L" | "LARGE" => Ok(RoomSize::Large),
            other => Err(format!("unknown room size '{other}'")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Room {
    pub code: String,
    pub building: String,
    pub room_type: String,
    pub function: String,
    pub capacity: u32,
    pub size: RoomSize,
    pub department_owner: Option<String>,
    pub program_owner: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeSlot {
    pub key: i32,
    pub start: NaiveTime,
    pub end: NaiveTime,
    pub duration_minutes: u32,
}

impl TimeSlot {
    pub fn window(&self) -> Window {
        Window::new(minutes_of(self.start), minutes_of(self.end))
    }

    pub fn display_range(&self) -> String {
        format!("{} - {}", clock_label(self.start), clock_label(self.end))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DayPattern {
    Single,
    Paired,
}

impl DayPattern {
    pub fn as_str(self) -> &'static str {
        match self {
            DayPattern::Single => "Single",
            DayPattern::Paired => "Pair",
        }
    }
}

impl FromStr for DayPattern {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "single" => Ok(DayPattern::Single),
            "pair" | "paired" => Ok(DayPattern::Paired),
            other => Err(format!("unknown day pattern '{other}'")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DaySlot {
    pub key: i32,
    pub abbreviation: String,
    pub long_name: String,
    pub pattern: DayPattern,
    pub weekdays: Vec<Weekday>,
}

/// Resolves a day-slot abbreviation to its constituent weekdays.
pub fn weekdays_for_abbreviation(abbreviation: &str) -> Option<Vec<Weekday>> {
    let days = match abbreviation.trim() {
        "M" => vec![Weekday::Mon],
        "T" => vec![Weekday::Tue],
        "W" => vec![Weekday::Wed],
        "Th" => vec![Weekday::Thu],
        "F" => vec![Weekday::Fri],
        "S" => vec![Weekday::Sat],
        "MTh" => vec![Weekday::Mon, Weekday::Thu],
        "TF" => vec![Weekday::Tue, Weekday::Fri],
        "WS" => vec![Weekday::Wed, Weekday::Sat],
        _ => return None,
    };
    Some(days)
}

/// Half-open time window in minutes since midnight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Window {
    pub start: u32,
    pub end: u32,
}

impl Window {
    pub fn new(start: u32, end: u32) -> Self {
        Self { start, end }
    }

    pub fn minutes(&self) -> u32 {
        self.end.saturating_sub(self.start)
    }

    pub fn overlaps(&self, other: &Window) -> bool {
        !(self.end <= other.start || self.start >= other.end)
    }

    /// True when the windows overlap or the gap between them is shorter than `min_break`.
    pub fn chains_with(&self, other: &Window, min_break: u32) -> bool {
        if self.overlaps(other) {
            return true;
        }
        let gap = if other.start >= self.end {
            other.start - self.end
        } else {
            self.start - other.end
        };
        gap < min_break
    }

    pub fn span(&self, other: &Window) -> Window {
        Window::new(self.start.min(other.start), self.end.max(other.end))
    }
}

impl fmt::Display for Window {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:02}:{:02}-{:02}:{:02}",
            self.start / 60,
            self.start % 60,
            self.end / 60,
            self.end % 60
        )
    }
}

pub fn minutes_of(time: NaiveTime) -> u32 {
    time.num_seconds_from_midnight() / 60
}

pub fn clock_label(time: NaiveTime) -> String {
    time.format("%-I:%M %p").to_string()
}

/// Parses `8:00 AM`, `08:00 PM`, `14:30` or `14:30:00`.
pub fn parse_clock(value: &str) -> Option<NaiveTime> {
    let value = value.trim();
    ["%I:%M %p", "%H:%M", "%H:%M:%S"]
        .iter()
        .find_map(|format| NaiveTime::parse_from_str(value, format).ok())
}

/// Sequential letters: A..Z, then AA, AB, ...
pub fn section_letter(index: usize) -> String {
    let mut n = index + 1;
    let mut letters = Vec::new();
    while n > 0 {
        let rem = (n - 1) % 26;
        letters.push(b'A' + rem as u8);
        n = (n - 1) / 26;
    }
    letters.reverse();
    String::from_utf8_lossy(&letters).into_owned()
}

/// Record written the moment a candidate is accepted, before the final row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecisionRecord {
    pub run_id: Uuid,
    pub course_section: String,
    pub room_code: String,
    pub day_abbr: String,
    pub start: NaiveTime,
    pub end: NaiveTime,
    pub decided_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Assignment {
    pub run_id: Uuid,
    pub course_section: String,
    pub program_sections: String,
    pub population: u32,
    pub department: String,
    pub course_type: String,
    pub room_code: String,
    pub day_abbr: String,
    pub start: NaiveTime,
    pub end: NaiveTime,
    pub year: i32,
    pub display_range: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReferenceData {
    pub forecasts: Vec<EnrollmentForecast>,
    pub programs: Vec<Program>,
    pub prospectus: Vec<ProspectusCourse>,
    pub rooms: Vec<Room>,
    pub time_slots: Vec<TimeSlot>,
    pub day_slots: Vec<DaySlot>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn letters_roll_over_past_z() {
        assert_eq!(section_letter(0), "A");
        assert_eq!(section_letter(25), "Z");
        assert_eq!(section_letter(26), "AA");
        assert_eq!(section_letter(27), "AB");
    }

    #[test]
    fn parses_twelve_and_twenty_four_hour_clocks() {
        let morning = parse_clock("8:00 AM").unwrap();
        assert_eq!(minutes_of(morning), 480);
        assert_eq!(parse_clock("13:30"), NaiveTime::from_hms_opt(13, 30, 0));
        assert_eq!(clock_label(NaiveTime::from_hms_opt(13, 30, 0).unwrap()), "1:30 PM");
        assert!(parse_clock("noon").is_none());
    }

    #[test]
    fn chaining_uses_strict_break_threshold() {
        let first = Window::new(480, 560);
        assert!(first.chains_with(&Window::new(570, 650), 80));
        assert!(first.chains_with(&Window::new(639, 719), 80));
        assert!(!first.chains_with(&Window::new(640, 720), 80));
        assert!(Window::new(640, 720).chains_with(&Window::new(400, 561), 80));
    }

    #[test]
    fn paired_abbreviations_expand_to_two_weekdays() {
        assert_eq!(
            weekdays_for_abbreviation("MTh"),
            Some(vec![Weekday::Mon, Weekday::Thu])
        );
        assert_eq!(weekdays_for_abbreviation("Th"), Some(vec![Weekday::Thu]));
        assert_eq!(weekdays_for_abbreviation("Su"), None);
    }
}
