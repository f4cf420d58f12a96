//! CSV loading of the six reference tables.
//!
//! Rows are validated into typed records here, so the stages never see
//! malformed times, unknown day abbreviations or negative counts.

use std::io::Read;
use std::path::Path;
use std::str::FromStr;

use anyhow::{bail, Context};
use serde::de::DeserializeOwned;
use serde::Deserialize;

use crate::models::{
    minutes_of, parse_clock, weekdays_for_abbreviation, DayPattern, DaySlot, EnrollmentForecast,
    Program, ProspectusCourse, ReferenceData, Room, RoomSize, TimeSlot,
};
use crate::store::ReferenceTable;

impl ReferenceTable {
    pub fn file_name(self) -> &'static str {
        match self {
            ReferenceTable::Forecast => "forecast.csv",
            ReferenceTable::Programs => "programs.csv",
            ReferenceTable::Prospectus => "prospectus.csv",
            ReferenceTable::Rooms => "rooms.csv",
            ReferenceTable::Timeslots => "timeslots.csv",
            ReferenceTable::Days => "days.csv",
        }
    }

    pub fn all() -> [ReferenceTable; 6] {
        [
            ReferenceTable::Forecast,
            ReferenceTable::Programs,
            ReferenceTable::Prospectus,
            ReferenceTable::Rooms,
            ReferenceTable::Timeslots,
            ReferenceTable::Days,
        ]
    }
}

#[derive(Deserialize)]
struct ForecastRow {
    #[serde(rename = "PROGRAM")]
    program: String,
    #[serde(rename = "DEPARTMENT")]
    department: String,
    #[serde(rename = "YEAR")]
    year: i32,
    #[serde(rename = "ENROLLED COUNT")]
    enrolled_count: u32,
}

#[derive(Deserialize)]
struct ProgramRow {
    #[serde(rename = "PROGRAM ABBREVIATION")]
    abbreviation: String,
    #[serde(rename = "PROGRAM NAME")]
    name: String,
    #[serde(rename = "DEPARTMENT")]
    department: String,
    #[serde(rename = "PRIORITY INDEX")]
    priority_index: i32,
}

#[derive(Deserialize)]
struct ProspectusRow {
    #[serde(rename = "PROGRAM ABBREVIATION")]
    program: String,
    #[serde(rename = "DEPARTMENT")]
    department: String,
    #[serde(rename = "YEAR")]
    year: i32,
    #[serde(rename = "COURSE CODE")]
    course_code: String,
    #[serde(rename = "COURSE TITLE")]
    title: String,
    #[serde(rename = "UNITS")]
    units: i32,
    #[serde(rename = "SEMESTER")]
    semester: i32,
    #[serde(rename = "TYPE")]
    course_type: String,
}

#[derive(Deserialize)]
struct RoomRow {
    #[serde(rename = "ROOM CODE")]
    code: String,
    #[serde(rename = "BUILDING")]
    building: String,
    #[serde(rename = "CAPACITY")]
    capacity: u32,
    #[serde(rename = "SIZE")]
    size: String,
    #[serde(rename = "TYPE")]
    room_type: String,
    #[serde(rename = "FUNCTION")]
    function: String,
    #[serde(rename = "DEPARTMENT OWNER", default)]
    department_owner: Option<String>,
    #[serde(rename = "PROGRAM OWNER", default)]
    program_owner: Option<String>,
}

#[derive(Deserialize)]
struct TimeSlotRow {
    #[serde(rename = "KEY")]
    key: i32,
    #[serde(rename = "START TIME")]
    start: String,
    #[serde(rename = "END TIME")]
    end: String,
    #[serde(rename = "DURATION")]
    duration: u32,
}

#[derive(Deserialize)]
struct DaySlotRow {
    #[serde(rename = "KEY")]
    key: i32,
    #[serde(rename = "DAY ABBREVIATION")]
    abbreviation: String,
    #[serde(rename = "DAY LONG")]
    long_name: String,
    #[serde(rename = "DAY TYPE")]
    pattern: String,
}

fn read_rows<T: DeserializeOwned, R: Read>(reader: R, table: &str) -> anyhow::Result<Vec<T>> {
    let mut csv_reader = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);
    let mut rows = Vec::new();
    for (index, result) in csv_reader.deserialize::<T>().enumerate() {
        let row = result.with_context(|| format!("{table}: row {} is malformed", index + 1))?;
        rows.push(row);
    }
    Ok(rows)
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

pub fn read_forecasts<R: Read>(reader: R) -> anyhow::Result<Vec<EnrollmentForecast>> {
    Ok(read_rows::<ForecastRow, _>(reader, "forecast")?
        .into_iter()
        .map(|row| EnrollmentForecast {
            program: row.program,
            department: row.department,
            year: row.year,
            enrolled_count: row.enrolled_count,
        })
        .collect())
}

pub fn read_programs<R: Read>(reader: R) -> anyhow::Result<Vec<Program>> {
    Ok(read_rows::<ProgramRow, _>(reader, "programs")?
        .into_iter()
        .map(|row| Program {
            abbreviation: row.abbreviation,
            name: row.name,
            department: row.department,
            priority_index: row.priority_index,
        })
        .collect())
}

pub fn read_prospectus<R: Read>(reader: R) -> anyhow::Result<Vec<ProspectusCourse>> {
    Ok(read_rows::<ProspectusRow, _>(reader, "prospectus")?
        .into_iter()
        .map(|row| ProspectusCourse {
            program: row.program,
            department: row.department,
            year: row.year,
            course_code: row.course_code,
            title: row.title,
            units: row.units,
            semester: row.semester,
            course_type: row.course_type,
        })
        .collect())
}

pub fn read_rooms<R: Read>(reader: R) -> anyhow::Result<Vec<Room>> {
    read_rows::<RoomRow, _>(reader, "rooms")?
        .into_iter()
        .map(|row| -> anyhow::Result<Room> {
            let size = RoomSize::from_str(&row.size)
                .map_err(anyhow::Error::msg)
                .with_context(|| format!("rooms: {}", row.code))?;
            Ok(Room {
                code: row.code,
                building: row.building,
                room_type: row.room_type,
                function: row.function,
                capacity: row.capacity,
                size,
                department_owner: non_empty(row.department_owner),
                program_owner: non_empty(row.program_owner),
            })
        })
        .collect()
}

pub fn read_time_slots<R: Read>(reader: R) -> anyhow::Result<Vec<TimeSlot>> {
    read_rows::<TimeSlotRow, _>(reader, "timeslots")?
        .into_iter()
        .map(|row| -> anyhow::Result<TimeSlot> {
            let start = parse_clock(&row.start)
                .with_context(|| format!("timeslots: key {} has bad start '{}'", row.key, row.start))?;
            let end = parse_clock(&row.end)
                .with_context(|| format!("timeslots: key {} has bad end '{}'", row.key, row.end))?;
            if end <= start {
                bail!("timeslots: key {} ends before it starts", row.key);
            }
            let span = minutes_of(end) - minutes_of(start);
            if span != row.duration {
                bail!(
                    "timeslots: key {} spans {span} minutes but declares {}",
                    row.key,
                    row.duration
                );
            }
            Ok(TimeSlot {
                key: row.key,
                start,
                end,
                duration_minutes: row.duration,
            })
        })
        .collect()
}

pub fn read_day_slots<R: Read>(reader: R) -> anyhow::Result<Vec<DaySlot>> {
    read_rows::<DaySlotRow, _>(reader, "days")?
        .into_iter()
        .map(|row| -> anyhow::Result<DaySlot> {
            let pattern = DayPattern::from_str(&row.pattern)
                .map_err(anyhow::Error::msg)
                .with_context(|| format!("days: {}", row.abbreviation))?;
            let weekdays = weekdays_for_abbreviation(&row.abbreviation)
                .with_context(|| format!("days: unknown abbreviation '{}'", row.abbreviation))?;
            let expected = match pattern {
                DayPattern::Single => 1,
                DayPattern::Paired => 2,
            };
            if weekdays.len() != expected {
                bail!(
                    "days: '{}' names {} weekdays but is marked {}",
                    row.abbreviation,
                    weekdays.len(),
                    pattern.as_str()
                );
            }
            Ok(DaySlot {
                key: row.key,
                abbreviation: row.abbreviation,
                long_name: row.long_name,
                pattern,
                weekdays,
            })
        })
        .collect()
}

/// Reads one reference table into an otherwise empty [`ReferenceData`].
pub fn read_table<R: Read>(table: ReferenceTable, reader: R) -> anyhow::Result<ReferenceData> {
    let mut data = ReferenceData::default();
    match table {
        ReferenceTable::Forecast => data.forecasts = read_forecasts(reader)?,
        ReferenceTable::Programs => data.programs = read_programs(reader)?,
        ReferenceTable::Prospectus => data.prospectus = read_prospectus(reader)?,
        ReferenceTable::Rooms => data.rooms = read_rooms(reader)?,
        ReferenceTable::Timeslots => data.time_slots = read_time_slots(reader)?,
        ReferenceTable::Days => data.day_slots = read_day_slots(reader)?,
    }
    Ok(data)
}

pub fn read_table_file(table: ReferenceTable, path: &Path) -> anyhow::Result<ReferenceData> {
    let file = std::fs::File::open(path)
        .with_context(|| format!("failed to open {}", path.display()))?;
    read_table(table, file)
}

/// Loads every reference table from `<dir>/<table>.csv`.
pub fn read_directory(dir: &Path) -> anyhow::Result<ReferenceData> {
    let mut data = ReferenceData::default();
    for table in ReferenceTable::all() {
        let part = read_table_file(table, &dir.join(table.file_name()))?;
        data.forecasts.extend(part.forecasts);
        data.programs.extend(part.programs);
        data.prospectus.extend(part.prospectus);
        data.rooms.extend(part.rooms);
        data.time_slots.extend(part.time_slots);
        data.day_slots.extend(part.day_slots);
    }
    Ok(data)
}
