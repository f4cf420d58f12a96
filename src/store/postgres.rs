use std::str::FromStr;

use async_trait::async_trait;
use chrono::Weekday;
use sqlx::postgres::{PgPool, PgPoolOptions, PgRow};
use sqlx::{Postgres, Row, Transaction};

use super::{StoreError, StoreResult, TableCounts, TimetableStore};
use crate::config::DatabaseConfig;
use crate::models::{
    Assignment, CourseSection, DayPattern, DaySlot, DecisionRecord, EnrollmentForecast, Program,
    ProgramSection, ProspectusCourse, ReferenceData, Room, RoomSize, TimeSlot,
};

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub async fn connect(config: &DatabaseConfig) -> StoreResult<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .connect(&config.url)
            .await
            .map_err(|err| StoreError::Unavailable(err.to_string()))?;
        Ok(Self { pool })
    }

    pub async fn init_schema(&self) -> StoreResult<()> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|err| StoreError::Query(err.to_string()))?;
        Ok(())
    }

    async fn count(&self, table: &str) -> StoreResult<usize> {
        let count: i64 = sqlx::query(&format!("SELECT COUNT(*) AS n FROM timetable.{table}"))
            .fetch_one(&self.pool)
            .await?
            .try_get("n")?;
        Ok(count.max(0) as usize)
    }
}

fn non_negative(table: &'static str, column: &str, value: i32) -> StoreResult<u32> {
    u32::try_from(value)
        .map_err(|_| StoreError::invalid_row(table, format!("{column} is negative: {value}")))
}

fn int_column(table: &'static str, column: &str, value: u32) -> StoreResult<i32> {
    i32::try_from(value)
        .map_err(|_| StoreError::invalid_row(table, format!("{column} is too large: {value}")))
}

fn weekday_names(days: &[Weekday]) -> Vec<String> {
    days.iter().map(|day| day.to_string()).collect()
}

fn forecast_from_row(row: &PgRow) -> StoreResult<EnrollmentForecast> {
    Ok(EnrollmentForecast {
        program: row.try_get("program")?,
        department: row.try_get("department")?,
        year: row.try_get("year_level")?,
        enrolled_count: non_negative(
            "forecasted_enrollment",
            "enrolled_count",
            row.try_get("enrolled_count")?,
        )?,
    })
}

fn room_from_row(row: &PgRow) -> StoreResult<Room> {
    let size: String = row.try_get("size_tier")?;
    Ok(Room {
        code: row.try_get("room_code")?,
        building: row.try_get("building")?,
        room_type: row.try_get("room_type")?,
        function: row.try_get("room_function")?,
        capacity: non_negative("rooms", "capacity", row.try_get("capacity")?)?,
        size: RoomSize::from_str(&size).map_err(|reason| StoreError::invalid_row("rooms", reason))?,
        department_owner: row.try_get("department_owner")?,
        program_owner: row.try_get("program_owner")?,
    })
}

fn day_slot_from_row(row: &PgRow) -> StoreResult<DaySlot> {
    let pattern: String = row.try_get("pattern")?;
    let names: Vec<String> = row.try_get("weekdays")?;
    let weekdays = names
        .iter()
        .map(|name| {
            Weekday::from_str(name)
                .map_err(|_| StoreError::invalid_row("day_slots", format!("unknown weekday '{name}'")))
        })
        .collect::<StoreResult<Vec<_>>>()?;
    Ok(DaySlot {
        key: row.try_get("day_key")?,
        abbreviation: row.try_get("abbreviation")?,
        long_name: row.try_get("long_name")?,
        pattern: DayPattern::from_str(&pattern)
            .map_err(|reason| StoreError::invalid_row("day_slots", reason))?,
        weekdays,
    })
}

fn course_section_from_row(row: &PgRow) -> StoreResult<CourseSection> {
    Ok(CourseSection {
        ordinal: non_negative("course_sections", "ordinal", row.try_get("ordinal")?)?,
        label: row.try_get("label")?,
        course_code: row.try_get("course_code")?,
        year: row.try_get("year_level")?,
        department: row.try_get("department")?,
        course_type: row.try_get("course_type")?,
        units: row.try_get("units")?,
        semester: row.try_get("semester")?,
        member_sections: row.try_get("member_sections")?,
        member_programs: row.try_get("member_programs")?,
        population: non_negative("course_sections", "population", row.try_get("population")?)?,
    })
}

async fn replace_forecasts(
    tx: &mut Transaction<'_, Postgres>,
    rows: &[EnrollmentForecast],
) -> StoreResult<()> {
    sqlx::query("DELETE FROM timetable.forecasted_enrollment")
        .execute(&mut **tx)
        .await?;
    for row in rows {
        sqlx::query(
            r#"
            INSERT INTO timetable.forecasted_enrollment
            (program, department, year_level, enrolled_count)
            VALUES ($1, $2, $3, $4)
            "#,
        )
        .bind(&row.program)
        .bind(&row.department)
        .bind(row.year)
        .bind(int_column("forecasted_enrollment", "enrolled_count", row.enrolled_count)?)
        .execute(&mut **tx)
        .await?;
    }
    Ok(())
}

async fn replace_programs(tx: &mut Transaction<'_, Postgres>, rows: &[Program]) -> StoreResult<()> {
    sqlx::query("DELETE FROM timetable.program_departments")
        .execute(&mut **tx)
        .await?;
    for row in rows {
        sqlx::query(
            r#"
            INSERT INTO timetable.program_departments
            (program_abbr, program_name, department, priority_index)
            VALUES ($1, $2, $3, $4)
            "#,
        )
        .bind(&row.abbreviation)
        .bind(&row.name)
        .bind(&row.department)
        .bind(row.priority_index)
        .execute(&mut **tx)
        .await?;
    }
    Ok(())
}

async fn replace_prospectus(
    tx: &mut Transaction<'_, Postgres>,
    rows: &[ProspectusCourse],
) -> StoreResult<()> {
    sqlx::query("DELETE FROM timetable.prospectus")
        .execute(&mut **tx)
        .await?;
    for row in rows {
        sqlx::query(
            r#"
            INSERT INTO timetable.prospectus
            (program, department, year_level, course_code, course_title, units, semester, course_type)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(&row.program)
        .bind(&row.department)
        .bind(row.year)
        .bind(&row.course_code)
        .bind(&row.title)
        .bind(row.units)
        .bind(row.semester)
        .bind(&row.course_type)
        .execute(&mut **tx)
        .await?;
    }
    Ok(())
}

async fn replace_rooms(tx: &mut Transaction<'_, Postgres>, rows: &[Room]) -> StoreResult<()> {
    sqlx::query("DELETE FROM timetable.rooms")
        .execute(&mut **tx)
        .await?;
    for row in rows {
        sqlx::query(
            r#"
            INSERT INTO timetable.rooms
            (room_code, building, capacity, size_tier, room_type, room_function,
             department_owner, program_owner)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(&row.code)
        .bind(&row.building)
        .bind(int_column("rooms", "capacity", row.capacity)?)
        .bind(row.size.code())
        .bind(&row.room_type)
        .bind(&row.function)
        .bind(&row.department_owner)
        .bind(&row.program_owner)
        .execute(&mut **tx)
        .await?;
    }
    Ok(())
}

async fn replace_time_slots(
    tx: &mut Transaction<'_, Postgres>,
    rows: &[TimeSlot],
) -> StoreResult<()> {
    sqlx::query("DELETE FROM timetable.time_slots")
        .execute(&mut **tx)
        .await?;
    for row in rows {
        sqlx::query(
            r#"
            INSERT INTO timetable.time_slots (slot_key, start_time, end_time, duration_minutes)
            VALUES ($1, $2, $3, $4)
            "#,
        )
        .bind(row.key)
        .bind(row.start)
        .bind(row.end)
        .bind(int_column("time_slots", "duration_minutes", row.duration_minutes)?)
        .execute(&mut **tx)
        .await?;
    }
    Ok(())
}

async fn replace_day_slots(tx: &mut Transaction<'_, Postgres>, rows: &[DaySlot]) -> StoreResult<()> {
    sqlx::query("DELETE FROM timetable.day_slots")
        .execute(&mut **tx)
        .await?;
    for row in rows {
        sqlx::query(
            r#"
            INSERT INTO timetable.day_slots (day_key, abbreviation, long_name, pattern, weekdays)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(row.key)
        .bind(&row.abbreviation)
        .bind(&row.long_name)
        .bind(row.pattern.as_str())
        .bind(weekday_names(&row.weekdays))
        .execute(&mut **tx)
        .await?;
    }
    Ok(())
}

#[async_trait]
impl TimetableStore for PgStore {
    async fn health_check(&self) -> StoreResult<bool> {
        let one: i32 = sqlx::query("SELECT 1 AS one")
            .fetch_one(&self.pool)
            .await?
            .try_get("one")?;
        Ok(one == 1)
    }

    async fn table_counts(&self) -> StoreResult<TableCounts> {
        Ok(TableCounts {
            forecast: self.count("forecasted_enrollment").await?,
            programs: self.count("program_departments").await?,
            prospectus: self.count("prospectus").await?,
            rooms: self.count("rooms").await?,
            timeslots: self.count("time_slots").await?,
            days: self.count("day_slots").await?,
        })
    }

    async fn replace_reference_data(&self, data: &ReferenceData) -> StoreResult<()> {
        let mut tx = self.pool.begin().await?;
        if !data.forecasts.is_empty() {
            replace_forecasts(&mut tx, &data.forecasts).await?;
        }
        if !data.programs.is_empty() {
            replace_programs(&mut tx, &data.programs).await?;
        }
        if !data.prospectus.is_empty() {
            replace_prospectus(&mut tx, &data.prospectus).await?;
        }
        if !data.rooms.is_empty() {
            replace_rooms(&mut tx, &data.rooms).await?;
        }
        if !data.time_slots.is_empty() {
            replace_time_slots(&mut tx, &data.time_slots).await?;
        }
        if !data.day_slots.is_empty() {
            replace_day_slots(&mut tx, &data.day_slots).await?;
        }
        tx.commit().await?;
        Ok(())
    }

    async fn fetch_forecasts(&self) -> StoreResult<Vec<EnrollmentForecast>> {
        let rows = sqlx::query(
            "SELECT program, department, year_level, enrolled_count \
             FROM timetable.forecasted_enrollment ORDER BY id",
        )
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(forecast_from_row).collect()
    }

    async fn fetch_programs(&self) -> StoreResult<Vec<Program>> {
        let rows = sqlx::query(
            "SELECT program_abbr, program_name, department, priority_index \
             FROM timetable.program_departments ORDER BY priority_index, program_abbr",
        )
        .fetch_all(&self.pool)
        .await?;
        let mut programs = Vec::with_capacity(rows.len());
        for row in rows {
            programs.push(Program {
                abbreviation: row.try_get("program_abbr")?,
                name: row.try_get("program_name")?,
                department: row.try_get("department")?,
                priority_index: row.try_get("priority_index")?,
            });
        }
        Ok(programs)
    }

    async fn fetch_prospectus(&self, semester: i32) -> StoreResult<Vec<ProspectusCourse>> {
        let rows = sqlx::query(
            "SELECT program, department, year_level, course_code, course_title, units, \
             semester, course_type FROM timetable.prospectus WHERE semester = $1 ORDER BY id",
        )
        .bind(semester)
        .fetch_all(&self.pool)
        .await?;
        let mut courses = Vec::with_capacity(rows.len());
        for row in rows {
            courses.push(ProspectusCourse {
                program: row.try_get("program")?,
                department: row.try_get("department")?,
                year: row.try_get("year_level")?,
                course_code: row.try_get("course_code")?,
                title: row.try_get("course_title")?,
                units: row.try_get("units")?,
                semester: row.try_get("semester")?,
                course_type: row.try_get("course_type")?,
            });
        }
        Ok(courses)
    }

    async fn fetch_rooms(&self) -> StoreResult<Vec<Room>> {
        let rows = sqlx::query(
            "SELECT room_code, building, capacity, size_tier, room_type, room_function, \
             department_owner, program_owner FROM timetable.rooms ORDER BY room_code",
        )
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(room_from_row).collect()
    }

    async fn fetch_time_slots(&self) -> StoreResult<Vec<TimeSlot>> {
        let rows = sqlx::query(
            "SELECT slot_key, start_time, end_time, duration_minutes \
             FROM timetable.time_slots ORDER BY slot_key",
        )
        .fetch_all(&self.pool)
        .await?;
        let mut slots = Vec::with_capacity(rows.len());
        for row in rows {
            slots.push(TimeSlot {
                key: row.try_get("slot_key")?,
                start: row.try_get("start_time")?,
                end: row.try_get("end_time")?,
                duration_minutes: non_negative(
                    "time_slots",
                    "duration_minutes",
                    row.try_get("duration_minutes")?,
                )?,
            });
        }
        Ok(slots)
    }

    async fn fetch_day_slots(&self) -> StoreResult<Vec<DaySlot>> {
        let rows = sqlx::query(
            "SELECT day_key, abbreviation, long_name, pattern, weekdays \
             FROM timetable.day_slots ORDER BY day_key",
        )
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(day_slot_from_row).collect()
    }

    async fn fetch_program_sections(&self) -> StoreResult<Vec<ProgramSection>> {
        let rows = sqlx::query(
            "SELECT program, department, year_level, section_group, section_label, \
             population, priority_index FROM timetable.program_sections \
             ORDER BY priority_index, department, program, year_level, \
             length(section_group), section_group",
        )
        .fetch_all(&self.pool)
        .await?;
        let mut sections = Vec::with_capacity(rows.len());
        for row in rows {
            sections.push(ProgramSection {
                program: row.try_get("program")?,
                department: row.try_get("department")?,
                year: row.try_get("year_level")?,
                group_letter: row.try_get("section_group")?,
                final_label: row.try_get("section_label")?,
                population: non_negative("program_sections", "population", row.try_get("population")?)?,
                priority_index: row.try_get("priority_index")?,
            });
        }
        Ok(sections)
    }

    async fn replace_program_sections(&self, rows: &[ProgramSection]) -> StoreResult<()> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM timetable.program_sections")
            .execute(&mut *tx)
            .await?;
        for row in rows {
            sqlx::query(
                r#"
                INSERT INTO timetable.program_sections
                (section_label, program, department, year_level, section_group,
                 population, priority_index)
                VALUES ($1, $2, $3, $4, $5, $6, $7)
                "#,
            )
            .bind(&row.final_label)
            .bind(&row.program)
            .bind(&row.department)
            .bind(row.year)
            .bind(&row.group_letter)
            .bind(int_column("program_sections", "population", row.population)?)
            .bind(row.priority_index)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        Ok(())
    }

    async fn fetch_course_sections(&self, semester: i32) -> StoreResult<Vec<CourseSection>> {
        let rows = sqlx::query(
            "SELECT ordinal, label, course_code, year_level, department, course_type, units, \
             semester, member_sections, member_programs, population \
             FROM timetable.course_sections WHERE semester = $1 ORDER BY ordinal",
        )
        .bind(semester)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(course_section_from_row).collect()
    }

    async fn replace_course_sections(&self, rows: &[CourseSection]) -> StoreResult<()> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM timetable.course_sections")
            .execute(&mut *tx)
            .await?;
        for row in rows {
            sqlx::query(
                r#"
                INSERT INTO timetable.course_sections
                (ordinal, label, course_code, year_level, department, course_type, units,
                 semester, member_sections, member_programs, population)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
                "#,
            )
            .bind(int_column("course_sections", "ordinal", row.ordinal)?)
            .bind(&row.label)
            .bind(&row.course_code)
            .bind(row.year)
            .bind(&row.department)
            .bind(&row.course_type)
            .bind(row.units)
            .bind(row.semester)
            .bind(&row.member_sections)
            .bind(&row.member_programs)
            .bind(int_column("course_sections", "population", row.population)?)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        Ok(())
    }

    async fn clear_assignments(&self) -> StoreResult<()> {
        sqlx::query("TRUNCATE TABLE timetable.final_assignments, timetable.decision_log")
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn commit_assignment(
        &self,
        decision: &DecisionRecord,
        assignment: &Assignment,
    ) -> StoreResult<()> {
        let mut tx = self.pool.begin().await?;
        sqlx::query(
            r#"
            INSERT INTO timetable.decision_log
            (run_id, course_section, room_code, day_abbr, start_time, end_time, decided_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(decision.run_id)
        .bind(&decision.course_section)
        .bind(&decision.room_code)
        .bind(&decision.day_abbr)
        .bind(decision.start)
        .bind(decision.end)
        .bind(decision.decided_at)
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r#"
            INSERT INTO timetable.final_assignments
            (run_id, course_section, program_sections, population, department, course_type,
             room_code, day_abbr, start_time, end_time, year_level, display_range)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            "#,
        )
        .bind(assignment.run_id)
        .bind(&assignment.course_section)
        .bind(&assignment.program_sections)
        .bind(int_column("final_assignments", "population", assignment.population)?)
        .bind(&assignment.department)
        .bind(&assignment.course_type)
        .bind(&assignment.room_code)
        .bind(&assignment.day_abbr)
        .bind(assignment.start)
        .bind(assignment.end)
        .bind(assignment.year)
        .bind(&assignment.display_range)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(())
    }

    async fn fetch_decisions(&self) -> StoreResult<Vec<DecisionRecord>> {
        let rows = sqlx::query(
            "SELECT run_id, course_section, room_code, day_abbr, start_time, end_time, decided_at \
             FROM timetable.decision_log ORDER BY id",
        )
        .fetch_all(&self.pool)
        .await?;
        let mut decisions = Vec::with_capacity(rows.len());
        for row in rows {
            decisions.push(DecisionRecord {
                run_id: row.try_get("run_id")?,
                course_section: row.try_get("course_section")?,
                room_code: row.try_get("room_code")?,
                day_abbr: row.try_get("day_abbr")?,
                start: row.try_get("start_time")?,
                end: row.try_get("end_time")?,
                decided_at: row.try_get("decided_at")?,
            });
        }
        Ok(decisions)
    }

    async fn fetch_assignments(&self) -> StoreResult<Vec<Assignment>> {
        let rows = sqlx::query(
            "SELECT run_id, course_section, program_sections, population, department, \
             course_type, room_code, day_abbr, start_time, end_time, year_level, display_range \
             FROM timetable.final_assignments ORDER BY id",
        )
        .fetch_all(&self.pool)
        .await?;
        let mut assignments = Vec::with_capacity(rows.len());
        for row in rows {
            assignments.push(Assignment {
                run_id: row.try_get("run_id")?,
                course_section: row.try_get("course_section")?,
                program_sections: row.try_get("program_sections")?,
                population: non_negative(
                    "final_assignments",
                    "population",
                    row.try_get("population")?,
                )?,
                department: row.try_get("department")?,
                course_type: row.try_get("course_type")?,
                room_code: row.try_get("room_code")?,
                day_abbr: row.try_get("day_abbr")?,
                start: row.try_get("start_time")?,
                end: row.try_get("end_time")?,
                year: row.try_get("year_level")?,
                display_range: row.try_get("display_range")?,
            });
        }
        Ok(assignments)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn oversized_counts_are_rejected_before_binding() {
        assert_eq!(int_column("rooms", "capacity", 45).unwrap(), 45);
        let err = int_column("rooms", "capacity", u32::MAX).unwrap_err();
        assert!(matches!(err, StoreError::InvalidRow { table: "rooms", .. }));
        assert!(err.to_string().contains("capacity is too large"));
    }

    #[test]
    fn negative_stored_values_are_invalid_rows() {
        assert_eq!(non_negative("rooms", "capacity", 0).unwrap(), 0);
        assert!(matches!(
            non_negative("time_slots", "duration_minutes", -80),
            Err(StoreError::InvalidRow { table: "time_slots", .. })
        ));
    }
}
