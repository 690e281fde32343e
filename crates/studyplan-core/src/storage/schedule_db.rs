//! SQLite-based storage for courses, ratings, and generated schedules.

use std::path::Path;

use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveDateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};
use tracing::info;

use super::data_dir;
use super::migrations;
use crate::course::{Course, EnrollmentStatus, Faculty, Rating};
use crate::error::{CoreError, DatabaseError};
use crate::scheduler::{BlockKind, Interval, StudyParameters};

const DATETIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";
const DATE_FORMAT: &str = "%Y-%m-%d";

// === Helper Functions ===

fn corrupt(table: &str, message: impl Into<String>) -> CoreError {
    DatabaseError::CorruptRow {
        table: table.to_string(),
        message: message.into(),
    }
    .into()
}

fn format_datetime(dt: NaiveDateTime) -> String {
    dt.format(DATETIME_FORMAT).to_string()
}

fn parse_datetime(table: &str, value: &str) -> Result<NaiveDateTime, CoreError> {
    NaiveDateTime::parse_from_str(value, DATETIME_FORMAT)
        .map_err(|e| corrupt(table, format!("bad timestamp '{value}': {e}")))
}

fn parse_created_at(table: &str, value: &str) -> Result<DateTime<Utc>, CoreError> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| corrupt(table, format!("bad created_at '{value}': {e}")))
}

/// Monday and Sunday of the week containing `today`.
pub fn week_bounds(today: NaiveDate) -> (NaiveDate, NaiveDate) {
    let monday = today - Duration::days(i64::from(today.weekday().num_days_from_monday()));
    (monday, monday + Duration::days(6))
}

struct CourseRow {
    id: String,
    name: String,
    description: String,
    ects: u32,
    faculty: Option<String>,
    created_at: String,
}

impl CourseRow {
    const COLUMNS: &'static str = "id, name, description, ects, faculty, created_at";

    fn read(row: &rusqlite::Row) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            id: row.get(0)?,
            name: row.get(1)?,
            description: row.get(2)?,
            ects: row.get(3)?,
            faculty: row.get(4)?,
            created_at: row.get(5)?,
        })
    }

    fn into_course(self) -> Result<Course, CoreError> {
        let faculty = match self.faculty {
            Some(json) => Some(
                serde_json::from_str::<Faculty>(&json)
                    .map_err(|e| corrupt("courses", format!("bad faculty for {}: {e}", self.id)))?,
            ),
            None => None,
        };
        Ok(Course {
            created_at: parse_created_at("courses", &self.created_at)?,
            id: self.id,
            name: self.name,
            description: self.description,
            ects: self.ects,
            faculty,
        })
    }
}

struct BlockRow {
    start_at: String,
    end_at: String,
    kind: String,
    course_id: Option<String>,
}

impl BlockRow {
    fn read(row: &rusqlite::Row) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            start_at: row.get(0)?,
            end_at: row.get(1)?,
            kind: row.get(2)?,
            course_id: row.get(3)?,
        })
    }

    fn into_interval(self) -> Result<Interval, CoreError> {
        let kind: BlockKind = self
            .kind
            .parse()
            .map_err(|e: crate::error::ValidationError| corrupt("blocks", e.to_string()))?;
        Ok(Interval {
            start: parse_datetime("blocks", &self.start_at)?,
            end: parse_datetime("blocks", &self.end_at)?,
            kind,
            course_id: self.course_id,
        })
    }
}

/// A stored schedule with its blocks.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Schedule {
    pub id: String,
    pub name: String,
    pub parameters: StudyParameters,
    pub intervals: Vec<Interval>,
    pub created_at: DateTime<Utc>,
}

impl Schedule {
    /// Day of the earliest block, `None` for an empty schedule.
    pub fn start_date(&self) -> Option<NaiveDate> {
        self.intervals.iter().map(|i| i.date()).min()
    }

    /// Day of the latest block, `None` for an empty schedule.
    pub fn end_date(&self) -> Option<NaiveDate> {
        self.intervals.iter().map(|i| i.date()).max()
    }

    /// Blocks falling in the Monday-Sunday week containing `today`.
    pub fn this_week(&self, today: NaiveDate) -> Vec<&Interval> {
        let (monday, sunday) = week_bounds(today);
        self.intervals
            .iter()
            .filter(|i| (monday..=sunday).contains(&i.date()))
            .collect()
    }
}

/// Listing entry for a stored schedule.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleSummary {
    pub id: String,
    pub name: String,
    pub block_count: usize,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub created_at: DateTime<Utc>,
}

/// SQLite database for courses, ratings and schedules.
pub struct ScheduleDb {
    conn: Connection,
}

impl ScheduleDb {
    /// Open the database at `~/.config/studyplan/studyplan.db`.
    ///
    /// Creates tables if they don't exist.
    ///
    /// # Errors
    /// Returns an error if the database cannot be opened or migrated.
    pub fn open() -> Result<Self, CoreError> {
        Self::open_at(&data_dir()?.join("studyplan.db"))
    }

    /// Open (or create) the database at `path`.
    pub fn open_at(path: &Path) -> Result<Self, CoreError> {
        let conn = Connection::open(path).map_err(|source| DatabaseError::OpenFailed {
            path: path.to_path_buf(),
            source,
        })?;
        let db = Self { conn };
        db.migrate()?;
        Ok(db)
    }

    /// Open an in-memory database.
    pub fn open_memory() -> Result<Self, CoreError> {
        let conn = Connection::open_in_memory()?;
        let db = Self { conn };
        db.migrate()?;
        Ok(db)
    }

    fn migrate(&self) -> Result<(), CoreError> {
        migrations::migrate(&self.conn)
            .map_err(|e| DatabaseError::MigrationFailed(e.to_string()).into())
    }

    // === Courses ===

    pub fn add_course(&self, course: &Course) -> Result<(), CoreError> {
        let faculty = course.faculty.as_ref().map(serde_json::to_string).transpose()?;
        self.conn.execute(
            "INSERT INTO courses (id, name, description, ects, faculty, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                course.id,
                course.name,
                course.description,
                course.ects,
                faculty,
                course.created_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    pub fn get_course(&self, id: &str) -> Result<Option<Course>, CoreError> {
        let sql = format!("SELECT {} FROM courses WHERE id = ?1", CourseRow::COLUMNS);
        let row = self
            .conn
            .query_row(&sql, params![id], CourseRow::read)
            .optional()?;
        row.map(CourseRow::into_course).transpose()
    }

    fn query_courses(&self, sql: &str, args: impl rusqlite::Params) -> Result<Vec<Course>, CoreError> {
        let mut stmt = self.conn.prepare(sql)?;
        let rows = stmt
            .query_map(args, CourseRow::read)?
            .collect::<Result<Vec<_>, _>>()?;
        rows.into_iter().map(CourseRow::into_course).collect()
    }

    pub fn list_courses(&self) -> Result<Vec<Course>, CoreError> {
        let sql = format!("SELECT {} FROM courses ORDER BY name, id", CourseRow::COLUMNS);
        self.query_courses(&sql, [])
    }

    /// Courses whose name contains `query`, ignoring ASCII case.
    pub fn search_courses(&self, query: &str) -> Result<Vec<Course>, CoreError> {
        let escaped = query.replace('\\', "\\\\").replace('%', "\\%").replace('_', "\\_");
        let sql = format!(
            "SELECT {} FROM courses WHERE name LIKE ?1 ESCAPE '\\' ORDER BY name, id",
            CourseRow::COLUMNS
        );
        self.query_courses(&sql, params![format!("%{escaped}%")])
    }

    /// Courses `student_id` is currently following (status `running`), in
    /// the order the student first rated them.
    pub fn followed_courses(&self, student_id: &str) -> Result<Vec<Course>, CoreError> {
        let sql = "SELECT c.id, c.name, c.description, c.ects, c.faculty, c.created_at
                   FROM courses c
                   JOIN ratings r ON r.course_id = c.id
                   WHERE r.student_id = ?1 AND r.status = 'running'
                   ORDER BY r.enrolled_seq, c.id";
        self.query_courses(sql, params![student_id])
    }

    // === Ratings ===

    /// Insert or update the rating of one student for one course. An update
    /// keeps the original enrollment position.
    ///
    /// # Errors
    /// Fails if the rating is out of bounds or the course does not exist.
    pub fn rate(&self, rating: &Rating) -> Result<(), CoreError> {
        rating.validate()?;
        if self.get_course(&rating.course_id)?.is_none() {
            return Err(DatabaseError::NotFound {
                kind: "course".into(),
                id: rating.course_id.clone(),
            }
            .into());
        }
        self.conn.execute(
            "INSERT INTO ratings
             (student_id, course_id, grade, difficulty, study_time, attended, status, enrolled_seq)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7,
                     (SELECT COALESCE(MAX(enrolled_seq), 0) + 1 FROM ratings))
             ON CONFLICT (student_id, course_id) DO UPDATE SET
                 grade = excluded.grade,
                 difficulty = excluded.difficulty,
                 study_time = excluded.study_time,
                 attended = excluded.attended,
                 status = excluded.status",
            params![
                rating.student_id,
                rating.course_id,
                rating.grade,
                rating.difficulty,
                rating.study_time,
                rating.attended,
                rating.status.as_str(),
            ],
        )?;
        Ok(())
    }

    pub fn ratings_for(&self, course_id: &str) -> Result<Vec<Rating>, CoreError> {
        let mut stmt = self.conn.prepare(
            "SELECT student_id, course_id, grade, difficulty, study_time, attended, status
             FROM ratings WHERE course_id = ?1 ORDER BY student_id",
        )?;
        let rows = stmt
            .query_map(params![course_id], |row| {
                Ok((
                    Rating {
                        student_id: row.get(0)?,
                        course_id: row.get(1)?,
                        grade: row.get(2)?,
                        difficulty: row.get(3)?,
                        study_time: row.get(4)?,
                        attended: row.get(5)?,
                        status: EnrollmentStatus::Running,
                    },
                    row.get::<_, String>(6)?,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        rows.into_iter()
            .map(|(mut rating, status)| {
                rating.status = status
                    .parse()
                    .map_err(|e: crate::error::ValidationError| corrupt("ratings", e.to_string()))?;
                Ok(rating)
            })
            .collect()
    }

    // === Schedules ===

    /// Store a generated schedule and its blocks in one transaction.
    /// Returns the new schedule id.
    pub fn save_schedule(
        &self,
        name: &str,
        parameters: &StudyParameters,
        intervals: &[Interval],
    ) -> Result<String, CoreError> {
        let id = uuid::Uuid::new_v4().to_string();
        let tx = self.conn.unchecked_transaction()?;
        tx.execute(
            "INSERT INTO schedules (id, name, parameters, created_at) VALUES (?1, ?2, ?3, ?4)",
            params![id, name, serde_json::to_string(parameters)?, Utc::now().to_rfc3339()],
        )?;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO blocks (schedule_id, day, start_at, end_at, kind, course_id)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            )?;
            for interval in intervals {
                stmt.execute(params![
                    id,
                    interval.date().format(DATE_FORMAT).to_string(),
                    format_datetime(interval.start),
                    format_datetime(interval.end),
                    interval.kind.as_str(),
                    interval.course_id,
                ])?;
            }
        }
        tx.commit()?;
        info!(schedule = %id, blocks = intervals.len(), "saved schedule");
        Ok(id)
    }

    pub fn get_schedule(&self, id: &str) -> Result<Option<Schedule>, CoreError> {
        let row = self
            .conn
            .query_row(
                "SELECT id, name, parameters, created_at FROM schedules WHERE id = ?1",
                params![id],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, String>(3)?,
                    ))
                },
            )
            .optional()?;

        let Some((id, name, parameters, created_at)) = row else {
            return Ok(None);
        };
        let parameters: StudyParameters = serde_json::from_str(&parameters)
            .map_err(|e| corrupt("schedules", format!("bad parameters for {id}: {e}")))?;
        let intervals = self.schedule_blocks(&id)?;
        Ok(Some(Schedule {
            created_at: parse_created_at("schedules", &created_at)?,
            id,
            name,
            parameters,
            intervals,
        }))
    }

    /// Blocks of a schedule in chronological order.
    pub fn schedule_blocks(&self, schedule_id: &str) -> Result<Vec<Interval>, CoreError> {
        self.query_blocks(
            "SELECT start_at, end_at, kind, course_id FROM blocks
             WHERE schedule_id = ?1 ORDER BY start_at, id",
            params![schedule_id],
        )
    }

    /// Blocks of a schedule in the Monday-Sunday week containing `today`.
    pub fn week_blocks(&self, schedule_id: &str, today: NaiveDate) -> Result<Vec<Interval>, CoreError> {
        let (monday, sunday) = week_bounds(today);
        self.query_blocks(
            "SELECT start_at, end_at, kind, course_id FROM blocks
             WHERE schedule_id = ?1 AND day >= ?2 AND day <= ?3
             ORDER BY start_at, id",
            params![
                schedule_id,
                monday.format(DATE_FORMAT).to_string(),
                sunday.format(DATE_FORMAT).to_string(),
            ],
        )
    }

    fn query_blocks(&self, sql: &str, args: impl rusqlite::Params) -> Result<Vec<Interval>, CoreError> {
        let mut stmt = self.conn.prepare(sql)?;
        let rows = stmt
            .query_map(args, BlockRow::read)?
            .collect::<Result<Vec<_>, _>>()?;
        rows.into_iter().map(BlockRow::into_interval).collect()
    }

    pub fn list_schedules(&self) -> Result<Vec<ScheduleSummary>, CoreError> {
        let mut stmt = self.conn.prepare(
            "SELECT s.id, s.name, s.created_at, COUNT(b.id), MIN(b.day), MAX(b.day)
             FROM schedules s
             LEFT JOIN blocks b ON b.schedule_id = s.id
             GROUP BY s.id
             ORDER BY s.created_at, s.id",
        )?;
        let rows = stmt
            .query_map([], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, i64>(3)?,
                    row.get::<_, Option<String>>(4)?,
                    row.get::<_, Option<String>>(5)?,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        let parse_day = |value: Option<String>| -> Result<Option<NaiveDate>, CoreError> {
            value
                .map(|v| {
                    NaiveDate::parse_from_str(&v, DATE_FORMAT)
                        .map_err(|e| corrupt("blocks", format!("bad day '{v}': {e}")))
                })
                .transpose()
        };

        rows.into_iter()
            .map(|(id, name, created_at, count, first, last)| {
                Ok(ScheduleSummary {
                    created_at: parse_created_at("schedules", &created_at)?,
                    id,
                    name,
                    block_count: count as usize,
                    start_date: parse_day(first)?,
                    end_date: parse_day(last)?,
                })
            })
            .collect()
    }

    /// Delete a schedule and its blocks. Returns false if it did not exist.
    pub fn delete_schedule(&self, id: &str) -> Result<bool, CoreError> {
        let tx = self.conn.unchecked_transaction()?;
        tx.execute("DELETE FROM blocks WHERE schedule_id = ?1", params![id])?;
        let deleted = tx.execute("DELETE FROM schedules WHERE id = ?1", params![id])?;
        tx.commit()?;
        Ok(deleted > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::course::University;
    use chrono::NaiveTime;

    fn at(day: NaiveDate, h: u32, m: u32) -> NaiveDateTime {
        day.and_time(NaiveTime::from_hms_opt(h, m, 0).unwrap())
    }

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn course_roundtrip_with_faculty() {
        let db = ScheduleDb::open_memory().unwrap();
        let course = Course::new("Analyse I", 6)
            .with_description("Limits and series")
            .with_faculty(Faculty {
                name: "Sciences".into(),
                university: University {
                    name: "UCLouvain".into(),
                    description: String::new(),
                    website: "uclouvain.be".into(),
                },
            });
        db.add_course(&course).unwrap();
        let loaded = db.get_course(&course.id).unwrap().unwrap();
        assert_eq!(loaded.name, "Analyse I");
        assert_eq!(loaded.faculty, course.faculty);
        assert!(db.get_course("missing").unwrap().is_none());
    }

    #[test]
    fn search_is_case_insensitive_substring() {
        let db = ScheduleDb::open_memory().unwrap();
        db.add_course(&Course::new("Linear Algebra", 5)).unwrap();
        db.add_course(&Course::new("Algorithms", 5)).unwrap();
        db.add_course(&Course::new("Physics", 5)).unwrap();
        let found: Vec<String> = db
            .search_courses("ALG")
            .unwrap()
            .into_iter()
            .map(|c| c.name)
            .collect();
        assert_eq!(found, ["Algorithms", "Linear Algebra"]);
        assert!(db.search_courses("100%").unwrap().is_empty());
    }

    #[test]
    fn rating_is_upserted_per_student_and_course() {
        let db = ScheduleDb::open_memory().unwrap();
        let course = Course::new("Databases", 5);
        db.add_course(&course).unwrap();

        db.rate(&Rating::new("s1", &course.id, 12, 4, 40).unwrap()).unwrap();
        db.rate(&Rating::new("s1", &course.id, 15, 6, 45).unwrap()).unwrap();
        db.rate(&Rating::new("s2", &course.id, 10, 8, 60).unwrap().with_status(EnrollmentStatus::Failed))
            .unwrap();

        let ratings = db.ratings_for(&course.id).unwrap();
        assert_eq!(ratings.len(), 2);
        assert_eq!(ratings[0].grade, 15);
        assert_eq!(ratings[1].status, EnrollmentStatus::Failed);
    }

    #[test]
    fn rating_unknown_course_fails() {
        let db = ScheduleDb::open_memory().unwrap();
        let err = db.rate(&Rating::new("s1", "nope", 12, 4, 40).unwrap()).unwrap_err();
        assert!(matches!(err, CoreError::Database(DatabaseError::NotFound { .. })));
    }

    #[test]
    fn followed_courses_only_lists_running() {
        let db = ScheduleDb::open_memory().unwrap();
        let a = Course::new("A", 5);
        let b = Course::new("B", 5);
        db.add_course(&a).unwrap();
        db.add_course(&b).unwrap();
        db.rate(&Rating::new("me", &a.id, 12, 4, 40).unwrap()).unwrap();
        db.rate(&Rating::new("me", &b.id, 12, 4, 40).unwrap().with_status(EnrollmentStatus::Succeeded))
            .unwrap();
        db.rate(&Rating::new("other", &b.id, 12, 4, 40).unwrap()).unwrap();

        let followed = db.followed_courses("me").unwrap();
        assert_eq!(followed.len(), 1);
        assert_eq!(followed[0].id, a.id);
    }

    #[test]
    fn followed_courses_keep_enrollment_order() {
        let db = ScheduleDb::open_memory().unwrap();
        let zeta = Course::new("Zeta", 5);
        let alpha = Course::new("Alpha", 5);
        let mid = Course::new("Mid", 5);
        for course in [&zeta, &alpha, &mid] {
            db.add_course(course).unwrap();
        }
        db.rate(&Rating::new("me", &zeta.id, 12, 4, 40).unwrap()).unwrap();
        db.rate(&Rating::new("other", &mid.id, 12, 4, 40).unwrap()).unwrap();
        db.rate(&Rating::new("me", &alpha.id, 12, 4, 40).unwrap()).unwrap();
        db.rate(&Rating::new("me", &mid.id, 12, 4, 40).unwrap()).unwrap();
        // Re-rating keeps the first enrollment position.
        db.rate(&Rating::new("me", &zeta.id, 16, 6, 50).unwrap()).unwrap();

        let names: Vec<String> = db
            .followed_courses("me")
            .unwrap()
            .into_iter()
            .map(|c| c.name)
            .collect();
        assert_eq!(names, ["Zeta", "Alpha", "Mid"]);
        assert_eq!(db.ratings_for(&zeta.id).unwrap()[0].grade, 16);
    }

    #[test]
    fn schedule_roundtrip_and_delete() {
        let db = ScheduleDb::open_memory().unwrap();
        let d = day(2024, 3, 4);
        let intervals = vec![
            Interval::study(at(d, 8, 0), at(d, 9, 0), "a"),
            Interval::pause(at(d, 9, 0), at(d, 9, 15)),
            Interval::study(at(d, 9, 15), at(d, 10, 15), "b"),
        ];
        let params = StudyParameters::default();
        let id = db.save_schedule("Week 10", &params, &intervals).unwrap();

        let schedule = db.get_schedule(&id).unwrap().unwrap();
        assert_eq!(schedule.name, "Week 10");
        assert_eq!(schedule.parameters, params);
        assert_eq!(schedule.intervals, intervals);
        assert_eq!(schedule.start_date(), Some(d));

        let listed = db.list_schedules().unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].block_count, 3);
        assert_eq!(listed[0].end_date, Some(d));

        assert!(db.delete_schedule(&id).unwrap());
        assert!(!db.delete_schedule(&id).unwrap());
        assert!(db.get_schedule(&id).unwrap().is_none());
        assert!(db.schedule_blocks(&id).unwrap().is_empty());
    }

    #[test]
    fn empty_schedule_has_no_dates() {
        let db = ScheduleDb::open_memory().unwrap();
        let id = db.save_schedule("Empty", &StudyParameters::default(), &[]).unwrap();
        let schedule = db.get_schedule(&id).unwrap().unwrap();
        assert_eq!(schedule.start_date(), None);
        assert_eq!(schedule.end_date(), None);
        let listed = db.list_schedules().unwrap();
        assert_eq!(listed[0].block_count, 0);
        assert_eq!(listed[0].start_date, None);
    }

    #[test]
    fn week_blocks_cover_monday_to_sunday() {
        let db = ScheduleDb::open_memory().unwrap();
        // Sunday 3rd, Monday 4th, Sunday 10th, Monday 11th
        let intervals: Vec<Interval> = [day(2024, 3, 3), day(2024, 3, 4), day(2024, 3, 10), day(2024, 3, 11)]
            .into_iter()
            .map(|d| Interval::study(at(d, 8, 0), at(d, 9, 0), "a"))
            .collect();
        let id = db.save_schedule("Span", &StudyParameters::default(), &intervals).unwrap();

        let week = db.week_blocks(&id, day(2024, 3, 6)).unwrap();
        let days: Vec<NaiveDate> = week.iter().map(Interval::date).collect();
        assert_eq!(days, [day(2024, 3, 4), day(2024, 3, 10)]);

        let schedule = db.get_schedule(&id).unwrap().unwrap();
        assert_eq!(schedule.this_week(day(2024, 3, 6)).len(), 2);
    }

    #[test]
    fn week_bounds_start_on_monday() {
        assert_eq!(week_bounds(day(2024, 3, 10)), (day(2024, 3, 4), day(2024, 3, 10)));
        assert_eq!(week_bounds(day(2024, 3, 4)), (day(2024, 3, 4), day(2024, 3, 10)));
    }
}
