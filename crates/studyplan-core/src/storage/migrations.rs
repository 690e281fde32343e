//! Database schema migrations for studyplan.
//!
//! Migrations are versioned and applied automatically when opening the database.
//! The `schema_version` table tracks the current migration version.

use rusqlite::{Connection, Result as SqliteResult};
use tracing::warn;

/// Current schema version.
pub const SCHEMA_VERSION: i32 = 3;

/// Apply all pending migrations to bring the database to the current schema version.
///
/// # Errors
/// Returns an error if migration fails.
pub fn migrate(conn: &Connection) -> SqliteResult<()> {
    create_schema_version_table(conn)?;

    let current_version = get_schema_version(conn);

    if current_version < 1 {
        migrate_v1(conn)?;
    }
    if current_version < 2 {
        migrate_v2(conn)?;
    }
    if current_version < 3 {
        migrate_v3(conn)?;
    }

    Ok(())
}

fn create_schema_version_table(conn: &Connection) -> SqliteResult<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY
        );",
    )
}

/// Get the current schema version from the database.
///
/// Returns 0 if no version is set (initial database).
pub fn get_schema_version(conn: &Connection) -> i32 {
    conn.query_row("SELECT version FROM schema_version", [], |row| {
        row.get::<_, i32>(0)
    })
    .unwrap_or_else(|e| {
        if !matches!(e, rusqlite::Error::QueryReturnedNoRows) {
            warn!(error = %e, "failed to read schema_version");
        }
        0
    })
}

fn set_schema_version(conn: &Connection, version: i32) -> SqliteResult<()> {
    conn.execute("DELETE FROM schema_version", [])?;
    conn.execute("INSERT INTO schema_version (version) VALUES (?1)", [version])?;
    Ok(())
}

/// Migration v1: course catalog and ratings.
fn migrate_v1(conn: &Connection) -> SqliteResult<()> {
    let tx = conn.unchecked_transaction()?;
    tx.execute_batch(
        "CREATE TABLE IF NOT EXISTS courses (
            id          TEXT PRIMARY KEY,
            name        TEXT NOT NULL,
            description TEXT NOT NULL DEFAULT '',
            ects        INTEGER NOT NULL DEFAULT 0,
            faculty     TEXT,
            created_at  TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS ratings (
            student_id  TEXT NOT NULL,
            course_id   TEXT NOT NULL REFERENCES courses(id),
            grade       INTEGER NOT NULL DEFAULT 0,
            difficulty  INTEGER NOT NULL DEFAULT 5,
            study_time  INTEGER NOT NULL DEFAULT 0,
            attended    INTEGER NOT NULL DEFAULT 0,
            status      TEXT NOT NULL DEFAULT 'running',
            PRIMARY KEY (student_id, course_id)
        );

        CREATE INDEX IF NOT EXISTS idx_ratings_course ON ratings(course_id);",
    )?;
    set_schema_version(&tx, 1)?;
    tx.commit()
}

/// Migration v2: stored schedules and their blocks.
fn migrate_v2(conn: &Connection) -> SqliteResult<()> {
    let tx = conn.unchecked_transaction()?;
    tx.execute_batch(
        "CREATE TABLE IF NOT EXISTS schedules (
            id          TEXT PRIMARY KEY,
            name        TEXT NOT NULL,
            parameters  TEXT NOT NULL,
            created_at  TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS blocks (
            id          INTEGER PRIMARY KEY AUTOINCREMENT,
            schedule_id TEXT NOT NULL REFERENCES schedules(id),
            day         TEXT NOT NULL,
            start_at    TEXT NOT NULL,
            end_at      TEXT NOT NULL,
            kind        TEXT NOT NULL,
            course_id   TEXT
        );

        CREATE INDEX IF NOT EXISTS idx_blocks_schedule_start ON blocks(schedule_id, start_at);",
    )?;
    set_schema_version(&tx, 2)?;
    tx.commit()
}

/// Migration v3: enrollment order of ratings.
///
/// Existing rows keep their insertion order through the rowid.
fn migrate_v3(conn: &Connection) -> SqliteResult<()> {
    let tx = conn.unchecked_transaction()?;
    tx.execute_batch(
        "ALTER TABLE ratings ADD COLUMN enrolled_seq INTEGER NOT NULL DEFAULT 0;
        UPDATE ratings SET enrolled_seq = rowid;
        CREATE INDEX IF NOT EXISTS idx_ratings_student_seq ON ratings(student_id, enrolled_seq);",
    )?;
    set_schema_version(&tx, 3)?;
    tx.commit()
}
