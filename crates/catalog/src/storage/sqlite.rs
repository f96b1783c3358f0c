//! SQLite-based catalog storage with compressed evaluation payloads

use std::path::Path;
use std::sync::{Mutex, MutexGuard, PoisonError};

use anyhow::{Context, Result};
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{Connection, OptionalExtension, params};
use rusqlite_migration::{M, Migrations};

use super::traits::CatalogStore;
use crate::models::{
    CourseCode, CourseEvaluation, CourseMetadata, EvaluationData, InstanceKey, Period,
    SemesterFeatures,
};

/// Database migrations
///
/// Each migration is applied in order. The user_version pragma tracks which
/// migrations have been applied.
fn migrations() -> Migrations<'static> {
    Migrations::new(vec![
        // Migration 1: Initial schema
        M::up(
            r#"
            -- Scrape state per course
            CREATE TABLE course_metadata (
                course_code TEXT PRIMARY KEY,
                last_period_gathered TEXT NOT NULL DEFAULT '',
                last_period_failed INTEGER NOT NULL DEFAULT 0,
                relevant_periods TEXT NOT NULL DEFAULT '[]',  -- JSON array of period codes
                last_scrape_during_grace_period TEXT,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );

            -- Evaluations per course instance with zstd-compressed JSON payloads
            CREATE TABLE course_evaluations (
                instance_key TEXT PRIMARY KEY,
                course_code TEXT NOT NULL,
                data BLOB NOT NULL,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                FOREIGN KEY (course_code) REFERENCES course_metadata(course_code)
            );

            CREATE INDEX idx_course_evaluations_course
                ON course_evaluations(course_code);
            "#,
        ),
        // Migration 2: Per-semester features from course histories
        M::up(
            r#"
            CREATE TABLE semester_features (
                course_code TEXT NOT NULL,
                period TEXT NOT NULL,
                start_time_24h REAL,
                meets_friday INTEGER NOT NULL DEFAULT 0,
                max_capacity INTEGER NOT NULL DEFAULT 0,
                actual_enrollment INTEGER NOT NULL DEFAULT 0,
                credits REAL NOT NULL DEFAULT 0,
                instructors TEXT NOT NULL DEFAULT '[]',  -- JSON array of names
                prerequisites TEXT NOT NULL DEFAULT '',
                PRIMARY KEY (course_code, period),
                FOREIGN KEY (course_code) REFERENCES course_metadata(course_code)
            );
            "#,
        ),
    ])
}

/// Fixed-width UTC timestamps so stored values sort lexicographically
fn format_ts(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

fn parse_ts(s: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .with_context(|| format!("Invalid stored timestamp: {}", s))
}

fn parse_period(s: &str) -> Result<Period> {
    Period::from_code(s).with_context(|| format!("Invalid stored period: {}", s))
}

/// Raw course_metadata row as read from SQLite
type CourseRow = (String, String, bool, String, Option<String>, String, String);

const COURSE_COLUMNS: &str = "course_code, last_period_gathered, last_period_failed,
     relevant_periods, last_scrape_during_grace_period, created_at, updated_at";

fn read_course_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<CourseRow> {
    Ok((
        row.get(0)?,
        row.get(1)?,
        row.get(2)?,
        row.get(3)?,
        row.get(4)?,
        row.get(5)?,
        row.get(6)?,
    ))
}

fn course_from_row(row: CourseRow) -> Result<CourseMetadata> {
    let (code, gathered, failed, relevant_json, grace, created_at, updated_at) = row;

    let relevant: Vec<String> =
        serde_json::from_str(&relevant_json).context("Invalid stored relevant_periods")?;

    Ok(CourseMetadata {
        course_code: CourseCode::new(&code)?,
        last_period_gathered: if gathered.is_empty() {
            None
        } else {
            Some(parse_period(&gathered)?)
        },
        last_period_failed: failed,
        relevant_periods: relevant
            .iter()
            .map(|p| parse_period(p))
            .collect::<Result<Vec<_>>>()?,
        last_scrape_during_grace_period: grace.as_deref().map(parse_period).transpose()?,
        created_at: parse_ts(&created_at)?,
        updated_at: parse_ts(&updated_at)?,
    })
}

/// Raw course_evaluations row as read from SQLite
type EvaluationRow = (String, String, Vec<u8>, String, String);

fn read_evaluation_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<EvaluationRow> {
    Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?, row.get(4)?))
}

fn evaluation_from_row(row: EvaluationRow) -> Result<CourseEvaluation> {
    let (key, code, compressed, created_at, updated_at) = row;

    let json = zstd::decode_all(compressed.as_slice()).context("Failed to decompress evaluation")?;
    let data: EvaluationData =
        serde_json::from_slice(&json).context("Failed to parse stored evaluation")?;

    Ok(CourseEvaluation {
        instance_key: key.parse()?,
        course_code: CourseCode::new(&code)?,
        data,
        created_at: parse_ts(&created_at)?,
        updated_at: parse_ts(&updated_at)?,
    })
}

/// Raw semester_features row as read from SQLite
type FeaturesRow = (String, String, Option<f64>, bool, u32, u32, f64, String, String);

const FEATURES_COLUMNS: &str = "course_code, period, start_time_24h, meets_friday, max_capacity,
     actual_enrollment, credits, instructors, prerequisites";

fn read_features_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<FeaturesRow> {
    Ok((
        row.get(0)?,
        row.get(1)?,
        row.get(2)?,
        row.get(3)?,
        row.get(4)?,
        row.get(5)?,
        row.get(6)?,
        row.get(7)?,
        row.get(8)?,
    ))
}

fn features_from_row(row: FeaturesRow) -> Result<SemesterFeatures> {
    let (code, period, start, friday, capacity, enrollment, credits, instructors, prereqs) = row;

    Ok(SemesterFeatures {
        course_code: CourseCode::new(&code)?,
        period: parse_period(&period)?,
        start_time_24h: start,
        meets_friday: friday,
        max_capacity: capacity,
        actual_enrollment: enrollment,
        credits,
        instructors: serde_json::from_str(&instructors).context("Invalid stored instructors")?,
        prerequisites: prereqs,
    })
}

/// Period codes don't sort chronologically as text
fn sort_features(features: &mut [SemesterFeatures]) {
    features.sort_by(|a, b| {
        a.course_code
            .cmp(&b.course_code)
            .then(a.period.cmp(&b.period))
    });
}

/// SQLite-based catalog storage
pub struct SqliteCatalogStore {
    conn: Mutex<Connection>,
}

impl SqliteCatalogStore {
    /// Open (or create) a store at `db_path` and run migrations
    pub fn new(db_path: impl AsRef<Path>) -> Result<Self> {
        let conn = Connection::open(db_path.as_ref())
            .with_context(|| format!("Failed to open database at {:?}", db_path.as_ref()))?;
        Self::from_connection(conn)
    }

    /// Open a private in-memory database
    pub fn in_memory() -> Result<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(mut conn: Connection) -> Result<Self> {
        // WAL keeps readers unblocked during writes; foreign_keys is needed
        // for the evaluation -> course reference to be enforced.
        conn.execute_batch(
            r#"
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA foreign_keys = ON;
            "#,
        )?;

        migrations()
            .to_latest(&mut conn)
            .context("Failed to run database migrations")?;
        log::debug!("[STORE] Database schema up to date");

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Stored created_at for a row, if the row exists
    fn existing_created_at(
        conn: &Connection,
        table: &str,
        key_column: &str,
        key: &str,
    ) -> Result<Option<DateTime<Utc>>> {
        let sql = format!("SELECT created_at FROM {} WHERE {} = ?", table, key_column);
        let created_at: Option<String> = conn
            .query_row(&sql, [key], |row| row.get(0))
            .optional()?;
        created_at.as_deref().map(parse_ts).transpose()
    }
}

impl CatalogStore for SqliteCatalogStore {
    fn get_course(&self, code: &CourseCode) -> Result<Option<CourseMetadata>> {
        let conn = self.conn();

        let row = conn
            .query_row(
                &format!("SELECT {} FROM course_metadata WHERE course_code = ?", COURSE_COLUMNS),
                [code.as_str()],
                read_course_row,
            )
            .optional()?;

        row.map(course_from_row).transpose()
    }

    fn upsert_course(&self, mut meta: CourseMetadata) -> Result<()> {
        let mut conn = self.conn();
        let tx = conn.transaction()?;

        if let Some(created_at) = Self::existing_created_at(
            &tx,
            "course_metadata",
            "course_code",
            meta.course_code.as_str(),
        )? {
            meta.created_at = created_at;
        }
        meta.updated_at = meta.updated_at.max(meta.created_at);

        let relevant: Vec<String> = meta.relevant_periods.iter().map(Period::code).collect();

        // ON CONFLICT DO UPDATE rather than INSERT OR REPLACE: a replace
        // deletes the row first, which the evaluation foreign key rejects.
        tx.execute(
            "INSERT INTO course_metadata
             (course_code, last_period_gathered, last_period_failed, relevant_periods,
              last_scrape_during_grace_period, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(course_code) DO UPDATE SET
                last_period_gathered = excluded.last_period_gathered,
                last_period_failed = excluded.last_period_failed,
                relevant_periods = excluded.relevant_periods,
                last_scrape_during_grace_period = excluded.last_scrape_during_grace_period,
                updated_at = excluded.updated_at",
            params![
                meta.course_code.as_str(),
                meta.last_period_gathered.map(|p| p.code()).unwrap_or_default(),
                meta.last_period_failed,
                serde_json::to_string(&relevant)?,
                meta.last_scrape_during_grace_period.map(|p| p.code()),
                format_ts(&meta.created_at),
                format_ts(&meta.updated_at),
            ],
        )?;

        tx.commit()?;
        Ok(())
    }

    fn has_course(&self, code: &CourseCode) -> Result<bool> {
        let conn = self.conn();

        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM course_metadata WHERE course_code = ?",
            [code.as_str()],
            |row| row.get(0),
        )?;

        Ok(count > 0)
    }

    fn list_courses(&self) -> Result<Vec<CourseMetadata>> {
        let conn = self.conn();

        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM course_metadata ORDER BY course_code ASC",
            COURSE_COLUMNS
        ))?;

        let rows = stmt
            .query_map([], read_course_row)?
            .collect::<Result<Vec<_>, _>>()?;

        rows.into_iter().map(course_from_row).collect()
    }

    fn count_courses(&self) -> Result<usize> {
        let conn = self.conn();
        let count: i64 =
            conn.query_row("SELECT COUNT(*) FROM course_metadata", [], |row| row.get(0))?;
        Ok(count as usize)
    }

    fn get_evaluation(&self, key: &InstanceKey) -> Result<Option<CourseEvaluation>> {
        let conn = self.conn();

        let row = conn
            .query_row(
                "SELECT instance_key, course_code, data, created_at, updated_at
                 FROM course_evaluations WHERE instance_key = ?",
                [key.to_string()],
                read_evaluation_row,
            )
            .optional()?;

        row.map(evaluation_from_row).transpose()
    }

    fn upsert_evaluation(&self, mut evaluation: CourseEvaluation) -> Result<()> {
        let json = serde_json::to_vec(&evaluation.data)?;
        // Level 3 = good balance of speed vs compression
        let compressed = zstd::encode_all(json.as_slice(), 3).context("Failed to compress evaluation")?;

        let key = evaluation.instance_key.to_string();

        let mut conn = self.conn();
        let tx = conn.transaction()?;

        if let Some(created_at) =
            Self::existing_created_at(&tx, "course_evaluations", "instance_key", &key)?
        {
            evaluation.created_at = created_at;
        }
        evaluation.updated_at = evaluation.updated_at.max(evaluation.created_at);

        tx.execute(
            "INSERT INTO course_evaluations
             (instance_key, course_code, data, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?)
             ON CONFLICT(instance_key) DO UPDATE SET
                course_code = excluded.course_code,
                data = excluded.data,
                updated_at = excluded.updated_at",
            params![
                key,
                evaluation.course_code.as_str(),
                compressed,
                format_ts(&evaluation.created_at),
                format_ts(&evaluation.updated_at),
            ],
        )
        .with_context(|| format!("Failed to store evaluation {}", key))?;

        tx.commit()?;
        Ok(())
    }

    fn has_evaluation(&self, key: &InstanceKey) -> Result<bool> {
        let conn = self.conn();

        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM course_evaluations WHERE instance_key = ?",
            [key.to_string()],
            |row| row.get(0),
        )?;

        Ok(count > 0)
    }

    fn list_evaluations_for_course(&self, code: &CourseCode) -> Result<Vec<CourseEvaluation>> {
        let conn = self.conn();

        let mut stmt = conn.prepare(
            "SELECT instance_key, course_code, data, created_at, updated_at
             FROM course_evaluations
             WHERE course_code = ?
             ORDER BY instance_key ASC",
        )?;

        let rows = stmt
            .query_map([code.as_str()], read_evaluation_row)?
            .collect::<Result<Vec<_>, _>>()?;

        rows.into_iter().map(evaluation_from_row).collect()
    }

    fn upsert_features(&self, features: &[SemesterFeatures]) -> Result<()> {
        let mut conn = self.conn();
        let tx = conn.transaction()?;

        for f in features {
            tx.execute(
                &format!(
                    "INSERT INTO semester_features ({}) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
                     ON CONFLICT(course_code, period) DO UPDATE SET
                        start_time_24h = excluded.start_time_24h,
                        meets_friday = excluded.meets_friday,
                        max_capacity = excluded.max_capacity,
                        actual_enrollment = excluded.actual_enrollment,
                        credits = excluded.credits,
                        instructors = excluded.instructors,
                        prerequisites = excluded.prerequisites",
                    FEATURES_COLUMNS
                ),
                params![
                    f.course_code.as_str(),
                    f.period.code(),
                    f.start_time_24h,
                    f.meets_friday,
                    f.max_capacity,
                    f.actual_enrollment,
                    f.credits,
                    serde_json::to_string(&f.instructors)?,
                    f.prerequisites,
                ],
            )
            .with_context(|| format!("Failed to store features {} {}", f.course_code, f.period))?;
        }

        tx.commit()?;
        Ok(())
    }

    fn list_features_for_course(&self, code: &CourseCode) -> Result<Vec<SemesterFeatures>> {
        let conn = self.conn();

        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM semester_features WHERE course_code = ?",
            FEATURES_COLUMNS
        ))?;
        let rows = stmt
            .query_map([code.as_str()], read_features_row)?
            .collect::<Result<Vec<_>, _>>()?;

        let mut features = rows
            .into_iter()
            .map(features_from_row)
            .collect::<Result<Vec<_>>>()?;
        sort_features(&mut features);
        Ok(features)
    }

    fn list_features(&self) -> Result<Vec<SemesterFeatures>> {
        let conn = self.conn();

        let mut stmt = conn.prepare(&format!("SELECT {} FROM semester_features", FEATURES_COLUMNS))?;
        let rows = stmt
            .query_map([], read_features_row)?
            .collect::<Result<Vec<_>, _>>()?;

        let mut features = rows
            .into_iter()
            .map(features_from_row)
            .collect::<Result<Vec<_>>>()?;
        sort_features(&mut features);
        Ok(features)
    }

    fn clear(&self) -> Result<()> {
        let conn = self.conn();

        conn.execute_batch(
            "DELETE FROM semester_features;
             DELETE FROM course_evaluations;
             DELETE FROM course_metadata;",
        )?;
        log::info!("[STORE] Cleared all course records");

        Ok(())
    }
}
