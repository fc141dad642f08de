use super::connection::{DbPool, get_connection_with_retry};
use crate::error::Result;
use crate::models::{LogEntry, LogType, NewLogEntry};
use crate::schema::log_entries;
use chrono::NaiveDateTime;
use diesel::prelude::*;
use diesel::sqlite::SqliteConnection;
use log::debug;

/// Audit log operations. Entries are only ever appended.
pub struct LogOperations<'a> {
    pool: &'a DbPool,
}

impl<'a> LogOperations<'a> {
    pub fn new(pool: &'a DbPool) -> Self {
        Self { pool }
    }

    pub fn append(
        &self,
        entry_type: LogType,
        package_name: &str,
        version: Option<&str>,
        user_id: Option<i32>,
    ) -> Result<LogEntry> {
        let mut conn = get_connection_with_retry(self.pool)?;
        append(&mut conn, entry_type, package_name, version, user_id)
    }

    /// Entries recorded for a package name, including ones from before a removal.
    pub fn get_by_package(&self, package_name: &str) -> Result<Vec<LogEntry>> {
        let mut conn = get_connection_with_retry(self.pool)?;
        Ok(log_entries::table
            .filter(log_entries::package_name.eq(package_name))
            .order(log_entries::id.asc())
            .select(LogEntry::as_select())
            .load(&mut conn)?)
    }

    /// Entries whose type is any of `types`.
    pub fn get_by_type(&self, types: &[LogType]) -> Result<Vec<LogEntry>> {
        let mut conn = get_connection_with_retry(self.pool)?;
        Ok(log_entries::table
            .filter(log_entries::entry_type.eq_any(codes(types)))
            .order(log_entries::id.asc())
            .select(LogEntry::as_select())
            .load(&mut conn)?)
    }

    /// Entries created strictly after `since`, limited to `types` unless it is empty.
    pub fn get_entries_since(
        &self,
        since: NaiveDateTime,
        types: &[LogType],
    ) -> Result<Vec<LogEntry>> {
        let mut conn = get_connection_with_retry(self.pool)?;

        let mut query = log_entries::table
            .filter(log_entries::created_at.gt(since))
            .order(log_entries::id.asc())
            .select(LogEntry::as_select())
            .into_boxed();

        if !types.is_empty() {
            query = query.filter(log_entries::entry_type.eq_any(codes(types)));
        }

        Ok(query.load(&mut conn)?)
    }

    /// Names of packages removed as a whole after `since`, each listed once.
    pub fn get_removed_packages(&self, since: NaiveDateTime) -> Result<Vec<String>> {
        let mut conn = get_connection_with_retry(self.pool)?;
        Ok(log_entries::table
            .filter(log_entries::entry_type.eq(LogType::Delete.code()))
            .filter(log_entries::version.is_null())
            .filter(log_entries::created_at.gt(since))
            .select(log_entries::package_name)
            .distinct()
            .order(log_entries::package_name.asc())
            .load::<String>(&mut conn)?)
    }
}

fn codes(types: &[LogType]) -> Vec<i32> {
    types.iter().map(|t| t.code()).collect()
}

pub fn append(
    conn: &mut SqliteConnection,
    entry_type: LogType,
    package_name: &str,
    version: Option<&str>,
    user_id: Option<i32>,
) -> Result<LogEntry> {
    let entry = NewLogEntry::new(
        entry_type,
        package_name.to_string(),
        version.map(str::to_string),
        user_id,
    );

    let entry = diesel::insert_into(log_entries::table)
        .values(&entry)
        .returning(LogEntry::as_returning())
        .get_result(conn)?;

    debug!(
        "Logged {:?} for {}{}",
        entry_type,
        package_name,
        version.map(|v| format!("@{v}")).unwrap_or_default()
    );
    Ok(entry)
}
