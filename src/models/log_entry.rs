use crate::schema::log_entries;
use chrono::NaiveDateTime;
use diesel::prelude::*;
use rocket::serde::{Deserialize, Serialize};

// Audit log row. Package name is denormalized so entries outlive the package.
#[derive(Queryable, Selectable, Identifiable, Serialize, Deserialize, Debug, Clone)]
#[diesel(table_name = log_entries)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct LogEntry {
    pub id: i32,
    pub entry_type: i32,
    pub package_name: String,
    pub version: Option<String>, // None for whole-package events
    pub user_id: Option<i32>,
    pub created_at: NaiveDateTime,
}

#[derive(Insertable, Debug)]
#[diesel(table_name = log_entries)]
pub struct NewLogEntry {
    pub entry_type: i32,
    pub package_name: String,
    pub version: Option<String>,
    pub user_id: Option<i32>,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LogType {
    Add = 1,
    Update = 2,
    Delete = 3,
}

impl LogType {
    pub fn code(self) -> i32 {
        self as i32
    }
}

impl TryFrom<i32> for LogType {
    type Error = String;

    fn try_from(code: i32) -> Result<Self, Self::Error> {
        match code {
            1 => Ok(LogType::Add),
            2 => Ok(LogType::Update),
            3 => Ok(LogType::Delete),
            other => Err(format!("Unknown log entry type: {other}")),
        }
    }
}

impl NewLogEntry {
    pub fn new(
        entry_type: LogType,
        package_name: String,
        version: Option<String>,
        user_id: Option<i32>,
    ) -> Self {
        Self {
            entry_type: entry_type.code(),
            package_name,
            version,
            user_id,
            created_at: chrono::Utc::now().naive_utc(),
        }
    }
}

impl LogEntry {
    pub fn log_type(&self) -> Result<LogType, String> {
        LogType::try_from(self.entry_type)
    }

    pub fn is_package_event(&self) -> bool {
        self.version.is_none()
    }
}
