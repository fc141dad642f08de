use crate::models::user::User;
use crate::models::version::Version;
use crate::schema::packages;
use chrono::NaiveDateTime;
use diesel::prelude::*;
use rocket::serde::{Deserialize, Serialize};

pub const MAX_PACKAGE_NAME_LENGTH: usize = 255;

// Package model - identity and ownership; version data lives in `versions`
#[derive(Queryable, Selectable, Identifiable, Serialize, Deserialize, Debug, Clone)]
#[diesel(table_name = packages)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct Package {
    pub id: i32,
    pub name: String,
    pub author_id: Option<i32>,
    pub latest_version_id: Option<i32>,
    pub creator_id: i32,
    pub modifier_id: i32,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Insertable, Debug)]
#[diesel(table_name = packages)]
pub struct NewPackage {
    pub name: String,
    pub author_id: Option<i32>,
    pub latest_version_id: Option<i32>,
    pub creator_id: i32,
    pub modifier_id: i32,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(AsChangeset, Debug)]
#[diesel(table_name = packages)]
pub struct UpdatePackage {
    pub author_id: Option<Option<i32>>,
    pub latest_version_id: Option<Option<i32>>,
    pub modifier_id: Option<i32>,
    pub updated_at: Option<NaiveDateTime>,
}

impl NewPackage {
    pub fn new(name: String, author_id: Option<i32>, creator_id: i32) -> Self {
        let now = chrono::Utc::now().naive_utc();
        Self {
            name,
            author_id,
            latest_version_id: None,
            creator_id,
            modifier_id: creator_id,
            created_at: now,
            updated_at: now,
        }
    }
}

impl Package {
    /// True when `user` created this package.
    pub fn is_owner(&self, user: &User) -> bool {
        self.creator_id == user.id
    }

    /// True when `version` is the version this package currently points at as latest.
    pub fn is_latest_version(&self, version: &Version) -> bool {
        self.latest_version_id == Some(version.id)
    }
}

impl PartialEq for Package {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Package {}

/// Rejects names the registry cannot store.
pub fn validate_package_name(name: &str) -> Result<(), String> {
    if name.trim().is_empty() {
        return Err("Package name cannot be empty".to_string());
    }

    if name.chars().count() > MAX_PACKAGE_NAME_LENGTH {
        return Err(format!(
            "Package name cannot be longer than {MAX_PACKAGE_NAME_LENGTH} characters"
        ));
    }

    Ok(())
}
