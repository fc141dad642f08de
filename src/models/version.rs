use crate::schema::versions;
use chrono::NaiveDateTime;
use diesel::prelude::*;
use rocket::serde::{Deserialize, Serialize};

// Version model - one published artifact of a package
#[derive(Queryable, Selectable, Identifiable, Serialize, Deserialize, Debug, Clone)]
#[diesel(table_name = versions)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct Version {
    pub id: i32,
    pub package_id: i32,
    pub version: String,
    pub descriptor: String, // package manifest JSON, stored verbatim
    pub filename: String,
    pub filesize: i64,
    pub md5: String,
    pub sha1: String,
    pub sha256: String,
    pub creator_id: i32,
    pub modifier_id: i32,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Insertable, Debug)]
#[diesel(table_name = versions)]
pub struct NewVersion {
    pub package_id: i32,
    pub version: String,
    pub descriptor: String,
    pub filename: String,
    pub filesize: i64,
    pub md5: String,
    pub sha1: String,
    pub sha256: String,
    pub creator_id: i32,
    pub modifier_id: i32,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

/// Replaces the artifact of an already published version.
#[derive(AsChangeset, Debug)]
#[diesel(table_name = versions)]
pub struct UpdateVersion {
    pub descriptor: String,
    pub filename: String,
    pub filesize: i64,
    pub md5: String,
    pub sha1: String,
    pub sha256: String,
    pub modifier_id: i32,
    pub updated_at: NaiveDateTime,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct Checksums {
    pub md5: String,
    pub sha1: String,
    pub sha256: String,
}

/// Archive details of a version as submitted by a publisher.
#[derive(Debug, Clone)]
pub struct VersionFile {
    pub filename: String,
    pub filesize: i64,
    pub checksums: Checksums,
}

impl NewVersion {
    pub fn new(
        package_id: i32,
        version: String,
        descriptor: String,
        file: &VersionFile,
        creator_id: i32,
    ) -> Self {
        let now = chrono::Utc::now().naive_utc();
        Self {
            package_id,
            version,
            descriptor,
            filename: file.filename.clone(),
            filesize: file.filesize,
            md5: file.checksums.md5.clone(),
            sha1: file.checksums.sha1.clone(),
            sha256: file.checksums.sha256.clone(),
            creator_id,
            modifier_id: creator_id,
            created_at: now,
            updated_at: now,
        }
    }
}

impl UpdateVersion {
    pub fn new(descriptor: String, file: &VersionFile, modifier_id: i32) -> Self {
        Self {
            descriptor,
            filename: file.filename.clone(),
            filesize: file.filesize,
            md5: file.checksums.md5.clone(),
            sha1: file.checksums.sha1.clone(),
            sha256: file.checksums.sha256.clone(),
            modifier_id,
            updated_at: chrono::Utc::now().naive_utc(),
        }
    }
}

impl Version {
    pub fn checksums(&self) -> Checksums {
        Checksums {
            md5: self.md5.clone(),
            sha1: self.sha1.clone(),
            sha256: self.sha256.clone(),
        }
    }
}

impl PartialEq for Version {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Version {}
