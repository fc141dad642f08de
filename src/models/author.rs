use crate::schema::{authors, package_authors};
use chrono::NaiveDateTime;
use diesel::prelude::*;
use rocket::serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// Author identity, independent of registry accounts
#[derive(Queryable, Selectable, Identifiable, Serialize, Deserialize, Debug, Clone)]
#[diesel(table_name = authors)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct Author {
    pub id: i32,
    pub name: String,
    pub email: Option<String>,
    pub web: Option<String>,
    pub created_at: NaiveDateTime,
}

#[derive(Insertable, Debug)]
#[diesel(table_name = authors)]
pub struct NewAuthor {
    pub name: String,
    pub email: Option<String>,
    pub web: Option<String>,
    pub created_at: NaiveDateTime,
}

impl NewAuthor {
    pub fn new(name: String, email: Option<String>, web: Option<String>) -> Self {
        Self {
            name,
            email,
            web,
            created_at: chrono::Utc::now().naive_utc(),
        }
    }
}

impl PartialEq for Author {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Author {}

// Join row between a package and an author, tagged with a role
#[derive(Queryable, Selectable, Identifiable, Serialize, Deserialize, Debug, Clone)]
#[diesel(table_name = package_authors)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct PackageAuthor {
    pub id: i32,
    pub package_id: i32,
    pub author_id: i32,
    pub role: String,
}

#[derive(Insertable, Debug)]
#[diesel(table_name = package_authors)]
pub struct NewPackageAuthor {
    pub package_id: i32,
    pub author_id: i32,
    pub role: String,
}

impl NewPackageAuthor {
    pub fn new(package_id: i32, author_id: i32, role: Role) -> Self {
        Self {
            package_id,
            author_id,
            role: role.to_string(),
        }
    }
}

impl PackageAuthor {
    pub fn role(&self) -> Result<Role, String> {
        self.role.parse()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Maintainer,
    Contributor,
}

impl Role {
    pub const ALL: [Role; 2] = [Role::Contributor, Role::Maintainer];

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Maintainer => "maintainer",
            Role::Contributor => "contributor",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "maintainer" => Ok(Role::Maintainer),
            "contributor" => Ok(Role::Contributor),
            other => Err(format!("Invalid role: {other}")),
        }
    }
}
