use super::connection::{DbPool, get_connection_with_retry};
use super::{map_unique_violation, package_authors};
use crate::error::{RegistryError, Result};
use crate::models::{Author, NewPackage, Package, Role, UpdatePackage, User, Version};
use crate::schema::{packages, versions};
use chrono::NaiveDateTime;
use diesel::prelude::*;
use diesel::sqlite::SqliteConnection;
use log::{debug, info};

/// Package-related database operations
pub struct PackageOperations<'a> {
    pool: &'a DbPool,
}

impl<'a> PackageOperations<'a> {
    pub fn new(pool: &'a DbPool) -> Self {
        Self { pool }
    }

    /// Creates a package owned by `creator`. Fails when the name is taken.
    pub fn create(
        &self,
        name: &str,
        author: Option<&Author>,
        creator: &User,
    ) -> Result<Package> {
        let mut conn = get_connection_with_retry(self.pool)?;
        conn.immediate_transaction(|conn| create(conn, name, author.map(|a| a.id), creator.id))
    }

    /// Removes the package with all its versions and author links, atomically.
    pub fn remove(&self, package: &Package) -> Result<()> {
        let mut conn = get_connection_with_retry(self.pool)?;
        conn.immediate_transaction(|conn| remove(conn, package))
    }

    pub fn get_by_name(&self, name: &str) -> Result<Option<Package>> {
        let mut conn = get_connection_with_retry(self.pool)?;
        find_by_name(&mut conn, name)
    }

    pub fn get_by_id(&self, id: i32) -> Result<Option<Package>> {
        let mut conn = get_connection_with_retry(self.pool)?;
        find_by_id(&mut conn, id)
    }

    /// Packages modified strictly after `since`.
    pub fn get_updated_since(&self, since: NaiveDateTime) -> Result<Vec<Package>> {
        let mut conn = get_connection_with_retry(self.pool)?;
        updated_since(&mut conn, since)
    }

    /// Placeholder search: every package is returned regardless of `query`.
    pub fn search(&self, query: &str) -> Result<Vec<Package>> {
        debug!("Package search for '{query}' returns all packages");
        self.all()
    }

    pub fn all(&self) -> Result<Vec<Package>> {
        let mut conn = get_connection_with_retry(self.pool)?;
        all(&mut conn)
    }

    /// Points the package at `version` as its latest. The caller decides when a
    /// version deserves promotion.
    pub fn set_latest_version(&self, package: &Package, version: &Version) -> Result<Package> {
        if version.package_id != package.id {
            return Err(RegistryError::Validation(format!(
                "Version {} does not belong to package '{}'",
                version.version, package.name
            )));
        }

        let mut conn = get_connection_with_retry(self.pool)?;
        conn.immediate_transaction(|conn| set_latest_version(conn, package.id, Some(version.id)))
    }
}

pub fn create(
    conn: &mut SqliteConnection,
    name: &str,
    author_id: Option<i32>,
    creator_id: i32,
) -> Result<Package> {
    crate::models::validate_package_name(name).map_err(RegistryError::Validation)?;

    if find_by_name(conn, name)?.is_some() {
        return Err(RegistryError::Validation(format!(
            "Package '{name}' already exists"
        )));
    }

    let new_package = NewPackage::new(name.to_string(), author_id, creator_id);

    let package = diesel::insert_into(packages::table)
        .values(&new_package)
        .returning(Package::as_returning())
        .get_result(conn)
        .map_err(|e| map_unique_violation(e, || format!("Package '{name}' already exists")))?;

    info!("Created package '{}' (id {})", package.name, package.id);
    Ok(package)
}

pub fn remove(conn: &mut SqliteConnection, package: &Package) -> Result<()> {
    // With no latest pointer left, removing each version needs no successor.
    diesel::update(packages::table.find(package.id))
        .set(packages::latest_version_id.eq(None::<i32>))
        .execute(conn)?;

    let removed_versions =
        diesel::delete(versions::table.filter(versions::package_id.eq(package.id)))
            .execute(conn)?;

    let mut removed_links = 0;
    for role in Role::ALL {
        for author in package_authors::authors_with_role(conn, package.id, role)? {
            if let Some(link) = package_authors::find(conn, package.id, author.id, Some(role))? {
                package_authors::delete(conn, &link)?;
                removed_links += 1;
            }
        }
    }

    let removed = diesel::delete(packages::table.find(package.id)).execute(conn)?;
    if removed == 0 {
        return Err(RegistryError::NotFound(format!(
            "Package '{}' no longer exists",
            package.name
        )));
    }

    info!(
        "Removed package '{}' with {} versions and {} author links",
        package.name, removed_versions, removed_links
    );
    Ok(())
}

pub fn find_by_name(conn: &mut SqliteConnection, name: &str) -> Result<Option<Package>> {
    Ok(packages::table
        .filter(packages::name.eq(name))
        .select(Package::as_select())
        .first(conn)
        .optional()?)
}

pub fn find_by_id(conn: &mut SqliteConnection, id: i32) -> Result<Option<Package>> {
    Ok(packages::table
        .find(id)
        .select(Package::as_select())
        .first(conn)
        .optional()?)
}

pub fn updated_since(conn: &mut SqliteConnection, since: NaiveDateTime) -> Result<Vec<Package>> {
    Ok(packages::table
        .filter(packages::updated_at.gt(since))
        .order(packages::id.asc())
        .select(Package::as_select())
        .load(conn)?)
}

pub fn all(conn: &mut SqliteConnection) -> Result<Vec<Package>> {
    Ok(packages::table
        .order(packages::name.asc())
        .select(Package::as_select())
        .load(conn)?)
}

pub fn set_latest_version(
    conn: &mut SqliteConnection,
    package_id: i32,
    version_id: Option<i32>,
) -> Result<Package> {
    let changes = UpdatePackage {
        author_id: None,
        latest_version_id: Some(version_id),
        modifier_id: None,
        updated_at: None,
    };

    Ok(diesel::update(packages::table.find(package_id))
        .set(&changes)
        .returning(Package::as_returning())
        .get_result(conn)?)
}

/// Records a modification of the package by `modifier_id`.
pub fn touch(
    conn: &mut SqliteConnection,
    package_id: i32,
    modifier_id: i32,
    author_id: Option<i32>,
) -> Result<Package> {
    let changes = UpdatePackage {
        author_id: author_id.map(Some),
        latest_version_id: None,
        modifier_id: Some(modifier_id),
        updated_at: Some(chrono::Utc::now().naive_utc()),
    };

    Ok(diesel::update(packages::table.find(package_id))
        .set(&changes)
        .returning(Package::as_returning())
        .get_result(conn)?)
}
