use super::connection::{DbPool, get_connection_with_retry};
use super::{map_unique_violation, packages};
use crate::error::{RegistryError, Result};
use crate::models::{Descriptor, NewVersion, Package, UpdateVersion, Version, VersionFile};
use crate::schema::versions;
use crate::version_order;
use diesel::prelude::*;
use diesel::sqlite::SqliteConnection;
use log::{debug, info};

/// Package version-related database operations
pub struct VersionOperations<'a> {
    pool: &'a DbPool,
}

impl<'a> VersionOperations<'a> {
    pub fn new(pool: &'a DbPool) -> Self {
        Self { pool }
    }

    /// Stores a new version of `package`. Promotion to latest is left to the caller.
    pub fn create(
        &self,
        package: &Package,
        descriptor: &str,
        file: &VersionFile,
        creator_id: i32,
    ) -> Result<Version> {
        let mut conn = get_connection_with_retry(self.pool)?;
        conn.immediate_transaction(|conn| create(conn, package, descriptor, file, creator_id))
    }

    /// Removes `version`, moving the package's latest pointer to the next
    /// highest version when `version` was the latest.
    pub fn remove(&self, package: &Package, version: &Version) -> Result<()> {
        let mut conn = get_connection_with_retry(self.pool)?;
        conn.immediate_transaction(|conn| remove(conn, package, version))
    }

    pub fn get_by_version(&self, package: &Package, version: &str) -> Result<Option<Version>> {
        let mut conn = get_connection_with_retry(self.pool)?;
        find_by_version(&mut conn, package.id, version)
    }

    pub fn get_by_id(&self, id: i32) -> Result<Option<Version>> {
        let mut conn = get_connection_with_retry(self.pool)?;
        find_by_id(&mut conn, id)
    }

    /// All versions of `package`, in no particular version order.
    pub fn get_by_package(&self, package: &Package) -> Result<Vec<Version>> {
        let mut conn = get_connection_with_retry(self.pool)?;
        by_package(&mut conn, package.id)
    }
}

/// Parses the descriptor and checks it can be stored for `package`.
fn validated_descriptor(package: &Package, text: &str) -> Result<Descriptor> {
    let descriptor = Descriptor::parse(text)?;
    version_order::parse(&descriptor.version)?;

    if let Some(name) = &descriptor.name {
        if name != &package.name {
            return Err(RegistryError::Validation(format!(
                "Descriptor names '{name}' but the package is '{}'",
                package.name
            )));
        }
    }

    Ok(descriptor)
}

pub fn create(
    conn: &mut SqliteConnection,
    package: &Package,
    descriptor_text: &str,
    file: &VersionFile,
    creator_id: i32,
) -> Result<Version> {
    let descriptor = validated_descriptor(package, descriptor_text)?;

    if find_by_version(conn, package.id, &descriptor.version)?.is_some() {
        return Err(RegistryError::Validation(format!(
            "Version {} of '{}' already exists",
            descriptor.version, package.name
        )));
    }

    let new_version = NewVersion::new(
        package.id,
        descriptor.version.clone(),
        descriptor_text.to_string(),
        file,
        creator_id,
    );

    let version = diesel::insert_into(versions::table)
        .values(&new_version)
        .returning(Version::as_returning())
        .get_result(conn)
        .map_err(|e| {
            map_unique_violation(e, || {
                format!(
                    "Version {} of '{}' already exists",
                    descriptor.version, package.name
                )
            })
        })?;

    info!("Stored {}@{}", package.name, version.version);
    Ok(version)
}

/// Replaces descriptor and archive of an existing version in place.
pub fn replace(
    conn: &mut SqliteConnection,
    package: &Package,
    version: &Version,
    descriptor_text: &str,
    file: &VersionFile,
    modifier_id: i32,
) -> Result<Version> {
    let descriptor = validated_descriptor(package, descriptor_text)?;

    if descriptor.version != version.version {
        return Err(RegistryError::Validation(format!(
            "Descriptor version {} does not match {}",
            descriptor.version, version.version
        )));
    }

    let changes = UpdateVersion::new(descriptor_text.to_string(), file, modifier_id);

    let updated = diesel::update(versions::table.find(version.id))
        .set(&changes)
        .returning(Version::as_returning())
        .get_result(conn)?;

    info!("Replaced {}@{}", package.name, version.version);
    Ok(updated)
}

pub fn remove(conn: &mut SqliteConnection, package: &Package, version: &Version) -> Result<()> {
    if version.package_id != package.id {
        return Err(RegistryError::Validation(format!(
            "Version {} does not belong to package '{}'",
            version.version, package.name
        )));
    }

    // The caller's copy may be stale; the latest pointer is read inside the transaction.
    let current = packages::find_by_id(conn, package.id)?.ok_or_else(|| {
        RegistryError::NotFound(format!("Package '{}' no longer exists", package.name))
    })?;

    if current.is_latest_version(version) {
        let remaining: Vec<Version> = by_package(conn, current.id)?
            .into_iter()
            .filter(|v| v.id != version.id)
            .collect();

        let successor = version_order::max(remaining.iter().map(|v| v.version.as_str()))
            .and_then(|highest| remaining.iter().find(|v| v.version == highest))
            .ok_or_else(|| {
                RegistryError::InvariantViolation(format!(
                    "Cannot remove {}@{}: no other version can become latest",
                    current.name, version.version
                ))
            })?;

        debug!(
            "Latest of '{}' moves from {} to {}",
            current.name, version.version, successor.version
        );
        packages::set_latest_version(conn, current.id, Some(successor.id))?;
    }

    let removed = diesel::delete(versions::table.find(version.id)).execute(conn)?;
    if removed == 0 {
        return Err(RegistryError::NotFound(format!(
            "Version {} of '{}' no longer exists",
            version.version, current.name
        )));
    }

    info!("Removed {}@{}", current.name, version.version);
    Ok(())
}

pub fn find_by_version(
    conn: &mut SqliteConnection,
    package_id: i32,
    version: &str,
) -> Result<Option<Version>> {
    Ok(versions::table
        .filter(versions::package_id.eq(package_id))
        .filter(versions::version.eq(version))
        .select(Version::as_select())
        .first(conn)
        .optional()?)
}

pub fn find_by_id(conn: &mut SqliteConnection, id: i32) -> Result<Option<Version>> {
    Ok(versions::table
        .find(id)
        .select(Version::as_select())
        .first(conn)
        .optional()?)
}

pub fn by_package(conn: &mut SqliteConnection, package_id: i32) -> Result<Vec<Version>> {
    Ok(versions::table
        .filter(versions::package_id.eq(package_id))
        .order(versions::id.asc())
        .select(Version::as_select())
        .load(conn)?)
}
