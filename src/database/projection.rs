use super::connection::{DbPool, get_connection_with_retry};
use super::{authors, package_authors, packages, versions};
use crate::error::{RegistryError, Result};
use crate::models::{Package, PackageView, Role, Version, VersionSummary, VersionView};
use diesel::prelude::*;
use diesel::sqlite::SqliteConnection;

/// Loads what the client-facing views need and builds them. Each view is read
/// inside one transaction so it reflects a single state of the store.
pub struct ProjectionOperations<'a> {
    pool: &'a DbPool,
}

impl<'a> ProjectionOperations<'a> {
    pub fn new(pool: &'a DbPool) -> Self {
        Self { pool }
    }

    pub fn package_min(&self, package: &Package) -> Result<PackageView> {
        let mut conn = get_connection_with_retry(self.pool)?;
        conn.transaction(|conn| package_min(conn, package))
    }

    pub fn package(&self, package: &Package) -> Result<PackageView> {
        let mut conn = get_connection_with_retry(self.pool)?;
        conn.transaction(|conn| package_full(conn, package))
    }

    pub fn version_min(&self, version: &Version) -> Result<VersionSummary> {
        let mut conn = get_connection_with_retry(self.pool)?;
        let package = owning_package(&mut conn, version)?;
        Ok(VersionSummary::new(&package.name, version))
    }

    pub fn version(&self, version: &Version) -> Result<VersionView> {
        let mut conn = get_connection_with_retry(self.pool)?;
        conn.transaction(|conn| {
            let package = owning_package(conn, version)?;
            VersionView::new(package_min(conn, &package)?, version)
        })
    }
}

fn owning_package(conn: &mut SqliteConnection, version: &Version) -> Result<Package> {
    packages::find_by_id(conn, version.package_id)?.ok_or_else(|| {
        RegistryError::NotFound(format!(
            "Package {} of version {} no longer exists",
            version.package_id, version.version
        ))
    })
}

pub fn package_min(conn: &mut SqliteConnection, package: &Package) -> Result<PackageView> {
    let latest = match package.latest_version_id {
        Some(id) => versions::find_by_id(conn, id)?,
        None => None,
    }
    .ok_or_else(|| {
        RegistryError::InvariantViolation(format!(
            "Package '{}' has no latest version",
            package.name
        ))
    })?;

    let author = match package.author_id {
        Some(id) => authors::find_by_id(conn, id)?,
        None => None,
    };
    let maintainers = package_authors::authors_with_role(conn, package.id, Role::Maintainer)?;
    let contributors = package_authors::authors_with_role(conn, package.id, Role::Contributor)?;

    PackageView::new(package, &latest, author.as_ref(), &maintainers, &contributors)
}

pub fn package_full(conn: &mut SqliteConnection, package: &Package) -> Result<PackageView> {
    let view = package_min(conn, package)?;
    let versions = versions::by_package(conn, package.id)?;
    Ok(view.with_versions(&versions))
}
