use super::authors::AuthorOperations;
use super::connection::{DbConnection, DbPool, create_pool, get_connection_with_retry};
use super::log_entries::LogOperations;
use super::package_authors::PackageAuthorOperations;
use super::packages::PackageOperations;
use super::projection::ProjectionOperations;
use super::users::UserOperations;
use super::versions::VersionOperations;
use crate::error::Result;
use crate::models::*;
use chrono::NaiveDateTime;
use diesel::sqlite::SqliteConnection;

/// Main database service that provides a unified interface to all database operations
#[derive(Debug)]
pub struct DatabaseService {
    pub pool: DbPool,
}

impl DatabaseService {
    /// Opens the store at `database_url` and runs pending migrations
    pub fn new(database_url: &str) -> Result<Self> {
        let pool = create_pool(database_url)?;
        Ok(Self { pool })
    }

    /// Gets a connection from the pool with retry logic
    pub fn get_connection(&self) -> Result<DbConnection> {
        get_connection_with_retry(&self.pool)
    }

    /// Runs `f` inside an immediate (write-locking) transaction. Any error rolls
    /// back everything `f` did.
    pub fn transaction<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut SqliteConnection) -> Result<T>,
    {
        let mut conn = self.get_connection()?;
        conn.immediate_transaction(f)
    }

    pub fn packages(&self) -> PackageOperations<'_> {
        PackageOperations::new(&self.pool)
    }

    pub fn versions(&self) -> VersionOperations<'_> {
        VersionOperations::new(&self.pool)
    }

    pub fn authors(&self) -> AuthorOperations<'_> {
        AuthorOperations::new(&self.pool)
    }

    pub fn users(&self) -> UserOperations<'_> {
        UserOperations::new(&self.pool)
    }

    pub fn package_authors(&self) -> PackageAuthorOperations<'_> {
        PackageAuthorOperations::new(&self.pool)
    }

    pub fn log(&self) -> LogOperations<'_> {
        LogOperations::new(&self.pool)
    }

    pub fn projection(&self) -> ProjectionOperations<'_> {
        ProjectionOperations::new(&self.pool)
    }

    // Package operations
    pub fn create_package(
        &self,
        name: &str,
        author: Option<&Author>,
        creator: &User,
    ) -> Result<Package> {
        self.packages().create(name, author, creator)
    }

    pub fn remove_package(&self, package: &Package) -> Result<()> {
        self.packages().remove(package)
    }

    pub fn get_package_by_name(&self, name: &str) -> Result<Option<Package>> {
        self.packages().get_by_name(name)
    }

    pub fn get_packages_updated_since(&self, since: NaiveDateTime) -> Result<Vec<Package>> {
        self.packages().get_updated_since(since)
    }

    pub fn search_packages(&self, query: &str) -> Result<Vec<Package>> {
        self.packages().search(query)
    }

    // Version operations
    pub fn create_version(
        &self,
        package: &Package,
        descriptor: &str,
        file: &VersionFile,
        creator: &User,
    ) -> Result<Version> {
        self.versions().create(package, descriptor, file, creator.id)
    }

    pub fn remove_version(&self, package: &Package, version: &Version) -> Result<()> {
        self.versions().remove(package, version)
    }

    pub fn get_version(&self, package: &Package, version: &str) -> Result<Option<Version>> {
        self.versions().get_by_version(package, version)
    }

    pub fn get_package_versions(&self, package: &Package) -> Result<Vec<Version>> {
        self.versions().get_by_package(package)
    }

    // Projection operations
    pub fn serialize_package_min(&self, package: &Package) -> Result<PackageView> {
        self.projection().package_min(package)
    }

    pub fn serialize_package(&self, package: &Package) -> Result<PackageView> {
        self.projection().package(package)
    }

    pub fn serialize_version_min(&self, version: &Version) -> Result<VersionSummary> {
        self.projection().version_min(version)
    }

    pub fn serialize_version(&self, version: &Version) -> Result<VersionView> {
        self.projection().version(version)
    }
}
