use crate::database::{
    DatabaseService, authors, log_entries, package_authors, packages, versions,
};
use crate::error::{RegistryError, Result};
use crate::models::{
    Author, Descriptor, LogEntry, LogType, Package, PackageView, Person, Role, User, Version,
    VersionFile, VersionView,
};
use crate::version_order;
use chrono::NaiveDateTime;
use diesel::sqlite::SqliteConnection;
use log::{debug, info, warn};
use rocket::serde::Serialize;
use std::cmp::Ordering;

/// A version submitted for publication.
#[derive(Debug, Clone)]
pub struct PublishRequest {
    /// Descriptor JSON exactly as it should be stored.
    pub descriptor: String,
    pub file: VersionFile,
    /// Replace an already published version instead of rejecting it.
    pub overwrite: bool,
}

#[derive(Debug)]
pub struct PublishOutcome {
    pub package: Package,
    pub version: Version,
    pub log_entry: LogEntry,
}

/// Changes since a point in time, as consumed by mirrors.
#[derive(Serialize, Debug)]
pub struct Updates {
    pub updated: Vec<PackageView>,
    pub removed: Vec<String>,
}

pub struct RegistryService;

impl RegistryService {
    /// Publishes one version. Package creation, version storage, latest promotion,
    /// author links and the audit entry commit together or not at all.
    pub fn publish(
        db: &DatabaseService,
        user: &User,
        request: &PublishRequest,
    ) -> Result<PublishOutcome> {
        let descriptor = Descriptor::parse(&request.descriptor)?;
        let name = descriptor.name.clone().ok_or_else(|| {
            RegistryError::Validation("Descriptor does not name the package".to_string())
        })?;

        debug!("Publishing {}@{} for {}", name, descriptor.version, user.name);

        let outcome = db.transaction(|conn| {
            let author = descriptor
                .author
                .as_ref()
                .map(|person| authors::find_or_create(conn, person))
                .transpose()?;

            let package = match packages::find_by_name(conn, &name)? {
                Some(existing) => {
                    ensure_owner(&existing, user)?;
                    existing
                }
                None => packages::create(conn, &name, author.as_ref().map(|a| a.id), user.id)?,
            };

            let (version, entry_type) =
                match versions::find_by_version(conn, package.id, &descriptor.version)? {
                    Some(existing) if request.overwrite => {
                        let version = versions::replace(
                            conn,
                            &package,
                            &existing,
                            &request.descriptor,
                            &request.file,
                            user.id,
                        )?;
                        (version, LogType::Update)
                    }
                    Some(_) => {
                        return Err(RegistryError::Validation(format!(
                            "Version {} of '{}' is already published",
                            descriptor.version, package.name
                        )));
                    }
                    None => {
                        let version = versions::create(
                            conn,
                            &package,
                            &request.descriptor,
                            &request.file,
                            user.id,
                        )?;
                        (version, LogType::Add)
                    }
                };

            promote_if_newest(conn, &package, &version)?;
            let package = packages::touch(conn, package.id, user.id, author.map(|a| a.id))?;

            link_people(conn, &package, &descriptor.maintainers, Role::Maintainer)?;
            link_people(conn, &package, &descriptor.contributors, Role::Contributor)?;

            let log_entry = log_entries::append(
                conn,
                entry_type,
                &package.name,
                Some(&version.version),
                Some(user.id),
            )?;

            Ok(PublishOutcome {
                package,
                version,
                log_entry,
            })
        })?;

        info!(
            "{} published {}@{}",
            user.name, outcome.package.name, outcome.version.version
        );
        Ok(outcome)
    }

    /// Removes one version. Removing the only remaining version removes the
    /// whole package, so no package is left without versions.
    pub fn unpublish_version(
        db: &DatabaseService,
        user: &User,
        name: &str,
        version: &str,
    ) -> Result<LogEntry> {
        let entry = db.transaction(|conn| {
            let package = existing_package(conn, name)?;
            ensure_owner(&package, user)?;

            let target = versions::find_by_version(conn, package.id, version)?.ok_or_else(|| {
                RegistryError::NotFound(format!("Version {version} of '{name}' not found"))
            })?;

            if versions::by_package(conn, package.id)?.len() == 1 {
                debug!("{name}@{version} is the last version, removing the package");
                packages::remove(conn, &package)?;
                return log_entries::append(conn, LogType::Delete, name, None, Some(user.id));
            }

            versions::remove(conn, &package, &target)?;
            packages::touch(conn, package.id, user.id, None)?;
            log_entries::append(
                conn,
                LogType::Delete,
                &package.name,
                Some(&target.version),
                Some(user.id),
            )
        })?;

        info!("{} unpublished {}@{}", user.name, name, version);
        Ok(entry)
    }

    /// Removes a package with every version and author link.
    pub fn unpublish_package(db: &DatabaseService, user: &User, name: &str) -> Result<LogEntry> {
        let entry = db.transaction(|conn| {
            let package = existing_package(conn, name)?;
            ensure_owner(&package, user)?;

            packages::remove(conn, &package)?;
            log_entries::append(conn, LogType::Delete, &package.name, None, Some(user.id))
        })?;

        info!("{} unpublished package {}", user.name, name);
        Ok(entry)
    }

    /// Minimal views of every package matching `query`.
    pub fn list_packages(db: &DatabaseService, query: &str) -> Result<Vec<PackageView>> {
        let packages = db.search_packages(query)?;
        Self::min_views(db, &packages)
    }

    pub fn package_view(db: &DatabaseService, name: &str) -> Result<PackageView> {
        let package = db
            .get_package_by_name(name)?
            .ok_or_else(|| RegistryError::NotFound(format!("Package '{name}' not found")))?;
        db.serialize_package(&package)
    }

    pub fn version_view(db: &DatabaseService, name: &str, version: &str) -> Result<VersionView> {
        let package = db
            .get_package_by_name(name)?
            .ok_or_else(|| RegistryError::NotFound(format!("Package '{name}' not found")))?;
        let version = db.get_version(&package, version)?.ok_or_else(|| {
            RegistryError::NotFound(format!("Version {version} of '{name}' not found"))
        })?;
        db.serialize_version(&version)
    }

    /// Packages modified and packages removed after `since`.
    pub fn updates_since(db: &DatabaseService, since: NaiveDateTime) -> Result<Updates> {
        let packages = db.get_packages_updated_since(since)?;
        Ok(Updates {
            updated: Self::min_views(db, &packages)?,
            removed: db.log().get_removed_packages(since)?,
        })
    }

    fn min_views(db: &DatabaseService, packages: &[Package]) -> Result<Vec<PackageView>> {
        let mut views = Vec::with_capacity(packages.len());
        for package in packages {
            match db.serialize_package_min(package) {
                Ok(view) => views.push(view),
                // A package without versions has nothing to show yet.
                Err(RegistryError::InvariantViolation(msg)) => warn!("Skipping package: {msg}"),
                Err(e) => return Err(e),
            }
        }
        Ok(views)
    }
}

fn existing_package(conn: &mut SqliteConnection, name: &str) -> Result<Package> {
    packages::find_by_name(conn, name)?
        .ok_or_else(|| RegistryError::NotFound(format!("Package '{name}' not found")))
}

fn ensure_owner(package: &Package, user: &User) -> Result<()> {
    if package.is_owner(user) {
        Ok(())
    } else {
        Err(RegistryError::Forbidden(format!(
            "User '{}' does not own package '{}'",
            user.name, package.name
        )))
    }
}

/// Makes `version` the package's latest when no stored latest outranks it.
fn promote_if_newest(
    conn: &mut SqliteConnection,
    package: &Package,
    version: &Version,
) -> Result<()> {
    let current = match package.latest_version_id {
        Some(id) => versions::find_by_id(conn, id)?,
        None => None,
    };

    let promote = current.as_ref().is_none_or(|latest| {
        version_order::compare(&version.version, &latest.version) != Ordering::Less
    });

    if promote {
        debug!("{}@{} becomes latest", package.name, version.version);
        packages::set_latest_version(conn, package.id, Some(version.id))?;
    }
    Ok(())
}

fn link_people(
    conn: &mut SqliteConnection,
    package: &Package,
    people: &[Person],
    role: Role,
) -> Result<Vec<Author>> {
    people
        .iter()
        .map(|person| {
            let author = authors::find_or_create(conn, person)?;
            package_authors::ensure(conn, package.id, author.id, role)?;
            Ok(author)
        })
        .collect()
}

