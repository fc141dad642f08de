use super::connection::{DbPool, get_connection_with_retry};
use super::map_unique_violation;
use crate::error::{RegistryError, Result};
use crate::models::{Author, NewPackageAuthor, Package, PackageAuthor, Role};
use crate::schema::{authors, package_authors};
use diesel::prelude::*;
use diesel::sqlite::SqliteConnection;
use log::debug;

/// Operations on the package/author role links
pub struct PackageAuthorOperations<'a> {
    pool: &'a DbPool,
}

impl<'a> PackageAuthorOperations<'a> {
    pub fn new(pool: &'a DbPool) -> Self {
        Self { pool }
    }

    /// Links `author` to `package` in `role`. A link that already exists is rejected.
    pub fn create(&self, package: &Package, author: &Author, role: Role) -> Result<PackageAuthor> {
        let mut conn = get_connection_with_retry(self.pool)?;
        conn.immediate_transaction(|conn| create(conn, package.id, author.id, role))
    }

    /// Finds the link for `(package, author)`; without a role the first link in any role matches.
    pub fn get(
        &self,
        package: &Package,
        author: &Author,
        role: Option<Role>,
    ) -> Result<Option<PackageAuthor>> {
        let mut conn = get_connection_with_retry(self.pool)?;
        find(&mut conn, package.id, author.id, role)
    }

    pub fn remove(&self, link: &PackageAuthor) -> Result<()> {
        let mut conn = get_connection_with_retry(self.pool)?;
        delete(&mut conn, link)
    }

    pub fn maintainers(&self, package: &Package) -> Result<Vec<Author>> {
        let mut conn = get_connection_with_retry(self.pool)?;
        authors_with_role(&mut conn, package.id, Role::Maintainer)
    }

    pub fn contributors(&self, package: &Package) -> Result<Vec<Author>> {
        let mut conn = get_connection_with_retry(self.pool)?;
        authors_with_role(&mut conn, package.id, Role::Contributor)
    }
}

pub fn create(
    conn: &mut SqliteConnection,
    package_id: i32,
    author_id: i32,
    role: Role,
) -> Result<PackageAuthor> {
    if find(conn, package_id, author_id, Some(role))?.is_some() {
        return Err(RegistryError::Validation(format!(
            "Author {author_id} is already a {role} of package {package_id}"
        )));
    }

    let new_link = NewPackageAuthor::new(package_id, author_id, role);

    Ok(diesel::insert_into(package_authors::table)
        .values(&new_link)
        .returning(PackageAuthor::as_returning())
        .get_result(conn)
        .map_err(|e| {
            map_unique_violation(e, || {
                format!("Author {author_id} is already a {role} of package {package_id}")
            })
        })?)
}

/// Returns the existing link or creates it.
pub fn ensure(
    conn: &mut SqliteConnection,
    package_id: i32,
    author_id: i32,
    role: Role,
) -> Result<PackageAuthor> {
    match find(conn, package_id, author_id, Some(role))? {
        Some(link) => Ok(link),
        None => {
            debug!("Linking author {author_id} to package {package_id} as {role}");
            create(conn, package_id, author_id, role)
        }
    }
}

pub fn find(
    conn: &mut SqliteConnection,
    package_id: i32,
    author_id: i32,
    role: Option<Role>,
) -> Result<Option<PackageAuthor>> {
    let mut query = package_authors::table
        .filter(package_authors::package_id.eq(package_id))
        .filter(package_authors::author_id.eq(author_id))
        .order(package_authors::id.asc())
        .select(PackageAuthor::as_select())
        .into_boxed();

    if let Some(role) = role {
        query = query.filter(package_authors::role.eq(role.as_str()));
    }

    Ok(query.first(conn).optional()?)
}

pub fn delete(conn: &mut SqliteConnection, link: &PackageAuthor) -> Result<()> {
    diesel::delete(package_authors::table.find(link.id)).execute(conn)?;
    Ok(())
}

/// Authors linked to the package in `role`, in link order.
pub fn authors_with_role(
    conn: &mut SqliteConnection,
    package_id: i32,
    role: Role,
) -> Result<Vec<Author>> {
    Ok(package_authors::table
        .inner_join(authors::table)
        .filter(package_authors::package_id.eq(package_id))
        .filter(package_authors::role.eq(role.as_str()))
        .order(package_authors::id.asc())
        .select(Author::as_select())
        .load(conn)?)
}
