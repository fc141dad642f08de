use super::connection::{DbPool, get_connection_with_retry};
use crate::error::{RegistryError, Result};
use crate::models::{Author, NewAuthor, Person};
use crate::schema::authors;
use diesel::prelude::*;
use diesel::sqlite::SqliteConnection;
use log::debug;

/// Author-related database operations
pub struct AuthorOperations<'a> {
    pool: &'a DbPool,
}

impl<'a> AuthorOperations<'a> {
    pub fn new(pool: &'a DbPool) -> Self {
        Self { pool }
    }

    pub fn create(&self, name: &str, email: Option<&str>, web: Option<&str>) -> Result<Author> {
        let mut conn = get_connection_with_retry(self.pool)?;
        create(&mut conn, name, email, web)
    }

    pub fn get_by_name(&self, name: &str) -> Result<Option<Author>> {
        let mut conn = get_connection_with_retry(self.pool)?;
        find_by_name(&mut conn, name)
    }

    pub fn get_by_email(&self, email: &str) -> Result<Option<Author>> {
        let mut conn = get_connection_with_retry(self.pool)?;
        find_by_email(&mut conn, email)
    }

    pub fn get_by_id(&self, id: i32) -> Result<Option<Author>> {
        let mut conn = get_connection_with_retry(self.pool)?;
        find_by_id(&mut conn, id)
    }
}

pub fn create(
    conn: &mut SqliteConnection,
    name: &str,
    email: Option<&str>,
    web: Option<&str>,
) -> Result<Author> {
    if name.trim().is_empty() {
        return Err(RegistryError::Validation(
            "Author name cannot be empty".to_string(),
        ));
    }

    let new_author = NewAuthor::new(
        name.to_string(),
        email.map(str::to_string),
        web.map(str::to_string),
    );

    Ok(diesel::insert_into(authors::table)
        .values(&new_author)
        .returning(Author::as_returning())
        .get_result(conn)?)
}

pub fn find_by_name(conn: &mut SqliteConnection, name: &str) -> Result<Option<Author>> {
    Ok(authors::table
        .filter(authors::name.eq(name))
        .order(authors::id.asc())
        .select(Author::as_select())
        .first(conn)
        .optional()?)
}

pub fn find_by_email(conn: &mut SqliteConnection, email: &str) -> Result<Option<Author>> {
    Ok(authors::table
        .filter(authors::email.eq(email))
        .order(authors::id.asc())
        .select(Author::as_select())
        .first(conn)
        .optional()?)
}

pub fn find_by_id(conn: &mut SqliteConnection, id: i32) -> Result<Option<Author>> {
    Ok(authors::table
        .find(id)
        .select(Author::as_select())
        .first(conn)
        .optional()?)
}

/// Matches a descriptor person to a stored author by email, then by name,
/// creating the author when neither matches. A person given only by email
/// (`"<jane@example.org>"`) is named after that email.
pub fn find_or_create(conn: &mut SqliteConnection, person: &Person) -> Result<Author> {
    let email = person.email.as_deref();
    if let Some(email) = email {
        if let Some(author) = find_by_email(conn, email)? {
            return Ok(author);
        }
    }

    let name = match (person.name.trim(), email) {
        ("", Some(email)) => email,
        ("", None) => {
            return Err(RegistryError::Validation(
                "Descriptor names a person without name or email".to_string(),
            ));
        }
        (name, _) => name,
    };

    if let Some(author) = find_by_name(conn, name)? {
        return Ok(author);
    }

    debug!("Creating author '{name}'");
    create(conn, name, email, person.web.as_deref())
}
