use super::connection::{DbPool, get_connection_with_retry};
use super::map_unique_violation;
use crate::error::{RegistryError, Result};
use crate::models::{NewUser, User};
use crate::schema::users;
use diesel::prelude::*;
use diesel::sqlite::SqliteConnection;
use log::info;

/// Account-related database operations
pub struct UserOperations<'a> {
    pool: &'a DbPool,
}

impl<'a> UserOperations<'a> {
    pub fn new(pool: &'a DbPool) -> Self {
        Self { pool }
    }

    /// Registers an account. Password and salt are stored as given.
    pub fn create(&self, name: &str, password: &str, salt: &str, email: &str) -> Result<User> {
        let mut conn = get_connection_with_retry(self.pool)?;
        conn.immediate_transaction(|conn| create(conn, name, password, salt, email))
    }

    pub fn get_by_name(&self, name: &str) -> Result<Option<User>> {
        let mut conn = get_connection_with_retry(self.pool)?;
        find_by_name(&mut conn, name)
    }

    pub fn get_by_id(&self, id: i32) -> Result<Option<User>> {
        let mut conn = get_connection_with_retry(self.pool)?;
        find_by_id(&mut conn, id)
    }
}

pub fn create(
    conn: &mut SqliteConnection,
    name: &str,
    password: &str,
    salt: &str,
    email: &str,
) -> Result<User> {
    if name.trim().is_empty() {
        return Err(RegistryError::Validation(
            "Username cannot be empty".to_string(),
        ));
    }

    if find_by_name(conn, name)?.is_some() {
        return Err(RegistryError::Validation(format!(
            "Username '{name}' already exists"
        )));
    }

    let new_user = NewUser::new(
        name.to_string(),
        password.to_string(),
        salt.to_string(),
        email.to_string(),
    );

    let user = diesel::insert_into(users::table)
        .values(&new_user)
        .returning(User::as_returning())
        .get_result(conn)
        .map_err(|e| map_unique_violation(e, || format!("Username '{name}' already exists")))?;

    info!("Registered user '{}'", user.name);
    Ok(user)
}

pub fn find_by_name(conn: &mut SqliteConnection, name: &str) -> Result<Option<User>> {
    Ok(users::table
        .filter(users::name.eq(name))
        .select(User::as_select())
        .first(conn)
        .optional()?)
}

pub fn find_by_id(conn: &mut SqliteConnection, id: i32) -> Result<Option<User>> {
    Ok(users::table
        .find(id)
        .select(User::as_select())
        .first(conn)
        .optional()?)
}
