//! Code for creating the user table and creating, fetching and updating users.

use std::fmt::Display;

use rusqlite::{Connection, Row};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::{Error, password::PasswordHash};

/// A newtype wrapper for integer user IDs.
///
/// This helps disambiguate user IDs from other types of IDs, leading to better compile time
/// errors, and more flexible generics that can have distinct implementations for multiple ID types.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, Hash)]
pub struct UserID(i64);

impl UserID {
    /// Create a new user ID.
    pub fn new(id: i64) -> Self {
        Self(id)
    }

    /// Cast the user ID to a 64 bit integer.
    pub fn as_i64(&self) -> i64 {
        self.0
    }
}

impl Display for UserID {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// The role assigned to a user account.
///
/// Roles are recorded on the user record but carry no extra permissions in the
/// backend: every operation is scoped to the authenticated user's own records.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, async_graphql::Enum)]
#[graphql(rename_items = "lowercase")]
pub enum Role {
    /// Full administrative access in clients.
    Admin,
    /// The default role for new registrations.
    Member,
    /// The owner of a shared budget in clients.
    Owner,
    /// Read-only access in clients.
    Viewer,
}

impl Role {
    /// The string stored in the database for this role.
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Member => "member",
            Role::Owner => "owner",
            Role::Viewer => "viewer",
        }
    }

    /// Parse a role from its stored string form.
    ///
    /// Unknown strings fall back to [Role::Member] so that old rows stay readable.
    pub fn from_str_or_default(raw: &str) -> Self {
        match raw {
            "admin" => Role::Admin,
            "owner" => Role::Owner,
            "viewer" => Role::Viewer,
            _ => Role::Member,
        }
    }
}

/// A user of the application.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    /// The user's ID in the application database.
    pub id: UserID,
    /// The display name entered at registration.
    pub name: String,
    /// The user's email address. Unique across all users.
    pub email: String,
    /// The user's password hash. Never returned to clients.
    pub password_hash: PasswordHash,
    /// The user's role.
    pub role: Role,
    /// When the user registered.
    pub created_at: OffsetDateTime,
    /// When the user record was last modified.
    pub updated_at: OffsetDateTime,
}

/// The fields that may be changed by the `updateUser` mutation.
///
/// Fields left as `None` keep their stored values.
#[derive(Debug, Clone, Default)]
pub struct UserPatch {
    pub name: Option<String>,
    pub role: Option<Role>,
}

/// Create the user table.
///
/// # Errors
///
/// This function will return an error if the SQL query failed.
pub fn create_user_table(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute(
        "CREATE TABLE IF NOT EXISTS user (
                id INTEGER PRIMARY KEY,
                name TEXT NOT NULL,
                email TEXT NOT NULL UNIQUE,
                password TEXT NOT NULL,
                role TEXT NOT NULL DEFAULT 'member',
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
                )",
        (),
    )?;

    Ok(())
}

/// Create and insert a new user into the database with the default role.
///
/// # Errors
///
/// This function will return an error if:
/// - `email` already belongs to a registered user ([Error::DuplicateEmail]),
/// - or there was some other SQL error.
pub fn create_user(
    name: &str,
    email: &str,
    password_hash: PasswordHash,
    connection: &Connection,
) -> Result<User, Error> {
    let now = OffsetDateTime::now_utc();

    connection.execute(
        "INSERT INTO user (name, email, password, role, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        (
            name,
            email,
            password_hash.as_ref(),
            Role::Member.as_str(),
            &now,
            &now,
        ),
    )?;

    let id = UserID::new(connection.last_insert_rowid());

    Ok(User {
        id,
        name: name.to_owned(),
        email: email.to_owned(),
        password_hash,
        role: Role::Member,
        created_at: now,
        updated_at: now,
    })
}

/// Get the user from the database with an ID equal to `user_id`.
///
/// # Errors
///
/// This function will return an error if:
/// - `user_id` does not belong to a registered user,
/// - or there was an error trying to access the store.
pub fn get_user_by_id(user_id: UserID, connection: &Connection) -> Result<User, Error> {
    connection
        .prepare(
            "SELECT id, name, email, password, role, created_at, updated_at
                FROM user WHERE id = :id",
        )?
        .query_row(&[(":id", &user_id.as_i64())], map_row)
        .map_err(|error| error.into())
}

/// Get the user from the database with an email equal to `email`.
///
/// Used to match credentials during log-in.
///
/// # Errors
///
/// This function will return an error if:
/// - `email` does not belong to a registered user,
/// - or there was an error trying to access the store.
pub fn get_user_by_email(email: &str, connection: &Connection) -> Result<User, Error> {
    connection
        .prepare(
            "SELECT id, name, email, password, role, created_at, updated_at
                FROM user WHERE email = :email",
        )?
        .query_row(&[(":email", &email)], map_row)
        .map_err(|error| error.into())
}

/// Get all registered users, ordered by ID.
///
/// # Errors
///
/// This function will return an error if there is an SQL error.
pub fn list_users(connection: &Connection) -> Result<Vec<User>, Error> {
    connection
        .prepare(
            "SELECT id, name, email, password, role, created_at, updated_at
                FROM user ORDER BY id ASC",
        )?
        .query_map([], map_row)?
        .map(|maybe_user| maybe_user.map_err(|error| error.into()))
        .collect()
}

/// Apply a partial update to the user with `user_id`.
///
/// Only the fields present in `patch` override stored values.
///
/// # Errors
///
/// This function will return an error if:
/// - `user_id` does not belong to a registered user ([Error::NotFound]),
/// - the caller is not the user being updated ([Error::Forbidden]),
/// - or there was some other SQL error.
pub fn update_user(
    user_id: UserID,
    patch: UserPatch,
    caller: UserID,
    connection: &Connection,
) -> Result<User, Error> {
    let user = get_user_by_id(user_id, connection)?;

    if user.id != caller {
        return Err(Error::Forbidden);
    }

    let name = patch.name.unwrap_or(user.name);
    let role = patch.role.unwrap_or(user.role);
    let updated_at = OffsetDateTime::now_utc();

    connection.execute(
        "UPDATE user SET name = ?1, role = ?2, updated_at = ?3 WHERE id = ?4",
        (&name, role.as_str(), &updated_at, user.id.as_i64()),
    )?;

    Ok(User {
        name,
        role,
        updated_at,
        ..user
    })
}

fn map_row(row: &Row) -> Result<User, rusqlite::Error> {
    let raw_password_hash: String = row.get(3)?;
    let raw_role: String = row.get(4)?;

    Ok(User {
        id: UserID::new(row.get(0)?),
        name: row.get(1)?,
        email: row.get(2)?,
        password_hash: PasswordHash::new_unchecked(&raw_password_hash),
        role: Role::from_str_or_default(&raw_role),
        created_at: row.get(5)?,
        updated_at: row.get(6)?,
    })
}
