//! This file defines the `Category` type and the ownership-checked CRUD
//! operations on it. A category groups transactions, e.g. 'Groceries',
//! 'Eating Out', 'Wages'; every category belongs to exactly one user.

use rusqlite::{Connection, Row};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::{Error, database_id::DatabaseID, user::UserID};

/// A category for expenses and income.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Category {
    /// The ID of the category.
    pub id: DatabaseID,

    /// The display title of the category.
    pub title: String,

    /// An optional free-form description.
    pub description: Option<String>,

    /// The name of the icon shown next to the category.
    pub icon: String,

    /// The display color as a hex string, e.g. "#22c55e".
    pub color: String,

    /// The ID of the user that owns the category.
    pub user_id: UserID,

    /// When the category was created.
    pub created_at: OffsetDateTime,

    /// When the category was last modified.
    pub updated_at: OffsetDateTime,
}

/// The fields required to create a category.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewCategory {
    /// The display title of the category.
    pub title: String,
    /// An optional free-form description.
    pub description: Option<String>,
    /// The name of the icon shown next to the category.
    pub icon: String,
    /// The display color as a hex string.
    pub color: String,
}

/// The fields that may be changed by an update.
///
/// Fields left as `None` keep their stored values; supplying a field and
/// setting it to null are not distinguished.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CategoryPatch {
    pub title: Option<String>,
    pub description: Option<String>,
    pub icon: Option<String>,
    pub color: Option<String>,
}

/// Create the category table.
///
/// # Errors
///
/// This function will return an error if the SQL query failed.
pub fn create_category_table(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute(
        "CREATE TABLE IF NOT EXISTS category (
                id INTEGER PRIMARY KEY,
                title TEXT NOT NULL,
                description TEXT,
                icon TEXT NOT NULL,
                color TEXT NOT NULL,
                user_id INTEGER NOT NULL,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                FOREIGN KEY(user_id) REFERENCES user(id) ON UPDATE CASCADE ON DELETE CASCADE
                )",
        (),
    )?;

    Ok(())
}

/// Create a category in the database, stamped with `owner_id`.
///
/// # Errors
///
/// This function will return an error if there is an SQL error.
pub fn create_category(
    data: NewCategory,
    owner_id: UserID,
    connection: &Connection,
) -> Result<Category, Error> {
    let now = OffsetDateTime::now_utc();

    connection.execute(
        "INSERT INTO category (title, description, icon, color, user_id, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        (
            &data.title,
            &data.description,
            &data.icon,
            &data.color,
            owner_id.as_i64(),
            &now,
            &now,
        ),
    )?;

    let id = connection.last_insert_rowid();

    Ok(Category {
        id,
        title: data.title,
        description: data.description,
        icon: data.icon,
        color: data.color,
        user_id: owner_id,
        created_at: now,
        updated_at: now,
    })
}

/// Retrieve the category with `category_id`, regardless of owner.
///
/// Callers performing mutations must check the returned record's `user_id`
/// against the caller before writing.
///
/// # Errors
///
/// Returns [Error::NotFound] if no category has `category_id`, or
/// [Error::SqlError] if there is some other SQL error.
pub fn get_category(category_id: DatabaseID, connection: &Connection) -> Result<Category, Error> {
    connection
        .prepare(
            "SELECT id, title, description, icon, color, user_id, created_at, updated_at
                FROM category WHERE id = :id",
        )?
        .query_row(&[(":id", &category_id)], map_row)
        .map_err(|error| error.into())
}

/// Retrieve the category with `category_id` from among `owner_id`'s categories.
///
/// Used to populate the `category` field when returning a transaction:
/// a category belonging to a different user resolves as not found.
///
/// # Errors
///
/// Returns [Error::NotFound] if the owner has no category with `category_id`,
/// or [Error::SqlError] if there is some other SQL error.
pub fn get_category_for_owner(
    category_id: DatabaseID,
    owner_id: UserID,
    connection: &Connection,
) -> Result<Category, Error> {
    connection
        .prepare(
            "SELECT id, title, description, icon, color, user_id, created_at, updated_at
                FROM category WHERE id = :id AND user_id = :user_id",
        )?
        .query_row(
            &[(":id", &category_id), (":user_id", &owner_id.as_i64())],
            map_row,
        )
        .map_err(|error| error.into())
}

/// Retrieve all of `owner_id`'s categories, ordered by title ascending.
///
/// # Errors
///
/// This function will return an error if there is an SQL error.
pub fn list_categories_by_user(
    owner_id: UserID,
    connection: &Connection,
) -> Result<Vec<Category>, Error> {
    connection
        .prepare(
            "SELECT id, title, description, icon, color, user_id, created_at, updated_at
                FROM category WHERE user_id = :user_id ORDER BY title ASC",
        )?
        .query_map(&[(":user_id", &owner_id.as_i64())], map_row)?
        .map(|maybe_category| maybe_category.map_err(|error| error.into()))
        .collect()
}

/// Apply a partial update to the category with `category_id`.
///
/// Only the fields present in `patch` override stored values.
///
/// # Errors
///
/// This function will return an error if:
/// - no category has `category_id` ([Error::NotFound]),
/// - the category is owned by a different user ([Error::Forbidden]),
/// - or there is some other SQL error.
pub fn update_category(
    category_id: DatabaseID,
    patch: CategoryPatch,
    owner_id: UserID,
    connection: &Connection,
) -> Result<Category, Error> {
    let category = get_category(category_id, connection)?;

    if category.user_id != owner_id {
        return Err(Error::Forbidden);
    }

    let title = patch.title.unwrap_or(category.title);
    let description = patch.description.or(category.description);
    let icon = patch.icon.unwrap_or(category.icon);
    let color = patch.color.unwrap_or(category.color);
    let updated_at = OffsetDateTime::now_utc();

    connection.execute(
        "UPDATE category SET title = ?1, description = ?2, icon = ?3, color = ?4, updated_at = ?5
            WHERE id = ?6",
        (&title, &description, &icon, &color, &updated_at, category.id),
    )?;

    Ok(Category {
        title,
        description,
        icon,
        color,
        updated_at,
        ..category
    })
}

/// Delete the category with `category_id` and return its prior state.
///
/// # Errors
///
/// This function will return an error if:
/// - no category has `category_id` ([Error::NotFound]),
/// - the category is owned by a different user ([Error::Forbidden]),
/// - or there is some other SQL error.
pub fn delete_category(
    category_id: DatabaseID,
    owner_id: UserID,
    connection: &Connection,
) -> Result<Category, Error> {
    let category = get_category(category_id, connection)?;

    if category.user_id != owner_id {
        return Err(Error::Forbidden);
    }

    connection.execute("DELETE FROM category WHERE id = ?1", (category.id,))?;

    Ok(category)
}

fn map_row(row: &Row) -> Result<Category, rusqlite::Error> {
    Ok(Category {
        id: row.get(0)?,
        title: row.get(1)?,
        description: row.get(2)?,
        icon: row.get(3)?,
        color: row.get(4)?,
        user_id: UserID::new(row.get(5)?),
        created_at: row.get(6)?,
        updated_at: row.get(7)?,
    })
}
