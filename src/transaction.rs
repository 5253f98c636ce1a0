//! This file defines the `Transaction` type and the ownership-checked CRUD
//! operations on it. A transaction records a single income or expense against
//! one of the owner's categories.

use rusqlite::{
    Connection, Row,
    types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef},
};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::{Error, database_id::DatabaseID, user::UserID};

/// Whether a transaction adds to or subtracts from the user's balance.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, async_graphql::Enum)]
#[graphql(rename_items = "SCREAMING_SNAKE_CASE")]
pub enum TransactionType {
    /// Money coming in, e.g. wages.
    Income,
    /// Money going out, e.g. groceries.
    Expense,
}

impl TransactionType {
    /// The string stored in the database for this transaction type.
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionType::Income => "INCOME",
            TransactionType::Expense => "EXPENSE",
        }
    }
}

impl ToSql for TransactionType {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(self.as_str().into())
    }
}

impl FromSql for TransactionType {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        match value.as_str()? {
            "INCOME" => Ok(TransactionType::Income),
            "EXPENSE" => Ok(TransactionType::Expense),
            other => Err(FromSqlError::Other(
                format!("invalid transaction type {other:?}").into(),
            )),
        }
    }
}

/// An income or expense entry belonging to a user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    /// The ID of the transaction.
    pub id: DatabaseID,

    /// What the transaction was for.
    pub description: String,

    /// The amount of money, currency-agnostic.
    pub amount: f64,

    /// When the transaction occurred.
    pub date: OffsetDateTime,

    /// Whether the transaction is income or an expense.
    pub transaction_type: TransactionType,

    /// The ID of the category the transaction is filed under.
    pub category_id: DatabaseID,

    /// The ID of the user that owns the transaction.
    pub user_id: UserID,

    /// When the transaction was recorded.
    pub created_at: OffsetDateTime,

    /// When the transaction was last modified.
    pub updated_at: OffsetDateTime,
}

/// The fields required to create a transaction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewTransaction {
    /// What the transaction was for.
    pub description: String,
    /// The amount of money, currency-agnostic.
    pub amount: f64,
    /// When the transaction occurred.
    pub date: OffsetDateTime,
    /// Whether the transaction is income or an expense.
    pub transaction_type: TransactionType,
    /// The ID of the category the transaction is filed under.
    pub category_id: DatabaseID,
}

/// The fields that may be changed by an update.
///
/// Fields left as `None` keep their stored values.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TransactionPatch {
    pub description: Option<String>,
    pub amount: Option<f64>,
    pub date: Option<OffsetDateTime>,
    pub transaction_type: Option<TransactionType>,
    pub category_id: Option<DatabaseID>,
}

/// Create the transaction table.
///
/// # Errors
///
/// This function will return an error if the SQL query failed.
pub fn create_transaction_table(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute(
        "CREATE TABLE IF NOT EXISTS \"transaction\" (
                id INTEGER PRIMARY KEY,
                description TEXT NOT NULL,
                amount REAL NOT NULL,
                date TEXT NOT NULL,
                type TEXT NOT NULL,
                category_id INTEGER NOT NULL,
                user_id INTEGER NOT NULL,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                FOREIGN KEY(user_id) REFERENCES user(id) ON UPDATE CASCADE ON DELETE CASCADE
                )",
        (),
    )?;

    Ok(())
}

/// Create a transaction in the database, stamped with `owner_id`.
///
/// The supplied `category_id` is stored as-is: the backend does not verify
/// that the category belongs to `owner_id`, matching the observed behavior of
/// the system this replaces. Clients only offer the user's own categories.
///
/// # Errors
///
/// This function will return an error if there is an SQL error.
pub fn create_transaction(
    data: NewTransaction,
    owner_id: UserID,
    connection: &Connection,
) -> Result<Transaction, Error> {
    let now = OffsetDateTime::now_utc();

    connection.execute(
        "INSERT INTO \"transaction\"
                (description, amount, date, type, category_id, user_id, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        (
            &data.description,
            data.amount,
            &data.date,
            data.transaction_type,
            data.category_id,
            owner_id.as_i64(),
            &now,
            &now,
        ),
    )?;

    let id = connection.last_insert_rowid();

    Ok(Transaction {
        id,
        description: data.description,
        amount: data.amount,
        date: data.date,
        transaction_type: data.transaction_type,
        category_id: data.category_id,
        user_id: owner_id,
        created_at: now,
        updated_at: now,
    })
}

/// Retrieve the transaction with `transaction_id`, regardless of owner.
///
/// Callers performing mutations must check the returned record's `user_id`
/// against the caller before writing.
///
/// # Errors
///
/// Returns [Error::NotFound] if no transaction has `transaction_id`, or
/// [Error::SqlError] if there is some other SQL error.
pub fn get_transaction(
    transaction_id: DatabaseID,
    connection: &Connection,
) -> Result<Transaction, Error> {
    connection
        .prepare(
            "SELECT id, description, amount, date, type, category_id, user_id, created_at, updated_at
                FROM \"transaction\" WHERE id = :id",
        )?
        .query_row(&[(":id", &transaction_id)], map_row)
        .map_err(|error| error.into())
}

/// Retrieve all of `owner_id`'s transactions, ordered by date descending.
///
/// # Errors
///
/// This function will return an error if there is an SQL error.
pub fn list_transactions_by_user(
    owner_id: UserID,
    connection: &Connection,
) -> Result<Vec<Transaction>, Error> {
    connection
        .prepare(
            "SELECT id, description, amount, date, type, category_id, user_id, created_at, updated_at
                FROM \"transaction\" WHERE user_id = :user_id ORDER BY date DESC",
        )?
        .query_map(&[(":user_id", &owner_id.as_i64())], map_row)?
        .map(|maybe_transaction| maybe_transaction.map_err(|error| error.into()))
        .collect()
}

/// Apply a partial update to the transaction with `transaction_id`.
///
/// Only the fields present in `patch` override stored values.
///
/// # Errors
///
/// This function will return an error if:
/// - no transaction has `transaction_id` ([Error::NotFound]),
/// - the transaction is owned by a different user ([Error::Forbidden]),
/// - or there is some other SQL error.
pub fn update_transaction(
    transaction_id: DatabaseID,
    patch: TransactionPatch,
    owner_id: UserID,
    connection: &Connection,
) -> Result<Transaction, Error> {
    let transaction = get_transaction(transaction_id, connection)?;

    if transaction.user_id != owner_id {
        return Err(Error::Forbidden);
    }

    let description = patch.description.unwrap_or(transaction.description);
    let amount = patch.amount.unwrap_or(transaction.amount);
    let date = patch.date.unwrap_or(transaction.date);
    let transaction_type = patch
        .transaction_type
        .unwrap_or(transaction.transaction_type);
    let category_id = patch.category_id.unwrap_or(transaction.category_id);
    let updated_at = OffsetDateTime::now_utc();

    connection.execute(
        "UPDATE \"transaction\"
            SET description = ?1, amount = ?2, date = ?3, type = ?4, category_id = ?5, updated_at = ?6
            WHERE id = ?7",
        (
            &description,
            amount,
            &date,
            transaction_type,
            category_id,
            &updated_at,
            transaction.id,
        ),
    )?;

    Ok(Transaction {
        description,
        amount,
        date,
        transaction_type,
        category_id,
        updated_at,
        ..transaction
    })
}

/// Delete the transaction with `transaction_id` and return its prior state.
///
/// # Errors
///
/// This function will return an error if:
/// - no transaction has `transaction_id` ([Error::NotFound]),
/// - the transaction is owned by a different user ([Error::Forbidden]),
/// - or there is some other SQL error.
pub fn delete_transaction(
    transaction_id: DatabaseID,
    owner_id: UserID,
    connection: &Connection,
) -> Result<Transaction, Error> {
    let transaction = get_transaction(transaction_id, connection)?;

    if transaction.user_id != owner_id {
        return Err(Error::Forbidden);
    }

    connection.execute("DELETE FROM \"transaction\" WHERE id = ?1", (transaction.id,))?;

    Ok(transaction)
}

fn map_row(row: &Row) -> Result<Transaction, rusqlite::Error> {
    Ok(Transaction {
        id: row.get(0)?,
        description: row.get(1)?,
        amount: row.get(2)?,
        date: row.get(3)?,
        transaction_type: row.get(4)?,
        category_id: row.get(5)?,
        user_id: UserID::new(row.get(6)?),
        created_at: row.get(7)?,
        updated_at: row.get(8)?,
    })
}

#[cfg(test)]
mod transaction_tests {
    use rusqlite::Connection;
    use time::{Duration, OffsetDateTime};

    use crate::{
        Error,
        category::{Category, NewCategory, create_category, get_category_for_owner},
        db::initialize,
        password::PasswordHash,
        transaction::{
            NewTransaction, Transaction, TransactionPatch, TransactionType, create_transaction,
            delete_transaction, get_transaction, list_transactions_by_user, update_transaction,
        },
        user::{User, create_user},
    };

    fn init_db() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        initialize(&conn).unwrap();
        conn
    }

    fn create_database_and_insert_test_user_and_category() -> (Connection, User, Category) {
        let conn = init_db();

        let test_user = create_user(
            "Test User",
            "foo@bar.baz",
            PasswordHash::new_unchecked("hunter2"),
            &conn,
        )
        .unwrap();

        let category = create_category(
            NewCategory {
                title: "Food".to_owned(),
                description: None,
                icon: "utensils".to_owned(),
                color: "#f97316".to_owned(),
            },
            test_user.id,
            &conn,
        )
        .unwrap();

        (conn, test_user, category)
    }

    fn insert_other_user(conn: &Connection) -> User {
        create_user(
            "Other User",
            "qux@bar.baz",
            PasswordHash::new_unchecked("hunter3"),
            conn,
        )
        .unwrap()
    }

    fn new_transaction(category: &Category, amount: f64) -> NewTransaction {
        NewTransaction {
            description: "Rust Pie".to_owned(),
            amount,
            date: OffsetDateTime::now_utc(),
            transaction_type: TransactionType::Expense,
            category_id: category.id,
        }
    }

    fn insert_transaction(conn: &Connection, owner: &User, category: &Category) -> Transaction {
        create_transaction(new_transaction(category, 3.14), owner.id, conn)
            .expect("Could not create test transaction")
    }

    #[test]
    fn create_transaction_round_trips_all_fields() {
        let (conn, test_user, category) = create_database_and_insert_test_user_and_category();

        let inserted = insert_transaction(&conn, &test_user, &category);
        let transactions = list_transactions_by_user(test_user.id, &conn).unwrap();

        assert_eq!(transactions, vec![inserted.clone()]);
        assert_eq!(inserted.description, "Rust Pie");
        assert_eq!(inserted.amount, 3.14);
        assert_eq!(inserted.transaction_type, TransactionType::Expense);
        assert_eq!(inserted.category_id, category.id);
        assert_eq!(inserted.user_id, test_user.id);
    }

    #[test]
    fn create_transaction_accepts_other_users_category() {
        // The category owner check is deliberately absent to match the system
        // this replaces; clients only ever submit the user's own categories.
        let (conn, _test_user, someone_elses_category) =
            create_database_and_insert_test_user_and_category();
        let other_user = insert_other_user(&conn);

        let transaction = create_transaction(
            new_transaction(&someone_elses_category, 3.14),
            other_user.id,
            &conn,
        )
        .unwrap();

        assert_eq!(transaction.category_id, someone_elses_category.id);
        assert_eq!(transaction.user_id, other_user.id);
        // The category still does not resolve for the transaction's owner.
        assert_eq!(
            get_category_for_owner(someone_elses_category.id, other_user.id, &conn),
            Err(Error::NotFound)
        );
    }

    #[test]
    fn list_transactions_is_ordered_by_date_descending() {
        let (conn, test_user, category) = create_database_and_insert_test_user_and_category();
        let now = OffsetDateTime::now_utc();

        let oldest = create_transaction(
            NewTransaction {
                date: now - Duration::days(2),
                ..new_transaction(&category, 1.0)
            },
            test_user.id,
            &conn,
        )
        .unwrap();
        let newest = create_transaction(
            NewTransaction {
                date: now,
                ..new_transaction(&category, 2.0)
            },
            test_user.id,
            &conn,
        )
        .unwrap();
        let middle = create_transaction(
            NewTransaction {
                date: now - Duration::days(1),
                ..new_transaction(&category, 3.0)
            },
            test_user.id,
            &conn,
        )
        .unwrap();

        let transactions = list_transactions_by_user(test_user.id, &conn).unwrap();

        assert_eq!(transactions, vec![newest, middle, oldest]);
    }

    #[test]
    fn list_transactions_excludes_other_users() {
        let (conn, test_user, category) = create_database_and_insert_test_user_and_category();
        let other_user = insert_other_user(&conn);
        insert_transaction(&conn, &test_user, &category);

        let transactions = list_transactions_by_user(other_user.id, &conn).unwrap();

        assert_eq!(transactions, vec![]);
    }

    #[test]
    fn update_transaction_applies_partial_patch() {
        let (conn, test_user, category) = create_database_and_insert_test_user_and_category();
        let transaction = insert_transaction(&conn, &test_user, &category);

        let updated = update_transaction(
            transaction.id,
            TransactionPatch {
                amount: Some(42.0),
                ..Default::default()
            },
            test_user.id,
            &conn,
        )
        .unwrap();

        assert_eq!(updated.amount, 42.0);
        assert_eq!(updated.description, transaction.description);
        assert_eq!(updated.date, transaction.date);
        assert_eq!(updated.transaction_type, transaction.transaction_type);
        assert_eq!(updated.category_id, transaction.category_id);
    }

    #[test]
    fn update_transaction_fails_for_non_owner() {
        let (conn, test_user, category) = create_database_and_insert_test_user_and_category();
        let other_user = insert_other_user(&conn);
        let transaction = insert_transaction(&conn, &test_user, &category);

        let result = update_transaction(
            transaction.id,
            TransactionPatch {
                amount: Some(9001.0),
                ..Default::default()
            },
            other_user.id,
            &conn,
        );

        assert_eq!(result, Err(Error::Forbidden));
        let unchanged = get_transaction(transaction.id, &conn).unwrap();
        assert_eq!(unchanged, transaction);
    }

    #[test]
    fn update_transaction_fails_for_missing_id() {
        let (conn, test_user, _) = create_database_and_insert_test_user_and_category();

        let result = update_transaction(42, TransactionPatch::default(), test_user.id, &conn);

        assert_eq!(result, Err(Error::NotFound));
    }

    #[test]
    fn delete_transaction_returns_prior_state() {
        let (conn, test_user, category) = create_database_and_insert_test_user_and_category();
        let transaction = insert_transaction(&conn, &test_user, &category);

        let deleted = delete_transaction(transaction.id, test_user.id, &conn).unwrap();

        assert_eq!(deleted, transaction);
        assert_eq!(get_transaction(transaction.id, &conn), Err(Error::NotFound));
    }

    #[test]
    fn delete_transaction_fails_for_non_owner() {
        let (conn, test_user, category) = create_database_and_insert_test_user_and_category();
        let other_user = insert_other_user(&conn);
        let transaction = insert_transaction(&conn, &test_user, &category);

        let result = delete_transaction(transaction.id, other_user.id, &conn);

        assert_eq!(result, Err(Error::Forbidden));
        assert_eq!(
            list_transactions_by_user(test_user.id, &conn).unwrap(),
            vec![transaction]
        );
    }
}
