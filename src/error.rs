//! Defines the app level error type and its mapping onto GraphQL errors.

use async_graphql::ErrorExtensions;

/// The errors that may occur in the application.
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum Error {
    /// The request carried no identity, or the bearer token was invalid or
    /// expired. Every operation except `login` and `register` requires an
    /// authenticated caller.
    #[error("user is not authenticated")]
    Unauthenticated,

    /// The user provided an email/password combination that does not match a
    /// registered user.
    ///
    /// Log-in intentionally does not reveal whether the email or the password
    /// was wrong.
    #[error("invalid credentials")]
    InvalidCredentials,

    /// The requested resource was not found.
    ///
    /// Internally, this error may occur when a query returns no rows.
    #[error("the requested resource could not be found")]
    NotFound,

    /// The resource exists but is owned by a different user.
    ///
    /// Mutating operations verify ownership before touching a record; this is
    /// the failure for a caller that is not the record's owner.
    #[error("not authorized")]
    Forbidden,

    /// The email address already belongs to a registered user.
    #[error("the email address is already registered")]
    DuplicateEmail,

    /// An unexpected error occurred with the underlying hashing library.
    ///
    /// The error string should only be logged for debugging on the server.
    #[error("hashing failed: {0}")]
    HashingError(String),

    /// A JWT could not be signed or decoded.
    #[error("token error: {0}")]
    TokenError(String),

    /// An unhandled/unexpected SQL error.
    #[error("an unexpected SQL error occurred: {0}")]
    SqlError(rusqlite::Error),

    /// Could not acquire the database lock
    #[error("could not acquire the database lock")]
    DatabaseLockError,
}

impl From<rusqlite::Error> for Error {
    fn from(value: rusqlite::Error) -> Self {
        match value {
            // Code 2067 occurs when a UNIQUE constraint failed.
            rusqlite::Error::SqliteFailure(sql_error, Some(ref desc))
                if sql_error.extended_code == 2067 && desc.contains("user.email") =>
            {
                Error::DuplicateEmail
            }
            rusqlite::Error::QueryReturnedNoRows => Error::NotFound,
            error => {
                tracing::error!("an unhandled SQL error occurred: {}", error);
                Error::SqlError(error)
            }
        }
    }
}

impl Error {
    /// The machine-readable error code attached to GraphQL error extensions.
    ///
    /// The transport collapses all failures into a generic GraphQL error list,
    /// so the code keeps NotFound and Forbidden distinguishable for clients.
    pub fn code(&self) -> &'static str {
        match self {
            Error::Unauthenticated => "UNAUTHENTICATED",
            Error::InvalidCredentials => "INVALID_CREDENTIALS",
            Error::NotFound => "NOT_FOUND",
            Error::Forbidden => "FORBIDDEN",
            Error::DuplicateEmail => "DUPLICATE_EMAIL",
            Error::HashingError(_) | Error::TokenError(_) => "INTERNAL_ERROR",
            Error::SqlError(_) | Error::DatabaseLockError => "INTERNAL_ERROR",
        }
    }
}

impl ErrorExtensions for Error {
    fn extend(&self) -> async_graphql::Error {
        let code = self.code();

        // Internal errors are logged server-side and replaced with a generic
        // message so that SQL details never reach the client.
        let message = match self {
            Error::SqlError(_)
            | Error::DatabaseLockError
            | Error::HashingError(_)
            | Error::TokenError(_) => {
                tracing::error!("An unexpected error occurred: {}", self);
                "An unexpected error occurred".to_owned()
            }
            other => other.to_string(),
        };

        async_graphql::Error::new(message).extend_with(|_, e| e.set("code", code))
    }
}
