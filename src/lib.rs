//! Spendwise is a personal finance tracker.
//!
//! This library provides a GraphQL API for managing users, spending
//! categories, and income/expense transactions, backed by SQLite. Every
//! record is owned by the user who created it, and all queries and mutations
//! other than `login` and `register` require a bearer token.

#![warn(missing_docs)]

use std::{net::SocketAddr, time::Duration};

use axum_server::Handle;
use tokio::signal;

mod auth;
mod category;
mod database_id;
mod db;
mod error;
mod graphql;
mod logging;
mod password;
mod routes;
mod state;
mod transaction;
mod user;

pub use category::{Category, NewCategory, create_category};
pub use db::initialize as initialize_db;
pub use error::Error;
pub use logging::{LOG_BODY_LENGTH_LIMIT, logging_middleware};
pub use password::PasswordHash;
pub use routes::build_router;
pub use state::AppState;
pub use transaction::{NewTransaction, Transaction, TransactionType, create_transaction};
pub use user::{Role, User, UserID, create_user};

/// An async task that waits for either the ctrl+c or terminate signal, whichever comes first, and
/// then signals the server to shut down gracefully.
///
/// `handle` is a handle to an Axum `Server`.
pub async fn graceful_shutdown(handle: Handle<SocketAddr>) {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::debug!("Received ctrl+c signal.");
            handle.graceful_shutdown(Some(Duration::from_secs(1)));
        },
        _ = terminate => {
            tracing::debug!("Received terminate signal.");
            handle.graceful_shutdown(Some(Duration::from_secs(1)));
        },
    }
}
