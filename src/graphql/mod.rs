//! The GraphQL API surface: the schema roots and the types they expose.

pub mod schema;
pub mod types;

pub use schema::{AppSchema, build_schema};
