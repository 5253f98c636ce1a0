//! The object and input types exposed through the GraphQL schema.
//!
//! These mirror the domain models but control exactly what reaches clients:
//! most notably, the user's password hash has no corresponding field.

use async_graphql::{ComplexObject, Context, ID, InputObject, ResultExt, SimpleObject};
use time::OffsetDateTime;

use crate::{
    Error,
    auth::require_user,
    category::{Category, get_category_for_owner},
    database_id::DatabaseID,
    state::AppState,
    transaction::{Transaction, TransactionType},
    user::{Role, User},
};

/// Parse a client-supplied ID into a database row ID.
///
/// IDs that are not well-formed integers cannot match any record, so they are
/// reported the same way as an absent record.
pub(crate) fn parse_id(id: &ID) -> Result<DatabaseID, Error> {
    id.parse::<DatabaseID>().map_err(|_| Error::NotFound)
}

/// A registered user, as returned to clients.
#[derive(Debug, SimpleObject)]
#[graphql(name = "UserModel")]
pub struct UserObject {
    pub id: ID,
    pub name: String,
    pub email: String,
    pub role: Role,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

impl From<User> for UserObject {
    fn from(user: User) -> Self {
        Self {
            id: ID::from(user.id.as_i64().to_string()),
            name: user.name,
            email: user.email,
            role: user.role,
            created_at: user.created_at,
            updated_at: user.updated_at,
        }
    }
}

/// A spending or income category.
#[derive(Debug, SimpleObject)]
#[graphql(name = "CategoryModel")]
pub struct CategoryObject {
    pub id: ID,
    pub title: String,
    pub description: Option<String>,
    pub icon: String,
    pub color: String,
    pub user_id: String,
}

impl From<Category> for CategoryObject {
    fn from(category: Category) -> Self {
        Self {
            id: ID::from(category.id.to_string()),
            title: category.title,
            description: category.description,
            icon: category.icon,
            color: category.color,
            user_id: category.user_id.to_string(),
        }
    }
}

/// An income or expense entry.
///
/// The `category` field is resolved lazily against the caller's own
/// categories, see [TransactionObject::category].
#[derive(Debug, SimpleObject)]
#[graphql(name = "TransactionModel", complex)]
pub struct TransactionObject {
    pub id: ID,
    pub description: String,
    pub amount: f64,
    pub date: OffsetDateTime,
    #[graphql(name = "type")]
    pub transaction_type: TransactionType,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,

    #[graphql(skip)]
    pub category_id: DatabaseID,
}

#[ComplexObject]
impl TransactionObject {
    /// The category the transaction is filed under.
    ///
    /// Looked up among the caller's categories only: a `categoryId` pointing
    /// at another user's category does not resolve.
    async fn category(&self, ctx: &Context<'_>) -> async_graphql::Result<CategoryObject> {
        let user = require_user(ctx).extend()?;
        let state = ctx.data::<AppState>()?;
        let connection = state.connection().extend()?;

        let category = get_category_for_owner(self.category_id, user.id, &connection).extend()?;

        Ok(category.into())
    }
}

impl From<Transaction> for TransactionObject {
    fn from(transaction: Transaction) -> Self {
        Self {
            id: ID::from(transaction.id.to_string()),
            description: transaction.description,
            amount: transaction.amount,
            date: transaction.date,
            transaction_type: transaction.transaction_type,
            created_at: transaction.created_at,
            updated_at: transaction.updated_at,
            category_id: transaction.category_id,
        }
    }
}

/// The result of a successful `login` or `register` mutation.
#[derive(Debug, SimpleObject)]
pub struct AuthPayload {
    /// A short-lived bearer token for the `Authorization` header.
    pub token: String,
    /// A longer-lived token the client may exchange for a new session.
    pub refresh_token: String,
    /// The authenticated user.
    pub user: UserObject,
}

/// Credentials for the `login` mutation.
#[derive(Debug, InputObject)]
pub struct LoginInput {
    pub email: String,
    pub password: String,
}

/// The fields required to register a new user.
#[derive(Debug, InputObject)]
pub struct RegisterInput {
    pub name: String,
    pub email: String,
    pub password: String,
}

/// Partial patch for the `updateUser` mutation.
#[derive(Debug, InputObject)]
pub struct UpdateUserInput {
    pub name: Option<String>,
    pub role: Option<Role>,
}

/// The fields required to create a category.
#[derive(Debug, InputObject)]
pub struct CreateCategoryInput {
    pub title: String,
    pub description: Option<String>,
    pub icon: String,
    pub color: String,
}

/// Partial patch for the `updateCategory` mutation.
#[derive(Debug, InputObject)]
pub struct UpdateCategoryInput {
    pub title: Option<String>,
    pub description: Option<String>,
    pub icon: Option<String>,
    pub color: Option<String>,
}

/// The fields required to create a transaction.
#[derive(Debug, InputObject)]
pub struct CreateTransactionInput {
    pub description: String,
    pub amount: f64,
    pub date: OffsetDateTime,
    #[graphql(name = "type")]
    pub transaction_type: TransactionType,
    pub category_id: ID,
}

/// Partial patch for the `updateTransaction` mutation.
#[derive(Debug, InputObject)]
pub struct UpdateTransactionInput {
    pub description: Option<String>,
    pub amount: Option<f64>,
    pub date: Option<OffsetDateTime>,
    #[graphql(name = "type")]
    pub transaction_type: Option<TransactionType>,
    pub category_id: Option<ID>,
}
