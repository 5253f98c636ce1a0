//! The GraphQL query and mutation roots.
//!
//! Resolvers are thin: each one applies the authentication gate, acquires the
//! database connection, and delegates to the ownership-checked operations in
//! the domain modules. Domain errors cross the GraphQL boundary through
//! [async_graphql::ResultExt::extend] so they carry their `code` extension.

use async_graphql::{
    Context, EmptySubscription, ErrorExtensions, ID, Object, ResultExt, Schema,
};

use crate::{
    Error,
    auth::{ACCESS_TOKEN_DURATION, REFRESH_TOKEN_DURATION, require_user, sign_token},
    category::{
        CategoryPatch, NewCategory, create_category, delete_category, list_categories_by_user,
        update_category,
    },
    graphql::types::{
        AuthPayload, CategoryObject, CreateCategoryInput, CreateTransactionInput, LoginInput,
        RegisterInput, TransactionObject, UpdateCategoryInput, UpdateTransactionInput,
        UpdateUserInput, UserObject, parse_id,
    },
    password::PasswordHash,
    state::AppState,
    transaction::{
        NewTransaction, TransactionPatch, create_transaction, delete_transaction,
        list_transactions_by_user, update_transaction,
    },
    user::{UserPatch, create_user, get_user_by_email, get_user_by_id, list_users, update_user},
};

/// The GraphQL schema used by the API server.
pub type AppSchema = Schema<Query, Mutation, EmptySubscription>;

/// Build the GraphQL schema with the shared application state.
pub fn build_schema(state: AppState) -> AppSchema {
    Schema::build(Query, Mutation, EmptySubscription)
        .data(state)
        .finish()
}

pub struct Query;

#[Object]
impl Query {
    /// The authenticated user's categories, ordered by title.
    async fn my_categories(&self, ctx: &Context<'_>) -> async_graphql::Result<Vec<CategoryObject>> {
        let user = require_user(ctx).extend()?;
        let state = ctx.data::<AppState>()?;
        let connection = state.connection().extend()?;

        let categories = list_categories_by_user(user.id, &connection).extend()?;

        Ok(categories.into_iter().map(Into::into).collect())
    }

    /// The authenticated user's transactions, newest first.
    async fn my_transactions(
        &self,
        ctx: &Context<'_>,
    ) -> async_graphql::Result<Vec<TransactionObject>> {
        let user = require_user(ctx).extend()?;
        let state = ctx.data::<AppState>()?;
        let connection = state.connection().extend()?;

        let transactions = list_transactions_by_user(user.id, &connection).extend()?;

        Ok(transactions.into_iter().map(Into::into).collect())
    }

    /// Fetch a single user by ID.
    async fn get_user(&self, ctx: &Context<'_>, id: ID) -> async_graphql::Result<UserObject> {
        require_user(ctx).extend()?;
        let state = ctx.data::<AppState>()?;
        let connection = state.connection().extend()?;

        let user_id = crate::user::UserID::new(parse_id(&id).extend()?);
        let user = get_user_by_id(user_id, &connection).extend()?;

        Ok(user.into())
    }

    /// All registered users.
    async fn list_users(&self, ctx: &Context<'_>) -> async_graphql::Result<Vec<UserObject>> {
        require_user(ctx).extend()?;
        let state = ctx.data::<AppState>()?;
        let connection = state.connection().extend()?;

        let users = list_users(&connection).extend()?;

        Ok(users.into_iter().map(Into::into).collect())
    }
}

pub struct Mutation;

#[Object]
impl Mutation {
    /// Register a new user and issue a session.
    async fn register(
        &self,
        ctx: &Context<'_>,
        data: RegisterInput,
    ) -> async_graphql::Result<AuthPayload> {
        let state = ctx.data::<AppState>()?;

        let password_hash =
            PasswordHash::new(&data.password, PasswordHash::DEFAULT_COST).extend()?;

        let user = {
            let connection = state.connection().extend()?;
            create_user(&data.name, &data.email, password_hash, &connection).extend()?
        };
        tracing::info!("registered user {}", user.id);

        let token = sign_token(&user, ACCESS_TOKEN_DURATION, &state.jwt_keys).extend()?;
        let refresh_token = sign_token(&user, REFRESH_TOKEN_DURATION, &state.jwt_keys).extend()?;

        Ok(AuthPayload {
            token,
            refresh_token,
            user: user.into(),
        })
    }

    /// Exchange credentials for a session.
    ///
    /// An unknown email and a wrong password are indistinguishable to the caller.
    async fn login(
        &self,
        ctx: &Context<'_>,
        data: LoginInput,
    ) -> async_graphql::Result<AuthPayload> {
        let state = ctx.data::<AppState>()?;

        let user = {
            let connection = state.connection().extend()?;
            get_user_by_email(&data.email, &connection)
                .map_err(|error| match error {
                    Error::NotFound => Error::InvalidCredentials,
                    other => other,
                })
                .extend()?
        };

        if !user.password_hash.verify(&data.password).extend()? {
            return Err(Error::InvalidCredentials.extend());
        }

        let token = sign_token(&user, ACCESS_TOKEN_DURATION, &state.jwt_keys).extend()?;
        let refresh_token = sign_token(&user, REFRESH_TOKEN_DURATION, &state.jwt_keys).extend()?;

        Ok(AuthPayload {
            token,
            refresh_token,
            user: user.into(),
        })
    }

    /// Update the authenticated user's profile.
    async fn update_user(
        &self,
        ctx: &Context<'_>,
        id: ID,
        data: UpdateUserInput,
    ) -> async_graphql::Result<UserObject> {
        let caller = require_user(ctx).extend()?;
        let state = ctx.data::<AppState>()?;
        let connection = state.connection().extend()?;

        let user_id = crate::user::UserID::new(parse_id(&id).extend()?);
        let patch = UserPatch {
            name: data.name,
            role: data.role,
        };
        let user = update_user(user_id, patch, caller.id, &connection).extend()?;

        Ok(user.into())
    }

    /// Create a category owned by the authenticated user.
    async fn create_category(
        &self,
        ctx: &Context<'_>,
        data: CreateCategoryInput,
    ) -> async_graphql::Result<CategoryObject> {
        let user = require_user(ctx).extend()?;
        let state = ctx.data::<AppState>()?;
        let connection = state.connection().extend()?;

        let category = create_category(
            NewCategory {
                title: data.title,
                description: data.description,
                icon: data.icon,
                color: data.color,
            },
            user.id,
            &connection,
        )
        .extend()?;

        Ok(category.into())
    }

    /// Apply a partial update to one of the authenticated user's categories.
    async fn update_category(
        &self,
        ctx: &Context<'_>,
        id: ID,
        data: UpdateCategoryInput,
    ) -> async_graphql::Result<CategoryObject> {
        let user = require_user(ctx).extend()?;
        let state = ctx.data::<AppState>()?;
        let connection = state.connection().extend()?;

        let patch = CategoryPatch {
            title: data.title,
            description: data.description,
            icon: data.icon,
            color: data.color,
        };
        let category =
            update_category(parse_id(&id).extend()?, patch, user.id, &connection).extend()?;

        Ok(category.into())
    }

    /// Delete one of the authenticated user's categories.
    ///
    /// Returns the category as it was before deletion.
    async fn delete_category(
        &self,
        ctx: &Context<'_>,
        id: ID,
    ) -> async_graphql::Result<CategoryObject> {
        let user = require_user(ctx).extend()?;
        let state = ctx.data::<AppState>()?;
        let connection = state.connection().extend()?;

        let category = delete_category(parse_id(&id).extend()?, user.id, &connection).extend()?;

        Ok(category.into())
    }

    /// Record a transaction owned by the authenticated user.
    async fn create_transaction(
        &self,
        ctx: &Context<'_>,
        data: CreateTransactionInput,
    ) -> async_graphql::Result<TransactionObject> {
        let user = require_user(ctx).extend()?;
        let state = ctx.data::<AppState>()?;
        let connection = state.connection().extend()?;

        let transaction = create_transaction(
            NewTransaction {
                description: data.description,
                amount: data.amount,
                date: data.date,
                transaction_type: data.transaction_type,
                category_id: parse_id(&data.category_id).extend()?,
            },
            user.id,
            &connection,
        )
        .extend()?;

        Ok(transaction.into())
    }

    /// Apply a partial update to one of the authenticated user's transactions.
    async fn update_transaction(
        &self,
        ctx: &Context<'_>,
        id: ID,
        data: UpdateTransactionInput,
    ) -> async_graphql::Result<TransactionObject> {
        let user = require_user(ctx).extend()?;
        let state = ctx.data::<AppState>()?;
        let connection = state.connection().extend()?;

        let category_id = data
            .category_id
            .as_ref()
            .map(parse_id)
            .transpose()
            .extend()?;
        let patch = TransactionPatch {
            description: data.description,
            amount: data.amount,
            date: data.date,
            transaction_type: data.transaction_type,
            category_id,
        };
        let transaction =
            update_transaction(parse_id(&id).extend()?, patch, user.id, &connection).extend()?;

        Ok(transaction.into())
    }

    /// Delete one of the authenticated user's transactions.
    ///
    /// Returns the transaction as it was before deletion.
    async fn delete_transaction(
        &self,
        ctx: &Context<'_>,
        id: ID,
    ) -> async_graphql::Result<TransactionObject> {
        let user = require_user(ctx).extend()?;
        let state = ctx.data::<AppState>()?;
        let connection = state.connection().extend()?;

        let transaction =
            delete_transaction(parse_id(&id).extend()?, user.id, &connection).extend()?;

        Ok(transaction.into())
    }
}

#[cfg(test)]
mod schema_tests {
    use async_graphql::Request;
    use rusqlite::Connection;
    use serde_json::{Value, json};

    use crate::{
        auth::AuthUser,
        graphql::schema::{AppSchema, build_schema},
        password::PasswordHash,
        state::AppState,
        user::{User, create_user},
    };

    fn get_test_state() -> AppState {
        let connection =
            Connection::open_in_memory().expect("Could not open database in memory.");

        AppState::new(connection, "foobar").expect("Could not initialize database.")
    }

    fn insert_test_user(state: &AppState, email: &str) -> User {
        create_user(
            "Test User",
            email,
            PasswordHash::new_unchecked("$2b$12$Gwf0uvxH3L7JLfo0CC/NCOoijK2vQ/wbgP.LeNup8vj6gg31IiFkm"),
            &state.connection().unwrap(),
        )
        .expect("Could not create test user")
    }

    fn as_user(user: &User) -> AuthUser {
        AuthUser {
            id: user.id,
            email: user.email.clone(),
        }
    }

    async fn execute(
        schema: &AppSchema,
        query: &str,
        user: Option<&AuthUser>,
    ) -> async_graphql::Response {
        let mut request = Request::new(query);
        if let Some(user) = user {
            request = request.data(user.clone());
        }

        schema.execute(request).await
    }

    async fn execute_ok(schema: &AppSchema, query: &str, user: &AuthUser) -> Value {
        let response = execute(schema, query, Some(user)).await;
        assert!(
            response.errors.is_empty(),
            "Got GraphQL errors: {:?}",
            response.errors
        );

        response.data.into_json().expect("Could not convert data to JSON")
    }

    async fn create_food_category(schema: &AppSchema, user: &AuthUser) -> String {
        let data = execute_ok(
            schema,
            r##"mutation {
                createCategory(data: {title: "Food", icon: "utensils", color: "#f97316"}) {
                    id
                    title
                }
            }"##,
            user,
        )
        .await;

        data["createCategory"]["id"].as_str().unwrap().to_owned()
    }

    #[tokio::test]
    async fn operations_require_authentication() {
        let schema = build_schema(get_test_state());

        for query in [
            "{ myCategories { id } }",
            "{ myTransactions { id } }",
            "{ listUsers { id } }",
            r##"mutation { createCategory(data: {title: "X", icon: "i", color: "#fff"}) { id } }"##,
            r#"mutation { deleteTransaction(id: "1") { id } }"#,
        ] {
            let response = execute(&schema, query, None).await;

            assert_eq!(
                response.errors.len(),
                1,
                "want exactly one error for unauthenticated query {query:?}"
            );
            assert_eq!(response.errors[0].message, "user is not authenticated");
        }
    }

    #[tokio::test]
    async fn register_returns_tokens_and_user() {
        let schema = build_schema(get_test_state());

        let response = execute(
            &schema,
            r#"mutation {
                register(data: {name: "Ana", email: "ana@example.com", password: "correcthorsebattery"}) {
                    token
                    refreshToken
                    user { name email role }
                }
            }"#,
            None,
        )
        .await;

        assert!(response.errors.is_empty(), "{:?}", response.errors);
        let data = response.data.into_json().unwrap();
        assert!(!data["register"]["token"].as_str().unwrap().is_empty());
        assert!(!data["register"]["refreshToken"].as_str().unwrap().is_empty());
        assert_eq!(data["register"]["user"]["name"], "Ana");
        assert_eq!(data["register"]["user"]["email"], "ana@example.com");
        assert_eq!(data["register"]["user"]["role"], "member");
    }

    #[tokio::test]
    async fn login_fails_with_unknown_email() {
        let schema = build_schema(get_test_state());

        let response = execute(
            &schema,
            r#"mutation {
                login(data: {email: "nobody@example.com", password: "whatever"}) { token }
            }"#,
            None,
        )
        .await;

        assert_eq!(response.errors.len(), 1);
        assert_eq!(response.errors[0].message, "invalid credentials");
    }

    #[tokio::test]
    async fn login_succeeds_with_valid_credentials() {
        let state = get_test_state();
        // The stored hash is for the password "okon".
        insert_test_user(&state, "foo@bar.baz");
        let schema = build_schema(state);

        let response = execute(
            &schema,
            r#"mutation {
                login(data: {email: "foo@bar.baz", password: "okon"}) {
                    token
                    user { email }
                }
            }"#,
            None,
        )
        .await;

        assert!(response.errors.is_empty(), "{:?}", response.errors);
        let data = response.data.into_json().unwrap();
        assert_eq!(data["login"]["user"]["email"], "foo@bar.baz");
    }

    #[tokio::test]
    async fn my_transactions_round_trips_created_transaction() {
        let state = get_test_state();
        let user_a = as_user(&insert_test_user(&state, "a@example.com"));
        let user_b = as_user(&insert_test_user(&state, "b@example.com"));
        let schema = build_schema(state);

        let food_id = create_food_category(&schema, &user_a).await;

        let mutation = format!(
            r#"mutation {{
                createTransaction(data: {{
                    description: "Lunch",
                    amount: 50.0,
                    date: "2025-06-01T12:00:00Z",
                    type: EXPENSE,
                    categoryId: "{food_id}"
                }}) {{ id }}
            }}"#
        );
        execute_ok(&schema, &mutation, &user_a).await;

        let query = r#"{
            myTransactions {
                description
                amount
                type
                category { title icon color }
            }
        }"#;

        let data = execute_ok(&schema, query, &user_a).await;
        assert_eq!(
            data["myTransactions"],
            json!([{
                "description": "Lunch",
                "amount": 50.0,
                "type": "EXPENSE",
                "category": {"title": "Food", "icon": "utensils", "color": "#f97316"},
            }])
        );

        // A different user sees none of it.
        let data = execute_ok(&schema, query, &user_b).await;
        assert_eq!(data["myTransactions"], json!([]));
    }

    #[tokio::test]
    async fn delete_category_as_other_user_fails_and_preserves_record() {
        let state = get_test_state();
        let user_a = as_user(&insert_test_user(&state, "a@example.com"));
        let user_b = as_user(&insert_test_user(&state, "b@example.com"));
        let schema = build_schema(state);

        let food_id = create_food_category(&schema, &user_a).await;

        let mutation = format!(r#"mutation {{ deleteCategory(id: "{food_id}") {{ id }} }}"#);
        let response = execute(&schema, &mutation, Some(&user_b)).await;

        assert_eq!(response.errors.len(), 1);
        assert_eq!(response.errors[0].message, "not authorized");

        let data = execute_ok(&schema, "{ myCategories { title } }", &user_a).await;
        assert_eq!(data["myCategories"], json!([{"title": "Food"}]));
    }

    #[tokio::test]
    async fn update_category_with_missing_id_reports_not_found() {
        let state = get_test_state();
        let user = as_user(&insert_test_user(&state, "a@example.com"));
        let schema = build_schema(state);

        let response = execute(
            &schema,
            r#"mutation { updateCategory(id: "999", data: {title: "X"}) { id } }"#,
            Some(&user),
        )
        .await;

        assert_eq!(response.errors.len(), 1);
        assert_eq!(
            response.errors[0].message,
            "the requested resource could not be found"
        );
    }

    #[tokio::test]
    async fn update_transaction_patches_only_supplied_fields() {
        let state = get_test_state();
        let user = as_user(&insert_test_user(&state, "a@example.com"));
        let schema = build_schema(state);

        let food_id = create_food_category(&schema, &user).await;
        let mutation = format!(
            r#"mutation {{
                createTransaction(data: {{
                    description: "Lunch",
                    amount: 50.0,
                    date: "2025-06-01T12:00:00Z",
                    type: EXPENSE,
                    categoryId: "{food_id}"
                }}) {{ id }}
            }}"#
        );
        let data = execute_ok(&schema, &mutation, &user).await;
        let transaction_id = data["createTransaction"]["id"].as_str().unwrap().to_owned();

        let mutation = format!(
            r#"mutation {{
                updateTransaction(id: "{transaction_id}", data: {{amount: 75.5}}) {{
                    description
                    amount
                    type
                }}
            }}"#
        );
        let data = execute_ok(&schema, &mutation, &user).await;

        assert_eq!(
            data["updateTransaction"],
            json!({"description": "Lunch", "amount": 75.5, "type": "EXPENSE"})
        );
    }
}
