//! Defines the HTTP routes of the API server and how requests reach the
//! GraphQL schema.

use async_graphql::http::GraphiQLSource;
use async_graphql_axum::{GraphQLRequest, GraphQLResponse};
use axum::{
    Router,
    extract::State,
    http::StatusCode,
    middleware,
    response::{Html, IntoResponse},
    routing::get,
};
use axum_extra::{
    TypedHeader,
    headers::{Authorization, authorization::Bearer},
};

use crate::{
    auth::{JwtKeys, decode_token},
    graphql::{AppSchema, build_schema},
    logging::logging_middleware,
    state::AppState,
};

/// The state shared by the route handlers.
#[derive(Clone)]
struct ApiState {
    schema: AppSchema,
    jwt_keys: JwtKeys,
}

/// Return a router with the API routes attached.
pub fn build_router(state: AppState) -> Router {
    let jwt_keys = state.jwt_keys.clone();
    let schema = build_schema(state);

    Router::new()
        .route("/graphql", get(get_graphiql).post(post_graphql))
        .route("/health", get(get_health))
        .layer(middleware::from_fn(logging_middleware))
        .with_state(ApiState { schema, jwt_keys })
}

/// Execute a GraphQL request.
///
/// If the request carries a valid bearer token, the caller identity is placed
/// into the request context for [crate::auth::require_user]. Requests without
/// a token still execute so that `login` and `register` work, the remaining
/// resolvers reject them individually.
async fn post_graphql(
    State(api): State<ApiState>,
    bearer: Option<TypedHeader<Authorization<Bearer>>>,
    request: GraphQLRequest,
) -> GraphQLResponse {
    let mut request = request.into_inner();

    if let Some(TypedHeader(authorization)) = bearer
        && let Ok(user) = decode_token(authorization.token(), &api.jwt_keys)
    {
        request = request.data(user);
    }

    api.schema.execute(request).await.into()
}

/// Serve the GraphiQL IDE for exploring the schema in a browser.
async fn get_graphiql() -> impl IntoResponse {
    Html(GraphiQLSource::build().endpoint("/graphql").finish())
}

/// A route handler for checking if the server is running.
async fn get_health() -> StatusCode {
    StatusCode::OK
}
