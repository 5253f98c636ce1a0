//! Bearer-token authentication: JWT signing and verification, and the
//! predicate that gates every GraphQL operation behind an authenticated caller.

use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use time::{Duration, OffsetDateTime};

use crate::{
    Error,
    user::{User, UserID},
};

/// How long an access token stays valid after being issued.
pub const ACCESS_TOKEN_DURATION: Duration = Duration::hours(1);

/// How long a refresh token stays valid after being issued.
pub const REFRESH_TOKEN_DURATION: Duration = Duration::days(7);

/// The keys used for signing and verifying JWTs.
#[derive(Clone)]
pub struct JwtKeys {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
}

impl JwtKeys {
    /// Derive symmetric signing keys from a secret string.
    pub fn new(secret: &str) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret.as_ref()),
            decoding_key: DecodingKey::from_secret(secret.as_ref()),
        }
    }

    /// The encoding key for JWTs.
    pub fn encoding_key(&self) -> &EncodingKey {
        &self.encoding_key
    }

    /// The decoding key for JWTs.
    pub fn decoding_key(&self) -> &DecodingKey {
        &self.decoding_key
    }
}

/// The claims carried inside an issued JWT.
#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    /// The ID of the authenticated user.
    sub: i64,
    /// The email of the authenticated user.
    email: String,
    /// Expiry as a unix timestamp.
    exp: i64,
}

/// The identity resolved from a bearer token.
///
/// Placed into the GraphQL request context before any resolver runs.
#[derive(Debug, Clone, PartialEq)]
pub struct AuthUser {
    pub id: UserID,
    pub email: String,
}

/// Sign a token for `user` that expires after `duration`.
///
/// # Errors
///
/// Returns [Error::TokenError] if the token could not be signed.
pub fn sign_token(user: &User, duration: Duration, keys: &JwtKeys) -> Result<String, Error> {
    let expires_at = OffsetDateTime::now_utc() + duration;
    let claims = Claims {
        sub: user.id.as_i64(),
        email: user.email.clone(),
        exp: expires_at.unix_timestamp(),
    };

    encode(&Header::default(), &claims, keys.encoding_key())
        .map_err(|error| Error::TokenError(error.to_string()))
}

/// Verify `token` and extract the caller identity from its claims.
///
/// # Errors
///
/// Returns [Error::Unauthenticated] if the token is malformed, has a bad
/// signature, or has expired.
pub fn decode_token(token: &str, keys: &JwtKeys) -> Result<AuthUser, Error> {
    let token_data = decode::<Claims>(token, keys.decoding_key(), &Validation::default())
        .map_err(|error| {
            tracing::debug!("rejected bearer token: {}", error);
            Error::Unauthenticated
        })?;

    Ok(AuthUser {
        id: UserID::new(token_data.claims.sub),
        email: token_data.claims.email,
    })
}

/// The authentication gate applied by every resolver except `login` and
/// `register`: fetch the caller identity from the request context or fail.
///
/// # Errors
///
/// Returns [Error::Unauthenticated] if the request carried no valid bearer token.
pub fn require_user(ctx: &async_graphql::Context<'_>) -> Result<AuthUser, Error> {
    ctx.data_opt::<AuthUser>()
        .cloned()
        .ok_or(Error::Unauthenticated)
}
