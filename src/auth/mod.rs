//! Request authentication.
//!
//! An optional pre-shared key gates the API (compared in constant time to
//! mitigate timing attacks). The acting user travels in the `x-user-id`
//! header and is attached to the request as a [`CurrentUser`].

use async_trait::async_trait;
use axum::{
    extract::Request,
    http::{header, HeaderMap, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use subtle::ConstantTimeEq;

use crate::errors::{codes, AppError, ErrorResponse};
use crate::identity::{IdentityProvider, UserInfo};

/// Header name for the API key.
pub const API_KEY_HEADER: &str = "x-api-key";
/// Header carrying the acting user's id.
pub const USER_ID_HEADER: &str = "x-user-id";

/// The user attached to a request; `None` when no user header was sent.
#[derive(Debug, Clone, Default)]
pub struct CurrentUser(pub Option<UserInfo>);

impl CurrentUser {
    pub fn from_headers(headers: &HeaderMap) -> Self {
        let id = headers
            .get(USER_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|s| !s.is_empty());

        CurrentUser(id.map(UserInfo::new))
    }
}

/// Identity provider answering from the request's [`CurrentUser`].
pub struct RequestIdentity {
    user: Option<UserInfo>,
}

impl RequestIdentity {
    pub fn new(user: CurrentUser) -> Self {
        Self { user: user.0 }
    }
}

#[async_trait]
impl IdentityProvider for RequestIdentity {
    async fn current_user_info(&self) -> Result<Option<UserInfo>, AppError> {
        Ok(self.user.clone())
    }
}

/// Check the API key (when one is configured) and attach the acting user.
pub async fn authenticate(
    expected_psk: Option<String>,
    mut request: Request,
    next: Next,
) -> Response {
    if let Some(expected) = expected_psk {
        let headers = request.headers();
        let provided = headers
            .get(API_KEY_HEADER)
            .and_then(|v| v.to_str().ok())
            .or_else(|| {
                headers
                    .get(header::AUTHORIZATION)
                    .and_then(|v| v.to_str().ok())
                    .and_then(|s| s.strip_prefix("Bearer "))
            });

        match provided {
            Some(key) if constant_time_compare(key, &expected) => {}
            Some(_) => return unauthorized_response("Invalid API key"),
            None => return unauthorized_response("Missing or invalid API key"),
        }
    }

    let user = CurrentUser::from_headers(request.headers());
    request.extensions_mut().insert(user);
    next.run(request).await
}

/// Perform constant-time string comparison.
fn constant_time_compare(a: &str, b: &str) -> bool {
    a.as_bytes().ct_eq(b.as_bytes()).into()
}

fn unauthorized_response(message: &str) -> Response {
    tracing::debug!(reason = message, "rejected request");
    (
        StatusCode::UNAUTHORIZED,
        Json(ErrorResponse::new(codes::UNAUTHORIZED, message)),
    )
        .into_response()
}
