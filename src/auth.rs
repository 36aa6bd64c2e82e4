use crate::AppState;
use axum::{
    async_trait,
    body::Body,
    extract::FromRequestParts,
    http::{request::Parts, HeaderValue, Response, StatusCode},
};
use base64::{engine::general_purpose, Engine as _};
use subtle::ConstantTimeEq;

// Adapted from https://www.shuttle.rs/blog/2023/09/27/rust-vs-go-comparison#middleware-1

/// An operator authenticated with the `AUTH` Basic credentials.
pub struct Operator;

#[async_trait]
impl FromRequestParts<AppState> for Operator {
    type Rejection = Response<Body>;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let auth_header = parts
            .headers
            .get("Authorization")
            .and_then(|header| header.to_str().ok());

        if let Some(credentials) = auth_header.and_then(|header| header.strip_prefix("Basic ")) {
            let decoded = general_purpose::STANDARD
                .decode(credentials)
                .unwrap_or_default();

            if credentials_match(&decoded, &state.config.auth) {
                return Ok(Operator);
            }
        }

        let mut reject_response = Response::new(Body::from("Unauthorized"));
        *reject_response.status_mut() = StatusCode::UNAUTHORIZED;
        reject_response.headers_mut().insert(
            "WWW-Authenticate",
            HeaderValue::from_static("Basic realm=\"Please enter your credentials\""),
        );

        Err(reject_response)
    }
}

fn credentials_match(presented: &[u8], expected: &str) -> bool {
    !presented.is_empty() && presented.ct_eq(expected.as_bytes()).unwrap_u8() == 1
}
