use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{request::Parts, HeaderMap, StatusCode},
};
use dinegenus_collab::Identity;

/// Set by the identity gateway in front of the server once the user is verified
pub const USER_ID_HEADER: &str = "x-user-id";
/// Distinguishes concurrent sessions (tabs, devices) of the same user
pub const SESSION_ID_HEADER: &str = "x-session-id";

/// The verified identity of the user making a request
pub struct Caller(pub Identity);

impl Caller {
    pub fn user_id(&self) -> &str {
        &self.0.user_id
    }

    fn from_headers(headers: &HeaderMap) -> Result<Self, (StatusCode, &'static str)> {
        let user_id = header(headers, USER_ID_HEADER)
            .ok_or((StatusCode::UNAUTHORIZED, "Missing user identity"))?;

        let identity = match header(headers, SESSION_ID_HEADER) {
            Some(session_id) => Identity::new(user_id).with_session(session_id),
            None => Identity::new(user_id),
        };

        Ok(Self(identity))
    }
}

fn header<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|x| x.to_str().ok())
        .map(str::trim)
        .filter(|x| !x.is_empty())
}

#[async_trait]
impl<S> FromRequestParts<S> for Caller
where
    S: Send + Sync,
{
    type Rejection = (StatusCode, &'static str);

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Self::from_headers(&parts.headers)
    }
}
