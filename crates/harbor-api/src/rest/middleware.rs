//! Request middleware and caller extraction

use axum::{
    async_trait,
    extract::{FromRequestParts, Request},
    http::{request::Parts, HeaderMap, HeaderName, HeaderValue},
    middleware::Next,
    response::Response,
};
use tracing::Instrument;
use uuid::Uuid;

use harbor_core::{Actor, CompanyId, UserId};

use crate::rest::error::ApiError;

pub const REQUEST_ID: HeaderName = HeaderName::from_static("x-request-id");
pub const USER_ID: HeaderName = HeaderName::from_static("x-user-id");
pub const COMPANY_ID: HeaderName = HeaderName::from_static("x-company-id");

/// Propagate or assign `x-request-id` and echo it on the response
pub async fn request_id_middleware(mut request: Request, next: Next) -> Response {
    let request_id = request
        .headers()
        .get(&REQUEST_ID)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty())
        .map(String::from)
        .unwrap_or_else(|| Uuid::new_v4().to_string());

    if let Ok(value) = HeaderValue::from_str(&request_id) {
        request.headers_mut().insert(REQUEST_ID, value.clone());
        let span = tracing::info_span!("request", request_id = %request_id);

        let mut response = next.run(request).instrument(span).await;
        response.headers_mut().insert(REQUEST_ID, value);
        return response;
    }

    next.run(request).await
}

/// The authenticated caller, as asserted by the gateway headers
#[derive(Debug, Clone)]
pub struct Caller(pub Actor);

impl Caller {
    pub fn actor(&self) -> &Actor {
        &self.0
    }

    /// Company of the caller; required for cross-document operations
    pub fn company_id(&self) -> Result<CompanyId, ApiError> {
        self.0
            .company_id
            .ok_or_else(|| ApiError::unauthorized("Missing x-company-id header"))
    }
}

#[async_trait]
impl<S: Send + Sync> FromRequestParts<S> for Caller {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        caller_from_headers(&parts.headers).map(Caller)
    }
}

fn header_str<'a>(headers: &'a HeaderMap, name: &HeaderName) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
}

pub fn caller_from_headers(headers: &HeaderMap) -> Result<Actor, ApiError> {
    let user_id = header_str(headers, &USER_ID)
        .ok_or_else(|| ApiError::unauthorized("Missing x-user-id header"))?;
    let user_id =
        UserId::parse(user_id).ok_or_else(|| ApiError::unauthorized("Invalid x-user-id header"))?;

    let mut actor = Actor::new(user_id);
    if let Some(company) = header_str(headers, &COMPANY_ID) {
        let company_id = CompanyId::parse(company)
            .ok_or_else(|| ApiError::unauthorized("Invalid x-company-id header"))?;
        actor = actor.with_company(company_id);
    }

    // First hop of x-forwarded-for is the client
    let ip = header_str(headers, &HeaderName::from_static("x-forwarded-for"))
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty());
    if let Some(ip) = ip {
        actor = actor.with_ip(ip);
    }
    if let Some(agent) = header_str(headers, &axum::http::header::USER_AGENT) {
        actor = actor.with_user_agent(agent);
    }

    Ok(actor)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;

    fn headers(pairs: &[(&'static str, &str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (name, value) in pairs {
            map.insert(*name, HeaderValue::from_str(value).unwrap());
        }
        map
    }

    #[test]
    fn test_caller_requires_user() {
        let err = caller_from_headers(&HeaderMap::new()).unwrap_err();
        assert_eq!(err.status(), StatusCode::UNAUTHORIZED);

        let err = caller_from_headers(&headers(&[("x-user-id", "bob")])).unwrap_err();
        assert_eq!(err.message(), "Invalid x-user-id header");
    }

    #[test]
    fn test_caller_reads_optional_fields() {
        let user = UserId::new();
        let company = CompanyId::new();
        let actor = caller_from_headers(&headers(&[
            ("x-user-id", &user.to_string()),
            ("x-company-id", &company.to_string()),
            ("x-forwarded-for", "203.0.113.7, 10.0.0.1"),
            ("user-agent", "harbor-web/2.1"),
        ]))
        .unwrap();

        assert_eq!(actor.user_id, user);
        assert_eq!(actor.company_id, Some(company));
        assert_eq!(actor.ip_address.as_deref(), Some("203.0.113.7"));
        assert_eq!(actor.user_agent.as_deref(), Some("harbor-web/2.1"));
    }
}
