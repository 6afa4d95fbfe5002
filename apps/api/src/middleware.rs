use axum::extract::Request;
use axum::http::HeaderMap;
use axum::http::header::USER_AGENT;
use axum::middleware::Next;
use axum::response::Response;
use tasklane_core::{ActorIdentity, AppError, OrganizationId, RequestContext, UserId};

use crate::error::ApiResult;

/// Header carrying the authenticated user id set by the upstream gateway.
pub const ACTOR_HEADER: &str = "x-actor-id";
const FORWARDED_FOR_HEADER: &str = "x-forwarded-for";

/// Caller captured from trusted transport headers.
///
/// A missing actor header means an anonymous caller, which resolves to the
/// guest rule set.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestActor {
    user_id: Option<UserId>,
    context: RequestContext,
}

impl RequestActor {
    fn from_headers(headers: &HeaderMap) -> Result<Self, AppError> {
        let user_id = header_value(headers, ACTOR_HEADER)
            .map(|value| {
                UserId::parse(value).map_err(|_| {
                    AppError::Unauthorized(format!("invalid {ACTOR_HEADER} header"))
                })
            })
            .transpose()?;

        let ip_address = header_value(headers, FORWARDED_FOR_HEADER)
            .and_then(|value| value.split(',').next())
            .map(|value| value.trim().to_owned());
        let user_agent = header_value(headers, USER_AGENT.as_str()).map(str::to_owned);

        Ok(Self {
            user_id,
            context: RequestContext::new(ip_address, user_agent),
        })
    }

    pub fn user_id(&self) -> Option<UserId> {
        self.user_id
    }

    pub fn context(&self) -> &RequestContext {
        &self.context
    }

    /// Binds the caller to an organization for administrative operations.
    pub fn identity(&self, organization_id: OrganizationId) -> Result<ActorIdentity, AppError> {
        let user_id = self
            .user_id
            .ok_or_else(|| AppError::Unauthorized("authentication required".to_owned()))?;

        Ok(ActorIdentity::new(user_id, organization_id).with_context(self.context.clone()))
    }
}

pub async fn capture_actor(mut request: Request, next: Next) -> ApiResult<Response> {
    let actor = RequestActor::from_headers(request.headers())?;
    request.extensions_mut().insert(actor);
    Ok(next.run(request).await)
}

fn header_value<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
}

#[cfg(test)]
mod tests {
    use axum::http::{HeaderMap, HeaderValue};
    use tasklane_core::{AppError, OrganizationId, UserId};

    use super::{ACTOR_HEADER, RequestActor};

    #[test]
    fn missing_actor_header_is_anonymous() {
        let actor = RequestActor::from_headers(&HeaderMap::new()).unwrap_or_default();

        assert_eq!(actor.user_id(), None);
        assert!(matches!(
            actor.identity(OrganizationId::new()),
            Err(AppError::Unauthorized(_))
        ));
    }

    #[test]
    fn headers_populate_identity_and_context() {
        let user_id = UserId::new();
        let organization_id = OrganizationId::new();
        let mut headers = HeaderMap::new();
        headers.insert(
            ACTOR_HEADER,
            HeaderValue::from_str(&user_id.to_string()).unwrap_or_else(|_| unreachable!()),
        );
        headers.insert(
            "x-forwarded-for",
            HeaderValue::from_static("203.0.113.7, 10.0.0.1"),
        );
        headers.insert("user-agent", HeaderValue::from_static("tasklane-web/2.1"));

        let Ok(actor) = RequestActor::from_headers(&headers) else {
            panic!("headers should parse");
        };
        let Ok(identity) = actor.identity(organization_id) else {
            panic!("identified actor should bind");
        };

        assert_eq!(identity.user_id(), user_id);
        assert_eq!(identity.organization_id(), organization_id);
        assert_eq!(identity.context().ip_address(), Some("203.0.113.7"));
        assert_eq!(identity.context().user_agent(), Some("tasklane-web/2.1"));
    }

    #[test]
    fn malformed_actor_header_is_unauthorized() {
        let mut headers = HeaderMap::new();
        headers.insert(ACTOR_HEADER, HeaderValue::from_static("not-a-uuid"));

        assert!(matches!(
            RequestActor::from_headers(&headers),
            Err(AppError::Unauthorized(_))
        ));
    }
}
