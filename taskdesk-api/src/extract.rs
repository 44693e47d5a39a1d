/// Request extractors
///
/// [`CurrentUser`] reads the identity the authentication middleware attached
/// to the request. Anonymous requests are rejected with 403 here, so a
/// handler that takes a `CurrentUser` is protected by construction.

use axum::{async_trait, extract::FromRequestParts, http::request::Parts};
use taskdesk_shared::auth::middleware::AuthContext;
use taskdesk_shared::models::user::Identity;

use crate::error::ApiError;

/// Authenticated caller
#[derive(Debug, Clone)]
pub struct CurrentUser(pub Identity);

#[async_trait]
impl<S> FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthContext>()
            .map(|ctx| CurrentUser(ctx.identity.clone()))
            .ok_or_else(|| {
                tracing::debug!(path = %parts.uri.path(), "Anonymous request to protected handler");
                ApiError::Forbidden("Access denied".to_string())
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;
    use taskdesk_shared::models::user::Role;

    #[tokio::test]
    async fn test_extracts_identity_from_context() {
        let identity = Identity {
            id: 5,
            subject: "u@x.com".to_string(),
            role: Role::User,
        };
        let mut req = Request::builder().uri("/api/tasks").body(()).unwrap();
        req.extensions_mut().insert(AuthContext {
            identity: identity.clone(),
        });
        let (mut parts, _) = req.into_parts();

        let CurrentUser(extracted) =
            CurrentUser::from_request_parts(&mut parts, &()).await.unwrap();
        assert_eq!(extracted, identity);
    }

    #[tokio::test]
    async fn test_anonymous_request_is_forbidden() {
        let (mut parts, _) = Request::builder().uri("/api/tasks").body(()).unwrap().into_parts();

        let err = CurrentUser::from_request_parts(&mut parts, &()).await.unwrap_err();
        assert!(matches!(err, ApiError::Forbidden(_)));
    }
}
