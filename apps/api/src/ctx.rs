use axum::{async_trait, extract::FromRequestParts, http::request::Parts};
use uuid::Uuid;

use crate::errors::AppError;

/// Header set by the fronting auth layer after token verification.
pub const USER_ID_HEADER: &str = "x-user-id";
/// Optional verified subject claim, passed through for audit logging.
pub const SUBJECT_HEADER: &str = "x-auth-subject";

/// Request-scoped identity. Handlers receive this explicitly instead of
/// reading ambient session state; token verification itself happens upstream.
#[derive(Debug, Clone)]
pub struct RequestContext {
    pub user_id: Uuid,
    #[allow(dead_code)]
    pub subject: Option<String>,
}

#[async_trait]
impl<S> FromRequestParts<S> for RequestContext
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let user_id = parts
            .headers
            .get(USER_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .and_then(|s| Uuid::parse_str(s).ok())
            .ok_or(AppError::Unauthorized)?;

        let subject = parts
            .headers
            .get(SUBJECT_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(String::from);

        Ok(RequestContext { user_id, subject })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;

    async fn extract(req: Request<()>) -> Result<RequestContext, AppError> {
        let (mut parts, _) = req.into_parts();
        RequestContext::from_request_parts(&mut parts, &()).await
    }

    #[tokio::test]
    async fn test_valid_user_id_header() {
        let id = Uuid::new_v4();
        let req = Request::builder()
            .header(USER_ID_HEADER, id.to_string())
            .body(())
            .unwrap();
        let ctx = extract(req).await.unwrap();
        assert_eq!(ctx.user_id, id);
        assert!(ctx.subject.is_none());
    }

    #[tokio::test]
    async fn test_subject_passthrough() {
        let req = Request::builder()
            .header(USER_ID_HEADER, Uuid::new_v4().to_string())
            .header(SUBJECT_HEADER, "firebase:abc123")
            .body(())
            .unwrap();
        let ctx = extract(req).await.unwrap();
        assert_eq!(ctx.subject.as_deref(), Some("firebase:abc123"));
    }

    #[tokio::test]
    async fn test_missing_header_rejected() {
        let req = Request::builder().body(()).unwrap();
        assert!(matches!(extract(req).await, Err(AppError::Unauthorized)));
    }

    #[tokio::test]
    async fn test_malformed_user_id_rejected() {
        let req = Request::builder()
            .header(USER_ID_HEADER, "not-a-uuid")
            .body(())
            .unwrap();
        assert!(matches!(extract(req).await, Err(AppError::Unauthorized)));
    }
}
