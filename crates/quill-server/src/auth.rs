use async_trait::async_trait;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use quill_types::OwnerId;

use crate::error::ServerError;

/// Header carrying the caller's identity, set by whatever authenticates
/// requests in front of this server.
pub const OWNER_HEADER: &str = "x-quill-owner";

/// The authenticated caller, extracted from [`OWNER_HEADER`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Owner(pub OwnerId);

#[async_trait]
impl<S: Send + Sync> FromRequestParts<S> for Owner {
    type Rejection = ServerError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let value = parts
            .headers
            .get(OWNER_HEADER)
            .ok_or(ServerError::MissingOwner(OWNER_HEADER))?;
        let value = value
            .to_str()
            .map_err(|_| ServerError::BadRequest(format!("{OWNER_HEADER} is not valid text")))?;
        OwnerId::new(value)
            .map(Owner)
            .map_err(|_| ServerError::MissingOwner(OWNER_HEADER))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;

    async fn extract(request: Request<()>) -> Result<Owner, ServerError> {
        let (mut parts, ()) = request.into_parts();
        Owner::from_request_parts(&mut parts, &()).await
    }

    #[tokio::test]
    async fn reads_owner_header() {
        let request = Request::builder().header(OWNER_HEADER, "alice").body(()).unwrap();
        let owner = extract(request).await.unwrap();
        assert_eq!(owner.0.as_str(), "alice");
    }

    #[tokio::test]
    async fn missing_or_blank_owner() {
        let request = Request::builder().body(()).unwrap();
        assert!(matches!(extract(request).await, Err(ServerError::MissingOwner(_))));

        let request = Request::builder().header(OWNER_HEADER, "  ").body(()).unwrap();
        assert!(matches!(extract(request).await, Err(ServerError::MissingOwner(_))));
    }
}
