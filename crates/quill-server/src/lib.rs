//! HTTP server for Quill.
//!
//! Exposes the document service as a JSON API. File contents travel as
//! base64 strings; the caller's identity arrives in the [`OWNER_HEADER`]
//! header, set by whatever authenticates requests in front of the server.

pub mod auth;
pub mod config;
pub mod error;
pub mod handler;
pub mod router;
pub mod server;

pub use auth::{Owner, OWNER_HEADER};
pub use config::ServerConfig;
pub use error::{ServerError, ServerResult};
pub use router::{build_router, AppState, DynDocumentService};
pub use server::QuillServer;

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use axum::Router;
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine as _;
    use quill_anchor::InMemoryLedger;
    use quill_sdk::{DocumentService, ServiceConfig};
    use quill_store::{InMemoryBlobStore, InMemoryVersionStore};
    use serde_json::{json, Value};
    use tower::util::ServiceExt;

    fn app() -> Router {
        let service = DocumentService::new(
            Arc::new(InMemoryLedger::new(123_456)) as Arc<dyn quill_anchor::LedgerAnchor>,
            Arc::new(InMemoryVersionStore::new()) as Arc<dyn quill_store::VersionStore>,
            Arc::new(InMemoryBlobStore::new()) as Arc<dyn quill_store::BlobStore>,
            ServiceConfig::default(),
        );
        QuillServer::new(ServerConfig::default(), service).router()
    }

    async fn send(app: &Router, method: &str, uri: &str, owner: Option<&str>, body: Option<Value>) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(owner) = owner {
            builder = builder.header(OWNER_HEADER, owner);
        }
        let request = match body {
            Some(body) => builder
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };
        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        (status, value)
    }

    fn create_body(name: &str) -> Value {
        json!({
            "name": name,
            "original_filename": "test.pdf",
            "mime_type": "application/pdf",
            "original_document": STANDARD.encode(b"test"),
        })
    }

    #[tokio::test]
    async fn health_endpoint() {
        let (status, body) = send(&app(), "GET", "/v1/health", None, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
    }

    #[tokio::test]
    async fn create_sign_verify_over_http() {
        let app = app();
        let (status, created) =
            send(&app, "POST", "/v1/documents", Some("alice"), Some(create_body("Test Document"))).await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(created["freshness_marker"], 123_456);
        assert_eq!(created["unsigned_hash"].as_str().unwrap().len(), 64);
        let id = created["id"].as_str().unwrap().to_owned();

        let (status, signed) = send(
            &app,
            "POST",
            &format!("/v1/documents/{id}/sign"),
            Some("bob"),
            Some(json!({ "signed_document": STANDARD.encode(b"test+sig") })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(signed["status"], "completed");
        assert_eq!(signed["version"], 2);

        let (status, verified) = send(
            &app,
            "POST",
            "/v1/verify",
            None,
            Some(json!({
                "tx_signature": signed["tx_signature"],
                "candidate": STANDARD.encode(b"test+sig"),
                "freshness_marker": signed["freshness_marker"],
            })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(verified["matches"], true);

        let (status, verified) = send(
            &app,
            "POST",
            "/v1/verify",
            None,
            Some(json!({
                "tx_signature": signed["tx_signature"],
                "candidate": STANDARD.encode(b"test+sig"),
            })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(verified["matches"], true);

        let (status, history) =
            send(&app, "GET", &format!("/v1/documents/{id}/versions"), Some("alice"), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(history["intact"], true);
        assert_eq!(history["versions"].as_array().unwrap().len(), 2);
        assert!(history["document"].get("password_hash").is_none());
    }

    #[tokio::test]
    async fn validation_error_names_field() {
        let (status, body) =
            send(&app(), "POST", "/v1/documents", Some("alice"), Some(create_body(""))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "validation");
        assert_eq!(body["field"], "name");
    }

    #[tokio::test]
    async fn duplicate_name_conflicts() {
        let app = app();
        let (status, _) =
            send(&app, "POST", "/v1/documents", Some("alice"), Some(create_body("lease"))).await;
        assert_eq!(status, StatusCode::CREATED);
        let (status, body) =
            send(&app, "POST", "/v1/documents", Some("alice"), Some(create_body("lease"))).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["error"], "conflict");
    }

    #[tokio::test]
    async fn owner_header_is_required() {
        let (status, body) = send(&app(), "POST", "/v1/documents", None, Some(create_body("lease"))).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error"], "unauthenticated");
    }

    #[tokio::test]
    async fn other_owner_sees_not_found() {
        let app = app();
        let (_, created) =
            send(&app, "POST", "/v1/documents", Some("alice"), Some(create_body("lease"))).await;
        let id = created["id"].as_str().unwrap();
        let (status, _) = send(&app, "GET", &format!("/v1/documents/{id}"), Some("mallory"), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        let (status, _) =
            send(&app, "POST", &format!("/v1/documents/{id}/reject"), Some("mallory"), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        let (status, view) = send(&app, "GET", &format!("/v1/documents/{id}"), Some("alice"), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(view["document"]["status"], "awaiting_signatures");
    }

    #[tokio::test]
    async fn unknown_transaction_is_not_found() {
        let (status, _) = send(
            &app(),
            "POST",
            "/v1/verify",
            None,
            Some(json!({
                "tx_signature": "missing",
                "candidate": STANDARD.encode(b"test"),
                "freshness_marker": 1,
            })),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn rejected_document_refuses_signatures() {
        let app = app();
        let (_, created) =
            send(&app, "POST", "/v1/documents", Some("alice"), Some(create_body("lease"))).await;
        let id = created["id"].as_str().unwrap();
        let (status, body) =
            send(&app, "POST", &format!("/v1/documents/{id}/reject"), Some("alice"), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "rejected");

        let (status, _) = send(
            &app,
            "POST",
            &format!("/v1/documents/{id}/sign"),
            Some("bob"),
            Some(json!({ "signed_document": STANDARD.encode(b"late") })),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn version_content_download() {
        let app = app();
        let (_, created) =
            send(&app, "POST", "/v1/documents", Some("alice"), Some(create_body("lease"))).await;
        let id = created["id"].as_str().unwrap();

        let request = Request::builder()
            .uri(format!("/v1/documents/{id}/versions/1/content"))
            .header(OWNER_HEADER, "alice")
            .body(Body::empty())
            .unwrap();
        let response = app.clone().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&bytes[..], b"test");
    }
}
