//! Read-only HTTP server over a party's document root

use axum::{
    body::Body,
    extract::{Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use bullboard::{DocumentRoot, StoreError};
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::{debug, info, warn};

/// Router serving every file below `root` by its relative path
pub fn router(root: DocumentRoot) -> Router {
    Router::new()
        .route("/*path", get(serve_file))
        .layer(TraceLayer::new_for_http())
        .with_state(root)
}

/// Serve `root` on `listener` until the task is dropped
pub async fn serve(listener: TcpListener, root: DocumentRoot) -> std::io::Result<()> {
    if let Ok(address) = listener.local_addr() {
        info!(%address, root = %root.root().display(), "Serving document root");
    }
    axum::serve(listener, router(root)).await
}

async fn serve_file(State(root): State<DocumentRoot>, Path(path): Path<String>) -> Response {
    match root.read(&path, usize::MAX).await {
        Ok(Some(bytes)) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "application/octet-stream")],
            Body::from(bytes),
        )
            .into_response(),
        Ok(None) => StatusCode::NOT_FOUND.into_response(),
        Err(StoreError::InvalidPath(path)) => {
            debug!(path, "Rejected request");
            StatusCode::NOT_FOUND.into_response()
        }
        Err(e) => {
            warn!(path, error = %e, "Failed to read file");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;
    use tower::ServiceExt;

    async fn scratch() -> DocumentRoot {
        let dir = std::env::temp_dir().join(format!("bullboard-http-{}", uuid::Uuid::new_v4()));
        DocumentRoot::open(dir).await.unwrap()
    }

    async fn get(root: &DocumentRoot, uri: &str) -> (StatusCode, Vec<u8>) {
        let response = router(root.clone())
            .oneshot(Request::get(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, body.to_vec())
    }

    #[tokio::test]
    async fn test_serves_published_files() {
        let root = scratch().await;
        root.publish("1/s/Msg", b"hello").await.unwrap();
        root.publish("1/s/Msg.sig.2", b"sig").await.unwrap();

        assert_eq!(get(&root, "/1/s/Msg").await, (StatusCode::OK, b"hello".to_vec()));
        assert_eq!(get(&root, "/1/s/Msg.sig.2").await, (StatusCode::OK, b"sig".to_vec()));
        assert_eq!(get(&root, "/2/s/Msg").await.0, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_rejects_paths_outside_root() {
        let root = scratch().await;
        assert_eq!(get(&root, "/1/../../etc/passwd").await.0, StatusCode::NOT_FOUND);
        assert_eq!(get(&root, "/.staging/x").await.0, StatusCode::NOT_FOUND);
    }
}
