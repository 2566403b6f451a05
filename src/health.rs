//! Liveness endpoint for the hosting platform.
//!
//! Any GET, on any path, answers `200 ok`. The server stops accepting
//! connections when the shutdown signal flips.

use axum::{Router, routing::get};
use std::net::{Ipv4Addr, SocketAddr};
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::{info, instrument};

/// Router answering every GET with `ok`.
pub fn create_health_router() -> Router {
    Router::new()
        .route("/", get(health_check))
        .route("/*path", get(health_check))
}

async fn health_check() -> &'static str {
    "ok"
}

/// Bind `0.0.0.0:{port}` and serve until shutdown.
#[instrument(level = "info", skip(shutdown))]
pub async fn serve(port: u16, mut shutdown: watch::Receiver<bool>) -> std::io::Result<()> {
    let listener = TcpListener::bind(SocketAddr::from((Ipv4Addr::UNSPECIFIED, port))).await?;
    info!(addr = %listener.local_addr()?, "HTTP server started");

    axum::serve(listener, create_health_router())
        .with_graceful_shutdown(async move {
            let _ = shutdown.wait_for(|stop| *stop).await;
        })
        .await?;

    info!("HTTP server stopped");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;
    use axum_test::TestServer;
    use std::time::Duration;

    #[tokio::test]
    async fn test_root_is_ok() {
        let server = TestServer::new(create_health_router()).unwrap();
        let response = server.get("/").await;
        response.assert_status_ok();
        response.assert_text("ok");
    }

    #[tokio::test]
    async fn test_any_path_is_ok() {
        let server = TestServer::new(create_health_router()).unwrap();
        let response = server.get("/healthz").await;
        response.assert_status_ok();
        response.assert_text("ok");
    }

    #[tokio::test]
    async fn test_non_get_is_rejected() {
        let server = TestServer::new(create_health_router()).unwrap();
        server
            .post("/")
            .expect_failure()
            .await
            .assert_status(StatusCode::METHOD_NOT_ALLOWED);
    }

    #[tokio::test]
    async fn test_serve_stops_on_shutdown() {
        let (tx, rx) = watch::channel(false);
        let handle = tokio::spawn(serve(0, rx));
        tokio::time::sleep(Duration::from_millis(50)).await;
        tx.send(true).unwrap();
        let result = tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .unwrap()
            .unwrap();
        assert!(result.is_ok());
    }
}
