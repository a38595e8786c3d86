//! Hive Web Server
//!
//! HTTP API over the marketplace with tower middleware for CORS, tracing,
//! and compression.

use axum::{
    Router,
    http::{HeaderValue, Method},
    routing::get,
};
use tower::ServiceBuilder;
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::info;

pub mod error;
pub mod extract;
pub mod routes;
pub mod server;
pub mod state;
pub mod views;

pub use error::{AppError, ErrorResponse};
pub use server::run_server;
pub use state::{ADMIN_KEY_HEADER, AppState};

/// Web server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to bind to (e.g., "127.0.0.1:3000")
    pub bind_address: String,
    /// Allowed CORS origin; `*` allows any origin
    pub cors_origin: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: "127.0.0.1:3000".to_string(),
            cors_origin: "*".to_string(),
        }
    }
}

/// Create the application router with middleware.
///
/// # Errors
///
/// Returns an error if the CORS origin is not a valid header value.
pub fn create_router(config: &ServerConfig, state: AppState) -> Result<Router, Error> {
    info!("Creating router with CORS origin: {}", config.cors_origin);

    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::PUT])
        .allow_headers(Any);
    let cors = if config.cors_origin == "*" {
        cors.allow_origin(Any)
    } else {
        cors.allow_origin(config.cors_origin.parse::<HeaderValue>()?)
    };

    let router = Router::new()
        .route("/health", get(health_check))
        .merge(routes::create_router())
        .with_state(state)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CompressionLayer::new())
                .layer(cors),
        );

    Ok(router)
}

/// Health check handler.
async fn health_check() -> &'static str {
    "OK"
}

/// Web server errors.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Invalid header value
    #[error("Invalid header value: {0}")]
    InvalidHeader(#[from] axum::http::header::InvalidHeaderValue),

    /// HTTP error
    #[error("HTTP error: {0}")]
    Http(#[from] axum::http::Error),

    /// Axum error
    #[error("Axum error: {0}")]
    Axum(#[from] axum::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Infallible error (for type compatibility in tests)
    #[error("Infallible")]
    Infallible,
}

impl From<std::convert::Infallible> for Error {
    fn from(value: std::convert::Infallible) -> Self {
        match value {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{body::Body, http::StatusCode};
    use hive_ledger::{LedgerConfig, Marketplace};
    use hive_store::InMemoryKvStore;
    use http_body_util::BodyExt;
    use std::sync::Arc;
    use tower::ServiceExt;

    fn state() -> AppState {
        let market = Marketplace::with_system_clock(InMemoryKvStore::new_arc(), LedgerConfig::default());
        AppState::new(Arc::new(market), "test-key")
    }

    /// Helper to build a test request with proper error handling.
    fn build_test_request(
        uri: &str,
        method: Option<Method>,
        headers: Vec<(&str, &str)>,
    ) -> Result<axum::http::Request<Body>, Error> {
        let mut builder = axum::http::Request::builder();
        if let Some(m) = method {
            builder = builder.method(m);
        }
        builder = builder.uri(uri);
        for (key, value) in headers {
            builder = builder.header(key, value);
        }
        builder.body(Body::empty()).map_err(Error::from)
    }

    #[test]
    fn test_server_config_default() {
        let config = ServerConfig::default();
        assert_eq!(config.bind_address, "127.0.0.1:3000");
        assert_eq!(config.cors_origin, "*");
    }

    #[test]
    fn test_create_router_with_custom_origin() {
        let config = ServerConfig {
            bind_address: "0.0.0.0:8080".to_string(),
            cors_origin: "https://example.com".to_string(),
        };
        assert!(create_router(&config, state()).is_ok());
    }

    #[test]
    fn test_create_router_with_invalid_origin() {
        let config = ServerConfig {
            bind_address: "127.0.0.1:3000".to_string(),
            cors_origin: "invalid\0origin".to_string(),
        };
        let result = create_router(&config, state());
        assert!(
            matches!(result, Err(Error::InvalidHeader(_))),
            "Expected InvalidHeader error"
        );
    }

    #[tokio::test]
    async fn test_health_check_endpoint() -> Result<(), Error> {
        let router = create_router(&ServerConfig::default(), state())?;

        let request = build_test_request("/health", None, Vec::new())?;
        let response = router.oneshot(request).await?;

        assert_eq!(response.status(), StatusCode::OK);
        let body_bytes = response.into_body().collect().await?.to_bytes();
        assert_eq!(&body_bytes[..], b"OK");
        Ok(())
    }

    #[tokio::test]
    async fn test_api_health_reports_storage() -> Result<(), Error> {
        let router = create_router(&ServerConfig::default(), state())?;

        let request = build_test_request("/api/health", None, Vec::new())?;
        let response = router.oneshot(request).await?;

        assert_eq!(response.status(), StatusCode::OK);
        let body_bytes = response.into_body().collect().await?.to_bytes();
        let json: serde_json::Value = serde_json::from_slice(&body_bytes)?;
        assert_eq!(json["storage"], "memory");
        assert_eq!(json["status"], "healthy");
        Ok(())
    }

    #[tokio::test]
    async fn test_cors_headers_present() -> Result<(), Error> {
        let config = ServerConfig {
            bind_address: "127.0.0.1:3000".to_string(),
            cors_origin: "https://hive.example".to_string(),
        };
        let router = create_router(&config, state())?;

        let request = build_test_request(
            "/api/tasks",
            Some(Method::OPTIONS),
            vec![
                ("Origin", "https://hive.example"),
                ("Access-Control-Request-Method", "PUT"),
            ],
        )?;
        let response = router.oneshot(request).await?;

        let headers = response.headers();
        assert_eq!(
            headers.get("access-control-allow-origin"),
            Some(&HeaderValue::from_static("https://hive.example"))
        );
        Ok(())
    }

    #[tokio::test]
    async fn test_router_not_found() -> Result<(), Error> {
        let router = create_router(&ServerConfig::default(), state())?;

        let request = build_test_request("/nonexistent", None, Vec::new())?;
        let response = router.oneshot(request).await?;

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        Ok(())
    }

    #[test]
    fn test_error_display() {
        let invalid_header = "invalid\0value".parse::<HeaderValue>();
        if let Err(e) = invalid_header {
            let err = Error::InvalidHeader(e);
            assert!(err.to_string().contains("Invalid header value"));
        }

        let err: Error = std::io::Error::new(std::io::ErrorKind::NotFound, "not found").into();
        assert!(err.to_string().contains("IO error"));
    }
}
