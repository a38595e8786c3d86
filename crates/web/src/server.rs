//! Server bootstrap

use std::future::Future;

use tokio::net::TcpListener;
use tracing::info;

use crate::{Error, ServerConfig, create_router, state::AppState};

/// Bind, serve and return once `shutdown` resolves and in-flight requests
/// have drained.
///
/// # Errors
///
/// Returns an error if the router cannot be built, the address cannot be
/// bound, or the server fails while running.
pub async fn run_server<F>(config: ServerConfig, state: AppState, shutdown: F) -> Result<(), Error>
where
    F: Future<Output = ()> + Send + 'static,
{
    let app = create_router(&config, state)?;

    let listener = TcpListener::bind(&config.bind_address).await?;
    info!("Hive server listening on {}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await?;

    info!("Hive server stopped");
    Ok(())
}
