//! Shared handler state.

use std::sync::Arc;

use axum::http::HeaderMap;
use hive_core::Error;
use hive_ledger::Marketplace;

/// Header carrying the admin key.
pub const ADMIN_KEY_HEADER: &str = "x-admin-key";

/// State handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub marketplace: Arc<Marketplace>,
    admin_key: Arc<str>,
}

impl AppState {
    pub fn new(marketplace: Arc<Marketplace>, admin_key: impl Into<Arc<str>>) -> Self {
        Self {
            marketplace,
            admin_key: admin_key.into(),
        }
    }

    /// Check the admin key, taken from the `x-admin-key` header or, failing
    /// that, from a key supplied in the request body.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Unauthorized`] when neither matches.
    pub fn require_admin(&self, headers: &HeaderMap, body_key: Option<&str>) -> Result<(), Error> {
        let header_key = headers
            .get(ADMIN_KEY_HEADER)
            .and_then(|value| value.to_str().ok());

        match header_key.or(body_key) {
            Some(key) if key == &*self.admin_key => Ok(()),
            _ => {
                tracing::warn!("rejected admin request");
                Err(Error::unauthorized("invalid admin key"))
            }
        }
    }
}
