//! Construction of fresh response values.
//!
//! The factory is an explicit value handed to each [`App`](crate::App) at
//! startup. There is no process-wide list of candidate implementations; swap
//! the factory by passing another one to [`AppBuilder::factory`](crate::AppBuilder::factory).

use std::sync::Arc;

use http::StatusCode;

use crate::response::Response;

/// Builds the response values the dispatcher needs on its own.
pub trait HttpFactory: Send + Sync + 'static {
    /// The response an `App` starts with before any middleware ran.
    fn create_response(&self, status: StatusCode) -> Response;

    /// A body holding `content`. Used with `b""` to strip `HEAD` responses.
    fn create_body(&self, content: &[u8]) -> Vec<u8> {
        content.to_vec()
    }
}

/// Empty body, no headers.
#[derive(Clone, Copy, Debug, Default)]
pub struct DefaultFactory;

impl HttpFactory for DefaultFactory {
    fn create_response(&self, status: StatusCode) -> Response {
        Response::status(status)
    }
}

pub(crate) fn default_factory() -> Arc<dyn HttpFactory> {
    Arc::new(DefaultFactory)
}
