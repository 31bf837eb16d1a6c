//! Per-request tracing: method, path, status and latency.

use std::time::Instant;

use tracing::info;

use crate::app::App;
use crate::middleware::Middleware;
use crate::request::Request;
use crate::response::Response;

/// Logs one `info` event per request once the rest of the chain answered.
///
/// Mount it first so the latency covers everything behind it.
#[derive(Clone, Copy, Debug, Default)]
pub struct Trace;

impl Middleware for Trace {
    fn process(&self, req: Request, next: &mut App) -> Response {
        let method = req.method();
        let path = req.path().to_owned();
        let start = Instant::now();

        let res = next.handle(req);

        info!(
            %method,
            %path,
            status = res.status_code().as_u16(),
            latency_us = start.elapsed().as_micros() as u64,
            "request",
        );
        res
    }
}
