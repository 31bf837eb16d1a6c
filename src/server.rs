//! HTTP host and graceful shutdown.
//!
//! The server turns every inbound request into a fresh [`App`] (built by the
//! closure passed to [`Server::serve`]) and runs it. Apps are never shared
//! between requests; only what the closure captures (typically an
//! `Arc<Router>`) is.
//!
//! # Graceful shutdown
//!
//! On **SIGTERM** or Ctrl-C the server:
//! 1. Immediately stops `listener.accept()` — no new connections are made.
//! 2. Lets every in-flight connection task run to completion.
//! 3. Returns from [`Server::serve`], which lets `main` exit cleanly.

use std::collections::HashMap;
use std::convert::Infallible;
use std::fmt::Display;
use std::net::SocketAddr;
use std::sync::Arc;

use bytes::Bytes;
use http::StatusCode;
use http_body_util::{BodyExt, Full};
use hyper::body::Body;
use hyper::service::service_fn;
use hyper_util::rt::{TokioExecutor, TokioIo};
use hyper_util::server::conn::auto::Builder as ConnBuilder;
use tokio::net::TcpListener;
use tracing::{error, info, warn};

use crate::app::App;
use crate::error::Error;
use crate::method::Method;
use crate::request::Request;
use crate::response::Response;

/// The HTTP server.
pub struct Server {
    addr: SocketAddr,
}

impl Server {
    /// Configures the server to bind to `addr` when [`serve`](Server::serve)
    /// is called.
    ///
    /// ```rust
    /// use tether::Server;
    ///
    /// assert!(Server::bind("0.0.0.0:3000").is_ok());
    /// assert!(Server::bind("not an address").is_err());
    /// ```
    pub fn bind(addr: &str) -> Result<Self, Error> {
        let addr = addr.parse().map_err(|_| Error::InvalidAddress(addr.to_owned()))?;
        Ok(Self { addr })
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Starts accepting connections; each request is answered by the app
    /// `make_app` builds for it.
    ///
    /// Returns only after a full graceful shutdown.
    pub async fn serve<F>(self, make_app: F) -> Result<(), Error>
    where
        F: Fn(Request) -> App + Send + Sync + 'static,
    {
        let listener = TcpListener::bind(self.addr).await?;
        let make_app = Arc::new(make_app);

        info!(addr = %self.addr, "tether listening");

        let mut tasks = tokio::task::JoinSet::new();

        let shutdown = shutdown_signal();
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                // Check shutdown first so a SIGTERM stops accepting at once.
                biased;

                () = &mut shutdown => {
                    info!(in_flight = tasks.len(), "shutdown signal received, draining connections");
                    break;
                }

                res = listener.accept() => {
                    let (stream, remote_addr) = match res {
                        Ok(v) => v,
                        Err(e) => {
                            error!("accept error: {e}");
                            continue;
                        }
                    };

                    let make_app = Arc::clone(&make_app);
                    let io = TokioIo::new(stream);

                    tasks.spawn(async move {
                        let svc = service_fn(move |req| {
                            let make_app = Arc::clone(&make_app);
                            async move { dispatch(make_app.as_ref(), req).await }
                        });

                        if let Err(e) = ConnBuilder::new(TokioExecutor::new())
                            .serve_connection(io, svc)
                            .await
                        {
                            error!(peer = %remote_addr, "connection error: {e}");
                        }
                    });
                }

                // Reap finished connection tasks so the set does not grow unbounded.
                Some(_) = tasks.join_next(), if !tasks.is_empty() => {}
            }
        }

        while tasks.join_next().await.is_some() {}

        info!("tether stopped");
        Ok(())
    }
}

// ── Request dispatch ──────────────────────────────────────────────────────────

/// Converts one hyper request, runs a fresh app on it, converts the answer.
///
/// Never fails: unknown methods are `405`, unreadable bodies `400`, pipeline
/// errors `500`.
async fn dispatch<F, B>(
    make_app: &F,
    req: hyper::Request<B>,
) -> Result<http::Response<Full<Bytes>>, Infallible>
where
    F: Fn(Request) -> App,
    B: Body,
    B::Error: Display,
{
    let Ok(method) = req.method().as_str().parse::<Method>() else {
        return Ok(Response::status(StatusCode::METHOD_NOT_ALLOWED).into_inner());
    };
    let path = req.uri().path().to_owned();
    let headers = req.headers().iter()
        .filter_map(|(name, value)| {
            value.to_str().ok().map(|v| (name.as_str().to_owned(), v.to_owned()))
        })
        .collect();

    let body = match req.into_body().collect().await {
        Ok(collected) => collected.to_bytes().to_vec(),
        Err(e) => {
            warn!(%path, "failed to read request body: {e}");
            return Ok(Response::status(StatusCode::BAD_REQUEST).into_inner());
        }
    };

    let request = Request { method, path, headers, body, params: HashMap::new() };
    let response = match make_app(request).run() {
        Ok(response) => response,
        Err(e) => {
            error!("pipeline error: {e}");
            Response::status(StatusCode::INTERNAL_SERVER_ERROR)
        }
    };

    Ok(response.into_inner())
}

// ── Shutdown signal ───────────────────────────────────────────────────────────

/// Resolves on the first SIGTERM or SIGINT (Ctrl-C only on non-Unix).
///
/// A signal handler that fails to install never resolves; the other one
/// still can.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("failed to install Ctrl-C handler: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let sigterm = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!("failed to install SIGTERM handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let sigterm = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c   => {}
        () = sigterm  => {}
    }
}
