//! # tether
//!
//! A minimal HTTP middleware pipeline. Three pieces, nothing more:
//!
//! - [`App`] — a one-shot dispatcher. It owns a queue of middlewares and
//!   pops one per [`App::handle`] call; a middleware advances the chain by
//!   calling `next.handle(req)` on the app it was given.
//! - [`Container`] — keyed values and lazy factories, with keys that can be
//!   frozen for good.
//! - [`Router`] — method + path routing via [`matchit`], prefix groups,
//!   route-level middleware and canned responders. The router is itself a
//!   middleware.
//!
//! [`Server`] hosts the pipeline on hyper + tokio, one fresh `App` per request.
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use http::StatusCode;
//! use serde_json::json;
//! use tether::middleware::Trace;
//! use tether::{App, Layer, Method, Request, Response, Router, Routes, Server};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), tether::Error> {
//!     let mut router = Router::new();
//!     router
//!         .get("/users/{id}", get_user)
//!         .text(&[Method::Get], "/ping", "pong", StatusCode::OK);
//!     router.group("/admin", |admin| {
//!         admin.get("/", |_req: Request| "dashboard");
//!     });
//!     let router = Arc::new(router);
//!
//!     Server::bind("0.0.0.0:3000")?
//!         .serve(move |req| {
//!             let mut app = App::new(req);
//!             app.use_middleware(vec![Layer::of::<Trace>(), Arc::clone(&router).into()])
//!                 .expect("static middleware stack");
//!             app
//!         })
//!         .await
//! }
//!
//! fn get_user(req: Request) -> Response {
//!     let id = req.param("id").unwrap_or("unknown");
//!     Response::json(json!({ "id": id }).to_string().into_bytes())
//! }
//! ```

mod app;
mod container;
mod error;
mod factory;
mod handler;
mod method;
mod request;
mod response;
mod router;
mod server;

pub mod middleware;

pub use app::{App, AppBuilder};
pub use container::{Container, Slot};
pub use error::Error;
pub use factory::{DefaultFactory, HttpFactory};
pub use handler::Handler;
pub use method::Method;
pub use middleware::{Layer, Middleware};
pub use request::Request;
pub use response::{ContentType, IntoResponse, Response, ResponseBuilder};
pub use router::{RouteGroup, RouteStack, Router, Routes};
pub use server::Server;
