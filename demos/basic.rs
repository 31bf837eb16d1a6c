//! Minimal tether example: JSON endpoints, a route group with route-level
//! middleware, and a per-request container value read by that middleware.
//!
//! Run with:
//!   cargo run --example basic
//!
//! Try:
//!   curl http://localhost:3000/users/42
//!   curl -X POST http://localhost:3000/users -d '{"name":"alice"}'
//!   curl -X DELETE http://localhost:3000/users/42
//!   curl http://localhost:3000/admin/stats
//!   curl -I http://localhost:3000/hello

use std::sync::Arc;
use std::time::Instant;

use http::StatusCode;
use serde_json::json;
use tether::middleware::{from_fn, Trace};
use tether::{App, Layer, Method, Request, Response, Router, Routes, Server};
use tracing::info;

#[tokio::main]
async fn main() -> Result<(), tether::Error> {
    tracing_subscriber::fmt::init();

    let mut router = Router::new();
    router
        .get("/users/{id}", get_user)
        .post("/users", create_user)
        .delete("/users/{id}", |_req: Request| StatusCode::NO_CONTENT)
        .text(&[Method::Get], "/hello", "hello", StatusCode::OK)
        .json(&[Method::Get], "/version", &json!({ "version": env!("CARGO_PKG_VERSION") }), StatusCode::OK)
        .redirect("/home", "/hello", StatusCode::FOUND);

    router.group("/admin", |admin| {
        // Route-level middleware runs before the action; the action's
        // response is the one sent.
        let audit = from_fn(|req: Request, next: &mut App| {
            let waited_us = next.container()
                .get::<Instant>("started")
                .map(|started| started.elapsed().as_micros() as u64)
                .unwrap_or(0);
            info!(
                path = req.path(),
                agent = req.header("user-agent").unwrap_or("-"),
                waited_us,
                "admin access"
            );
            next.response().clone()
        });
        admin
            .use_with(&[Method::Get], audit, "/stats", stats)
            .expect("admin routes");
    });

    let router = Arc::new(router);

    Server::bind("0.0.0.0:3000")?
        .serve(move |req| {
            let mut app = App::new(req);
            app.container_mut()
                .set("started", Instant::now())
                .expect("fresh container");
            app.use_middleware(vec![Layer::of::<Trace>(), Arc::clone(&router).into()])
                .expect("static middleware stack");
            app
        })
        .await
}

// GET /users/{id}
fn get_user(req: Request) -> Response {
    let id = req.param("id").unwrap_or("unknown");
    Response::json(json!({ "id": id, "name": "alice" }).to_string().into_bytes())
}

// POST /users
fn create_user(req: Request) -> Response {
    if req.body().is_empty() {
        return Response::status(StatusCode::BAD_REQUEST);
    }

    Response::builder()
        .status(StatusCode::CREATED)
        .header("location", "/users/99")
        .json(json!({ "id": "99", "name": "new_user" }).to_string().into_bytes())
}

// GET /admin/stats, audited
fn stats(_req: Request) -> Response {
    Response::json(json!({ "requests": 1 }).to_string().into_bytes())
}
