//! Radix-tree request routing.
//!
//! [`Routes`] is the registration surface every router shares: the verb
//! helpers, route-level middleware, prefix groups and canned responders all
//! reduce to a single [`Routes::map`] call. [`Router`] implements `map` with
//! one [`matchit`] tree per HTTP method and is itself a [`Middleware`], so it
//! is mounted into an [`App`] like anything else:
//!
//! ```rust
//! use tether::{App, Method, Request, Router, Routes};
//!
//! let mut router = Router::new();
//! router.get("/users/{id}", |req: Request| format!("user {}", req.param("id").unwrap_or("?")));
//! router.group("/admin", |admin| {
//!     admin.get("/", |_req: Request| "dashboard");
//! });
//!
//! let mut app = App::new(Request::new(Method::Get, "/admin"));
//! app.use_middleware(router).unwrap();
//! assert_eq!(app.run().unwrap().body(), b"dashboard");
//! ```

mod group;

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use http::StatusCode;
use matchit::Router as MatchitRouter;
use tracing::{debug, trace};

use crate::app::App;
use crate::error::Error;
use crate::handler::Handler;
use crate::method::Method;
use crate::middleware::{unpack, BoxedMiddleware, Layer, Middleware, Registry};
use crate::request::Request;
use crate::response::{ContentType, Response};

pub use group::RouteGroup;

/// Route registration shared by [`Router`] and [`RouteGroup`].
///
/// Implementors provide [`map`](Routes::map) and [`registry`](Routes::registry);
/// everything else is built on top of them.
pub trait Routes {
    /// Registers `handler` for every method in `methods` at `path`.
    fn map(&mut self, methods: &[Method], path: &str, handler: BoxedMiddleware);

    /// Names available to [`Layer::Named`] in [`use_with`](Routes::use_with).
    fn registry(&self) -> &Registry;

    fn route(&mut self, methods: &[Method], path: &str, handler: impl Handler) -> &mut Self
    where
        Self: Sized,
    {
        self.map(methods, path, handler.into_middleware());
        self
    }

    /// Registers `handler` behind the route-level middlewares in `layer`.
    ///
    /// Fails with [`Error::InvalidMiddleware`] before anything is registered
    /// when `layer` names an unknown middleware.
    fn use_with(
        &mut self,
        methods: &[Method],
        layer: impl Into<Layer>,
        path: &str,
        handler: impl Handler,
    ) -> Result<&mut Self, Error>
    where
        Self: Sized,
    {
        let mut units = unpack(layer.into(), self.registry())?;
        units.push(handler.into_middleware());
        self.map(methods, path, Arc::new(RouteStack::new(units)));
        Ok(self)
    }

    /// Registers every route added by `build` under `prefix`.
    fn group<F>(&mut self, prefix: &str, build: F) -> &mut Self
    where
        Self: Sized,
        F: FnOnce(&mut RouteGroup<'_>),
    {
        build(&mut RouteGroup::new(prefix, self));
        self
    }

    fn get(&mut self, path: &str, handler: impl Handler) -> &mut Self
    where
        Self: Sized,
    {
        self.route(&[Method::Get], path, handler)
    }

    fn post(&mut self, path: &str, handler: impl Handler) -> &mut Self
    where
        Self: Sized,
    {
        self.route(&[Method::Post], path, handler)
    }

    fn put(&mut self, path: &str, handler: impl Handler) -> &mut Self
    where
        Self: Sized,
    {
        self.route(&[Method::Put], path, handler)
    }

    fn patch(&mut self, path: &str, handler: impl Handler) -> &mut Self
    where
        Self: Sized,
    {
        self.route(&[Method::Patch], path, handler)
    }

    fn delete(&mut self, path: &str, handler: impl Handler) -> &mut Self
    where
        Self: Sized,
    {
        self.route(&[Method::Delete], path, handler)
    }

    fn head(&mut self, path: &str, handler: impl Handler) -> &mut Self
    where
        Self: Sized,
    {
        self.route(&[Method::Head], path, handler)
    }

    fn options(&mut self, path: &str, handler: impl Handler) -> &mut Self
    where
        Self: Sized,
    {
        self.route(&[Method::Options], path, handler)
    }

    /// GET, POST, PUT, PATCH, DELETE and OPTIONS.
    fn any(&mut self, path: &str, handler: impl Handler) -> &mut Self
    where
        Self: Sized,
    {
        self.route(&Method::ANY, path, handler)
    }

    // ── Canned responders ─────────────────────────────────────────────────────

    fn text(&mut self, methods: &[Method], path: &str, text: &str, status: StatusCode) -> &mut Self
    where
        Self: Sized,
    {
        let text = text.to_owned();
        self.route(methods, path, move |_req: Request| {
            Response::builder().status(status).text(text.clone())
        })
    }

    fn html(&mut self, methods: &[Method], path: &str, html: &str, status: StatusCode) -> &mut Self
    where
        Self: Sized,
    {
        let html = html.to_owned();
        self.route(methods, path, move |_req: Request| {
            Response::builder().status(status).html(html.clone())
        })
    }

    fn xml(&mut self, methods: &[Method], path: &str, xml: &str, status: StatusCode) -> &mut Self
    where
        Self: Sized,
    {
        let xml = xml.to_owned();
        self.route(methods, path, move |_req: Request| {
            Response::builder().status(status).bytes(ContentType::Xml, xml.clone().into_bytes())
        })
    }

    /// `data` is serialized once, at registration.
    fn json(
        &mut self,
        methods: &[Method],
        path: &str,
        data: &serde_json::Value,
        status: StatusCode,
    ) -> &mut Self
    where
        Self: Sized,
    {
        let body = data.to_string();
        self.route(methods, path, move |_req: Request| {
            Response::builder().status(status).json(body.clone().into_bytes())
        })
    }

    /// JSON wrapped in a call to `callback`, served as JavaScript.
    fn jsonp(
        &mut self,
        methods: &[Method],
        path: &str,
        data: &serde_json::Value,
        callback: &str,
        status: StatusCode,
    ) -> &mut Self
    where
        Self: Sized,
    {
        let body = format!("/**/{callback}({data});");
        self.route(methods, path, move |_req: Request| {
            Response::builder().status(status).bytes(ContentType::JavaScript, body.clone().into_bytes())
        })
    }

    /// Serves the file at `file` inline on `GET path`. The file is read per request.
    fn file(&mut self, path: &str, file: impl Into<PathBuf>) -> &mut Self
    where
        Self: Sized,
    {
        let file = file.into();
        self.route(&[Method::Get], path, move |_req: Request| Response::file(&file))
    }

    /// Serves the file at `file` as an attachment named `filename` (or its
    /// own name when empty) on `GET path`.
    fn download(&mut self, path: &str, file: impl Into<PathBuf>, filename: &str) -> &mut Self
    where
        Self: Sized,
    {
        let file = file.into();
        let filename = filename.to_owned();
        self.route(&[Method::Get], path, move |_req: Request| Response::download(&file, &filename))
    }

    fn redirect(&mut self, from: &str, to: &str, status: StatusCode) -> &mut Self
    where
        Self: Sized,
    {
        let to = to.to_owned();
        self.route(&[Method::Get], from, move |_req: Request| Response::redirect(&to, status))
    }
}

// ── RouteStack ────────────────────────────────────────────────────────────────

/// Route-level middlewares plus the terminal action, run as one unit.
///
/// Every constituent sees a clone of the request and the same `next`. Each
/// result becomes `next`'s current response, so only the last one survives;
/// the stack then hands over to `next.handle(req)`, which returns that
/// response once the app's own queue is exhausted.
pub struct RouteStack {
    units: Vec<BoxedMiddleware>,
}

impl RouteStack {
    pub fn new(units: Vec<BoxedMiddleware>) -> Self {
        Self { units }
    }

    pub fn len(&self) -> usize {
        self.units.len()
    }

    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }
}

impl Middleware for RouteStack {
    fn process(&self, req: Request, next: &mut App) -> Response {
        for unit in &self.units {
            let res = unit.process(req.clone(), next);
            next.set_response(res);
        }
        next.handle(req)
    }
}

// ── Router ────────────────────────────────────────────────────────────────────

/// The application router.
///
/// One radix tree per HTTP method — O(path-length) lookup. Build it once at
/// startup and mount it; wrap it in an `Arc` to share it between the apps of
/// concurrent requests.
#[derive(Default)]
pub struct Router {
    routes: HashMap<Method, MatchitRouter<BoxedMiddleware>>,
    registry: Registry,
}

impl Router {
    pub fn new() -> Self {
        Self::default()
    }

    /// A router whose [`use_with`](Routes::use_with) resolves names through `registry`.
    pub fn with_registry(registry: Registry) -> Self {
        Self { routes: HashMap::new(), registry }
    }

    /// Finds the handler for `method` + `path`, with the captured parameters.
    ///
    /// `HEAD` falls back to the `GET` route when no `HEAD` route matches.
    pub fn lookup(
        &self,
        method: Method,
        path: &str,
    ) -> Option<(BoxedMiddleware, HashMap<String, String>)> {
        match self.find(method, path) {
            None if method == Method::Head => self.find(Method::Get, path),
            found => found,
        }
    }

    fn find(&self, method: Method, path: &str) -> Option<(BoxedMiddleware, HashMap<String, String>)> {
        let tree = self.routes.get(&method)?;
        let matched = tree.at(path).ok()?;
        let handler = Arc::clone(matched.value);
        let params = matched.params.iter()
            .map(|(k, v)| (k.to_owned(), v.to_owned()))
            .collect();
        Some((handler, params))
    }

    /// Methods with a route matching `path`, sorted. `HEAD` is implied by `GET`.
    pub fn allowed(&self, path: &str) -> Vec<Method> {
        let mut methods: Vec<Method> = self.routes.iter()
            .filter(|(_, tree)| tree.at(path).is_ok())
            .map(|(&method, _)| method)
            .collect();
        if methods.contains(&Method::Get) && !methods.contains(&Method::Head) {
            methods.push(Method::Head);
        }
        methods.sort();
        methods
    }
}

impl Routes for Router {
    /// # Panics
    ///
    /// Panics if `path` is not a valid route pattern or conflicts with an
    /// existing route. Routes are registered at startup, so this surfaces
    /// immediately.
    fn map(&mut self, methods: &[Method], path: &str, handler: BoxedMiddleware) {
        let path = format!("/{}", path.trim_start_matches('/'));
        for &method in methods {
            trace!(%method, %path, "route registered");
            self.routes
                .entry(method)
                .or_default()
                .insert(path.clone(), Arc::clone(&handler))
                .unwrap_or_else(|e| panic!("invalid route `{path}`: {e}"));
        }
    }

    fn registry(&self) -> &Registry {
        &self.registry
    }
}

impl Middleware for Router {
    fn process(&self, req: Request, next: &mut App) -> Response {
        if let Some((handler, params)) = self.lookup(req.method(), req.path()) {
            return handler.process(req.with_params(params), next);
        }

        let allowed = self.allowed(req.path());
        if allowed.is_empty() {
            debug!(method = %req.method(), path = req.path(), "no route");
            return Response::status(StatusCode::NOT_FOUND);
        }

        debug!(method = %req.method(), path = req.path(), "method not allowed");
        let allow = allowed.iter().map(|m| m.as_str()).collect::<Vec<_>>().join(", ");
        Response::builder()
            .status(StatusCode::METHOD_NOT_ALLOWED)
            .header("allow", &allow)
            .no_body()
    }
}
