//! The dispatcher.
//!
//! An [`App`] owns one request flow: a [`Container`], the current request and
//! response, and a queue of middlewares. Each [`App::handle`] pops exactly one
//! middleware and hands it the app itself as `next`, so calling
//! `next.handle(req)` advances the same queue:
//!
//! ```text
//! app.handle(req)
//!   └─ pop A → A.process(req, app)
//!                └─ app.handle(req)
//!                     └─ pop B → B.process(req, app)
//!                                  └─ app.handle(req)   queue empty:
//!                                                       current response
//! ```
//!
//! A middleware that never calls `next.handle` short-circuits; whatever is
//! still queued behind it is simply never popped.

use std::collections::VecDeque;
use std::mem;
use std::sync::Arc;

use http::StatusCode;
use tracing::debug;

use crate::container::Container;
use crate::error::Error;
use crate::factory::{default_factory, HttpFactory};
use crate::method::Method;
use crate::middleware::{unpack, BoxedMiddleware, Layer, Registry};
use crate::request::Request;
use crate::response::Response;

pub struct App {
    container: Container,
    request: Request,
    response: Response,
    queue: VecDeque<BoxedMiddleware>,
    registry: Registry,
    factory: Arc<dyn HttpFactory>,
}

impl App {
    /// An app for `request` with an empty container and a `200 OK` response.
    pub fn new(request: Request) -> Self {
        Self::builder().request(request).build()
    }

    pub fn builder() -> AppBuilder {
        AppBuilder::default()
    }

    /// Appends `layer` to the queue, flattened. Returns `self` for chaining.
    ///
    /// The queue is left untouched when any element of `layer` is invalid.
    pub fn use_middleware(&mut self, layer: impl Into<Layer>) -> Result<&mut Self, Error> {
        let units = unpack(layer.into(), &self.registry)?;
        self.queue.extend(units);
        Ok(self)
    }

    /// Runs the next queued middleware, or returns the current response when
    /// the queue is exhausted.
    ///
    /// `HEAD` requests get an empty body on every call (RFC 9110 §9.3.2).
    pub fn handle(&mut self, req: Request) -> Response {
        let head = req.method() == Method::Head;

        if let Some(unit) = self.queue.pop_front() {
            debug!(method = %req.method(), path = req.path(), pending = self.queue.len(), "dispatch");
            self.response = unit.process(req, self);
        }

        if head && !self.response.body.is_empty() {
            debug!("stripping body from HEAD response");
            self.response.body = self.factory.create_body(b"");
        }

        self.response.clone()
    }

    /// Dispatches the current request through the queued middlewares.
    ///
    /// Fails with [`Error::NoMiddleware`] when nothing is queued.
    pub fn run(&mut self) -> Result<Response, Error> {
        if self.queue.is_empty() {
            return Err(Error::NoMiddleware);
        }
        let req = self.request.clone();
        Ok(self.handle(req))
    }

    /// Dispatches the current request through `layer` alone.
    ///
    /// A fresh app is built around the same container, request and response;
    /// this app's queue is not touched. Container changes made by `layer`
    /// persist. A layer that flattens to nothing falls back to [`run`](App::run).
    pub fn run_with(&mut self, layer: impl Into<Layer>) -> Result<Response, Error> {
        let units = unpack(layer.into(), &self.registry)?;
        if units.is_empty() {
            return self.run();
        }
        let mut app = App {
            container: mem::take(&mut self.container),
            request: self.request.clone(),
            response: self.response.clone(),
            queue: units.into(),
            registry: self.registry.clone(),
            factory: Arc::clone(&self.factory),
        };
        let result = app.run();
        self.container = app.container;
        result
    }

    /// Appends `data` to the current response body.
    pub fn write(&mut self, data: impl AsRef<[u8]>) {
        self.response.write(data);
    }

    /// `true` when the current request was sent by `XMLHttpRequest`.
    pub fn is_xhr_request(&self) -> bool {
        self.request.header("x-requested-with") == Some("XMLHttpRequest")
    }

    pub fn request(&self) -> &Request { &self.request }
    pub fn response(&self) -> &Response { &self.response }
    pub fn container(&self) -> &Container { &self.container }
    pub fn container_mut(&mut self) -> &mut Container { &mut self.container }
    pub fn registry_mut(&mut self) -> &mut Registry { &mut self.registry }
    pub fn factory(&self) -> &dyn HttpFactory { self.factory.as_ref() }

    pub fn set_response(&mut self, response: Response) {
        self.response = response;
    }

    /// Number of middlewares still queued.
    pub fn pending(&self) -> usize {
        self.queue.len()
    }
}

impl Default for App {
    fn default() -> Self {
        Self::builder().build()
    }
}

/// Assembles an [`App`] from explicitly supplied parts.
///
/// ```rust
/// use tether::{App, Container, DefaultFactory, Method, Request};
///
/// let mut container = Container::new();
/// container.set("env", "test").unwrap();
///
/// let app = App::builder()
///     .container(container)
///     .request(Request::new(Method::Post, "/users"))
///     .factory(DefaultFactory)
///     .build();
/// assert!(app.container().has("env"));
/// ```
#[derive(Default)]
pub struct AppBuilder {
    container: Option<Container>,
    request: Option<Request>,
    response: Option<Response>,
    registry: Option<Registry>,
    factory: Option<Arc<dyn HttpFactory>>,
}

impl AppBuilder {
    pub fn container(mut self, container: Container) -> Self {
        self.container = Some(container);
        self
    }

    pub fn request(mut self, request: Request) -> Self {
        self.request = Some(request);
        self
    }

    /// Starting response; defaults to the factory's `200 OK`.
    pub fn response(mut self, response: Response) -> Self {
        self.response = Some(response);
        self
    }

    pub fn registry(mut self, registry: Registry) -> Self {
        self.registry = Some(registry);
        self
    }

    pub fn factory(mut self, factory: impl HttpFactory) -> Self {
        self.factory = Some(Arc::new(factory));
        self
    }

    pub fn build(self) -> App {
        let factory = self.factory.unwrap_or_else(default_factory);
        let response = self.response
            .unwrap_or_else(|| factory.create_response(StatusCode::OK));
        App {
            container: self.container.unwrap_or_default(),
            request: self.request.unwrap_or_default(),
            response,
            queue: VecDeque::new(),
            registry: self.registry.unwrap_or_default(),
            factory,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;
    use crate::middleware::{from_fn, Middleware};

    /// Records its name, then delegates.
    struct Step {
        name: &'static str,
        log: Arc<Mutex<Vec<&'static str>>>,
    }

    impl Middleware for Step {
        fn process(&self, req: Request, next: &mut App) -> Response {
            self.log.lock().unwrap().push(self.name);
            let mut res = next.handle(req);
            res.write(self.name);
            res
        }
    }

    fn steps(log: &Arc<Mutex<Vec<&'static str>>>, names: &[&'static str]) -> Vec<Step> {
        names.iter()
            .map(|&name| Step { name, log: Arc::clone(log) })
            .collect()
    }

    #[test]
    fn runs_in_order_and_unwinds_in_reverse() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut app = App::new(Request::default());
        app.use_middleware(steps(&log, &["A", "B", "C"])).unwrap();

        let res = app.run().unwrap();

        assert_eq!(*log.lock().unwrap(), ["A", "B", "C"]);
        assert_eq!(res.body(), b"CBA");
        assert_eq!(app.pending(), 0);
    }

    #[test]
    fn exclaim_on_empty_terminal() {
        let mut app = App::new(Request::default());
        app.use_middleware(from_fn(|req: Request, next: &mut App| {
            let mut res = next.handle(req);
            res.write("!");
            res
        })).unwrap();

        let res = app.handle(Request::default());
        assert_eq!(res.body(), b"!");
    }

    #[test]
    fn handle_on_exhausted_queue_returns_current_response() {
        let mut app = App::builder().response(Response::text("kept")).build();
        assert_eq!(app.handle(Request::default()).body(), b"kept");
    }

    #[test]
    fn short_circuit_leaves_rest_queued() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut app = App::new(Request::default());
        app.use_middleware(from_fn(|_req: Request, _next: &mut App| Response::text("halt")))
            .unwrap()
            .use_middleware(steps(&log, &["never"]))
            .unwrap();

        let res = app.run().unwrap();

        assert_eq!(res.body(), b"halt");
        assert!(log.lock().unwrap().is_empty());
        assert_eq!(app.pending(), 1);
    }

    #[test]
    fn head_requests_always_get_empty_bodies() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut app = App::new(Request::new(Method::Head, "/"));
        app.use_middleware(steps(&log, &["A", "B", "C"])).unwrap();

        let res = app.run().unwrap();

        assert_eq!(*log.lock().unwrap(), ["A", "B", "C"]);
        assert!(res.body().is_empty());
    }

    #[test]
    fn run_without_middleware_fails() {
        let mut app = App::default();
        assert!(matches!(app.run(), Err(Error::NoMiddleware)));
        assert!(matches!(app.run_with(Vec::<Layer>::new()), Err(Error::NoMiddleware)));
    }

    #[test]
    fn run_with_leaves_own_queue_alone() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut app = App::new(Request::default());
        app.use_middleware(steps(&log, &["queued"])).unwrap();

        let res = app.run_with(from_fn(|_req: Request, _next: &mut App| Response::text("once")))
            .unwrap();

        assert_eq!(res.body(), b"once");
        assert_eq!(app.pending(), 1);
        assert!(log.lock().unwrap().is_empty());
    }

    #[test]
    fn empty_run_with_runs_own_queue() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut app = App::new(Request::default());
        app.use_middleware(steps(&log, &["queued"])).unwrap();

        let res = app.run_with(Layer::Stack(vec![Layer::Stack(vec![])])).unwrap();

        assert_eq!(res.body(), b"queued");
        assert_eq!(*log.lock().unwrap(), ["queued"]);
        assert_eq!(app.pending(), 0);
    }

    #[test]
    fn run_with_shares_the_container() {
        let mut app = App::default();
        app.container_mut().set("foo", "bar").unwrap();

        app.run_with(from_fn(|req: Request, next: &mut App| {
            assert_eq!(*next.container().get::<&str>("foo").unwrap(), "bar");
            next.container_mut().set("seen", true).unwrap();
            next.handle(req)
        })).unwrap();

        assert!(app.container().has("seen"));
        assert!(app.container().has("foo"));
    }

    #[test]
    fn invalid_layer_does_not_grow_the_queue() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut app = App::default();
        let mut layer: Vec<Layer> = steps(&log, &["ok"]).into_iter().map(Layer::from).collect();
        layer.push("unknown".into());

        assert!(matches!(app.use_middleware(layer), Err(Error::InvalidMiddleware(_))));
        assert_eq!(app.pending(), 0);
    }

    #[test]
    fn write_and_xhr_detection() {
        let req = Request::default().with_header("X-Requested-With", "XMLHttpRequest");
        let mut app = App::new(req);
        app.write("hello");

        assert!(app.is_xhr_request());
        assert_eq!(app.response().body(), b"hello");
        assert!(!App::default().is_xhr_request());
    }
}
