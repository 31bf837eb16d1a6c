//! Middleware layer.
//!
//! A middleware receives the request and the [`App`] that is dispatching it.
//! It may answer on its own (short-circuit), call `next.handle(req)` to run
//! the rest of the queue, or wrap whatever comes back:
//!
//! ```rust
//! use tether::middleware::from_fn;
//! use tether::{App, Request};
//!
//! let exclaim = from_fn(|req: Request, next: &mut App| {
//!     let mut res = next.handle(req);
//!     res.write("!");
//!     res
//! });
//!
//! let mut app = App::new(Request::default());
//! app.use_middleware(exclaim).unwrap();
//! assert_eq!(app.run().unwrap().body(), b"!");
//! ```
//!
//! Anything accepted by a `use`-style call is a [`Layer`]: a single unit, a
//! type to construct, a registered name, or a nested list of those.
//! [`unpack`] flattens a layer into the uniform units the dispatcher queues.

mod trace;

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::app::App;
use crate::error::Error;
use crate::request::Request;
use crate::response::Response;

pub use trace::Trace;

/// A request-handling unit in the chain.
pub trait Middleware: Send + Sync + 'static {
    fn process(&self, req: Request, next: &mut App) -> Response;
}

/// A type-erased, shareable middleware. One `Arc` can sit in many queues.
pub type BoxedMiddleware = Arc<dyn Middleware>;

impl<M: Middleware + ?Sized> Middleware for Arc<M> {
    fn process(&self, req: Request, next: &mut App) -> Response {
        (**self).process(req, next)
    }
}

// ── Closures ──────────────────────────────────────────────────────────────────

/// A closure adapted to [`Middleware`]. Built by [`from_fn`].
pub struct FnMiddleware<F>(F);

/// Adapts `Fn(Request, &mut App) -> Response` into a middleware.
pub fn from_fn<F>(f: F) -> FnMiddleware<F>
where
    F: Fn(Request, &mut App) -> Response + Send + Sync + 'static,
{
    FnMiddleware(f)
}

impl<F> Middleware for FnMiddleware<F>
where
    F: Fn(Request, &mut App) -> Response + Send + Sync + 'static,
{
    fn process(&self, req: Request, next: &mut App) -> Response {
        (self.0)(req, next)
    }
}

// ── Layer ─────────────────────────────────────────────────────────────────────

/// A middleware specification, before normalization.
pub enum Layer {
    /// An already-adapted unit.
    Unit(BoxedMiddleware),
    /// Instantiated with no arguments when unpacked.
    Construct(fn() -> BoxedMiddleware),
    /// Looked up in a [`Registry`] when unpacked.
    Named(String),
    /// Flattened depth-first, left to right.
    Stack(Vec<Layer>),
}

fn construct<M: Middleware + Default>() -> BoxedMiddleware {
    Arc::new(M::default())
}

impl Layer {
    /// A fresh `M::default()` for every queue the layer is unpacked into.
    pub fn of<M: Middleware + Default>() -> Self {
        Self::Construct(construct::<M>)
    }
}

impl fmt::Debug for Layer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unit(_) => f.write_str("Unit(..)"),
            Self::Construct(_) => f.write_str("Construct(..)"),
            Self::Named(name) => f.debug_tuple("Named").field(name).finish(),
            Self::Stack(layers) => f.debug_tuple("Stack").field(layers).finish(),
        }
    }
}

impl<M: Middleware> From<M> for Layer {
    fn from(m: M) -> Self {
        Self::Unit(Arc::new(m))
    }
}

impl From<&str> for Layer {
    fn from(name: &str) -> Self {
        Self::Named(name.to_owned())
    }
}

impl From<String> for Layer {
    fn from(name: String) -> Self {
        Self::Named(name)
    }
}

impl<T: Into<Layer>> From<Vec<T>> for Layer {
    fn from(layers: Vec<T>) -> Self {
        Self::Stack(layers.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<Layer>, const N: usize> From<[T; N]> for Layer {
    fn from(layers: [T; N]) -> Self {
        Self::Stack(layers.into_iter().map(Into::into).collect())
    }
}

// ── Registry ──────────────────────────────────────────────────────────────────

type Constructor = Arc<dyn Fn() -> BoxedMiddleware + Send + Sync>;

/// Named middleware constructors, resolved by [`Layer::Named`].
#[derive(Clone, Default)]
pub struct Registry {
    constructors: HashMap<String, Constructor>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `M::default()` under `name`.
    pub fn register<M: Middleware + Default>(&mut self, name: &str) -> &mut Self {
        self.register_with(name, construct::<M>)
    }

    pub fn register_with<F>(&mut self, name: &str, ctor: F) -> &mut Self
    where
        F: Fn() -> BoxedMiddleware + Send + Sync + 'static,
    {
        self.constructors.insert(name.to_owned(), Arc::new(ctor));
        self
    }

    pub fn contains(&self, name: &str) -> bool {
        self.constructors.contains_key(name)
    }

    fn instantiate(&self, name: &str) -> Option<BoxedMiddleware> {
        self.constructors.get(name).map(|ctor| ctor())
    }
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<_> = self.constructors.keys().collect();
        names.sort();
        f.debug_struct("Registry").field("names", &names).finish()
    }
}

// ── Normalization ─────────────────────────────────────────────────────────────

/// Flattens `layer` into queueable units.
///
/// Either every element resolves or nothing is returned, so a caller that
/// appends the result never ends up with half a layer.
pub fn unpack(layer: Layer, registry: &Registry) -> Result<Vec<BoxedMiddleware>, Error> {
    let mut units = Vec::new();
    flatten(layer, registry, &mut units)?;
    Ok(units)
}

fn flatten(layer: Layer, registry: &Registry, out: &mut Vec<BoxedMiddleware>) -> Result<(), Error> {
    match layer {
        Layer::Unit(unit) => out.push(unit),
        Layer::Construct(ctor) => out.push(ctor()),
        Layer::Named(name) => match registry.instantiate(&name) {
            Some(unit) => out.push(unit),
            None => return Err(Error::InvalidMiddleware(name)),
        },
        Layer::Stack(layers) => {
            for layer in layers {
                flatten(layer, registry, out)?;
            }
        }
    }
    Ok(())
}
