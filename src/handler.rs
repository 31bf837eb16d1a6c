//! Route handlers and their adaptation into middleware.
//!
//! A route's terminal action is a plain function of the request:
//!
//! ```text
//! fn hello(req: Request) -> Response { … }     ← user writes this
//!        ↓ router.get("/", hello)
//! hello.into_middleware()                      ← Handler blanket impl
//!        ↓
//! Arc::new(Action(hello))                      ← stored as BoxedMiddleware
//!        ↓
//! action.process(req, next)  at request time   ← one vtable dispatch
//! ```
//!
//! Adapting the action to [`Middleware`] is what lets the router queue it
//! behind route-level middlewares in a single chain.

use std::sync::Arc;

use crate::app::App;
use crate::middleware::{BoxedMiddleware, Middleware};
use crate::request::Request;
use crate::response::{IntoResponse, Response};

/// Implemented for every valid route handler.
///
/// You never implement this yourself. It is automatically satisfied for any
/// function or closure with the signature:
///
/// ```text
/// fn name(req: Request) -> impl IntoResponse
/// ```
///
/// Handlers that need the dispatcher itself are middlewares; register those
/// with [`Routes::map`](crate::Routes::map).
pub trait Handler: private::Sealed + Send + Sync + 'static {
    #[doc(hidden)]
    fn into_middleware(self) -> BoxedMiddleware;
}

mod private {
    pub trait Sealed {}
}

impl<F, R> private::Sealed for F
where
    F: Fn(Request) -> R + Send + Sync + 'static,
    R: IntoResponse,
{
}

impl<F, R> Handler for F
where
    F: Fn(Request) -> R + Send + Sync + 'static,
    R: IntoResponse,
{
    fn into_middleware(self) -> BoxedMiddleware {
        Arc::new(Action(self))
    }
}

/// A terminal action: answers without touching the rest of the chain.
struct Action<F>(F);

impl<F, R> Middleware for Action<F>
where
    F: Fn(Request) -> R + Send + Sync + 'static,
    R: IntoResponse,
{
    fn process(&self, req: Request, _next: &mut App) -> Response {
        (self.0)(req).into_response()
    }
}
