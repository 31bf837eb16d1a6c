//! Prefix-scoped route registration.

use super::Routes;
use crate::method::Method;
use crate::middleware::{BoxedMiddleware, Registry};

/// A view over a parent router that prefixes every registered path.
///
/// Obtained through [`Routes::group`]. Groups nest: an inner group's `map`
/// calls the outer group's `map`, so prefixes add up.
///
/// ```rust
/// use tether::{Method, Request, Router, Routes};
///
/// let mut router = Router::new();
/// router.group("/api", |api| {
///     api.group("v1", |v1| {
///         v1.get("/users", |_req: Request| "users");
///     });
/// });
///
/// assert!(router.lookup(Method::Get, "/api/v1/users").is_some());
/// ```
pub struct RouteGroup<'a> {
    prefix: String,
    parent: &'a mut (dyn Routes + 'a),
}

impl<'a> RouteGroup<'a> {
    /// Normalizes `prefix` to one leading slash and no trailing slash.
    pub(crate) fn new(prefix: &str, parent: &'a mut (dyn Routes + 'a)) -> Self {
        let trimmed = prefix.trim_matches('/');
        let prefix = if trimmed.is_empty() { String::new() } else { format!("/{trimmed}") };
        Self { prefix, parent }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// `prefix + path`; an empty or `/` path adds nothing.
    fn join(&self, path: &str) -> String {
        let path = path.trim_start_matches('/');
        if path.is_empty() {
            self.prefix.clone()
        } else {
            format!("{}/{path}", self.prefix)
        }
    }
}

impl Routes for RouteGroup<'_> {
    fn map(&mut self, methods: &[Method], path: &str, handler: BoxedMiddleware) {
        let path = self.join(path);
        self.parent.map(methods, &path, handler);
    }

    fn registry(&self) -> &Registry {
        self.parent.registry()
    }
}
