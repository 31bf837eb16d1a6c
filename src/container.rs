//! Keyed store of shared values and lazy factories.
//!
//! Every [`App`](crate::App) owns one [`Container`]. Middlewares reach it
//! through `next.container()`:
//!
//! ```rust
//! use tether::Container;
//!
//! let mut c = Container::new();
//! c.set("greeting", String::from("hello")).unwrap();
//! c.set_factory("shout", |c: &Container| {
//!     c.get::<String>("greeting").map(|g| g.to_uppercase()).unwrap_or_default()
//! }).unwrap();
//!
//! assert_eq!(*c.get::<String>("shout").unwrap(), "HELLO");
//! ```
//!
//! # Freezing
//!
//! [`Container::freeze`] locks a key for good. The frozen set is keyed by name
//! and never pruned: a frozen key can still be removed, but no value can be
//! set under its name again.

use std::any::{type_name, Any};
use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;

use crate::error::Error;

type Shared = Arc<dyn Any + Send + Sync>;
type Factory = Arc<dyn Fn(&Container) -> Shared + Send + Sync>;

/// One container entry: a concrete value or a factory run on every `get`.
#[derive(Clone)]
pub enum Slot {
    Value(Shared),
    Factory(Factory),
}

impl Slot {
    pub fn is_factory(&self) -> bool {
        matches!(self, Self::Factory(_))
    }
}

impl fmt::Debug for Slot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Value(_) => f.write_str("Value(..)"),
            Self::Factory(_) => f.write_str("Factory(..)"),
        }
    }
}

#[derive(Default)]
pub struct Container {
    // Insertion order is preserved; `index` maps a key to its position.
    bag: Vec<(String, Slot)>,
    index: HashMap<String, usize>,
    frozen: HashSet<String>,
    resolving: RefCell<Vec<String>>,
}

impl Container {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores `value` under `key`, replacing any previous entry in place.
    pub fn set<T: Any + Send + Sync>(&mut self, key: &str, value: T) -> Result<&mut Self, Error> {
        self.insert(key, Slot::Value(Arc::new(value)))
    }

    /// Stores a factory under `key`. Each [`get`](Container::get) calls it
    /// again with the container; nothing is memoized.
    pub fn set_factory<T, F>(&mut self, key: &str, factory: F) -> Result<&mut Self, Error>
    where
        T: Any + Send + Sync,
        F: Fn(&Container) -> T + Send + Sync + 'static,
    {
        self.insert(key, Slot::Factory(Arc::new(move |c: &Container| Arc::new(factory(c)) as Shared)))
    }

    fn insert(&mut self, key: &str, slot: Slot) -> Result<&mut Self, Error> {
        if self.frozen.contains(key) {
            return Err(Error::FrozenKey(key.to_owned()));
        }
        match self.index.get(key) {
            Some(&i) => self.bag[i].1 = slot,
            None => {
                self.index.insert(key.to_owned(), self.bag.len());
                self.bag.push((key.to_owned(), slot));
            }
        }
        Ok(self)
    }

    /// Presence, not truthiness: `0`, `""` and `None` values all count.
    pub fn has(&self, key: &str) -> bool {
        self.index.contains_key(key)
    }

    /// Resolves `key` as a `T`, invoking it first if it is a factory.
    pub fn get<T: Any + Send + Sync>(&self, key: &str) -> Result<Arc<T>, Error> {
        let slot = self.slot(key).ok_or_else(|| Error::NotFound(key.to_owned()))?;
        let value = match slot {
            Slot::Value(value) => Arc::clone(value),
            Slot::Factory(factory) => {
                let _guard = Resolving::enter(&self.resolving, key)?;
                factory(self)
            }
        };
        value.downcast::<T>().map_err(|_| Error::TypeMismatch {
            key: key.to_owned(),
            expected: type_name::<T>(),
        })
    }

    /// The raw slot, without resolving factories.
    pub fn slot(&self, key: &str) -> Option<&Slot> {
        self.index.get(key).map(|&i| &self.bag[i].1)
    }

    /// Removes `key`. A frozen key can be removed, but it stays frozen, so it
    /// can never be set again.
    pub fn unset(&mut self, key: &str) -> Result<&mut Self, Error> {
        let Some(i) = self.index.remove(key) else {
            return Err(Error::OutOfRange(key.to_owned()));
        };
        self.bag.remove(i);
        for pos in self.index.values_mut() {
            if *pos > i {
                *pos -= 1;
            }
        }
        Ok(self)
    }

    /// Locks `key` against `set`. Absent keys are left alone.
    pub fn freeze(&mut self, key: &str) -> &mut Self {
        if self.has(key) {
            self.frozen.insert(key.to_owned());
        }
        self
    }

    pub fn is_frozen(&self, key: &str) -> bool {
        self.frozen.contains(key)
    }

    pub fn len(&self) -> usize {
        self.bag.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bag.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.bag.iter().map(|(k, _)| k.as_str())
    }

    /// Raw entries in insertion order. Factories are not invoked.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Slot)> {
        self.bag.iter().map(|(k, s)| (k.as_str(), s))
    }
}

impl fmt::Debug for Container {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Container")
            .field("keys", &self.keys().collect::<Vec<_>>())
            .field("frozen", &self.frozen)
            .finish()
    }
}

/// Marks a key as being resolved for as long as the guard lives.
struct Resolving<'a> {
    stack: &'a RefCell<Vec<String>>,
}

impl<'a> Resolving<'a> {
    fn enter(stack: &'a RefCell<Vec<String>>, key: &str) -> Result<Self, Error> {
        let mut keys = stack.borrow_mut();
        if keys.iter().any(|k| k == key) {
            return Err(Error::CyclicResolution(key.to_owned()));
        }
        keys.push(key.to_owned());
        Ok(Self { stack })
    }
}

impl Drop for Resolving<'_> {
    fn drop(&mut self) {
        self.stack.borrow_mut().pop();
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    #[test]
    fn set_then_get() {
        let mut c = Container::new();
        c.set("foo", "bar").unwrap();
        c.set("test", vec!["deep"]).unwrap();

        assert_eq!(*c.get::<&str>("foo").unwrap(), "bar");
        assert_eq!(*c.get::<Vec<&str>>("test").unwrap(), vec!["deep"]);
    }

    #[test]
    fn factory_receives_container_and_is_not_memoized() {
        static CALLS: AtomicUsize = AtomicUsize::new(0);

        let mut c = Container::new();
        c.set("base", 20u32).unwrap();
        c.set_factory("answer", |c: &Container| {
            CALLS.fetch_add(1, Ordering::SeqCst);
            *c.get::<u32>("base").unwrap() + 22
        }).unwrap();

        assert_eq!(*c.get::<u32>("answer").unwrap(), 42);
        assert_eq!(*c.get::<u32>("answer").unwrap(), 42);
        assert_eq!(CALLS.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn has_is_presence_not_truthiness() {
        let mut c = Container::new();
        c.set("zero", 0i32).unwrap()
            .set("empty", "").unwrap()
            .set("no", false).unwrap()
            .set("none", None::<u8>).unwrap();

        for key in ["zero", "empty", "no", "none"] {
            assert!(c.has(key), "{key}");
        }
        assert!(!c.has("missing"));
    }

    #[test]
    fn frozen_key_rejects_set_and_keeps_value() {
        let mut c = Container::new();
        c.set("x", 1).unwrap();
        c.freeze("x");

        assert!(matches!(c.set("x", 2), Err(Error::FrozenKey(k)) if k == "x"));
        assert_eq!(*c.get::<i32>("x").unwrap(), 1);
    }

    #[test]
    fn frozen_key_stays_frozen_after_unset() {
        let mut c = Container::new();
        c.set("x", 1).unwrap().freeze("x");

        assert!(c.unset("x").is_ok());
        assert!(!c.has("x"));
        assert!(matches!(c.set("x", 2), Err(Error::FrozenKey(_))));
        assert!(!c.has("x"));
        assert!(c.is_frozen("x"));
    }

    #[test]
    fn freeze_absent_key_is_noop() {
        let mut c = Container::new();
        c.freeze("ghost").freeze("ghost");
        assert!(!c.is_frozen("ghost"));
        c.set("ghost", 1).unwrap();
    }

    #[test]
    fn get_and_unset_absent_keys() {
        let mut c = Container::new();
        assert!(matches!(c.get::<i32>("nope"), Err(Error::NotFound(_))));
        assert!(matches!(c.unset("nope"), Err(Error::OutOfRange(_))));
    }

    #[test]
    fn type_mismatch_names_the_type() {
        let mut c = Container::new();
        c.set("n", 1u8).unwrap();
        match c.get::<String>("n") {
            Err(Error::TypeMismatch { key, expected }) => {
                assert_eq!(key, "n");
                assert!(expected.contains("String"));
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn self_referencing_factory_is_rejected() {
        let mut c = Container::new();
        c.set_factory("loop", |c: &Container| c.get::<u8>("loop").is_err()).unwrap();

        // The inner lookup fails with a cycle error, so the factory yields `true`.
        assert!(*c.get::<bool>("loop").unwrap());
        // The guard is released afterwards.
        assert!(*c.get::<bool>("loop").unwrap());
    }

    #[test]
    fn iteration_keeps_insertion_order_and_skips_resolution() {
        let mut c = Container::new();
        c.set("a", 1).unwrap();
        c.set_factory("b", |_: &Container| -> u8 { panic!("resolved during iteration") }).unwrap();
        c.set("c", 3).unwrap();
        c.unset("a").unwrap();
        c.set("a", 4).unwrap();
        c.set("c", 5).unwrap();

        let entries: Vec<_> = c.iter().map(|(k, s)| (k, s.is_factory())).collect();
        assert_eq!(entries, [("b", true), ("c", false), ("a", false)]);
        assert_eq!(*c.get::<i32>("c").unwrap(), 5);
    }
}
