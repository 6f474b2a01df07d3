//! Job handlers and the registry that resolves a descriptor's class.
//!
//! Handlers are registered explicitly at startup. A class with no entry is
//! an [`Error::UnknownHandler`], never a fallback.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use crate::error::{BoxError, Error, Result};
use crate::model::Arg;

/// Result type for job handlers.
pub type HandlerResult = std::result::Result<(), BoxError>;

/// Future type for async job handlers.
pub type HandlerFuture = Pin<Box<dyn Future<Output = HandlerResult> + Send>>;

/// Code that runs a job class.
pub trait Handler: Send + Sync + 'static {
    /// The class name this handler is registered under.
    fn class(&self) -> &str;

    /// Run the job with its arguments.
    fn perform(&self, args: Vec<Arg>) -> HandlerFuture;

    /// Custom lock name for these arguments.
    ///
    /// Return `Some` to define what "the same job" means for this class,
    /// e.g. to ignore some arguments. `None` uses the default
    /// `class_arg1_arg2` naming.
    fn lock_name(&self, _args: &[Arg]) -> Option<String> {
        None
    }
}

/// Registry of handlers, indexed by class name.
#[derive(Default, Clone)]
pub struct HandlerRegistry {
    handlers: HashMap<String, Arc<dyn Handler>>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler under its class name. Replaces any previous entry.
    pub fn register<H: Handler>(&mut self, handler: H) -> &mut Self {
        self.handlers
            .insert(handler.class().to_string(), Arc::new(handler));
        self
    }

    /// Look up a handler, failing on unknown classes.
    pub fn resolve(&self, class: &str) -> Result<Arc<dyn Handler>> {
        self.handlers
            .get(class)
            .cloned()
            .ok_or_else(|| Error::UnknownHandler(class.to_string()))
    }

    pub fn contains(&self, class: &str) -> bool {
        self.handlers.contains_key(class)
    }

    /// Registered class names, sorted.
    pub fn classes(&self) -> Vec<&str> {
        let mut classes: Vec<&str> = self.handlers.keys().map(String::as_str).collect();
        classes.sort_unstable();
        classes
    }
}

type LockNameFn = dyn Fn(&[Arg]) -> String + Send + Sync;

/// A closure-based handler.
pub struct FnHandler<F>
where
    F: Fn(Vec<Arg>) -> HandlerFuture + Send + Sync + 'static,
{
    class: String,
    perform: F,
    lock_name: Option<Box<LockNameFn>>,
}

impl<F> FnHandler<F>
where
    F: Fn(Vec<Arg>) -> HandlerFuture + Send + Sync + 'static,
{
    pub fn new(class: impl Into<String>, perform: F) -> Self {
        Self {
            class: class.into(),
            perform,
            lock_name: None,
        }
    }

    /// Use a custom lock name for this class.
    pub fn with_lock_name(
        mut self,
        lock_name: impl Fn(&[Arg]) -> String + Send + Sync + 'static,
    ) -> Self {
        self.lock_name = Some(Box::new(lock_name));
        self
    }
}

impl<F> Handler for FnHandler<F>
where
    F: Fn(Vec<Arg>) -> HandlerFuture + Send + Sync + 'static,
{
    fn class(&self) -> &str {
        &self.class
    }

    fn perform(&self, args: Vec<Arg>) -> HandlerFuture {
        (self.perform)(args)
    }

    fn lock_name(&self, args: &[Arg]) -> Option<String> {
        self.lock_name.as_ref().map(|f| f(args))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn noop(_: Vec<Arg>) -> HandlerFuture {
        Box::pin(async { HandlerResult::Ok(()) })
    }

    #[test]
    fn registry_lists_and_resolves_classes() {
        let mut registry = HandlerRegistry::new();
        registry
            .register(FnHandler::new("Sleep", noop))
            .register(FnHandler::new("Echo", noop));

        assert!(registry.contains("Echo"));
        assert!(!registry.contains("echo"));
        assert_eq!(registry.classes(), vec!["Echo", "Sleep"]);
        assert_eq!(registry.resolve("Sleep").unwrap().class(), "Sleep");
        assert!(matches!(
            registry.resolve("Nope"),
            Err(Error::UnknownHandler(ref c)) if c == "Nope"
        ));
    }

    #[test]
    fn register_replaces_same_class() {
        let mut registry = HandlerRegistry::new();
        registry
            .register(FnHandler::new("Echo", noop))
            .register(FnHandler::new("Echo", noop).with_lock_name(|_| "one".to_string()));

        assert_eq!(registry.classes(), vec!["Echo"]);
        let handler = registry.resolve("Echo").unwrap();
        assert_eq!(handler.lock_name(&[]).as_deref(), Some("one"));
    }
}
