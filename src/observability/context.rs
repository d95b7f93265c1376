//! Ambient context for request propagation across dispatch boundaries.
//!
//! An [`AmbientContext`] carries string key/value fields (request ids,
//! tenant tags, trace correlation) across the producer/consumer boundary.
//! The core snapshots [`AmbientContext::current`] when a callback is
//! installed and restores that snapshot around the callback's invocation,
//! whether it runs inline or on an executor thread.
//!
//! Restoration is a plain swap: each thread has one current context, and a
//! [`ContextGuard`] puts back whatever was current when it was created.
//! Guards are meant to nest; drop them in reverse creation order.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fmt;
use std::marker::PhantomData;
use std::rc::Rc;

thread_local! {
    static CURRENT: RefCell<AmbientContext> = RefCell::new(AmbientContext::new());
}

/// A snapshot of ambient request state.
///
/// This struct is designed to be cloned and carried between threads. It uses
/// value semantics (deep copy of the field map on clone), so modifications to
/// a cloned context do not affect the original.
#[derive(Debug, Clone, Default)]
pub struct AmbientContext {
    fields: BTreeMap<String, String>,
}

impl AmbientContext {
    /// Creates a new empty context.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true if the context carries no fields.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Adds a string field.
    #[must_use]
    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.fields.insert(key.into(), value.into());
        self
    }

    /// Gets a field.
    #[must_use]
    pub fn field(&self, key: &str) -> Option<&str> {
        self.fields.get(key).map(String::as_str)
    }

    /// Returns an iterator over the fields.
    pub fn fields(&self) -> impl Iterator<Item = (&str, &str)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Merges another context into this one.
    ///
    /// Fields from `other` take precedence on key collisions.
    #[must_use]
    pub fn merge(&self, other: &Self) -> Self {
        let mut merged = self.clone();
        for (k, v) in &other.fields {
            merged.fields.insert(k.clone(), v.clone());
        }
        merged
    }

    /// Makes this context current for the lifetime of the returned guard.
    ///
    /// The guard restores the context that was current at this call. Guards
    /// must be dropped in reverse creation order; a guard dropped early
    /// still restores its own predecessor, clobbering anything entered
    /// after it.
    #[must_use]
    pub fn enter(&self) -> ContextGuard {
        let displaced = CURRENT.with(|current| current.replace(self.clone()));
        ContextGuard {
            displaced: Some(displaced),
            _not_send: PhantomData,
        }
    }

    /// Returns the current thread-local context.
    ///
    /// A thread that has no guard in scope sees an empty context.
    #[must_use]
    pub fn current() -> Self {
        CURRENT.with(|current| current.borrow().clone())
    }
}

impl fmt::Display for AmbientContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for (k, v) in &self.fields {
            if !first {
                write!(f, " ")?;
            }
            write!(f, "{k}={v}")?;
            first = false;
        }
        Ok(())
    }
}

/// Guard that re-instates the previously current context when dropped.
pub struct ContextGuard {
    displaced: Option<AmbientContext>,
    // Restoration must happen on the thread that swapped.
    _not_send: PhantomData<Rc<()>>,
}

impl Drop for ContextGuard {
    fn drop(&mut self) {
        if let Some(displaced) = self.displaced.take() {
            CURRENT.with(|current| *current.borrow_mut() = displaced);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn context_new_empty() {
        let ctx = AmbientContext::new();
        assert!(ctx.is_empty());
        assert!(ctx.field("request_id").is_none());
    }

    #[test]
    fn context_fields() {
        let ctx = AmbientContext::new()
            .with_field("key", "value")
            .with_field("num", "42");

        assert_eq!(ctx.field("key"), Some("value"));
        assert_eq!(ctx.field("num"), Some("42"));
        assert_eq!(ctx.field("missing"), None);

        let mut fields: Vec<_> = ctx.fields().collect();
        fields.sort_by(|a, b| a.0.cmp(b.0));
        assert_eq!(fields, vec![("key", "value"), ("num", "42")]);
        assert_eq!(ctx.to_string(), "key=value num=42");
    }

    #[test]
    fn context_merge() {
        let ctx1 = AmbientContext::new().with_field("a", "1").with_field("keep", "yes");
        let ctx2 = AmbientContext::new().with_field("b", "2").with_field("a", "override");

        let merged = ctx1.merge(&ctx2);

        assert_eq!(merged.field("keep"), Some("yes"));
        assert_eq!(merged.field("b"), Some("2"));
        assert_eq!(merged.field("a"), Some("override"));
    }

    #[test]
    fn enter_swaps_and_drop_swaps_back() {
        let snapshot = AmbientContext::new().with_field("request_id", "abc123");
        assert!(AmbientContext::current().field("request_id").is_none());

        {
            let _guard = snapshot.enter();
            assert_eq!(
                AmbientContext::current().field("request_id"),
                Some("abc123")
            );
        }

        assert!(AmbientContext::current().field("request_id").is_none());
    }

    #[test]
    fn nested_guards_unwind_in_reverse_order() {
        let outer = AmbientContext::new().with_field("scope", "outer");
        let inner = AmbientContext::new().with_field("scope", "inner");

        let outer_guard = outer.enter();
        assert_eq!(AmbientContext::current().field("scope"), Some("outer"));

        {
            let _inner_guard = inner.enter();
            assert_eq!(AmbientContext::current().field("scope"), Some("inner"));
        }

        assert_eq!(AmbientContext::current().field("scope"), Some("outer"));
        drop(outer_guard);
        assert!(AmbientContext::current().field("scope").is_none());
    }

    #[test]
    fn early_drop_restores_that_guards_own_predecessor() {
        let outer = AmbientContext::new().with_field("scope", "outer");
        let inner = AmbientContext::new().with_field("scope", "inner");

        let outer_guard = outer.enter();
        let inner_guard = inner.enter();

        // Dropping the outer guard while the inner one is live re-instates
        // the outer's predecessor: the empty root context.
        drop(outer_guard);
        assert!(AmbientContext::current().field("scope").is_none());

        // The surviving inner guard still restores what it displaced.
        drop(inner_guard);
        assert_eq!(AmbientContext::current().field("scope"), Some("outer"));

        // Reset the thread's context for any test sharing this thread.
        CURRENT.with(|current| current.replace(AmbientContext::new()));
    }
}
