use std::any::{type_name, Any};
use std::fmt;
use std::io::Write;

use crate::runtime::{Error, Result};

/// The key of the error list used by [`Context::add_error`].
pub const ERRORS_KEY: &str = "errors";

type Callback<'a> = Box<dyn Fn(&mut dyn Write) -> Result<()> + 'a>;

/// A layered, string keyed execution context passed to every render
/// function.
///
/// Each layer owns its bindings and borrows its parent. Lookups search the
/// layers from the innermost outwards so the nearest binding for a key wins.
///
/// # Examples
///
/// ```
/// use blip::runtime::Context;
///
/// let ctx = Context::new().with_value("title", String::from("Home"));
/// let child = ctx.child().with_value("title", String::from("About"));
///
/// assert_eq!(ctx.get::<String>("title").unwrap(), "Home");
/// assert_eq!(child.get::<String>("title").unwrap(), "About");
/// ```
pub struct Context<'a> {
    parent: Option<&'a Context<'a>>,
    bindings: Vec<(String, Binding<'a>)>,
}

enum Binding<'a> {
    Value(Box<dyn Any + Send + Sync>),
    Callback(Callback<'a>),
}

impl Default for Context<'_> {
    fn default() -> Self {
        Self::new()
    }
}

impl<'a> Context<'a> {
    /// Returns a new empty context.
    pub fn new() -> Self {
        Self {
            parent: None,
            bindings: Vec::new(),
        }
    }

    /// Returns a new empty layer on top of this context.
    pub fn child(&self) -> Context<'_> {
        Context {
            parent: Some(self),
            bindings: Vec::new(),
        }
    }

    /// Binds a value to `key` in this layer.
    pub fn with_value<T>(mut self, key: impl Into<String>, value: T) -> Self
    where
        T: Any + Send + Sync,
    {
        self.bindings
            .push((key.into(), Binding::Value(Box::new(value))));
        self
    }

    /// Binds a content callback to `key` in this layer.
    ///
    /// The callback receives the output sink of the template that invokes it
    /// with `@yield`.
    pub fn with_callback<F>(mut self, key: impl Into<String>, f: F) -> Self
    where
        F: Fn(&mut dyn Write) -> Result<()> + 'a,
    {
        self.bindings
            .push((key.into(), Binding::Callback(Box::new(f))));
        self
    }

    /// Returns the nearest value bound to `key` if it has type `T`.
    pub fn get<T: Any>(&self, key: &str) -> Option<&T> {
        match self.lookup(key)? {
            Binding::Value(value) => value.downcast_ref::<T>(),
            Binding::Callback(_) => None,
        }
    }

    /// Returns the nearest value bound to `key`, failing if it is missing or
    /// does not have type `T`.
    pub fn value<T: Any>(&self, key: &str) -> Result<&T> {
        self.get(key).ok_or_else(|| Error::MissingContext {
            key: key.to_owned(),
            expected: type_name::<T>(),
        })
    }

    /// Returns the nearest string bound to `key` or an empty string.
    pub fn get_str(&self, key: &str) -> &str {
        self.get::<String>(key)
            .map(String::as_str)
            .or_else(|| self.get::<&'static str>(key).copied())
            .unwrap_or("")
    }

    /// Whether anything is bound to `key`.
    pub fn contains(&self, key: &str) -> bool {
        self.lookup(key).is_some()
    }

    /// Invokes the nearest callback bound to `key`.
    ///
    /// Returns `false` without writing anything if there is no such callback.
    pub fn call(&self, key: &str, out: &mut dyn Write) -> Result<bool> {
        match self.lookup(key) {
            Some(Binding::Callback(f)) => {
                f(out)?;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    /// Appends a message to the error list of this context.
    ///
    /// Templates read the list with
    /// `@context errors Vec<String> = Vec::new()`.
    pub fn add_error(self, msg: impl Into<String>) -> Self {
        let mut errors = self.errors().to_vec();
        errors.push(msg.into());
        self.with_value(ERRORS_KEY, errors)
    }

    /// Whether any errors were added with [`add_error`][Context::add_error].
    pub fn has_errors(&self) -> bool {
        !self.errors().is_empty()
    }

    /// The messages added with [`add_error`][Context::add_error].
    pub fn errors(&self) -> &[String] {
        self.get::<Vec<String>>(ERRORS_KEY)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    fn lookup(&self, key: &str) -> Option<&Binding<'a>> {
        self.bindings
            .iter()
            .rev()
            .find(|(k, _)| k == key)
            .map(|(_, binding)| binding)
            .or_else(|| self.parent.and_then(|parent| parent.lookup(key)))
    }
}

/// Invokes the callback bound to `key`, doing nothing if there is none.
///
/// Generated code calls this for `@yield`.
pub fn call_context_callback(ctx: &Context<'_>, key: &str, out: &mut dyn Write) -> Result<()> {
    let called = ctx.call(key, out)?;
    if !called {
        tracing::trace!(key, "no content bound for yield");
    }
    Ok(())
}

impl fmt::Debug for Context<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context")
            .field("keys", &self.bindings.iter().map(|(k, _)| k).collect::<Vec<_>>())
            .field("parent", &self.parent)
            .finish()
    }
}
