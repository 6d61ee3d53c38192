//! Support library for generated render functions.
//!
//! Every generated file imports this module as `runtime` together with
//! [`Context`]. A render function looks roughly like this:
//!
//! ```
//! use blip::runtime::{self as runtime, Context};
//! use std::io::Write;
//!
//! pub fn render_hello(name: &str, ctx: &Context<'_>, out: &mut dyn Write) -> runtime::Result<()> {
//!     runtime::guard("hello", "html", || {
//!         let escaper = runtime::escaper_for("html")?;
//!         runtime::write(out, "<p>Hello ")?;
//!         runtime::write_escaped(out, &(name), escaper)?;
//!         runtime::write(out, "</p>")?;
//!         Ok(())
//!     })
//! }
//!
//! let mut out = Vec::new();
//! render_hello("<Jane>", &Context::new(), &mut out)?;
//! assert_eq!(out, b"<p>Hello &lt;Jane&gt;</p>");
//! # Ok::<(), runtime::Error>(())
//! ```

mod context;
mod escape;

use std::any::Any;
use std::fmt::Display;
use std::io;
use std::panic::{self, AssertUnwindSafe};
use std::time::Instant;

pub use crate::runtime::context::{call_context_callback, Context, ERRORS_KEY};
pub use crate::runtime::escape::{escaper_for, register_escaper, Escape, Html, Text};

/// A type alias for results returned by render functions.
pub type Result<T> = std::result::Result<T, Error>;

/// An error that can occur while rendering.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Writing to the output failed.
    #[error("failed to write output: {0}")]
    Io(#[from] io::Error),

    /// A `@context` value is not bound or has a different type.
    #[error("context value `{key}` is missing or is not a `{expected}`")]
    MissingContext { key: String, expected: &'static str },

    /// There is no escaper for the template's file type.
    #[error("no escaper for file type `{0}`")]
    UnknownEscaper(String),

    /// A render function panicked.
    #[error("recovered from panic while rendering `{template}`: {message}")]
    Recovered { template: String, message: String },
}

/// Runs the body of a render function.
///
/// A panic in the body is converted into [`Error::Recovered`] instead of
/// unwinding into the caller. Completion is logged at `debug` level.
pub fn guard<F>(template: &str, file_type: &str, body: F) -> Result<()>
where
    F: FnOnce() -> Result<()>,
{
    let start = Instant::now();
    let result = match panic::catch_unwind(AssertUnwindSafe(body)) {
        Ok(result) => result,
        Err(payload) => {
            let message = panic_message(payload.as_ref());
            tracing::error!(template, %message, "recovered from panic while rendering");
            Err(Error::Recovered {
                template: template.to_owned(),
                message,
            })
        }
    };
    let elapsed = start.elapsed();
    match &result {
        Ok(()) => tracing::debug!(template, file_type, ?elapsed, "render complete"),
        Err(err) => tracing::debug!(template, file_type, ?elapsed, error = %err, "render failed"),
    }
    result
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_owned()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        String::from("unknown panic")
    }
}

/// Writes literal template text.
#[inline]
pub fn write(out: &mut dyn io::Write, s: &str) -> Result<()> {
    out.write_all(s.as_bytes())?;
    Ok(())
}

/// Writes a value for `@=` using the escaper of the template.
pub fn write_escaped<T>(out: &mut dyn io::Write, value: &T, escaper: &dyn Escape) -> Result<()>
where
    T: Display + ?Sized,
{
    let s = value.to_string();
    escaper.escape(&s, out)?;
    Ok(())
}

/// Writes a value for `@==` without escaping.
pub fn write_raw<T>(out: &mut dyn io::Write, value: &T) -> Result<()>
where
    T: Display + ?Sized,
{
    write!(out, "{value}")?;
    Ok(())
}

/// Writes `true` or `false` for `@bool=`.
pub fn write_bool(out: &mut dyn io::Write, value: bool) -> Result<()> {
    write(out, if value { "true" } else { "false" })
}

/// Writes a decimal integer for `@int=`.
pub fn write_int(out: &mut dyn io::Write, value: isize) -> Result<()> {
    write!(out, "{value}")?;
    Ok(())
}

/// Writes a decimal integer for `@int64=`.
pub fn write_int64(out: &mut dyn io::Write, value: i64) -> Result<()> {
    write!(out, "{value}")?;
    Ok(())
}
