use std::collections::HashMap;
use std::io;
use std::sync::{OnceLock, PoisonError, RwLock};

use crate::runtime::{Error, Result};

/// Escapers registered by the application, keyed by file type.
static ESCAPERS: OnceLock<RwLock<HashMap<String, &'static dyn Escape>>> = OnceLock::new();

fn escapers() -> &'static RwLock<HashMap<String, &'static dyn Escape>> {
    ESCAPERS.get_or_init(|| RwLock::new(HashMap::new()))
}

/// Escapes text written by `@=` for the type of file being generated.
pub trait Escape: Send + Sync {
    /// Writes `s` to `out` escaping any characters that are not safe in the
    /// output.
    fn escape(&self, s: &str, out: &mut dyn io::Write) -> io::Result<()>;
}

/// Escapes `<`, `>`, `&`, `'` and `"` for HTML text and attributes.
#[derive(Debug, Clone, Copy, Default)]
pub struct Html;

/// Writes text through unchanged.
#[derive(Debug, Clone, Copy, Default)]
pub struct Text;

/// Registers the escaper used for templates of a file type.
///
/// A registered escaper takes precedence over the built-in one for the same
/// file type.
///
/// ```
/// use blip::runtime::{self, Escape};
///
/// struct Shout;
///
/// impl Escape for Shout {
///     fn escape(&self, s: &str, out: &mut dyn std::io::Write) -> std::io::Result<()> {
///         out.write_all(s.to_uppercase().as_bytes())
///     }
/// }
///
/// runtime::register_escaper("shout", &Shout);
/// assert!(runtime::escaper_for("shout").is_ok());
/// ```
pub fn register_escaper(file_type: impl Into<String>, escaper: &'static dyn Escape) {
    let file_type = file_type.into();
    tracing::debug!(file_type = %file_type, "registered escaper");
    escapers()
        .write()
        .unwrap_or_else(PoisonError::into_inner)
        .insert(file_type, escaper);
}

/// Returns the escaper for a file type, e.g. `html` for `index.blip.html`.
pub fn escaper_for(file_type: &str) -> Result<&'static dyn Escape> {
    let registered = escapers()
        .read()
        .unwrap_or_else(PoisonError::into_inner)
        .get(file_type)
        .copied();
    if let Some(escaper) = registered {
        return Ok(escaper);
    }
    match file_type {
        "html" | "htm" | "xml" | "svg" => Ok(&Html),
        "" | "text" | "txt" => Ok(&Text),
        _ => Err(Error::UnknownEscaper(file_type.to_owned())),
    }
}

impl Escape for Html {
    fn escape(&self, s: &str, out: &mut dyn io::Write) -> io::Result<()> {
        let mut last = 0;
        for (i, byte) in s.bytes().enumerate() {
            let entity = match byte {
                b'>' => "&gt;",
                b'<' => "&lt;",
                b'&' => "&amp;",
                b'\'' => "&#39;",
                b'"' => "&quot;",
                _ => continue,
            };
            out.write_all(s[last..i].as_bytes())?;
            out.write_all(entity.as_bytes())?;
            last = i + 1;
        }
        if last < s.len() {
            out.write_all(s[last..].as_bytes())?;
        }
        Ok(())
    }
}

impl Escape for Text {
    fn escape(&self, s: &str, out: &mut dyn io::Write) -> io::Result<()> {
        out.write_all(s.as_bytes())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escape_html() {
        let mut out = Vec::new();
        Html.escape("'<this>' & \"<that>\" ok", &mut out).unwrap();
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "&#39;&lt;this&gt;&#39; &amp; &quot;&lt;that&gt;&quot; ok"
        );
    }

    #[test]
    fn escape_text_is_identity() {
        let mut out = Vec::new();
        Text.escape("<b>", &mut out).unwrap();
        assert_eq!(out, b"<b>");
    }

    #[test]
    fn escaper_for_unknown_file_type() {
        let err = escaper_for("pdf").map(|_| ()).unwrap_err();
        assert_eq!(err.to_string(), "no escaper for file type `pdf`");
    }

    struct Csv;

    impl Escape for Csv {
        fn escape(&self, s: &str, out: &mut dyn io::Write) -> io::Result<()> {
            out.write_all(s.replace('"', "\"\"").as_bytes())
        }
    }

    #[test]
    fn escaper_for_registered_file_type() {
        assert!(escaper_for("csv").is_err());
        register_escaper("csv", &Csv);

        let mut out = Vec::new();
        escaper_for("csv").unwrap().escape("a\"b", &mut out).unwrap();
        assert_eq!(out, b"a\"\"b");
    }

    #[test]
    fn escaper_for_registered_overrides_builtin() {
        register_escaper("htm", &Text);
        let mut out = Vec::new();
        escaper_for("htm").unwrap().escape("<b>", &mut out).unwrap();
        assert_eq!(out, b"<b>");
    }
}
