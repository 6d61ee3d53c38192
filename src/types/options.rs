/// The runtime module path used by generated code unless configured.
pub const DEFAULT_RUNTIME_PATH: &str = "blip::runtime";

/// Configures how templates are compiled.
///
/// # Examples
///
/// The defaults are sensible for a crate that depends on `blip`.
///
/// ```
/// let options = blip::Options::default();
/// assert_eq!(options.runtime_path(), "blip::runtime");
/// ```
///
/// Use [`Options::builder()`] to change them.
///
/// ```
/// let options = blip::Options::builder()
///     .package("views")
///     .runtime_path("crate::runtime")
///     .line_numbers(true)
///     .build();
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(default, rename_all = "kebab-case")
)]
pub struct Options {
    pub(crate) package: Option<String>,
    pub(crate) runtime_path: String,
    pub(crate) line_numbers: bool,
}

/// A builder for [`Options`].
#[derive(Debug, Clone)]
pub struct OptionsBuilder {
    package: Option<String>,
    runtime_path: Option<String>,
    line_numbers: bool,
}

impl Default for Options {
    #[inline]
    fn default() -> Self {
        Options::builder().build()
    }
}

impl Options {
    /// Returns a new options builder.
    #[inline]
    pub fn builder() -> OptionsBuilder {
        OptionsBuilder::new()
    }

    /// The package label written into the header of generated files.
    pub fn package(&self) -> Option<&str> {
        self.package.as_deref()
    }

    /// The path generated code imports the runtime support library from.
    pub fn runtime_path(&self) -> &str {
        &self.runtime_path
    }

    /// Whether generated code is annotated with template line numbers.
    pub fn line_numbers(&self) -> bool {
        self.line_numbers
    }
}

impl OptionsBuilder {
    /// Creates a new options builder with the default values.
    #[inline]
    #[allow(clippy::new_without_default)]
    pub fn new() -> Self {
        Self {
            package: None,
            runtime_path: None,
            line_numbers: false,
        }
    }

    /// Set the package label, e.g. the module the generated files live in.
    #[inline]
    pub fn package(&mut self, package: impl Into<String>) -> &mut Self {
        self.package = Some(package.into());
        self
    }

    /// Set the path of the runtime support library.
    ///
    /// # Panics
    ///
    /// If the path is empty.
    #[inline]
    pub fn runtime_path(&mut self, path: impl Into<String>) -> &mut Self {
        let path = path.into();
        assert!(!path.is_empty());
        self.runtime_path = Some(path);
        self
    }

    /// Annotate generated code with `// Line: N` comments.
    #[inline]
    pub fn line_numbers(&mut self, yes: bool) -> &mut Self {
        self.line_numbers = yes;
        self
    }

    /// Builds the options.
    pub fn build(&self) -> Options {
        Options {
            package: self.package.clone(),
            runtime_path: self
                .runtime_path
                .clone()
                .unwrap_or_else(|| DEFAULT_RUNTIME_PATH.to_owned()),
            line_numbers: self.line_numbers,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn options_default() {
        let options = Options::default();
        assert_eq!(options.package(), None);
        assert_eq!(options.runtime_path(), DEFAULT_RUNTIME_PATH);
        assert!(!options.line_numbers());
    }

    #[test]
    #[should_panic]
    fn options_empty_runtime_path() {
        Options::builder().runtime_path("");
    }

    #[cfg(feature = "serde")]
    #[test]
    fn options_deserialize_partial() {
        let options: Options = serde_json::from_str(r#"{"line-numbers": true}"#).unwrap();
        assert_eq!(options.runtime_path(), DEFAULT_RUNTIME_PATH);
        assert!(options.line_numbers());
    }
}
