//! A compiler for line oriented templates that generates Rust render
//! functions.
//!
//! # Features
//!
//! ### Syntax
//!
//! Templates are literal text interleaved with directives introduced by `@`.
//!
//! - Declarations: `@arg user &User`, `@context title String = String::new()`,
//!   `@import crate::model::User`
//! - Expressions: `@= user.name @` (escaped), `@== html @` (raw),
//!   `@bool= ok @`, `@int= n @`, `@int64= n @`
//! - Conditionals: `@if user.admin` ... `@else` ... `@end`
//! - Loops: `@for user in users` ... `@end`
//! - Nested templates: `@include header user`
//! - Layouts: `@extend layout` with `@content body` ... `@end` slots that the
//!   layout renders with `@yield body`
//! - Rust blocks: `@code` ... `@end` (statements), `@func` ... `@end` (items)
//! - Verbatim text: `@text` ... `@end`
//! - Comments: `@// line` and `@* block *@`, a literal `@` is written `@@`
//!
//! ### Compiler
//!
//! - Every problem in a template is reported at once as a [`Diagnostic`]
//! - A template with problems compiles to a stub that fails the build of the
//!   generated code instead of rendering incorrectly
//! - Output is escaped for the file type, e.g. `index.blip.html` is HTML
//!   escaped
//!
//! # Getting started
//!
//! Your entry point is the [`Compiler`] struct. Describe each template with a
//! [`Unit`] and compile it into the Rust source of its render function.
//!
//! ```
//! let compiler = blip::Compiler::new();
//! let unit = blip::Unit::from_file_name(
//!     "hello.blip.html",
//!     "@arg name &str\n<p>Hello @= name @!</p>\n",
//! );
//! let output = compiler.compile(&unit)?;
//! assert!(!output.has_errors());
//! assert!(output.code().contains(
//!     "pub fn render_hello(name: &str, ctx: &Context<'_>, out: &mut dyn Write) -> runtime::Result<()> {"
//! ));
//! # Ok::<(), blip::Error>(())
//! ```
//!
//! The generated code depends on the [`runtime`] module of this crate. A
//! render function is called with its arguments, a [`runtime::Context`] and
//! the output sink.
//!
//! ```ignore
//! let ctx = blip::runtime::Context::new();
//! let mut out = Vec::new();
//! render_hello("World", &ctx, &mut out)?;
//! ```
//!
//! # Diagnostics
//!
//! Problems in a template do not fail compilation, they are returned with the
//! output. Use [`Output::into_result`] to turn them into an [`Error`].
//!
//! ```
//! let compiler = blip::Compiler::new();
//! let unit = blip::Unit::new("index", "@if user.admin\nAdmin\n");
//! let output = compiler.compile(&unit)?;
//! assert_eq!(output.diagnostics().len(), 1);
//!
//! let err = output.into_result().unwrap_err();
//! assert_eq!(
//!     err.to_string(),
//!     "index:3:1: missing `@end` for `@if` on line 1, unexpected end of input"
//! );
//! # Ok::<(), blip::Error>(())
//! ```

mod compile;
mod error;
pub mod runtime;
mod types;

use std::path::Path;

pub use crate::compile::codegen::{function_name, function_path, generate};
pub use crate::compile::lex::{Lexer, Token, TokenKind, DIRECTIVE_START};
pub use crate::compile::parse::Parser;
pub use crate::error::{Diagnostic, Error};
pub use crate::types::ast::{
    Arg, Call, ContextVar, Declarations, ForLoop, Import, NodeKind, SyntaxNode, SyntaxTree, Typed,
};
pub use crate::types::options::{Options, OptionsBuilder, DEFAULT_RUNTIME_PATH};
pub use crate::types::span::{Position, Span};

/// A type alias for results in this crate.
pub type Result<T> = std::result::Result<T, Error>;

/// The marker between the template name and the file type in a file name.
const FILE_MARKER: &str = ".blip";

/// The file type of templates that don't declare one.
const DEFAULT_FILE_TYPE: &str = "text";

/// The template compiler.
///
/// A compiler only holds configuration, compiling one template never affects
/// another so a single compiler can be shared between threads.
#[derive(Debug, Clone, Default)]
pub struct Compiler {
    options: Options,
}

/// A single template to compile.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Unit {
    name: String,
    path: String,
    file_type: String,
    source: String,
}

/// The result of compiling a template.
#[derive(Debug, Clone)]
pub struct Output {
    path: String,
    source: String,
    code: String,
    diagnostics: Vec<Diagnostic>,
}

impl Compiler {
    /// Construct a new compiler with the default options.
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Construct a new compiler with the given options.
    #[inline]
    pub fn with_options(options: Options) -> Self {
        Self { options }
    }

    #[inline]
    pub fn options(&self) -> &Options {
        &self.options
    }

    /// Compile a template into the Rust source of its render function.
    ///
    /// This only fails if the template name can not be turned into a function
    /// name. Problems in the template itself are returned as diagnostics in
    /// the output.
    pub fn compile(&self, unit: &Unit) -> Result<Output> {
        if unit.name.is_empty() || !unit.name.split('.').all(compile::parse::is_ident) {
            return Err(Error::new(format!(
                "invalid template name `{}`, expected identifiers separated by `.`",
                unit.name
            )));
        }
        Ok(compile::template(unit, &self.options))
    }
}

impl Unit {
    /// A template with the given name and source.
    ///
    /// The path defaults to the name and the file type to `text`.
    pub fn new(name: impl Into<String>, source: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            path: name.clone(),
            name,
            file_type: String::from(DEFAULT_FILE_TYPE),
            source: source.into(),
        }
    }

    /// A template named after its file.
    ///
    /// Template files are named `<name>.blip` or `<name>.blip.<file type>`.
    ///
    /// ```
    /// let unit = blip::Unit::from_file_name("views/userDetail.blip.html", "");
    /// assert_eq!(unit.name(), "userDetail");
    /// assert_eq!(unit.file_type(), "html");
    /// assert_eq!(unit.path(), "views/userDetail.blip.html");
    /// ```
    pub fn from_file_name(file_name: impl AsRef<Path>, source: impl Into<String>) -> Self {
        let path = file_name.as_ref();
        let base = path
            .file_name()
            .map(|f| f.to_string_lossy().into_owned())
            .unwrap_or_default();
        let (name, file_type) = match base.split_once(FILE_MARKER) {
            Some((name, rest)) => {
                let file_type = rest.strip_prefix('.').filter(|t| !t.is_empty());
                (name, file_type.unwrap_or(DEFAULT_FILE_TYPE))
            }
            None => (
                base.split('.').next().unwrap_or(&base),
                DEFAULT_FILE_TYPE,
            ),
        };
        Self {
            name: name.to_owned(),
            path: path.display().to_string(),
            file_type: file_type.to_owned(),
            source: source.into(),
        }
    }

    /// Set the path used to label diagnostics and the generated file.
    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = path.into();
        self
    }

    /// Set the file type which selects the escaper for `@=`.
    pub fn with_file_type(mut self, file_type: impl Into<String>) -> Self {
        self.file_type = file_type.into();
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn file_type(&self) -> &str {
        &self.file_type
    }

    pub fn source(&self) -> &str {
        &self.source
    }
}

impl Output {
    pub(crate) fn new(unit: &Unit, code: String, diagnostics: Vec<Diagnostic>) -> Self {
        Self {
            path: unit.path.clone(),
            source: unit.source.clone(),
            code,
            diagnostics,
        }
    }

    /// The generated Rust source.
    pub fn code(&self) -> &str {
        &self.code
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    /// Whether the template had any problems, if so the generated code is an
    /// error stub.
    pub fn has_errors(&self) -> bool {
        !self.diagnostics.is_empty()
    }

    /// Returns the generated code, including an error stub.
    pub fn into_code(self) -> String {
        self.code
    }

    /// Returns the generated code or an error for the first diagnostic.
    pub fn into_result(self) -> Result<String> {
        match self.diagnostics.first() {
            None => Ok(self.code),
            Some(first) => Err(Error::diagnostic(first, &self.path, &self.source)
                .with_more(self.diagnostics.len() - 1)),
        }
    }
}
