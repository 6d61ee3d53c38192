use std::cmp::max;
use std::fmt;

use crate::types::span::{Position, Span};

/// An error that can occur while compiling a template.
///
/// Structural problems in a template are not errors, they are collected as
/// [`Diagnostic`]s and the template is still compiled into an error stub.
/// Use [`Output::into_result`][crate::Output::into_result] to turn them into
/// an error.
#[derive(Clone)]
pub struct Error {
    msg: String,
    name: Option<String>,
    pos: Option<Position>,
    span: Option<(String, Span)>,
}

/// A non-fatal problem found while lexing or parsing a template.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Diagnostic {
    pub line: usize,
    pub column: usize,
    pub message: String,
    /// The region of the source the diagnostic refers to.
    pub span: Span,
}

impl Error {
    /// Construct an error without any source location.
    pub(crate) fn new(msg: impl Into<String>) -> Self {
        Self {
            msg: msg.into(),
            name: None,
            pos: None,
            span: None,
        }
    }

    /// Construct an error pointing at a diagnostic in the given source.
    pub(crate) fn diagnostic(diag: &Diagnostic, name: &str, source: &str) -> Self {
        Self {
            msg: diag.message.clone(),
            name: Some(name.to_owned()),
            pos: Some(diag.position()),
            span: (!source.is_empty()).then(|| (source.to_owned(), diag.span)),
        }
    }

    /// Attach further diagnostics to this error's message.
    pub(crate) fn with_more(mut self, more: usize) -> Self {
        if more > 0 {
            let s = if more == 1 { "" } else { "s" };
            self.msg = format!("{} (and {more} more error{s})", self.msg);
        }
        self
    }

    /// The error message without any location.
    pub fn message(&self) -> &str {
        &self.msg
    }
}

impl Diagnostic {
    pub(crate) fn new(pos: Position, span: Span, message: impl Into<String>) -> Self {
        Self {
            line: pos.line,
            column: pos.column,
            message: message.into(),
            span,
        }
    }

    pub fn position(&self) -> Position {
        Position {
            line: self.line,
            column: self.column,
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}: {}", self.line, self.column, self.message)
    }
}

impl std::error::Error for Error {}

impl fmt::Debug for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.span {
            Some((source, span)) => fmt_pretty(&self.msg, source, *span, f),
            None => write!(f, "{}", self),
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.span, f.alternate()) {
            (Some((source, span)), true) => fmt_pretty(&self.msg, source, *span, f),
            _ => {
                if let Some(name) = &self.name {
                    write!(f, "{name}:")?;
                }
                if let Some(pos) = &self.pos {
                    write!(f, "{pos}: ")?;
                } else if self.name.is_some() {
                    write!(f, " ")?;
                }
                write!(f, "{}", self.msg)
            }
        }
    }
}

fn fmt_pretty(msg: &str, source: &str, span: Span, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let lines: Vec<_> = source.split_terminator('\n').collect();
    let (line, col) = to_line_col(&lines, span.m);
    let width = max(1, width(&source[span]));
    let code = lines.get(line).or(lines.last()).copied().unwrap_or("");

    let num = (line + 1).to_string();
    let pad = width_of(&num);
    let pipe = "|";
    let underline = "^".repeat(width);

    write!(
        f,
        "\n \
        {0:pad$} {pipe}\n \
        {num:>} {pipe} {code}\n \
        {0:pad$} {pipe} {underline:>width$} {msg}\n",
        "",
        pad = pad,
        pipe = pipe,
        num = num,
        code = code,
        underline = underline,
        width = col + width,
        msg = msg
    )
}

fn to_line_col(lines: &[&str], offset: usize) -> (usize, usize) {
    let mut n = 0;
    for (i, line) in lines.iter().enumerate() {
        let len = line.len() + 1;
        if n + len > offset {
            return (i, width(&line[..offset - n]));
        }
        n += len;
    }
    (
        lines.len().saturating_sub(1),
        lines.last().map(|l| width(l)).unwrap_or(0),
    )
}

/// The display width of only the first line of the text.
fn width(s: &str) -> usize {
    width_of(s.split('\n').next().unwrap_or(""))
}

#[cfg(feature = "unicode")]
fn width_of(s: &str) -> usize {
    unicode_width::UnicodeWidthStr::width(s)
}

#[cfg(not(feature = "unicode"))]
fn width_of(s: &str) -> usize {
    s.chars().count()
}
