//! Syntax tree representing a parsed template.

use std::fmt;
use std::fmt::Write;

use crate::compile::lex::Token;
use crate::error::Diagnostic;

/// The result of parsing a single template.
///
/// This is built once by the parser and is read-only during code generation.
#[derive(Debug, Clone)]
pub struct SyntaxTree {
    /// The render tree, its kind is always [`NodeKind::Root`].
    pub root: SyntaxNode,
    /// The declarations collected from the root scope.
    pub declarations: Declarations,
    /// Every problem found while lexing and parsing, in source order of
    /// discovery.
    pub diagnostics: Vec<Diagnostic>,
}

/// A node in the render tree.
///
/// A node exclusively owns its children. The order of the children is the
/// order in which their output is generated.
#[derive(Debug, Clone, PartialEq)]
pub struct SyntaxNode {
    pub kind: NodeKind,
    /// The token that introduced this node, `None` for the root.
    pub token: Option<Token>,
    pub children: Vec<SyntaxNode>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeKind {
    Root,
    /// Template text written to the output.
    LiteralText,
    /// The body of a `@code`, `@text` or `@func` block.
    VerbatimText,
    /// `@= expr @`
    DisplayEscaped,
    /// `@== expr @`
    DisplayRaw,
    /// `@bool= expr @`, `@int= expr @` or `@int64= expr @`
    DisplayTyped(Typed),
    CodeBlock,
    TextBlock,
    FunctionBlock,
    /// `@include name args`
    Include(Call),
    /// `@extend name args` with `@content` children.
    IncludeWithContent(Call),
    /// `@content name`
    ContentSlot(String),
    /// `@yield name`
    Yield(String),
    /// `@if cond`, the `Else` branch is the last child when present.
    If,
    Else,
    /// `@for var in collection`
    For(ForLoop),
}

/// The type of a typed display.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Typed {
    Bool,
    Int,
    Int64,
}

/// A call to another template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Call {
    /// The template name, possibly dotted e.g. `html.root`.
    pub template: String,
    /// The arguments passed through verbatim, e.g. `user.name, 3`.
    pub args: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForLoop {
    pub var: String,
    pub collection: String,
}

/// Declarations that are only allowed in the root scope of a template.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Declarations {
    pub args: Vec<Arg>,
    pub context: Vec<ContextVar>,
    pub imports: Vec<Import>,
    /// `@func` blocks, their children are the verbatim text.
    pub functions: Vec<SyntaxNode>,
}

/// `@arg name Type`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Arg {
    pub name: String,
    pub ty: String,
    pub line: usize,
}

/// `@context name Type` or `@context name Type = default`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContextVar {
    pub name: String,
    pub ty: String,
    pub default: Option<String>,
    pub line: usize,
}

/// `@import path`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Import {
    pub path: String,
    pub line: usize,
}

impl SyntaxTree {
    /// Whether any diagnostics were reported.
    pub fn has_errors(&self) -> bool {
        !self.diagnostics.is_empty()
    }
}

impl SyntaxNode {
    pub const fn root() -> Self {
        Self {
            kind: NodeKind::Root,
            token: None,
            children: Vec::new(),
        }
    }

    pub fn new(kind: NodeKind, token: Token) -> Self {
        Self {
            kind,
            token: Some(token),
            children: Vec::new(),
        }
    }

    /// The token payload, empty for the root.
    pub fn text(&self) -> &str {
        self.token.as_ref().map(|t| t.text.as_str()).unwrap_or("")
    }

    /// The source line of the token, `0` for the root.
    pub fn line(&self) -> usize {
        self.token.as_ref().map(|t| t.line).unwrap_or(0)
    }

    /// Renders an indented outline of this node and its descendants, one node
    /// per line.
    pub fn outline(&self) -> String {
        let mut buf = String::new();
        self.write_outline(&mut buf, 0);
        buf
    }

    fn write_outline(&self, buf: &mut String, depth: usize) {
        let _ = writeln!(buf, "{:indent$}{}", "", self, indent = depth * 2);
        for child in &self.children {
            child.write_outline(buf, depth + 1);
        }
    }
}

impl fmt::Display for SyntaxNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            NodeKind::Root => write!(f, "Root"),
            NodeKind::LiteralText => write!(f, "LiteralText {:?}", self.text()),
            NodeKind::VerbatimText => write!(f, "VerbatimText {:?}", self.text()),
            NodeKind::DisplayEscaped => write!(f, "DisplayEscaped `{}`", self.text()),
            NodeKind::DisplayRaw => write!(f, "DisplayRaw `{}`", self.text()),
            NodeKind::DisplayTyped(typed) => {
                write!(f, "DisplayTyped({typed:?}) `{}`", self.text())
            }
            NodeKind::CodeBlock => write!(f, "CodeBlock"),
            NodeKind::TextBlock => write!(f, "TextBlock"),
            NodeKind::FunctionBlock => write!(f, "FunctionBlock"),
            NodeKind::Include(call) => write!(f, "Include {call}"),
            NodeKind::IncludeWithContent(call) => write!(f, "IncludeWithContent {call}"),
            NodeKind::ContentSlot(name) => write!(f, "ContentSlot `{name}`"),
            NodeKind::Yield(name) => write!(f, "Yield `{name}`"),
            NodeKind::If => write!(f, "If `{}`", self.text()),
            NodeKind::Else => write!(f, "Else"),
            NodeKind::For(ForLoop { var, collection }) => {
                write!(f, "For `{var}` in `{collection}`")
            }
        }
    }
}

impl fmt::Display for Call {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.args {
            Some(args) => write!(f, "`{}` ({args})", self.template),
            None => write!(f, "`{}`", self.template),
        }
    }
}
