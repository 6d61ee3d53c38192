use crate::compile::lex::{Lexer, Token, TokenKind};
use crate::error::Diagnostic;
use crate::types::ast::{
    Arg, Call, ContextVar, Declarations, ForLoop, Import, NodeKind, SyntaxNode, SyntaxTree, Typed,
};

/// The keyword separating the loop variable from the collection in `@for`.
const FOR_SEPARATOR: &str = "in";

/// A parser that constructs a syntax tree from a token stream.
///
/// The parser is a hand written recursive descent parser. Each block
/// directive recurses into [`parse_scope`][Parser::parse_scope] with the set
/// of tokens that are allowed to close it, so `@if`, `@else`, `@for` and
/// `@content` all share the same bounded scope parsing.
///
/// Parsing never fails. Every problem is recorded as a [`Diagnostic`] and
/// parsing continues so that all problems in a template are reported at once.
pub struct Parser<'source> {
    /// A lexer that tokenizes the template source.
    tokens: Lexer<'source>,

    /// Declarations collected from the root scope.
    declarations: Declarations,

    /// Problems found so far.
    diagnostics: Vec<Diagnostic>,
}

impl<'source> Parser<'source> {
    /// Construct a new parser.
    pub fn new(source: &'source str) -> Self {
        Self {
            tokens: Lexer::new(source),
            declarations: Declarations::default(),
            diagnostics: Vec::new(),
        }
    }

    /// Whether any problems have been found so far.
    pub fn has_errors(&self) -> bool {
        !self.diagnostics.is_empty()
    }

    /// Parses the whole template.
    ///
    /// This always returns a tree, check [`SyntaxTree::has_errors`] before
    /// using it.
    #[tracing::instrument(level = "debug", skip_all)]
    pub fn parse(mut self) -> SyntaxTree {
        let mut root = SyntaxNode::root();
        self.parse_scope(&mut root, true, &[]);
        tracing::debug!(
            nodes = root.children.len(),
            args = self.declarations.args.len(),
            context = self.declarations.context.len(),
            diagnostics = self.diagnostics.len(),
            "parsed template"
        );
        SyntaxTree {
            root,
            declarations: self.declarations,
            diagnostics: self.diagnostics,
        }
    }

    /// Parses statements into `node` until one of the `terminators` or the
    /// end of input is reached and returns that token.
    fn parse_scope(&mut self, node: &mut SyntaxNode, is_root: bool, terminators: &[TokenKind]) -> Token {
        loop {
            let token = self.tokens.next_token();
            if terminators.contains(&token.kind) {
                return token;
            }
            if token.kind == TokenKind::Eof {
                if !is_root {
                    self.missing_end(node, &token);
                }
                return token;
            }
            self.parse_stmt(node, is_root, token);
        }
    }

    /// Parses a single statement introduced by `token` into `node`.
    fn parse_stmt(&mut self, node: &mut SyntaxNode, is_root: bool, token: Token) {
        match token.kind {
            TokenKind::Literal => {
                node.children.push(SyntaxNode::new(NodeKind::LiteralText, token));
            }

            TokenKind::Illegal => {
                let msg = token.text.clone();
                self.error(&token, msg);
            }

            TokenKind::Eof => {}

            TokenKind::Display
            | TokenKind::DisplayRaw
            | TokenKind::DisplayBool
            | TokenKind::DisplayInt
            | TokenKind::DisplayInt64 => {
                if token.text.is_empty() {
                    let msg = format!("expected an expression after {}", token.kind);
                    self.error(&token, msg);
                    return;
                }
                let kind = match token.kind {
                    TokenKind::DisplayRaw => NodeKind::DisplayRaw,
                    TokenKind::DisplayBool => NodeKind::DisplayTyped(Typed::Bool),
                    TokenKind::DisplayInt => NodeKind::DisplayTyped(Typed::Int),
                    TokenKind::DisplayInt64 => NodeKind::DisplayTyped(Typed::Int64),
                    _ => NodeKind::DisplayEscaped,
                };
                node.children.push(SyntaxNode::new(kind, token));
            }

            TokenKind::Arg | TokenKind::Context | TokenKind::Import => {
                if !is_root {
                    let msg = format!("{} declaration only allowed at root", token.kind);
                    self.error(&token, msg);
                    return;
                }
                self.parse_declaration(token);
            }

            TokenKind::Code | TokenKind::Text => {
                let kind = match token.kind {
                    TokenKind::Code => NodeKind::CodeBlock,
                    _ => NodeKind::TextBlock,
                };
                let mut block = SyntaxNode::new(kind, token);
                self.parse_verbatim(&mut block);
                node.children.push(block);
            }

            TokenKind::Func => {
                let mut block = SyntaxNode::new(NodeKind::FunctionBlock, token);
                self.parse_verbatim(&mut block);
                match block.token.take() {
                    Some(token) if !is_root => {
                        self.error(&token, "`@func` block only allowed at root");
                    }
                    token => {
                        block.token = token;
                        self.declarations.functions.push(block);
                    }
                }
            }

            TokenKind::If => {
                if token.text.is_empty() {
                    self.error(&token, "expected a condition after `@if`");
                }
                let mut if_node = SyntaxNode::new(NodeKind::If, token);
                let end = self.parse_scope(&mut if_node, false, &[TokenKind::Else, TokenKind::End]);
                if end.kind == TokenKind::Else {
                    let mut else_node = SyntaxNode::new(NodeKind::Else, end);
                    self.parse_scope(&mut else_node, false, &[TokenKind::End]);
                    if_node.children.push(else_node);
                }
                node.children.push(if_node);
            }

            TokenKind::For => {
                let header = parse_for_header(&token.text);
                if let Err(msg) = &header {
                    self.error(&token, msg.as_str());
                }
                let mut for_node = SyntaxNode::new(
                    NodeKind::For(ForLoop {
                        var: String::new(),
                        collection: String::new(),
                    }),
                    token,
                );
                self.parse_scope(&mut for_node, false, &[TokenKind::End]);
                // A loop with a bad header is dropped once its body is consumed.
                if let Ok(header) = header {
                    for_node.kind = NodeKind::For(header);
                    node.children.push(for_node);
                }
            }

            TokenKind::Include => {
                if let Some(call) = self.parse_call(&token) {
                    node.children.push(SyntaxNode::new(NodeKind::Include(call), token));
                }
            }

            TokenKind::Extend => {
                let call = self.parse_call(&token);
                let mut extend = SyntaxNode::new(
                    NodeKind::IncludeWithContent(Call {
                        template: String::new(),
                        args: None,
                    }),
                    token,
                );
                self.parse_extend(&mut extend);
                if let Some(call) = call {
                    extend.kind = NodeKind::IncludeWithContent(call);
                    node.children.push(extend);
                }
            }

            TokenKind::Content => {
                self.error(&token, "`@content` is only allowed directly inside `@extend`");
                let mut scratch = SyntaxNode::new(NodeKind::ContentSlot(String::new()), token);
                self.parse_scope(&mut scratch, false, &[TokenKind::End]);
            }

            TokenKind::Yield => {
                if token.text.is_empty() {
                    self.error(&token, "expected a content name after `@yield`");
                } else if !is_ident(&token.text) {
                    let msg = format!("invalid content name `{}`", token.text);
                    self.error(&token, msg);
                } else {
                    let name = token.text.clone();
                    node.children.push(SyntaxNode::new(NodeKind::Yield(name), token));
                }
            }

            TokenKind::Else | TokenKind::End => {
                let msg = format!("unexpected {}", token.kind);
                self.error(&token, msg);
            }
        }
    }

    /// Parses the body of an `@extend` which may only contain `@content`
    /// slots separated by whitespace.
    fn parse_extend(&mut self, extend: &mut SyntaxNode) {
        loop {
            let token = self.tokens.next_token();
            match token.kind {
                TokenKind::End => return,

                TokenKind::Eof => {
                    self.missing_end(extend, &token);
                    return;
                }

                TokenKind::Literal => {
                    if !token.text.trim().is_empty() {
                        self.error(
                            &token,
                            "literal text in `@extend` must be embedded in a content block (`@content`)",
                        );
                    }
                }

                TokenKind::Illegal => {
                    let msg = token.text.clone();
                    self.error(&token, msg);
                }

                TokenKind::Content => {
                    let name = token.text.clone();
                    if name.is_empty() {
                        self.error(&token, "expected a content name after `@content`");
                    } else if !is_ident(&name) {
                        let msg = format!("invalid content name `{name}`");
                        self.error(&token, msg);
                    } else if extend
                        .children
                        .iter()
                        .any(|slot| matches!(&slot.kind, NodeKind::ContentSlot(n) if *n == name))
                    {
                        let msg = format!("duplicate content block `{name}`");
                        self.error(&token, msg);
                    }
                    let mut slot = SyntaxNode::new(NodeKind::ContentSlot(name), token);
                    self.parse_scope(&mut slot, false, &[TokenKind::End]);
                    extend.children.push(slot);
                }

                TokenKind::Else => {
                    let msg = format!(
                        "unexpected {} in `@extend`, expected `@content` or `@end`",
                        token.kind
                    );
                    self.error(&token, msg);
                }

                _ => {
                    let msg = format!(
                        "unexpected {} in `@extend`, expected `@content` or `@end`",
                        token.kind
                    );
                    self.error(&token, msg);
                    // Consume the whole statement so that its `@end` does not
                    // close the `@extend`.
                    let mut scratch = SyntaxNode::root();
                    self.parse_stmt(&mut scratch, false, token);
                }
            }
        }
    }

    /// Parses the body of a `@code`, `@text` or `@func` block.
    fn parse_verbatim(&mut self, block: &mut SyntaxNode) {
        loop {
            let token = self.tokens.next_token();
            match token.kind {
                TokenKind::Literal => {
                    block.children.push(SyntaxNode::new(NodeKind::VerbatimText, token));
                }
                TokenKind::End => return,
                TokenKind::Eof => {
                    self.missing_end(block, &token);
                    return;
                }
                _ => {
                    let msg = format!("unexpected {} in verbatim block", token.kind);
                    self.error(&token, msg);
                }
            }
        }
    }

    fn parse_declaration(&mut self, token: Token) {
        match token.kind {
            TokenKind::Arg => {
                let Some((name, ty)) = split_name(&token.text) else {
                    self.error(&token, "`@arg` expects a name and a type, e.g. `@arg name String`");
                    return;
                };
                if !self.check_decl_name(&token, name) {
                    return;
                }
                self.declarations.args.push(Arg {
                    name: name.to_owned(),
                    ty: ty.to_owned(),
                    line: token.line,
                });
            }

            TokenKind::Context => {
                let Some((name, rest)) = split_name(&token.text) else {
                    self.error(
                        &token,
                        "`@context` expects a name and a type, e.g. `@context user User`",
                    );
                    return;
                };
                if !self.check_decl_name(&token, name) {
                    return;
                }
                let (ty, default) = split_default(rest);
                if ty.is_empty() {
                    self.error(&token, "`@context` declaration is missing a type");
                    return;
                }
                if default.is_some_and(str::is_empty) {
                    self.error(&token, "`@context` declaration is missing a default value after `=`");
                    return;
                }
                self.declarations.context.push(ContextVar {
                    name: name.to_owned(),
                    ty: ty.to_owned(),
                    default: default.map(str::to_owned),
                    line: token.line,
                });
            }

            TokenKind::Import => {
                let path = normalize_import(&token.text);
                if path.is_empty() {
                    self.error(&token, "expected a path after `@import`");
                    return;
                }
                self.declarations.imports.push(Import {
                    path: path.to_owned(),
                    line: token.line,
                });
            }

            _ => {}
        }
    }

    /// Parses the `name args` payload of `@include` and `@extend`.
    fn parse_call(&mut self, token: &Token) -> Option<Call> {
        let (template, args) = match split_name(&token.text) {
            Some((template, args)) => (template, Some(args)),
            None => (token.text.as_str(), None),
        };
        if template.is_empty() {
            let msg = format!("expected a template name after {}", token.kind);
            self.error(token, msg);
            return None;
        }
        if !template.split('.').all(is_ident) {
            let msg = format!("invalid template name `{template}`");
            self.error(token, msg);
            return None;
        }
        Some(Call {
            template: template.to_owned(),
            args: args.map(str::to_owned),
        })
    }

    fn check_decl_name(&mut self, token: &Token, name: &str) -> bool {
        if is_ident(name) {
            return true;
        }
        let msg = format!("invalid identifier `{name}` in {} declaration", token.kind);
        self.error(token, msg);
        false
    }

    fn missing_end(&mut self, node: &SyntaxNode, eof: &Token) {
        let msg = match &node.token {
            Some(opener) => format!(
                "missing `@end` for {} on line {}, unexpected end of input",
                opener.kind, opener.line
            ),
            None => String::from("missing `@end`, unexpected end of input"),
        };
        self.error(eof, msg);
    }

    fn error(&mut self, token: &Token, msg: impl Into<String>) {
        self.diagnostics
            .push(Diagnostic::new(token.position(), token.span, msg));
    }
}

/// Splits `name rest` at the first whitespace.
fn split_name(text: &str) -> Option<(&str, &str)> {
    let (name, rest) = text.split_once(char::is_whitespace)?;
    let rest = rest.trim();
    (!rest.is_empty()).then_some((name, rest))
}

/// Splits `Type = default` at the first `=` outside of angle brackets.
fn split_default(text: &str) -> (&str, Option<&str>) {
    let mut depth = 0usize;
    let mut prev = ' ';
    for (i, c) in text.char_indices() {
        match c {
            '<' => depth += 1,
            '>' if prev != '-' => depth = depth.saturating_sub(1),
            '=' if depth == 0 => {
                return (text[..i].trim(), Some(text[i + 1..].trim()));
            }
            _ => {}
        }
        prev = c;
    }
    (text.trim(), None)
}

/// Accepts `path`, `use path` and `use path;`.
fn normalize_import(text: &str) -> &str {
    let text = text.trim();
    let text = text.strip_prefix("use ").unwrap_or(text).trim();
    text.strip_suffix(';').unwrap_or(text).trim()
}

fn parse_for_header(text: &str) -> Result<ForLoop, String> {
    let parts: Vec<_> = text.split_whitespace().collect();
    match parts.as_slice() {
        [var, sep, collection] if *sep == FOR_SEPARATOR => Ok(ForLoop {
            var: (*var).to_owned(),
            collection: (*collection).to_owned(),
        }),
        [_, sep, _] => Err(format!(
            "invalid `@for` header, expected `{FOR_SEPARATOR}` but found `{sep}`"
        )),
        parts => Err(format!(
            "invalid `@for` header, expected 3 components `var {FOR_SEPARATOR} collection` but found {}",
            parts.len()
        )),
    }
}

/// Whether the text is a valid identifier.
pub(crate) fn is_ident(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if is_ident_start(c) => chars.all(is_ident_continue),
        _ => false,
    }
}

#[cfg(feature = "unicode")]
fn is_ident_start(c: char) -> bool {
    c == '_' || unicode_ident::is_xid_start(c)
}

#[cfg(feature = "unicode")]
fn is_ident_continue(c: char) -> bool {
    unicode_ident::is_xid_continue(c)
}

#[cfg(not(feature = "unicode"))]
fn is_ident_start(c: char) -> bool {
    matches!(c, 'A'..='Z' | 'a'..='z' | '_')
}

#[cfg(not(feature = "unicode"))]
fn is_ident_continue(c: char) -> bool {
    matches!(c, '0'..='9' | 'A'..='Z' | 'a'..='z' | '_')
}
