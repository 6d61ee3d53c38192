use std::fmt;

use crate::types::span::{Position, Span};

/// The character that introduces every directive.
pub const DIRECTIVE_START: char = '@';

/// The directive that closes a verbatim block.
const VERBATIM_END: &str = "@end";

/// A lexer that tokenizes the template source into literal text and
/// directives so that the parser doesn't have to operate on raw text.
///
/// The parser should repeatedly call [`.next_token()`][Lexer::next_token]
/// until a [`TokenKind::Eof`] token is returned. Calling it again after that
/// keeps returning end-of-input tokens.
///
/// Lexing never fails. Malformed input is reported as a
/// [`TokenKind::Illegal`] token carrying a message and lexing continues after
/// the offending text.
#[derive(Debug)]
pub struct Lexer<'source> {
    /// The original template source.
    source: &'source str,

    /// A cursor over the template source.
    cursor: usize,

    /// The line and column of the cursor.
    position: Position,

    /// The current state of the lexer.
    state: State,

    /// The last token returned from `next_token`.
    prior: Option<Token>,
}

/// The state of the lexer.
///
/// The lexer requires state because the body of `@code`, `@text` and `@func`
/// blocks must be passed through without interpreting any directives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    /// Within template text and directives.
    Template,

    /// Within the body of a verbatim block, e.g. after `@code`.
    Verbatim {
        /// The directive that opened the block.
        opener: TokenKind,
    },
}

/// The kind of a [`Token`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum TokenKind {
    /// Literal template text
    Literal,
    /// End of the template source
    Eof,
    /// Input that could not be tokenized, the text is the reason
    Illegal,
    /// `@arg name Type`
    Arg,
    /// `@context name Type [= default]`
    Context,
    /// `@import path`
    Import,
    /// `@= expr @`
    Display,
    /// `@== expr @`
    DisplayRaw,
    /// `@bool= expr @`
    DisplayBool,
    /// `@int= expr @`
    DisplayInt,
    /// `@int64= expr @`
    DisplayInt64,
    /// `@include name args`
    Include,
    /// `@extend name args`
    Extend,
    /// `@content name`
    Content,
    /// `@yield name`
    Yield,
    /// `@code`
    Code,
    /// `@text`
    Text,
    /// `@func`
    Func,
    /// `@if cond`
    If,
    /// `@for var in collection`
    For,
    /// `@else`
    Else,
    /// `@end` or `@}`
    End,
}

/// The unit yielded by the lexer.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Token {
    pub kind: TokenKind,
    /// The directive payload, the literal text, or the reason for an illegal
    /// token.
    pub text: String,
    pub line: usize,
    pub column: usize,
    pub span: Span,
}

/// A problem found while scanning, converted into an illegal token at the
/// lexer boundary.
struct Fault {
    msg: String,
    start: Position,
    span: Span,
}

impl<'source> Lexer<'source> {
    /// Construct a new lexer.
    pub fn new(source: &'source str) -> Self {
        Self {
            source,
            cursor: 0,
            position: Position::START,
            state: State::Template,
            prior: None,
        }
    }

    /// Returns the token that was last returned from
    /// [`.next_token()`][Lexer::next_token].
    pub fn prior_token(&self) -> Option<&Token> {
        self.prior.as_ref()
    }

    /// Returns the next token.
    pub fn next_token(&mut self) -> Token {
        let token = match self.lex() {
            Ok(token) => token,
            Err(fault) => self.recover(fault),
        };
        self.prior = Some(token.clone());
        token
    }

    fn recover(&self, fault: Fault) -> Token {
        tracing::trace!(
            line = fault.start.line,
            column = fault.start.column,
            msg = %fault.msg,
            "recovered from lex fault"
        );
        Token {
            kind: TokenKind::Illegal,
            text: fault.msg,
            line: fault.start.line,
            column: fault.start.column,
            span: fault.span,
        }
    }

    fn lex(&mut self) -> Result<Token, Fault> {
        loop {
            let i = self.cursor;

            if let State::Verbatim { opener } = self.state {
                // Everything up to the closing `@end` is a single literal.
                // The closing directive is lexed as a normal token on the
                // next iteration.
                self.state = State::Template;
                let j = find_verbatim_end(self.source, i).unwrap_or(self.source.len());
                tracing::trace!(opener = %opener, len = j - i, "leaving verbatim mode");
                if i == j {
                    continue;
                }
                let start = self.position;
                self.advance_to(j);
                return Ok(self.token_from(start, i, TokenKind::Literal, &self.source[i..j]));
            }

            let rest = &self.source[i..];
            if rest.is_empty() {
                return Ok(self.token_from(self.position, i, TokenKind::Eof, ""));
            }

            if !rest.starts_with(DIRECTIVE_START) {
                return Ok(self.lex_literal(i));
            }

            let after = &rest[1..];
            if after.starts_with("//") {
                self.skip_line_comment(i);
                continue;
            }
            if after.starts_with('*') {
                self.skip_block_comment(i)?;
                continue;
            }
            if after.starts_with(DIRECTIVE_START) {
                // `@@` is an escaped directive start.
                let start = self.position;
                self.advance_to(i + 2);
                return Ok(Token {
                    kind: TokenKind::Literal,
                    text: DIRECTIVE_START.to_string(),
                    line: start.line,
                    column: start.column,
                    span: Span::from(i..i + 2),
                });
            }
            return self.lex_directive(i);
        }
    }

    fn lex_literal(&mut self, i: usize) -> Token {
        // We are within template text, that means all we have to do is find
        // the next directive start from `i`.
        //
        // xxxxxxx@xxxxxxxxx
        //    ^   ^
        //    i   j
        let j = self.source[i..]
            .find(DIRECTIVE_START)
            .map(|d| i + d)
            .unwrap_or(self.source.len());
        let start = self.position;
        self.advance_to(j);
        self.token_from(start, i, TokenKind::Literal, &self.source[i..j])
    }

    fn skip_line_comment(&mut self, i: usize) {
        // The comment runs up to and including the end of the line.
        let j = match self.source[i..].find('\n') {
            Some(d) => i + d + 1,
            None => self.source.len(),
        };
        self.advance_to(j);
    }

    fn skip_block_comment(&mut self, i: usize) -> Result<(), Fault> {
        // @*cccccc*@xxxxxx
        // ^        ^
        // i        j
        let start = self.position;
        match self.source[i + 2..].find("*@") {
            Some(d) => {
                self.advance_to(i + 2 + d + 2);
                Ok(())
            }
            None => {
                self.advance_to(self.source.len());
                Err(Fault {
                    msg: String::from("unclosed block comment, expected `*@`"),
                    start,
                    span: Span::from(i..i + 2),
                })
            }
        }
    }

    fn lex_directive(&mut self, i: usize) -> Result<Token, Fault> {
        let start = self.position;
        let after = &self.source[i + 1..];

        if after.starts_with('}') {
            self.advance_to(i + 2);
            return Ok(self.token_from(start, i, TokenKind::End, ""));
        }

        const DISPLAYS: &[(&str, TokenKind)] = &[
            ("==", TokenKind::DisplayRaw),
            ("=", TokenKind::Display),
            ("bool=", TokenKind::DisplayBool),
            ("int64=", TokenKind::DisplayInt64),
            ("int=", TokenKind::DisplayInt),
        ];
        for (marker, kind) in DISPLAYS {
            if after.starts_with(marker) {
                return self.lex_display(start, i, i + 1 + marker.len(), *kind);
            }
        }

        let len = after
            .char_indices()
            .find(|&(_, c)| !is_word(c))
            .map(|(d, _)| d)
            .unwrap_or(after.len());
        let word = &after[..len];
        let j = i + 1 + len;

        let kind = match word {
            "arg" => TokenKind::Arg,
            "context" => TokenKind::Context,
            "import" => TokenKind::Import,
            "include" => TokenKind::Include,
            "extend" => TokenKind::Extend,
            "content" => TokenKind::Content,
            "yield" => TokenKind::Yield,
            "if" => TokenKind::If,
            "for" => TokenKind::For,
            "else" => TokenKind::Else,
            "end" => TokenKind::End,
            "code" => TokenKind::Code,
            "text" => TokenKind::Text,
            "func" => TokenKind::Func,
            "" => {
                let n = after.chars().next().map(char::len_utf8).unwrap_or(0);
                self.advance_to(j + n);
                return Err(Fault {
                    msg: String::from("expected a directive after `@`, use `@@` for a literal `@`"),
                    start,
                    span: Span::from(i..j + n),
                });
            }
            word => {
                self.advance_to(j);
                return Err(Fault {
                    msg: format!("unknown directive `@{word}`"),
                    start,
                    span: Span::from(i..j),
                });
            }
        };

        match kind {
            TokenKind::Else | TokenKind::End => {
                self.advance_to(j);
                Ok(self.token_from(start, i, kind, ""))
            }
            TokenKind::Code | TokenKind::Text | TokenKind::Func => {
                self.advance_to(j);
                tracing::trace!(opener = %kind, "entering verbatim mode");
                self.state = State::Verbatim { opener: kind };
                Ok(self.token_from(start, i, kind, ""))
            }
            _ => {
                // Line directives take the rest of the line as their payload
                // and consume the line ending.
                let (end, next) = match self.source[j..].find('\n') {
                    Some(d) => (j + d, j + d + 1),
                    None => (self.source.len(), self.source.len()),
                };
                let payload = self.source[j..end].trim();
                self.advance_to(next);
                Ok(self.token_with(start, Span::from(i..end), kind, payload))
            }
        }
    }

    fn lex_display(
        &mut self,
        start: Position,
        i: usize,
        j: usize,
        kind: TokenKind,
    ) -> Result<Token, Fault> {
        // The expression runs up to the next `@` on the same line.
        //
        // xx@= user.name @xxxxx
        //   ^ ^          ^
        //   i j          k
        let line_end = self.source[j..]
            .find('\n')
            .map(|d| j + d)
            .unwrap_or(self.source.len());
        match self.source[j..line_end].find(DIRECTIVE_START) {
            Some(d) => {
                let k = j + d;
                self.advance_to(k + 1);
                let payload = self.source[j..k].trim();
                Ok(self.token_with(start, Span::from(i..k + 1), kind, payload))
            }
            None => {
                self.advance_to(line_end);
                Err(Fault {
                    msg: format!(
                        "unclosed {} expression, expected `@` on the same line",
                        kind.human()
                    ),
                    start,
                    span: Span::from(i..j),
                })
            }
        }
    }

    /// Moves the cursor forward to `j` keeping track of the line and column.
    fn advance_to(&mut self, j: usize) {
        self.position.advance(&self.source[self.cursor..j]);
        self.cursor = j;
    }

    fn token_from(&self, start: Position, i: usize, kind: TokenKind, text: &str) -> Token {
        self.token_with(start, Span::from(i..self.cursor), kind, text)
    }

    fn token_with(&self, start: Position, span: Span, kind: TokenKind, text: &str) -> Token {
        Token {
            kind,
            text: text.to_owned(),
            line: start.line,
            column: start.column,
            span,
        }
    }
}

impl Token {
    /// The position of the first character of the token.
    pub fn position(&self) -> Position {
        Position {
            line: self.line,
            column: self.column,
        }
    }
}

impl TokenKind {
    pub fn human(&self) -> &'static str {
        match self {
            Self::Literal => "literal text",
            Self::Eof => "end of input",
            Self::Illegal => "illegal input",
            Self::Arg => "`@arg`",
            Self::Context => "`@context`",
            Self::Import => "`@import`",
            Self::Display => "`@=`",
            Self::DisplayRaw => "`@==`",
            Self::DisplayBool => "`@bool=`",
            Self::DisplayInt => "`@int=`",
            Self::DisplayInt64 => "`@int64=`",
            Self::Include => "`@include`",
            Self::Extend => "`@extend`",
            Self::Content => "`@content`",
            Self::Yield => "`@yield`",
            Self::Code => "`@code`",
            Self::Text => "`@text`",
            Self::Func => "`@func`",
            Self::If => "`@if`",
            Self::For => "`@for`",
            Self::Else => "`@else`",
            Self::End => "`@end`",
        }
    }
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.human())
    }
}

/// Finds the start of the `@end` that closes a verbatim block.
///
/// The closing directive must not be followed by another word character, so
/// `@endpoint` inside a code block does not close it.
fn find_verbatim_end(source: &str, i: usize) -> Option<usize> {
    let mut from = i;
    while let Some(d) = source[from..].find(VERBATIM_END) {
        let j = from + d;
        let k = j + VERBATIM_END.len();
        match source[k..].chars().next() {
            Some(c) if is_word(c) => from = k,
            _ => return Some(j),
        }
    }
    None
}

fn is_word(c: char) -> bool {
    matches!(c, '0'..='9' | 'A'..='Z' | 'a'..='z' | '_')
}
