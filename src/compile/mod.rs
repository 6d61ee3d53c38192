//! Compile a template into the Rust source of its render function.
//!
//! This process has three stages:
//! - The lexer chunks the template source into tokens.
//! - The parser constructs a syntax tree and the declarations from the token
//!   stream, collecting diagnostics along the way.
//! - The code generator walks the tree and emits the render function.

pub mod codegen;
pub mod lex;
pub mod parse;
mod writer;

use crate::types::options::Options;
use crate::{Output, Unit};

/// Compile a template into an output.
///
/// This never fails, problems in the template are reported as diagnostics
/// and the generated code is an error stub.
#[tracing::instrument(level = "debug", skip_all, fields(template = unit.name()))]
pub fn template(unit: &Unit, options: &Options) -> Output {
    let tree = parse::Parser::new(unit.source()).parse();
    let code = codegen::generate(&tree, unit, options);
    if tree.has_errors() {
        tracing::debug!(
            diagnostics = tree.diagnostics.len(),
            "template has errors, generated stub"
        );
    } else {
        tracing::debug!(len = code.len(), "generated render function");
    }
    Output::new(unit, code, tree.diagnostics)
}
