pub mod ast;
pub mod options;
pub mod span;
