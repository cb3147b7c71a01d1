//! Parsers for template sources and patch path expressions

pub mod ast;
mod grammar;
pub mod lexer;
pub mod source;

pub use ast::*;
pub use grammar::parse_path;
pub use source::{parse_named_source, parse_source};
