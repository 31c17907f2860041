//! PDF syntax layer: tokens, objects and stream filters.

pub mod filters;
pub mod lexer;
pub mod objects;

pub use lexer::{Lexer, Token};
pub use objects::{ObjectParser, parse_indirect_object, parse_object_stream};
