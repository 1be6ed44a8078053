//! Visibility filters for hierarchy traversal.
//!
//! A filter is a small expression tree evaluated per row by the store:
//! - Expression types (AND, OR, NOT, terms)
//! - Terms over mode bits, content presence, ids and names
//! - A textual form parsed by [`FilterParser`]

mod evaluate;
mod expression;
mod parser;

pub use expression::{FilterTerm, VisibilityFilter};
pub use parser::FilterParser;
