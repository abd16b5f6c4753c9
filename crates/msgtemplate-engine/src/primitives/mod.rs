//! Pure text primitives with no shared state
//!
//! Everything here operates on `&str` and returns owned results, so it can
//! be called from any thread and tested in isolation.

pub mod expression;
pub mod literal;
pub mod template_parser;
