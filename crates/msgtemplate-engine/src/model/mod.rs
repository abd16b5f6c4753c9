//! Core data model for documents
//!
//! This module contains pure data structures with minimal external dependencies.

pub mod document;
pub mod edit;

pub use document::{Document, DocumentSnapshot};
pub use edit::TextChange;
