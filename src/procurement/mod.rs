//! Purchase document lifecycle

pub mod document;
pub mod workflow;

pub use document::*;
pub use workflow::*;
