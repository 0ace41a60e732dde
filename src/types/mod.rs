//! Framework-facing value types.

pub mod message;

pub use message::{ContentPart, ModelMessage, Role};
