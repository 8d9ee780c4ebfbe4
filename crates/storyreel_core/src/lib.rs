//! Core data model for narrated-video scripts: the declarative script
//! document, the resolved section timeline, and the caption/metadata
//! writers that consume it. Pure with respect to its inputs; the only
//! I/O is reading WAV headers and writing caption files.

pub mod captions;
pub mod error;
pub mod script;
pub mod timeline;

pub use error::{CoreError, Result};
