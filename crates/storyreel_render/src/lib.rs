//! Filter-graph compositor: turns a script plus its resolved timeline
//! into an ffmpeg render plan (external inputs + an ordered, acyclic
//! list of filter stages) and executes it.

pub mod assemble;
pub mod effects;
pub mod error;
pub mod exec;
pub mod fonts;
pub mod plan;
pub mod position;
pub mod textfit;
pub mod textimage;

pub use error::{RenderError, Result};
