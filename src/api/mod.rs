//! Contains the high-level pipeline API.

mod pipeline;

pub use pipeline::*;
