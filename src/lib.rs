//! A library for color palette generation by median cut and image remapping
//! with error-diffusion dithering.
//!
//! `dithercut` builds a palette of up to 256 colors for an RGBA image and
//! remaps the image onto it, optionally diffusing the quantization error
//! through one of the classic diffusion kernels (Floyd–Steinberg, Atkinson,
//! the Sierra family, and others). Output is fully deterministic: rerunning
//! any operation on the same input yields byte-identical results, including
//! the parallel code paths.
//!
//! # Features
//! To reduce dependencies and compile times, `dithercut` has several `cargo`
//! features that can be turned off or on:
//! - `pipelines`: exposes the builder struct that serves as the high-level API.
//! - `threads`: exposes parallel versions of palette generation via [`rayon`].
//! - `image`: enables integration with the [`image`] crate.
//!
//! # High-Level API
//! To get started with the high-level API, see [`Pipeline`](crate::Pipeline).
//! Here is an additional example:
//! ```no_run
//! # #[cfg(all(feature = "pipelines", feature = "image"))]
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! # use dithercut::{Pipeline, PaletteSize};
//! let img = image::open("some image")?.into_rgba8();
//!
//! let mut pipeline = Pipeline::new(&img);
//! pipeline
//!     .palette_size(128.try_into()?) // set the max number of colors in the palette
//!     .kernel("sierra-lite"); // pick the error diffusion kernel
//!
//! // Run the pipeline to get the palette and per-pixel palette indices
//! let (palette, indices) = pipeline.indexed()?;
//! # Ok(())
//! # }
//! ```
//!
//! Note that some of the options and functions above require certain features
//! to be enabled.

#![deny(unsafe_code, unsafe_op_in_unsafe_fn)]
#![warn(
    clippy::pedantic,
    clippy::cargo,
    clippy::use_debug,
    clippy::dbg_macro,
    clippy::todo,
    clippy::unimplemented,
    clippy::unwrap_used,
    clippy::unwrap_in_result,
    clippy::expect_used,
    clippy::unneeded_field_pattern,
    clippy::rest_pat_in_fully_bound_structs,
    clippy::unnecessary_self_imports,
    clippy::str_to_string,
    clippy::string_to_string,
    clippy::string_slice,
    missing_docs,
    clippy::missing_docs_in_private_items,
    rustdoc::all,
    clippy::float_cmp_const,
    clippy::lossy_float_literal
)]
#![allow(
    clippy::doc_markdown,
    clippy::module_name_repetitions,
    clippy::many_single_char_names,
    clippy::missing_panics_doc,
    clippy::unreadable_literal,
    clippy::wildcard_imports
)]

mod dither;
mod kernel;
mod traits;
mod types;

#[cfg(feature = "pipelines")]
mod api;

pub mod matcher;
pub mod median_cut;

pub use dither::Ditherer;
pub use kernel::{Kernel, KernelEntry, KernelRegistry};
pub use traits::*;
pub use types::*;

#[cfg(feature = "pipelines")]
pub use api::*;

/// The maximum supported number of palette colors is `256`.
pub const MAX_COLORS: u16 = u8::MAX as u16 + 1;

/// `MAX_COLORS` as a `usize` for array and `Vec` lengths.
pub(crate) const MAX_K: usize = MAX_COLORS as usize;
