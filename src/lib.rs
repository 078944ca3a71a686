//! Load SVG documents and render them to RGBA pixel buffers.
//!
//! The document is parsed incrementally: a [`Handle`] accepts bytes in chunks of any size,
//! and draws each top-level element of the document as soon as it has been read.  The
//! `pixbuf_from_file*` functions wrap this for the common case of rendering a file at a
//! certain size:
//!
//! ```no_run
//! let pixbuf = rsvg::pixbuf_from_file_at_max_size("example.svg", 256, 256).unwrap();
//! pixbuf.save_png("example.png").unwrap();
//! ```
//!
//! Rendering is done in software, with premultiplied 8-bit RGBA pixels.  Errors in a
//! document are logged when the `RSVG_LOG` environment variable is set, and the
//! offending element is skipped.

#![allow(rustdoc::private_intra_doc_links)]
#![allow(clippy::clone_on_ref_ptr)]
#![allow(clippy::too_many_arguments)]
#![allow(clippy::derive_partial_eq_without_eq)]
#![warn(nonstandard_style, rust_2018_idioms, unused)]
// Some lints no longer exist
#![warn(renamed_and_removed_lints)]
// Standalone lints
#![warn(trivial_casts, trivial_numeric_casts)]

// The public API is exported here
pub use crate::api::*;

mod angle;
mod api;
mod aspect_ratio;
mod bbox;
mod color;
mod cond;
mod coord_units;
mod css;
mod dasharray;
mod document;
mod drawing_ctx;
mod element;
mod error;
mod filter;
mod filters;
mod gradient;
mod handle;
mod image;
mod io;
mod iri;
mod layout;
mod length;
mod log;
mod marker;
mod node;
mod paint_server;
mod parsers;
mod path_builder;
mod path_parser;
mod pattern;
mod rasterizer;
mod rect;
mod shapes;
mod sizing;
mod state;
mod stroke;
mod structure;
mod style;
mod surface_utils;
mod text;
mod transform;
mod util;
mod viewbox;
mod vpath;
mod xml;

#[doc(hidden)]
pub mod bench_only {
    pub use crate::filters::lighting::Normal;
    pub use crate::path_builder::PathBuilder;
    pub use crate::rect::IRect;
    pub use crate::surface_utils::{
        iterators::{PixelRectangle, Pixels},
        shared_surface::{ExclusiveImageSurface, Horizontal, SharedImageSurface, Vertical},
        EdgeMode, Pixel, PixelOps,
    };
    pub use crate::transform::Transform;
    pub use crate::vpath::{Vpath, FLATNESS};
}

#[doc(hidden)]
pub mod doctest_only {
    pub use crate::aspect_ratio::AspectRatio;
    pub use crate::error::AttributeResultExt;
    pub use crate::error::ElementError;
    pub use crate::error::ValueErrorKind;
    pub use crate::length::{Both, CssLength, Horizontal, Length, LengthUnit, ULength, Vertical};
    pub use crate::parsers::{Parse, ParseValue};
}

#[doc(hidden)]
pub mod rsvg_convert_only {
    pub use crate::color::{Color, RGBA};
    pub use crate::parsers::Parse;
}
