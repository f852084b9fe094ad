//! uvbake — bake 2D texture maps from a 3D mesh's UV-space geometry.
//!
//! Three passes over a shared float canvas:
//! - edge highlights: soft rasterized UV boundary lines, confined per island
//!   so bleed never crosses into a neighbor;
//! - distance field: per-pixel wavefront distance from the nearest UV edge,
//!   flooded inside the islands only;
//! - final composite: diffuse × AO × soft-light(edges), distance in alpha.
//!
//! Plus decoders for the GPU texture formats the source assets ship in.

#![allow(clippy::too_many_arguments)]

#[macro_use]
pub mod logger;

pub mod canvas;
pub mod cli;
pub mod geometry;
pub mod job;
pub mod ops;
pub mod raster;

pub use canvas::Canvas;
pub use ops::composite::composite_final;
pub use ops::decode::{TextureFormat, decode_texture};
pub use ops::distance::{DistanceField, generate_distance_field};
pub use ops::highlight::generate_edge_highlights;
