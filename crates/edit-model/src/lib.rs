//! Reelcut Edit Model
//!
//! Data contracts shared by every stage of a render:
//! - **EditSpec:** the user's edit, with all layer times in source milliseconds
//! - **ClipSpec:** the validated edit, translated to clip time
//! - **Geometry:** normalized layer rects and source crop windows
//! - **Subjects:** located points of interest used to anchor cropping

pub mod clip;
pub mod color;
pub mod format;
pub mod geometry;
pub mod spec;
pub mod subject;

pub use clip::*;
pub use color::*;
pub use format::*;
pub use geometry::*;
pub use spec::*;
pub use subject::*;
