//! Reelcut Captions
//!
//! Builds the burned-in subtitle track for a render:
//! - **Word cues:** karaoke-style highlighting with a per-word scale pulse
//! - **Segment cues:** a single pop-in cue when no word timing exists
//! - **Hook:** a headline over the first seconds of the clip
//!
//! Output is an ASS document in clip time, sized to the output canvas.

pub mod ass;
pub mod builder;

pub use ass::*;
pub use builder::*;
