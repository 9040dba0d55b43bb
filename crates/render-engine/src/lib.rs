//! Reelcut Render Engine
//!
//! Compiles an edit into one encoder program and runs it.
//!
//! # Pipeline Architecture
//!
//! ```text
//! EditSpec ──► ClipSpec (clip-relative times)
//!                 │
//! source ──► probe ──► subject locator ──► subtitle track
//!                 │
//!        ┌────────┴─────────┐
//!   compile_video     compile_audio      (parallel, pure)
//!        └────────┬─────────┘
//!                 ▼
//!          RenderProgram::merge
//!                 │
//!                 ▼
//!        encoder subprocess ──► output.mp4
//! ```
//!
//! Every temp file lives in a per-render [`reelcut_common::TempScope`] that
//! is drained whether the render succeeds, fails, or is cancelled.

pub mod audio;
pub mod compile;
pub mod encoder;
pub mod graph;
pub mod motion;
pub mod probe;
pub mod progress;
pub mod render;
pub mod video;

pub use audio::compile_audio;
pub use compile::{compile_program, source_input, RenderAssets};
pub use encoder::{codec_args, detect_encoder, select_encoder, VideoEncoder};
pub use graph::{
    AudioPad, Filter, FilterGraph, FilterNode, GraphBuilder, MediaInput, PadRef, RenderProgram,
    Stage, StreamKind, VideoPad,
};
pub use probe::{parse_probe_output, probe_media, probe_or_default, MediaProbe};
pub use progress::{ProgressCallback, ProgressTracker, RenderProgress, RenderStage};
pub use render::{cancel_pair, derive_output_path, CancelHandle, CancelSignal, RenderPlan, Renderer};
pub use video::compile_video;
