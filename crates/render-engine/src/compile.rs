//! Whole-program compilation: video and audio graphs built side by side,
//! then merged over their shared source input.

use std::path::PathBuf;

use reelcut_common::{ReelcutError, ReelcutResult, RenderDefaults};
use reelcut_edit_model::{ClipSpec, SubjectRegion};

use crate::audio::compile_audio;
use crate::graph::{MediaInput, RenderProgram};
use crate::probe::MediaProbe;
use crate::video::compile_video;

/// Files and settings resolved before compilation.
#[derive(Debug, Clone)]
pub struct RenderAssets {
    /// Written subtitle file. `None` when there are no cues.
    pub subtitle_path: Option<PathBuf>,
    pub fonts_dir: Option<PathBuf>,
    /// One decoded image per sticker layer, in layer order.
    pub sticker_paths: Vec<PathBuf>,
    pub sfx_path: Option<PathBuf>,
    pub auto_zoom_max: f64,
}

impl Default for RenderAssets {
    fn default() -> Self {
        Self {
            subtitle_path: None,
            fonts_dir: None,
            sticker_paths: Vec::new(),
            sfx_path: None,
            auto_zoom_max: RenderDefaults::default().auto_zoom_max,
        }
    }
}

/// Input 0 of both graphs: the source, seeked and cut to the trim window.
pub fn source_input(clip: &ClipSpec) -> MediaInput {
    MediaInput::trimmed(&clip.source_path, clip.trim_start_ms, clip.source_span_ms())
}

/// Compile `clip` into one validated encoder program.
///
/// The two halves share nothing mutable, so they are built on separate
/// threads and joined before the merge.
pub fn compile_program(
    clip: &ClipSpec,
    probe: &MediaProbe,
    subjects: &[SubjectRegion],
    assets: &RenderAssets,
) -> ReelcutResult<RenderProgram> {
    let (video, audio) = std::thread::scope(|scope| {
        let video = scope.spawn(|| compile_video(clip, probe, subjects, assets));
        let audio = compile_audio(clip, probe, assets.sfx_path.as_deref());
        (video.join(), audio)
    });

    let video = video.map_err(|_| ReelcutError::graph("video graph compilation panicked"))??;
    let audio = audio?;

    let program = RenderProgram::merge(video, audio, clip.duration_ms)?;
    tracing::info!(
        nodes = program.graph.nodes.len(),
        inputs = program.graph.inputs.len(),
        duration_ms = program.duration_ms,
        "Compiled render program"
    );
    Ok(program)
}
