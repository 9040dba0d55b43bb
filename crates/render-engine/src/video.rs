//! Video graph compiler.
//!
//! Fixed stage order, each stage optional except the frame:
//!
//! ```text
//! [0:v] → frame → tempo → motion → overlays → color → subtitles → watermark → out
//! ```
//!
//! A skipped stage emits no node; the running pad simply carries over.

use std::f64::consts::FRAC_PI_2;
use std::path::Path;

use reelcut_common::{ReelcutError, ReelcutResult};
use reelcut_edit_model::{even, ClipSpec, ColorFilter, Corner, CropWindow, SubjectRegion, Watermark};

use crate::compile::{source_input, RenderAssets};
use crate::graph::{Filter, FilterGraph, GraphBuilder, MediaInput, Stage, VideoPad};
use crate::motion::{zoom_expr, zoom_filters};
use crate::probe::MediaProbe;

/// Compile the video half of the program.
pub fn compile_video(
    clip: &ClipSpec,
    probe: &MediaProbe,
    subjects: &[SubjectRegion],
    assets: &RenderAssets,
) -> ReelcutResult<FilterGraph> {
    let canvas = clip.target_format.dimensions();
    let mut builder = GraphBuilder::new(source_input(clip));
    let source: VideoPad = builder.source(0)?;

    let mut pad = frame_stage(&mut builder, source, clip, probe, subjects, canvas);

    if (clip.speed - 1.0).abs() > f64::EPSILON {
        pad = builder.node(
            Stage::Tempo,
            vec![pad],
            vec![Filter::with_args(
                "setpts",
                format!("(PTS-STARTPTS)/{:.6}", clip.speed),
            )],
        );
    }

    if let Some(zoom) = zoom_expr(clip, assets.auto_zoom_max) {
        pad = builder.node(Stage::Motion, vec![pad], zoom_filters(&zoom, canvas.0, canvas.1));
    }

    pad = overlay_stage(&mut builder, pad, clip, assets, canvas)?;

    if let Some(filters) = color_filters(&clip.color_filter) {
        pad = builder.node(Stage::Color, vec![pad], filters);
    }

    if let Some(path) = &assets.subtitle_path {
        pad = builder.node(
            Stage::Subtitle,
            vec![pad],
            vec![subtitles_filter(path, assets.fonts_dir.as_deref())],
        );
    }

    if let Some(watermark) = &clip.watermark {
        pad = watermark_stage(&mut builder, pad, watermark, canvas)?;
    }

    let graph = builder.finish(Some(pad), None);
    graph.validate()?;
    tracing::debug!(nodes = graph.nodes.len(), inputs = graph.inputs.len(), "Compiled video graph");
    Ok(graph)
}

fn crop_scale(crop: CropWindow, width: u32, height: u32) -> Vec<Filter> {
    vec![
        Filter::with_args("crop", format!("{}:{}:{}:{}", crop.w, crop.h, crop.x, crop.y)),
        Filter::with_args("scale", format!("{width}:{height}")),
        Filter::with_args("setsar", "1"),
    ]
}

/// Heights of `n` stacked bands that sum to `height`, all even.
pub fn band_heights(height: u32, n: usize) -> Vec<u32> {
    let n = n.max(1);
    let band = even(height / n as u32).max(2);
    let mut heights = vec![band; n];
    if let Some(last) = heights.last_mut() {
        *last = height.saturating_sub(band * (n as u32 - 1)).max(2);
    }
    heights
}

fn frame_stage(
    builder: &mut GraphBuilder,
    source: VideoPad,
    clip: &ClipSpec,
    probe: &MediaProbe,
    subjects: &[SubjectRegion],
    (width, height): (u32, u32),
) -> VideoPad {
    let (sw, sh) = (probe.width, probe.height);

    if clip.subject_framing && subjects.len() > 1 {
        let n = subjects.len();
        let branches = builder.fan_out(
            Stage::Frame,
            vec![source],
            vec![Filter::with_args("split", n.to_string())],
            n,
        );
        let bands: Vec<VideoPad> = branches
            .into_iter()
            .zip(subjects)
            .zip(band_heights(height, n))
            .map(|((branch, subject), band)| {
                let window = CropWindow::largest_for_aspect(sw, sh, width as f64 / band as f64);
                let crop = window.centered_on(subject.center_x, window.center().1, sw, sh);
                builder.node(Stage::Frame, vec![branch], crop_scale(crop, width, band))
            })
            .collect();
        return builder.node(
            Stage::Frame,
            bands,
            vec![Filter::with_args("vstack", format!("inputs={n}"))],
        );
    }

    let mut crop = CropWindow::largest_for_aspect(sw, sh, width as f64 / height as f64);
    if clip.subject_framing {
        if let Some(subject) = subjects.first() {
            crop = crop.centered_on(subject.center_x, crop.center().1, sw, sh);
        }
    }
    builder.node(Stage::Frame, vec![source], crop_scale(crop, width, height))
}

fn enable_between(start_secs: f64, end_secs: f64) -> String {
    format!("enable='between(t,{start_secs:.3},{end_secs:.3})'")
}

fn overlay_stage(
    builder: &mut GraphBuilder,
    mut pad: VideoPad,
    clip: &ClipSpec,
    assets: &RenderAssets,
    (width, height): (u32, u32),
) -> ReelcutResult<VideoPad> {
    for layer in &clip.broll {
        let input = builder.add_input(MediaInput::trimmed(
            &layer.path,
            layer.source_offset_ms,
            layer.window.duration_ms(),
        ));
        let (x, y, w, h) = layer.rect.to_pixels(width, height);
        let mut filters = vec![
            Filter::with_args("scale", format!("{w}:{h}:force_original_aspect_ratio=increase")),
            Filter::with_args("crop", format!("{w}:{h}")),
            Filter::with_args("setsar", "1"),
            Filter::with_args(
                "setpts",
                format!("PTS-STARTPTS+{:.3}/TB", layer.window.start_secs()),
            ),
        ];
        if layer.opacity < 1.0 {
            filters.push(Filter::with_args("format", "rgba"));
            filters.push(Filter::with_args(
                "colorchannelmixer",
                format!("aa={:.3}", layer.opacity),
            ));
        }
        let layer_pad: VideoPad = builder.source(input)?;
        let prepared = builder.node(Stage::Overlay, vec![layer_pad], filters);
        pad = builder.node(
            Stage::Overlay,
            vec![pad, prepared],
            vec![Filter::with_args(
                "overlay",
                format!(
                    "x={x}:y={y}:{}:eof_action=pass",
                    enable_between(layer.window.start_secs(), layer.window.end_secs())
                ),
            )],
        );
    }

    if assets.sticker_paths.len() != clip.stickers.len() {
        return Err(ReelcutError::graph(format!(
            "{} sticker layers but {} sticker images were resolved",
            clip.stickers.len(),
            assets.sticker_paths.len()
        )));
    }
    for (layer, path) in clip.stickers.iter().zip(&assets.sticker_paths) {
        let input = builder.add_input(MediaInput::looped_image(path, clip.duration_ms));
        let (x, y, w, h) = layer.rect.to_pixels(width, height);
        let sticker: VideoPad = builder.source(input)?;
        let prepared = builder.node(
            Stage::Overlay,
            vec![sticker],
            vec![
                Filter::with_args("scale", format!("{w}:{h}:force_original_aspect_ratio=decrease")),
                Filter::with_args("format", "rgba"),
            ],
        );
        pad = builder.node(
            Stage::Overlay,
            vec![pad, prepared],
            vec![Filter::with_args(
                "overlay",
                format!(
                    "x='{x}+({w}-w)/2':y='{y}+({h}-h)/2':{}",
                    enable_between(layer.window.start_secs(), layer.window.end_secs())
                ),
            )],
        );
    }

    Ok(pad)
}

/// Combined color node filters, or `None` for a neutral grade.
pub fn color_filters(color: &ColorFilter) -> Option<Vec<Filter>> {
    if color.is_neutral() {
        return None;
    }
    let mut filters = Vec::new();
    if color.has_exposure() {
        filters.push(Filter::with_args(
            "eq",
            format!(
                "brightness={:.3}:contrast={:.3}:saturation={:.3}",
                color.brightness, color.contrast, color.saturation
            ),
        ));
    }
    if color.has_hue() {
        filters.push(Filter::with_args("hue", format!("h={:.3}", color.hue)));
    }
    if color.has_temperature() {
        filters.push(Filter::with_args(
            "colortemperature",
            format!("temperature={:.0}", color.kelvin()),
        ));
    }
    if color.has_vignette() {
        filters.push(Filter::with_args(
            "vignette",
            format!("angle={:.4}", color.vignette * FRAC_PI_2),
        ));
    }
    Some(filters)
}

/// Escape a path for use inside a single-quoted filter option.
///
/// The value is unquoted by the graph parser and then unescaped again by the
/// option parser. A quote therefore leaves the quoted run and becomes `\\\'`,
/// which the graph parser turns into the `\'` the option parser expects.
pub fn escape_filter_path(path: &Path) -> String {
    path.to_string_lossy()
        .replace('\\', "/")
        .replace('\'', r"'\\\''")
        .replace(':', r"\:")
}

fn subtitles_filter(path: &Path, fonts_dir: Option<&Path>) -> Filter {
    let mut args = format!("filename='{}'", escape_filter_path(path));
    if let Some(dir) = fonts_dir {
        args.push_str(&format!(":fontsdir='{}'", escape_filter_path(dir)));
    }
    Filter::with_args("subtitles", args)
}

fn watermark_stage(
    builder: &mut GraphBuilder,
    pad: VideoPad,
    watermark: &Watermark,
    (width, _height): (u32, u32),
) -> ReelcutResult<VideoPad> {
    let input = builder.add_input(MediaInput::file(&watermark.path));
    let logo_width = even((width as f64 * watermark.width_ratio).round() as u32).max(2);
    let margin = (width as f64 * watermark.margin_ratio).round() as u32;

    let logo: VideoPad = builder.source(input)?;
    let prepared = builder.node(
        Stage::Watermark,
        vec![logo],
        vec![
            Filter::with_args("scale", format!("{logo_width}:-2")),
            Filter::with_args("format", "rgba"),
            Filter::with_args("colorchannelmixer", format!("aa={:.3}", watermark.opacity)),
        ],
    );
    let position = match watermark.corner {
        Corner::TopLeft => format!("x={margin}:y={margin}"),
        Corner::TopRight => format!("x=W-w-{margin}:y={margin}"),
        Corner::BottomLeft => format!("x={margin}:y=H-h-{margin}"),
        Corner::BottomRight => format!("x=W-w-{margin}:y=H-h-{margin}"),
    };
    Ok(builder.node(
        Stage::Watermark,
        vec![pad, prepared],
        vec![Filter::with_args("overlay", position)],
    ))
}
