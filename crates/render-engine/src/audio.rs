//! Audio graph compiler.
//!
//! ```text
//! [0:a] → primary (volume, tempo) → enhance → music mix → sfx mix → out
//! ```
//!
//! The primary node always exists; everything after it is optional.

use std::path::Path;

use reelcut_common::{ReelcutError, ReelcutResult};
use reelcut_edit_model::{AudioTrack, ClipSpec};

use crate::compile::source_input;
use crate::graph::{AudioPad, Filter, FilterGraph, GraphBuilder, MediaInput, Stage};
use crate::probe::MediaProbe;

/// Common sample format for every branch that feeds a mix.
const SAMPLE_FORMAT: &str = "sample_rates=48000:channel_layouts=stereo";

/// Music level in the flat mix, relative to the primary track.
pub const FLAT_MUSIC_WEIGHT: f64 = 0.6;

/// Per-filter limits of `atempo`.
const ATEMPO_MIN: f64 = 0.5;
const ATEMPO_MAX: f64 = 2.0;

/// Compile the audio half of the program.
pub fn compile_audio(
    clip: &ClipSpec,
    probe: &MediaProbe,
    sfx_path: Option<&Path>,
) -> ReelcutResult<FilterGraph> {
    let mut builder = GraphBuilder::new(source_input(clip));

    let mut pad = primary_stage(&mut builder, clip, probe)?;

    if clip.enhance_audio {
        pad = builder.node(
            Stage::Enhance,
            vec![pad],
            vec![
                Filter::with_args("highpass", "f=80"),
                Filter::with_args("afftdn", "nf=-25"),
                Filter::with_args("loudnorm", "I=-16:TP=-1.5:LRA=11"),
            ],
        );
    }

    if let Some(track) = &clip.music {
        pad = music_stage(&mut builder, pad, clip, track)?;
    }

    if clip.sfx_enabled {
        pad = sfx_stage(&mut builder, pad, clip, sfx_path)?;
    }

    let graph = builder.finish(None, Some(pad));
    graph.validate()?;
    tracing::debug!(nodes = graph.nodes.len(), inputs = graph.inputs.len(), "Compiled audio graph");
    Ok(graph)
}

/// Split a tempo factor into `atempo` steps that each stay within range.
pub fn atempo_chain(speed: f64) -> Vec<f64> {
    let mut factors = Vec::new();
    if !speed.is_finite() || speed <= 0.0 {
        return factors;
    }
    let mut remaining = speed;
    while remaining > ATEMPO_MAX {
        factors.push(ATEMPO_MAX);
        remaining /= ATEMPO_MAX;
    }
    while remaining < ATEMPO_MIN {
        factors.push(ATEMPO_MIN);
        remaining /= ATEMPO_MIN;
    }
    if (remaining - 1.0).abs() > 1e-9 {
        factors.push(remaining);
    }
    factors
}

fn primary_stage(
    builder: &mut GraphBuilder,
    clip: &ClipSpec,
    probe: &MediaProbe,
) -> ReelcutResult<AudioPad> {
    if !probe.has_audio {
        tracing::debug!("Source has no audio stream; substituting silence");
        return Ok(builder.generator(
            Stage::Primary,
            vec![
                Filter::with_args("anullsrc", "r=48000:cl=stereo"),
                Filter::with_args("atrim", format!("duration={:.3}", clip.duration_secs())),
            ],
        ));
    }

    let source: AudioPad = builder.source(0)?;
    let volume = if clip.mute { 0.0 } else { clip.volume };
    let mut filters = vec![Filter::with_args("volume", format!("{volume:.3}"))];
    filters.extend(
        atempo_chain(clip.speed)
            .into_iter()
            .map(|factor| Filter::with_args("atempo", format!("{factor:.6}"))),
    );
    filters.push(Filter::with_args("aformat", SAMPLE_FORMAT));
    Ok(builder.node(Stage::Primary, vec![source], filters))
}

fn music_stage(
    builder: &mut GraphBuilder,
    primary: AudioPad,
    clip: &ClipSpec,
    track: &AudioTrack,
) -> ReelcutResult<AudioPad> {
    let input = builder.add_input(MediaInput::looped_audio(&track.path, track.trim_offset_ms));
    let duration = clip.duration_secs();
    let fade = (track.fade_duration_ms.min(clip.duration_ms / 2)) as f64 / 1000.0;

    let mut filters = vec![
        Filter::with_args("atrim", format!("duration={duration:.3}")),
        Filter::with_args("asetpts", "PTS-STARTPTS"),
        Filter::with_args("volume", format!("{:.3}", track.volume)),
    ];
    if track.fade_in && fade > 0.0 {
        filters.push(Filter::with_args("afade", format!("t=in:st=0:d={fade:.3}")));
    }
    if track.fade_out && fade > 0.0 {
        filters.push(Filter::with_args(
            "afade",
            format!("t=out:st={:.3}:d={fade:.3}", duration - fade),
        ));
    }
    filters.push(Filter::with_args("aformat", SAMPLE_FORMAT));

    let music_source: AudioPad = builder.source(input)?;
    let music = builder.node(Stage::Music, vec![music_source], filters);

    if !clip.ducking_enabled {
        return Ok(builder.node(
            Stage::Mix,
            vec![primary, music],
            vec![Filter::with_args(
                "amix",
                format!("inputs=2:duration=first:weights='1 {FLAT_MUSIC_WEIGHT}':normalize=0"),
            )],
        ));
    }

    let mut copies = builder
        .fan_out(Stage::Mix, vec![primary], vec![Filter::with_args("asplit", "2")], 2)
        .into_iter();
    let (Some(main), Some(reference)) = (copies.next(), copies.next()) else {
        return Err(ReelcutError::graph("asplit produced fewer than two pads"));
    };
    let ducked = builder.node(
        Stage::Mix,
        vec![music, reference],
        vec![Filter::with_args(
            "sidechaincompress",
            "threshold=0.05:ratio=8:attack=20:release=300",
        )],
    );
    Ok(builder.node(
        Stage::Mix,
        vec![main, ducked],
        vec![Filter::with_args("amix", "inputs=2:duration=first:normalize=0")],
    ))
}

fn sfx_stage(
    builder: &mut GraphBuilder,
    pad: AudioPad,
    clip: &ClipSpec,
    sfx_path: Option<&Path>,
) -> ReelcutResult<AudioPad> {
    let onsets = clip.caption_onsets();
    if onsets.is_empty() {
        return Ok(pad);
    }
    let Some(path) = sfx_path else {
        tracing::warn!("SFX enabled but no sound file is configured; skipping");
        return Ok(pad);
    };

    let input = builder.add_input(MediaInput::file(path));
    let sound: AudioPad = builder.source(input)?;
    let n = onsets.len();
    let copies = if n > 1 {
        builder.fan_out(
            Stage::Sfx,
            vec![sound],
            vec![Filter::with_args("asplit", n.to_string())],
            n,
        )
    } else {
        vec![sound]
    };

    let mut mix_inputs = Vec::with_capacity(n + 1);
    mix_inputs.push(pad);
    for (copy, onset) in copies.into_iter().zip(onsets) {
        mix_inputs.push(builder.node(
            Stage::Sfx,
            vec![copy],
            vec![
                Filter::with_args("adelay", format!("delays={onset}:all=1")),
                Filter::with_args("aformat", SAMPLE_FORMAT),
            ],
        ));
    }

    Ok(builder.node(
        Stage::Sfx,
        mix_inputs,
        vec![Filter::with_args(
            "amix",
            format!("inputs={}:duration=first:normalize=0", n + 1),
        )],
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use reelcut_edit_model::{EditSpec, TargetFormat, TextSegment};

    fn probe(has_audio: bool) -> MediaProbe {
        MediaProbe {
            width: 1920,
            height: 1080,
            duration_ms: Some(60_000),
            has_audio,
            probed: true,
        }
    }

    fn edit() -> EditSpec {
        EditSpec::new("/media/in.mp4", 10_000, 20_000, TargetFormat::Portrait9x16)
    }

    fn compile(edit: &EditSpec, has_audio: bool, sfx: Option<&Path>) -> FilterGraph {
        let clip = ClipSpec::from_edit(edit).unwrap();
        compile_audio(&clip, &probe(has_audio), sfx).unwrap()
    }

    fn track() -> AudioTrack {
        AudioTrack {
            path: "/media/music.mp3".into(),
            volume: 0.3,
            fade_in: true,
            fade_out: true,
            fade_duration_ms: 1_500,
            trim_offset_ms: 2_000,
        }
    }

    fn segment(text: &str, start_ms: u64, end_ms: u64) -> TextSegment {
        TextSegment {
            text: text.into(),
            start_ms,
            end_ms,
            words: Vec::new(),
        }
    }

    #[test]
    fn test_atempo_chain_stays_in_range() {
        assert_eq!(atempo_chain(1.0), Vec::<f64>::new());
        assert_eq!(atempo_chain(1.5), vec![1.5]);
        assert_eq!(atempo_chain(3.0), vec![2.0, 1.5]);
        assert_eq!(atempo_chain(0.25), vec![0.5, 0.5]);
        let product: f64 = atempo_chain(5.0).iter().product();
        assert!((product - 5.0).abs() < 1e-9);
    }

    #[test]
    fn test_plain_graph_is_primary_only() {
        let graph = compile(&edit(), true, None);
        assert_eq!(graph.nodes.len(), 1);
        assert_eq!(
            graph.to_filter_complex(),
            "[0:a]volume=1.000,aformat=sample_rates=48000:channel_layouts=stereo[a0]"
        );
    }

    #[test]
    fn test_mute_zeroes_volume() {
        let mut edit = edit();
        edit.mute = true;
        edit.volume = 0.8;
        let graph = compile(&edit, true, None);
        assert_eq!(graph.nodes[0].filters[0].to_string(), "volume=0.000");
    }

    #[test]
    fn test_silent_source_uses_generator() {
        let graph = compile(&edit(), false, None);
        assert!(graph.nodes[0].inputs.is_empty());
        assert!(graph.nodes[0].has_filter("anullsrc"));
        assert_eq!(graph.nodes[0].filters[1].to_string(), "atrim=duration=10.000");
    }

    #[test]
    fn test_flat_music_mix() {
        let mut edit = edit();
        edit.audio_track = Some(track());
        let graph = compile(&edit, true, None);
        assert_eq!(graph.inputs.len(), 2);
        assert_eq!(graph.inputs[1].path, Path::new("/media/music.mp3"));
        let music = graph.stage_nodes(Stage::Music).next().unwrap();
        let fades: Vec<String> = music
            .filters
            .iter()
            .filter(|f| f.name == "afade")
            .map(ToString::to_string)
            .collect();
        assert_eq!(fades, vec!["afade=t=in:st=0:d=1.500", "afade=t=out:st=8.500:d=1.500"]);
        let mix: Vec<_> = graph.stage_nodes(Stage::Mix).collect();
        assert_eq!(mix.len(), 1);
        assert!(mix[0].filters[0].to_string().contains("weights='1 0.6'"));
    }

    #[test]
    fn test_ducking_splits_and_compresses() {
        let mut edit = edit();
        edit.audio_track = Some(track());
        edit.ducking_enabled = true;
        let graph = compile(&edit, true, None);
        let mix: Vec<_> = graph.stage_nodes(Stage::Mix).collect();
        assert_eq!(mix.len(), 3);
        assert!(mix[0].has_filter("asplit"));
        assert_eq!(mix[0].outputs.len(), 2);
        assert!(mix[1].has_filter("sidechaincompress"));
        // The compressor is keyed by the primary's reference copy.
        assert_eq!(mix[1].inputs[1], mix[0].outputs[1]);
        assert!(mix[2].has_filter("amix"));
    }

    #[test]
    fn test_sfx_per_onset() {
        let mut edit = edit();
        edit.sfx_enabled = true;
        edit.text_segments = vec![
            segment("before", 5_000, 11_000),
            segment("one", 12_000, 13_000),
            segment("two", 15_000, 16_000),
        ];
        let graph = compile(&edit, true, Some(Path::new("/media/pop.wav")));
        let sfx: Vec<_> = graph.stage_nodes(Stage::Sfx).collect();
        // asplit, two delays, final mix
        assert_eq!(sfx.len(), 4);
        assert_eq!(sfx[1].filters[0].to_string(), "adelay=delays=2000:all=1");
        assert_eq!(sfx[2].filters[0].to_string(), "adelay=delays=5000:all=1");
        assert_eq!(sfx[3].filters[0].to_string(), "amix=inputs=3:duration=first:normalize=0");
    }

    #[test]
    fn test_sfx_without_path_or_onsets_is_skipped() {
        let mut edit = edit();
        edit.sfx_enabled = true;
        edit.text_segments = vec![segment("one", 12_000, 13_000)];
        assert_eq!(compile(&edit, true, None).nodes.len(), 1);

        edit.text_segments.clear();
        assert_eq!(compile(&edit, true, Some(Path::new("/media/pop.wav"))).nodes.len(), 1);
    }
}
