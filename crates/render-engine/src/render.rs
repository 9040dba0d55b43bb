//! Render orchestration: plan, encode, clean up.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Instant;

use base64::Engine as _;
use chrono::{DateTime, Utc};
use reelcut_captions::SubtitleTrackBuilder;
use reelcut_common::{AppConfig, ReelcutError, ReelcutResult, TempScope};
use reelcut_edit_model::{ClipSpec, EditSpec, StickerSource, SubjectRegion, TargetFormat};
use reelcut_subject_locator::SubjectLocator;
use serde::Serialize;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, BufReader};
use tokio::process::Command;
use tokio::sync::watch;

use crate::compile::{compile_program, RenderAssets};
use crate::encoder::{codec_args, select_encoder, VideoEncoder};
use crate::graph::RenderProgram;
use crate::probe::{probe_or_default, MediaProbe};
use crate::progress::{
    encode_percent, estimate_eta, EncodeProgress, ProgressCallback, ProgressTracker, RenderStage,
    COMPILED_PERCENT, LOCATING_PERCENT, PROBED_PERCENT,
};

/// Seconds without encoder progress before a stall warning.
const STALL_WARN_SECS: u64 = 10;

/// Triggers cancellation of the renders holding the paired [`CancelSignal`].
#[derive(Debug)]
pub struct CancelHandle {
    tx: watch::Sender<bool>,
}

/// Observed by a render; resolves once the paired handle cancels.
#[derive(Debug, Clone)]
pub struct CancelSignal {
    rx: watch::Receiver<bool>,
}

/// Create a connected cancel handle and signal.
pub fn cancel_pair() -> (CancelHandle, CancelSignal) {
    let (tx, rx) = watch::channel(false);
    (CancelHandle { tx }, CancelSignal { rx })
}

impl CancelHandle {
    pub fn cancel(&self) {
        self.tx.send_replace(true);
    }

    /// Another signal observing this handle.
    pub fn signal(&self) -> CancelSignal {
        CancelSignal {
            rx: self.tx.subscribe(),
        }
    }
}

impl CancelSignal {
    pub fn is_cancelled(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolve when cancelled. Never resolves if the handle is dropped first.
    pub async fn cancelled(&mut self) {
        if self.rx.wait_for(|cancelled| *cancelled).await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}

async fn wait_cancelled(signal: &mut Option<CancelSignal>) {
    match signal {
        Some(signal) => signal.cancelled().await,
        None => std::future::pending().await,
    }
}

/// Everything decided before the encoder runs.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RenderPlan {
    #[serde(skip)]
    pub clip: ClipSpec,
    pub probe: MediaProbe,
    pub subjects: Vec<SubjectRegion>,
    pub program: RenderProgram,
    pub encoder: VideoEncoder,
    pub output_path: PathBuf,
    /// Complete encoder argument list.
    pub args: Vec<String>,
}

/// Derive `<dir>/<stem>_<format>_<timestamp>.mp4` for a spec without an output path.
pub fn derive_output_path(
    source: &Path,
    format: TargetFormat,
    output_dir: Option<&Path>,
    now: DateTime<Utc>,
) -> PathBuf {
    let stem = source
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| "clip".to_string());
    let dir = match output_dir {
        Some(dir) => dir.to_path_buf(),
        None => match source.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        },
    };
    dir.join(format!(
        "{stem}_{}_{}.mp4",
        format.slug(),
        now.format("%Y%m%dT%H%M%SZ")
    ))
}

/// Remove whatever a failed or cancelled encoder left at `path`.
fn discard_partial_output(path: &Path) {
    match std::fs::remove_file(path) {
        Ok(()) => tracing::debug!(path = %path.display(), "Removed partial output"),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(source) => {
            let err = ReelcutError::Cleanup {
                path: path.to_path_buf(),
                source,
            };
            tracing::warn!(error = %err, "Partial output removal failed");
        }
    }
}

/// Decode a `data:image/<type>;base64,<payload>` URL into bytes and a file extension.
pub fn decode_data_url(url: &str) -> ReelcutResult<(Vec<u8>, &'static str)> {
    let rest = url
        .strip_prefix("data:image/")
        .ok_or_else(|| ReelcutError::graph("Sticker data URL is not an image"))?;
    let (subtype, payload) = rest
        .split_once(";base64,")
        .ok_or_else(|| ReelcutError::graph("Sticker data URL is not base64 encoded"))?;
    let extension = match subtype.to_ascii_lowercase().as_str() {
        "jpeg" | "jpg" => "jpg",
        "webp" => "webp",
        "gif" => "gif",
        _ => "png",
    };
    let bytes = base64::engine::general_purpose::STANDARD
        .decode(payload.trim())
        .map_err(|e| ReelcutError::graph(format!("Sticker data URL payload is invalid: {e}")))?;
    Ok((bytes, extension))
}

/// Drives a full render.
pub struct Renderer {
    config: AppConfig,
    locator: SubjectLocator,
}

impl Renderer {
    pub fn new(config: AppConfig) -> Self {
        let locator = SubjectLocator::from_config(&config);
        Self { config, locator }
    }

    /// Replace the subject locator (custom tier chains, tests).
    pub fn with_locator(mut self, locator: SubjectLocator) -> Self {
        self.locator = locator;
        self
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Resolve everything up to the encoder invocation without running it.
    ///
    /// Subtitle and sticker files are written into `scope`.
    pub async fn plan(&self, edit: &EditSpec, scope: &mut TempScope) -> ReelcutResult<RenderPlan> {
        self.prepare(edit, scope, &mut ProgressTracker::new(None)).await
    }

    /// Render `edit` and return the output path.
    ///
    /// Temp files are removed on every exit path, including encoder failure
    /// and cancellation.
    pub async fn render(
        &self,
        edit: &EditSpec,
        progress: Option<ProgressCallback>,
        cancel: Option<CancelSignal>,
    ) -> ReelcutResult<PathBuf> {
        let mut tracker = ProgressTracker::new(progress);
        tracker.report(RenderStage::Preparing, 0.0, None);

        let mut scope = match &self.config.render.temp_dir {
            Some(dir) => {
                std::fs::create_dir_all(dir)?;
                TempScope::new_in(dir)?
            }
            None => TempScope::new()?,
        };

        let start = Instant::now();
        let result = self
            .render_in_scope(edit, &mut scope, &mut tracker, cancel)
            .await;
        scope.cleanup();

        match &result {
            Ok(path) => {
                tracker.complete();
                tracing::info!(
                    output = %path.display(),
                    elapsed_secs = start.elapsed().as_secs_f64(),
                    "Render complete"
                );
            }
            Err(e) => tracing::warn!(error = %e, retryable = e.is_retryable(), "Render failed"),
        }
        result
    }

    async fn render_in_scope(
        &self,
        edit: &EditSpec,
        scope: &mut TempScope,
        tracker: &mut ProgressTracker,
        mut cancel: Option<CancelSignal>,
    ) -> ReelcutResult<PathBuf> {
        let plan = tokio::select! {
            biased;
            _ = wait_cancelled(&mut cancel) => return Err(ReelcutError::Cancelled),
            plan = self.prepare(edit, scope, tracker) => plan?,
        };

        if let Some(parent) = plan.output_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        if let Err(err) = self.run_encoder(&plan, tracker, &mut cancel).await {
            discard_partial_output(&plan.output_path);
            return Err(err);
        }
        Ok(plan.output_path)
    }

    async fn prepare(
        &self,
        edit: &EditSpec,
        scope: &mut TempScope,
        tracker: &mut ProgressTracker,
    ) -> ReelcutResult<RenderPlan> {
        let clip = ClipSpec::from_edit(edit)?;
        if !clip.source_path.exists() {
            return Err(ReelcutError::FileNotFound {
                path: clip.source_path.clone(),
            });
        }
        let missing = edit.validate_sources();
        if !missing.is_empty() {
            return Err(ReelcutError::graph(missing.join("; ")));
        }

        let defaults = &self.config.render;
        let output_path = edit.output_path.clone().unwrap_or_else(|| {
            derive_output_path(
                &clip.source_path,
                clip.target_format,
                defaults.output_dir.as_deref(),
                Utc::now(),
            )
        });

        let probe = probe_or_default(defaults, &clip.source_path).await;
        tracker.report(RenderStage::Probing, PROBED_PERCENT, None);

        let subjects = if clip.subject_framing {
            tracker.report(RenderStage::Locating, LOCATING_PERCENT, None);
            let midpoint = clip.trim_start_ms + clip.source_span_ms() / 2;
            self.locator
                .locate(
                    &clip.source_path,
                    midpoint,
                    clip.subject_count,
                    (probe.width, probe.height),
                    scope,
                )
                .await
        } else {
            Vec::new()
        };

        let sticker_paths = clip
            .stickers
            .iter()
            .map(|sticker| match &sticker.source {
                StickerSource::Path(path) => Ok(path.clone()),
                StickerSource::DataUrl(url) => {
                    let (bytes, extension) = decode_data_url(url)?;
                    scope.write("sticker", extension, bytes)
                }
            })
            .collect::<ReelcutResult<Vec<_>>>()?;

        let subtitles = SubtitleTrackBuilder::for_clip(&clip)?;
        let subtitle_path = if subtitles.is_empty() {
            None
        } else {
            let path = scope.allocate("captions", "ass");
            subtitles.save(&path)?;
            tracing::debug!(cues = subtitles.cues.len(), path = %path.display(), "Wrote subtitle track");
            Some(path)
        };

        let assets = RenderAssets {
            subtitle_path,
            fonts_dir: defaults.fonts_dir.clone(),
            sticker_paths,
            sfx_path: clip.sfx_path.clone().or_else(|| defaults.sfx_path.clone()),
            auto_zoom_max: defaults.auto_zoom_max,
        };

        let program = compile_program(&clip, &probe, &subjects, &assets)?;
        let encoder = select_encoder(defaults).await;
        let args = program.ffmpeg_args(&codec_args(encoder, defaults), &output_path);
        tracker.report(RenderStage::Compiling, COMPILED_PERCENT, None);

        tracing::info!(
            source = %clip.source_path.display(),
            output = %output_path.display(),
            format = %clip.target_format,
            duration_ms = clip.duration_ms,
            encoder = encoder.codec_name(),
            subjects = subjects.len(),
            probed = probe.probed,
            "Render planned"
        );

        Ok(RenderPlan {
            clip,
            probe,
            subjects,
            program,
            encoder,
            output_path,
            args,
        })
    }

    async fn run_encoder(
        &self,
        plan: &RenderPlan,
        tracker: &mut ProgressTracker,
        cancel: &mut Option<CancelSignal>,
    ) -> ReelcutResult<()> {
        let ffmpeg = &self.config.render.ffmpeg_path;
        tracing::debug!(args = ?plan.args, "Running encoder");

        let mut child = Command::new(ffmpeg)
            .args(&plan.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                ReelcutError::encode(format!("Failed to start {}", ffmpeg.display()), e.to_string())
            })?;
        tracing::info!(pid = child.id(), args_len = plan.args.len(), "Encoder started");

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| ReelcutError::encode("Failed to capture encoder stdout", ""))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| ReelcutError::encode("Failed to capture encoder stderr", ""))?;

        // Drain stderr concurrently so the encoder never blocks on a full pipe.
        let stderr_task = tokio::spawn(async move {
            let mut output = String::new();
            match BufReader::new(stderr).read_to_string(&mut output).await {
                Ok(_) => output,
                Err(err) => format!("<failed to read encoder stderr: {err}>"),
            }
        });

        let start = Instant::now();
        let expected_secs = plan.program.duration_ms as f64 / 1000.0;
        let mut lines = BufReader::new(stdout).lines();
        let mut state = EncodeProgress::default();
        let mut last_out_time = 0.0f64;
        let mut last_advance = Instant::now();

        let status = loop {
            tokio::select! {
                line = lines.next_line() => match line {
                    Ok(Some(line)) => {
                        let Some((key, value)) = line.trim().split_once('=') else {
                            continue;
                        };
                        state.update(key, value);
                        if key != "progress" {
                            continue;
                        }
                        if state.out_time_secs > last_out_time + 0.001 {
                            last_out_time = state.out_time_secs;
                            last_advance = Instant::now();
                        } else if last_advance.elapsed().as_secs() >= STALL_WARN_SECS {
                            tracing::warn!(
                                out_time_secs = state.out_time_secs,
                                elapsed_secs = start.elapsed().as_secs_f64(),
                                "No encoder progress for {STALL_WARN_SECS}s"
                            );
                            last_advance = Instant::now();
                        }
                        let ratio = state.ratio(expected_secs);
                        tracker.report(
                            RenderStage::Encoding,
                            encode_percent(ratio),
                            estimate_eta(start.elapsed().as_secs_f64(), ratio),
                        );
                    }
                    Ok(None) => {
                        break child.wait().await.map_err(|e| {
                            ReelcutError::encode("Failed to wait on encoder", e.to_string())
                        })?;
                    }
                    Err(e) => {
                        return Err(ReelcutError::encode(
                            "Failed reading encoder progress",
                            e.to_string(),
                        ));
                    }
                },
                _ = wait_cancelled(cancel) => {
                    if let Err(e) = child.kill().await {
                        tracing::warn!(error = %e, "Failed to kill encoder");
                    }
                    stderr_task.abort();
                    tracing::info!("Render cancelled; encoder stopped");
                    return Err(ReelcutError::Cancelled);
                }
            }
        };

        let diagnostics = stderr_task
            .await
            .unwrap_or_else(|_| "<failed to join stderr reader>".to_string());

        if !status.success() {
            return Err(ReelcutError::encode(
                format!("Encoder exited with {status}"),
                diagnostics.trim(),
            ));
        }
        if !plan.output_path.exists() {
            return Err(ReelcutError::encode(
                "Encoder reported success but wrote no output",
                diagnostics.trim(),
            ));
        }

        tracing::debug!(
            elapsed_secs = start.elapsed().as_secs_f64(),
            out_time_secs = state.out_time_secs,
            "Encoder finished"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_derive_output_path() {
        let now = Utc.with_ymd_and_hms(2026, 3, 4, 5, 6, 7).unwrap();
        let path = derive_output_path(
            Path::new("/media/talk.mov"),
            TargetFormat::Portrait9x16,
            None,
            now,
        );
        assert_eq!(path, PathBuf::from("/media/talk_9x16_20260304T050607Z.mp4"));

        let path = derive_output_path(
            Path::new("talk.mov"),
            TargetFormat::Square1x1,
            Some(Path::new("/out")),
            now,
        );
        assert_eq!(path, PathBuf::from("/out/talk_1x1_20260304T050607Z.mp4"));
    }

    #[test]
    fn test_decode_data_url() {
        let (bytes, ext) = decode_data_url("data:image/png;base64,aGVsbG8=").unwrap();
        assert_eq!(bytes, b"hello");
        assert_eq!(ext, "png");
        assert_eq!(decode_data_url("data:image/jpeg;base64,aGk=").unwrap().1, "jpg");
        assert!(decode_data_url("data:text/plain;base64,aGk=").is_err());
        assert!(decode_data_url("data:image/png;base64,***").is_err());
    }

    #[tokio::test]
    async fn test_cancel_signal() {
        let (handle, mut signal) = cancel_pair();
        let other = handle.signal();
        assert!(!signal.is_cancelled());
        handle.cancel();
        signal.cancelled().await;
        assert!(signal.is_cancelled());
        assert!(other.is_cancelled());
    }
}
