//! Render progress reporting.

use serde::Serialize;

/// Percent reached once the source is probed.
pub const PROBED_PERCENT: f64 = 5.0;
/// Percent reported when subject location starts.
pub const LOCATING_PERCENT: f64 = 7.0;
/// Percent reached once the program is compiled; encoding starts here.
pub const COMPILED_PERCENT: f64 = 10.0;
/// Encoding never reports beyond this until the output is confirmed.
pub const ENCODE_CEILING: f64 = 99.0;

/// Progress callback handed to [`crate::Renderer::render`].
pub type ProgressCallback = Box<dyn Fn(RenderProgress) + Send + Sync>;

/// One progress event.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RenderProgress {
    /// Percent complete, 0 to 100.
    pub percent: f64,
    pub stage: RenderStage,
    /// Estimated seconds remaining, known only while encoding.
    pub eta_secs: Option<f64>,
}

/// Stages of a render.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RenderStage {
    Preparing,
    Probing,
    Locating,
    Compiling,
    Encoding,
    Complete,
}

/// Forwards events to a callback, dropping any that would move backwards.
pub struct ProgressTracker {
    callback: Option<ProgressCallback>,
    last: Option<f64>,
}

impl ProgressTracker {
    pub fn new(callback: Option<ProgressCallback>) -> Self {
        Self {
            callback,
            last: None,
        }
    }

    /// Report `percent` (clamped to 0..=100). Returns whether the event was
    /// forwarded.
    pub fn report(&mut self, stage: RenderStage, percent: f64, eta_secs: Option<f64>) -> bool {
        let percent = if percent.is_finite() {
            percent.clamp(0.0, 100.0)
        } else {
            return false;
        };
        if self.last.is_some_and(|last| percent <= last) {
            return false;
        }
        self.last = Some(percent);
        if let Some(callback) = &self.callback {
            callback(RenderProgress {
                percent,
                stage,
                eta_secs,
            });
        }
        true
    }

    /// Final 100% event.
    pub fn complete(&mut self) {
        self.report(RenderStage::Complete, 100.0, Some(0.0));
    }
}

/// Accumulated `-progress pipe:1` key/value state.
#[derive(Debug, Default, Clone, Copy)]
pub struct EncodeProgress {
    pub out_time_secs: f64,
    pub complete: bool,
}

impl EncodeProgress {
    pub fn update(&mut self, key: &str, value: &str) {
        match key {
            // Despite the name, out_time_ms is reported in microseconds.
            "out_time_ms" | "out_time_us" => {
                if let Ok(us) = value.parse::<f64>() {
                    self.out_time_secs = us / 1_000_000.0;
                }
            }
            "progress" => {
                self.complete = value == "end";
            }
            _ => {}
        }
    }

    /// Fraction of `expected_secs` encoded so far.
    pub fn ratio(&self, expected_secs: f64) -> f64 {
        if expected_secs <= 0.0 {
            return 0.0;
        }
        (self.out_time_secs / expected_secs).clamp(0.0, 1.0)
    }
}

/// Overall percent for an encode `ratio` in 0..=1.
pub fn encode_percent(ratio: f64) -> f64 {
    let span = ENCODE_CEILING - COMPILED_PERCENT;
    (COMPILED_PERCENT + span * ratio.clamp(0.0, 1.0)).min(ENCODE_CEILING)
}

/// Remaining seconds extrapolated from elapsed time.
pub fn estimate_eta(elapsed_secs: f64, ratio: f64) -> Option<f64> {
    (ratio > 0.0).then(|| ((elapsed_secs / ratio) - elapsed_secs).max(0.0))
}
