//! Remote vision classifier tier.

use std::time::Duration;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use reelcut_common::{ReelcutError, ReelcutResult, VisionConfig};
use reelcut_edit_model::{LocateMethod, SubjectRegion};
use serde::{Deserialize, Serialize};

use crate::frame::FrameSample;
use crate::locator::LocatorTier;

const TIER: &str = "vision";

/// Confidence assigned when the endpoint omits one.
const DEFAULT_CONFIDENCE: f64 = 1.0;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct VisionRequest<'a> {
    model: &'a str,
    count: usize,
    instruction: String,
    image: VisionImage,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct VisionImage {
    media_type: &'static str,
    data: String,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum VisionResponse {
    Wrapped { subjects: Vec<VisionSubject> },
    Bare(Vec<VisionSubject>),
}

#[derive(Debug, Deserialize)]
struct VisionSubject {
    x: f64,
    y: f64,
    #[serde(default)]
    confidence: Option<f64>,
}

fn instruction(count: usize) -> String {
    format!(
        "Locate the {count} most prominent subject(s) in this frame. \
         Reply with JSON only: {{\"subjects\":[{{\"x\":0.0,\"y\":0.0,\"confidence\":0.0}}]}} \
         where x and y are the subject centers normalized to 0..1. \
         Order the subjects left to right by x."
    )
}

/// Strictly parse a classifier reply into source-pixel regions.
///
/// Non-JSON bodies, empty lists, and coordinates outside `[0, 1]` are all
/// tier failures.
pub fn parse_vision_response(
    body: &str,
    source_width: u32,
    source_height: u32,
) -> ReelcutResult<Vec<SubjectRegion>> {
    let response: VisionResponse = serde_json::from_str(body.trim())
        .map_err(|e| ReelcutError::locator_tier(TIER, format!("malformed response: {e}")))?;
    let subjects = match response {
        VisionResponse::Wrapped { subjects } => subjects,
        VisionResponse::Bare(subjects) => subjects,
    };
    if subjects.is_empty() {
        return Err(ReelcutError::locator_tier(TIER, "response contained no subjects"));
    }

    subjects
        .into_iter()
        .enumerate()
        .map(|(i, subject)| {
            let confidence = subject.confidence.unwrap_or(DEFAULT_CONFIDENCE);
            for (name, value) in [("x", subject.x), ("y", subject.y), ("confidence", confidence)] {
                if !value.is_finite() || !(0.0..=1.0).contains(&value) {
                    return Err(ReelcutError::locator_tier(
                        TIER,
                        format!("subject {i} has invalid {name}: {value}"),
                    ));
                }
            }
            Ok(SubjectRegion {
                center_x: subject.x * source_width as f64,
                center_y: subject.y * source_height as f64,
                confidence,
                method: LocateMethod::Vision,
            })
        })
        .collect()
}

/// Tier backed by an HTTP vision classifier.
pub struct VisionTier {
    client: reqwest::Client,
    endpoint: String,
    model: String,
    api_key: String,
}

impl VisionTier {
    /// Build the tier, or `None` when no credential is configured.
    pub fn from_config(config: &VisionConfig) -> Option<Self> {
        let api_key = config.credential()?;
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs.max(1)))
            .build()
            .map_err(|e| tracing::warn!(error = %e, "Failed to build vision HTTP client"))
            .ok()?;
        Some(Self {
            client,
            endpoint: config.endpoint.clone(),
            model: config.model.clone(),
            api_key,
        })
    }

    async fn classify(&self, frame: &FrameSample, count: usize) -> ReelcutResult<Vec<SubjectRegion>> {
        let still = frame
            .still
            .as_ref()
            .ok_or_else(|| ReelcutError::locator_tier(TIER, "no still frame available"))?;
        let bytes = tokio::fs::read(still).await?;

        let request = VisionRequest {
            model: &self.model,
            count,
            instruction: instruction(count),
            image: VisionImage {
                media_type: "image/jpeg",
                data: STANDARD.encode(bytes),
            },
        };

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| ReelcutError::locator_tier(TIER, format!("request failed: {e}")))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| ReelcutError::locator_tier(TIER, format!("unreadable body: {e}")))?;
        if !status.is_success() {
            return Err(ReelcutError::locator_tier(
                TIER,
                format!("endpoint returned {status}: {}", body.trim()),
            ));
        }

        parse_vision_response(&body, frame.source_width, frame.source_height)
    }
}

#[async_trait]
impl LocatorTier for VisionTier {
    fn method(&self) -> LocateMethod {
        LocateMethod::Vision
    }

    async fn locate(&self, frame: &FrameSample, count: usize) -> Option<Vec<SubjectRegion>> {
        match self.classify(frame, count).await {
            Ok(regions) => Some(regions),
            Err(e) => {
                tracing::warn!(error = %e, "Vision tier failed");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parses_wrapped_response() {
        let body = r#"{"subjects":[{"x":0.25,"y":0.5,"confidence":0.8},{"x":0.75,"y":0.4}]}"#;
        let regions = parse_vision_response(body, 1920, 1080).unwrap();
        assert_eq!(regions.len(), 2);
        assert!((regions[0].center_x - 480.0).abs() < 1e-9);
        assert!((regions[0].center_y - 540.0).abs() < 1e-9);
        assert!((regions[0].confidence - 0.8).abs() < 1e-9);
        assert_eq!(regions[1].confidence, DEFAULT_CONFIDENCE);
        assert!(regions.iter().all(|r| r.method == LocateMethod::Vision));
    }

    #[test]
    fn test_parses_bare_array() {
        let regions = parse_vision_response(r#"[{"x":0.5,"y":0.5}]"#, 1000, 500).unwrap();
        assert!((regions[0].center_x - 500.0).abs() < 1e-9);
    }

    #[test]
    fn test_rejects_malformed_bodies() {
        for body in [
            "I think the subject is on the left",
            r#"{"subjects":[]}"#,
            r#"{"subjects":[{"x":1.5,"y":0.5}]}"#,
            r#"{"subjects":[{"x":0.5}]}"#,
            r#"{"subjects":[{"x":0.5,"y":0.5,"confidence":-0.1}]}"#,
        ] {
            let err = parse_vision_response(body, 1920, 1080).unwrap_err();
            assert!(
                matches!(err, ReelcutError::LocatorTier { .. }),
                "body {body:?} should fail the tier"
            );
        }
    }

    #[test]
    fn test_instruction_mentions_order_and_count() {
        let text = instruction(2);
        assert!(text.contains("2 most prominent"));
        assert!(text.contains("left to right"));
    }
}
