//! Reelcut Subject Locator
//!
//! Best-effort detection of who to keep in frame. Tiers run one after
//! another and the first usable answer wins:
//!
//! 1. **Vision:** remote classifier, only when a credential is configured
//! 2. **Heuristic:** per-column luminance variance of a downscaled still
//! 3. **Fallback:** evenly spaced centers, always succeeds
//!
//! Failures inside a tier are logged and absorbed; [`SubjectLocator::locate`]
//! always returns exactly `count` regions ordered left to right.

pub mod frame;
pub mod heuristic;
pub mod locator;
pub mod vision;

pub use frame::{extract_still, FrameSample};
pub use heuristic::HeuristicTier;
pub use locator::{CenterFallback, LocatorTier, SubjectLocator};
pub use vision::{parse_vision_response, VisionTier};
