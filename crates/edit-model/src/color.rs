//! Color grading controls.

use serde::{Deserialize, Serialize};

/// Combined color adjustment. Every field has a neutral value; a filter
/// whose fields are all neutral compiles to nothing.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ColorFilter {
    /// Additive brightness in `[-1, 1]`. Neutral 0.
    pub brightness: f64,
    /// Contrast multiplier in `[0, 3]`. Neutral 1.
    pub contrast: f64,
    /// Saturation multiplier in `[0, 3]`. Neutral 1.
    pub saturation: f64,
    /// Hue rotation in degrees, `[-180, 180]`. Neutral 0.
    pub hue: f64,
    /// Warm (+) / cool (-) shift in `[-1, 1]`. Neutral 0.
    pub temperature: f64,
    /// Vignette strength in `[0, 1]`. Neutral 0.
    pub vignette: f64,
}

impl Default for ColorFilter {
    fn default() -> Self {
        Self::NEUTRAL
    }
}

const EPSILON: f64 = 1e-6;

impl ColorFilter {
    pub const NEUTRAL: ColorFilter = ColorFilter {
        brightness: 0.0,
        contrast: 1.0,
        saturation: 1.0,
        hue: 0.0,
        temperature: 0.0,
        vignette: 0.0,
    };

    /// Whether the exposure controls (brightness/contrast/saturation) differ from neutral.
    pub fn has_exposure(&self) -> bool {
        differs(self.brightness, 0.0) || differs(self.contrast, 1.0) || differs(self.saturation, 1.0)
    }

    pub fn has_hue(&self) -> bool {
        differs(self.hue, 0.0)
    }

    pub fn has_temperature(&self) -> bool {
        differs(self.temperature, 0.0)
    }

    pub fn has_vignette(&self) -> bool {
        differs(self.vignette, 0.0)
    }

    /// True when the filter would not change any pixel.
    pub fn is_neutral(&self) -> bool {
        !self.has_exposure() && !self.has_hue() && !self.has_temperature() && !self.has_vignette()
    }

    /// Range check. Returns the name and value of the first offending field.
    pub fn out_of_range(&self) -> Option<(&'static str, f64)> {
        let checks = [
            ("brightness", self.brightness, -1.0, 1.0),
            ("contrast", self.contrast, 0.0, 3.0),
            ("saturation", self.saturation, 0.0, 3.0),
            ("hue", self.hue, -180.0, 180.0),
            ("temperature", self.temperature, -1.0, 1.0),
            ("vignette", self.vignette, 0.0, 1.0),
        ];
        checks
            .into_iter()
            .find(|(_, value, min, max)| !value.is_finite() || value < min || value > max)
            .map(|(name, value, _, _)| (name, value))
    }

    /// Color temperature in Kelvin for the temperature shift.
    /// -1 maps to 10000K (cool), +1 to 3000K (warm).
    pub fn kelvin(&self) -> f64 {
        6500.0 - self.temperature * 3500.0
    }
}

fn differs(value: f64, neutral: f64) -> bool {
    (value - neutral).abs() > EPSILON
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_neutral() {
        assert!(ColorFilter::default().is_neutral());
        assert!(ColorFilter::default().out_of_range().is_none());
    }

    #[test]
    fn test_single_field_breaks_neutrality() {
        let filter = ColorFilter {
            vignette: 0.3,
            ..ColorFilter::NEUTRAL
        };
        assert!(!filter.is_neutral());
        assert!(filter.has_vignette());
        assert!(!filter.has_exposure());
    }

    #[test]
    fn test_out_of_range_reports_field() {
        let filter = ColorFilter {
            saturation: 4.0,
            ..ColorFilter::NEUTRAL
        };
        assert_eq!(filter.out_of_range(), Some(("saturation", 4.0)));

        let nan = ColorFilter {
            hue: f64::NAN,
            ..ColorFilter::NEUTRAL
        };
        assert_eq!(nan.out_of_range().map(|(name, _)| name), Some("hue"));
    }

    #[test]
    fn test_kelvin_mapping() {
        let warm = ColorFilter {
            temperature: 1.0,
            ..ColorFilter::NEUTRAL
        };
        let cool = ColorFilter {
            temperature: -1.0,
            ..ColorFilter::NEUTRAL
        };
        assert!((warm.kelvin() - 3000.0).abs() < 1e-9);
        assert!((cool.kelvin() - 10000.0).abs() < 1e-9);
    }
}
