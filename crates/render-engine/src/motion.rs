//! Zoom expressions for the motion stage.
//!
//! The zoom factor is a function of clip time `t` (seconds), written as an
//! ffmpeg expression and evaluated per frame by `scale` and `crop`.

use reelcut_edit_model::{ClipKeyframe, ClipSpec};

use crate::graph::Filter;

const EPSILON: f64 = 1e-6;

/// Zoom expression for `clip`, or `None` when the frame is never zoomed.
///
/// Keyframes win over auto zoom. Outside every keyframe window the zoom is
/// `default_zoom`.
pub fn zoom_expr(clip: &ClipSpec, auto_zoom_max: f64) -> Option<String> {
    if !clip.keyframes.is_empty() {
        return Some(keyframe_expr(&clip.keyframes, clip.default_zoom));
    }
    if clip.auto_zoom {
        let base = clip.default_zoom;
        let cap = auto_zoom_max.max(base);
        if cap - base > EPSILON {
            return Some(format!(
                "min({cap:.6},{base:.6}+{delta:.6}*t/{dur:.6})",
                delta = cap - base,
                dur = clip.duration_secs().max(0.001)
            ));
        }
    }
    if (clip.default_zoom - 1.0).abs() > EPSILON {
        return Some(format!("{:.6}", clip.default_zoom));
    }
    None
}

/// Nested `if(between(t,s,e), ramp, tail)` over non-overlapping keyframes.
pub fn keyframe_expr(keyframes: &[ClipKeyframe], default_zoom: f64) -> String {
    let mut ordered: Vec<&ClipKeyframe> = keyframes.iter().collect();
    ordered.sort_by_key(|kf| kf.window.start_ms);

    let mut expr = format!("{default_zoom:.6}");
    for kf in ordered.into_iter().rev() {
        let start = kf.window.start_secs();
        let end = kf.window.end_secs();
        let ramp = format!(
            "{z0:.6}+({delta:.6})*(t-{start:.6})/{dur:.6}",
            z0 = kf.zoom_start,
            delta = kf.zoom_end - kf.zoom_start,
            dur = (end - start).max(1e-4)
        );
        expr = format!("if(between(t,{start:.6},{end:.6}),{ramp},{expr})");
    }
    expr
}

/// Filters that apply `zoom` about the frame center.
///
/// The input pad must be `width`x`height`; the output keeps that size.
pub fn zoom_filters(zoom: &str, width: u32, height: u32) -> Vec<Filter> {
    let scaled_w = zoomed_dimension(width, zoom);
    let scaled_h = zoomed_dimension(height, zoom);
    vec![
        Filter::with_args("scale", format!("w='{scaled_w}':h='{scaled_h}':eval=frame")),
        // crop keeps the in_w/in_h it was configured with, so the offsets are
        // derived from the zoom instead of the (per-frame) input size.
        Filter::with_args(
            "crop",
            format!(
                "w={width}:h={height}:x='({scaled_w}-{width})/2':y='({scaled_h}-{height})/2'"
            ),
        ),
    ]
}

fn zoomed_dimension(size: u32, zoom: &str) -> String {
    format!("trunc({size}*({zoom})/2)*2")
}

#[cfg(test)]
mod tests {
    use super::*;
    use reelcut_edit_model::{ClipWindow, EditSpec, TargetFormat, ZoomKeyframe};

    fn clip(edit: EditSpec) -> ClipSpec {
        ClipSpec::from_edit(&edit).unwrap()
    }

    fn base() -> EditSpec {
        EditSpec::new("/media/in.mp4", 0, 10_000, TargetFormat::Portrait9x16)
    }

    #[test]
    fn test_no_motion_by_default() {
        assert_eq!(zoom_expr(&clip(base()), 1.15), None);
    }

    #[test]
    fn test_constant_default_zoom() {
        let mut edit = base();
        edit.default_zoom = 1.2;
        assert_eq!(zoom_expr(&clip(edit), 1.15).as_deref(), Some("1.200000"));
    }

    #[test]
    fn test_auto_zoom_is_capped_ramp() {
        let mut edit = base();
        edit.auto_zoom = true;
        assert_eq!(
            zoom_expr(&clip(edit), 1.15).as_deref(),
            Some("min(1.150000,1.000000+0.150000*t/10.000000)")
        );
    }

    #[test]
    fn test_keyframes_override_auto_zoom_and_nest_in_order() {
        let mut edit = base();
        edit.auto_zoom = true;
        edit.keyframes = vec![
            ZoomKeyframe {
                start_ms: 5_000,
                end_ms: 6_000,
                zoom_start: 1.5,
                zoom_end: 1.0,
            },
            ZoomKeyframe {
                start_ms: 1_000,
                end_ms: 2_000,
                zoom_start: 1.0,
                zoom_end: 1.5,
            },
        ];
        let expr = zoom_expr(&clip(edit), 1.15).unwrap();
        assert_eq!(
            expr,
            "if(between(t,1.000000,2.000000),1.000000+(0.500000)*(t-1.000000)/1.000000,\
             if(between(t,5.000000,6.000000),1.500000+(-0.500000)*(t-5.000000)/1.000000,1.000000))"
        );
    }

    #[test]
    fn test_gap_falls_back_to_default_zoom() {
        let kf = ClipKeyframe {
            window: ClipWindow {
                start_ms: 0,
                end_ms: 500,
            },
            zoom_start: 1.0,
            zoom_end: 2.0,
        };
        let expr = keyframe_expr(&[kf], 1.1);
        assert!(expr.ends_with(",1.100000)"));
    }

    #[test]
    fn test_zoom_filters_quote_expression() {
        let filters = zoom_filters("1.2", 1080, 1920);
        assert_eq!(
            filters[0].to_string(),
            "scale=w='trunc(1080*(1.2)/2)*2':h='trunc(1920*(1.2)/2)*2':eval=frame"
        );
        assert_eq!(
            filters[1].to_string(),
            "crop=w=1080:h=1920:x='(trunc(1080*(1.2)/2)*2-1080)/2':y='(trunc(1920*(1.2)/2)*2-1920)/2'"
        );
    }

    #[test]
    fn test_crop_offsets_follow_the_zoom_over_time() {
        let kf = ClipKeyframe {
            window: ClipWindow {
                start_ms: 1_000,
                end_ms: 2_000,
            },
            zoom_start: 1.0,
            zoom_end: 1.5,
        };
        let expr = keyframe_expr(&[kf], 1.0);
        let filters = zoom_filters(&expr, 1080, 1920);
        let crop = filters[1].to_string();

        let x = crop
            .split(":x='")
            .nth(1)
            .and_then(|rest| rest.split('\'').next())
            .unwrap();
        assert!(x.contains("between(t,"), "x offset is constant: {x}");
        assert!(x.contains(&format!("trunc(1080*({expr})/2)*2")));
        assert!(crop.contains(&format!(":y='(trunc(1920*({expr})/2)*2-1920)/2'")));
    }
}
