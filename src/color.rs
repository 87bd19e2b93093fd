//! RGB ↔ HSV conversion.
//!
//! Hue is measured in degrees [0, 360), saturation and value in [0, 1].
//! A fully desaturated color has no meaningful hue; `rgb_to_hsv` returns
//! `None` for it and callers are expected to retain whatever hue they were
//! last holding (the brush relies on this to keep its hue slider stable
//! while the color passes through gray).

/// Convert normalized RGB (each channel in [0, 1]) to HSV.
///
/// Returns `(hue, saturation, value)`. `hue` is `None` when saturation is
/// zero — there is no hue to report for a neutral color.
pub fn rgb_to_hsv(r: f32, g: f32, b: f32) -> (Option<f32>, f32, f32) {
    let max = r.max(g).max(b);
    let min = r.min(g).min(b);

    let val = max;
    let sat = if max != 0.0 { (max - min) / max } else { 0.0 };

    if sat == 0.0 {
        return (None, sat, val);
    }

    let d = max - min;
    let mut hue = if r == max {
        (g - b) / d
    } else if g == max {
        2.0 + (b - r) / d
    } else {
        4.0 + (r - g) / d
    };
    hue *= 60.0;
    if hue < 0.0 {
        hue += 360.0;
    }
    (Some(hue), sat, val)
}

/// Convert HSV to normalized RGB.
///
/// A hue of exactly 360° is treated as 0° (sector 0); saturation 0 yields
/// the gray `(v, v, v)` regardless of hue.
pub fn hsv_to_rgb(hue: f32, sat: f32, val: f32) -> (f32, f32, f32) {
    if sat == 0.0 {
        return (val, val, val);
    }

    let hue = if hue == 360.0 { 0.0 } else { hue };
    let h = hue / 60.0;
    let sector = h as i32;
    let f = h - sector as f32;
    let p = val * (1.0 - sat);
    let q = val * (1.0 - sat * f);
    let t = val * (1.0 - sat * (1.0 - f));
    match sector {
        0 => (val, t, p),
        1 => (q, val, p),
        2 => (p, val, t),
        3 => (p, q, val),
        4 => (t, p, val),
        _ => (val, p, q),
    }
}

/// 8-bit channel to the normalized [0, 1] range.
pub fn channel_to_f32(c: u8) -> f32 {
    c as f32 / 255.0
}

/// Normalized [0, 1] value back to an 8-bit channel (truncating, matching
/// the brush engine's storage convention).
pub fn f32_to_channel(c: f32) -> u8 {
    (c * 255.0) as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx_eq(a: f32, b: f32, epsilon: f32) -> bool {
        (a - b).abs() < epsilon
    }

    #[test]
    fn green_ramp_reference_value() {
        // RGB (0, 128, 0) is the brush's default color in the original
        // program: hue 120°, full saturation, value 128/255.
        let (h, s, v) = rgb_to_hsv(0.0, 128.0 / 255.0, 0.0);
        assert!(approx_eq(h.unwrap(), 120.0, 1e-3));
        assert!(approx_eq(s, 1.0, 1e-6));
        assert!(approx_eq(v, 128.0 / 255.0, 1e-6));
    }

    #[test]
    fn neutral_color_has_no_hue() {
        let (h, s, v) = rgb_to_hsv(0.5, 0.5, 0.5);
        assert!(h.is_none());
        assert_eq!(s, 0.0);
        assert!(approx_eq(v, 0.5, 1e-6));

        let (h, s, _) = rgb_to_hsv(0.0, 0.0, 0.0);
        assert!(h.is_none());
        assert_eq!(s, 0.0);
    }

    #[test]
    fn zero_saturation_yields_gray() {
        let (r, g, b) = hsv_to_rgb(211.0, 0.0, 0.25);
        assert_eq!((r, g, b), (0.25, 0.25, 0.25));
    }

    #[test]
    fn hue_360_is_sector_zero() {
        // 360° must behave exactly like 0° (pure red at full sat/val),
        // never fall off the end of the sector table.
        let (r0, g0, b0) = hsv_to_rgb(0.0, 1.0, 1.0);
        let (r6, g6, b6) = hsv_to_rgb(360.0, 1.0, 1.0);
        assert_eq!((r0, g0, b0), (r6, g6, b6));
        assert_eq!((r0, g0, b0), (1.0, 0.0, 0.0));
    }

    #[test]
    fn negative_sector_wraps_into_range() {
        // Magenta-ish colors produce a negative pre-wrap hue.
        let (h, _, _) = rgb_to_hsv(1.0, 0.0, 0.5);
        let h = h.unwrap();
        assert!((0.0..360.0).contains(&h));
        assert!(approx_eq(h, 330.0, 1e-3));
    }

    #[test]
    fn round_trip_preserves_rgb() {
        let samples = [
            (1.0, 0.0, 0.0),
            (0.0, 1.0, 0.0),
            (0.0, 0.0, 1.0),
            (1.0, 1.0, 0.0),
            (0.3, 0.7, 0.2),
            (0.9, 0.1, 0.55),
            (0.01, 0.02, 0.03),
            (1.0, 1.0, 1.0),
        ];
        for (r, g, b) in samples {
            let (h, s, v) = rgb_to_hsv(r, g, b);
            // Hue is defined for every non-neutral sample above.
            let (r2, g2, b2) = hsv_to_rgb(h.unwrap_or(0.0), s, v);
            assert!(approx_eq(r, r2, 1e-5), "r: {} vs {}", r, r2);
            assert!(approx_eq(g, g2, 1e-5), "g: {} vs {}", g, g2);
            assert!(approx_eq(b, b2, 1e-5), "b: {} vs {}", b, b2);
        }
    }
}
