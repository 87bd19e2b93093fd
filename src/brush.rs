use crate::canvas::{Canvas, Pixel, Rect};
use crate::color::{channel_to_f32, f32_to_channel, hsv_to_rgb, rgb_to_hsv};
use crate::log_warn;

/// Largest brush edge the editor exposes. The cursor ring table in
/// `cursor.rs` is sized against this.
pub const MAX_BRUSH_EDGE: i32 = 20;

/// How many times the preview stamps a tinting brush, so the swatch looks
/// like the accumulated result of holding the airbrush in place.
const PREVIEW_TINT_PASSES: u32 = 5;

/// Offset of the 1:1 brush swatch in the preview canvas.
const PREVIEW_CORNER: usize = 40;

// ============================================================================
// ALPHA MASK
// ============================================================================

/// Raised-sine weighting over the brush footprint:
/// `sin(pi*x/w) + sin(pi*y/h) - 1`, clamped at zero.
///
/// Zero along the footprint edges, 1.0 at the exact center. Not a Gaussian;
/// the painted falloff of this program is defined by this formula.
pub fn compute_alpha(x: i32, y: i32, brush_w: i32, brush_h: i32) -> f32 {
    let pi = std::f32::consts::PI;
    let fx = pi * x as f32 / brush_w as f32;
    let fy = pi * y as f32 / brush_h as f32;
    let alpha = fx.sin() + fy.sin() - 1.0;
    alpha.max(0.0)
}

// ============================================================================
// BRUSH STATE
// ============================================================================

/// What pressing the pointer button does to the canvas.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum BrushMode {
    /// Overwrite pixels with the brush color.
    #[default]
    Overpaint,
    /// Alpha-blend the brush color into the canvas in HSV space.
    Tint,
    /// Read a canvas color instead of writing.
    Sample,
}

impl BrushMode {
    pub fn label(&self) -> &'static str {
        match self {
            BrushMode::Overpaint => "Overpainting",
            BrushMode::Tint => "Tinting",
            BrushMode::Sample => "Sampling",
        }
    }

    pub fn all() -> &'static [BrushMode] {
        &[BrushMode::Overpaint, BrushMode::Tint, BrushMode::Sample]
    }
}

/// Which HSV channels a tint operation may touch.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ComponentMask {
    pub hue: bool,
    pub sat: bool,
    pub val: bool,
}

impl ComponentMask {
    pub const ALL: ComponentMask = ComponentMask { hue: true, sat: true, val: true };
    pub const NONE: ComponentMask = ComponentMask { hue: false, sat: false, val: false };

    pub fn any(&self) -> bool {
        self.hue || self.sat || self.val
    }
}

impl Default for ComponentMask {
    fn default() -> Self {
        ComponentMask::ALL
    }
}

/// The brush: geometry, color (kept consistent in both RGB and HSV), mode
/// and component mask.
///
/// RGB and HSV are two views of one color. Setting either side converts the
/// other; when the color passes through gray the hue keeps its last defined
/// value so the HSV side never jumps.
#[derive(Clone, Debug)]
pub struct BrushState {
    width: i32,
    height: i32,
    aspect_ratio: f32,
    /// Scales the alpha mask during tinting.
    pub thickness: f32,
    /// Magnification of the preview swatch.
    pub magnification: i32,
    r: u8,
    g: u8,
    b: u8,
    hue: f32,
    sat: f32,
    val: f32,
    mode: BrushMode,
    /// Paint mode that was active when Sample mode was entered. Single
    /// slot: re-entering Sample overwrites it.
    last_paint_mode: BrushMode,
    pub components: ComponentMask,
}

impl Default for BrushState {
    fn default() -> Self {
        let mut brush = BrushState {
            width: 16,
            height: 16,
            aspect_ratio: 1.0,
            thickness: 0.2,
            magnification: 4,
            r: 0,
            g: 0x80,
            b: 0,
            hue: 120.0,
            sat: 1.0,
            val: 0.5,
            mode: BrushMode::Overpaint,
            last_paint_mode: BrushMode::Overpaint,
            components: ComponentMask::ALL,
        };
        brush.sync_hsv_from_rgb();
        brush
    }
}

impl BrushState {
    pub fn width(&self) -> i32 {
        self.width
    }

    pub fn height(&self) -> i32 {
        self.height
    }

    pub fn aspect_ratio(&self) -> f32 {
        self.aspect_ratio
    }

    pub fn rgb(&self) -> (u8, u8, u8) {
        (self.r, self.g, self.b)
    }

    pub fn hsv(&self) -> (f32, f32, f32) {
        (self.hue, self.sat, self.val)
    }

    pub fn color(&self) -> Pixel {
        Pixel::new(self.r, self.g, self.b)
    }

    pub fn mode(&self) -> BrushMode {
        self.mode
    }

    /// Mode the preview swatch should render with: while sampling, the
    /// paint mode that was active before sampling began.
    pub fn preview_mode(&self) -> BrushMode {
        if self.mode == BrushMode::Sample {
            self.last_paint_mode
        } else {
            self.mode
        }
    }

    /// Switch brush mode. Entering Sample records the current paint mode
    /// so the preview keeps rendering with it.
    pub fn set_mode(&mut self, mode: BrushMode) {
        if mode == BrushMode::Sample && self.mode != BrushMode::Sample {
            self.last_paint_mode = self.mode;
        }
        self.mode = mode;
    }

    /// Set the color from the RGB side and re-derive HSV. Hue survives a
    /// transition through gray.
    pub fn set_rgb(&mut self, r: u8, g: u8, b: u8) {
        self.r = r;
        self.g = g;
        self.b = b;
        self.sync_hsv_from_rgb();
    }

    pub fn set_hue(&mut self, hue: f32) {
        self.hue = hue.clamp(0.0, 360.0) % 360.0;
        self.sync_rgb_from_hsv();
    }

    pub fn set_sat(&mut self, sat: f32) {
        self.sat = sat.clamp(0.0, 1.0);
        self.sync_rgb_from_hsv();
    }

    pub fn set_val(&mut self, val: f32) {
        self.val = val.clamp(0.0, 1.0);
        self.sync_rgb_from_hsv();
    }

    /// Set the brush width; height follows through the aspect ratio.
    pub fn set_size(&mut self, size: i32) {
        self.width = size.clamp(1, MAX_BRUSH_EDGE);
        self.height = ((self.width as f32 / self.aspect_ratio) as i32).clamp(1, MAX_BRUSH_EDGE);
    }

    /// Change the width/height ratio. The sides are first equalized to the
    /// larger one, then the short side is derived from the new ratio.
    pub fn set_aspect_ratio(&mut self, ratio: f32) {
        if ratio <= 0.0 {
            return;
        }
        if self.width < self.height {
            self.width = self.height;
        } else if self.height < self.width {
            self.height = self.width;
        }
        self.aspect_ratio = ratio;
        if ratio < 1.0 {
            self.width = ((self.width as f32 * ratio) as i32).max(1);
        } else if ratio > 1.0 {
            self.height = ((self.height as f32 / ratio) as i32).max(1);
        }
    }

    fn sync_hsv_from_rgb(&mut self) {
        let (h, s, v) = rgb_to_hsv(
            channel_to_f32(self.r),
            channel_to_f32(self.g),
            channel_to_f32(self.b),
        );
        // Neutral color: keep the previous hue.
        if let Some(h) = h {
            self.hue = h;
        }
        self.sat = s;
        self.val = v;
    }

    fn sync_rgb_from_hsv(&mut self) {
        let (r, g, b) = hsv_to_rgb(self.hue, self.sat, self.val);
        self.r = f32_to_channel(r);
        self.g = f32_to_channel(g);
        self.b = f32_to_channel(b);
    }
}

// ============================================================================
// BRUSH ENGINE
// ============================================================================

/// Footprint rectangle of a brush centered on `(x, y)`, clipped to the
/// canvas. `None` when it lies entirely outside.
pub fn footprint(canvas: &Canvas, brush: &BrushState, x: i32, y: i32) -> Option<Rect> {
    let cw = canvas.width() as i32;
    let ch = canvas.height() as i32;
    let lx = x - brush.width() / 2;
    if lx >= cw {
        return None;
    }
    let rx = lx + brush.width();
    if rx <= 0 {
        return None;
    }
    let by = y - brush.height() / 2;
    if by >= ch {
        return None;
    }
    let ty = by + brush.height();
    if ty <= 0 {
        return None;
    }
    let rect = Rect::new(
        lx.max(0) as usize,
        by.max(0) as usize,
        rx.min(cw) as usize,
        ty.min(ch) as usize,
    );
    if rect.is_empty() { None } else { Some(rect) }
}

/// Apply the brush to the canvas at pointer position `(x, y)`.
///
/// Returns the touched rectangle, or `None` when nothing was painted
/// (Sample mode, or a footprint entirely off-canvas). A tint request with
/// an empty component mask paints like Overpaint.
pub fn apply_brush(canvas: &mut Canvas, brush: &BrushState, x: i32, y: i32) -> Option<Rect> {
    if brush.mode() == BrushMode::Sample {
        return None;
    }
    apply_brush_as(canvas, brush, brush.mode(), x, y)
}

/// Apply the brush with an explicit mode, independent of `brush.mode()`.
/// Used by the preview, which renders with the remembered paint mode while
/// the user is sampling.
pub fn apply_brush_as(
    canvas: &mut Canvas,
    brush: &BrushState,
    mode: BrushMode,
    x: i32,
    y: i32,
) -> Option<Rect> {
    let rect = footprint(canvas, brush, x, y)?;
    if mode == BrushMode::Tint && brush.components.any() {
        tint_region(canvas, brush, x, y, rect);
    } else {
        overpaint_region(canvas, brush, rect);
    }
    Some(rect)
}

/// Unconditionally set every pixel in `rect` to the brush color.
fn overpaint_region(canvas: &mut Canvas, brush: &BrushState, rect: Rect) {
    let color = brush.color();
    for y in rect.y0..rect.y1 {
        for x in rect.x0..rect.x1 {
            canvas.set(x, y, color);
        }
    }
}

/// Alpha-blend the brush into `rect`. `(ox, oy)` is the unclipped brush
/// origin; local mask coordinates are measured from the footprint's
/// top-left corner, so a clipped stamp keeps its spatial falloff.
fn tint_region(canvas: &mut Canvas, brush: &BrushState, ox: i32, oy: i32, rect: Rect) {
    let (br_hue, br_sat, br_val) = brush.hsv();
    let lx = ox - brush.width() / 2;
    let by = oy - brush.height() / 2;

    for y in rect.y0..rect.y1 {
        let local_y = y as i32 - by;
        for x in rect.x0..rect.x1 {
            let local_x = x as i32 - lx;
            let alpha =
                brush.thickness * compute_alpha(local_x, local_y, brush.width(), brush.height());
            let tinted = tint_pixel(
                br_hue,
                br_sat,
                br_val,
                brush.components,
                alpha,
                canvas.get(x, y),
            );
            canvas.set(x, y, tinted);
        }
    }
}

/// Blend one canvas pixel toward the brush color in HSV space.
fn tint_pixel(
    br_hue: f32,
    br_sat: f32,
    br_val: f32,
    components: ComponentMask,
    alpha: f32,
    pixel: Pixel,
) -> Pixel {
    let (h, mut ss, mut vv) = rgb_to_hsv(
        channel_to_f32(pixel.r),
        channel_to_f32(pixel.g),
        channel_to_f32(pixel.b),
    );
    // A neutral canvas pixel has no hue of its own; it takes the brush's.
    let mut hh = h.unwrap_or(br_hue);

    if components.hue && br_sat != 0.0 {
        if h.is_some() {
            // Interpolate along the shorter arc of the hue circle.
            let mut target = br_hue;
            if hh < target && target - hh > 180.0 {
                target -= 360.0;
            } else if hh > target && hh - target > 180.0 {
                hh -= 360.0;
            }
            hh = (1.0 - alpha) * hh + alpha * target;
            if hh < 0.0 {
                hh += 360.0;
            }
        }
        // Otherwise hh is already the brush hue.
    }
    // A neutral pixel must stay neutral unless a hue change was requested,
    // no matter how saturated the brush is.
    if components.sat && (ss != 0.0 || components.hue) {
        ss = (1.0 - alpha) * ss + alpha * br_sat;
    }
    if components.val {
        vv = (1.0 - alpha) * vv + alpha * br_val;
    }

    let (rr, gg, bb) = hsv_to_rgb(hh, ss, vv);
    if !(0.0..=1.0).contains(&rr) || !(0.0..=1.0).contains(&gg) || !(0.0..=1.0).contains(&bb) {
        // Rounding can push a blend fractionally past the boundary; worth
        // a diagnostic, never worth aborting a stroke.
        log_warn!(
            "tint produced out-of-range rgb ({:.4}, {:.4}, {:.4}) from hsv ({:.1}, {:.3}, {:.3})",
            rr,
            gg,
            bb,
            hh,
            ss,
            vv
        );
    }
    Pixel::new(
        f32_to_channel(rr.clamp(0.0, 1.0)),
        f32_to_channel(gg.clamp(0.0, 1.0)),
        f32_to_channel(bb.clamp(0.0, 1.0)),
    )
}

// ============================================================================
// PREVIEW SWATCH
// ============================================================================

/// Render the brush preview into its own canvas: backdrop fill, a stamped
/// footprint at the center, a 1:1 copy near the top-left corner, and a
/// magnified blow-up over the center.
///
/// While the user is sampling, the swatch renders with the remembered
/// paint mode and the sampled backdrop color, showing what the brush
/// would do to that color.
pub fn render_preview(preview: &mut Canvas, brush: &BrushState, backdrop: Pixel) {
    preview.fill(backdrop);

    let ox = preview.width() as i32 / 2;
    let oy = preview.height() as i32 / 2;
    let mode = brush.preview_mode();

    if mode == BrushMode::Tint && brush.components.any() {
        // Repeated stamps approximate what holding the airbrush does.
        for _ in 0..PREVIEW_TINT_PASSES {
            apply_brush_as(preview, brush, BrushMode::Tint, ox, oy);
        }
    } else {
        apply_brush_as(preview, brush, BrushMode::Overpaint, ox, oy);
    }

    let Some(stamp) = footprint(preview, brush, ox, oy) else {
        return;
    };
    let bw = stamp.width();
    let bh = stamp.height();
    let mut stamp_pixels = Vec::with_capacity(bw * bh);
    for y in stamp.y0..stamp.y1 {
        for x in stamp.x0..stamp.x1 {
            stamp_pixels.push(preview.get(x, y));
        }
    }

    // 1:1 swatch in the corner.
    for j in 0..bh {
        for i in 0..bw {
            let (x, y) = (PREVIEW_CORNER + i, PREVIEW_CORNER + j);
            if x < preview.width() && y < preview.height() {
                preview.set(x, y, stamp_pixels[j * bw + i]);
            }
        }
    }

    // Magnified swatch centered on the canvas.
    let m = brush.magnification.max(1) as usize;
    let x0 = (preview.width().saturating_sub(bw * m)) / 2;
    let y0 = (preview.height().saturating_sub(bh * m)) / 2;
    for j in 0..bh {
        for i in 0..bw {
            let p = stamp_pixels[j * bw + i];
            for mj in 0..m {
                for mi in 0..m {
                    let (x, y) = (x0 + i * m + mi, y0 + j * m + mj);
                    if x < preview.width() && y < preview.height() {
                        preview.set(x, y, p);
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx_eq(a: f32, b: f32, epsilon: f32) -> bool {
        (a - b).abs() < epsilon
    }

    fn tint_brush(thickness: f32) -> BrushState {
        let mut b = BrushState::default();
        b.set_mode(BrushMode::Tint);
        b.thickness = thickness;
        b
    }

    // ── alpha mask ──────────────────────────────────────────────────────

    #[test]
    fn alpha_is_never_negative() {
        for y in -4..24 {
            for x in -4..24 {
                assert!(compute_alpha(x, y, 16, 16) >= 0.0);
            }
        }
    }

    #[test]
    fn alpha_at_origin_is_zero() {
        for size in [1, 2, 7, 16, 20] {
            assert_eq!(compute_alpha(0, 0, size, size), 0.0);
        }
    }

    #[test]
    fn alpha_peaks_at_center() {
        // sin(pi/2) + sin(pi/2) - 1 = 1, the formula's maximum.
        let a = compute_alpha(8, 8, 16, 16);
        assert!(approx_eq(a, 1.0, 1e-6));
        assert!(compute_alpha(4, 8, 16, 16) < a);
    }

    // ── brush state ─────────────────────────────────────────────────────

    #[test]
    fn default_brush_color_is_half_green() {
        let b = BrushState::default();
        assert_eq!(b.rgb(), (0, 0x80, 0));
        let (h, s, v) = b.hsv();
        assert!(approx_eq(h, 120.0, 1e-3));
        assert!(approx_eq(s, 1.0, 1e-6));
        assert!(approx_eq(v, 128.0 / 255.0, 1e-6));
    }

    #[test]
    fn hue_survives_passing_through_gray() {
        let mut b = BrushState::default();
        b.set_hue(200.0);
        b.set_rgb(77, 77, 77);
        let (h, s, _) = b.hsv();
        assert_eq!(s, 0.0);
        assert!(approx_eq(h, 200.0, 1e-3));
    }

    #[test]
    fn rgb_follows_hsv_edits() {
        let mut b = BrushState::default();
        b.set_hue(0.0);
        b.set_sat(1.0);
        b.set_val(1.0);
        assert_eq!(b.rgb(), (255, 0, 0));
    }

    #[test]
    fn aspect_ratio_narrows_one_side() {
        let mut b = BrushState::default();
        b.set_size(16);
        b.set_aspect_ratio(0.5);
        assert_eq!((b.width(), b.height()), (8, 16));
        b.set_aspect_ratio(2.0);
        assert_eq!((b.width(), b.height()), (16, 8));
    }

    #[test]
    fn sample_mode_remembers_one_paint_mode() {
        let mut b = BrushState::default();
        b.set_mode(BrushMode::Tint);
        b.set_mode(BrushMode::Sample);
        assert_eq!(b.preview_mode(), BrushMode::Tint);
        // Staying in Sample does not disturb the remembered slot.
        b.set_mode(BrushMode::Sample);
        assert_eq!(b.preview_mode(), BrushMode::Tint);
        // Leaving Sample for a paint mode uses that mode directly.
        b.set_mode(BrushMode::Overpaint);
        assert_eq!(b.preview_mode(), BrushMode::Overpaint);
    }

    // ── engine ──────────────────────────────────────────────────────────

    #[test]
    fn overpaint_replaces_clipped_region() {
        let mut c = Canvas::new(32, 32).unwrap();
        c.fill(Pixel::new(10, 20, 30));
        let b = BrushState::default(); // 16x16 overpaint
        // Centered near the corner: footprint clips to [0,6) x [0,6).
        let rect = apply_brush(&mut c, &b, -2, -2).unwrap();
        assert_eq!(rect, Rect::new(0, 0, 6, 6));
        for y in 0..32 {
            for x in 0..32 {
                let expect = if x < 6 && y < 6 { b.color() } else { Pixel::new(10, 20, 30) };
                assert_eq!(c.get(x, y), expect, "at ({}, {})", x, y);
            }
        }
    }

    #[test]
    fn brush_outside_canvas_is_a_noop() {
        let mut c = Canvas::new(32, 32).unwrap();
        c.fill(Pixel::new(10, 20, 30));
        let b = BrushState::default();
        assert!(apply_brush(&mut c, &b, -100, 16).is_none());
        assert!(apply_brush(&mut c, &b, 16, 500).is_none());
        assert!(c.pixels().iter().all(|p| *p == Pixel::new(10, 20, 30)));
    }

    #[test]
    fn sample_mode_never_mutates() {
        let mut c = Canvas::new(32, 32).unwrap();
        c.fill(Pixel::new(10, 20, 30));
        let mut b = BrushState::default();
        b.set_mode(BrushMode::Sample);
        assert!(apply_brush(&mut c, &b, 16, 16).is_none());
        assert!(c.pixels().iter().all(|p| *p == Pixel::new(10, 20, 30)));
    }

    #[test]
    fn zero_alpha_tint_is_identity() {
        let before = Pixel::new(200, 100, 50);
        let after = tint_pixel(120.0, 1.0, 0.5, ComponentMask::ALL, 0.0, before);
        assert_eq!(after, before);
    }

    #[test]
    fn full_alpha_tint_reaches_brush_color() {
        let b = tint_brush(1.0);
        let (h, s, v) = b.hsv();
        let after = tint_pixel(h, s, v, ComponentMask::ALL, 1.0, Pixel::new(200, 100, 50));
        assert_eq!(after, b.color());
    }

    #[test]
    fn hue_blend_takes_shortest_arc() {
        // Canvas hue 350, brush hue 10: the path crosses 0, so a half
        // blend lands at 0 exactly, never at the far side (180).
        let canvas_pixel = {
            let (r, g, b) = hsv_to_rgb(350.0, 1.0, 1.0);
            Pixel::new(f32_to_channel(r), f32_to_channel(g), f32_to_channel(b))
        };
        let mask = ComponentMask { hue: true, sat: false, val: false };
        let after = tint_pixel(10.0, 1.0, 1.0, mask, 0.5, canvas_pixel);
        let (h, _, _) = rgb_to_hsv(
            channel_to_f32(after.r),
            channel_to_f32(after.g),
            channel_to_f32(after.b),
        );
        let h = h.unwrap();
        // Wrapped result is near 0 (or equivalently near 360).
        assert!(h < 15.0 || h > 345.0, "hue went the long way: {}", h);
    }

    #[test]
    fn neutral_pixel_stays_neutral_without_hue_request() {
        let gray = Pixel::new(128, 128, 128);
        // Only Val requested: saturation must remain 0 even though the
        // brush is fully saturated.
        let mask = ComponentMask { hue: false, sat: true, val: true };
        let after = tint_pixel(120.0, 1.0, 1.0, mask, 0.7, gray);
        let (_, s, _) = rgb_to_hsv(
            channel_to_f32(after.r),
            channel_to_f32(after.g),
            channel_to_f32(after.b),
        );
        assert_eq!(s, 0.0);
        assert_eq!(after.r, after.g);
        assert_eq!(after.g, after.b);
    }

    #[test]
    fn neutral_pixel_takes_brush_hue_when_requested() {
        let gray = Pixel::new(128, 128, 128);
        let after = tint_pixel(120.0, 1.0, 0.5, ComponentMask::ALL, 1.0, gray);
        let (h, s, _) = rgb_to_hsv(
            channel_to_f32(after.r),
            channel_to_f32(after.g),
            channel_to_f32(after.b),
        );
        assert!(s > 0.9);
        assert!(approx_eq(h.unwrap(), 120.0, 1.0));
    }

    #[test]
    fn empty_component_mask_paints_like_overpaint() {
        let mut c = Canvas::new(32, 32).unwrap();
        c.fill(Pixel::new(10, 20, 30));
        let mut b = tint_brush(0.2);
        b.components = ComponentMask::NONE;
        apply_brush(&mut c, &b, 16, 16).unwrap();
        assert_eq!(c.get(16, 16), b.color());
    }

    #[test]
    fn tint_falloff_follows_the_mask() {
        let mut c = Canvas::new(32, 32).unwrap();
        c.fill(Pixel::new(255, 0, 0));
        let mut b = tint_brush(1.0);
        b.set_rgb(0, 0, 255);
        apply_brush(&mut c, &b, 16, 16).unwrap();
        // Center fully shifted toward the brush; footprint corner (alpha 0)
        // untouched.
        assert_eq!(c.get(8, 8), Pixel::new(255, 0, 0));
        let center = c.get(16, 16);
        assert!(center.b > 200 && center.r < 50);
    }

    #[test]
    fn preview_contains_magnified_stamp() {
        let mut preview = Canvas::new(384, 384).unwrap();
        let backdrop = Pixel::new(0xeb, 0xeb, 0xd0);
        let b = BrushState::default(); // overpaint, 16x16, magnification 4
        render_preview(&mut preview, &b, backdrop);
        // Magnified overpaint swatch covers the center.
        assert_eq!(preview.get(192, 192), b.color());
        // 1:1 swatch sits at the corner offset.
        assert_eq!(preview.get(PREVIEW_CORNER + 8, PREVIEW_CORNER + 8), b.color());
        // Far corner is pure backdrop.
        assert_eq!(preview.get(2, 380), backdrop);
    }
}
