use crate::brush::{BrushState, MAX_BRUSH_EDGE, compute_alpha};
use crate::canvas::{Canvas, Pixel, Rect};
use crate::color::{channel_to_f32, rgb_to_hsv};

/// Cursor glyph over light backgrounds.
pub const DARK_CURSOR: Pixel = Pixel::new(0, 0, 0);
/// Cursor glyph over dark backgrounds: a warm yellow that stays visible
/// on nearly everything the dark glyph would vanish into.
pub const BRIGHT_CURSOR: Pixel = Pixel::new(0xff, 0xf3, 0x00);

/// Scale applied to the alpha mask when classifying ring pixels; keeps the
/// visible cursor a thin outline rather than the whole footprint.
const CURSOR_ALPHA_SCALE: f32 = 0.2;

/// Alpha band (open interval) that counts as "cursor ring", indexed by the
/// average brush edge minus one. Small brushes show their whole footprint;
/// large ones only a thin band near the outer edge. Sizes past the table
/// clamp to the last entry.
const ALPHA_BANDS: [(f32, f32); MAX_BRUSH_EDGE as usize] = [
    (0.0, 1.0),
    (0.0, 1.0),
    (0.0, 1.0),
    (0.0, 1.0),
    (0.0, 1.0),
    (0.0, 0.1),
    (0.0, 0.1),
    (0.01, 0.1),
    (0.01, 0.1),
    (0.02, 0.1),
    (0.02, 0.08),
    (0.02, 0.07),
    (0.02, 0.06),
    (0.02, 0.05),
    (0.02, 0.05),
    (0.02, 0.05),
    (0.02, 0.05),
    (0.02, 0.05),
    (0.02, 0.05),
    (0.02, 0.05),
];

/// One canvas pixel the overlay has overwritten, so a later update can put
/// it back.
#[derive(Clone, Copy)]
struct SavedPixel {
    x: usize,
    y: usize,
    pixel: Pixel,
}

// ============================================================================
// CURSOR OVERLAY
// ============================================================================

/// Non-destructive brush-position preview.
///
/// Two states: Idle (no overlay pixels on the canvas) and Shown (ring
/// pixels drawn, originals saved). Every pointer update must call
/// [`CursorOverlay::restore`] before painting or redrawing, so overlay
/// pixels are never mistaken for canvas content.
pub struct CursorOverlay {
    saved: Vec<SavedPixel>,
    prev_rect: Option<Rect>,
}

impl Default for CursorOverlay {
    fn default() -> Self {
        CursorOverlay {
            // Covers the largest supported footprint.
            saved: Vec::with_capacity((MAX_BRUSH_EDGE * MAX_BRUSH_EDGE) as usize),
            prev_rect: None,
        }
    }
}

impl CursorOverlay {
    pub fn is_shown(&self) -> bool {
        !self.saved.is_empty()
    }

    /// Put every saved pixel back and clear the patch list, returning the
    /// previously drawn rectangle (which the caller should flush to the
    /// display). Idempotent when already Idle.
    pub fn restore(&mut self, canvas: &mut Canvas) -> Option<Rect> {
        for saved in self.saved.drain(..).rev() {
            canvas.set(saved.x, saved.y, saved.pixel);
        }
        self.prev_rect.take()
    }

    /// Draw the cursor ring for a brush centered at `(x, y)`, saving the
    /// pixels it overwrites. The overlay must be Idle (restored) when this
    /// is called. Returns the drawn rectangle, or `None` when the footprint
    /// misses the canvas entirely.
    pub fn draw(
        &mut self,
        canvas: &mut Canvas,
        brush: &BrushState,
        x: i32,
        y: i32,
    ) -> Option<Rect> {
        debug_assert!(self.saved.is_empty(), "overlay drawn twice without restore");

        let rect = crate::brush::footprint(canvas, brush, x, y)?;
        let band = alpha_band(brush.width(), brush.height());
        let glyph = if is_dark_region(canvas, rect) { BRIGHT_CURSOR } else { DARK_CURSOR };

        let lx = x - brush.width() / 2;
        let by = y - brush.height() / 2;
        for cy in rect.y0..rect.y1 {
            let local_y = cy as i32 - by;
            for cx in rect.x0..rect.x1 {
                let local_x = cx as i32 - lx;
                let alpha = CURSOR_ALPHA_SCALE
                    * compute_alpha(local_x, local_y, brush.width(), brush.height());
                if band.0 < alpha && alpha < band.1 {
                    self.saved.push(SavedPixel { x: cx, y: cy, pixel: canvas.get(cx, cy) });
                    canvas.set(cx, cy, glyph);
                }
            }
        }
        self.prev_rect = Some(rect);
        Some(rect)
    }
}

/// Ring band for a brush of the given edge lengths.
fn alpha_band(width: i32, height: i32) -> (f32, f32) {
    let index = ((width + height) / 2 - 1).clamp(0, MAX_BRUSH_EDGE - 1) as usize;
    ALPHA_BANDS[index]
}

/// Crude darkness estimate over a canvas region: average the HSV channels
/// and treat everything as dark except very bright areas and a bright
/// yellow band (where the bright glyph would disappear).
pub fn is_dark_region(canvas: &Canvas, rect: Rect) -> bool {
    if rect.is_empty() {
        return true;
    }
    let mut n = 0u32;
    let mut hue = 0.0f32;
    let mut sat = 0.0f32;
    let mut val = 0.0f32;
    for y in rect.y0..rect.y1 {
        for x in rect.x0..rect.x1 {
            let p = canvas.get(x, y);
            let (h, s, v) =
                rgb_to_hsv(channel_to_f32(p.r), channel_to_f32(p.g), channel_to_f32(p.b));
            hue += h.unwrap_or(0.0);
            sat += s;
            val += v;
            n += 1;
        }
    }
    let hue = hue / n as f32;
    let _sat = sat / n as f32;
    let val = val / n as f32;
    !((55.0 < hue && hue < 65.0 && val > 0.6) || val > 0.9)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::brush::BrushState;

    #[test]
    fn restore_is_bit_exact_after_rapid_moves() {
        let mut c = Canvas::new(64, 64).unwrap();
        c.fill_ramp();
        let before: Vec<Pixel> = c.pixels().to_vec();

        let brush = BrushState::default();
        let mut overlay = CursorOverlay::default();
        // Overlapping positions in quick succession, ending with a final
        // restore: the canvas must come back bit-identical.
        for (x, y) in [(10, 10), (12, 11), (13, 13), (40, 40), (-3, 5)] {
            overlay.restore(&mut c);
            overlay.draw(&mut c, &brush, x, y);
        }
        overlay.restore(&mut c);
        assert_eq!(c.pixels(), &before[..]);
        assert!(!overlay.is_shown());
    }

    #[test]
    fn draw_overwrites_only_saved_pixels() {
        let mut c = Canvas::new(64, 64).unwrap();
        c.fill(Pixel::new(30, 30, 30));
        let brush = BrushState::default();
        let mut overlay = CursorOverlay::default();
        overlay.draw(&mut c, &brush, 32, 32).unwrap();

        let changed = c
            .pixels()
            .iter()
            .filter(|p| **p != Pixel::new(30, 30, 30))
            .count();
        assert!(changed > 0, "cursor drew nothing");
        assert_eq!(changed, overlay.saved.len());
        // Dark background gets the bright glyph.
        assert!(c.pixels().contains(&BRIGHT_CURSOR));
    }

    #[test]
    fn footprint_off_canvas_draws_nothing() {
        let mut c = Canvas::new(32, 32).unwrap();
        let brush = BrushState::default();
        let mut overlay = CursorOverlay::default();
        assert!(overlay.draw(&mut c, &brush, -200, -200).is_none());
        assert!(!overlay.is_shown());
    }

    #[test]
    fn restore_returns_previous_rect_once() {
        let mut c = Canvas::new(64, 64).unwrap();
        let brush = BrushState::default();
        let mut overlay = CursorOverlay::default();
        let drawn = overlay.draw(&mut c, &brush, 32, 32).unwrap();
        assert_eq!(overlay.restore(&mut c), Some(drawn));
        assert_eq!(overlay.restore(&mut c), None);
    }

    #[test]
    fn large_brush_uses_thin_edge_band() {
        assert_eq!(alpha_band(1, 1), (0.0, 1.0));
        assert_eq!(alpha_band(20, 20), (0.02, 0.05));
        // Sizes beyond the table clamp instead of indexing out of range.
        assert_eq!(alpha_band(100, 100), (0.02, 0.05));
    }

    #[test]
    fn darkness_estimate() {
        let mut c = Canvas::new(8, 8).unwrap();
        c.fill(Pixel::new(10, 10, 10));
        assert!(is_dark_region(&c, Rect::full(8, 8)));

        c.fill(Pixel::new(250, 250, 250));
        assert!(!is_dark_region(&c, Rect::full(8, 8)));

        // Bright yellow band: hue ~60, value ~0.8 — counts as bright even
        // though value is below the 0.9 cutoff.
        c.fill(Pixel::new(204, 204, 0));
        assert!(!is_dark_region(&c, Rect::full(8, 8)));
    }
}
