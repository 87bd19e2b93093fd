use std::path::Path;

use crate::brush::{self, BrushMode, BrushState, ComponentMask};
use crate::canvas::{Canvas, Pixel, Rect};
use crate::cursor::CursorOverlay;
use crate::display::{ChannelMode, DisplayReducer, DisplaySurface};
use crate::io;
use crate::{log_info, log_warn};

/// Edge length of the editable canvas at startup.
pub const DEFAULT_CANVAS_SIZE: usize = 256;
/// Edge length of the brush-preview canvas.
pub const PREVIEW_CANVAS_SIZE: usize = 384;

/// Initial backdrop of the preview canvas; replaced by whatever color the
/// user samples.
const PREVIEW_BACKDROP: Pixel = Pixel::new(0xeb, 0xeb, 0xd0);

/// Process every Nth motion event; intermediate positions are coalesced
/// away to bound redraw cost. Button transitions always bypass this.
const MOTION_DIVIDER: u8 = 2;

// ============================================================================
// DISPLAY VIEW — one canvas bound to one window
// ============================================================================

/// A reducer/surface pair: the device-side view of one logical canvas.
struct DisplayView<S: DisplaySurface> {
    reducer: DisplayReducer,
    surface: S,
}

impl<S: DisplaySurface> DisplayView<S> {
    fn new(surface: S, gamma: f64, width: usize, height: usize) -> Result<Self, String> {
        let mut reducer = DisplayReducer::new(surface.capabilities(), gamma)?;
        reducer.resize_frame(width, height);
        Ok(DisplayView { reducer, surface })
    }

    /// Re-render `rect` and push it to the window.
    fn update(&mut self, canvas: &Canvas, rect: Rect) {
        if rect.is_empty() {
            return;
        }
        self.reducer.reduce(canvas, rect);
        self.surface.blit(
            self.reducer.frame(),
            self.reducer.frame_width(),
            self.reducer.palette(),
            rect,
        );
    }

    fn update_full(&mut self, canvas: &Canvas) {
        self.update(canvas, Rect::full(canvas.width(), canvas.height()));
    }

    fn set_mode(&mut self, canvas: &Canvas, mode: ChannelMode, gamma_correct: bool) {
        self.reducer.set_mode(mode, gamma_correct);
        self.update_full(canvas);
    }
}

// ============================================================================
// PAINT SESSION
// ============================================================================

/// One running editor: the editable canvas, the brush-preview canvas, the
/// brush, the cursor overlay and the display views. All state that the
/// original program kept in globals lives here; every operation takes the
/// session by reference.
pub struct PaintSession<S: DisplaySurface> {
    canvas: Canvas,
    preview: Canvas,
    brush: BrushState,
    overlay: CursorOverlay,
    view: DisplayView<S>,
    preview_view: DisplayView<S>,
    preview_backdrop: Pixel,
    motion_countdown: u8,
    last_x: i32,
    last_y: i32,
    button_down: bool,
}

impl<S: DisplaySurface> PaintSession<S> {
    /// Create a session with the startup red-green ramp, pushing the
    /// initial frames to both windows.
    pub fn new(canvas_surface: S, preview_surface: S, gamma: f64) -> Result<Self, String> {
        let mut canvas = Canvas::new(DEFAULT_CANVAS_SIZE, DEFAULT_CANVAS_SIZE)?;
        canvas.fill_ramp();
        let preview = Canvas::new(PREVIEW_CANVAS_SIZE, PREVIEW_CANVAS_SIZE)?;

        let view = DisplayView::new(canvas_surface, gamma, canvas.width(), canvas.height())?;
        let preview_view =
            DisplayView::new(preview_surface, gamma, preview.width(), preview.height())?;

        let mut session = PaintSession {
            canvas,
            preview,
            brush: BrushState::default(),
            overlay: CursorOverlay::default(),
            view,
            preview_view,
            preview_backdrop: PREVIEW_BACKDROP,
            motion_countdown: 1,
            last_x: 0,
            last_y: 0,
            button_down: false,
        };
        session.view.update_full(&session.canvas);
        session.refresh_preview();
        Ok(session)
    }

    pub fn canvas(&self) -> &Canvas {
        &self.canvas
    }

    pub fn preview(&self) -> &Canvas {
        &self.preview
    }

    pub fn brush(&self) -> &BrushState {
        &self.brush
    }

    pub fn sampled_color(&self) -> Pixel {
        self.preview_backdrop
    }

    pub fn surfaces(&mut self) -> (&mut S, &mut S) {
        (&mut self.view.surface, &mut self.preview_view.surface)
    }

    // ── pointer handling ────────────────────────────────────────────────

    /// Pointer callback: enter/leave, move, press, release, and airbrush
    /// puffs all arrive here. Leave events carry out-of-bounds coordinates.
    ///
    /// Motion is rate-limited; a press or release is never dropped.
    pub fn on_pointer_event(&mut self, x: i32, y: i32, button_down: bool) {
        let transition = button_down != self.button_down;
        self.last_x = x;
        self.last_y = y;
        self.button_down = button_down;

        // Sampling wants every event while the button is held, so the
        // picked color tracks the pointer closely. Out-of-bounds positions
        // (pointer left the canvas) must reach the overlay restore.
        let sampling = self.brush.mode() == BrushMode::Sample && button_down;
        let left_canvas = !self.canvas.in_bounds(x, y);
        if !transition && !sampling && !left_canvas {
            self.motion_countdown = self.motion_countdown.saturating_sub(1);
            if self.motion_countdown > 0 {
                return;
            }
            self.motion_countdown = MOTION_DIVIDER;
        }
        self.move_cursor(x, y, button_down);
    }

    /// Airbrush puff: while the button is held the frontend calls this on
    /// its timer so paint keeps flowing even without motion.
    pub fn tick(&mut self) {
        if self.button_down {
            self.move_cursor(self.last_x, self.last_y, true);
        }
    }

    /// The one place overlay, engine and display updates are sequenced:
    /// restore the previous overlay, paint if requested, redraw the cursor.
    fn move_cursor(&mut self, x: i32, y: i32, button_down: bool) {
        // Restore must precede everything else, or the brush would read
        // (and the display would keep) cursor ring pixels.
        if let Some(prev) = self.overlay.restore(&mut self.canvas) {
            self.view.update(&self.canvas, prev);
        }

        if brush::footprint(&self.canvas, &self.brush, x, y).is_none() {
            return;
        }

        if button_down {
            if self.brush.mode() == BrushMode::Sample {
                if self.canvas.in_bounds(x, y) {
                    self.preview_backdrop = self.canvas.get(x as usize, y as usize);
                    self.refresh_preview();
                }
            } else if let Some(rect) = brush::apply_brush(&mut self.canvas, &self.brush, x, y) {
                self.view.update(&self.canvas, rect);
            }
        }

        if let Some(rect) = self.overlay.draw(&mut self.canvas, &self.brush, x, y) {
            self.view.update(&self.canvas, rect);
        }
    }

    // ── display plumbing ────────────────────────────────────────────────

    /// Re-render and blit one rectangle of the editable canvas.
    pub fn update_display(&mut self, rect: Rect) {
        self.view.update(&self.canvas, rect);
    }

    pub fn full_redraw(&mut self) {
        self.view.update_full(&self.canvas);
        self.preview_view.update_full(&self.preview);
    }

    /// Switch channel mode / gamma policy on both views (palette rebuild in
    /// 8-bit mode) and redraw everything.
    pub fn set_display_mode(&mut self, mode: ChannelMode, gamma_correct: bool) {
        log_info!("display mode {:?}, gamma correction {}", mode, gamma_correct);
        self.view.set_mode(&self.canvas, mode, gamma_correct);
        self.preview_view.set_mode(&self.preview, mode, gamma_correct);
    }

    pub fn channel_mode(&self) -> ChannelMode {
        self.view.reducer.mode()
    }

    pub fn gamma_correct(&self) -> bool {
        self.view.reducer.gamma_correct()
    }

    // ── brush controls ──────────────────────────────────────────────────
    //
    // Every control change re-renders the preview swatch, like the
    // original's sliders did.

    pub fn set_brush_rgb(&mut self, r: u8, g: u8, b: u8) {
        self.brush.set_rgb(r, g, b);
        self.refresh_preview();
    }

    pub fn set_brush_hsv(&mut self, h: Option<f32>, s: Option<f32>, v: Option<f32>) {
        if let Some(h) = h {
            self.brush.set_hue(h);
        }
        if let Some(s) = s {
            self.brush.set_sat(s);
        }
        if let Some(v) = v {
            self.brush.set_val(v);
        }
        self.refresh_preview();
    }

    pub fn set_brush_size(&mut self, size: i32) {
        self.brush.set_size(size);
        self.refresh_preview();
    }

    pub fn set_brush_aspect_ratio(&mut self, ratio: f32) {
        self.brush.set_aspect_ratio(ratio);
        self.refresh_preview();
    }

    pub fn set_brush_thickness(&mut self, thickness: f32) {
        self.brush.thickness = thickness.max(0.0);
        self.refresh_preview();
    }

    pub fn set_brush_magnification(&mut self, magnification: i32) {
        self.brush.magnification = magnification.max(1);
        self.refresh_preview();
    }

    pub fn set_brush_mode(&mut self, mode: BrushMode) {
        self.brush.set_mode(mode);
        self.refresh_preview();
    }

    pub fn set_components(&mut self, components: ComponentMask) {
        self.brush.components = components;
        self.refresh_preview();
    }

    /// Re-render the brush-preview canvas. Skipped when no HSV component is
    /// selected outside Sample mode — there is nothing meaningful to show.
    fn refresh_preview(&mut self) {
        if !self.brush.components.any() && self.brush.mode() != BrushMode::Sample {
            return;
        }
        brush::render_preview(&mut self.preview, &self.brush, self.preview_backdrop);
        self.preview_view.update_full(&self.preview);
    }

    // ── canvas operations ───────────────────────────────────────────────

    /// Load an image file into the editable canvas. On failure the canvas
    /// is left exactly as it was.
    pub fn load_image(&mut self, path: &Path) -> Result<(), String> {
        let loaded = io::load_any(path)?;
        self.adopt_image(loaded)
    }

    /// Install an already-decoded image as the canvas contents. The
    /// frontend uses this for the startup image, which it has already
    /// decoded to size the window.
    pub fn adopt_image(&mut self, loaded: io::LoadedImage) -> Result<(), String> {
        self.take_down_overlay();
        self.canvas.adopt(loaded.width, loaded.height, loaded.pixels)?;
        self.view.reducer.resize_frame(self.canvas.width(), self.canvas.height());
        self.view.update_full(&self.canvas);
        Ok(())
    }

    /// Save the editable canvas as PPM.
    pub fn save_image(&mut self, path: &Path) -> Result<(), String> {
        // The overlay must not leak into the file.
        self.take_down_overlay();
        io::save_ppm(path, self.canvas.width(), self.canvas.height(), self.canvas.pixels())
    }

    /// Back to the startup state: default size, red-green ramp.
    pub fn reset_canvas(&mut self) -> Result<(), String> {
        self.take_down_overlay();
        self.canvas.resize(DEFAULT_CANVAS_SIZE, DEFAULT_CANVAS_SIZE)?;
        self.canvas.fill_ramp();
        self.view.reducer.resize_frame(self.canvas.width(), self.canvas.height());
        self.view.update_full(&self.canvas);
        Ok(())
    }

    /// Resize the editable canvas; on failure dimensions and contents are
    /// unchanged.
    pub fn resize_canvas(&mut self, width: usize, height: usize) -> Result<(), String> {
        self.take_down_overlay();
        self.canvas.resize(width, height)?;
        self.view.reducer.resize_frame(width, height);
        self.view.update_full(&self.canvas);
        Ok(())
    }

    /// Flood the canvas with the current brush color.
    pub fn fill_with_brush_color(&mut self) {
        self.take_down_overlay();
        let color = self.brush.color();
        self.canvas.fill(color);
        self.view.update_full(&self.canvas);
    }

    /// Put back any cursor-ring pixels and flush the restored rectangle.
    /// Canvas operations must run this first: were the saved originals
    /// simply discarded, a failed operation would leave the ring baked
    /// into the canvas.
    fn take_down_overlay(&mut self) {
        if let Some(prev) = self.overlay.restore(&mut self.canvas) {
            self.view.update(&self.canvas, prev);
        }
    }
}

// ============================================================================
// CONFIG HELPERS
// ============================================================================

/// Resolve a radio group's initial selection. A well-formed group has
/// exactly one active member; with several, the first listed wins (and the
/// inconsistency is logged); with none, the first entry is selected.
pub fn resolve_initial_choice(choices: &[(&str, bool)]) -> usize {
    let active: Vec<usize> = choices
        .iter()
        .enumerate()
        .filter_map(|(i, (_, on))| on.then_some(i))
        .collect();
    match active.as_slice() {
        [one] => *one,
        [] => {
            log_warn!("radio group has no active member; defaulting to {:?}", choices.first().map(|c| c.0));
            0
        }
        [first, ..] => {
            log_warn!(
                "radio group has {} active members; keeping {:?}",
                active.len(),
                choices[*first].0
            );
            *first
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::display::{ChannelOrder, DeviceFrame, DisplayCaps};

    /// Test double for the window: records every blit rectangle.
    struct RecordingSurface {
        bits: u8,
        blits: Vec<Rect>,
    }

    impl RecordingSurface {
        fn new(bits: u8) -> Self {
            RecordingSurface { bits, blits: Vec::new() }
        }
    }

    impl DisplaySurface for RecordingSurface {
        fn capabilities(&self) -> DisplayCaps {
            DisplayCaps { bits: self.bits, order: ChannelOrder::Rgb }
        }

        fn blit(&mut self, _frame: &DeviceFrame, _w: usize, _palette: &[Pixel], rect: Rect) {
            self.blits.push(rect);
        }
    }

    fn session() -> PaintSession<RecordingSurface> {
        PaintSession::new(RecordingSurface::new(24), RecordingSurface::new(24), 2.0).unwrap()
    }

    #[test]
    fn press_paints_and_blits_the_dirty_rect() {
        let mut s = session();
        s.set_brush_rgb(200, 10, 10);
        s.surfaces().0.blits.clear();

        s.on_pointer_event(100, 100, true);
        // Brush center took the brush color.
        assert_eq!(s.canvas().get(100, 100), Pixel::new(200, 10, 10));
        // Only footprint-sized rectangles went to the display.
        let blits = &s.surfaces().0.blits;
        assert!(!blits.is_empty());
        assert!(blits.iter().all(|r| r.width() <= 20 && r.height() <= 20));
    }

    #[test]
    fn moving_without_button_leaves_paint_untouched() {
        let mut s = session();
        let before: Vec<Pixel> = s.canvas().pixels().to_vec();
        for i in 0..10 {
            s.on_pointer_event(50 + i, 60, false);
        }
        // Moving far off the canvas restores the overlay completely.
        s.on_pointer_event(-100, -100, false);
        assert_eq!(s.canvas().pixels(), &before[..]);
        assert!(!s.overlay.is_shown());
    }

    #[test]
    fn release_transition_is_never_coalesced() {
        let mut s = session();
        s.set_brush_mode(BrushMode::Sample);
        // Burn through the motion divider so the next plain motion would
        // be dropped, then verify a release still gets through (it clears
        // the held state, so a following tick must not paint).
        s.on_pointer_event(10, 10, true);
        s.on_pointer_event(10, 10, false);
        let sampled = s.sampled_color();
        s.tick();
        s.tick();
        assert_eq!(s.sampled_color(), sampled);
        assert!(!s.button_down);
    }

    #[test]
    fn sample_mode_reads_instead_of_writing() {
        let mut s = session();
        let before: Vec<Pixel> = s.canvas().pixels().to_vec();
        s.set_brush_mode(BrushMode::Sample);
        s.on_pointer_event(30, 40, true);
        // Ramp pixel at (30, 40): red = y, green = x.
        assert_eq!(s.sampled_color(), Pixel::new(40, 30, 0));
        s.on_pointer_event(-100, -100, false);
        assert_eq!(s.canvas().pixels(), &before[..]);
    }

    #[test]
    fn airbrush_tick_accumulates_tint() {
        let mut s = session();
        s.set_brush_mode(BrushMode::Tint);
        s.set_brush_rgb(0, 0, 255);
        s.on_pointer_event(128, 128, true);
        let after_press = s.canvas().get(128, 128);
        for _ in 0..20 {
            s.tick();
        }
        s.on_pointer_event(-1, -1, false);
        let after_ticks = s.canvas().get(128, 128);
        assert!(after_ticks.b > after_press.b, "puffs should deepen the tint");
    }

    #[test]
    fn failed_resize_takes_the_cursor_overlay_down_first() {
        let mut s = session();
        let before: Vec<Pixel> = s.canvas().pixels().to_vec();
        // Hover so the cursor ring is drawn, then fail a resize. The ring
        // must not stay baked into the canvas with its originals dropped.
        s.on_pointer_event(100, 100, false);
        assert!(s.resize_canvas(1_000_000, 1_000_000).is_err());
        assert!(!s.overlay.is_shown());
        assert_eq!(s.canvas().pixels(), &before[..]);
        assert_eq!(s.canvas().width(), DEFAULT_CANVAS_SIZE);
    }

    #[test]
    fn adopting_a_decoded_image_replaces_the_canvas() {
        let mut s = session();
        s.on_pointer_event(100, 100, false);
        let img = io::LoadedImage {
            width: 3,
            height: 2,
            pixels: vec![Pixel::new(5, 6, 7); 6],
        };
        s.adopt_image(img).unwrap();
        assert_eq!((s.canvas().width(), s.canvas().height()), (3, 2));
        assert!(s.canvas().pixels().iter().all(|p| *p == Pixel::new(5, 6, 7)));
        assert!(!s.overlay.is_shown());
    }

    #[test]
    fn failed_load_leaves_canvas_untouched() {
        let mut s = session();
        let before: Vec<Pixel> = s.canvas().pixels().to_vec();
        assert!(s.load_image(Path::new("/nonexistent/missing.ppm")).is_err());
        assert_eq!(s.canvas().pixels(), &before[..]);
        assert_eq!(s.canvas().width(), DEFAULT_CANVAS_SIZE);
    }

    #[test]
    fn preview_canvas_is_independent_of_edits() {
        let mut s = session();
        let preview_before: Vec<Pixel> = s.preview().pixels().to_vec();
        s.on_pointer_event(100, 100, true);
        s.on_pointer_event(-1, -1, false);
        assert_eq!(s.preview().pixels(), &preview_before[..]);
        assert_eq!(s.preview().width(), PREVIEW_CANVAS_SIZE);
    }

    #[test]
    fn eight_bit_views_carry_a_palette() {
        let s =
            PaintSession::new(RecordingSurface::new(8), RecordingSurface::new(8), 2.0).unwrap();
        assert_eq!(s.view.reducer.palette().len(), crate::display::SHADES);
    }

    #[test]
    fn first_listed_wins_for_radio_groups() {
        assert_eq!(resolve_initial_choice(&[("a", false), ("b", true), ("c", false)]), 1);
        assert_eq!(resolve_initial_choice(&[("a", true), ("b", true)]), 0);
        assert_eq!(resolve_initial_choice(&[("a", false), ("b", false)]), 0);
    }
}
