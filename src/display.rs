use rayon::prelude::*;

use crate::canvas::{Canvas, Pixel, Rect};

/// Shades per primary in 8-bit indexed mode. The product is the number of
/// colormap cells the palette claims.
const RED_LEVELS: usize = 6;
const GREEN_LEVELS: usize = 8;
const BLUE_LEVELS: usize = 5;
/// Total palette entries: 6 * 8 * 5.
pub const SHADES: usize = RED_LEVELS * GREEN_LEVELS * BLUE_LEVELS;

/// 4x4 ordered-dither threshold matrix, indexed `[x % 4][y % 4]`.
const DITHER_PATTERN: [[u8; 4]; 4] = [
    [0, 8, 2, 10],
    [12, 4, 14, 6],
    [3, 11, 1, 9],
    [15, 7, 13, 5],
];

// ============================================================================
// DISPLAY CAPABILITIES
// ============================================================================

/// Byte order of the display's truecolor pixels.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum ChannelOrder {
    #[default]
    Rgb,
    Bgr,
}

/// What the windowing collaborator reports about the screen.
#[derive(Clone, Copy, Debug)]
pub struct DisplayCaps {
    /// Bits per pixel: 24, 16, 15 or 8.
    pub bits: u8,
    pub order: ChannelOrder,
}

/// Which logical channels reach the display. `AllColors` shows the canvas
/// as-is; the single-channel modes show one primary as a full-range ramp.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum ChannelMode {
    #[default]
    AllColors,
    OnlyRed,
    OnlyGreen,
    OnlyBlue,
}

impl ChannelMode {
    pub fn label(&self) -> &'static str {
        match self {
            ChannelMode::AllColors => "All Colors",
            ChannelMode::OnlyRed => "Red",
            ChannelMode::OnlyGreen => "Green",
            ChannelMode::OnlyBlue => "Blue",
        }
    }

    pub fn all() -> &'static [ChannelMode] {
        &[
            ChannelMode::AllColors,
            ChannelMode::OnlyRed,
            ChannelMode::OnlyGreen,
            ChannelMode::OnlyBlue,
        ]
    }

    /// Zero out the channels this mode hides.
    fn mask(&self, p: Pixel) -> Pixel {
        match self {
            ChannelMode::AllColors => p,
            ChannelMode::OnlyRed => Pixel::new(p.r, 0, 0),
            ChannelMode::OnlyGreen => Pixel::new(0, p.g, 0),
            ChannelMode::OnlyBlue => Pixel::new(0, 0, p.b),
        }
    }
}

/// Device-native pixel storage, one entry per canvas pixel.
pub enum DeviceFrame {
    /// 24-bit truecolor, `0x00RRGGBB` or `0x00BBGGRR` per the channel order.
    Packed32(Vec<u32>),
    /// 15- or 16-bit truecolor words.
    Packed16(Vec<u16>),
    /// 8-bit palette indices into [`DisplayReducer::palette`].
    Indexed(Vec<u8>),
}

/// The blit collaborator: whatever owns the real window.
pub trait DisplaySurface {
    fn capabilities(&self) -> DisplayCaps;

    /// Push a rectangle of the device frame to the screen. `palette` is
    /// empty except in 8-bit mode.
    fn blit(&mut self, frame: &DeviceFrame, frame_width: usize, palette: &[Pixel], rect: Rect);
}

// ============================================================================
// INTENSITY SCALING (8-bit mode)
// ============================================================================

/// Gamma-corrected intensity for level `i` of `levels`, in 0..=255.
fn gamma_scaled(i: usize, levels: usize, gamma: f64) -> u8 {
    ((i as f64 / (levels - 1) as f64).powf(1.0 / gamma) * 255.0 + 0.5).floor() as u8
}

/// Linearly scaled intensity for level `i` of `levels`, in 0..=255.
fn linear_scaled(i: usize, levels: usize) -> u8 {
    (i as f64 / (levels - 1) as f64 * 255.0 + 0.5).floor() as u8
}

/// Per-channel dither table: for each 8-bit intensity and each position
/// modulo 4, the quantized level (0..levels-1) to display there.
type DitherLevels = Vec<[[u8; 4]; 4]>;

/// Build the dither table for a primary with `levels` shades.
///
/// An intensity maps to a point between two adjacent levels; the threshold
/// matrix decides, per screen position, whether to round up or down, so the
/// 4x4 neighborhood averages out to the requested intensity.
fn dithered_levels(levels: usize) -> DitherLevels {
    let pattern_count = 16 * (levels - 1) + 1;
    let mut table = vec![[[0u8; 4]; 4]; 256];
    for (i, cell) in table.iter_mut().enumerate() {
        let level = (i as f64 / 255.0 * (pattern_count - 1) as f64 + 0.5).floor() as usize;
        let threshold = (level % 16) as u8;
        let above = (level / 16) as u8;
        let below = above + 1;
        for x in 0..4 {
            for y in 0..4 {
                cell[x][y] = if DITHER_PATTERN[x][y] >= threshold { above } else { below };
            }
        }
    }
    table
}

struct DitherTables {
    red: DitherLevels,
    green: DitherLevels,
    blue: DitherLevels,
    /// Intensity to palette index for single-channel modes, where the whole
    /// palette is one 240-step ramp.
    single: [u8; 256],
}

impl DitherTables {
    fn build() -> DitherTables {
        let mut single = [0u8; 256];
        for (i, s) in single.iter_mut().enumerate() {
            *s = (i as f64 / 255.0 * (SHADES - 1) as f64 + 0.5).floor() as u8;
        }
        DitherTables {
            red: dithered_levels(RED_LEVELS),
            green: dithered_levels(GREEN_LEVELS),
            blue: dithered_levels(BLUE_LEVELS),
            single,
        }
    }
}

// ============================================================================
// DISPLAY REDUCER
// ============================================================================

enum Depth {
    True24,
    True16,
    True15,
    Indexed8,
}

/// Converts the logical RGB canvas into the device-native representation
/// negotiated at startup, and owns the device frame it writes into.
pub struct DisplayReducer {
    depth: Depth,
    order: ChannelOrder,
    mode: ChannelMode,
    gamma_correct: bool,
    gamma: f64,
    dither: Option<DitherTables>,
    palette: Vec<Pixel>,
    frame: DeviceFrame,
    frame_width: usize,
    frame_height: usize,
}

impl DisplayReducer {
    /// Build a reducer for the negotiated capabilities. Any bit depth other
    /// than 24/16/15/8 is unsupported and fatal to initialization.
    pub fn new(caps: DisplayCaps, gamma: f64) -> Result<DisplayReducer, String> {
        let depth = match caps.bits {
            24 => Depth::True24,
            16 => Depth::True16,
            15 => Depth::True15,
            8 => Depth::Indexed8,
            other => return Err(format!("display not supported: {} bits per pixel", other)),
        };
        let dither = matches!(depth, Depth::Indexed8).then(DitherTables::build);
        let frame = match depth {
            Depth::True24 => DeviceFrame::Packed32(Vec::new()),
            Depth::True16 | Depth::True15 => DeviceFrame::Packed16(Vec::new()),
            Depth::Indexed8 => DeviceFrame::Indexed(Vec::new()),
        };
        let mut reducer = DisplayReducer {
            depth,
            order: caps.order,
            mode: ChannelMode::AllColors,
            gamma_correct: true,
            gamma,
            dither,
            palette: Vec::new(),
            frame,
            frame_width: 0,
            frame_height: 0,
        };
        reducer.rebuild_palette();
        Ok(reducer)
    }

    pub fn mode(&self) -> ChannelMode {
        self.mode
    }

    pub fn gamma_correct(&self) -> bool {
        self.gamma_correct
    }

    pub fn is_indexed(&self) -> bool {
        matches!(self.depth, Depth::Indexed8)
    }

    /// The allocated device colors (8-bit mode only; empty otherwise).
    pub fn palette(&self) -> &[Pixel] {
        &self.palette
    }

    pub fn frame(&self) -> &DeviceFrame {
        &self.frame
    }

    pub fn frame_width(&self) -> usize {
        self.frame_width
    }

    /// Change channel mode and gamma policy; rebuilds the palette in 8-bit
    /// mode. The caller is responsible for the full redraw that follows.
    pub fn set_mode(&mut self, mode: ChannelMode, gamma_correct: bool) {
        self.mode = mode;
        self.gamma_correct = gamma_correct;
        self.rebuild_palette();
    }

    /// Size the device frame for a canvas, dropping stale contents.
    pub fn resize_frame(&mut self, width: usize, height: usize) {
        let len = width * height;
        match &mut self.frame {
            DeviceFrame::Packed32(buf) => {
                buf.clear();
                buf.resize(len, 0);
            }
            DeviceFrame::Packed16(buf) => {
                buf.clear();
                buf.resize(len, 0);
            }
            DeviceFrame::Indexed(buf) => {
                buf.clear();
                buf.resize(len, 0);
            }
        }
        self.frame_width = width;
        self.frame_height = height;
    }

    /// Re-render `rect` of the canvas into the device frame. The frame must
    /// have been sized to the canvas beforehand.
    pub fn reduce(&mut self, canvas: &Canvas, rect: Rect) {
        debug_assert_eq!(self.frame_width, canvas.width());
        debug_assert_eq!(self.frame_height, canvas.height());
        if rect.is_empty() {
            return;
        }
        let full_rows = rect.x0 == 0 && rect.x1 == canvas.width() && rect.height() > 64;
        if full_rows {
            self.reduce_rows_parallel(canvas, rect.y0, rect.y1);
        } else {
            for y in rect.y0..rect.y1 {
                self.reduce_span(canvas, y, rect.x0, rect.x1);
            }
        }
    }

    /// Full-width stripes go through rayon; each output row is written by
    /// exactly one task, so rows never alias.
    fn reduce_rows_parallel(&mut self, canvas: &Canvas, y0: usize, y1: usize) {
        let w = self.frame_width;
        let mode = self.mode;
        let order = self.order;
        match &mut self.frame {
            DeviceFrame::Packed32(buf) => {
                buf[y0 * w..y1 * w]
                    .par_chunks_mut(w)
                    .enumerate()
                    .for_each(|(i, out)| {
                        let row = canvas.row(y0 + i);
                        for x in 0..w {
                            out[x] = pack32(mode.mask(row[x]), order);
                        }
                    });
            }
            DeviceFrame::Packed16(buf) => {
                let five_six_five = matches!(self.depth, Depth::True16);
                buf[y0 * w..y1 * w]
                    .par_chunks_mut(w)
                    .enumerate()
                    .for_each(|(i, out)| {
                        let row = canvas.row(y0 + i);
                        for x in 0..w {
                            out[x] = pack16(mode.mask(row[x]), five_six_five);
                        }
                    });
            }
            DeviceFrame::Indexed(buf) => {
                let tables = self.dither.as_ref().expect("indexed mode without tables");
                buf[y0 * w..y1 * w]
                    .par_chunks_mut(w)
                    .enumerate()
                    .for_each(|(i, out)| {
                        let y = y0 + i;
                        let row = canvas.row(y);
                        for x in 0..w {
                            out[x] = index_for(tables, mode, row[x], x, y);
                        }
                    });
            }
        }
    }

    fn reduce_span(&mut self, canvas: &Canvas, y: usize, x0: usize, x1: usize) {
        let w = self.frame_width;
        let mode = self.mode;
        match &mut self.frame {
            DeviceFrame::Packed32(buf) => {
                let order = self.order;
                for x in x0..x1 {
                    buf[y * w + x] = pack32(mode.mask(canvas.get(x, y)), order);
                }
            }
            DeviceFrame::Packed16(buf) => {
                let five_six_five = matches!(self.depth, Depth::True16);
                for x in x0..x1 {
                    buf[y * w + x] = pack16(mode.mask(canvas.get(x, y)), five_six_five);
                }
            }
            DeviceFrame::Indexed(buf) => {
                let tables = self.dither.as_ref().expect("indexed mode without tables");
                for x in x0..x1 {
                    buf[y * w + x] = index_for(tables, mode, canvas.get(x, y), x, y);
                }
            }
        }
    }

    /// Recompute the 240-entry palette from the current channel mode and
    /// gamma policy. No-op outside 8-bit mode.
    fn rebuild_palette(&mut self) {
        if !self.is_indexed() {
            return;
        }
        let gamma = self.gamma;
        let gamma_correct = self.gamma_correct;
        let mode = self.mode;
        let scale = move |i: usize, levels: usize| -> u8 {
            if gamma_correct { gamma_scaled(i, levels, gamma) } else { linear_scaled(i, levels) }
        };
        self.palette = (0..SHADES)
            .map(|i| match mode {
                ChannelMode::AllColors => Pixel::new(
                    scale(i % RED_LEVELS, RED_LEVELS),
                    scale((i / RED_LEVELS) % GREEN_LEVELS, GREEN_LEVELS),
                    scale(i / (RED_LEVELS * GREEN_LEVELS), BLUE_LEVELS),
                ),
                ChannelMode::OnlyRed => Pixel::new(scale(i, SHADES), 0, 0),
                ChannelMode::OnlyGreen => Pixel::new(0, scale(i, SHADES), 0),
                ChannelMode::OnlyBlue => Pixel::new(0, 0, scale(i, SHADES)),
            })
            .collect();
    }
}

/// 24-bit pack with the display's native byte order.
fn pack32(p: Pixel, order: ChannelOrder) -> u32 {
    match order {
        ChannelOrder::Rgb => p.to_0rgb(),
        ChannelOrder::Bgr => p.to_0bgr(),
    }
}

/// 5/6/5 (16-bit) or 5/5/5 (15-bit) pack.
fn pack16(p: Pixel, five_six_five: bool) -> u16 {
    let r = (p.r >> 3) as u16;
    let b = (p.b >> 3) as u16;
    if five_six_five {
        let g = (p.g >> 2) as u16;
        (r << 11) | (g << 5) | b
    } else {
        let g = (p.g >> 3) as u16;
        (r << 10) | (g << 5) | b
    }
}

/// Palette index for one pixel at screen position `(x, y)`.
fn index_for(tables: &DitherTables, mode: ChannelMode, p: Pixel, x: usize, y: usize) -> u8 {
    match mode {
        ChannelMode::AllColors => {
            let r = tables.red[p.r as usize][x % 4][y % 4] as usize;
            let g = tables.green[p.g as usize][x % 4][y % 4] as usize;
            let b = tables.blue[p.b as usize][x % 4][y % 4] as usize;
            (b * RED_LEVELS * GREEN_LEVELS + g * RED_LEVELS + r) as u8
        }
        ChannelMode::OnlyRed => tables.single[p.r as usize],
        ChannelMode::OnlyGreen => tables.single[p.g as usize],
        ChannelMode::OnlyBlue => tables.single[p.b as usize],
    }
}
