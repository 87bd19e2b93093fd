use crate::{log_err, log_info};

/// Upper bound on total pixel count accepted by canvas allocation
/// (~256 megapixels, matching the sanity limit used for image buffers
/// elsewhere in the codebase).
const MAX_CANVAS_PIXELS: u64 = 256_000_000;

// ============================================================================
// PIXEL
// ============================================================================

/// One canvas pixel: 8-bit red, green and blue channels.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub struct Pixel {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Pixel {
    pub const BLACK: Pixel = Pixel::new(0, 0, 0);

    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Pixel { r, g, b }
    }

    /// Pack into `0x00RRGGBB`, the layout raw-framebuffer windows expect.
    pub fn to_0rgb(self) -> u32 {
        ((self.r as u32) << 16) | ((self.g as u32) << 8) | self.b as u32
    }

    /// Pack into `0x00BBGGRR` for displays with swapped red/blue order.
    pub fn to_0bgr(self) -> u32 {
        ((self.b as u32) << 16) | ((self.g as u32) << 8) | self.r as u32
    }
}

// ============================================================================
// RECT — half-open pixel rectangle
// ============================================================================

/// Rectangle `[x0, x1) × [y0, y1)` in canvas coordinates.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Rect {
    pub x0: usize,
    pub y0: usize,
    pub x1: usize,
    pub y1: usize,
}

impl Rect {
    pub fn new(x0: usize, y0: usize, x1: usize, y1: usize) -> Self {
        Rect { x0, y0, x1, y1 }
    }

    /// The full extent of a `width × height` buffer.
    pub fn full(width: usize, height: usize) -> Self {
        Rect { x0: 0, y0: 0, x1: width, y1: height }
    }

    pub fn is_empty(&self) -> bool {
        self.x0 >= self.x1 || self.y0 >= self.y1
    }

    pub fn width(&self) -> usize {
        self.x1.saturating_sub(self.x0)
    }

    pub fn height(&self) -> usize {
        self.y1.saturating_sub(self.y0)
    }
}

// ============================================================================
// CANVAS
// ============================================================================

/// A mutable RGB pixel buffer. The buffer length is always exactly
/// `width * height`; independent canvases never share storage.
pub struct Canvas {
    width: usize,
    height: usize,
    pixels: Vec<Pixel>,
}

impl Canvas {
    /// Create a zero-initialized (black) canvas.
    pub fn new(width: usize, height: usize) -> Result<Canvas, String> {
        check_dimensions(width, height)?;
        Ok(Canvas {
            width,
            height,
            pixels: vec![Pixel::BLACK; width * height],
        })
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn pixels(&self) -> &[Pixel] {
        &self.pixels
    }

    pub fn in_bounds(&self, x: i32, y: i32) -> bool {
        x >= 0 && y >= 0 && (x as usize) < self.width && (y as usize) < self.height
    }

    #[inline]
    pub fn get(&self, x: usize, y: usize) -> Pixel {
        self.pixels[y * self.width + x]
    }

    #[inline]
    pub fn set(&mut self, x: usize, y: usize, p: Pixel) {
        self.pixels[y * self.width + x] = p;
    }

    /// One row of pixels, for bulk reduction.
    pub fn row(&self, y: usize) -> &[Pixel] {
        &self.pixels[y * self.width..(y + 1) * self.width]
    }

    /// Replace the buffer and dimensions atomically. On failure the canvas
    /// is left exactly as it was and an error diagnostic is emitted.
    pub fn resize(&mut self, new_width: usize, new_height: usize) -> Result<(), String> {
        if let Err(e) = check_dimensions(new_width, new_height) {
            log_err!("canvas resize to {}x{} rejected: {}", new_width, new_height, e);
            return Err(e);
        }
        self.pixels = vec![Pixel::BLACK; new_width * new_height];
        self.width = new_width;
        self.height = new_height;
        log_info!("canvas resized to {}x{}", new_width, new_height);
        Ok(())
    }

    /// Replace the canvas contents with a decoded image. The incoming
    /// buffer length must match `width * height`.
    pub fn adopt(&mut self, width: usize, height: usize, pixels: Vec<Pixel>) -> Result<(), String> {
        check_dimensions(width, height)?;
        if pixels.len() != width * height {
            return Err(format!(
                "pixel buffer length {} does not match {}x{}",
                pixels.len(),
                width,
                height
            ));
        }
        self.width = width;
        self.height = height;
        self.pixels = pixels;
        Ok(())
    }

    /// Fill the whole canvas with one color.
    pub fn fill(&mut self, color: Pixel) {
        self.pixels.fill(color);
    }

    /// Fill with the red-green ramp the editor starts out with:
    /// red follows the row, green follows the column, blue stays zero.
    pub fn fill_ramp(&mut self) {
        for y in 0..self.height {
            for x in 0..self.width {
                self.set(x, y, Pixel::new((y & 0xff) as u8, (x & 0xff) as u8, 0));
            }
        }
    }
}

fn check_dimensions(width: usize, height: usize) -> Result<(), String> {
    if width == 0 || height == 0 {
        return Err(format!("zero canvas dimension ({}x{})", width, height));
    }
    let total = width as u64 * height as u64;
    if total > MAX_CANVAS_PIXELS {
        return Err(format!(
            "canvas {}x{} exceeds the {}-pixel limit",
            width, height, MAX_CANVAS_PIXELS
        ));
    }
    Ok(())
}
