use std::fs;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use crate::canvas::Pixel;
use crate::log_info;

/// A decoded raster image: dimensions plus row-major RGB pixels.
pub struct LoadedImage {
    pub width: usize,
    pub height: usize,
    pub pixels: Vec<Pixel>,
}

// ============================================================================
// PPM (P6) CODEC
// ============================================================================
//
// Binary PPM: `P6`, optional `#` comment lines, width and height, the
// maximum channel value, one whitespace byte, then width*height raw RGB
// triplets. Any header defect is a load failure; the caller keeps its
// current canvas untouched in that case.

/// Load a binary PPM file.
pub fn load_ppm(path: &Path) -> Result<LoadedImage, String> {
    let data = fs::read(path).map_err(|e| format!("cannot read {}: {}", path.display(), e))?;
    let mut header = HeaderScanner::new(&data);

    if header.token()? != b"P6" {
        return Err(format!("{}: not a P6 ppm file", path.display()));
    }
    let width = header.number()?;
    let height = header.number()?;
    if width == 0 || height == 0 {
        return Err(format!("{}: zero image dimension", path.display()));
    }
    let _max_value = header.number()?;
    let body = header.into_body()?;

    let size = width * height;
    if body.len() < size * 3 {
        return Err(format!(
            "{}: truncated pixel data ({} bytes for {}x{})",
            path.display(),
            body.len(),
            width,
            height
        ));
    }
    let pixels = body[..size * 3]
        .chunks_exact(3)
        .map(|c| Pixel::new(c[0], c[1], c[2]))
        .collect();
    log_info!("loaded {} ({}x{})", path.display(), width, height);
    Ok(LoadedImage { width, height, pixels })
}

/// Save a canvas buffer as binary PPM.
pub fn save_ppm(path: &Path, width: usize, height: usize, pixels: &[Pixel]) -> Result<(), String> {
    debug_assert_eq!(pixels.len(), width * height);
    let file = File::create(path).map_err(|e| format!("cannot create {}: {}", path.display(), e))?;
    let mut out = BufWriter::new(file);

    let write = |out: &mut BufWriter<File>| -> std::io::Result<()> {
        write!(out, "P6\n# airbrush canvas\n{} {}\n255\n", width, height)?;
        for p in pixels {
            out.write_all(&[p.r, p.g, p.b])?;
        }
        out.flush()
    };
    write(&mut out).map_err(|e| format!("cannot write {}: {}", path.display(), e))?;
    log_info!("saved {} ({}x{})", path.display(), width, height);
    Ok(())
}

/// Load any supported raster file: PPM through the codec above, everything
/// else through the `image` crate's decoders.
pub fn load_any(path: &Path) -> Result<LoadedImage, String> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default();
    if ext == "ppm" || ext == "pnm" {
        return load_ppm(path);
    }
    let decoded = image::open(path)
        .map_err(|e| format!("cannot decode {}: {}", path.display(), e))?
        .to_rgb8();
    let (width, height) = (decoded.width() as usize, decoded.height() as usize);
    let pixels = decoded
        .pixels()
        .map(|p| Pixel::new(p.0[0], p.0[1], p.0[2]))
        .collect();
    log_info!("loaded {} ({}x{})", path.display(), width, height);
    Ok(LoadedImage { width, height, pixels })
}

// ============================================================================
// HEADER SCANNER
// ============================================================================

/// Token reader over the PPM header: skips whitespace and `#` comment
/// lines, then hands back the raw pixel body.
struct HeaderScanner<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> HeaderScanner<'a> {
    fn new(data: &'a [u8]) -> Self {
        HeaderScanner { data, pos: 0 }
    }

    fn skip_filler(&mut self) {
        loop {
            while self.pos < self.data.len() && self.data[self.pos].is_ascii_whitespace() {
                self.pos += 1;
            }
            if self.pos < self.data.len() && self.data[self.pos] == b'#' {
                while self.pos < self.data.len() && self.data[self.pos] != b'\n' {
                    self.pos += 1;
                }
            } else {
                return;
            }
        }
    }

    fn token(&mut self) -> Result<&'a [u8], String> {
        self.skip_filler();
        let start = self.pos;
        while self.pos < self.data.len() && !self.data[self.pos].is_ascii_whitespace() {
            self.pos += 1;
        }
        if start == self.pos {
            return Err("unexpected end of header".to_string());
        }
        Ok(&self.data[start..self.pos])
    }

    fn number(&mut self) -> Result<usize, String> {
        let token = self.token()?;
        std::str::from_utf8(token)
            .ok()
            .and_then(|t| t.parse().ok())
            .ok_or_else(|| format!("malformed header field {:?}", String::from_utf8_lossy(token)))
    }

    /// Consume the single whitespace byte after the header and return the
    /// pixel body.
    fn into_body(mut self) -> Result<&'a [u8], String> {
        if self.pos >= self.data.len() || !self.data[self.pos].is_ascii_whitespace() {
            return Err("missing separator before pixel data".to_string());
        }
        self.pos += 1;
        Ok(&self.data[self.pos..])
    }
}
