use std::process::ExitCode;
use std::time::{Duration, Instant};

use clap::Parser;
use minifb::{Key, KeyRepeat, MouseButton, MouseMode, Window, WindowOptions};

use airbrush::brush::BrushMode;
use airbrush::canvas::{Pixel, Rect};
use airbrush::cli::CliArgs;
use airbrush::display::{ChannelMode, ChannelOrder, DeviceFrame, DisplayCaps, DisplaySurface};
use airbrush::session::{DEFAULT_CANVAS_SIZE, PREVIEW_CANVAS_SIZE, PaintSession, resolve_initial_choice};
use airbrush::{io, log_err, log_info, logger};

/// Hue step per arrow key press, in degrees.
const HUE_STEP: f32 = 10.0;
/// Saturation / value step per key press.
const SV_STEP: f32 = 0.05;
/// Thickness step per key press.
const THICKNESS_STEP: f32 = 0.1;

fn main() -> ExitCode {
    let args = CliArgs::parse();
    if let Err(e) = args.validate() {
        eprintln!("airbrush: {}", e);
        return ExitCode::FAILURE;
    }
    logger::init(args.verbose);

    // Headless conversion: load, save, done. No window is created.
    if let (Some(input), Some(output)) = (&args.input, &args.output) {
        return match io::load_any(input)
            .and_then(|img| io::save_ppm(output, img.width, img.height, &img.pixels))
        {
            Ok(()) => {
                println!("{} -> {}", input.display(), output.display());
                ExitCode::SUCCESS
            }
            Err(e) => {
                eprintln!("airbrush: {}", e);
                ExitCode::FAILURE
            }
        };
    }

    match run_editor(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            // Unsupported display capability and window failures land here:
            // fatal, no degraded fallback.
            log_err!("{}", e);
            eprintln!("airbrush: {}", e);
            ExitCode::FAILURE
        }
    }
}

// ============================================================================
// MINIFB DISPLAY SURFACE
// ============================================================================

/// One minifb window presenting a device frame. The window itself always
/// wants `0x00RRGGBB`, so lower depths are expanded on blit — the same job
/// an X server does for a client-side image at those depths.
struct MinifbSurface {
    window: Window,
    caps: DisplayCaps,
    buffer: Vec<u32>,
    width: usize,
    height: usize,
}

impl MinifbSurface {
    fn new(title: &str, width: usize, height: usize, caps: DisplayCaps) -> Result<Self, String> {
        let mut window = Window::new(title, width, height, WindowOptions::default())
            .map_err(|e| format!("cannot open window {:?}: {}", title, e))?;
        window.set_target_fps(120);
        Ok(MinifbSurface {
            window,
            caps,
            buffer: vec![0; width * height],
            width,
            height,
        })
    }

    /// Push the staged buffer to the screen.
    fn pump(&mut self) -> Result<(), String> {
        self.window
            .update_with_buffer(&self.buffer, self.width, self.height)
            .map_err(|e| format!("window update failed: {}", e))
    }

    fn expand(&self, frame: &DeviceFrame, palette: &[Pixel], i: usize) -> u32 {
        match frame {
            DeviceFrame::Packed32(buf) => match self.caps.order {
                ChannelOrder::Rgb => buf[i],
                // The frame is in the display's BGR order; swap for minifb.
                ChannelOrder::Bgr => {
                    let p = buf[i];
                    (p & 0x0000_ff00) | ((p & 0xff) << 16) | ((p >> 16) & 0xff)
                }
            },
            DeviceFrame::Packed16(buf) => {
                let w = buf[i] as u32;
                if self.caps.bits == 16 {
                    let (r, g, b) = ((w >> 11) & 0x1f, (w >> 5) & 0x3f, w & 0x1f);
                    (r << 19) | (g << 10) | (b << 3)
                } else {
                    let (r, g, b) = ((w >> 10) & 0x1f, (w >> 5) & 0x1f, w & 0x1f);
                    (r << 19) | (g << 11) | (b << 3)
                }
            }
            DeviceFrame::Indexed(buf) => palette[buf[i] as usize].to_0rgb(),
        }
    }
}

impl DisplaySurface for MinifbSurface {
    fn capabilities(&self) -> DisplayCaps {
        self.caps
    }

    fn blit(&mut self, frame: &DeviceFrame, frame_width: usize, palette: &[Pixel], rect: Rect) {
        let frame_len = match frame {
            DeviceFrame::Packed32(b) => b.len(),
            DeviceFrame::Packed16(b) => b.len(),
            DeviceFrame::Indexed(b) => b.len(),
        };
        let frame_height = frame_len / frame_width.max(1);
        if (self.width, self.height) != (frame_width, frame_height) {
            self.width = frame_width;
            self.height = frame_height;
            self.buffer = vec![0; frame_len];
        }
        for y in rect.y0..rect.y1.min(frame_height) {
            for x in rect.x0..rect.x1.min(frame_width) {
                let i = y * frame_width + x;
                self.buffer[i] = self.expand(frame, palette, i);
            }
        }
    }
}

// ============================================================================
// EDITOR LOOP
// ============================================================================

fn run_editor(args: &CliArgs) -> Result<(), String> {
    let caps = DisplayCaps {
        bits: args.depth,
        order: if args.bgr { ChannelOrder::Bgr } else { ChannelOrder::Rgb },
    };

    // Decode the startup image once; it sizes the window and then becomes
    // the canvas contents.
    let startup = match &args.input {
        Some(path) => Some(io::load_any(path)?),
        None => None,
    };
    let (canvas_w, canvas_h) = startup
        .as_ref()
        .map(|img| (img.width, img.height))
        .unwrap_or((DEFAULT_CANVAS_SIZE, DEFAULT_CANVAS_SIZE));

    let canvas_win = MinifbSurface::new("airbrush", canvas_w, canvas_h, caps)?;
    let preview_win =
        MinifbSurface::new("airbrush — brush", PREVIEW_CANVAS_SIZE, PREVIEW_CANVAS_SIZE, caps)?;

    let mut session = PaintSession::new(canvas_win, preview_win, args.gamma)?;
    if let Some(img) = startup {
        session.adopt_image(img)?;
    }

    // The mode radio group, as the original UI declared it. First listed
    // wins if the configuration were ever inconsistent.
    let initial_mode = resolve_initial_choice(&[
        ("Overpainting", true),
        ("Tinting", false),
        ("Sampling", false),
    ]);
    session.set_brush_mode(BrushMode::all()[initial_mode]);
    session.set_display_mode(args.parse_channel_mode()?, !args.no_gamma_correct);

    log_info!(
        "editor up: {}x{} canvas, {}-bit display",
        session.canvas().width(),
        session.canvas().height(),
        args.depth
    );

    let puff_interval = Duration::from_millis(args.puff_interval_ms);
    let mut last_puff = Instant::now();
    let mut save_slot = 0u32;

    loop {
        {
            let (canvas_win, preview_win) = session.surfaces();
            if !canvas_win.window.is_open()
                || !preview_win.window.is_open()
                || canvas_win.window.is_key_down(Key::Escape)
            {
                break;
            }
        }

        let (pointer, button_down, keys) = poll_input(&mut session);
        handle_keys(&mut session, &keys, &mut save_slot);

        if let Some((x, y)) = pointer {
            session.on_pointer_event(x, y, button_down);
        }
        if button_down && last_puff.elapsed() >= puff_interval {
            session.tick();
            last_puff = Instant::now();
        }

        let (canvas_win, preview_win) = session.surfaces();
        canvas_win.pump()?;
        preview_win.pump()?;
    }
    Ok(())
}

/// Read pointer state and pressed keys from the canvas window.
fn poll_input(
    session: &mut PaintSession<MinifbSurface>,
) -> (Option<(i32, i32)>, bool, Vec<Key>) {
    let (canvas_win, _) = session.surfaces();
    let window = &canvas_win.window;
    // Pass mode reports positions outside the window too, which is how
    // the session learns the pointer has left the canvas.
    let pointer = window
        .get_mouse_pos(MouseMode::Pass)
        .map(|(x, y)| (x.floor() as i32, y.floor() as i32));
    let button_down = window.get_mouse_down(MouseButton::Left);
    let keys = window.get_keys_pressed(KeyRepeat::Yes);
    (pointer, button_down, keys)
}

fn handle_keys(session: &mut PaintSession<MinifbSurface>, keys: &[Key], save_slot: &mut u32) {
    for key in keys {
        let (hue, sat, val) = session.brush().hsv();
        let width = session.brush().width();
        let thickness = session.brush().thickness;
        let components = session.brush().components;
        match key {
            // Brush mode.
            Key::Key1 => session.set_brush_mode(BrushMode::Overpaint),
            Key::Key2 => session.set_brush_mode(BrushMode::Tint),
            Key::Key3 => session.set_brush_mode(BrushMode::Sample),

            // Color in HSV.
            Key::Left => session.set_brush_hsv(Some((hue - HUE_STEP).rem_euclid(360.0)), None, None),
            Key::Right => session.set_brush_hsv(Some((hue + HUE_STEP).rem_euclid(360.0)), None, None),
            Key::Up => session.set_brush_hsv(None, None, Some((val + SV_STEP).min(1.0))),
            Key::Down => session.set_brush_hsv(None, None, Some((val - SV_STEP).max(0.0))),
            Key::PageUp => session.set_brush_hsv(None, Some((sat + SV_STEP).min(1.0)), None),
            Key::PageDown => session.set_brush_hsv(None, Some((sat - SV_STEP).max(0.0)), None),

            // Geometry.
            Key::LeftBracket => session.set_brush_size(width - 1),
            Key::RightBracket => session.set_brush_size(width + 1),
            Key::Comma => session.set_brush_thickness(thickness - THICKNESS_STEP),
            Key::Period => session.set_brush_thickness(thickness + THICKNESS_STEP),

            // Tint components.
            Key::H => {
                let mut c = components;
                c.hue = !c.hue;
                session.set_components(c);
            }
            Key::J => {
                let mut c = components;
                c.sat = !c.sat;
                session.set_components(c);
            }
            Key::K => {
                let mut c = components;
                c.val = !c.val;
                session.set_components(c);
            }

            // Display mode.
            Key::C => {
                let modes = ChannelMode::all();
                let i = modes.iter().position(|m| *m == session.channel_mode()).unwrap_or(0);
                let next = modes[(i + 1) % modes.len()];
                let gamma = session.gamma_correct();
                session.set_display_mode(next, gamma);
            }
            Key::G => {
                let mode = session.channel_mode();
                let gamma = !session.gamma_correct();
                session.set_display_mode(mode, gamma);
            }

            // Canvas operations.
            Key::R => {
                if session.reset_canvas().is_err() {
                    log_err!("canvas reset failed");
                }
            }
            Key::F => session.fill_with_brush_color(),
            Key::O => {
                let path = std::path::PathBuf::from(format!("airbrush-{:03}.ppm", save_slot));
                match session.save_image(&path) {
                    Ok(()) => {
                        *save_slot += 1;
                        log_info!("wrote {}", path.display());
                    }
                    Err(e) => log_err!("save failed: {}", e),
                }
            }
            _ => {}
        }
    }
}
