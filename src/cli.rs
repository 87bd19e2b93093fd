// ============================================================================
// airbrush CLI — startup configuration and headless conversion
// ============================================================================
//
// Usage examples:
//   airbrush                         (ramp canvas, 24-bit window)
//   airbrush -i photo.ppm            (edit an existing image)
//   airbrush -i in.png -o out.ppm    (headless: convert and exit)
//   airbrush --depth 8 --gamma 1.8   (dithered 240-color palette display)

use std::path::PathBuf;

use clap::Parser;

use crate::display::ChannelMode;

/// Interactive raster painter with HSV-tinting brushes.
///
/// Without `--output` a window opens for painting; with it the input image
/// is converted to PPM headlessly and the process exits.
#[derive(Parser, Debug)]
#[command(
    name = "airbrush",
    about = "Paint on a raster canvas with overpainting and HSV-tinting brushes",
    long_about = "Paint on a raster canvas with overpainting and HSV-tinting brushes.\n\
                  The display path supports 24/16/15-bit truecolor and a dithered\n\
                  240-color indexed mode with optional gamma correction.\n\n\
                  Example:\n  \
                  airbrush --input photo.ppm --depth 8 --channel-mode red"
)]
pub struct CliArgs {
    /// Image to load into the canvas at startup (PPM, or any common
    /// raster format).
    #[arg(short, long, value_name = "FILE")]
    pub input: Option<PathBuf>,

    /// Headless mode: save the loaded image as PPM to this path and exit
    /// without opening a window. Requires --input.
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Monitor gamma used by the 8-bit palette. Must be positive.
    #[arg(long, default_value_t = 2.0, allow_negative_numbers = true)]
    pub gamma: f64,

    /// Display depth to negotiate: 24, 16, 15 or 8 bits per pixel.
    #[arg(long, default_value_t = 24, value_name = "BITS")]
    pub depth: u8,

    /// Treat the display as blue-green-red ordered (24-bit mode only).
    #[arg(long)]
    pub bgr: bool,

    /// Start with linear palette scaling instead of gamma correction
    /// (8-bit mode only).
    #[arg(long)]
    pub no_gamma_correct: bool,

    /// Initial channel mode: all, red, green or blue.
    #[arg(long, default_value = "all", value_name = "MODE")]
    pub channel_mode: String,

    /// Airbrush puff interval in milliseconds while the button is held.
    #[arg(long, default_value_t = 50, value_name = "MS")]
    pub puff_interval_ms: u64,

    /// Echo log lines to stderr as well as the session log file.
    #[arg(short, long)]
    pub verbose: bool,
}

impl CliArgs {
    /// Reject argument combinations the rest of startup must not see.
    pub fn validate(&self) -> Result<(), String> {
        if self.gamma <= 0.0 {
            return Err(format!("gamma must be positive, got {}", self.gamma));
        }
        if self.output.is_some() && self.input.is_none() {
            return Err("--output requires --input".to_string());
        }
        self.parse_channel_mode()?;
        Ok(())
    }

    /// The `--channel-mode` argument as the core enum.
    pub fn parse_channel_mode(&self) -> Result<ChannelMode, String> {
        match self.channel_mode.to_ascii_lowercase().as_str() {
            "all" => Ok(ChannelMode::AllColors),
            "red" => Ok(ChannelMode::OnlyRed),
            "green" => Ok(ChannelMode::OnlyGreen),
            "blue" => Ok(ChannelMode::OnlyBlue),
            other => Err(format!(
                "unknown channel mode {:?} (expected all, red, green or blue)",
                other
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // try_parse_from so a parse error fails the one test instead of
    // exiting the whole test binary.
    fn args(extra: &[&str]) -> CliArgs {
        CliArgs::try_parse_from(std::iter::once("airbrush").chain(extra.iter().copied()))
            .expect("arguments should parse")
    }

    #[test]
    fn defaults_validate() {
        let a = args(&[]);
        assert!(a.validate().is_ok());
        assert_eq!(a.depth, 24);
        assert_eq!(a.parse_channel_mode().unwrap(), ChannelMode::AllColors);
    }

    #[test]
    fn non_positive_gamma_rejected() {
        assert!(args(&["--gamma", "0"]).validate().is_err());
        // A negative value must parse (not trip clap's option detection)
        // and then fail validation with this crate's own diagnostic.
        let negative = args(&["--gamma", "-1.5"]);
        assert_eq!(negative.gamma, -1.5);
        assert!(negative.validate().is_err());
        assert!(args(&["--gamma", "1.8"]).validate().is_ok());
    }

    #[test]
    fn output_requires_input() {
        assert!(args(&["--output", "x.ppm"]).validate().is_err());
        assert!(args(&["--input", "a.ppm", "--output", "x.ppm"]).validate().is_ok());
    }

    #[test]
    fn channel_modes_parse() {
        assert_eq!(args(&["--channel-mode", "RED"]).parse_channel_mode().unwrap(), ChannelMode::OnlyRed);
        assert!(args(&["--channel-mode", "cyan"]).validate().is_err());
    }
}
