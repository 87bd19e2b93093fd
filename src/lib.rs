// ============================================================================
// AIRBRUSH — soft-brush raster painting with device-depth display reduction
// ============================================================================

pub mod brush;
pub mod canvas;
pub mod cli;
pub mod color;
pub mod cursor;
pub mod display;
pub mod io;
pub mod logger;
pub mod session;
