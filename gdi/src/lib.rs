//! The GDI subsystem: object records, the bit-packed handle table, device
//! contexts and the software raster engine over ARGB8888 surfaces.
//!
//! Pixel buffers are owned by bitmap records or borrowed from the display
//! back-end; a device context never owns pixels, it names its surface and
//! the engine resolves that name for the duration of one operation.

#![forbid(unsafe_code)]

pub mod dc;
pub mod display;
pub mod engine;
pub mod handle_table;
pub mod objects;
pub mod raster;

pub use dc::{Dc, DcKind, DcState, DcSurface};
pub use display::{DisplayBackend, DisplayError, HeadlessDisplay};
pub use engine::GdiEngine;
pub use handle_table::GdiHandleTable;
pub use objects::{Bitmap, Brush, BrushStyle, Font, Palette, Pen, PenStyle, Region};
