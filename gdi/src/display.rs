//! Display back-end contract and the headless implementation.
//!
//! The windowed back-end (SDL or similar) lives outside this workspace;
//! the engine only needs an ARGB8888 buffer, a present call, an event
//! pump, and a dirty flag. `HeadlessDisplay` owns a plain buffer and is
//! what the tests draw on.

use thiserror::Error;

pub const MIN_DISPLAY_WIDTH: i32 = 320;
pub const MIN_DISPLAY_HEIGHT: i32 = 240;
pub const MAX_DISPLAY_WIDTH: i32 = 4096;
pub const MAX_DISPLAY_HEIGHT: i32 = 4096;

/// Classic desktop background fill.
pub const DESKTOP_COLOR: u32 = 0xFF3A_6EA5;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DisplayError {
    #[error("display size {0}x{1} out of range")]
    BadSize(i32, i32),
}

pub trait DisplayBackend {
    fn width(&self) -> i32;
    fn height(&self) -> i32;
    /// Row stride in 32-bit words.
    fn stride(&self) -> usize;

    fn framebuffer(&self) -> &[u32];
    fn framebuffer_mut(&mut self) -> &mut [u32];

    /// Push the buffer to the screen if dirty.
    fn present(&mut self);
    /// Drain host OS events; true when the user asked to quit.
    fn poll_events(&mut self) -> bool;
    fn invalidate(&mut self);
    fn is_dirty(&self) -> bool;
}

#[derive(Debug)]
pub struct HeadlessDisplay {
    width: i32,
    height: i32,
    pixels: Vec<u32>,
    dirty: bool,
    presents: u64,
    quit_requested: bool,
}

impl HeadlessDisplay {
    pub fn new(width: i32, height: i32) -> Result<HeadlessDisplay, DisplayError> {
        if !(MIN_DISPLAY_WIDTH..=MAX_DISPLAY_WIDTH).contains(&width)
            || !(MIN_DISPLAY_HEIGHT..=MAX_DISPLAY_HEIGHT).contains(&height)
        {
            return Err(DisplayError::BadSize(width, height));
        }
        Ok(HeadlessDisplay {
            width,
            height,
            pixels: vec![DESKTOP_COLOR; (width * height) as usize],
            dirty: true,
            presents: 0,
            quit_requested: false,
        })
    }

    pub fn present_count(&self) -> u64 {
        self.presents
    }

    pub fn request_quit(&mut self) {
        self.quit_requested = true;
    }
}

impl DisplayBackend for HeadlessDisplay {
    fn width(&self) -> i32 {
        self.width
    }

    fn height(&self) -> i32 {
        self.height
    }

    fn stride(&self) -> usize {
        self.width as usize
    }

    fn framebuffer(&self) -> &[u32] {
        &self.pixels
    }

    fn framebuffer_mut(&mut self) -> &mut [u32] {
        &mut self.pixels
    }

    fn present(&mut self) {
        if self.dirty {
            self.presents += 1;
            self.dirty = false;
        }
    }

    fn poll_events(&mut self) -> bool {
        self.quit_requested
    }

    fn invalidate(&mut self) {
        self.dirty = true;
    }

    fn is_dirty(&self) -> bool {
        self.dirty
    }
}
