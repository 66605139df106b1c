//! Device contexts: the mutable drawing state bundle.
//!
//! A DC names its surface instead of borrowing it: screen DCs draw on the
//! back-end framebuffer, memory DCs on their selected bitmap, and a
//! memory DC with nothing selected has the 1×1 sentinel surface where
//! drawing is a no-op. The save/restore stack is a LIFO of attribute
//! snapshots; the handle and the stack itself survive a restore.

use ntbox_abi::color::{rgb, ColorRef};
use ntbox_abi::gdi::{caps, ALTERNATE, BK_OPAQUE, BLACKONWHITE, MM_TEXT};
use ntbox_abi::geom::Point;
use ntbox_abi::handle::GdiHandle;

#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum DcKind {
    /// Screen/window DC drawing on the display framebuffer.
    Direct,
    /// Memory DC drawing on its selected bitmap.
    Memory,
    Info,
}

#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum DcSurface {
    Screen,
    Bitmap(GdiHandle),
    /// 1×1 sentinel for a memory DC with no bitmap selected.
    None,
}

/// Everything SaveDC snapshots. Selections are handles; the engine
/// resolves them per operation.
#[derive(Copy, Clone, Debug)]
pub struct DcState {
    pub surface: DcSurface,
    pub width: i32,
    pub height: i32,
    pub bits_per_pixel: u32,

    pub cur_x: i32,
    pub cur_y: i32,

    pub text_color: ColorRef,
    pub bk_color: ColorRef,
    pub bk_mode: u32,
    pub map_mode: u32,
    pub text_align: u32,
    pub rop2: u32,
    pub stretch_mode: u32,
    pub poly_fill_mode: u32,

    pub vp_org_x: i32,
    pub vp_org_y: i32,
    pub vp_ext_x: i32,
    pub vp_ext_y: i32,
    pub win_org_x: i32,
    pub win_org_y: i32,
    pub win_ext_x: i32,
    pub win_ext_y: i32,

    pub brush_org_x: i32,
    pub brush_org_y: i32,

    pub brush: GdiHandle,
    pub pen: GdiHandle,
    pub font: GdiHandle,
    pub bitmap: GdiHandle,
    pub palette: GdiHandle,
    pub clip_region: GdiHandle,

    pub prev_brush: GdiHandle,
    pub prev_pen: GdiHandle,
    pub prev_font: GdiHandle,
    pub prev_bitmap: GdiHandle,
}

impl Default for DcState {
    fn default() -> DcState {
        DcState {
            surface: DcSurface::None,
            width: 1,
            height: 1,
            bits_per_pixel: 32,
            cur_x: 0,
            cur_y: 0,
            text_color: rgb(0, 0, 0),
            bk_color: rgb(255, 255, 255),
            bk_mode: BK_OPAQUE,
            map_mode: MM_TEXT,
            text_align: 0,
            rop2: ntbox_abi::gdi::rop2::COPYPEN,
            stretch_mode: BLACKONWHITE,
            poly_fill_mode: ALTERNATE,
            vp_org_x: 0,
            vp_org_y: 0,
            vp_ext_x: 1,
            vp_ext_y: 1,
            win_org_x: 0,
            win_org_y: 0,
            win_ext_x: 1,
            win_ext_y: 1,
            brush_org_x: 0,
            brush_org_y: 0,
            brush: 0,
            pen: 0,
            font: 0,
            bitmap: 0,
            palette: 0,
            clip_region: 0,
            prev_brush: 0,
            prev_pen: 0,
            prev_font: 0,
            prev_bitmap: 0,
        }
    }
}

impl DcState {
    /// Logical-to-device translation, MM_TEXT map mode only:
    /// `d = l - win_org + vp_org`.
    pub fn lp_to_dp(&self, p: Point) -> Point {
        Point {
            x: p.x - self.win_org_x + self.vp_org_x,
            y: p.y - self.win_org_y + self.vp_org_y,
        }
    }

    pub fn dp_to_lp(&self, p: Point) -> Point {
        Point {
            x: p.x - self.vp_org_x + self.win_org_x,
            y: p.y - self.vp_org_y + self.win_org_y,
        }
    }
}

pub struct Dc {
    pub kind: DcKind,
    /// Handle value handed to the guest; preserved across restores.
    pub handle: GdiHandle,
    /// Owning window, 0 for the desktop.
    pub hwnd: u32,
    pub state: DcState,
    /// SaveDC stack; save level = index + 1.
    pub saved: Vec<DcState>,
    pub dirty: bool,
}

impl Dc {
    pub fn new(kind: DcKind) -> Dc {
        Dc {
            kind,
            handle: 0,
            hwnd: 0,
            state: DcState::default(),
            saved: Vec::new(),
            dirty: false,
        }
    }

    /// Push a snapshot, return the new (1-based) save level.
    pub fn save(&mut self) -> i32 {
        self.saved.push(self.state);
        self.saved.len() as i32
    }

    /// Restore to `level`: positive = absolute, negative = relative to the
    /// current level. Pops everything above the target.
    pub fn restore(&mut self, level: i32) -> bool {
        let depth = self.saved.len() as i32;
        let target = if level < 0 { depth + level + 1 } else { level };
        if target <= 0 || target > depth {
            return false;
        }
        self.saved.truncate(target as usize);
        // The snapshot replaces everything but the handle and the stack.
        self.state = self.saved.pop().expect("target level exists");
        true
    }

    pub fn save_level(&self) -> i32 {
        self.saved.len() as i32
    }

    pub fn device_caps(&self, index: u32) -> i32 {
        match index {
            caps::HORZRES => self.state.width,
            caps::VERTRES => self.state.height,
            caps::BITSPIXEL => self.state.bits_per_pixel as i32,
            caps::PLANES => 1,
            caps::NUMCOLORS => -1,
            caps::LOGPIXELSX | caps::LOGPIXELSY => 96,
            _ => 0,
        }
    }
}
