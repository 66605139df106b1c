//! The GDI handle table: a direct table of type-tagged, reuse-counted
//! entries over per-kind object pools, plus the stock object set.
//!
//! Pools are preallocated to their expected sizes and grow past that on
//! exhaustion; an overflow allocation is an ordinary slot, so the
//! reuse-counter discipline covers it like any other. Stock objects live
//! outside the pools and their handles are synthesized once at init.

use log::{debug, warn};
use ntbox_abi::color::{rgb, ColorRef};
use ntbox_abi::gdi::{obj, stock, SHARED_ENTRY_SIZE};
use ntbox_abi::handle::{
    gdi_handle_index, gdi_handle_is_stock, gdi_handle_reuse, gdi_handle_type, gdi_make_handle,
    gdi_make_stock_handle, GdiHandle, MAX_GDI_HANDLES,
};

use crate::dc::{Dc, DcKind, DcSurface};
use crate::objects::{Bitmap, Brush, Font, Palette, Pen, PenStyle, Region};

pub const DC_POOL_SIZE: usize = 64;
pub const BRUSH_POOL_SIZE: usize = 256;
pub const PEN_POOL_SIZE: usize = 128;
pub const FONT_POOL_SIZE: usize = 64;
pub const BITMAP_POOL_SIZE: usize = 128;
pub const REGION_POOL_SIZE: usize = 128;
pub const PALETTE_POOL_SIZE: usize = 16;

/// Fixed-size object pool with a growable overflow tail.
pub struct Pool<T> {
    slots: Vec<Option<T>>,
    preallocated: usize,
}

impl<T> Pool<T> {
    fn with_capacity(n: usize) -> Pool<T> {
        Pool {
            slots: (0..n).map(|_| None).collect(),
            preallocated: n,
        }
    }

    fn alloc(&mut self, value: T) -> u32 {
        match self.slots.iter().position(Option::is_none) {
            Some(i) => {
                self.slots[i] = Some(value);
                i as u32
            }
            None => {
                self.slots.push(Some(value));
                (self.slots.len() - 1) as u32
            }
        }
    }

    fn free(&mut self, idx: u32) -> Option<T> {
        self.slots.get_mut(idx as usize).and_then(Option::take)
    }

    pub fn get(&self, idx: u32) -> Option<&T> {
        self.slots.get(idx as usize).and_then(Option::as_ref)
    }

    pub fn get_mut(&mut self, idx: u32) -> Option<&mut T> {
        self.slots.get_mut(idx as usize).and_then(Option::as_mut)
    }

    pub fn live_count(&self) -> usize {
        self.slots.iter().filter(|s| s.is_some()).count()
    }

    pub fn overflowed(&self) -> bool {
        self.slots.len() > self.preallocated
    }
}

#[derive(Copy, Clone, Default)]
struct HandleEntry {
    /// Pool slot of the object this entry points at.
    slot: u32,
    ty: u8,
    #[allow(dead_code)]
    flags: u8,
    reuse: u8,
    in_use: bool,
}

pub struct GdiHandleTable {
    entries: Vec<HandleEntry>,
    next_free: usize,
    handle_count: usize,

    pub dcs: Pool<Dc>,
    pub brushes: Pool<Brush>,
    pub pens: Pool<Pen>,
    pub fonts: Pool<Font>,
    pub bitmaps: Pool<Bitmap>,
    pub regions: Pool<Region>,
    pub palettes: Pool<Palette>,

    stock_brushes: [Brush; 6],
    stock_pens: [Pen; 3],
    stock_fonts: [Option<Font>; 8],
    stock_palette: Palette,
    stock_handles: [GdiHandle; stock::COUNT as usize],

    /// Live colors behind the DC_BRUSH / DC_PEN stock objects.
    pub dc_brush_color: ColorRef,
    pub dc_pen_color: ColorRef,
}

impl GdiHandleTable {
    pub fn new() -> GdiHandleTable {
        let mut entries = vec![HandleEntry::default(); MAX_GDI_HANDLES];
        // Index 0 is the NULL handle.
        entries[0].in_use = true;

        let mut table = GdiHandleTable {
            entries,
            next_free: 1,
            handle_count: 1,
            dcs: Pool::with_capacity(DC_POOL_SIZE),
            brushes: Pool::with_capacity(BRUSH_POOL_SIZE),
            pens: Pool::with_capacity(PEN_POOL_SIZE),
            fonts: Pool::with_capacity(FONT_POOL_SIZE),
            bitmaps: Pool::with_capacity(BITMAP_POOL_SIZE),
            regions: Pool::with_capacity(REGION_POOL_SIZE),
            palettes: Pool::with_capacity(PALETTE_POOL_SIZE),
            stock_brushes: [
                Brush::solid(rgb(255, 255, 255)),
                Brush::solid(rgb(192, 192, 192)),
                Brush::solid(rgb(128, 128, 128)),
                Brush::solid(rgb(64, 64, 64)),
                Brush::solid(rgb(0, 0, 0)),
                Brush::null(),
            ],
            stock_pens: [
                Pen::new(PenStyle::Solid, 1, rgb(255, 255, 255)),
                Pen::new(PenStyle::Solid, 1, rgb(0, 0, 0)),
                Pen::new(PenStyle::Null, 0, 0),
            ],
            stock_fonts: Self::stock_fonts(),
            stock_palette: Palette::default(),
            stock_handles: [0; stock::COUNT as usize],
            dc_brush_color: rgb(255, 255, 255),
            dc_pen_color: rgb(0, 0, 0),
        };
        table.init_stock_handles();
        debug!(
            "GDI handle table ready ({} handles, {} stock objects)",
            MAX_GDI_HANDLES,
            stock::COUNT
        );
        table
    }

    fn stock_fonts() -> [Option<Font>; 8] {
        [
            Some(Font::new("Terminal", 16, 8, 400, 0x31)),
            Some(Font::new("Courier", 16, 8, 400, 0x31)),
            Some(Font::new("MS Sans Serif", 16, 8, 400, 0x22)),
            Some(Font::new("System", 16, 8, 700, 0x22)),
            Some(Font::new("System", 16, 8, 400, 0x22)),
            Some(Font::new("Fixedsys", 16, 8, 400, 0x31)),
            Some(Font::new("MS Shell Dlg", 13, 8, 400, 0x22)),
            None,
        ]
    }

    /// Stock-index -> font array slot for the seven named stock fonts.
    fn stock_font_slot(index: usize) -> Option<usize> {
        match index as u32 {
            stock::OEM_FIXED_FONT => Some(0),
            stock::ANSI_FIXED_FONT => Some(1),
            stock::ANSI_VAR_FONT => Some(2),
            stock::SYSTEM_FONT => Some(3),
            stock::DEVICE_DEFAULT_FONT => Some(4),
            stock::SYSTEM_FIXED_FONT => Some(5),
            stock::DEFAULT_GUI_FONT => Some(6),
            _ => None,
        }
    }

    fn init_stock_handles(&mut self) {
        for i in 0..6u16 {
            self.stock_handles[i as usize] = gdi_make_stock_handle(i, obj::BRUSH);
        }
        for i in 0..3u16 {
            self.stock_handles[(stock::WHITE_PEN + i as u32) as usize] =
                gdi_make_stock_handle(i, obj::PEN);
        }
        for index in 0..stock::COUNT as usize {
            if let Some(slot) = Self::stock_font_slot(index) {
                self.stock_handles[index] = gdi_make_stock_handle(slot as u16, obj::FONT);
            }
        }
        self.stock_handles[stock::DEFAULT_PALETTE as usize] =
            gdi_make_stock_handle(0, obj::PALETTE);
        self.stock_handles[stock::DC_BRUSH as usize] =
            gdi_make_stock_handle(stock::DC_BRUSH as u16, obj::BRUSH);
        self.stock_handles[stock::DC_PEN as usize] =
            gdi_make_stock_handle(stock::DC_PEN as u16, obj::PEN);
    }

    pub fn stock_handle(&self, index: u32) -> GdiHandle {
        if index >= stock::COUNT {
            return 0;
        }
        self.stock_handles[index as usize]
    }

    pub fn handle_count(&self) -> usize {
        self.handle_count
    }

    /// Allocate a table entry for `slot`, bumping the reuse counter the
    /// slot index carried last time around.
    fn alloc_handle(&mut self, slot: u32, ty: u8) -> Option<GdiHandle> {
        let index = self.find_free_index()?;
        let entry = &mut self.entries[index];
        entry.slot = slot;
        entry.ty = ty;
        entry.reuse = entry.reuse.wrapping_add(1) & 0x7F;
        entry.in_use = true;
        let reuse = entry.reuse;

        self.next_free = if index + 1 >= MAX_GDI_HANDLES { 1 } else { index + 1 };
        self.handle_count += 1;
        Some(gdi_make_handle(index as u16, ty, reuse))
    }

    fn find_free_index(&self) -> Option<usize> {
        (self.next_free..MAX_GDI_HANDLES)
            .chain(1..self.next_free)
            .find(|&i| !self.entries[i].in_use)
            .or_else(|| {
                warn!("GDI handle table exhausted");
                None
            })
    }

    /// Release a table entry; returns the pool slot the caller must free.
    /// Stock handles are refused.
    fn free_handle(&mut self, handle: GdiHandle) -> Option<u32> {
        if handle == 0 || gdi_handle_is_stock(handle) {
            return None;
        }
        let index = gdi_handle_index(handle);
        if index >= MAX_GDI_HANDLES {
            return None;
        }
        let entry = &mut self.entries[index];
        if !entry.in_use || entry.ty != gdi_handle_type(handle) {
            return None;
        }
        let slot = entry.slot;
        entry.in_use = false;
        entry.slot = 0;
        entry.ty = 0;
        self.handle_count -= 1;
        if index < self.next_free {
            self.next_free = index;
        }
        Some(slot)
    }

    /// Resolve a non-stock handle to its pool slot: in-use, matching
    /// type, matching 7-bit reuse counter.
    fn lookup(&self, handle: GdiHandle, expected: u8) -> Option<u32> {
        if handle == 0 || gdi_handle_is_stock(handle) {
            return None;
        }
        let entry = self.entries.get(gdi_handle_index(handle))?;
        if !entry.in_use || entry.ty != expected || entry.reuse != gdi_handle_reuse(handle) {
            return None;
        }
        Some(entry.slot)
    }

    pub fn is_valid(&self, handle: GdiHandle) -> bool {
        if handle == 0 {
            return false;
        }
        if gdi_handle_is_stock(handle) {
            return true;
        }
        self.entries
            .get(gdi_handle_index(handle))
            .is_some_and(|e| e.in_use)
    }

    /// Object type of any live handle (no reuse validation, matching the
    /// generic-object query path).
    pub fn type_of(&self, handle: GdiHandle) -> Option<u8> {
        if handle == 0 {
            return None;
        }
        if gdi_handle_is_stock(handle) {
            return Some(gdi_handle_type(handle));
        }
        let entry = self.entries.get(gdi_handle_index(handle))?;
        entry.in_use.then_some(entry.ty)
    }

    /// Guest-visible shared index page entry for this handle's index.
    pub fn shared_entry(&self, handle: GdiHandle, process_id: u16) -> [u8; SHARED_ENTRY_SIZE] {
        let mut out = [0u8; SHARED_ENTRY_SIZE];
        let index = gdi_handle_index(handle);
        if let Some(entry) = self.entries.get(index) {
            if entry.in_use {
                out[4..6].copy_from_slice(&process_id.to_le_bytes());
                out[6..8].copy_from_slice(&1u16.to_le_bytes());
                out[8..10].copy_from_slice(&(entry.reuse as u16).to_le_bytes());
                out[10..12].copy_from_slice(&(entry.ty as u16).to_le_bytes());
            }
        }
        out
    }

    // ---- brushes / pens / fonts -------------------------------------

    pub fn create_solid_brush(&mut self, color: ColorRef) -> GdiHandle {
        let slot = self.brushes.alloc(Brush::solid(color));
        match self.alloc_handle(slot, obj::BRUSH) {
            Some(h) => h,
            None => {
                self.brushes.free(slot);
                0
            }
        }
    }

    pub fn create_pattern_brush(&mut self, pattern: GdiHandle) -> GdiHandle {
        if self.lookup(pattern, obj::BITMAP).is_none() {
            return 0;
        }
        let brush = Brush {
            style: crate::objects::BrushStyle::Pattern,
            color: 0,
            hatch_style: 0,
            pattern: Some(pattern),
        };
        let slot = self.brushes.alloc(brush);
        match self.alloc_handle(slot, obj::BRUSH) {
            Some(h) => h,
            None => {
                self.brushes.free(slot);
                0
            }
        }
    }

    pub fn create_pen(&mut self, style: u32, width: i32, color: ColorRef) -> GdiHandle {
        let style = PenStyle::from_raw(style).unwrap_or(PenStyle::Solid);
        let slot = self.pens.alloc(Pen::new(style, width, color));
        match self.alloc_handle(slot, obj::PEN) {
            Some(h) => h,
            None => {
                self.pens.free(slot);
                0
            }
        }
    }

    pub fn create_font(&mut self, font: Font) -> GdiHandle {
        let slot = self.fonts.alloc(font);
        match self.alloc_handle(slot, obj::FONT) {
            Some(h) => h,
            None => {
                self.fonts.free(slot);
                0
            }
        }
    }

    /// Brushes resolve by value; the DC_BRUSH stock object carries the
    /// table's live color.
    pub fn resolve_brush(&self, handle: GdiHandle) -> Option<Brush> {
        if handle == 0 {
            return None;
        }
        if gdi_handle_is_stock(handle) {
            if gdi_handle_type(handle) != obj::BRUSH {
                return None;
            }
            return match gdi_handle_index(handle) {
                i @ 0..=5 => Some(self.stock_brushes[i]),
                i if i == stock::DC_BRUSH as usize => Some(Brush::solid(self.dc_brush_color)),
                _ => None,
            };
        }
        self.lookup(handle, obj::BRUSH)
            .and_then(|slot| self.brushes.get(slot).copied())
    }

    pub fn resolve_pen(&self, handle: GdiHandle) -> Option<Pen> {
        if handle == 0 {
            return None;
        }
        if gdi_handle_is_stock(handle) {
            if gdi_handle_type(handle) != obj::PEN {
                return None;
            }
            return match gdi_handle_index(handle) {
                i @ 0..=2 => Some(self.stock_pens[i]),
                i if i == stock::DC_PEN as usize => {
                    Some(Pen::new(PenStyle::Solid, 1, self.dc_pen_color))
                }
                _ => None,
            };
        }
        self.lookup(handle, obj::PEN)
            .and_then(|slot| self.pens.get(slot).copied())
    }

    pub fn resolve_font(&self, handle: GdiHandle) -> Option<Font> {
        if handle == 0 {
            return None;
        }
        if gdi_handle_is_stock(handle) {
            if gdi_handle_type(handle) != obj::FONT {
                return None;
            }
            return self
                .stock_fonts
                .get(gdi_handle_index(handle))
                .and_then(|f| *f);
        }
        self.lookup(handle, obj::FONT)
            .and_then(|slot| self.fonts.get(slot).copied())
    }

    // ---- bitmaps / regions / palettes -------------------------------

    pub fn create_bitmap(&mut self, width: i32, height: i32, planes: u32, bpp: u32) -> GdiHandle {
        let slot = self.bitmaps.alloc(Bitmap::new(width, height, planes, bpp));
        match self.alloc_handle(slot, obj::BITMAP) {
            Some(h) => h,
            None => {
                self.bitmaps.free(slot);
                0
            }
        }
    }

    pub fn bitmap(&self, handle: GdiHandle) -> Option<&Bitmap> {
        self.lookup(handle, obj::BITMAP)
            .and_then(|slot| self.bitmaps.get(slot))
    }

    pub fn bitmap_mut(&mut self, handle: GdiHandle) -> Option<&mut Bitmap> {
        self.lookup(handle, obj::BITMAP)
            .and_then(|slot| self.bitmaps.get_mut(slot))
    }

    pub fn create_rect_rgn(&mut self, bounds: ntbox_abi::geom::Rect) -> GdiHandle {
        let slot = self.regions.alloc(Region::rect(bounds));
        match self.alloc_handle(slot, obj::REGION) {
            Some(h) => h,
            None => {
                self.regions.free(slot);
                0
            }
        }
    }

    pub fn region(&self, handle: GdiHandle) -> Option<&Region> {
        self.lookup(handle, obj::REGION)
            .and_then(|slot| self.regions.get(slot))
    }

    pub fn region_mut(&mut self, handle: GdiHandle) -> Option<&mut Region> {
        self.lookup(handle, obj::REGION)
            .and_then(|slot| self.regions.get_mut(slot))
    }

    pub fn create_palette(&mut self, palette: Palette) -> GdiHandle {
        let slot = self.palettes.alloc(palette);
        match self.alloc_handle(slot, obj::PALETTE) {
            Some(h) => h,
            None => {
                self.palettes.free(slot);
                0
            }
        }
    }

    pub fn palette(&self, handle: GdiHandle) -> Option<&Palette> {
        if gdi_handle_is_stock(handle) {
            if gdi_handle_type(handle) == obj::PALETTE && gdi_handle_index(handle) == 0 {
                return Some(&self.stock_palette);
            }
            return None;
        }
        self.lookup(handle, obj::PALETTE)
            .and_then(|slot| self.palettes.get(slot))
    }

    // ---- DCs ---------------------------------------------------------

    fn select_defaults(&self, dc: &mut Dc) {
        dc.state.brush = self.stock_handles[stock::WHITE_BRUSH as usize];
        dc.state.pen = self.stock_handles[stock::BLACK_PEN as usize];
        dc.state.font = self.stock_handles[stock::SYSTEM_FONT as usize];
        dc.state.prev_brush = dc.state.brush;
        dc.state.prev_pen = dc.state.pen;
        dc.state.prev_font = dc.state.font;
    }

    fn install_dc(&mut self, dc: Dc) -> GdiHandle {
        let slot = self.dcs.alloc(dc);
        match self.alloc_handle(slot, obj::DC) {
            Some(h) => {
                self.dcs.get_mut(slot).expect("just allocated").handle = h;
                h
            }
            None => {
                self.dcs.free(slot);
                0
            }
        }
    }

    /// Display DC drawing on the back-end framebuffer.
    pub fn create_display_dc(&mut self, width: i32, height: i32, hwnd: u32) -> GdiHandle {
        let mut dc = Dc::new(DcKind::Direct);
        dc.hwnd = hwnd;
        dc.state.surface = DcSurface::Screen;
        dc.state.width = width;
        dc.state.height = height;
        self.select_defaults(&mut dc);
        self.install_dc(dc)
    }

    /// Memory DC; starts on the 1×1 sentinel surface until a bitmap is
    /// selected. Copies a few attributes from the reference DC.
    pub fn create_memory_dc(&mut self, reference: GdiHandle) -> GdiHandle {
        let mut dc = Dc::new(DcKind::Memory);
        if let Some(r) = self.dc(reference) {
            dc.state.text_color = r.state.text_color;
            dc.state.bk_color = r.state.bk_color;
            dc.state.bk_mode = r.state.bk_mode;
            dc.state.map_mode = r.state.map_mode;
            dc.state.bits_per_pixel = r.state.bits_per_pixel;
        }
        self.select_defaults(&mut dc);
        self.install_dc(dc)
    }

    pub fn dc(&self, handle: GdiHandle) -> Option<&Dc> {
        self.lookup(handle, obj::DC).and_then(|slot| self.dcs.get(slot))
    }

    pub fn dc_mut(&mut self, handle: GdiHandle) -> Option<&mut Dc> {
        self.lookup(handle, obj::DC)
            .and_then(|slot| self.dcs.get_mut(slot))
    }

    pub fn delete_dc(&mut self, handle: GdiHandle) -> bool {
        let Some(slot) = self.free_handle(handle) else {
            return false;
        };
        if let Some(dc) = self.dcs.free(slot) {
            // The saved-state chain dies with the DC; the selected bitmap
            // becomes selectable elsewhere again.
            if let DcSurface::Bitmap(hbm) = dc.state.surface {
                if let Some(bmp) = self.bitmap_mut(hbm) {
                    bmp.selected_into = None;
                }
            }
        }
        true
    }

    /// Delete any non-stock object. Bitmaps still selected into a DC and
    /// stock handles are refused.
    pub fn delete_object(&mut self, handle: GdiHandle) -> bool {
        if gdi_handle_is_stock(handle) {
            return false;
        }
        let Some(ty) = self.type_of(handle) else {
            return false;
        };
        match ty {
            obj::DC => self.delete_dc(handle),
            obj::BITMAP => {
                if self.bitmap(handle).is_some_and(|b| b.selected_into.is_some()) {
                    return false;
                }
                self.free_handle(handle)
                    .map(|slot| self.bitmaps.free(slot))
                    .is_some()
            }
            obj::BRUSH => self
                .free_handle(handle)
                .map(|slot| self.brushes.free(slot))
                .is_some(),
            obj::PEN => self
                .free_handle(handle)
                .map(|slot| self.pens.free(slot))
                .is_some(),
            obj::FONT => self
                .free_handle(handle)
                .map(|slot| self.fonts.free(slot))
                .is_some(),
            obj::REGION => self
                .free_handle(handle)
                .map(|slot| self.regions.free(slot))
                .is_some(),
            obj::PALETTE => self
                .free_handle(handle)
                .map(|slot| self.palettes.free(slot))
                .is_some(),
            _ => self.free_handle(handle).is_some(),
        }
    }

    // ---- selection ---------------------------------------------------

    pub fn select_brush(&mut self, hdc: GdiHandle, hbrush: GdiHandle) -> GdiHandle {
        if self.resolve_brush(hbrush).is_none() {
            return 0;
        }
        let Some(dc) = self.dc_mut(hdc) else {
            return 0;
        };
        let previous = dc.state.prev_brush;
        dc.state.brush = hbrush;
        dc.state.prev_brush = hbrush;
        previous
    }

    pub fn select_pen(&mut self, hdc: GdiHandle, hpen: GdiHandle) -> GdiHandle {
        if self.resolve_pen(hpen).is_none() {
            return 0;
        }
        let Some(dc) = self.dc_mut(hdc) else {
            return 0;
        };
        let previous = dc.state.prev_pen;
        dc.state.pen = hpen;
        dc.state.prev_pen = hpen;
        previous
    }

    pub fn select_font(&mut self, hdc: GdiHandle, hfont: GdiHandle) -> GdiHandle {
        if self.resolve_font(hfont).is_none() {
            return 0;
        }
        let Some(dc) = self.dc_mut(hdc) else {
            return 0;
        };
        let previous = dc.state.prev_font;
        dc.state.font = hfont;
        dc.state.prev_font = hfont;
        previous
    }

    /// Bitmap selection is memory-DC only and a bitmap can be selected
    /// into at most one DC; the DC takes the bitmap's geometry.
    pub fn select_bitmap(&mut self, hdc: GdiHandle, hbitmap: GdiHandle) -> GdiHandle {
        let Some(dc) = self.dc(hdc) else {
            return 0;
        };
        if dc.kind != DcKind::Memory {
            return 0;
        }
        let old_surface = dc.state.surface;
        let previous = dc.state.prev_bitmap;

        let Some(bmp) = self.bitmap(hbitmap) else {
            return 0;
        };
        if bmp.selected_into.is_some_and(|owner| owner != hdc) {
            return 0;
        }
        let (w, h, bpp) = (bmp.width, bmp.height, bmp.bits_per_pixel);

        if let DcSurface::Bitmap(old) = old_surface {
            if let Some(old_bmp) = self.bitmap_mut(old) {
                old_bmp.selected_into = None;
            }
        }
        self.bitmap_mut(hbitmap).expect("checked above").selected_into = Some(hdc);

        let dc = self.dc_mut(hdc).expect("checked above");
        dc.state.surface = DcSurface::Bitmap(hbitmap);
        dc.state.width = w;
        dc.state.height = h;
        dc.state.bits_per_pixel = bpp;
        dc.state.bitmap = hbitmap;
        dc.state.prev_bitmap = hbitmap;
        previous
    }

    pub fn select_palette(&mut self, hdc: GdiHandle, hpalette: GdiHandle) -> GdiHandle {
        if self.dc(hdc).is_none() || self.palette(hpalette).is_none() {
            return 0;
        }
        self.stock_handles[stock::DEFAULT_PALETTE as usize]
    }

    /// Generic SelectObject dispatching on the handle's type nibble.
    pub fn select_object(&mut self, hdc: GdiHandle, handle: GdiHandle) -> GdiHandle {
        match self.type_of(handle) {
            Some(t) if t == obj::BRUSH => self.select_brush(hdc, handle),
            Some(t) if t == obj::PEN => self.select_pen(hdc, handle),
            Some(t) if t == obj::FONT => self.select_font(hdc, handle),
            Some(t) if t == obj::BITMAP => self.select_bitmap(hdc, handle),
            Some(t) if t == obj::PALETTE => self.select_palette(hdc, handle),
            _ => 0,
        }
    }

    pub fn save_dc(&mut self, hdc: GdiHandle) -> i32 {
        self.dc_mut(hdc).map_or(0, Dc::save)
    }

    pub fn restore_dc(&mut self, hdc: GdiHandle, level: i32) -> bool {
        self.dc_mut(hdc).is_some_and(|dc| dc.restore(level))
    }
}

impl Default for GdiHandleTable {
    fn default() -> Self {
        GdiHandleTable::new()
    }
}
