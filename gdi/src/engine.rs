//! DC-level drawing operations: resolve the DC's surface and selections,
//! apply the logical-to-device translation, clip, and hand the pixel work
//! to the raster primitives.
//!
//! The engine borrows the handle table and the display back-end for the
//! duration of one syscall. A DC's surface is resolved fresh for every
//! operation; when source and destination of a blit share a surface the
//! source rows are staged through a scratch buffer first, so the copy is
//! deterministic without aliased borrows (overlap order is undefined by
//! contract anyway).

use ntbox_abi::color::{argb_to_colorref, colorref_to_argb, ColorRef, CLR_INVALID};
use ntbox_abi::gdi::{rgn, rop3, NULLREGION, SIMPLEREGION};
use ntbox_abi::geom::{Point, Rect};
use ntbox_abi::handle::GdiHandle;

use crate::dc::{DcKind, DcState, DcSurface};
use crate::display::DisplayBackend;
use crate::handle_table::GdiHandleTable;
use crate::objects::{Brush, BrushStyle, PenStyle};
use crate::raster::{self, clip_to_bounds, Surface};

pub struct GdiEngine<'a> {
    pub table: &'a mut GdiHandleTable,
    pub display: &'a mut dyn DisplayBackend,
}

/// Logical-to-device translate then clip against the DC surface.
fn device_clip(
    state: &DcState,
    x: i32,
    y: i32,
    w: i32,
    h: i32,
) -> Option<(i32, i32, i32, i32, i32, i32)> {
    let dx = x + state.vp_org_x - state.win_org_x;
    let dy = y + state.vp_org_y - state.win_org_y;
    clip_to_bounds(state.width, state.height, dx, dy, w, h)
}

impl<'a> GdiEngine<'a> {
    pub fn new(table: &'a mut GdiHandleTable, display: &'a mut dyn DisplayBackend) -> Self {
        GdiEngine { table, display }
    }

    /// Run `f` over the DC's surface. Draw path: marks the DC dirty and
    /// invalidates the display for direct DCs. The sentinel surface of an
    /// unselected memory DC swallows the operation.
    fn with_surface<R>(
        &mut self,
        hdc: GdiHandle,
        f: impl FnOnce(&mut Surface, &DcState) -> R,
    ) -> Option<R> {
        let (state, kind) = {
            let dc = self.table.dc(hdc)?;
            (dc.state, dc.kind)
        };
        let result = match state.surface {
            DcSurface::Screen => {
                let (w, h, stride) = (self.display.width(), self.display.height(), self.display.stride());
                let mut surface = Surface {
                    pixels: self.display.framebuffer_mut(),
                    width: w,
                    height: h,
                    stride,
                };
                f(&mut surface, &state)
            }
            DcSurface::Bitmap(hbm) => {
                let bmp = self.table.bitmap_mut(hbm)?;
                let (w, h, stride) = (bmp.width, bmp.height, bmp.stride());
                let mut surface = Surface {
                    pixels: &mut bmp.pixels,
                    width: w,
                    height: h,
                    stride,
                };
                f(&mut surface, &state)
            }
            DcSurface::None => {
                let mut scratch = [0u32; 1];
                let mut surface = Surface { pixels: &mut scratch, width: 1, height: 1, stride: 1 };
                f(&mut surface, &state)
            }
        };
        if let Some(dc) = self.table.dc_mut(hdc) {
            dc.dirty = true;
        }
        if kind == DcKind::Direct {
            self.display.invalidate();
        }
        Some(result)
    }

    /// Read-only surface access; leaves dirty state alone.
    fn with_surface_ref<R>(
        &self,
        hdc: GdiHandle,
        f: impl FnOnce(&Surface, &DcState) -> R,
    ) -> Option<R> {
        let state = self.table.dc(hdc)?.state;
        match state.surface {
            DcSurface::Screen => {
                let (w, h, stride) = (self.display.width(), self.display.height(), self.display.stride());
                // Surface is a mutable view; clone the borrow away for reads.
                let mut pixels = self.display.framebuffer().to_vec();
                let surface = Surface { pixels: &mut pixels, width: w, height: h, stride };
                Some(f(&surface, &state))
            }
            DcSurface::Bitmap(hbm) => {
                let bmp = self.table.bitmap(hbm)?;
                let mut pixels = bmp.pixels.clone();
                let surface = Surface {
                    pixels: &mut pixels,
                    width: bmp.width,
                    height: bmp.height,
                    stride: bmp.stride(),
                };
                Some(f(&surface, &state))
            }
            DcSurface::None => {
                let mut scratch = [0u32; 1];
                let surface = Surface { pixels: &mut scratch, width: 1, height: 1, stride: 1 };
                Some(f(&surface, &state))
            }
        }
    }

    /// Stage a device-coordinate rectangle of the DC's surface, row-major.
    fn read_rows(&self, hdc: GdiHandle, x: i32, y: i32, w: i32, h: i32) -> Option<Vec<u32>> {
        self.with_surface_ref(hdc, |surface, _| {
            let mut out = Vec::with_capacity((w * h) as usize);
            for row in y..y + h {
                for col in x..x + w {
                    out.push(surface.get(col, row).unwrap_or(0));
                }
            }
            out
        })
    }

    fn pattern_color(&self, state: &DcState) -> u32 {
        match self.table.resolve_brush(state.brush) {
            Some(b) if b.style != BrushStyle::Null => colorref_to_argb(b.color),
            _ => 0xFFFF_FFFF,
        }
    }

    // ---- fills and blits --------------------------------------------

    pub fn pat_blt(&mut self, hdc: GdiHandle, x: i32, y: i32, w: i32, h: i32, rop: u32) -> bool {
        let Some(state) = self.table.dc(hdc).map(|d| d.state) else {
            return false;
        };
        let mut pat = 0xFFFF_FFFFu32;
        match self.table.resolve_brush(state.brush) {
            Some(b) if b.style == BrushStyle::Null => {
                if (rop >> 16) & 0xFF == 0 {
                    return true;
                }
            }
            Some(b) => pat = colorref_to_argb(b.color),
            None => {}
        }
        let Some((cx, cy, cw, ch, _, _)) = device_clip(&state, x, y, w, h) else {
            return true;
        };
        self.with_surface(hdc, |surface, _| {
            raster::pat_blt(surface, cx, cy, cw, ch, pat, rop);
        })
        .is_some()
    }

    /// Fill a logical-coordinate rectangle with an explicit brush
    /// (FillRect / FillWindow path). A null brush draws nothing.
    pub fn fill_rect(&mut self, hdc: GdiHandle, rect: Rect, brush: &Brush) -> bool {
        if brush.style == BrushStyle::Null {
            return true;
        }
        let Some(state) = self.table.dc(hdc).map(|d| d.state) else {
            return false;
        };
        let Some((cx, cy, cw, ch, _, _)) =
            device_clip(&state, rect.left, rect.top, rect.width(), rect.height())
        else {
            return true;
        };
        let argb = colorref_to_argb(brush.color);
        self.with_surface(hdc, |surface, _| {
            raster::fill_rect(surface, cx, cy, cw, ch, argb);
        })
        .is_some()
    }

    /// Frame a rectangle with four one-pixel edges of `brush`.
    pub fn frame_rect(&mut self, hdc: GdiHandle, rect: Rect, brush: &Brush) -> bool {
        let edges = [
            Rect::new(rect.left, rect.top, rect.right, rect.top + 1),
            Rect::new(rect.left, rect.bottom - 1, rect.right, rect.bottom),
            Rect::new(rect.left, rect.top + 1, rect.left + 1, rect.bottom - 1),
            Rect::new(rect.right - 1, rect.top + 1, rect.right, rect.bottom - 1),
        ];
        for edge in edges {
            if !self.fill_rect(hdc, edge, brush) {
                return false;
            }
        }
        true
    }

    /// Rectangle(): interior filled with the selected brush, boundary
    /// framed with the pen color expressed as a temporary solid brush.
    pub fn rectangle(&mut self, hdc: GdiHandle, left: i32, top: i32, right: i32, bottom: i32) -> bool {
        let Some(state) = self.table.dc(hdc).map(|d| d.state) else {
            return false;
        };
        if let Some(brush) = self.table.resolve_brush(state.brush) {
            if brush.style != BrushStyle::Null {
                let interior = Rect::new(left + 1, top + 1, right - 1, bottom - 1);
                self.fill_rect(hdc, interior, &brush);
            }
        }
        if let Some(pen) = self.table.resolve_pen(state.pen) {
            if pen.style != PenStyle::Null {
                let pen_brush = Brush::solid(pen.color);
                self.frame_rect(hdc, Rect::new(left, top, right, bottom), &pen_brush);
            }
        }
        true
    }

    pub fn invert_rect(&mut self, hdc: GdiHandle, rect: Rect) -> bool {
        let Some(state) = self.table.dc(hdc).map(|d| d.state) else {
            return false;
        };
        let Some((cx, cy, cw, ch, _, _)) =
            device_clip(&state, rect.left, rect.top, rect.width(), rect.height())
        else {
            return true;
        };
        self.with_surface(hdc, |surface, _| {
            raster::pat_blt(surface, cx, cy, cw, ch, 0, rop3::DSTINVERT);
        })
        .is_some()
    }

    /// BitBlt: destination clip first, the same delta shifts the source
    /// rectangle, then the source is clipped against its own surface.
    /// Without a usable source this degenerates to PatBlt.
    #[allow(clippy::too_many_arguments)]
    pub fn bit_blt(
        &mut self,
        hdc_dst: GdiHandle,
        dst_x: i32,
        dst_y: i32,
        w: i32,
        h: i32,
        hdc_src: GdiHandle,
        src_x: i32,
        src_y: i32,
        rop: u32,
    ) -> bool {
        let Some(dst_state) = self.table.dc(hdc_dst).map(|d| d.state) else {
            return false;
        };
        let src_state = self.table.dc(hdc_src).map(|d| d.state);
        let Some(src_state) = src_state else {
            return self.pat_blt(hdc_dst, dst_x, dst_y, w, h, rop);
        };

        let Some((mut cx, mut cy, mut cw, mut ch, ddx, ddy)) =
            device_clip(&dst_state, dst_x, dst_y, w, h)
        else {
            return true;
        };
        let mut sx = src_x + ddx;
        let mut sy = src_y + ddy;

        // Source clipping shifts the destination origin in lockstep.
        if sx < 0 {
            cw += sx;
            cx -= sx;
            sx = 0;
        }
        if sy < 0 {
            ch += sy;
            cy -= sy;
            sy = 0;
        }
        if sx + cw > src_state.width {
            cw = src_state.width - sx;
        }
        if sy + ch > src_state.height {
            ch = src_state.height - sy;
        }
        if cw <= 0 || ch <= 0 {
            return true;
        }

        let Some(rows) = self.read_rows(hdc_src, sx, sy, cw, ch) else {
            return false;
        };
        let pat = self.pattern_color(&dst_state);
        self.with_surface(hdc_dst, |surface, _| {
            raster::bit_blt_rows(surface, cx, cy, cw, ch, &rows, pat, rop);
        })
        .is_some()
    }

    /// Nearest-neighbour StretchBlt; raw device coordinates with
    /// per-pixel bounds checks on both surfaces.
    #[allow(clippy::too_many_arguments)]
    pub fn stretch_blt(
        &mut self,
        hdc_dst: GdiHandle,
        dst_x: i32,
        dst_y: i32,
        dst_w: i32,
        dst_h: i32,
        hdc_src: GdiHandle,
        src_x: i32,
        src_y: i32,
        src_w: i32,
        src_h: i32,
        rop: u32,
    ) -> bool {
        if dst_w <= 0 || dst_h <= 0 || src_w <= 0 || src_h <= 0 {
            return false;
        }
        let Some(dst_state) = self.table.dc(hdc_dst).map(|d| d.state) else {
            return false;
        };
        let Some(src_state) = self.table.dc(hdc_src).map(|d| d.state) else {
            return false;
        };

        // Stage the in-bounds part of the source rectangle.
        let Some((isx, isy, isw, ish, _, _)) =
            clip_to_bounds(src_state.width, src_state.height, src_x, src_y, src_w, src_h)
        else {
            return true;
        };
        let Some(rows) = self.read_rows(hdc_src, isx, isy, isw, ish) else {
            return false;
        };
        let pat = self.pattern_color(&dst_state);

        self.with_surface(hdc_dst, |surface, _| {
            for dy in 0..dst_h {
                let sy = src_y + (dy as i64 * src_h as i64 / dst_h as i64) as i32;
                if sy < isy || sy >= isy + ish {
                    continue;
                }
                for dx in 0..dst_w {
                    let sx = src_x + (dx as i64 * src_w as i64 / dst_w as i64) as i32;
                    if sx < isx || sx >= isx + isw {
                        continue;
                    }
                    let (px, py) = (dst_x + dx, dst_y + dy);
                    if !surface.contains(px, py) {
                        continue;
                    }
                    let sample = rows[((sy - isy) * isw + (sx - isx)) as usize];
                    if rop == rop3::SRCCOPY {
                        surface.put(px, py, sample);
                    } else {
                        let dst = surface.get(px, py).unwrap_or(0);
                        surface.put(px, py, raster::apply_rop3(rop, dst, sample, pat));
                    }
                }
            }
        })
        .is_some()
    }

    // ---- lines and pixels -------------------------------------------

    /// LineTo: Bresenham with the selected pen through the active ROP2;
    /// a null pen only moves the current position.
    pub fn line_to(&mut self, hdc: GdiHandle, x: i32, y: i32) -> bool {
        let Some(state) = self.table.dc(hdc).map(|d| d.state) else {
            return false;
        };
        let pen = self.table.resolve_pen(state.pen);
        let draws = pen.as_ref().is_some_and(|p| p.style != PenStyle::Null);

        if draws {
            let pen = pen.expect("checked above");
            let from = state.lp_to_dp(Point { x: state.cur_x, y: state.cur_y });
            let to = state.lp_to_dp(Point { x, y });
            let argb = colorref_to_argb(pen.color);
            self.with_surface(hdc, |surface, st| {
                raster::line(surface, from.x, from.y, to.x, to.y, argb, st.rop2);
            });
        }
        if let Some(dc) = self.table.dc_mut(hdc) {
            dc.state.cur_x = x;
            dc.state.cur_y = y;
            return true;
        }
        false
    }

    pub fn move_to(&mut self, hdc: GdiHandle, x: i32, y: i32) -> Option<Point> {
        let dc = self.table.dc_mut(hdc)?;
        let prev = Point { x: dc.state.cur_x, y: dc.state.cur_y };
        dc.state.cur_x = x;
        dc.state.cur_y = y;
        Some(prev)
    }

    pub fn polyline(&mut self, hdc: GdiHandle, points: &[Point]) -> bool {
        if points.len() < 2 {
            return false;
        }
        if self.move_to(hdc, points[0].x, points[0].y).is_none() {
            return false;
        }
        for p in &points[1..] {
            if !self.line_to(hdc, p.x, p.y) {
                return false;
            }
        }
        true
    }

    /// Polygon outline: a polyline closed back to the first vertex.
    /// Interior fill is out of scope for this engine.
    pub fn polygon(&mut self, hdc: GdiHandle, points: &[Point]) -> bool {
        if points.len() < 3 {
            return false;
        }
        if !self.polyline(hdc, points) {
            return false;
        }
        let last = points[points.len() - 1];
        self.move_to(hdc, last.x, last.y);
        self.line_to(hdc, points[0].x, points[0].y)
    }

    pub fn set_pixel(&mut self, hdc: GdiHandle, x: i32, y: i32, color: ColorRef) -> ColorRef {
        let Some(state) = self.table.dc(hdc).map(|d| d.state) else {
            return CLR_INVALID;
        };
        let p = state.lp_to_dp(Point { x, y });
        self.with_surface(hdc, |surface, _| match surface.get(p.x, p.y) {
            Some(prev) => {
                surface.put(p.x, p.y, colorref_to_argb(color));
                argb_to_colorref(prev)
            }
            None => CLR_INVALID,
        })
        .unwrap_or(CLR_INVALID)
    }

    pub fn get_pixel(&self, hdc: GdiHandle, x: i32, y: i32) -> ColorRef {
        let Some(state) = self.table.dc(hdc).map(|d| d.state) else {
            return CLR_INVALID;
        };
        let p = state.lp_to_dp(Point { x, y });
        self.with_surface_ref(hdc, |surface, _| {
            surface.get(p.x, p.y).map_or(CLR_INVALID, argb_to_colorref)
        })
        .unwrap_or(CLR_INVALID)
    }

    // ---- regions -----------------------------------------------------

    pub fn fill_rgn(&mut self, hdc: GdiHandle, hrgn: GdiHandle, hbrush: GdiHandle) -> bool {
        let Some(bounds) = self.table.region(hrgn).map(|r| r.bounds) else {
            return false;
        };
        let Some(brush) = self.table.resolve_brush(hbrush) else {
            return false;
        };
        self.fill_rect(hdc, bounds, &brush)
    }

    pub fn frame_rgn(&mut self, hdc: GdiHandle, hrgn: GdiHandle, hbrush: GdiHandle) -> bool {
        let Some(bounds) = self.table.region(hrgn).map(|r| r.bounds) else {
            return false;
        };
        let Some(brush) = self.table.resolve_brush(hbrush) else {
            return false;
        };
        self.frame_rect(hdc, bounds, &brush)
    }

    pub fn invert_rgn(&mut self, hdc: GdiHandle, hrgn: GdiHandle) -> bool {
        let Some(bounds) = self.table.region(hrgn).map(|r| r.bounds) else {
            return false;
        };
        self.invert_rect(hdc, bounds)
    }

    /// PaintRgn fills with the DC's selected brush.
    pub fn paint_rgn(&mut self, hdc: GdiHandle, hrgn: GdiHandle) -> bool {
        let Some(state) = self.table.dc(hdc).map(|d| d.state) else {
            return false;
        };
        let Some(brush) = self.table.resolve_brush(state.brush) else {
            return false;
        };
        let Some(bounds) = self.table.region(hrgn).map(|r| r.bounds) else {
            return false;
        };
        self.fill_rect(hdc, bounds, &brush)
    }

    /// Bounding-box region combine (AND/OR/COPY).
    pub fn combine_rgn(
        &mut self,
        hdst: GdiHandle,
        hsrc1: GdiHandle,
        hsrc2: GdiHandle,
        mode: u32,
    ) -> u32 {
        let Some(src1) = self.table.region(hsrc1).map(|r| r.bounds) else {
            return 0;
        };
        let combined = match mode {
            rgn::COPY => src1,
            rgn::AND | rgn::OR => {
                let Some(src2) = self.table.region(hsrc2).map(|r| r.bounds) else {
                    return 0;
                };
                if mode == rgn::AND {
                    src1.intersect(&src2)
                } else {
                    src1.union(&src2)
                }
            }
            _ => return 0,
        };
        let Some(dst) = self.table.region_mut(hdst) else {
            return 0;
        };
        dst.bounds = combined;
        if combined.is_empty() {
            NULLREGION
        } else {
            SIMPLEREGION
        }
    }

    pub fn get_rgn_box(&self, hrgn: GdiHandle) -> Option<(Rect, u32)> {
        let bounds = self.table.region(hrgn)?.bounds;
        let complexity = if bounds.is_empty() { NULLREGION } else { SIMPLEREGION };
        Some((bounds, complexity))
    }

    pub fn set_rect_rgn(&mut self, hrgn: GdiHandle, bounds: Rect) -> bool {
        match self.table.region_mut(hrgn) {
            Some(region) => {
                region.bounds = bounds;
                region.rects = None;
                true
            }
            None => false,
        }
    }

    pub fn equal_rgn(&self, a: GdiHandle, b: GdiHandle) -> bool {
        match (self.table.region(a), self.table.region(b)) {
            (Some(ra), Some(rb)) => ra.bounds == rb.bounds,
            _ => false,
        }
    }

    /// Flush path: push the framebuffer if anything drew on it.
    pub fn present_if_dirty(&mut self) {
        if self.display.is_dirty() {
            self.display.present();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::display::HeadlessDisplay;
    use ntbox_abi::color::rgb;
    use ntbox_abi::gdi::stock;

    struct Fixture {
        table: GdiHandleTable,
        display: HeadlessDisplay,
    }

    impl Fixture {
        fn new() -> Fixture {
            Fixture {
                table: GdiHandleTable::new(),
                display: HeadlessDisplay::new(640, 480).unwrap(),
            }
        }

        fn engine(&mut self) -> GdiEngine<'_> {
            GdiEngine::new(&mut self.table, &mut self.display)
        }

        /// Memory DC over a fresh bitmap, for deterministic pixels.
        fn memory_dc(&mut self, w: i32, h: i32) -> (GdiHandle, GdiHandle) {
            let dc = self.table.create_memory_dc(0);
            let bmp = self.table.create_bitmap(w, h, 1, 32);
            assert_ne!(self.table.select_bitmap(dc, bmp), 0);
            (dc, bmp)
        }

        fn pixel(&self, bmp: GdiHandle, x: i32, y: i32) -> u32 {
            let b = self.table.bitmap(bmp).unwrap();
            b.pixels[y as usize * b.stride() + x as usize]
        }
    }

    #[test]
    fn rectangle_fills_interior_and_frames_border() {
        let mut fx = Fixture::new();
        let (dc, bmp) = fx.memory_dc(100, 100);
        // White brush, black pen (both stock defaults on a fresh DC).
        let white = fx.table.stock_handle(stock::WHITE_BRUSH);
        let black_pen = fx.table.stock_handle(stock::BLACK_PEN);
        fx.table.select_brush(dc, white);
        fx.table.select_pen(dc, black_pen);

        assert!(fx.engine().rectangle(dc, 10, 10, 20, 20));

        for y in 11..19 {
            for x in 11..19 {
                assert_eq!(fx.pixel(bmp, x, y), 0xFFFF_FFFF, "interior at {x},{y}");
            }
        }
        for i in 10..20 {
            assert_eq!(fx.pixel(bmp, i, 10), 0xFF00_0000, "top edge");
            assert_eq!(fx.pixel(bmp, i, 19), 0xFF00_0000, "bottom edge");
            assert_eq!(fx.pixel(bmp, 10, i), 0xFF00_0000, "left edge");
            assert_eq!(fx.pixel(bmp, 19, i), 0xFF00_0000, "right edge");
        }
        assert_eq!(fx.pixel(bmp, 9, 9), 0, "outside untouched");
    }

    #[test]
    fn bitblt_srccopy_copies_exact_subregion() {
        let mut fx = Fixture::new();
        let (src_dc, src_bmp) = fx.memory_dc(4, 4);
        let (dst_dc, dst_bmp) = fx.memory_dc(10, 10);

        {
            let b = fx.table.bitmap_mut(src_bmp).unwrap();
            for (i, px) in b.pixels.iter_mut().enumerate() {
                *px = 0xFF01_0203 + i as u32;
            }
        }

        assert!(fx.engine().bit_blt(dst_dc, 3, 3, 4, 4, src_dc, 0, 0, rop3::SRCCOPY));

        for y in 0..10 {
            for x in 0..10 {
                let px = fx.pixel(dst_bmp, x, y);
                if (3..7).contains(&x) && (3..7).contains(&y) {
                    let expected = 0xFF01_0203 + ((y - 3) * 4 + (x - 3)) as u32;
                    assert_eq!(px, expected, "copied at {x},{y}");
                } else {
                    assert_eq!(px, 0, "unchanged at {x},{y}");
                }
            }
        }
    }

    #[test]
    fn bitblt_clip_shifts_source_in_lockstep() {
        let mut fx = Fixture::new();
        let (src_dc, src_bmp) = fx.memory_dc(8, 8);
        let (dst_dc, dst_bmp) = fx.memory_dc(8, 8);
        {
            let b = fx.table.bitmap_mut(src_bmp).unwrap();
            for (i, px) in b.pixels.iter_mut().enumerate() {
                *px = i as u32;
            }
        }
        // Destination starts at (-2,-2): the clipped origin moves to
        // (0,0) and the source origin moves by the same +2.
        assert!(fx.engine().bit_blt(dst_dc, -2, -2, 4, 4, src_dc, 0, 0, rop3::SRCCOPY));
        assert_eq!(fx.pixel(dst_bmp, 0, 0), (2 * 8 + 2) as u32);
        assert_eq!(fx.pixel(dst_bmp, 1, 1), (3 * 8 + 3) as u32);
        assert_eq!(fx.pixel(dst_bmp, 2, 2), 0, "outside clipped copy");
    }

    #[test]
    fn bitblt_same_surface_is_staged() {
        let mut fx = Fixture::new();
        let (dc, bmp) = fx.memory_dc(8, 1);
        {
            let b = fx.table.bitmap_mut(bmp).unwrap();
            for (i, px) in b.pixels.iter_mut().enumerate() {
                *px = 100 + i as u32;
            }
        }
        assert!(fx.engine().bit_blt(dc, 2, 0, 4, 1, dc, 0, 0, rop3::SRCCOPY));
        assert_eq!(fx.pixel(bmp, 2, 0), 100);
        assert_eq!(fx.pixel(bmp, 5, 0), 103);
    }

    #[test]
    fn patblt_respects_clipping_and_excluded_pixels() {
        let mut fx = Fixture::new();
        let (dc, bmp) = fx.memory_dc(10, 10);
        let brush = fx.table.create_solid_brush(rgb(255, 0, 0));
        fx.table.select_brush(dc, brush);

        assert!(fx.engine().pat_blt(dc, 7, 7, 8, 8, rop3::PATCOPY));
        assert_eq!(fx.pixel(bmp, 7, 7), colorref_to_argb(rgb(255, 0, 0)));
        assert_eq!(fx.pixel(bmp, 9, 9), colorref_to_argb(rgb(255, 0, 0)));
        assert_eq!(fx.pixel(bmp, 6, 6), 0, "outside fill untouched");
    }

    #[test]
    fn stretch_blt_doubles_source() {
        let mut fx = Fixture::new();
        let (src_dc, src_bmp) = fx.memory_dc(2, 2);
        let (dst_dc, dst_bmp) = fx.memory_dc(4, 4);
        {
            let b = fx.table.bitmap_mut(src_bmp).unwrap();
            b.pixels.copy_from_slice(&[1, 2, 3, 4]);
        }
        assert!(fx.engine().stretch_blt(dst_dc, 0, 0, 4, 4, src_dc, 0, 0, 2, 2, rop3::SRCCOPY));
        assert_eq!(fx.pixel(dst_bmp, 0, 0), 1);
        assert_eq!(fx.pixel(dst_bmp, 1, 1), 1);
        assert_eq!(fx.pixel(dst_bmp, 2, 0), 2);
        assert_eq!(fx.pixel(dst_bmp, 3, 3), 4);
    }

    #[test]
    fn null_pen_moves_without_drawing() {
        let mut fx = Fixture::new();
        let (dc, bmp) = fx.memory_dc(10, 10);
        let null_pen = fx.table.stock_handle(stock::NULL_PEN);
        fx.table.select_pen(dc, null_pen);

        assert!(fx.engine().line_to(dc, 5, 5));
        assert!(fx.table.bitmap(bmp).unwrap().pixels.iter().all(|&p| p == 0));
        let dc_state = fx.table.dc(dc).unwrap().state;
        assert_eq!((dc_state.cur_x, dc_state.cur_y), (5, 5));
    }

    #[test]
    fn line_draws_with_pen_color() {
        let mut fx = Fixture::new();
        let (dc, bmp) = fx.memory_dc(10, 10);
        let pen = fx.table.create_pen(0, 1, rgb(0, 255, 0));
        fx.table.select_pen(dc, pen);
        fx.engine().move_to(dc, 0, 0);
        assert!(fx.engine().line_to(dc, 9, 0));
        for x in 0..10 {
            assert_eq!(fx.pixel(bmp, x, 0), colorref_to_argb(rgb(0, 255, 0)));
        }
    }

    #[test]
    fn set_get_pixel_round_trip() {
        let mut fx = Fixture::new();
        let (dc, _) = fx.memory_dc(10, 10);
        let prev = fx.engine().set_pixel(dc, 4, 4, rgb(9, 8, 7));
        assert_eq!(prev, 0, "surface starts black");
        assert_eq!(fx.engine().get_pixel(dc, 4, 4), rgb(9, 8, 7));
        assert_eq!(fx.engine().get_pixel(dc, 100, 100), CLR_INVALID);
    }

    #[test]
    fn viewport_origin_offsets_drawing() {
        let mut fx = Fixture::new();
        let (dc, bmp) = fx.memory_dc(10, 10);
        fx.table.dc_mut(dc).unwrap().state.vp_org_x = 2;
        fx.table.dc_mut(dc).unwrap().state.vp_org_y = 3;
        fx.engine().set_pixel(dc, 0, 0, rgb(1, 1, 1));
        assert_eq!(fx.pixel(bmp, 2, 3), colorref_to_argb(rgb(1, 1, 1)));
    }

    #[test]
    fn unselected_memory_dc_draws_nowhere() {
        let mut fx = Fixture::new();
        let dc = fx.table.create_memory_dc(0);
        assert!(fx.engine().pat_blt(dc, 0, 0, 100, 100, rop3::WHITENESS));
        // The sentinel surface is a scratch pixel; nothing persists.
        assert_eq!(fx.engine().get_pixel(dc, 0, 0), 0);
    }

    #[test]
    fn combine_rgn_and_or() {
        let mut fx = Fixture::new();
        let a = fx.table.create_rect_rgn(Rect::new(0, 0, 10, 10));
        let b = fx.table.create_rect_rgn(Rect::new(5, 5, 20, 20));
        let dst = fx.table.create_rect_rgn(Rect::default());

        assert_eq!(fx.engine().combine_rgn(dst, a, b, rgn::AND), SIMPLEREGION);
        assert_eq!(fx.table.region(dst).unwrap().bounds, Rect::new(5, 5, 10, 10));

        assert_eq!(fx.engine().combine_rgn(dst, a, b, rgn::OR), SIMPLEREGION);
        assert_eq!(fx.table.region(dst).unwrap().bounds, Rect::new(0, 0, 20, 20));

        let far = fx.table.create_rect_rgn(Rect::new(50, 50, 60, 60));
        assert_eq!(fx.engine().combine_rgn(dst, a, far, rgn::AND), NULLREGION);
    }
}
