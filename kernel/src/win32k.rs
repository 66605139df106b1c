//! Win32k handlers: GDI drawing, DC management, object selection, and
//! the minimal USER surface.
//!
//! Return convention of this band: the handler writes its result value
//! (handle, pixel, boolean) straight into the accumulator; the formal
//! status is always success, so the dispatcher leaves EAX alone.

use log::warn;
use ntbox_abi::gdi::{dc_attr, dc_point, obj, stock};
use ntbox_abi::geom::{Point, Rect};
use ntbox_abi::syscall::{self, win32k_syscall_name};
use ntbox_gdi::{DcKind, GdiEngine};

use crate::dispatch::{w32_arg, write_guest_u32, SysOutcome};
use crate::vm::VmContext;

/// WM_QUIT, the only message this surface ever delivers.
const WM_QUIT: u32 = 0x0012;

fn engine(vm: &mut VmContext) -> GdiEngine<'_> {
    let VmContext { gdi, display, .. } = vm;
    GdiEngine::new(gdi, display.as_mut())
}

fn ret(vm: &mut VmContext, value: u32) -> SysOutcome {
    vm.cpu.eax = value;
    SysOutcome::NoReturn
}

pub fn dispatch(vm: &mut VmContext, num: u32) -> SysOutcome {
    use syscall::win32k as w;
    match num {
        w::NtGdiInit => ret(vm, 1),
        w::NtGdiGetStockObject => sys_get_stock_object(vm),
        w::NtGdiOpenDCW => sys_open_dc(vm),
        w::NtGdiCreateCompatibleDC => sys_create_compatible_dc(vm),
        w::NtGdiDeleteObjectApp => sys_delete_object(vm),
        w::NtGdiSelectBrush => sys_select_brush(vm),
        w::NtGdiSelectPen => sys_select_pen(vm),
        w::NtGdiSelectFont => sys_select_font(vm),
        w::NtGdiSelectBitmap => sys_select_bitmap(vm),
        w::NtGdiSelectObject => sys_select_object(vm),
        w::NtGdiGetAndSetDCDword => sys_get_and_set_dc_dword(vm),
        w::NtGdiGetDCPoint => sys_get_dc_point(vm),
        w::NtGdiGetDCObject => sys_get_dc_object(vm),
        w::NtGdiGetDeviceCaps => sys_get_device_caps(vm),
        w::NtGdiSaveDC => sys_save_dc(vm),
        w::NtGdiRestoreDC => sys_restore_dc(vm),
        w::NtGdiSetBrushOrg => sys_set_brush_org(vm),
        w::NtGdiCreateSolidBrush => sys_create_solid_brush(vm),
        w::NtGdiCreatePatternBrush => sys_create_pattern_brush(vm),
        w::NtGdiCreatePen => sys_create_pen(vm),
        w::NtGdiHfontCreate => sys_hfont_create(vm),
        w::NtGdiCreateBitmap => sys_create_bitmap(vm),
        w::NtGdiCreateCompatibleBitmap => sys_create_compatible_bitmap(vm),
        w::NtGdiCreateRectRgn => sys_create_rect_rgn(vm),
        w::NtGdiSetRectRgn => sys_set_rect_rgn(vm),
        w::NtGdiCombineRgn => sys_combine_rgn(vm),
        w::NtGdiGetRgnBox => sys_get_rgn_box(vm),
        w::NtGdiEqualRgn => sys_equal_rgn(vm),
        w::NtGdiPatBlt => sys_pat_blt(vm),
        w::NtGdiBitBlt => sys_bit_blt(vm),
        w::NtGdiStretchBlt => sys_stretch_blt(vm),
        w::NtGdiRectangle => sys_rectangle(vm),
        w::NtGdiMoveTo => sys_move_to(vm),
        w::NtGdiLineTo => sys_line_to(vm),
        w::NtGdiPolyline => sys_polyline(vm),
        w::NtGdiPolygon => sys_polygon(vm),
        w::NtGdiSetPixel => sys_set_pixel(vm),
        w::NtGdiGetPixel => sys_get_pixel(vm),
        w::NtGdiFillRgn => sys_fill_rgn(vm),
        w::NtGdiFrameRgn => sys_frame_rgn(vm),
        w::NtGdiInvertRgn => sys_invert_rgn(vm),
        w::NtGdiPaintRgn => sys_paint_rgn(vm),
        w::NtGdiExtGetObjectW => sys_ext_get_object(vm),
        w::NtGdiFlush => sys_flush(vm),

        w::NtUserGetDC | w::NtUserGetDCEx | w::NtUserGetWindowDC => sys_user_get_dc(vm),
        w::NtUserReleaseDC => sys_user_release_dc(vm),
        w::NtUserBeginPaint => sys_user_begin_paint(vm),
        w::NtUserEndPaint => sys_user_end_paint(vm),
        w::NtUserInvalidateRect => sys_user_invalidate_rect(vm),
        w::NtUserFillWindow => sys_user_fill_window(vm),
        w::NtUserSelectPalette => sys_user_select_palette(vm),
        w::NtUserCallNoParam => sys_user_call_no_param(vm),
        w::NtUserCallOneParam => sys_user_call_one_param(vm),
        w::NtUserCallTwoParam => ret(vm, 0),
        w::NtUserGetThreadState => ret(vm, 0),
        w::NtUserPostQuitMessage => sys_user_post_quit_message(vm),
        w::NtUserGetMessage => sys_user_get_message(vm),
        w::NtUserPeekMessage => sys_user_peek_message(vm),

        other => {
            warn!(
                "unimplemented win32k syscall {:#x} ({})",
                other,
                win32k_syscall_name(other)
            );
            ret(vm, 0)
        }
    }
}

// ---- GDI object management ------------------------------------------

fn sys_get_stock_object(vm: &mut VmContext) -> SysOutcome {
    let index = w32_arg!(vm, 0);
    let handle = vm.gdi.stock_handle(index);
    ret(vm, handle)
}

fn sys_open_dc(vm: &mut VmContext) -> SysOutcome {
    let (w, h) = (vm.display.width(), vm.display.height());
    let hdc = vm.gdi.create_display_dc(w, h, 0);
    vm.sync_gdi_shared_entry(hdc);
    ret(vm, hdc)
}

fn sys_create_compatible_dc(vm: &mut VmContext) -> SysOutcome {
    let reference = w32_arg!(vm, 0);
    let hdc = vm.gdi.create_memory_dc(reference);
    vm.sync_gdi_shared_entry(hdc);
    ret(vm, hdc)
}

fn sys_delete_object(vm: &mut VmContext) -> SysOutcome {
    let handle = w32_arg!(vm, 0);
    if !vm.gdi.is_valid(handle) {
        return ret(vm, 0);
    }
    if ntbox_abi::handle::gdi_handle_is_stock(handle) {
        // Stock objects are never deleted, but deleting one "succeeds".
        return ret(vm, 1);
    }
    let deleted = vm.gdi.delete_object(handle);
    if deleted {
        vm.sync_gdi_shared_entry(handle);
    }
    ret(vm, deleted as u32)
}

fn sys_select_brush(vm: &mut VmContext) -> SysOutcome {
    let hdc = w32_arg!(vm, 0);
    let hbrush = w32_arg!(vm, 1);
    let previous = vm.gdi.select_brush(hdc, hbrush);
    ret(vm, previous)
}

fn sys_select_pen(vm: &mut VmContext) -> SysOutcome {
    let hdc = w32_arg!(vm, 0);
    let hpen = w32_arg!(vm, 1);
    let previous = vm.gdi.select_pen(hdc, hpen);
    ret(vm, previous)
}

fn sys_select_font(vm: &mut VmContext) -> SysOutcome {
    let hdc = w32_arg!(vm, 0);
    let hfont = w32_arg!(vm, 1);
    let previous = vm.gdi.select_font(hdc, hfont);
    ret(vm, previous)
}

fn sys_select_bitmap(vm: &mut VmContext) -> SysOutcome {
    let hdc = w32_arg!(vm, 0);
    let hbitmap = w32_arg!(vm, 1);
    let previous = vm.gdi.select_bitmap(hdc, hbitmap);
    ret(vm, previous)
}

fn sys_select_object(vm: &mut VmContext) -> SysOutcome {
    let hdc = w32_arg!(vm, 0);
    let handle = w32_arg!(vm, 1);
    let previous = vm.gdi.select_object(hdc, handle);
    ret(vm, previous)
}

/// Combined get/set for the DC attribute dwords; the previous value goes
/// back through the result pointer.
fn sys_get_and_set_dc_dword(vm: &mut VmContext) -> SysOutcome {
    let hdc = w32_arg!(vm, 0);
    let index = w32_arg!(vm, 1);
    let value = w32_arg!(vm, 2);
    let result_ptr = w32_arg!(vm, 3);

    let Some(dc) = vm.gdi.dc_mut(hdc) else {
        return ret(vm, 0);
    };
    let state = &mut dc.state;
    let old = match index {
        dc_attr::TEXT_COLOR => {
            let old = state.text_color;
            state.text_color = value & 0x00FF_FFFF;
            old
        }
        dc_attr::BK_COLOR => {
            let old = state.bk_color;
            state.bk_color = value & 0x00FF_FFFF;
            old
        }
        dc_attr::BK_MODE => {
            let old = state.bk_mode;
            state.bk_mode = value;
            old
        }
        dc_attr::MAP_MODE => {
            let old = state.map_mode;
            state.map_mode = value;
            old
        }
        dc_attr::TEXT_ALIGN => {
            let old = state.text_align;
            state.text_align = value;
            old
        }
        dc_attr::ROP2 => {
            let old = state.rop2;
            state.rop2 = value;
            old
        }
        dc_attr::STRETCH_MODE => {
            let old = state.stretch_mode;
            state.stretch_mode = value;
            old
        }
        dc_attr::POLY_FILL_MODE => {
            let old = state.poly_fill_mode;
            state.poly_fill_mode = value;
            old
        }
        _ => return ret(vm, 0),
    };
    write_guest_u32(vm, result_ptr, old);
    ret(vm, 1)
}

fn sys_get_dc_point(vm: &mut VmContext) -> SysOutcome {
    let hdc = w32_arg!(vm, 0);
    let kind = w32_arg!(vm, 1);
    let point_ptr = w32_arg!(vm, 2);

    let Some(dc) = vm.gdi.dc(hdc) else {
        return ret(vm, 0);
    };
    let state = dc.state;
    let point = match kind {
        dc_point::VIEWPORT_ORG => Point { x: state.vp_org_x, y: state.vp_org_y },
        dc_point::WINDOW_ORG => Point { x: state.win_org_x, y: state.win_org_y },
        dc_point::CURRENT_POS => Point { x: state.cur_x, y: state.cur_y },
        dc_point::BRUSH_ORG => Point { x: state.brush_org_x, y: state.brush_org_y },
        _ => return ret(vm, 0),
    };
    write_guest_u32(vm, point_ptr, point.x as u32);
    if point_ptr != 0 {
        write_guest_u32(vm, point_ptr + 4, point.y as u32);
    }
    ret(vm, 1)
}

/// Currently selected object of a given class.
fn sys_get_dc_object(vm: &mut VmContext) -> SysOutcome {
    let hdc = w32_arg!(vm, 0);
    let kind = w32_arg!(vm, 1);

    let Some(dc) = vm.gdi.dc(hdc) else {
        return ret(vm, 0);
    };
    let handle = match kind as u8 {
        obj::BRUSH => dc.state.brush,
        obj::PEN => dc.state.pen,
        obj::FONT => dc.state.font,
        obj::BITMAP => dc.state.bitmap,
        obj::PALETTE => dc.state.palette,
        _ => 0,
    };
    ret(vm, handle)
}

fn sys_get_device_caps(vm: &mut VmContext) -> SysOutcome {
    let hdc = w32_arg!(vm, 0);
    let index = w32_arg!(vm, 1);
    let value = vm.gdi.dc(hdc).map_or(0, |dc| dc.device_caps(index));
    ret(vm, value as u32)
}

fn sys_save_dc(vm: &mut VmContext) -> SysOutcome {
    let hdc = w32_arg!(vm, 0);
    let level = vm.gdi.save_dc(hdc);
    ret(vm, level as u32)
}

fn sys_restore_dc(vm: &mut VmContext) -> SysOutcome {
    let hdc = w32_arg!(vm, 0);
    let level = w32_arg!(vm, 1) as i32;
    let ok = vm.gdi.restore_dc(hdc, level);
    ret(vm, ok as u32)
}

fn sys_set_brush_org(vm: &mut VmContext) -> SysOutcome {
    let hdc = w32_arg!(vm, 0);
    let x = w32_arg!(vm, 1) as i32;
    let y = w32_arg!(vm, 2) as i32;
    let point_ptr = w32_arg!(vm, 3);

    let Some(dc) = vm.gdi.dc_mut(hdc) else {
        return ret(vm, 0);
    };
    let prev = Point { x: dc.state.brush_org_x, y: dc.state.brush_org_y };
    dc.state.brush_org_x = x;
    dc.state.brush_org_y = y;
    write_guest_u32(vm, point_ptr, prev.x as u32);
    if point_ptr != 0 {
        write_guest_u32(vm, point_ptr + 4, prev.y as u32);
    }
    ret(vm, 1)
}

fn sys_create_solid_brush(vm: &mut VmContext) -> SysOutcome {
    let color = w32_arg!(vm, 0);
    let handle = vm.gdi.create_solid_brush(color);
    vm.sync_gdi_shared_entry(handle);
    ret(vm, handle)
}

fn sys_create_pattern_brush(vm: &mut VmContext) -> SysOutcome {
    let hbitmap = w32_arg!(vm, 0);
    let handle = vm.gdi.create_pattern_brush(hbitmap);
    vm.sync_gdi_shared_entry(handle);
    ret(vm, handle)
}

fn sys_create_pen(vm: &mut VmContext) -> SysOutcome {
    let style = w32_arg!(vm, 0);
    let width = w32_arg!(vm, 1) as i32;
    let color = w32_arg!(vm, 2);
    let handle = vm.gdi.create_pen(style, width, color);
    vm.sync_gdi_shared_entry(handle);
    ret(vm, handle)
}

/// Font realization is out of scope; hand back the default GUI font.
fn sys_hfont_create(vm: &mut VmContext) -> SysOutcome {
    let handle = vm.gdi.stock_handle(stock::DEFAULT_GUI_FONT);
    ret(vm, handle)
}

fn sys_create_bitmap(vm: &mut VmContext) -> SysOutcome {
    let width = w32_arg!(vm, 0) as i32;
    let height = w32_arg!(vm, 1) as i32;
    let planes = w32_arg!(vm, 2);
    let bpp = w32_arg!(vm, 3);
    let handle = vm.gdi.create_bitmap(width, height, planes, bpp);
    vm.sync_gdi_shared_entry(handle);
    ret(vm, handle)
}

fn sys_create_compatible_bitmap(vm: &mut VmContext) -> SysOutcome {
    let _hdc = w32_arg!(vm, 0);
    let width = w32_arg!(vm, 1) as i32;
    let height = w32_arg!(vm, 2) as i32;
    let handle = vm.gdi.create_bitmap(width, height, 1, 32);
    vm.sync_gdi_shared_entry(handle);
    ret(vm, handle)
}

fn sys_create_rect_rgn(vm: &mut VmContext) -> SysOutcome {
    let left = w32_arg!(vm, 0) as i32;
    let top = w32_arg!(vm, 1) as i32;
    let right = w32_arg!(vm, 2) as i32;
    let bottom = w32_arg!(vm, 3) as i32;
    let handle = vm.gdi.create_rect_rgn(Rect::new(left, top, right, bottom));
    vm.sync_gdi_shared_entry(handle);
    ret(vm, handle)
}

fn sys_set_rect_rgn(vm: &mut VmContext) -> SysOutcome {
    let hrgn = w32_arg!(vm, 0);
    let left = w32_arg!(vm, 1) as i32;
    let top = w32_arg!(vm, 2) as i32;
    let right = w32_arg!(vm, 3) as i32;
    let bottom = w32_arg!(vm, 4) as i32;
    let ok = engine(vm).set_rect_rgn(hrgn, Rect::new(left, top, right, bottom));
    ret(vm, ok as u32)
}

fn sys_combine_rgn(vm: &mut VmContext) -> SysOutcome {
    let hdst = w32_arg!(vm, 0);
    let hsrc1 = w32_arg!(vm, 1);
    let hsrc2 = w32_arg!(vm, 2);
    let mode = w32_arg!(vm, 3);
    let complexity = engine(vm).combine_rgn(hdst, hsrc1, hsrc2, mode);
    ret(vm, complexity)
}

fn sys_get_rgn_box(vm: &mut VmContext) -> SysOutcome {
    let hrgn = w32_arg!(vm, 0);
    let rect_ptr = w32_arg!(vm, 1);

    let Some((bounds, complexity)) = engine(vm).get_rgn_box(hrgn) else {
        return ret(vm, 0);
    };
    if rect_ptr != 0 {
        write_guest_u32(vm, rect_ptr, bounds.left as u32);
        write_guest_u32(vm, rect_ptr + 4, bounds.top as u32);
        write_guest_u32(vm, rect_ptr + 8, bounds.right as u32);
        write_guest_u32(vm, rect_ptr + 12, bounds.bottom as u32);
    }
    ret(vm, complexity)
}

fn sys_equal_rgn(vm: &mut VmContext) -> SysOutcome {
    let a = w32_arg!(vm, 0);
    let b = w32_arg!(vm, 1);
    let equal = engine(vm).equal_rgn(a, b);
    ret(vm, equal as u32)
}

// ---- drawing ---------------------------------------------------------

fn sys_pat_blt(vm: &mut VmContext) -> SysOutcome {
    let hdc = w32_arg!(vm, 0);
    let x = w32_arg!(vm, 1) as i32;
    let y = w32_arg!(vm, 2) as i32;
    let w = w32_arg!(vm, 3) as i32;
    let h = w32_arg!(vm, 4) as i32;
    let rop = w32_arg!(vm, 5);
    let ok = engine(vm).pat_blt(hdc, x, y, w, h, rop);
    ret(vm, ok as u32)
}

fn sys_bit_blt(vm: &mut VmContext) -> SysOutcome {
    let hdc_dst = w32_arg!(vm, 0);
    let dst_x = w32_arg!(vm, 1) as i32;
    let dst_y = w32_arg!(vm, 2) as i32;
    let w = w32_arg!(vm, 3) as i32;
    let h = w32_arg!(vm, 4) as i32;
    let hdc_src = w32_arg!(vm, 5);
    let src_x = w32_arg!(vm, 6) as i32;
    let src_y = w32_arg!(vm, 7) as i32;
    let rop = w32_arg!(vm, 8);
    // args 9/10: crBack and reserved.
    let ok = engine(vm).bit_blt(hdc_dst, dst_x, dst_y, w, h, hdc_src, src_x, src_y, rop);
    ret(vm, ok as u32)
}

fn sys_stretch_blt(vm: &mut VmContext) -> SysOutcome {
    let hdc_dst = w32_arg!(vm, 0);
    let dst_x = w32_arg!(vm, 1) as i32;
    let dst_y = w32_arg!(vm, 2) as i32;
    let dst_w = w32_arg!(vm, 3) as i32;
    let dst_h = w32_arg!(vm, 4) as i32;
    let hdc_src = w32_arg!(vm, 5);
    let src_x = w32_arg!(vm, 6) as i32;
    let src_y = w32_arg!(vm, 7) as i32;
    let src_w = w32_arg!(vm, 8) as i32;
    let src_h = w32_arg!(vm, 9) as i32;
    let rop = w32_arg!(vm, 10);
    let ok = engine(vm).stretch_blt(
        hdc_dst, dst_x, dst_y, dst_w, dst_h, hdc_src, src_x, src_y, src_w, src_h, rop,
    );
    ret(vm, ok as u32)
}

fn sys_rectangle(vm: &mut VmContext) -> SysOutcome {
    let hdc = w32_arg!(vm, 0);
    let left = w32_arg!(vm, 1) as i32;
    let top = w32_arg!(vm, 2) as i32;
    let right = w32_arg!(vm, 3) as i32;
    let bottom = w32_arg!(vm, 4) as i32;
    let ok = engine(vm).rectangle(hdc, left, top, right, bottom);
    ret(vm, ok as u32)
}

fn sys_move_to(vm: &mut VmContext) -> SysOutcome {
    let hdc = w32_arg!(vm, 0);
    let x = w32_arg!(vm, 1) as i32;
    let y = w32_arg!(vm, 2) as i32;
    let point_ptr = w32_arg!(vm, 3);

    let Some(prev) = engine(vm).move_to(hdc, x, y) else {
        return ret(vm, 0);
    };
    write_guest_u32(vm, point_ptr, prev.x as u32);
    if point_ptr != 0 {
        write_guest_u32(vm, point_ptr + 4, prev.y as u32);
    }
    ret(vm, 1)
}

fn sys_line_to(vm: &mut VmContext) -> SysOutcome {
    let hdc = w32_arg!(vm, 0);
    let x = w32_arg!(vm, 1) as i32;
    let y = w32_arg!(vm, 2) as i32;
    let ok = engine(vm).line_to(hdc, x, y);
    ret(vm, ok as u32)
}

const MAX_POLY_POINTS: u32 = 4096;

fn read_points(vm: &VmContext, ptr: u32, count: u32) -> Option<Vec<Point>> {
    let count = count.min(MAX_POLY_POINTS);
    let mut points = Vec::with_capacity(count as usize);
    for i in 0..count {
        let x = vm.mem.read_u32(ptr + i * 8).ok()? as i32;
        let y = vm.mem.read_u32(ptr + i * 8 + 4).ok()? as i32;
        points.push(Point { x, y });
    }
    Some(points)
}

fn sys_polyline(vm: &mut VmContext) -> SysOutcome {
    let hdc = w32_arg!(vm, 0);
    let points_ptr = w32_arg!(vm, 1);
    let count = w32_arg!(vm, 2);

    let Some(points) = read_points(vm, points_ptr, count) else {
        return ret(vm, 0);
    };
    let ok = engine(vm).polyline(hdc, &points);
    ret(vm, ok as u32)
}

fn sys_polygon(vm: &mut VmContext) -> SysOutcome {
    let hdc = w32_arg!(vm, 0);
    let points_ptr = w32_arg!(vm, 1);
    let count = w32_arg!(vm, 2);

    let Some(points) = read_points(vm, points_ptr, count) else {
        return ret(vm, 0);
    };
    let ok = engine(vm).polygon(hdc, &points);
    ret(vm, ok as u32)
}

fn sys_set_pixel(vm: &mut VmContext) -> SysOutcome {
    let hdc = w32_arg!(vm, 0);
    let x = w32_arg!(vm, 1) as i32;
    let y = w32_arg!(vm, 2) as i32;
    let color = w32_arg!(vm, 3);
    let previous = engine(vm).set_pixel(hdc, x, y, color);
    ret(vm, previous)
}

fn sys_get_pixel(vm: &mut VmContext) -> SysOutcome {
    let hdc = w32_arg!(vm, 0);
    let x = w32_arg!(vm, 1) as i32;
    let y = w32_arg!(vm, 2) as i32;
    let color = engine(vm).get_pixel(hdc, x, y);
    ret(vm, color)
}

fn sys_fill_rgn(vm: &mut VmContext) -> SysOutcome {
    let hdc = w32_arg!(vm, 0);
    let hrgn = w32_arg!(vm, 1);
    let hbrush = w32_arg!(vm, 2);
    let ok = engine(vm).fill_rgn(hdc, hrgn, hbrush);
    ret(vm, ok as u32)
}

fn sys_frame_rgn(vm: &mut VmContext) -> SysOutcome {
    let hdc = w32_arg!(vm, 0);
    let hrgn = w32_arg!(vm, 1);
    let hbrush = w32_arg!(vm, 2);
    // args 3/4: frame width/height; this engine frames one pixel.
    let ok = engine(vm).frame_rgn(hdc, hrgn, hbrush);
    ret(vm, ok as u32)
}

fn sys_invert_rgn(vm: &mut VmContext) -> SysOutcome {
    let hdc = w32_arg!(vm, 0);
    let hrgn = w32_arg!(vm, 1);
    let ok = engine(vm).invert_rgn(hdc, hrgn);
    ret(vm, ok as u32)
}

fn sys_paint_rgn(vm: &mut VmContext) -> SysOutcome {
    let hdc = w32_arg!(vm, 0);
    let hrgn = w32_arg!(vm, 1);
    let ok = engine(vm).paint_rgn(hdc, hrgn);
    ret(vm, ok as u32)
}

/// Size probe / minimal object query.
fn sys_ext_get_object(vm: &mut VmContext) -> SysOutcome {
    let handle = w32_arg!(vm, 0);
    let count = w32_arg!(vm, 1);
    let buffer_ptr = w32_arg!(vm, 2);

    let Some(ty) = vm.gdi.type_of(handle) else {
        return ret(vm, 0);
    };
    let size = match ty {
        obj::PEN => 16u32,     // LOGPEN
        obj::BRUSH => 12,      // LOGBRUSH
        obj::FONT => 92,       // LOGFONTW
        obj::BITMAP => 24,     // BITMAP
        _ => 0,
    };
    if buffer_ptr == 0 {
        return ret(vm, size);
    }
    ret(vm, count.min(size))
}

fn sys_flush(vm: &mut VmContext) -> SysOutcome {
    engine(vm).present_if_dirty();
    ret(vm, 1)
}

// ---- USER ------------------------------------------------------------

fn sys_user_get_dc(vm: &mut VmContext) -> SysOutcome {
    let hwnd = w32_arg!(vm, 0);
    let (w, h) = (vm.display.width(), vm.display.height());
    let hdc = vm.gdi.create_display_dc(w, h, hwnd);
    vm.sync_gdi_shared_entry(hdc);
    ret(vm, hdc)
}

fn sys_user_release_dc(vm: &mut VmContext) -> SysOutcome {
    let hdc = w32_arg!(vm, 0);
    // Only window DCs obtained through GetDC are released here.
    let released = match vm.gdi.dc(hdc) {
        Some(dc) if dc.kind == DcKind::Direct => vm.gdi.delete_dc(hdc),
        _ => false,
    };
    if released {
        vm.sync_gdi_shared_entry(hdc);
    }
    ret(vm, released as u32)
}

fn sys_user_begin_paint(vm: &mut VmContext) -> SysOutcome {
    let hwnd = w32_arg!(vm, 0);
    let ps_ptr = w32_arg!(vm, 1);

    let (w, h) = (vm.display.width(), vm.display.height());
    let hdc = vm.gdi.create_display_dc(w, h, hwnd);
    vm.sync_gdi_shared_entry(hdc);

    if ps_ptr != 0 {
        write_guest_u32(vm, ps_ptr, hdc);
        write_guest_u32(vm, ps_ptr + 4, 1); // fErase
        write_guest_u32(vm, ps_ptr + 8, 0); // rcPaint.left
        write_guest_u32(vm, ps_ptr + 12, 0); // rcPaint.top
        write_guest_u32(vm, ps_ptr + 16, w as u32);
        write_guest_u32(vm, ps_ptr + 20, h as u32);
        write_guest_u32(vm, ps_ptr + 24, 0); // fRestore
        write_guest_u32(vm, ps_ptr + 28, 0); // fIncUpdate
    }
    ret(vm, hdc)
}

fn sys_user_end_paint(vm: &mut VmContext) -> SysOutcome {
    let _hwnd = w32_arg!(vm, 0);
    let ps_ptr = w32_arg!(vm, 1);

    if ps_ptr != 0 {
        if let Ok(hdc) = vm.mem.read_u32(ps_ptr) {
            if vm.gdi.dc(hdc).is_some_and(|dc| dc.kind == DcKind::Direct) {
                vm.gdi.delete_dc(hdc);
                vm.sync_gdi_shared_entry(hdc);
            }
        }
    }
    engine(vm).present_if_dirty();
    ret(vm, 1)
}

fn sys_user_invalidate_rect(vm: &mut VmContext) -> SysOutcome {
    vm.display.invalidate();
    ret(vm, 1)
}

fn sys_user_fill_window(vm: &mut VmContext) -> SysOutcome {
    // args 0/1: parent and child window handles.
    let hdc = w32_arg!(vm, 2);
    let hbrush = w32_arg!(vm, 3);

    let Some((w, h)) = vm.gdi.dc(hdc).map(|dc| (dc.state.width, dc.state.height)) else {
        return ret(vm, 0);
    };
    let Some(brush) = vm.gdi.resolve_brush(hbrush) else {
        return ret(vm, 0);
    };
    let ok = engine(vm).fill_rect(hdc, Rect::new(0, 0, w, h), &brush);
    ret(vm, ok as u32)
}

fn sys_user_select_palette(vm: &mut VmContext) -> SysOutcome {
    let hdc = w32_arg!(vm, 0);
    let hpalette = w32_arg!(vm, 1);
    let previous = vm.gdi.select_palette(hdc, hpalette);
    ret(vm, previous)
}

fn sys_user_call_no_param(vm: &mut VmContext) -> SysOutcome {
    let _routine = w32_arg!(vm, 0);
    ret(vm, 0)
}

fn sys_user_call_one_param(vm: &mut VmContext) -> SysOutcome {
    let _param = w32_arg!(vm, 0);
    let routine = w32_arg!(vm, 1);
    let value = match routine {
        22 => 0x0409_0409, // keyboard layout: US English
        23 => 4,           // enhanced 101/102-key keyboard
        _ => 0,
    };
    ret(vm, value)
}

fn sys_user_post_quit_message(vm: &mut VmContext) -> SysOutcome {
    let _exit_code = w32_arg!(vm, 0);
    vm.quit_posted = true;
    ret(vm, 1)
}

fn write_msg(vm: &mut VmContext, msg_ptr: u32, hwnd: u32, message: u32) {
    if msg_ptr == 0 {
        return;
    }
    write_guest_u32(vm, msg_ptr, hwnd);
    write_guest_u32(vm, msg_ptr + 4, message);
    write_guest_u32(vm, msg_ptr + 8, 0); // wParam
    write_guest_u32(vm, msg_ptr + 12, 0); // lParam
    write_guest_u32(vm, msg_ptr + 16, 0); // time
    write_guest_u32(vm, msg_ptr + 20, 0); // pt.x
    write_guest_u32(vm, msg_ptr + 24, 0); // pt.y
}

/// Only the quit transition is delivered; with no message, the caller
/// yields and receives WM_NULL so it retries cooperatively.
fn sys_user_get_message(vm: &mut VmContext) -> SysOutcome {
    let msg_ptr = w32_arg!(vm, 0);

    if vm.pump_events() {
        write_msg(vm, msg_ptr, 0, WM_QUIT);
        return ret(vm, 0);
    }
    write_msg(vm, msg_ptr, 0, 0);
    vm.cpu.eax = 1;
    let VmContext { sched, cpu, .. } = vm;
    sched.yield_now(cpu);
    SysOutcome::NoReturn
}

fn sys_user_peek_message(vm: &mut VmContext) -> SysOutcome {
    let msg_ptr = w32_arg!(vm, 0);
    if vm.pump_events() {
        write_msg(vm, msg_ptr, 0, WM_QUIT);
        return ret(vm, 1);
    }
    ret(vm, 0)
}

