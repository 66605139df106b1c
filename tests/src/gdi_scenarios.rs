//! GDI scenarios through the Win32k syscall surface.

use ntbox_abi::color::{colorref_to_argb, rgb, CLR_INVALID};
use ntbox_abi::gdi::{dc_attr, rop3, stock, BK_TRANSPARENT};
use ntbox_abi::syscall::win32k as w;

use crate::VmFixture;

/// Memory DC with a selected bitmap of the given size.
fn memory_dc(fx: &mut VmFixture, width: u32, height: u32) -> (u32, u32) {
    let hdc = fx.w32_call(w::NtGdiCreateCompatibleDC, &[0]);
    assert_ne!(hdc, 0);
    let hbm = fx.w32_call(w::NtGdiCreateBitmap, &[width, height, 1, 32]);
    assert_ne!(hbm, 0);
    fx.w32_call(w::NtGdiSelectBitmap, &[hdc, hbm]);
    assert_eq!(fx.vm.gdi.dc(hdc).unwrap().state.bitmap, hbm, "bitmap selected");
    (hdc, hbm)
}

fn get_pixel(fx: &mut VmFixture, hdc: u32, x: u32, y: u32) -> u32 {
    fx.w32_call(w::NtGdiGetPixel, &[hdc, x, y])
}

#[test]
fn rectangle_interior_white_border_black() {
    let mut fx = VmFixture::new();
    let (hdc, hbm) = memory_dc(&mut fx, 100, 100);

    let white = fx.w32_call(w::NtGdiGetStockObject, &[stock::WHITE_BRUSH]);
    let black_pen = fx.w32_call(w::NtGdiGetStockObject, &[stock::BLACK_PEN]);
    fx.w32_call(w::NtGdiSelectBrush, &[hdc, white]);
    fx.w32_call(w::NtGdiSelectPen, &[hdc, black_pen]);

    assert_eq!(fx.w32_call(w::NtGdiRectangle, &[hdc, 10, 10, 20, 20]), 1);

    // Inspect the raw ARGB pixels behind the DC.
    let bmp = fx.vm.gdi.bitmap(hbm).unwrap();
    let stride = bmp.stride();
    let px = |x: usize, y: usize| bmp.pixels[y * stride + x];
    for y in 11..19 {
        for x in 11..19 {
            assert_eq!(px(x, y), 0xFFFF_FFFF, "interior {x},{y}");
        }
    }
    for i in 10..20 {
        assert_eq!(px(i, 10), 0xFF00_0000);
        assert_eq!(px(i, 19), 0xFF00_0000);
        assert_eq!(px(10, i), 0xFF00_0000);
        assert_eq!(px(19, i), 0xFF00_0000);
    }
    assert_eq!(px(9, 9), 0, "pixel (9,9) untouched");
}

#[test]
fn bitblt_srccopy_copies_the_exact_subregion() {
    let mut fx = VmFixture::new();
    let (src_dc, src_bmp) = memory_dc(&mut fx, 4, 4);
    let (dst_dc, dst_bmp) = memory_dc(&mut fx, 10, 10);

    {
        let bmp = fx.vm.gdi.bitmap_mut(src_bmp).unwrap();
        for (i, px) in bmp.pixels.iter_mut().enumerate() {
            *px = 0xFF01_0203 + i as u32;
        }
    }

    let ok = fx.w32_call(
        w::NtGdiBitBlt,
        &[dst_dc, 3, 3, 4, 4, src_dc, 0, 0, rop3::SRCCOPY, 0, 0],
    );
    assert_eq!(ok, 1);

    let bmp = fx.vm.gdi.bitmap(dst_bmp).unwrap();
    let stride = bmp.stride();
    for y in 0..10usize {
        for x in 0..10usize {
            let px = bmp.pixels[y * stride + x];
            if (3..7).contains(&x) && (3..7).contains(&y) {
                assert_eq!(px, 0xFF01_0203 + ((y - 3) * 4 + (x - 3)) as u32);
            } else {
                assert_eq!(px, 0, "outside the 4x4 copy at {x},{y}");
            }
        }
    }
}

#[test]
fn stock_handles_and_reuse_validation() {
    let mut fx = VmFixture::new();

    let white = fx.w32_call(w::NtGdiGetStockObject, &[stock::WHITE_BRUSH]);
    assert!(ntbox_abi::handle::gdi_handle_is_stock(white));
    // Deleting a stock object reports success without doing anything.
    assert_eq!(fx.w32_call(w::NtGdiDeleteObjectApp, &[white]), 1);
    assert_eq!(fx.w32_call(w::NtGdiDeleteObjectApp, &[white]), 1);

    // A freed handle stops resolving; the reused slot's new handle works.
    let brush = fx.w32_call(w::NtGdiCreateSolidBrush, &[rgb(1, 2, 3), 0]);
    assert_eq!(fx.w32_call(w::NtGdiDeleteObjectApp, &[brush]), 1);
    assert_eq!(fx.w32_call(w::NtGdiDeleteObjectApp, &[brush]), 0, "stale handle");
}

#[test]
fn dc_attribute_dwords_report_previous_values() {
    let mut fx = VmFixture::new();
    let (hdc, _) = memory_dc(&mut fx, 8, 8);
    let out_ptr = fx.scratch(4);

    let ok = fx.w32_call(
        w::NtGdiGetAndSetDCDword,
        &[hdc, dc_attr::BK_MODE, BK_TRANSPARENT, out_ptr],
    );
    assert_eq!(ok, 1);
    let previous = fx.vm.mem.read_u32(out_ptr).unwrap();
    assert_eq!(previous, ntbox_abi::gdi::BK_OPAQUE, "default bk mode");

    let ok = fx.w32_call(
        w::NtGdiGetAndSetDCDword,
        &[hdc, dc_attr::TEXT_COLOR, 0xAABB_CCDD, out_ptr],
    );
    assert_eq!(ok, 1);
    assert_eq!(
        fx.vm.gdi.dc(hdc).unwrap().state.text_color,
        0x00BB_CCDD,
        "alpha masked on store"
    );
}

#[test]
fn save_restore_round_trips_attributes() {
    let mut fx = VmFixture::new();
    let (hdc, _) = memory_dc(&mut fx, 8, 8);
    let out_ptr = fx.scratch(4);

    fx.w32_call(w::NtGdiGetAndSetDCDword, &[hdc, dc_attr::TEXT_COLOR, 0x112233, out_ptr]);
    let before = fx.vm.gdi.dc(hdc).unwrap().state;

    let level = fx.w32_call(w::NtGdiSaveDC, &[hdc]);
    assert_eq!(level, 1);
    fx.w32_call(w::NtGdiGetAndSetDCDword, &[hdc, dc_attr::TEXT_COLOR, 0x445566, out_ptr]);
    fx.w32_call(w::NtGdiGetAndSetDCDword, &[hdc, dc_attr::ROP2, 7, out_ptr]);
    fx.w32_call(w::NtGdiMoveTo, &[hdc, 42, 43, 0]);

    assert_eq!(fx.w32_call(w::NtGdiRestoreDC, &[hdc, level as u32]), 1);
    let after = fx.vm.gdi.dc(hdc).unwrap().state;
    assert_eq!(after.text_color, before.text_color);
    assert_eq!(after.rop2, before.rop2);
    assert_eq!((after.cur_x, after.cur_y), (before.cur_x, before.cur_y));
    assert_eq!(fx.vm.gdi.dc(hdc).unwrap().save_level(), 0);
}

#[test]
fn pixel_roundtrip_and_invalid_coordinates() {
    let mut fx = VmFixture::new();
    let (hdc, _) = memory_dc(&mut fx, 16, 16);

    let previous = fx.w32_call(w::NtGdiSetPixel, &[hdc, 5, 6, rgb(10, 20, 30)]);
    assert_eq!(previous, 0, "fresh bitmap is zeroed");
    assert_eq!(get_pixel(&mut fx, hdc, 5, 6), rgb(10, 20, 30));
    assert_eq!(
        fx.w32_call(w::NtGdiSetPixel, &[hdc, 999, 999, rgb(1, 1, 1)]),
        CLR_INVALID
    );

    // Raw storage is opaque ARGB.
    let hbm = fx.vm.gdi.dc(hdc).unwrap().state.bitmap;
    let bmp = fx.vm.gdi.bitmap(hbm).unwrap();
    assert_eq!(bmp.pixels[6 * bmp.stride() + 5], colorref_to_argb(rgb(10, 20, 30)));
}

#[test]
fn screen_dc_draws_on_the_display_and_flushes() {
    let mut fx = VmFixture::new();
    let hdc = fx.w32_call(w::NtUserGetDC, &[0]);
    assert_ne!(hdc, 0);

    let brush = fx.w32_call(w::NtGdiCreateSolidBrush, &[rgb(255, 0, 0), 0]);
    fx.w32_call(w::NtGdiSelectBrush, &[hdc, brush]);
    assert_eq!(fx.w32_call(w::NtGdiPatBlt, &[hdc, 0, 0, 4, 4, rop3::PATCOPY]), 1);

    assert!(fx.vm.display.is_dirty());
    assert_eq!(fx.vm.display.framebuffer()[0], colorref_to_argb(rgb(255, 0, 0)));

    assert_eq!(fx.w32_call(w::NtGdiFlush, &[]), 1);
    assert!(!fx.vm.display.is_dirty());

    assert_eq!(fx.w32_call(w::NtUserReleaseDC, &[hdc]), 1);
    assert_eq!(fx.w32_call(w::NtUserReleaseDC, &[hdc]), 0, "stale DC handle");
}

#[test]
fn begin_end_paint_fill_window() {
    let mut fx = VmFixture::new();
    let ps_ptr = fx.scratch(64);

    let hdc = fx.w32_call(w::NtUserBeginPaint, &[0, ps_ptr]);
    assert_ne!(hdc, 0);
    assert_eq!(fx.vm.mem.read_u32(ps_ptr).unwrap(), hdc, "PAINTSTRUCT.hdc");
    assert_eq!(fx.vm.mem.read_u32(ps_ptr + 16).unwrap(), 640, "rcPaint.right");

    let gray = fx.w32_call(w::NtGdiGetStockObject, &[stock::GRAY_BRUSH]);
    assert_eq!(fx.w32_call(w::NtUserFillWindow, &[0, 0, hdc, gray]), 1);
    assert_eq!(
        fx.vm.display.framebuffer()[0],
        colorref_to_argb(rgb(128, 128, 128))
    );

    let presents_before = fx.vm.display.is_dirty();
    assert!(presents_before, "fill marked the display dirty");
    assert_eq!(fx.w32_call(w::NtUserEndPaint, &[0, ps_ptr]), 1);
    assert!(!fx.vm.display.is_dirty(), "EndPaint presented");
}

#[test]
fn quit_flows_through_the_message_getters() {
    let mut fx = VmFixture::new();
    let msg_ptr = fx.scratch(28);

    assert_eq!(fx.w32_call(w::NtUserPeekMessage, &[msg_ptr, 0, 0, 0]), 0);
    fx.w32_call(w::NtUserPostQuitMessage, &[0]);
    assert_eq!(fx.w32_call(w::NtUserPeekMessage, &[msg_ptr, 0, 0, 0]), 1);
    assert_eq!(fx.vm.mem.read_u32(msg_ptr + 4).unwrap(), 0x12, "WM_QUIT");
    assert_eq!(fx.w32_call(w::NtUserGetMessage, &[msg_ptr, 0, 0, 0]), 0);
}

#[test]
fn gdi_shared_index_page_mirrors_allocations() {
    let mut fx = VmFixture::new();
    // Map a page for the shared table and point the VM at it.
    let base = 0x0050_0000u32;
    fx.vm
        .mem
        .alloc_region(base, 0x1000, ntbox_mem::PageFlags::USER)
        .unwrap();
    fx.vm.gdi_shared_addr = Some(base);

    let brush = fx.w32_call(w::NtGdiCreateSolidBrush, &[rgb(0, 0, 1), 0]);
    let index = ntbox_abi::handle::gdi_handle_index(brush) as u32;
    let entry = base + index * 16;
    assert_eq!(
        fx.vm.mem.read_u16(entry + 4).unwrap() as u32,
        0x1000,
        "process id tag"
    );
    assert_eq!(fx.vm.mem.read_u16(entry + 6).unwrap(), 1, "refcount");
    assert_eq!(
        fx.vm.mem.read_u16(entry + 10).unwrap(),
        ntbox_abi::gdi::obj::BRUSH as u16
    );

    fx.w32_call(w::NtGdiDeleteObjectApp, &[brush]);
    assert_eq!(fx.vm.mem.read_u16(entry + 4).unwrap(), 0, "cleared on free");
}
