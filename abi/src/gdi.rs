//! GDI constant vocabulary: object type tags, stock indices, raster ops,
//! styles and modes. Values follow the published Windows GDI ABI where the
//! guest can observe them (handle type nibbles, ROP codes, stock indices).

/// Object type tags carried in bits 23..16 of a GDI handle.
pub mod obj {
    pub const DC: u8 = 0x01;
    pub const REGION: u8 = 0x04;
    pub const BITMAP: u8 = 0x05;
    pub const PALETTE: u8 = 0x08;
    pub const FONT: u8 = 0x0A;
    pub const BRUSH: u8 = 0x10;
    pub const PEN: u8 = 0x30;
}

/// Stock object indices for GetStockObject.
pub mod stock {
    pub const WHITE_BRUSH: u32 = 0;
    pub const LTGRAY_BRUSH: u32 = 1;
    pub const GRAY_BRUSH: u32 = 2;
    pub const DKGRAY_BRUSH: u32 = 3;
    pub const BLACK_BRUSH: u32 = 4;
    pub const NULL_BRUSH: u32 = 5;
    pub const WHITE_PEN: u32 = 6;
    pub const BLACK_PEN: u32 = 7;
    pub const NULL_PEN: u32 = 8;
    pub const OEM_FIXED_FONT: u32 = 10;
    pub const ANSI_FIXED_FONT: u32 = 11;
    pub const ANSI_VAR_FONT: u32 = 12;
    pub const SYSTEM_FONT: u32 = 13;
    pub const DEVICE_DEFAULT_FONT: u32 = 14;
    pub const DEFAULT_PALETTE: u32 = 15;
    pub const SYSTEM_FIXED_FONT: u32 = 16;
    pub const DEFAULT_GUI_FONT: u32 = 17;
    pub const DC_BRUSH: u32 = 18;
    pub const DC_PEN: u32 = 19;
    pub const COUNT: u32 = 20;
}

/// Brush styles.
pub mod bs {
    pub const SOLID: u32 = 0;
    pub const NULL: u32 = 1;
    pub const HATCHED: u32 = 2;
    pub const PATTERN: u32 = 3;
}

/// Pen styles.
pub mod ps {
    pub const SOLID: u32 = 0;
    pub const DASH: u32 = 1;
    pub const DOT: u32 = 2;
    pub const DASHDOT: u32 = 3;
    pub const DASHDOTDOT: u32 = 4;
    pub const NULL: u32 = 5;
}

/// Binary raster operations (R2_*). `R2_COPYPEN` is the DC default.
pub mod rop2 {
    pub const BLACK: u32 = 1;
    pub const NOTMERGEPEN: u32 = 2;
    pub const MASKNOTPEN: u32 = 3;
    pub const NOTCOPYPEN: u32 = 4;
    pub const MASKPENNOT: u32 = 5;
    pub const NOT: u32 = 6;
    pub const XORPEN: u32 = 7;
    pub const NOTMASKPEN: u32 = 8;
    pub const MASKPEN: u32 = 9;
    pub const NOTXORPEN: u32 = 10;
    pub const NOP: u32 = 11;
    pub const MERGENOTPEN: u32 = 12;
    pub const COPYPEN: u32 = 13;
    pub const MERGEPENNOT: u32 = 14;
    pub const MERGEPEN: u32 = 15;
    pub const WHITE: u32 = 16;
}

/// Ternary raster operation codes. The middle byte (bits 23..16) is the
/// 8-entry truth table over (dst, src, pat).
pub mod rop3 {
    pub const SRCCOPY: u32 = 0x00CC_0020;
    pub const SRCPAINT: u32 = 0x00EE_0086;
    pub const SRCAND: u32 = 0x0088_00C6;
    pub const SRCINVERT: u32 = 0x0066_0046;
    pub const SRCERASE: u32 = 0x0044_0328;
    pub const NOTSRCCOPY: u32 = 0x0033_0008;
    pub const NOTSRCERASE: u32 = 0x0011_00A6;
    pub const MERGECOPY: u32 = 0x00C0_00CA;
    pub const MERGEPAINT: u32 = 0x00BB_0226;
    pub const PATCOPY: u32 = 0x00F0_0021;
    pub const PATPAINT: u32 = 0x00FB_0A09;
    pub const PATINVERT: u32 = 0x005A_0049;
    pub const DSTINVERT: u32 = 0x0055_0009;
    pub const BLACKNESS: u32 = 0x0000_0042;
    pub const WHITENESS: u32 = 0x00FF_0062;
}

/// Background modes.
pub const BK_TRANSPARENT: u32 = 1;
pub const BK_OPAQUE: u32 = 2;

/// Mapping modes; only MM_TEXT has a transform in this engine.
pub const MM_TEXT: u32 = 1;

/// Stretch modes.
pub const BLACKONWHITE: u32 = 1;

/// Poly-fill modes.
pub const ALTERNATE: u32 = 1;

/// GetDeviceCaps indices.
pub mod caps {
    pub const HORZRES: u32 = 8;
    pub const VERTRES: u32 = 10;
    pub const BITSPIXEL: u32 = 12;
    pub const PLANES: u32 = 14;
    pub const NUMCOLORS: u32 = 24;
    pub const LOGPIXELSX: u32 = 88;
    pub const LOGPIXELSY: u32 = 90;
}

/// Attribute selectors for NtGdiGetAndSetDCDword.
pub mod dc_attr {
    pub const TEXT_COLOR: u32 = 0;
    pub const BK_COLOR: u32 = 1;
    pub const BK_MODE: u32 = 2;
    pub const MAP_MODE: u32 = 3;
    pub const TEXT_ALIGN: u32 = 4;
    pub const ROP2: u32 = 5;
    pub const STRETCH_MODE: u32 = 6;
    pub const POLY_FILL_MODE: u32 = 7;
}

/// Point selectors for NtGdiGetDCPoint.
pub mod dc_point {
    pub const VIEWPORT_ORG: u32 = 1;
    pub const WINDOW_ORG: u32 = 2;
    pub const CURRENT_POS: u32 = 3;
    pub const BRUSH_ORG: u32 = 4;
}

/// Region complexity results.
pub const NULLREGION: u32 = 1;
pub const SIMPLEREGION: u32 = 2;
pub const COMPLEXREGION: u32 = 3;

/// CombineRgn modes.
pub mod rgn {
    pub const AND: u32 = 1;
    pub const OR: u32 = 2;
    pub const XOR: u32 = 3;
    pub const DIFF: u32 = 4;
    pub const COPY: u32 = 5;
}

/// Shared GDI index page: one entry per handle index, published to the
/// guest for code that peeks at the GDI handle table layout. Entry layout:
/// `{ kernel_address: u32, process_id: u16, count: u16, upper: u16,
/// type: u16, user_address: u32 }`.
pub const SHARED_ENTRY_SIZE: usize = 16;
pub const MAX_SHARED_HANDLES: usize = 4096;
