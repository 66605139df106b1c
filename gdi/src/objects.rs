//! GDI object records. Everything except bitmaps is a small value type;
//! bitmaps own their pixel buffer.

use ntbox_abi::color::ColorRef;
use ntbox_abi::gdi::{bs, ps};
use ntbox_abi::geom::Rect;
use ntbox_abi::handle::GdiHandle;

#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum BrushStyle {
    Solid,
    Null,
    Hatched,
    Pattern,
}

impl BrushStyle {
    pub fn from_raw(raw: u32) -> Option<BrushStyle> {
        match raw {
            bs::SOLID => Some(BrushStyle::Solid),
            bs::NULL => Some(BrushStyle::Null),
            bs::HATCHED => Some(BrushStyle::Hatched),
            bs::PATTERN => Some(BrushStyle::Pattern),
            _ => None,
        }
    }
}

#[derive(Copy, Clone, Debug)]
pub struct Brush {
    pub style: BrushStyle,
    pub color: ColorRef,
    pub hatch_style: u32,
    /// Bitmap handle for BS_PATTERN brushes.
    pub pattern: Option<GdiHandle>,
}

impl Brush {
    pub fn solid(color: ColorRef) -> Brush {
        Brush {
            style: BrushStyle::Solid,
            color: color & 0x00FF_FFFF,
            hatch_style: 0,
            pattern: None,
        }
    }

    pub fn null() -> Brush {
        Brush { style: BrushStyle::Null, color: 0, hatch_style: 0, pattern: None }
    }
}

#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum PenStyle {
    Solid,
    Dash,
    Dot,
    DashDot,
    DashDotDot,
    Null,
}

impl PenStyle {
    pub fn from_raw(raw: u32) -> Option<PenStyle> {
        match raw {
            ps::SOLID => Some(PenStyle::Solid),
            ps::DASH => Some(PenStyle::Dash),
            ps::DOT => Some(PenStyle::Dot),
            ps::DASHDOT => Some(PenStyle::DashDot),
            ps::DASHDOTDOT => Some(PenStyle::DashDotDot),
            ps::NULL => Some(PenStyle::Null),
            _ => None,
        }
    }
}

#[derive(Copy, Clone, Debug)]
pub struct Pen {
    pub style: PenStyle,
    pub width: i32,
    pub color: ColorRef,
}

impl Pen {
    pub fn new(style: PenStyle, width: i32, color: ColorRef) -> Pen {
        Pen {
            style,
            width: width.max(1),
            color: color & 0x00FF_FFFF,
        }
    }
}

pub const LF_FACESIZE: usize = 32;

#[derive(Copy, Clone, Debug)]
pub struct Font {
    pub height: i32,
    pub width: i32,
    pub weight: i32,
    pub escapement: i32,
    pub orientation: i32,
    pub italic: bool,
    pub underline: bool,
    pub strikeout: bool,
    pub char_set: u8,
    pub pitch_and_family: u8,
    face_name: [u8; LF_FACESIZE],
}

impl Font {
    pub fn new(face: &str, height: i32, width: i32, weight: i32, pitch_and_family: u8) -> Font {
        let mut font = Font {
            height,
            width,
            weight,
            escapement: 0,
            orientation: 0,
            italic: false,
            underline: false,
            strikeout: false,
            char_set: 0,
            pitch_and_family,
            face_name: [0; LF_FACESIZE],
        };
        font.set_face_name(face);
        font
    }

    pub fn set_face_name(&mut self, face: &str) {
        self.face_name = [0; LF_FACESIZE];
        let bytes = face.as_bytes();
        let n = bytes.len().min(LF_FACESIZE - 1);
        self.face_name[..n].copy_from_slice(&bytes[..n]);
    }

    pub fn face_name(&self) -> &str {
        let end = self.face_name.iter().position(|&b| b == 0).unwrap_or(LF_FACESIZE);
        std::str::from_utf8(&self.face_name[..end]).unwrap_or("")
    }
}

/// Host-owned ARGB8888 pixel surface.
#[derive(Debug)]
pub struct Bitmap {
    pub width: i32,
    pub height: i32,
    pub bits_per_pixel: u32,
    pub planes: u32,
    /// Row stride in bytes, DWORD-aligned.
    pub pitch: usize,
    pub pixels: Vec<u32>,
    /// DC this bitmap is currently selected into; a bitmap can live in at
    /// most one DC at a time.
    pub selected_into: Option<GdiHandle>,
}

impl Bitmap {
    pub fn new(width: i32, height: i32, planes: u32, bits_per_pixel: u32) -> Bitmap {
        let width = width.max(1);
        let height = height.max(1);
        let planes = planes.max(1);
        let bits_per_pixel = bits_per_pixel.max(1);
        let pitch = ((width as usize * bits_per_pixel as usize + 31) / 32) * 4;
        Bitmap {
            width,
            height,
            bits_per_pixel,
            planes,
            pitch,
            pixels: vec![0; (pitch / 4) * height as usize],
            selected_into: None,
        }
    }

    /// Row stride in 32-bit words.
    pub fn stride(&self) -> usize {
        self.pitch / 4
    }
}

#[derive(Clone, Debug, Default)]
pub struct Region {
    pub bounds: Rect,
    /// Complex regions would carry a rectangle list; everything this
    /// engine produces is a single rect.
    pub rects: Option<Vec<Rect>>,
}

impl Region {
    pub fn rect(bounds: Rect) -> Region {
        Region { bounds, rects: None }
    }
}

#[derive(Clone, Debug, Default)]
pub struct Palette {
    pub entries: Vec<u32>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bitmap_pitch_is_dword_aligned() {
        let bmp = Bitmap::new(3, 2, 1, 32);
        assert_eq!(bmp.pitch, 12);
        let mono = Bitmap::new(17, 1, 1, 1);
        assert_eq!(mono.pitch, 4);
        assert_eq!(mono.pixels.len(), 1);
    }

    #[test]
    fn bitmap_normalizes_degenerate_sizes() {
        let bmp = Bitmap::new(0, -5, 0, 0);
        assert_eq!((bmp.width, bmp.height), (1, 1));
        assert_eq!(bmp.bits_per_pixel, 1);
    }

    #[test]
    fn font_face_name_round_trip() {
        let f = Font::new("MS Sans Serif", 16, 8, 400, 0x22);
        assert_eq!(f.face_name(), "MS Sans Serif");
        let long = "x".repeat(64);
        let f = Font::new(&long, 16, 8, 400, 0x22);
        assert_eq!(f.face_name().len(), LF_FACESIZE - 1);
    }

    #[test]
    fn brush_masks_alpha() {
        let b = Brush::solid(0xFF12_3456);
        assert_eq!(b.color, 0x0012_3456);
    }
}
