use image::{DynamicImage, GrayImage, ImageFormat, RgbImage};

use super::{Reader, ensure_len};
use crate::error::{ParseError, ParseResult};

// —————————————————————————————————————————————————————————————————————————————————————————————————
//                                            Frame Data
// —————————————————————————————————————————————————————————————————————————————————————————————————

/// [KIND:4][WIDTH:4][HEIGHT:4][DATA:...]
pub const FRAME_HEADER_LEN: usize = 12;
pub const MAX_FRAME_DIMENSION: u32 = 4096;

const JPEG_SOI: [u8; 2] = [0xFF, 0xD8];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameKind {
    /// Full camera frame, JPEG compressed.
    Jpeg,
    /// Full camera frame, raw pixels.
    Raw,
    /// Aligned face crop, raw pixels.
    Aligned,
}

impl FrameKind {
    pub fn tag(self) -> [u8; 4] {
        match self {
            Self::Jpeg => *b"JPG\0",
            Self::Raw => *b"RAW\0",
            Self::Aligned => *b"ALN\0",
        }
    }
}

impl TryFrom<[u8; 4]> for FrameKind {
    type Error = ParseError;

    fn try_from(tag: [u8; 4]) -> ParseResult<Self> {
        match &tag {
            b"JPG\0" => Ok(Self::Jpeg),
            b"RAW\0" => Ok(Self::Raw),
            b"ALN\0" => Ok(Self::Aligned),
            _ => Err(ParseError::UnknownFrameKind(tag)),
        }
    }
}

/// How the pixel data of a frame is laid out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelLayout {
    Jpeg,
    Gray,
    Rgb,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameData {
    pub kind:   FrameKind,
    pub width:  u32,
    pub height: u32,
    pub data:   Vec<u8>,
}

impl FrameData {
    /// Raw sizes win over the JPEG SOI sniff, so gray or RGB pixels that happen to start
    /// with `FF D8` stay raw.
    pub fn layout(&self) -> PixelLayout {
        let pixels = self.width as usize * self.height as usize;
        if self.kind == FrameKind::Jpeg {
            PixelLayout::Jpeg
        }
        else if self.data.len() == pixels {
            PixelLayout::Gray
        }
        else if self.data.len() == pixels * 3 {
            PixelLayout::Rgb
        }
        else if self.data.starts_with(&JPEG_SOI) {
            PixelLayout::Jpeg
        }
        else {
            PixelLayout::Gray
        }
    }

    /// Decodes the pixel data into an image.
    ///
    /// A failure only concerns this frame, the stream is unaffected.
    pub fn decode_image(&self) -> ParseResult<DynamicImage> {
        let mismatch = || ParseError::SizeMismatch {
            expected: self.width as usize * self.height as usize,
            got:      self.data.len(),
        };

        match self.layout() {
            PixelLayout::Jpeg => image::load_from_memory_with_format(&self.data, ImageFormat::Jpeg)
                .map_err(|e| ParseError::ImageDecode(e.to_string())),
            PixelLayout::Gray => GrayImage::from_raw(self.width, self.height, self.data.clone())
                .map(DynamicImage::ImageLuma8)
                .ok_or_else(mismatch),
            PixelLayout::Rgb => RgbImage::from_raw(self.width, self.height, self.data.clone())
                .map(DynamicImage::ImageRgb8)
                .ok_or_else(mismatch),
        }
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(FRAME_HEADER_LEN + self.data.len());
        out.extend_from_slice(&self.kind.tag());
        out.extend_from_slice(&self.width.to_le_bytes());
        out.extend_from_slice(&self.height.to_le_bytes());
        out.extend_from_slice(&self.data);
        out
    }
}

impl TryFrom<&[u8]> for FrameData {
    type Error = ParseError;

    fn try_from(body: &[u8]) -> ParseResult<Self> {
        ensure_len(body, FRAME_HEADER_LEN)?;

        let mut r = Reader::new(body);
        let kind = FrameKind::try_from(r.array::<4>()?)?;
        let width = r.u32()?;
        let height = r.u32()?;

        let valid = 1..=MAX_FRAME_DIMENSION;
        if !valid.contains(&width) || !valid.contains(&height) {
            return Err(ParseError::InvalidDimensions { width, height });
        }

        let data = r.rest();

        // Raw data must match the declared size, unless the firmware sent JPEG anyway
        if kind != FrameKind::Jpeg {
            let pixels = width as usize * height as usize;
            let raw_size = data.len() == pixels || data.len() == pixels * 3;
            if !raw_size && !data.starts_with(&JPEG_SOI) {
                return Err(ParseError::SizeMismatch {
                    expected: pixels,
                    got:      data.len(),
                });
            }
        }

        Ok(Self {
            kind,
            width,
            height,
            data: data.to_vec(),
        })
    }
}
