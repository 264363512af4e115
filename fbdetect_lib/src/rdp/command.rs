//! Command words and the field layouts used by the frame buffer commands

use std::fmt;
use bitfield::bitfield;
use crate::error::FbResult;
use crate::rdp::rdram::Rdram;

/// Move word index selecting the segment table
pub const G_MW_SEGMENT: u8 = 0x06;

/// Image format code for RGBA images
pub const G_IM_FMT_RGBA: u8 = 0;

/// A 64bit display list command, split in its two 32bit words
#[derive(serde::Serialize, serde::Deserialize, Clone, Copy, PartialEq, Eq, Debug)]
pub struct Command {
    pub w0: u32,
    pub w1: u32,
}

impl Command {
    pub fn new(w0: u32, w1: u32) -> Command {
        Command { w0, w1 }
    }

    /// Return bits [31:24] of the first word
    pub fn opcode(self) -> u8 {
        (self.w0 >> 24) as u8
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{:08x} {:08x}", self.w0, self.w1)
    }
}

#[derive(serde::Serialize, serde::Deserialize, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Debug, Default)]
#[repr(u8)]
pub enum PixelSize {
    Bits4 = 0,
    Bits8 = 1,
    #[default]
    Bits16 = 2,
    Bits32 = 3,
}

impl PixelSize {
    pub fn from_code(code: u8) -> PixelSize {
        match code & 3 {
            0 => PixelSize::Bits4,
            1 => PixelSize::Bits8,
            2 => PixelSize::Bits16,
            _ => PixelSize::Bits32,
        }
    }

    pub fn code(self) -> u8 {
        self as u8
    }

    pub fn bits(self) -> u32 {
        4 << self.code()
    }

    /// Number of bytes taken by `pixels` pixels of this size
    pub fn bytes_for(self, pixels: u32) -> u32 {
        (pixels << self.code()) >> 1
    }
}

bitfield! {
    /// First word of the set color image and set texture image commands
    #[derive(Clone, Copy)]
    pub struct ImageDesc(u32);
    impl Debug;

    /// Width minus one (bits 11 - 0)
    pub u16, width_minus_one, _: 11, 0;

    /// Pixel size code (bits 20 - 19)
    pub u8, size, _: 20, 19;

    /// Image format (bits 23 - 21)
    pub u8, format, _: 23, 21;
}

impl ImageDesc {
    pub fn width(&self) -> u32 {
        self.width_minus_one() as u32 + 1
    }

    pub fn pixel_size(&self) -> PixelSize {
        PixelSize::from_code(self.size())
    }
}

bitfield! {
    /// Coordinate word of the scissor and rectangle commands, in 10.2 fixed point
    #[derive(Clone, Copy)]
    pub struct CoordWord(u32);
    impl Debug;

    /// Y coordinate (bits 11 - 0)
    pub u32, y, _: 11, 0;

    /// X coordinate (bits 23 - 12)
    pub u32, x, _: 23, 12;
}

impl CoordWord {
    /// Integer part of the X coordinate
    pub fn x_px(&self) -> u32 {
        self.x() >> 2
    }

    /// Integer part of the Y coordinate
    pub fn y_px(&self) -> u32 {
        self.y() >> 2
    }
}

bitfield! {
    /// First word of the F3D family move word command
    #[derive(Clone, Copy)]
    pub struct MoveWordUc0(u32);
    impl Debug;

    /// Move word index (bits 7 - 0)
    pub u8, index, _: 7, 0;

    /// Segment id, for segment moves (bits 13 - 10)
    pub u8, segment, _: 13, 10;
}

bitfield! {
    /// First word of the F3DEX2 move word command
    #[derive(Clone, Copy)]
    pub struct MoveWordUc2(u32);
    impl Debug;

    /// Segment id, for segment moves (bits 5 - 2)
    pub u8, segment, _: 5, 2;

    /// Move word index (bits 23 - 16)
    pub u8, index, _: 23, 16;
}

/// The fields of an S2DEX background object the detector looks at. The object sits in RDRAM in
/// console byte order.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct BgDescriptor {
    /// Visible width in 10.2 fixed point
    pub frame_w: u16,
    /// Visible height in 10.2 fixed point
    pub frame_h: u16,
    /// Segmented address of the image
    pub image_ptr: u32,
    pub image_fmt: u8,
    pub image_siz: u8,
}

impl BgDescriptor {
    pub fn read(rdram: Rdram, addr: u32) -> FbResult<BgDescriptor> {
        Ok(BgDescriptor {
            frame_w: rdram.read_u16(addr.wrapping_add(6))?,
            frame_h: rdram.read_u16(addr.wrapping_add(14))?,
            image_ptr: rdram.read_u32(addr.wrapping_add(16))?,
            image_fmt: rdram.read_u8(addr.wrapping_add(22))?,
            image_siz: rdram.read_u8(addr.wrapping_add(23))?,
        })
    }

    pub fn frame_width(&self) -> u32 {
        (self.frame_w >> 2) as u32
    }

    pub fn frame_height(&self) -> u32 {
        (self.frame_h >> 2) as u32
    }
}
