//! Color images (render targets) seen during a detection pass and the role inferred for each

use std::fmt;
use std::ops::{Index, IndexMut};
use crate::rdp::command::PixelSize;
use crate::rdp::range::AddrRange;

/// Maximum number of color images tracked in a single pass
pub const NUMTEXBUF: usize = 92;

/// Role inferred for a color image.
///
/// Only `unknown` can move to any other status. The texture image classifier stops looking at an
/// image once `is_resolved` returns true.
#[derive(serde::Serialize, serde::Deserialize, Clone, Copy, PartialEq, Eq, Debug, Default)]
pub enum CiStatus {
    /// The buffer actually presented on screen
    Main,
    /// Depth buffer reinterpreted as color data
    Zimg,
    #[default]
    Unknown,
    /// Superseded before anything told us what it was for
    Useless,
    /// Reads back the previously presented frame
    OldCopy,
    /// Copy of the main buffer
    Copy,
    /// The main buffer reading from itself
    CopySelf,
    /// Copy of the depth buffer
    Zcopy,
    /// Auxiliary render target
    Aux,
    /// Copy of part of the main buffer into a narrower target
    AuxCopy,
}

impl CiStatus {
    /// True once the texture image classifier settled this image for the current pass
    pub fn is_resolved(self) -> bool {
        match self {
            CiStatus::Copy
            | CiStatus::CopySelf
            | CiStatus::Zcopy
            | CiStatus::Aux
            | CiStatus::AuxCopy => true,
            CiStatus::Main
            | CiStatus::Zimg
            | CiStatus::Unknown
            | CiStatus::Useless
            | CiStatus::OldCopy => false,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            CiStatus::Main => "main",
            CiStatus::Zimg => "zimg",
            CiStatus::Unknown => "unknown",
            CiStatus::Useless => "useless",
            CiStatus::OldCopy => "old_copy",
            CiStatus::Copy => "copy",
            CiStatus::CopySelf => "copy_self",
            CiStatus::Zcopy => "zcopy",
            CiStatus::Aux => "aux",
            CiStatus::AuxCopy => "aux_copy",
        }
    }
}

impl fmt::Display for CiStatus {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One "set color image" event
#[derive(serde::Serialize, serde::Deserialize, Clone, Copy, PartialEq, Eq, Debug, Default)]
pub struct ColorImage {
    /// Physical base address
    pub addr: u32,
    pub width: u32,
    /// 0 while unknown
    pub height: u32,
    pub format: u8,
    pub size: PixelSize,
    pub status: CiStatus,
    /// Dirty since last use
    pub changed: bool,
}

impl ColorImage {
    pub fn byte_len(&self) -> u32 {
        self.size.bytes_for(self.width * self.height)
    }

    /// Addresses covered by the image
    pub fn range(&self) -> AddrRange {
        AddrRange::with_len(self.addr, self.byte_len())
    }

    /// Addresses covered by the image assuming 16bpp, which is how presented frames are measured
    pub fn range_16bpp(&self) -> AddrRange {
        AddrRange::with_len(self.addr, self.width * self.height * 2)
    }
}

/// Color images of the current pass, in the order they were set
#[derive(serde::Serialize, serde::Deserialize, Clone)]
pub struct ColorImageRegistry {
    #[serde(with = "serde_big_array::BigArray")]
    images: [ColorImage; NUMTEXBUF],
    count: usize,
}

impl ColorImageRegistry {
    pub fn new() -> ColorImageRegistry {
        ColorImageRegistry {
            images: [ColorImage::default(); NUMTEXBUF],
            count: 0,
        }
    }

    /// Forget every image. Called at the start of each pass.
    pub fn clear(&mut self) {
        self.count = 0;
    }

    pub fn len(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    pub fn is_full(&self) -> bool {
        self.count == NUMTEXBUF
    }

    /// Append an image and return its index. Should *not* be called when the registry is full!
    pub fn push(&mut self, ci: ColorImage) -> usize {
        debug_assert!(!self.is_full());

        let index = self.count;

        self.images[index] = ci;
        self.count += 1;

        index
    }

    pub fn get(&self, index: usize) -> Option<&ColorImage> {
        self.as_slice().get(index)
    }

    /// Index of the image every command but "set color image" works on
    pub fn current_index(&self) -> Option<usize> {
        self.count.checked_sub(1)
    }

    pub fn as_slice(&self) -> &[ColorImage] {
        &self.images[..self.count]
    }

    pub fn as_mut_slice(&mut self) -> &mut [ColorImage] {
        &mut self.images[..self.count]
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ColorImage> {
        self.as_slice().iter()
    }

    pub fn iter_mut(&mut self) -> std::slice::IterMut<'_, ColorImage> {
        self.as_mut_slice().iter_mut()
    }
}

impl Default for ColorImageRegistry {
    fn default() -> ColorImageRegistry {
        ColorImageRegistry::new()
    }
}

impl Index<usize> for ColorImageRegistry {
    type Output = ColorImage;

    fn index(&self, index: usize) -> &ColorImage {
        &self.as_slice()[index]
    }
}

impl IndexMut<usize> for ColorImageRegistry {
    fn index_mut(&mut self, index: usize) -> &mut ColorImage {
        &mut self.as_mut_slice()[index]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ci(addr: u32) -> ColorImage {
        ColorImage {
            addr,
            width: 320,
            height: 240,
            ..Default::default()
        }
    }

    #[test]
    fn resolved_statuses() {
        let resolved: Vec<CiStatus> = [
            CiStatus::Main,
            CiStatus::Zimg,
            CiStatus::Unknown,
            CiStatus::Useless,
            CiStatus::OldCopy,
            CiStatus::Copy,
            CiStatus::CopySelf,
            CiStatus::Zcopy,
            CiStatus::Aux,
            CiStatus::AuxCopy,
        ]
        .into_iter()
        .filter(|s| s.is_resolved())
        .collect();

        assert_eq!(
            resolved,
            [
                CiStatus::Copy,
                CiStatus::CopySelf,
                CiStatus::Zcopy,
                CiStatus::Aux,
                CiStatus::AuxCopy
            ]
        );
    }

    #[test]
    fn image_extent() {
        let mut image = ci(0x10_0000);

        assert_eq!(image.byte_len(), 320 * 240 * 2);
        assert!(image.range().contains(0x10_0000 + 320 * 240 * 2 - 1));
        assert!(!image.range().contains(0x10_0000 + 320 * 240 * 2));

        image.size = PixelSize::Bits32;
        assert_eq!(image.byte_len(), 320 * 240 * 4);
        assert_eq!(image.range_16bpp().len(), 320 * 240 * 2);

        image.height = 0;
        assert!(image.range().is_empty());
    }

    #[test]
    fn registry_capacity() {
        let mut reg = ColorImageRegistry::new();

        assert!(reg.is_empty());
        assert_eq!(reg.current_index(), None);

        for i in 0..NUMTEXBUF {
            assert_eq!(reg.push(ci(i as u32 * 0x1000)), i);
        }

        assert!(reg.is_full());
        assert_eq!(reg.current_index(), Some(NUMTEXBUF - 1));
        assert_eq!(reg[3].addr, 0x3000);
        assert!(reg.get(NUMTEXBUF).is_none());

        reg.clear();
        assert!(reg.is_empty());
        assert!(reg.get(0).is_none());
    }
}
