//! Segmented address resolution.
//!
//! Display lists don't reference RDRAM directly: the upper bits of an address select one of 16
//! segments whose base is set at runtime by the "move word" command.

use bitfield::bitfield;

/// Mask used to wrap resolved addresses to the 8MB RDRAM address space
pub const BMASK: u32 = 0x7f_ffff;

/// Number of entries in the segment table
pub const SEGMENT_COUNT: usize = 16;

bitfield! {
    #[derive(Clone, Copy)]
    pub struct SegmentedAddr(u32);
    impl Debug;

    /// Offset within the segment (bits 22 - 0)
    pub u32, offset, _: 22, 0;

    /// Segment id (bits 27 - 24)
    pub u8, segment, _: 27, 24;
}

#[derive(serde::Serialize, serde::Deserialize, Clone, PartialEq, Eq, Debug, Default)]
pub struct SegmentTable {
    bases: [u32; SEGMENT_COUNT],
}

impl SegmentTable {
    pub fn new() -> SegmentTable {
        SegmentTable {
            bases: [0; SEGMENT_COUNT],
        }
    }

    /// Set the base of `segment`. Only the low 4 bits of `segment` are used.
    pub fn set(&mut self, segment: u8, base: u32) {
        self.bases[(segment & 0xf) as usize] = base;
    }

    pub fn base(&self, segment: u8) -> u32 {
        self.bases[(segment & 0xf) as usize]
    }

    /// Convert a segmented address into a physical offset
    pub fn resolve(&self, addr: u32) -> u32 {
        let addr = SegmentedAddr(addr);

        self.base(addr.segment()).wrapping_add(addr.offset())
    }

    pub fn reset(&mut self) {
        self.bases = [0; SEGMENT_COUNT];
    }
}

#[test]
fn resolve_segments() {
    let mut segments = SegmentTable::new();

    // Segment 0 is conventionally left at 0 so that physical addresses go through untouched
    assert_eq!(segments.resolve(0x0012_3456), 0x12_3456);

    segments.set(6, 0x20_0000);
    assert_eq!(segments.resolve(0x0600_1000), 0x20_1000);

    // Only 4 bits of segment id
    segments.set(0x1f, 0x1000);
    assert_eq!(segments.base(0xf), 0x1000);
    assert_eq!(segments.resolve(0x0f00_0010), 0x1010);

    // The top nibble isn't part of the segment id
    assert_eq!(segments.resolve(0x8600_0004), 0x20_0004);

    segments.reset();
    assert_eq!(segments.resolve(0x0600_1000), 0x1000);
}
