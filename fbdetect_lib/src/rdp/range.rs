//! Console address ranges

/// Half-open range of physical console addresses: `[start; end[`
#[derive(serde::Serialize, serde::Deserialize, Clone, Copy, PartialEq, Eq, Debug, Default)]
pub struct AddrRange {
    start: u32,
    end: u32,
}

impl AddrRange {
    pub fn new(start: u32, end: u32) -> AddrRange {
        AddrRange { start, end }
    }

    /// Range of `len` bytes starting at `start`. Saturates at the top of the address space.
    pub fn with_len(start: u32, len: u32) -> AddrRange {
        AddrRange::new(start, start.saturating_add(len))
    }

    pub fn start(self) -> u32 {
        self.start
    }

    pub fn end(self) -> u32 {
        self.end
    }

    pub fn len(self) -> u32 {
        self.end.saturating_sub(self.start)
    }

    pub fn is_empty(self) -> bool {
        self.end <= self.start
    }

    /// Return `Some(offset)` if addr is contained in `self`
    pub fn offset_of(self, addr: u32) -> Option<u32> {
        if addr >= self.start && addr < self.end {
            Some(addr - self.start)
        } else {
            None
        }
    }

    pub fn contains(self, addr: u32) -> bool {
        self.offset_of(addr).is_some()
    }
}

#[test]
fn half_open() {
    let r = AddrRange::with_len(0x10_0000, 0x100);

    assert!(r.contains(0x10_0000));
    assert!(r.contains(0x10_00ff));
    assert!(!r.contains(0x10_0100));
    assert!(!r.contains(0x0f_ffff));
    assert_eq!(r.offset_of(0x10_0040), Some(0x40));
    assert_eq!(r.len(), 0x100);

    let empty = AddrRange::new(0x2000, 0x2000);
    assert!(empty.is_empty());
    assert!(!empty.contains(0x2000));

    let top = AddrRange::with_len(0xffff_ff00, 0x1000);
    assert_eq!(top.end(), 0xffff_ffff);
}
