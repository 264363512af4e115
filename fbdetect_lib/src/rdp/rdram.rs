//! Read-only access to the console RAM owned by the host.
//!
//! The host stores RDRAM as a sequence of 32bit words in its own (little endian) byte order, so
//! narrower accesses have to swizzle their address: bytes are XORed with 3 and halfwords with 2.

use crate::error::{FbError, FbResult};

/// RDRAM typically supports these access sizes
#[derive(PartialEq, Eq, Debug, Clone, Copy)]
pub enum AccessWidth {
    Byte = 1,
    HalfWord = 2,
    Word = 4,
}

impl AccessWidth {
    /// Position in the host buffer of the console address `addr`
    fn swizzle(self, addr: u32) -> u32 {
        match self {
            AccessWidth::Byte => addr ^ 3,
            AccessWidth::HalfWord => (addr & !1) ^ 2,
            AccessWidth::Word => addr & !3,
        }
    }
}

pub trait Addressable: Sized {
    fn width() -> AccessWidth;

    /// Build a value from `width()` bytes in host order
    fn from_host_bytes(b: &[u8]) -> Self;
}

impl Addressable for u8 {
    fn width() -> AccessWidth {
        AccessWidth::Byte
    }

    fn from_host_bytes(b: &[u8]) -> u8 {
        b[0]
    }
}

impl Addressable for u16 {
    fn width() -> AccessWidth {
        AccessWidth::HalfWord
    }

    fn from_host_bytes(b: &[u8]) -> u16 {
        u16::from_le_bytes(*array_ref![b, 0, 2])
    }
}

impl Addressable for u32 {
    fn width() -> AccessWidth {
        AccessWidth::Word
    }

    fn from_host_bytes(b: &[u8]) -> u32 {
        u32::from_le_bytes(*array_ref![b, 0, 4])
    }
}

#[derive(Clone, Copy)]
pub struct Rdram<'a> {
    data: &'a [u8],
}

impl<'a> Rdram<'a> {
    pub fn new(data: &'a [u8]) -> Rdram<'a> {
        Rdram { data }
    }

    /// RDRAM view with nothing in it, every read fails
    pub fn empty() -> Rdram<'static> {
        Rdram { data: &[] }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Read a value at console address `addr`. Reads that don't fit in the host buffer are
    /// rejected rather than wrapped.
    pub fn read<T: Addressable>(&self, addr: u32) -> FbResult<T> {
        let width = T::width() as usize;
        let start = T::width().swizzle(addr) as usize;

        match self.data.get(start..start + width) {
            Some(b) => Ok(T::from_host_bytes(b)),
            None => Err(FbError::MemoryOutOfBounds {
                addr,
                len: width,
                size: self.data.len(),
            }),
        }
    }

    pub fn read_u8(&self, addr: u32) -> FbResult<u8> {
        self.read(addr)
    }

    pub fn read_u16(&self, addr: u32) -> FbResult<u16> {
        self.read(addr)
    }

    pub fn read_u32(&self, addr: u32) -> FbResult<u32> {
        self.read(addr)
    }
}

/// Convert a big endian RDRAM dump (as seen by the console) to the host layout in place. Any
/// trailing partial word is left untouched.
pub fn swap_words(buf: &mut [u8]) {
    for word in buf.chunks_exact_mut(4) {
        word.reverse();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn host_ram(console_bytes: &[u8]) -> Vec<u8> {
        let mut v = console_bytes.to_vec();
        swap_words(&mut v);
        v
    }

    #[test]
    fn swizzled_reads() {
        let ram = host_ram(&[0x11, 0x22, 0x33, 0x44, 0x55, 0x66, 0x77, 0x88]);
        let rdram = Rdram::new(&ram);

        assert_eq!(rdram.read_u8(0).unwrap(), 0x11);
        assert_eq!(rdram.read_u8(3).unwrap(), 0x44);
        assert_eq!(rdram.read_u8(5).unwrap(), 0x66);
        assert_eq!(rdram.read_u16(0).unwrap(), 0x1122);
        assert_eq!(rdram.read_u16(2).unwrap(), 0x3344);
        assert_eq!(rdram.read_u16(6).unwrap(), 0x7788);
        assert_eq!(rdram.read_u32(0).unwrap(), 0x1122_3344);
        assert_eq!(rdram.read_u32(4).unwrap(), 0x5566_7788);
    }

    #[test]
    fn out_of_bounds_reads_are_rejected() {
        let ram = host_ram(&[0; 8]);
        let rdram = Rdram::new(&ram);

        assert!(rdram.read_u32(8).is_err());
        assert!(rdram.read_u16(0x7f_fffe).is_err());
        assert!(Rdram::empty().read_u8(0).is_err());

        match rdram.read_u32(0x100) {
            Err(FbError::MemoryOutOfBounds { addr, len, size }) => {
                assert_eq!(addr, 0x100);
                assert_eq!(len, 4);
                assert_eq!(size, 8);
            }
            _ => panic!("expected an out of bounds error"),
        }
    }
}
