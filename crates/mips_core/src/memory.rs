//! The memory collaborator the CPU reads instructions and data from.
//!
//! spec.md §1/§6: the byte-addressable memory device is deliberately out of this crate's scope
//! and is described only through this interface. Implementations choose their own alignment
//! policy (typically 4 bytes) and their own address space layout; a misaligned-span fault from
//! the implementation propagates through [`Cpu::step`](crate::Cpu::step) unchanged.

use crate::Fault;

/// A big-endian byte-addressable memory space, as seen from the CPU.
///
/// `read`/`write` move raw bytes in memory order (the byte at the lowest address is the most
/// significant byte of any multi-byte quantity); the CPU reverses bytes at the boundary itself
/// (spec.md §4.1), so implementations do not need to know about the host's endianness.
pub trait Memory {
    /// Read `len` bytes starting at `addr` into `dest[0..len]`.
    fn read(&mut self, addr: u32, len: u32, dest: &mut [u8]) -> Result<(), Fault>;

    /// Write `len` bytes from `src[0..len]` starting at `addr`.
    fn write(&mut self, addr: u32, len: u32, src: &[u8]) -> Result<(), Fault>;
}
