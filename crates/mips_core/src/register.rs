//! Register index used by the decoder and instruction semantics.

use std::fmt;

/// A general-purpose register index, `0..32`. Always in range: it is either built from a
/// 5-bit decode field (which can only ever hold 0..=31) or from a validated caller index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegIndex(u8);

impl RegIndex {
    pub const ZERO: RegIndex = RegIndex(0);
    pub const RA: RegIndex = RegIndex(31);

    /// Build from a decoded 5-bit field. Masks to the low 5 bits, so this never panics.
    #[must_use]
    pub fn from_field(field: u32) -> Self {
        RegIndex((field & 0x1f) as u8)
    }

    #[must_use]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for RegIndex {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        const NAMES: [&str; 32] = [
            "zero", "at", "v0", "v1", "a0", "a1", "a2", "a3", "t0", "t1", "t2", "t3", "t4", "t5",
            "t6", "t7", "s0", "s1", "s2", "s3", "s4", "s5", "s6", "s7", "t8", "t9", "k0", "k1",
            "gp", "sp", "fp", "ra",
        ];
        f.write_str(NAMES[self.0 as usize])
    }
}
