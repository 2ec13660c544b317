//! Endianness and bitfield helpers shared by the decoder and instruction semantics of
//! `mips_core`. Zero dependencies, mirroring the leaf-utility crate of the corpus this
//! workspace is built from.

pub mod bit;
pub mod endian;
pub mod fields;

pub use bit::Bit;
pub use endian::{reverse_half, reverse_word};
