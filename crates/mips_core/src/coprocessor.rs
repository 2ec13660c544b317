//! Pluggable coprocessor hooks invoked by the `COPz`/`LWCz`/`SWCz` instruction families.
//!
//! spec.md §1/§6: the four coprocessor slots are external collaborators. The core only knows
//! how to invoke them; it never interprets what they do.

use crate::{Cpu, Fault, RegIndex};

/// A general coprocessor operation, invoked by `COPz`. Receives the full 32-bit instruction
/// word so it can decode its own sub-operation.
pub type CopFn = Box<dyn FnMut(&mut Cpu, u32) -> Result<(), Fault>>;

/// A word-load hook, invoked by `LWCz` after the CPU has performed the aligned 4-byte memory
/// read. Receives the destination register index and the freshly loaded word.
pub type LwcFn = Box<dyn FnMut(&mut Cpu, RegIndex, u32) -> Result<(), Fault>>;

/// A word-store hook, invoked by `SWCz` to obtain the 4 bytes the CPU then writes to memory.
/// Receives the source register index and returns the word to store.
pub type SwcFn = Box<dyn FnMut(&mut Cpu, RegIndex) -> Result<u32, Fault>>;

/// One coprocessor slot: up to three independently optional callables.
#[derive(Default)]
pub struct Coprocessor {
    pub cop: Option<CopFn>,
    pub lwc: Option<LwcFn>,
    pub swc: Option<SwcFn>,
}

impl Coprocessor {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}
