//! A MIPS-I interpreting CPU core: decode, dispatch and execute one instruction at a time
//! against an externally-owned memory device.
//!
//! The crate exposes [`Cpu`], the register file and fetch-decode-execute loop; [`Memory`], the
//! trait a host implements to back instruction/data access; [`Coprocessor`], the pluggable
//! `COPz`/`LWCz`/`SWCz` hook table; and [`Fault`], the single error type both library misuse and
//! architectural exceptions are reported through.
//!
//! Loading program images, wiring up a concrete memory device and driving the step loop from a
//! host application are all left to the caller.

pub mod coprocessor;
pub mod cpu;
pub mod decode;
pub mod fault;
pub mod memory;
pub mod register;

#[cfg(test)]
mod test;

pub use coprocessor::{CopFn, Coprocessor, LwcFn, SwcFn};
pub use cpu::Cpu;
pub use decode::{decode, Decoded, IForm, JForm, Opcode, RForm};
pub use fault::Fault;
pub use memory::Memory;
pub use register::RegIndex;
