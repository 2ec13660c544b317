//! The single fault type returned by every fallible operation on [`crate::Cpu`].
//!
//! Spans two namespaces that the caller cares about differently: a handful of variants are the
//! caller's own mistake or an I/O failure (library errors), the rest are architectural
//! exceptions raised by a simulated instruction. Both are carried as one flat, payload-free
//! `enum` so a single `step()` return type covers everything the core can report.

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum Fault {
    // --- Library errors: caller's mistake or I/O failure. ---
    #[error("operation not implemented")]
    NotImplemented,
    #[error("invalid argument")]
    InvalidArgument,
    #[error("invalid handle")]
    InvalidHandle,
    #[error("failed to read file")]
    FileReadError,
    #[error("failed to write file")]
    FileWriteError,

    // --- Architectural exceptions: raised by a simulated instruction. ---
    #[error("breakpoint trap")]
    Break,
    #[error("invalid address")]
    InvalidAddress,
    #[error("misaligned address")]
    InvalidAlignment,
    #[error("memory access violation")]
    AccessViolation,
    #[error("invalid instruction")]
    InvalidInstruction,
    #[error("arithmetic overflow")]
    ArithmeticOverflow,
    #[error("coprocessor unusable")]
    CoprocessorUnusable,
    #[error("system call trap")]
    SystemCall,
}

