//! Decoding of a 32-bit MIPS-I instruction word into its opcode/function fields and, where
//! useful for inspection, one of the three encoding shapes (spec.md §3, §4.1, §4.2).

use std::fmt;

use mips_util::fields;

use crate::register::RegIndex;

/// A raw instruction word together with convenient field accessors. Handlers read fields
/// directly off this rather than going through [`Decoded`], the same way the dispatch tables
/// key off the raw fields instead of a pre-built enum — avoids re-decoding cost that a tagged
/// variant would pay on every step.
#[derive(Debug, Clone, Copy)]
pub struct Opcode(pub u32);

impl Opcode {
    #[must_use]
    pub fn new(word: u32) -> Self {
        Opcode(word)
    }

    #[must_use]
    pub fn word(self) -> u32 {
        self.0
    }

    /// Primary 6-bit opcode field.
    #[must_use]
    pub fn op(self) -> u32 {
        fields::opcode(self.0)
    }

    /// R-type function field (also reused as the COPz sub-operation selector).
    #[must_use]
    pub fn funct(self) -> u32 {
        fields::funct(self.0)
    }

    #[must_use]
    pub fn rs(self) -> RegIndex {
        RegIndex::from_field(fields::rs(self.0))
    }

    #[must_use]
    pub fn rt(self) -> RegIndex {
        RegIndex::from_field(fields::rt(self.0))
    }

    #[must_use]
    pub fn rd(self) -> RegIndex {
        RegIndex::from_field(fields::rd(self.0))
    }

    #[must_use]
    pub fn shamt(self) -> u32 {
        fields::shamt(self.0)
    }

    /// 16-bit immediate, sign-extended to 32 bits.
    #[must_use]
    pub fn imm_signed(self) -> u32 {
        fields::imm16(self.0)
    }

    /// 16-bit immediate, zero-extended to 32 bits (ANDI/ORI/XORI).
    #[must_use]
    pub fn imm_zero_ext(self) -> u32 {
        fields::imm16_zext(self.0)
    }

    /// 26-bit jump target field.
    #[must_use]
    pub fn target26(self) -> u32 {
        fields::target26(self.0)
    }

    /// `rt` field read as the REGIMM selector, or as the COPz sub-operation selector for
    /// `MFCz`/`MTCz` style instructions (bit 4 distinguishes the two groups for COP2 in some
    /// ISAs, but MIPS-I COP0 only defines MF/MT/RFE, which this crate does not dispatch beyond
    /// invoking the installed coprocessor hook — see [`crate::coprocessor`]).
    #[must_use]
    pub fn regimm_selector(self) -> u32 {
        fields::rt(self.0)
    }
}

/// R-form: three register fields plus a shift amount and function code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RForm {
    pub opcode: u32,
    pub rs: u32,
    pub rt: u32,
    pub rd: u32,
    pub shamt: u32,
    pub funct: u32,
}

/// I-form: two register fields plus a sign-extended 16-bit immediate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IForm {
    pub opcode: u32,
    pub rs: u32,
    pub rt: u32,
    pub imm16: u32,
}

/// J-form: a single 26-bit jump target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JForm {
    pub opcode: u32,
    pub target26: u32,
}

/// One of the three MIPS-I encoding shapes, classified purely from the primary opcode field.
/// Exists for inspection/testing against spec.md §3's data model; the execution path decodes
/// fields directly off [`Opcode`] instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decoded {
    R(RForm),
    I(IForm),
    J(JForm),
}

/// Classify a 32-bit word by its primary opcode into one of the three shapes.
#[must_use]
pub fn decode(word: u32) -> Decoded {
    let opcode = fields::opcode(word);
    match opcode {
        0x0 => Decoded::R(RForm {
            opcode,
            rs: fields::rs(word),
            rt: fields::rt(word),
            rd: fields::rd(word),
            shamt: fields::shamt(word),
            funct: fields::funct(word),
        }),
        0x2 | 0x3 => Decoded::J(JForm {
            opcode,
            target26: fields::target26(word),
        }),
        _ => Decoded::I(IForm {
            opcode,
            rs: fields::rs(word),
            rt: fields::rt(word),
            imm16: fields::imm16(word),
        }),
    }
}

impl fmt::Display for Opcode {
    /// A one-line, GNU-as-style mnemonic rendering, used only by diagnostic tracing
    /// (spec.md §4.5) — never by execution.
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self.op() {
            0x0 => match self.funct() {
                0x00 => write!(f, "sll {} {} {}", self.rd(), self.rt(), self.shamt()),
                0x02 => write!(f, "srl {} {} {}", self.rd(), self.rt(), self.shamt()),
                0x03 => write!(f, "sra {} {} {}", self.rd(), self.rt(), self.shamt()),
                0x04 => write!(f, "sllv {} {} {}", self.rd(), self.rt(), self.rs()),
                0x06 => write!(f, "srlv {} {} {}", self.rd(), self.rt(), self.rs()),
                0x07 => write!(f, "srav {} {} {}", self.rd(), self.rt(), self.rs()),
                0x08 => write!(f, "jr {}", self.rs()),
                0x09 => write!(f, "jalr {} {}", self.rd(), self.rs()),
                0x0c => write!(f, "syscall"),
                0x0d => write!(f, "break"),
                0x10 => write!(f, "mfhi {}", self.rd()),
                0x11 => write!(f, "mthi {}", self.rs()),
                0x12 => write!(f, "mflo {}", self.rd()),
                0x13 => write!(f, "mtlo {}", self.rs()),
                0x18 => write!(f, "mult {} {}", self.rs(), self.rt()),
                0x19 => write!(f, "multu {} {}", self.rs(), self.rt()),
                0x1a => write!(f, "div {} {}", self.rs(), self.rt()),
                0x1b => write!(f, "divu {} {}", self.rs(), self.rt()),
                0x20 => write!(f, "add {} {} {}", self.rd(), self.rs(), self.rt()),
                0x21 => write!(f, "addu {} {} {}", self.rd(), self.rs(), self.rt()),
                0x22 => write!(f, "sub {} {} {}", self.rd(), self.rs(), self.rt()),
                0x23 => write!(f, "subu {} {} {}", self.rd(), self.rs(), self.rt()),
                0x24 => write!(f, "and {} {} {}", self.rd(), self.rs(), self.rt()),
                0x25 => write!(f, "or {} {} {}", self.rd(), self.rs(), self.rt()),
                0x26 => write!(f, "xor {} {} {}", self.rd(), self.rs(), self.rt()),
                0x27 => write!(f, "nor {} {} {}", self.rd(), self.rs(), self.rt()),
                0x2a => write!(f, "slt {} {} {}", self.rd(), self.rs(), self.rt()),
                0x2b => write!(f, "sltu {} {} {}", self.rd(), self.rs(), self.rt()),
                _ => write!(f, "illegal"),
            },
            0x1 => {
                let op = match self.regimm_selector() {
                    0 => "bltz",
                    1 => "bgez",
                    16 => "bltzal",
                    17 => "bgezal",
                    _ => "illegal",
                };
                write!(f, "{} {} {}", op, self.rs(), self.imm_signed() as i32)
            }
            0x2 => write!(f, "j {:08x}", self.target26() << 2),
            0x3 => write!(f, "jal {:08x}", self.target26() << 2),
            0x4 => write!(f, "beq {} {} {}", self.rs(), self.rt(), self.imm_signed() as i32),
            0x5 => write!(f, "bne {} {} {}", self.rs(), self.rt(), self.imm_signed() as i32),
            0x6 => write!(f, "blez {} {}", self.rs(), self.imm_signed() as i32),
            0x7 => write!(f, "bgtz {} {}", self.rs(), self.imm_signed() as i32),
            0x8 => write!(f, "addi {} {} {}", self.rt(), self.rs(), self.imm_signed() as i32),
            0x9 => write!(f, "addiu {} {} {}", self.rt(), self.rs(), self.imm_signed() as i32),
            0xa => write!(f, "slti {} {} {}", self.rt(), self.rs(), self.imm_signed() as i32),
            0xb => write!(f, "sltiu {} {} {}", self.rt(), self.rs(), self.imm_signed() as i32),
            0xc => write!(f, "andi {} {} {:#x}", self.rt(), self.rs(), self.imm_zero_ext()),
            0xd => write!(f, "ori {} {} {:#x}", self.rt(), self.rs(), self.imm_zero_ext()),
            0xe => write!(f, "xori {} {} {:#x}", self.rt(), self.rs(), self.imm_zero_ext()),
            0xf => write!(f, "lui {} {:#x}", self.rt(), self.imm_zero_ext()),
            0x10..=0x13 => write!(f, "cop{}", self.op() - 0x10),
            0x20 => write!(f, "lb {} {}({})", self.rt(), self.imm_signed() as i32, self.rs()),
            0x21 => write!(f, "lh {} {}({})", self.rt(), self.imm_signed() as i32, self.rs()),
            0x22 => write!(f, "lwl {} {}({})", self.rt(), self.imm_signed() as i32, self.rs()),
            0x23 => write!(f, "lw {} {}({})", self.rt(), self.imm_signed() as i32, self.rs()),
            0x24 => write!(f, "lbu {} {}({})", self.rt(), self.imm_signed() as i32, self.rs()),
            0x25 => write!(f, "lhu {} {}({})", self.rt(), self.imm_signed() as i32, self.rs()),
            0x26 => write!(f, "lwr {} {}({})", self.rt(), self.imm_signed() as i32, self.rs()),
            0x28 => write!(f, "sb {} {}({})", self.rt(), self.imm_signed() as i32, self.rs()),
            0x29 => write!(f, "sh {} {}({})", self.rt(), self.imm_signed() as i32, self.rs()),
            0x2a => write!(f, "swl {} {}({})", self.rt(), self.imm_signed() as i32, self.rs()),
            0x2b => write!(f, "sw {} {}({})", self.rt(), self.imm_signed() as i32, self.rs()),
            0x2e => write!(f, "swr {} {}({})", self.rt(), self.imm_signed() as i32, self.rs()),
            0x30..=0x33 => write!(f, "lwc{}", self.op() - 0x30),
            0x38..=0x3b => write!(f, "swc{}", self.op() - 0x38),
            _ => write!(f, "illegal"),
        }
    }
}
