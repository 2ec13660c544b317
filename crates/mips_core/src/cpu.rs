//! The CPU execution engine: register file, decode/dispatch, instruction semantics and the
//! fetch-decode-execute loop with its branch-delay machinery (spec.md §3, §4).

use std::cell::RefCell;
use std::fmt;
use std::io::{self, Write};
use std::rc::Rc;

use log::trace;

use crate::coprocessor::Coprocessor;
use crate::decode::Opcode;
use crate::fault::Fault;
use crate::memory::Memory;
use crate::register::RegIndex;

use mips_util::endian::{reverse_half, reverse_word};

const EXCEPTION_HANDLER_SLOTS: usize = 16;

/// Everything a successful instruction handler wants to commit. Left unapplied until the
/// handler has returned `Ok`, so a fault never leaves partial state behind (spec.md §4.4
/// "Failure atomicity").
#[derive(Default, Clone, Copy)]
struct Effect {
    reg: Option<(RegIndex, u32)>,
    hi_lo: Option<(u32, u32)>,
    /// `Some(target)` for a taken branch/jump; `None` for straight-line execution.
    branch: Option<u32>,
}

impl Effect {
    fn none() -> Self {
        Self::default()
    }

    fn reg(idx: RegIndex, val: u32) -> Self {
        Self { reg: Some((idx, val)), ..Self::default() }
    }

    fn hi_lo(hi: u32, lo: u32) -> Self {
        Self { hi_lo: Some((hi, lo)), ..Self::default() }
    }

    fn branch(target: u32) -> Self {
        Self { branch: Some(target), ..Self::default() }
    }

    fn reg_and_branch(idx: RegIndex, val: u32, target: u32) -> Self {
        Self { reg: Some((idx, val)), branch: Some(target), ..Self::default() }
    }
}

type Handler = fn(&mut Cpu, Opcode) -> Result<Effect, Fault>;

/// The MIPS-I register file, special registers, program counter machinery, configuration and
/// collaborator handles owned by one simulator instance.
pub struct Cpu {
    registers: [u32; 32],
    hi: u32,
    lo: u32,
    /// The next-to-execute byte address. Always a multiple of four at rest.
    pc: u32,
    /// The would-be successor of `pc`. `pc_next == pc + 4` at rest; a taken branch/jump
    /// rewrites it to the branch target instead (spec.md §3, §4.4).
    pc_next: u32,
    mem: Rc<RefCell<dyn Memory>>,
    debug_level: u32,
    debug_sink: Option<Box<dyn Write>>,
    debug_handler: Option<Box<dyn FnMut(&Cpu, &[u8])>>,
    coprocessors: [Coprocessor; 4],
    exception_handlers: [u32; EXCEPTION_HANDLER_SLOTS],
}

impl Cpu {
    /// Create a new instance bound to `mem`. The instance does not own `mem` — dropping the
    /// `Cpu` never drops the memory (spec.md §3/§5), which is why it is held behind an `Rc`
    /// rather than by value.
    #[must_use]
    pub fn new(mem: Rc<RefCell<dyn Memory>>) -> Self {
        Self {
            registers: [0; 32],
            hi: 0,
            lo: 0,
            pc: 0,
            pc_next: 4,
            mem,
            debug_level: 0,
            debug_sink: None,
            debug_handler: None,
            coprocessors: default_coprocessors(),
            exception_handlers: [0; EXCEPTION_HANDLER_SLOTS],
        }
    }

    /// Zero all architectural state. Configuration (`mem`, debug level/sink/handler) survives.
    pub fn reset(&mut self) {
        self.registers = [0; 32];
        self.hi = 0;
        self.lo = 0;
        self.pc = 0;
        self.pc_next = 4;
        self.coprocessors = default_coprocessors();
        self.exception_handlers = [0; EXCEPTION_HANDLER_SLOTS];
    }

    // --- Register / PC access -------------------------------------------------------------

    #[must_use]
    pub fn get_register(&self, i: usize) -> Result<u32, Fault> {
        self.registers.get(i).copied().ok_or(Fault::InvalidArgument)
    }

    pub fn set_register(&mut self, i: usize, val: u32) -> Result<(), Fault> {
        if i >= self.registers.len() {
            return Err(Fault::InvalidArgument);
        }
        // Index 0 is hard-wired to zero: writes to it are silently discarded, not an error.
        if i != 0 {
            self.registers[i] = val;
        }
        Ok(())
    }

    #[must_use]
    pub fn get_pc(&self) -> u32 {
        self.pc
    }

    pub fn set_pc(&mut self, val: u32) {
        self.pc = val;
        self.pc_next = val.wrapping_add(4);
    }

    #[must_use]
    pub fn hi_lo(&self) -> (u32, u32) {
        (self.hi, self.lo)
    }

    /// Bulk, read-only view of the register file — a convenience for a test harness snapshotting
    /// full state instead of calling [`Cpu::get_register`] 32 times.
    #[must_use]
    pub fn registers(&self) -> &[u32; 32] {
        &self.registers
    }

    fn read_reg(&self, idx: RegIndex) -> u32 {
        self.registers[idx.index()]
    }

    fn write_reg(&mut self, idx: RegIndex, val: u32) {
        if idx.index() != 0 {
            self.registers[idx.index()] = val;
        }
    }

    // --- Diagnostics -----------------------------------------------------------------------

    pub fn set_debug_level(&mut self, level: u32, sink: Option<Box<dyn Write>>) {
        self.debug_level = level;
        self.debug_sink = sink;
    }

    pub fn set_debug_handler(&mut self, handler: Option<Box<dyn FnMut(&Cpu, &[u8])>>) {
        self.debug_handler = handler;
    }

    /// Emit one trace line if `debug_level` is at least `level`. Silent otherwise — the only
    /// contract spec.md §4.5 makes about the exact text.
    fn trace(&mut self, level: u32, line: fmt::Arguments) {
        if self.debug_level < level {
            return;
        }
        let mut bytes = line.to_string().into_bytes();
        bytes.push(b'\n');
        if let Some(mut handler) = self.debug_handler.take() {
            handler(self, &bytes);
            self.debug_handler = Some(handler);
        } else if let Some(sink) = self.debug_sink.as_mut() {
            let _ = sink.write_all(&bytes);
        } else {
            let _ = io::stdout().write_all(&bytes);
        }
    }

    // --- Coprocessors / exception handler table --------------------------------------------

    pub fn set_coprocessor(&mut self, i: usize, coprocessor: Coprocessor) -> Result<(), Fault> {
        let slot = self.coprocessors.get_mut(i).ok_or(Fault::InvalidArgument)?;
        *slot = coprocessor;
        Ok(())
    }

    /// Record the handler address for exception kind `i`. Stored but never dispatched by
    /// [`Cpu::step`] — reserved for future in-simulator exception vectoring (spec.md §3, §9).
    pub fn set_exception_handler(&mut self, i: usize, addr: u32) -> Result<(), Fault> {
        let slot = self.exception_handlers.get_mut(i).ok_or(Fault::InvalidArgument)?;
        *slot = addr;
        Ok(())
    }

    #[must_use]
    pub fn get_exception_handler(&self, i: usize) -> Result<u32, Fault> {
        self.exception_handlers.get(i).copied().ok_or(Fault::InvalidArgument)
    }

    // --- Memory boundary helpers -------------------------------------------------------------

    fn fetch_word(&self, addr: u32) -> Result<u32, Fault> {
        let mut buf = [0u8; 4];
        self.mem.borrow_mut().read(addr, 4, &mut buf)?;
        Ok(reverse_word(u32::from_ne_bytes(buf)))
    }

    fn load_word(&self, addr: u32) -> Result<u32, Fault> {
        if addr % 4 != 0 {
            return Err(Fault::InvalidAlignment);
        }
        self.fetch_word(addr)
    }

    fn load_half(&self, addr: u32) -> Result<u16, Fault> {
        if addr % 2 != 0 {
            return Err(Fault::InvalidAlignment);
        }
        self.load_half_unchecked(addr)
    }

    fn load_half_unchecked(&self, addr: u32) -> Result<u16, Fault> {
        let mut buf = [0u8; 2];
        self.mem.borrow_mut().read(addr, 2, &mut buf)?;
        Ok(reverse_half(u16::from_ne_bytes(buf)))
    }

    fn load_byte(&self, addr: u32) -> Result<u8, Fault> {
        let mut buf = [0u8; 1];
        self.mem.borrow_mut().read(addr, 1, &mut buf)?;
        Ok(buf[0])
    }

    fn store_word(&self, addr: u32, val: u32) -> Result<(), Fault> {
        if addr % 4 != 0 {
            return Err(Fault::InvalidAlignment);
        }
        let buf = reverse_word(val).to_ne_bytes();
        self.mem.borrow_mut().write(addr, 4, &buf)
    }

    fn store_half(&self, addr: u32, val: u16) -> Result<(), Fault> {
        if addr % 2 != 0 {
            return Err(Fault::InvalidAlignment);
        }
        self.store_half_unchecked(addr, val)
    }

    fn store_half_unchecked(&self, addr: u32, val: u16) -> Result<(), Fault> {
        let buf = reverse_half(val).to_ne_bytes();
        self.mem.borrow_mut().write(addr, 2, &buf)
    }

    fn store_byte(&self, addr: u32, val: u8) -> Result<(), Fault> {
        self.mem.borrow_mut().write(addr, 1, &[val])
    }

    // --- Fetch-decode-execute ---------------------------------------------------------------

    /// Fetch, decode and execute exactly one instruction.
    ///
    /// On success, `pc`/`pc_next` roll forward (straight-line or taken branch/jump) and any
    /// register/HI-LO write the instruction made is visible. On failure, architectural state
    /// is bit-identical to before the call (spec.md §4.4, §8 invariant 2); the returned
    /// [`Fault`] names what went wrong.
    pub fn step(&mut self) -> Result<(), Fault> {
        if self.pc % 4 != 0 {
            trace!("exception thrown: {} at pc={:08x}", Fault::InvalidAlignment, self.pc);
            self.trace(1, format_args!("exception: {} pc={:08x}", Fault::InvalidAlignment, self.pc));
            return Err(Fault::InvalidAlignment);
        }

        let word = match self.fetch_word(self.pc) {
            Ok(word) => word,
            Err(fault) => {
                trace!("exception thrown: {fault} fetching pc={:08x}", self.pc);
                self.trace(1, format_args!("exception: {} fetching pc={:08x}", fault, self.pc));
                return Err(fault);
            }
        };

        let op = Opcode::new(word);
        let addr = self.pc;

        let result = dispatch(self, op);

        match result {
            Ok(effect) => {
                if self.debug_level >= 2 {
                    self.trace(2, format_args!("{addr:08x}: {op}"));
                }
                if let Some((idx, val)) = effect.reg {
                    if self.debug_level >= 3 {
                        self.trace(3, format_args!("  write {idx} = {val:#010x}"));
                    }
                    self.write_reg(idx, val);
                }
                if let Some((hi, lo)) = effect.hi_lo {
                    self.hi = hi;
                    self.lo = lo;
                }
                let new_pc = self.pc_next;
                let new_pc_next = effect.branch.unwrap_or_else(|| new_pc.wrapping_add(4));
                self.pc = new_pc;
                self.pc_next = new_pc_next;
                Ok(())
            }
            Err(fault) => {
                trace!("exception thrown: {fault} at pc={addr:08x}");
                self.trace(1, format_args!("exception: {fault} at pc={addr:08x}"));
                Err(fault)
            }
        }
    }

    fn effective_addr(&self, op: Opcode) -> u32 {
        self.read_reg(op.rs()).wrapping_add(op.imm_signed())
    }

    /// The address of the instruction after the branch delay slot — the link value `JAL`/
    /// `JALR`/the `AL` branches write to `$ra`.
    fn link_addr(&self) -> u32 {
        self.pc_next.wrapping_add(4)
    }

    /// The target of a taken conditional branch: the delay slot's address plus the
    /// sign-extended, word-shifted immediate (spec.md §4.3).
    fn branch_target(&self, op: Opcode) -> u32 {
        self.pc_next.wrapping_add(op.imm_signed() << 2)
    }
}

fn default_coprocessors() -> [Coprocessor; 4] {
    [Coprocessor::new(), Coprocessor::new(), Coprocessor::new(), Coprocessor::new()]
}

// ---------------------------------------------------------------------------------------------
// Dispatch tables (spec.md §4.2). Opcode 0 routes through `dispatch_special` keyed by the
// function field; opcode 1 routes through `dispatch_regimm` keyed by the `rt` field. Both are
// nested matches rather than literal arrays — an equally valid O(1) tagged-variant dispatch
// (spec.md §9) that keeps the mnemonic table in `Display for Opcode` as the single source of
// instruction names instead of duplicating them here.
// ---------------------------------------------------------------------------------------------

fn dispatch(cpu: &mut Cpu, op: Opcode) -> Result<Effect, Fault> {
    match op.op() {
        0x00 => dispatch_special(cpu, op),
        0x01 => dispatch_regimm(cpu, op),
        0x02 => op_j(cpu, op),
        0x03 => op_jal(cpu, op),
        0x04 => op_beq(cpu, op),
        0x05 => op_bne(cpu, op),
        0x06 => op_blez(cpu, op),
        0x07 => op_bgtz(cpu, op),
        0x08 => op_addi(cpu, op),
        0x09 => op_addiu(cpu, op),
        0x0a => op_slti(cpu, op),
        0x0b => op_sltiu(cpu, op),
        0x0c => op_andi(cpu, op),
        0x0d => op_ori(cpu, op),
        0x0e => op_xori(cpu, op),
        0x0f => op_lui(cpu, op),
        0x10 => dispatch_cop(cpu, 0, op),
        0x11 => dispatch_cop(cpu, 1, op),
        0x12 => dispatch_cop(cpu, 2, op),
        0x13 => dispatch_cop(cpu, 3, op),
        0x20 => op_lb(cpu, op),
        0x21 => op_lh(cpu, op),
        0x22 => op_lwl(cpu, op),
        0x23 => op_lw(cpu, op),
        0x24 => op_lbu(cpu, op),
        0x25 => op_lhu(cpu, op),
        0x26 => op_lwr(cpu, op),
        0x28 => op_sb(cpu, op),
        0x29 => op_sh(cpu, op),
        0x2a => op_swl(cpu, op),
        0x2b => op_sw(cpu, op),
        0x2e => op_swr(cpu, op),
        0x30 => dispatch_lwc(cpu, 0, op),
        0x31 => dispatch_lwc(cpu, 1, op),
        0x32 => dispatch_lwc(cpu, 2, op),
        0x33 => dispatch_lwc(cpu, 3, op),
        0x38 => dispatch_swc(cpu, 0, op),
        0x39 => dispatch_swc(cpu, 1, op),
        0x3a => dispatch_swc(cpu, 2, op),
        0x3b => dispatch_swc(cpu, 3, op),
        _ => Err(Fault::InvalidInstruction),
    }
}

fn dispatch_special(cpu: &mut Cpu, op: Opcode) -> Result<Effect, Fault> {
    match op.funct() {
        0x00 => op_sll(cpu, op),
        0x02 => op_srl(cpu, op),
        0x03 => op_sra(cpu, op),
        0x04 => op_sllv(cpu, op),
        0x06 => op_srlv(cpu, op),
        0x07 => op_srav(cpu, op),
        0x08 => op_jr(cpu, op),
        0x09 => op_jalr(cpu, op),
        0x0c => Err(Fault::SystemCall),
        0x0d => Err(Fault::Break),
        0x10 => op_mfhi(cpu, op),
        0x11 => op_mthi(cpu, op),
        0x12 => op_mflo(cpu, op),
        0x13 => op_mtlo(cpu, op),
        0x18 => op_mult(cpu, op),
        0x19 => op_multu(cpu, op),
        0x1a => op_div(cpu, op),
        0x1b => op_divu(cpu, op),
        0x20 => op_add(cpu, op),
        0x21 => op_addu(cpu, op),
        0x22 => op_sub(cpu, op),
        0x23 => op_subu(cpu, op),
        0x24 => op_and(cpu, op),
        0x25 => op_or(cpu, op),
        0x26 => op_xor(cpu, op),
        0x27 => op_nor(cpu, op),
        0x2a => op_slt(cpu, op),
        0x2b => op_sltu(cpu, op),
        _ => Err(Fault::InvalidInstruction),
    }
}

fn dispatch_regimm(cpu: &mut Cpu, op: Opcode) -> Result<Effect, Fault> {
    let (branch_if_positive, link) = match op.regimm_selector() {
        0 => (false, false),
        1 => (true, false),
        16 => (false, true),
        17 => (true, true),
        _ => return Err(Fault::InvalidInstruction),
    };
    let val = cpu.read_reg(op.rs()) as i32;
    let taken = if branch_if_positive { val >= 0 } else { val < 0 };
    let link_addr = cpu.link_addr();
    let target = cpu.branch_target(op);
    Ok(match (link, taken) {
        (true, true) => Effect::reg_and_branch(RegIndex::RA, link_addr, target),
        (true, false) => Effect::reg(RegIndex::RA, link_addr),
        (false, true) => Effect::branch(target),
        (false, false) => Effect::none(),
    })
}

fn dispatch_cop(cpu: &mut Cpu, slot: usize, op: Opcode) -> Result<Effect, Fault> {
    let mut hook = cpu.coprocessors[slot].cop.take();
    let result = match hook.as_mut() {
        Some(f) => f(cpu, op.word()),
        None => Err(Fault::CoprocessorUnusable),
    };
    cpu.coprocessors[slot].cop = hook;
    result.map(|()| Effect::none())
}

fn dispatch_lwc(cpu: &mut Cpu, slot: usize, op: Opcode) -> Result<Effect, Fault> {
    let addr = cpu.effective_addr(op);
    let word = cpu.load_word(addr)?;
    let mut hook = cpu.coprocessors[slot].lwc.take();
    let result = match hook.as_mut() {
        Some(f) => f(cpu, op.rt(), word),
        None => Err(Fault::CoprocessorUnusable),
    };
    cpu.coprocessors[slot].lwc = hook;
    result.map(|()| Effect::none())
}

fn dispatch_swc(cpu: &mut Cpu, slot: usize, op: Opcode) -> Result<Effect, Fault> {
    let mut hook = cpu.coprocessors[slot].swc.take();
    let result = match hook.as_mut() {
        Some(f) => f(cpu, op.rt()),
        None => Err(Fault::CoprocessorUnusable),
    };
    cpu.coprocessors[slot].swc = hook;
    let word = result?;
    let addr = cpu.effective_addr(op);
    cpu.store_word(addr, word)?;
    Ok(Effect::none())
}

// --- Arithmetic --------------------------------------------------------------------------------

fn op_add(cpu: &mut Cpu, op: Opcode) -> Result<Effect, Fault> {
    let lhs = cpu.read_reg(op.rs()) as i32;
    let rhs = cpu.read_reg(op.rt()) as i32;
    match lhs.checked_add(rhs) {
        Some(val) => Ok(Effect::reg(op.rd(), val as u32)),
        None => Err(Fault::ArithmeticOverflow),
    }
}

fn op_addu(cpu: &mut Cpu, op: Opcode) -> Result<Effect, Fault> {
    let val = cpu.read_reg(op.rs()).wrapping_add(cpu.read_reg(op.rt()));
    Ok(Effect::reg(op.rd(), val))
}

fn op_sub(cpu: &mut Cpu, op: Opcode) -> Result<Effect, Fault> {
    let lhs = cpu.read_reg(op.rs()) as i32;
    let rhs = cpu.read_reg(op.rt()) as i32;
    match lhs.checked_sub(rhs) {
        Some(val) => Ok(Effect::reg(op.rd(), val as u32)),
        None => Err(Fault::ArithmeticOverflow),
    }
}

fn op_subu(cpu: &mut Cpu, op: Opcode) -> Result<Effect, Fault> {
    let val = cpu.read_reg(op.rs()).wrapping_sub(cpu.read_reg(op.rt()));
    Ok(Effect::reg(op.rd(), val))
}

fn op_addi(cpu: &mut Cpu, op: Opcode) -> Result<Effect, Fault> {
    let lhs = cpu.read_reg(op.rs()) as i32;
    match lhs.checked_add(op.imm_signed() as i32) {
        Some(val) => Ok(Effect::reg(op.rt(), val as u32)),
        None => Err(Fault::ArithmeticOverflow),
    }
}

fn op_addiu(cpu: &mut Cpu, op: Opcode) -> Result<Effect, Fault> {
    let val = cpu.read_reg(op.rs()).wrapping_add(op.imm_signed());
    Ok(Effect::reg(op.rt(), val))
}

// --- Logical -------------------------------------------------------------------------------

fn op_and(cpu: &mut Cpu, op: Opcode) -> Result<Effect, Fault> {
    Ok(Effect::reg(op.rd(), cpu.read_reg(op.rs()) & cpu.read_reg(op.rt())))
}

fn op_or(cpu: &mut Cpu, op: Opcode) -> Result<Effect, Fault> {
    Ok(Effect::reg(op.rd(), cpu.read_reg(op.rs()) | cpu.read_reg(op.rt())))
}

fn op_xor(cpu: &mut Cpu, op: Opcode) -> Result<Effect, Fault> {
    Ok(Effect::reg(op.rd(), cpu.read_reg(op.rs()) ^ cpu.read_reg(op.rt())))
}

fn op_nor(cpu: &mut Cpu, op: Opcode) -> Result<Effect, Fault> {
    Ok(Effect::reg(op.rd(), !(cpu.read_reg(op.rs()) | cpu.read_reg(op.rt()))))
}

fn op_andi(cpu: &mut Cpu, op: Opcode) -> Result<Effect, Fault> {
    Ok(Effect::reg(op.rt(), cpu.read_reg(op.rs()) & op.imm_zero_ext()))
}

fn op_ori(cpu: &mut Cpu, op: Opcode) -> Result<Effect, Fault> {
    Ok(Effect::reg(op.rt(), cpu.read_reg(op.rs()) | op.imm_zero_ext()))
}

fn op_xori(cpu: &mut Cpu, op: Opcode) -> Result<Effect, Fault> {
    Ok(Effect::reg(op.rt(), cpu.read_reg(op.rs()) ^ op.imm_zero_ext()))
}

fn op_lui(_cpu: &mut Cpu, op: Opcode) -> Result<Effect, Fault> {
    Ok(Effect::reg(op.rt(), op.imm_zero_ext() << 16))
}

// --- Shift ---------------------------------------------------------------------------------

fn op_sll(cpu: &mut Cpu, op: Opcode) -> Result<Effect, Fault> {
    Ok(Effect::reg(op.rd(), cpu.read_reg(op.rt()) << op.shamt()))
}

fn op_srl(cpu: &mut Cpu, op: Opcode) -> Result<Effect, Fault> {
    Ok(Effect::reg(op.rd(), cpu.read_reg(op.rt()) >> op.shamt()))
}

fn op_sra(cpu: &mut Cpu, op: Opcode) -> Result<Effect, Fault> {
    let val = (cpu.read_reg(op.rt()) as i32) >> op.shamt();
    Ok(Effect::reg(op.rd(), val as u32))
}

fn op_sllv(cpu: &mut Cpu, op: Opcode) -> Result<Effect, Fault> {
    let shift = cpu.read_reg(op.rs()) & 0x1f;
    Ok(Effect::reg(op.rd(), cpu.read_reg(op.rt()) << shift))
}

fn op_srlv(cpu: &mut Cpu, op: Opcode) -> Result<Effect, Fault> {
    let shift = cpu.read_reg(op.rs()) & 0x1f;
    Ok(Effect::reg(op.rd(), cpu.read_reg(op.rt()) >> shift))
}

fn op_srav(cpu: &mut Cpu, op: Opcode) -> Result<Effect, Fault> {
    let shift = cpu.read_reg(op.rs()) & 0x1f;
    let val = (cpu.read_reg(op.rt()) as i32) >> shift;
    Ok(Effect::reg(op.rd(), val as u32))
}

// --- Compare ---------------------------------------------------------------------------------

fn op_slt(cpu: &mut Cpu, op: Opcode) -> Result<Effect, Fault> {
    let val = (cpu.read_reg(op.rs()) as i32) < (cpu.read_reg(op.rt()) as i32);
    Ok(Effect::reg(op.rd(), val as u32))
}

fn op_sltu(cpu: &mut Cpu, op: Opcode) -> Result<Effect, Fault> {
    let val = cpu.read_reg(op.rs()) < cpu.read_reg(op.rt());
    Ok(Effect::reg(op.rd(), val as u32))
}

fn op_slti(cpu: &mut Cpu, op: Opcode) -> Result<Effect, Fault> {
    let val = (cpu.read_reg(op.rs()) as i32) < (op.imm_signed() as i32);
    Ok(Effect::reg(op.rt(), val as u32))
}

fn op_sltiu(cpu: &mut Cpu, op: Opcode) -> Result<Effect, Fault> {
    let val = cpu.read_reg(op.rs()) < op.imm_signed();
    Ok(Effect::reg(op.rt(), val as u32))
}

// --- Multiply / divide -----------------------------------------------------------------------

fn op_mfhi(cpu: &mut Cpu, op: Opcode) -> Result<Effect, Fault> {
    Ok(Effect::reg(op.rd(), cpu.hi))
}

fn op_mthi(cpu: &mut Cpu, op: Opcode) -> Result<Effect, Fault> {
    Ok(Effect::hi_lo(cpu.read_reg(op.rs()), cpu.lo))
}

fn op_mflo(cpu: &mut Cpu, op: Opcode) -> Result<Effect, Fault> {
    Ok(Effect::reg(op.rd(), cpu.lo))
}

fn op_mtlo(cpu: &mut Cpu, op: Opcode) -> Result<Effect, Fault> {
    Ok(Effect::hi_lo(cpu.hi, cpu.read_reg(op.rs())))
}

fn op_mult(cpu: &mut Cpu, op: Opcode) -> Result<Effect, Fault> {
    let lhs = i64::from(cpu.read_reg(op.rs()) as i32);
    let rhs = i64::from(cpu.read_reg(op.rt()) as i32);
    let val = (lhs * rhs) as u64;
    Ok(Effect::hi_lo((val >> 32) as u32, val as u32))
}

fn op_multu(cpu: &mut Cpu, op: Opcode) -> Result<Effect, Fault> {
    let lhs = u64::from(cpu.read_reg(op.rs()));
    let rhs = u64::from(cpu.read_reg(op.rt()));
    let val = lhs * rhs;
    Ok(Effect::hi_lo((val >> 32) as u32, val as u32))
}

/// Division by zero and signed `INT_MIN / -1` do not trap; both write zero to HI and LO. This
/// is a deliberate deviation from the MIPS-I reference, which leaves the result undefined
/// (spec.md §4.3, §9 "Open questions").
fn op_div(cpu: &mut Cpu, op: Opcode) -> Result<Effect, Fault> {
    let lhs = cpu.read_reg(op.rs()) as i32;
    let rhs = cpu.read_reg(op.rt()) as i32;
    if rhs == 0 || (rhs == -1 && lhs == i32::MIN) {
        return Ok(Effect::hi_lo(0, 0));
    }
    Ok(Effect::hi_lo((lhs % rhs) as u32, (lhs / rhs) as u32))
}

fn op_divu(cpu: &mut Cpu, op: Opcode) -> Result<Effect, Fault> {
    let lhs = cpu.read_reg(op.rs());
    let rhs = cpu.read_reg(op.rt());
    if rhs == 0 {
        return Ok(Effect::hi_lo(0, 0));
    }
    Ok(Effect::hi_lo(lhs % rhs, lhs / rhs))
}

// --- Loads -----------------------------------------------------------------------------------

fn op_lb(cpu: &mut Cpu, op: Opcode) -> Result<Effect, Fault> {
    let addr = cpu.effective_addr(op);
    let val = cpu.load_byte(addr)? as i8 as i32 as u32;
    Ok(Effect::reg(op.rt(), val))
}

fn op_lbu(cpu: &mut Cpu, op: Opcode) -> Result<Effect, Fault> {
    let addr = cpu.effective_addr(op);
    let val = cpu.load_byte(addr)? as u32;
    Ok(Effect::reg(op.rt(), val))
}

fn op_lh(cpu: &mut Cpu, op: Opcode) -> Result<Effect, Fault> {
    let addr = cpu.effective_addr(op);
    let val = cpu.load_half(addr)? as i16 as i32 as u32;
    Ok(Effect::reg(op.rt(), val))
}

fn op_lhu(cpu: &mut Cpu, op: Opcode) -> Result<Effect, Fault> {
    let addr = cpu.effective_addr(op);
    let val = cpu.load_half(addr)? as u32;
    Ok(Effect::reg(op.rt(), val))
}

fn op_lw(cpu: &mut Cpu, op: Opcode) -> Result<Effect, Fault> {
    let addr = cpu.effective_addr(op);
    let val = cpu.load_word(addr)?;
    Ok(Effect::reg(op.rt(), val))
}

/// Simplified unaligned load: a 2-byte window at `A`, merged into the upper half of `rt`
/// (spec.md §4.3 — a deliberate narrowing of canonical MIPS LWL, matching the source this
/// spec was distilled from; see DESIGN.md).
fn op_lwl(cpu: &mut Cpu, op: Opcode) -> Result<Effect, Fault> {
    let addr = cpu.effective_addr(op);
    let half = cpu.load_half_unchecked(addr)? as u32;
    let val = (cpu.read_reg(op.rt()) & 0x0000_ffff) | (half << 16);
    Ok(Effect::reg(op.rt(), val))
}

/// See [`op_lwl`]: the lower-half counterpart, reading at `A - 1`.
fn op_lwr(cpu: &mut Cpu, op: Opcode) -> Result<Effect, Fault> {
    let addr = cpu.effective_addr(op).wrapping_sub(1);
    let half = cpu.load_half_unchecked(addr)? as u32;
    let val = (cpu.read_reg(op.rt()) & 0xffff_0000) | half;
    Ok(Effect::reg(op.rt(), val))
}

// --- Stores ----------------------------------------------------------------------------------

fn op_sb(cpu: &mut Cpu, op: Opcode) -> Result<Effect, Fault> {
    let addr = cpu.effective_addr(op);
    cpu.store_byte(addr, cpu.read_reg(op.rt()) as u8)?;
    Ok(Effect::none())
}

fn op_sh(cpu: &mut Cpu, op: Opcode) -> Result<Effect, Fault> {
    let addr = cpu.effective_addr(op);
    cpu.store_half(addr, cpu.read_reg(op.rt()) as u16)?;
    Ok(Effect::none())
}

fn op_sw(cpu: &mut Cpu, op: Opcode) -> Result<Effect, Fault> {
    let addr = cpu.effective_addr(op);
    cpu.store_word(addr, cpu.read_reg(op.rt()))?;
    Ok(Effect::none())
}

/// See [`op_lwl`]'s doc comment: the store-side counterpart, writing the upper half of `rt`.
fn op_swl(cpu: &mut Cpu, op: Opcode) -> Result<Effect, Fault> {
    let addr = cpu.effective_addr(op);
    let half = (cpu.read_reg(op.rt()) >> 16) as u16;
    cpu.store_half_unchecked(addr, half)?;
    Ok(Effect::none())
}

fn op_swr(cpu: &mut Cpu, op: Opcode) -> Result<Effect, Fault> {
    let addr = cpu.effective_addr(op).wrapping_sub(1);
    let half = (cpu.read_reg(op.rt()) & 0xffff) as u16;
    cpu.store_half_unchecked(addr, half)?;
    Ok(Effect::none())
}

// --- Jumps -----------------------------------------------------------------------------------

fn op_j(cpu: &mut Cpu, op: Opcode) -> Result<Effect, Fault> {
    let target = (cpu.pc_next & 0xf000_0000) | (op.target26() << 2);
    Ok(Effect::branch(target))
}

fn op_jal(cpu: &mut Cpu, op: Opcode) -> Result<Effect, Fault> {
    let target = (cpu.pc_next & 0xf000_0000) | (op.target26() << 2);
    Ok(Effect::reg_and_branch(RegIndex::RA, cpu.link_addr(), target))
}

fn op_jr(cpu: &mut Cpu, op: Opcode) -> Result<Effect, Fault> {
    let target = cpu.read_reg(op.rs());
    if target % 4 != 0 {
        return Err(Fault::InvalidAlignment);
    }
    Ok(Effect::branch(target))
}

fn op_jalr(cpu: &mut Cpu, op: Opcode) -> Result<Effect, Fault> {
    let target = cpu.read_reg(op.rs());
    if target % 4 != 0 {
        return Err(Fault::InvalidAlignment);
    }
    Ok(Effect::reg_and_branch(op.rd(), cpu.link_addr(), target))
}

// --- Conditional branches ---------------------------------------------------------------------

fn op_beq(cpu: &mut Cpu, op: Opcode) -> Result<Effect, Fault> {
    if cpu.read_reg(op.rs()) == cpu.read_reg(op.rt()) {
        Ok(Effect::branch(cpu.branch_target(op)))
    } else {
        Ok(Effect::none())
    }
}

fn op_bne(cpu: &mut Cpu, op: Opcode) -> Result<Effect, Fault> {
    if cpu.read_reg(op.rs()) != cpu.read_reg(op.rt()) {
        Ok(Effect::branch(cpu.branch_target(op)))
    } else {
        Ok(Effect::none())
    }
}

fn op_blez(cpu: &mut Cpu, op: Opcode) -> Result<Effect, Fault> {
    if (cpu.read_reg(op.rs()) as i32) <= 0 {
        Ok(Effect::branch(cpu.branch_target(op)))
    } else {
        Ok(Effect::none())
    }
}

fn op_bgtz(cpu: &mut Cpu, op: Opcode) -> Result<Effect, Fault> {
    if (cpu.read_reg(op.rs()) as i32) > 0 {
        Ok(Effect::branch(cpu.branch_target(op)))
    } else {
        Ok(Effect::none())
    }
}

impl fmt::Debug for Cpu {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Cpu")
            .field("pc", &format_args!("{:#010x}", self.pc))
            .field("pc_next", &format_args!("{:#010x}", self.pc_next))
            .field("hi", &self.hi)
            .field("lo", &self.lo)
            .finish_non_exhaustive()
    }
}
