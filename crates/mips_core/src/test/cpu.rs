use std::cell::RefCell;
use std::rc::Rc;

use super::*;
use crate::{Coprocessor, Fault, Memory};

const V0: u32 = 2;
const V1: u32 = 3;
const A0: u32 = 4;
const T0: u32 = 8;
const T1: u32 = 9;
const RA: u32 = 31;

#[test]
fn zero_reg_discards_writes() {
    let cpu = run_program(&[li(0, 1), brk()]);
    assert_eq!(cpu.get_register(0).unwrap(), 0);
}

#[test]
fn addiu_wraps_without_trapping() {
    let cpu = run_program(&[li(V0, 0), addiu(V0, V0, -1), li(V1, -1), addiu(V1, V1, 1), brk()]);
    assert_eq!(cpu.get_register(V0 as usize).unwrap(), u32::MAX);
    assert_eq!(cpu.get_register(V1 as usize).unwrap(), 0);
}

#[test]
fn add_overflow_traps_and_leaves_state_untouched() {
    // Build T0 = i32::MAX via lui/ori, then ADD it to itself to force overflow.
    let mem = Rc::new(RefCell::new(FlatMemory::new(0x100)));
    {
        let mut m = mem.borrow_mut();
        m.write_word_be(0, lui(T0, 0x7fff));
        m.write_word_be(4, ori(T0, T0, 0xffff));
        m.write_word_be(8, add(T1, T0, T0));
    }
    let mut cpu = Cpu::new(mem);
    cpu.step().unwrap();
    cpu.step().unwrap();
    let regs_before = *cpu.registers();
    let pc_before = cpu.get_pc();
    let err = cpu.step().unwrap_err();
    assert_eq!(err, Fault::ArithmeticOverflow);
    assert_eq!(cpu.get_pc(), pc_before);
    assert_eq!(*cpu.registers(), regs_before);
}

#[test]
fn addu_wraps_silently_on_overflow() {
    let cpu = run_program(&[
        li(T0, -1),
        addu(T1, T0, T0), // 0xffffffff + 0xffffffff wraps, never traps
        brk(),
    ]);
    assert_eq!(cpu.get_register(T1 as usize).unwrap(), u32::MAX.wrapping_add(u32::MAX));
}

#[test]
fn logical_immediates_are_zero_extended() {
    // If the 16-bit immediate were sign-extended, ORing 0x8000 into $0 would yield
    // 0xffff8000 instead of 0x00008000.
    let cpu = run_program(&[ori(V0, 0, 0x8000), brk()]);
    assert_eq!(cpu.get_register(V0 as usize).unwrap(), 0x0000_8000);
}

#[test]
fn lui_places_immediate_in_upper_half() {
    let cpu = run_program(&[lui(V0, 0x8000), brk()]);
    assert_eq!(cpu.get_register(V0 as usize).unwrap(), 0x8000_0000);
}

#[test]
fn shift_immediate_and_variable_forms() {
    let cpu = run_program(&[
        li(V0, 8),
        sll(V0, V0, 2),
        li(V1, -8),
        sra(V1, V1, 2),
        brk(),
    ]);
    assert_eq!(cpu.get_register(V0 as usize).unwrap(), 8 << 2);
    assert_eq!(cpu.get_register(V1 as usize).unwrap(), ((-8_i32) >> 2) as u32);
}

#[test]
fn variable_shift_masks_to_low_five_bits() {
    // A shift-amount register of 34 behaves as a shift of 2 (34 & 0x1f == 2).
    let cpu = run_program(&[li(V0, 1), li(T0, 34), sllv(V0, V0, T0), brk()]);
    assert_eq!(cpu.get_register(V0 as usize).unwrap(), 1 << 2);
}

#[test]
fn slt_is_signed_sltu_is_unsigned() {
    let cpu = run_program(&[
        li(T0, -1),
        li(T1, 1),
        slt(V0, T0, T1),  // -1 < 1 signed -> true
        sltu(V1, T0, T1), // 0xffffffff < 1 unsigned -> false
        brk(),
    ]);
    assert_eq!(cpu.get_register(V0 as usize).unwrap(), 1);
    assert_eq!(cpu.get_register(V1 as usize).unwrap(), 0);
}

#[test]
fn mult_and_mflo_mfhi_round_trip() {
    let cpu = run_program(&[
        li(T0, 1_000),
        li(T1, 1_000),
        mult(T0, T1),
        mflo(V0),
        mfhi(V1),
        brk(),
    ]);
    assert_eq!(cpu.get_register(V0 as usize).unwrap(), 1_000_000);
    assert_eq!(cpu.get_register(V1 as usize).unwrap(), 0);
}

#[test]
fn mthi_mtlo_round_trip() {
    let cpu = run_program(&[li(T0, 7), mthi(T0), li(T1, 9), mtlo(T1), mfhi(V0), mflo(V1), brk()]);
    assert_eq!(cpu.get_register(V0 as usize).unwrap(), 7);
    assert_eq!(cpu.get_register(V1 as usize).unwrap(), 9);
}

#[test]
fn division_by_zero_writes_zero_to_hi_and_lo() {
    let cpu = run_program(&[li(T0, 5), li(T1, 0), div(T0, T1), mfhi(V0), mflo(V1), brk()]);
    assert_eq!(cpu.get_register(V0 as usize).unwrap(), 0);
    assert_eq!(cpu.get_register(V1 as usize).unwrap(), 0);
}

#[test]
fn int_min_div_neg_one_writes_zero_to_hi_and_lo() {
    let cpu = run_program(&[
        lui(T0, 0x8000), // T0 = i32::MIN
        li(T1, -1),
        div(T0, T1),
        mfhi(V0),
        mflo(V1),
        brk(),
    ]);
    assert_eq!(cpu.get_register(V0 as usize).unwrap(), 0);
    assert_eq!(cpu.get_register(V1 as usize).unwrap(), 0);
}

#[test]
fn load_store_sign_and_zero_extension() {
    let cpu = run_program(&[
        lui(T0, 0x8080),
        ori(T0, T0, 0x8080),
        sw(T0, 0, 0),
        lh(1, 0, 0),
        lhu(2, 0, 0),
        lb(3, 0, 0),
        lbu(4, 0, 0),
        brk(),
    ]);
    assert_eq!(cpu.get_register(1).unwrap(), 0xffff_8080);
    assert_eq!(cpu.get_register(2).unwrap(), 0x0000_8080);
    assert_eq!(cpu.get_register(3).unwrap(), 0xffff_ff80);
    assert_eq!(cpu.get_register(4).unwrap(), 0x0000_0080);
}

#[test]
fn lwl_merges_into_upper_half() {
    let cpu = run_program(&[
        lui(1, 0x1122),
        ori(1, 1, 0x3344),
        sw(1, 0, 0),
        li(2, -1),
        lwl(2, 0, 0),
        brk(),
    ]);
    assert_eq!(cpu.get_register(2).unwrap(), 0x1122_ffff);
}

#[test]
fn lwr_merges_into_lower_half() {
    let cpu = run_program(&[
        lui(1, 0x1122),
        ori(1, 1, 0x3344),
        sw(1, 0, 0),
        li(2, -1),
        lwr(2, 1, 0),
        brk(),
    ]);
    assert_eq!(cpu.get_register(2).unwrap(), 0xffff_1122);
}

#[test]
fn swl_writes_upper_half_window() {
    let cpu = run_program(&[
        lui(1, 0x1122),
        ori(1, 1, 0x3344),
        sw(1, 0, 0),
        lui(2, 0xaabb),
        ori(2, 2, 0xccdd),
        swl(2, 0, 0),
        lw(3, 0, 0),
        brk(),
    ]);
    assert_eq!(cpu.get_register(3).unwrap(), 0xaabb_3344);
}

#[test]
fn swr_writes_lower_half_window() {
    let cpu = run_program(&[
        lui(1, 0x1122),
        ori(1, 1, 0x3344),
        sw(1, 0, 0),
        lui(2, 0xaabb),
        ori(2, 2, 0xccdd),
        swr(2, 1, 0),
        lw(3, 0, 0),
        brk(),
    ]);
    assert_eq!(cpu.get_register(3).unwrap(), 0xccdd_3344);
}

#[test]
fn misaligned_word_load_traps_and_is_atomic() {
    let mem = Rc::new(RefCell::new(FlatMemory::new(0x100)));
    {
        let mut m = mem.borrow_mut();
        m.write_word_be(0, li(V0, 1));
        m.write_word_be(4, lw(V1, 1, V0)); // effective addr = 2, not a multiple of 4
    }
    let mut cpu = Cpu::new(mem);
    cpu.step().unwrap();
    let regs_before = *cpu.registers();
    let pc_before = cpu.get_pc();
    let err = cpu.step().unwrap_err();
    assert_eq!(err, Fault::InvalidAlignment);
    assert_eq!(cpu.get_pc(), pc_before);
    assert_eq!(*cpu.registers(), regs_before);
}

#[test]
fn jr_to_misaligned_target_traps_and_is_atomic() {
    let mem = Rc::new(RefCell::new(FlatMemory::new(0x100)));
    {
        let mut m = mem.borrow_mut();
        m.write_word_be(0, li(T0, 1));
        m.write_word_be(4, jr(T0));
    }
    let mut cpu = Cpu::new(mem);
    cpu.step().unwrap();
    let regs_before = *cpu.registers();
    let pc_before = cpu.get_pc();
    let err = cpu.step().unwrap_err();
    assert_eq!(err, Fault::InvalidAlignment);
    assert_eq!(cpu.get_pc(), pc_before);
    assert_eq!(*cpu.registers(), regs_before);
}

#[test]
fn branch_delay_slot_always_executes() {
    // j skips straight to l1, but the addiu in its delay slot still runs first.
    let cpu = run_program(&[
        li(V0, 0),   // 0
        j(3),        // 1: jump to word index 3 (l1)
        addiu(V0, V0, 1), // 2: delay slot, always executes
        brk(),       // 3: l1
    ]);
    assert_eq!(cpu.get_register(V0 as usize).unwrap(), 1);
}

#[test]
fn jal_and_jalr_write_the_link_address() {
    let cpu = run_program(&[
        jal(4),        // 0: call word index 4
        nop(),         // 1: delay slot
        li(A0, 0xdead), // 2: only reached via fall-through after return, not taken here
        brk(),         // 3
        jr(RA),        // 4: callee: return
        nop(),         // 5: delay slot of jr
        // execution resumes at word index 2 after the call returns
    ]);
    // link = address of word index 2 = 8
    assert_eq!(cpu.get_register(RA as usize).unwrap(), 8);
    assert_eq!(cpu.get_register(A0 as usize).unwrap(), 0xdead);
}

#[test]
fn bgezal_always_writes_link_even_when_not_taken() {
    let cpu = run_program(&[
        li(T0, -1),
        bgezal(T0, 1), // not taken (T0 < 0), but $ra is still written
        nop(),
        brk(),
    ]);
    assert_ne!(cpu.get_register(RA as usize).unwrap(), 0);
}

#[test]
fn syscall_traps() {
    let mem = Rc::new(RefCell::new(FlatMemory::new(0x100)));
    mem.borrow_mut().write_word_be(0, syscall());
    let mut cpu = Cpu::new(mem);
    let regs_before = *cpu.registers();
    assert_eq!(cpu.step().unwrap_err(), Fault::SystemCall);
    assert_eq!(cpu.get_pc(), 0);
    assert_eq!(*cpu.registers(), regs_before);
}

#[test]
fn add_overflow_matches_the_literal_encoding() {
    // ADD r3,r1,r2 (0x00221820) with r1=0x7fffffff, r2=1.
    let mem = Rc::new(RefCell::new(FlatMemory::new(0x100)));
    mem.borrow_mut().write_word_be(0, 0x0022_1820);
    let mut cpu = Cpu::new(mem);
    cpu.set_register(1, 0x7fff_ffff).unwrap();
    cpu.set_register(2, 1).unwrap();
    assert_eq!(cpu.step().unwrap_err(), Fault::ArithmeticOverflow);
    assert_eq!(cpu.get_register(3).unwrap(), 0);
    assert_eq!(cpu.get_pc(), 0);
}

#[test]
fn addu_matches_the_literal_encoding() {
    // ADDU r3,r1,r2 (0x00221821) with r1=0x7fffffff, r2=1.
    let mem = Rc::new(RefCell::new(FlatMemory::new(0x100)));
    mem.borrow_mut().write_word_be(0, 0x0022_1821);
    let mut cpu = Cpu::new(mem);
    cpu.set_register(1, 0x7fff_ffff).unwrap();
    cpu.set_register(2, 1).unwrap();
    cpu.step().unwrap();
    assert_eq!(cpu.get_register(3).unwrap(), 0x8000_0000);
    assert_eq!(cpu.get_pc(), 4);
}

#[test]
fn multu_and_mult_differ_on_the_same_negative_looking_bit_pattern() {
    let mem = Rc::new(RefCell::new(FlatMemory::new(0x100)));
    {
        let mut m = mem.borrow_mut();
        m.write_word_be(0, multu(1, 2));
        m.write_word_be(4, mfhi(3));
        m.write_word_be(8, mflo(4));
    }
    let mut cpu = Cpu::new(mem);
    cpu.set_register(1, 0xffff_ffff).unwrap();
    cpu.set_register(2, 1).unwrap();
    for _ in 0..3 {
        cpu.step().unwrap();
    }
    assert_eq!(cpu.get_register(3).unwrap(), 0x0000_0000);
    assert_eq!(cpu.get_register(4).unwrap(), 0xffff_ffff);

    let mem = Rc::new(RefCell::new(FlatMemory::new(0x100)));
    {
        let mut m = mem.borrow_mut();
        m.write_word_be(0, mult(1, 2));
        m.write_word_be(4, mfhi(3));
        m.write_word_be(8, mflo(4));
    }
    let mut cpu = Cpu::new(mem);
    cpu.set_register(1, 0xffff_ffff).unwrap(); // -1 signed
    cpu.set_register(2, 1).unwrap();
    for _ in 0..3 {
        cpu.step().unwrap();
    }
    assert_eq!(cpu.get_register(3).unwrap(), 0xffff_ffff);
    assert_eq!(cpu.get_register(4).unwrap(), 0xffff_ffff);
}

#[test]
fn j_target_is_reached_after_its_delay_slot() {
    let mem = Rc::new(RefCell::new(FlatMemory::new(0x100)));
    {
        let mut m = mem.borrow_mut();
        m.write_word_be(0, 0x0800_0002); // J 0x8
        m.write_word_be(4, addiu(1, 0, 1)); // delay slot: r1 = 1
    }
    let mut cpu = Cpu::new(mem);
    cpu.step().unwrap();
    cpu.step().unwrap();
    assert_eq!(cpu.get_pc(), 8);
    assert_eq!(cpu.get_register(1).unwrap(), 1);
}

#[test]
fn unset_coprocessor_slot_traps() {
    let mem = Rc::new(RefCell::new(FlatMemory::new(0x100)));
    mem.borrow_mut().write_word_be(0, itype(0x10, 0, 0, 0));
    let mut cpu = Cpu::new(mem);
    let regs_before = *cpu.registers();
    let err = cpu.step().unwrap_err();
    assert_eq!(err, Fault::CoprocessorUnusable);
    assert_eq!(*cpu.registers(), regs_before);
}

#[test]
fn installed_cop_hook_runs_and_can_mutate_registers() {
    let mem = Rc::new(RefCell::new(FlatMemory::new(0x100)));
    mem.borrow_mut().write_word_be(0, itype(0x10, 0, 0, 0));
    let mut cpu = Cpu::new(mem);
    let mut coprocessor = Coprocessor::new();
    coprocessor.cop = Some(Box::new(|cpu: &mut crate::Cpu, _word: u32| cpu.set_register(1, 42)));
    cpu.set_coprocessor(0, coprocessor).unwrap();
    cpu.step().unwrap();
    assert_eq!(cpu.get_register(1).unwrap(), 42);
}

#[test]
fn lwc_hook_receives_the_loaded_word() {
    let mem = Rc::new(RefCell::new(FlatMemory::new(0x100)));
    {
        let mut m = mem.borrow_mut();
        m.write_word_be(0, li(1, 21));
        m.write_word_be(4, sw(1, 0, 0));
        m.write_word_be(8, itype(0x30, 0, 5, 0)); // lwc0 $5, 0($0)
    }
    let mut cpu = Cpu::new(mem);
    let mut coprocessor = Coprocessor::new();
    coprocessor.lwc = Some(Box::new(|cpu: &mut crate::Cpu, rt, word| {
        cpu.set_register(rt.index(), word * 2)
    }));
    cpu.set_coprocessor(0, coprocessor).unwrap();
    cpu.step().unwrap(); // li
    cpu.step().unwrap(); // sw
    cpu.step().unwrap(); // lwc0
    assert_eq!(cpu.get_register(5).unwrap(), 42);
}

#[test]
fn swc_hook_supplies_the_stored_word() {
    let mem = Rc::new(RefCell::new(FlatMemory::new(0x100)));
    mem.borrow_mut().write_word_be(0, itype(0x38, 0, 0, 0)); // swc0 $0, 0($0)
    let backing = Rc::clone(&mem);
    let mut cpu = Cpu::new(mem);
    let mut coprocessor = Coprocessor::new();
    coprocessor.swc = Some(Box::new(|_cpu: &mut crate::Cpu, _rt| Ok(0x1234_5678)));
    cpu.set_coprocessor(0, coprocessor).unwrap();
    cpu.step().unwrap();
    let mut word = [0u8; 4];
    backing.borrow_mut().read(0, 4, &mut word).unwrap();
    assert_eq!(word, 0x1234_5678_u32.to_be_bytes());
}

#[test]
fn reset_zeroes_architectural_state_but_keeps_configuration() {
    let mem = Rc::new(RefCell::new(FlatMemory::new(0x100)));
    mem.borrow_mut().write_word_be(0, li(V0, 42));
    let mut cpu = Cpu::new(mem);
    cpu.set_debug_level(3, None);
    cpu.set_exception_handler(0, 0xdead_beef).unwrap();
    cpu.step().unwrap();
    assert_eq!(cpu.get_register(V0 as usize).unwrap(), 42);
    assert_eq!(cpu.get_pc(), 4);

    cpu.reset();

    assert_eq!(cpu.get_register(V0 as usize).unwrap(), 0);
    assert_eq!(cpu.get_pc(), 0);
    assert_eq!(cpu.hi_lo(), (0, 0));
    // Exception-handler table is architectural state: reset zeroes it too.
    assert_eq!(cpu.get_exception_handler(0).unwrap(), 0);
    // debug_level is configuration and survives reset: stepping the same nop-at-0
    // program again should still be free to trace without re-configuring.
    cpu.set_debug_level(0, None);
}

#[test]
fn exception_handler_table_is_stored_but_never_dispatched() {
    let mem = Rc::new(RefCell::new(FlatMemory::new(0x100)));
    // SYSCALL would, on real silicon, vector through the handler table; this core
    // never reads it back out of step() (spec.md §3, §9).
    mem.borrow_mut().write_word_be(0, syscall());
    let mut cpu = Cpu::new(mem);
    cpu.set_exception_handler(7, 0x1000).unwrap();
    assert_eq!(cpu.get_exception_handler(7).unwrap(), 0x1000);
    assert_eq!(cpu.step().unwrap_err(), Fault::SystemCall);
    assert_eq!(cpu.get_pc(), 0);
    assert_eq!(cpu.get_exception_handler(7).unwrap(), 0x1000);
}

#[test]
fn exception_handler_index_out_of_range_is_invalid_argument() {
    let mem = Rc::new(RefCell::new(FlatMemory::new(0x10)));
    let mut cpu = Cpu::new(mem);
    assert_eq!(cpu.set_exception_handler(16, 0).unwrap_err(), Fault::InvalidArgument);
    assert_eq!(cpu.get_exception_handler(16).unwrap_err(), Fault::InvalidArgument);
}

#[test]
fn register_index_out_of_range_is_invalid_argument() {
    let mem = Rc::new(RefCell::new(FlatMemory::new(0x10)));
    let mut cpu = Cpu::new(mem);
    assert_eq!(cpu.get_register(32).unwrap_err(), Fault::InvalidArgument);
    assert_eq!(cpu.set_register(32, 1).unwrap_err(), Fault::InvalidArgument);
}

#[test]
fn coprocessor_slot_out_of_range_is_invalid_argument() {
    let mem = Rc::new(RefCell::new(FlatMemory::new(0x10)));
    let mut cpu = Cpu::new(mem);
    assert_eq!(cpu.set_coprocessor(4, Coprocessor::new()).unwrap_err(), Fault::InvalidArgument);
}

#[test]
fn debug_handler_receives_a_trace_line_at_level_two() {
    let mem = Rc::new(RefCell::new(FlatMemory::new(0x100)));
    mem.borrow_mut().write_word_be(0, nop());
    let mut cpu = Cpu::new(mem);
    let captured: Rc<RefCell<Vec<u8>>> = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&captured);
    cpu.set_debug_handler(Some(Box::new(move |_cpu, bytes| {
        sink.borrow_mut().extend_from_slice(bytes);
    })));
    cpu.set_debug_level(2, None);
    cpu.step().unwrap();
    assert!(!captured.borrow().is_empty());
}
