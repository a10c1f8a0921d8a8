//! Exception prologue and interrupt tests

use super::exceptions::ExceptionKind;
use super::testing::TestCpu;
use super::flags;

#[test]
fn test_reset_prologue_loads_ssp_and_pc() {
    let mut t = TestCpu::new_with_reset();
    t.write_long(0x0, 0x00FF_FFF6); // initial SSP
    t.write_long(0x4, 0x0000_0200); // reset PC
    t.write_word(0x200, 0x4E71);
    t.write_word(0x202, 0x4E71);

    let cycles = t.run_until_idle();

    assert_eq!(t.cpu.regs.a[7], 0x00FF_FFF6);
    assert_eq!(t.cpu.regs.pc, 0x0000_0200);
    assert!(t.cpu.regs.supervisor());
    assert_eq!(t.cpu.regs.ipm(), 7);
    assert_eq!(t.cpu.regs.ird, 0x4E71); // pipeline primed at the entry point
    assert!((40..=48).contains(&cycles), "reset took {} cycles", cycles);
}

#[test]
fn test_odd_word_read_pushes_fault_frame() {
    let mut t = TestCpu::new();
    t.write_long(3 * 4, 0x0000_3000); // address error vector
    t.write_word(0x3000, 0x4E71);
    t.cpu.regs.a[7] = 0x8000;

    // MOVE.W ($100001).L,D0 - word access to an odd address
    t.set_program(0x400, &[0x3039, 0x0010, 0x0001]);
    t.step_instruction();

    assert_eq!(t.cpu.regs.pc, 0x3000);

    // seven-word frame: info, addr high, addr low, IRD, SR, PC high, PC low
    assert_eq!(t.cpu.regs.a[7], 0x8000 - 14);
    let sp = t.cpu.regs.a[7];
    let info = t.read_word(sp);
    let fault_addr = t.read_long(sp + 2);
    let ird = t.read_word(sp + 6);
    let pushed_sr = t.read_word(sp + 8);
    let pushed_pc = t.read_long(sp + 10);

    assert_eq!(fault_addr, 0x0010_0001);
    assert_eq!(ird, 0x3039);
    assert_eq!(info & (1 << 4), 1 << 4); // read cycle
    assert_eq!(info & 0b111, 0b101); // supervisor data
    assert_eq!(pushed_sr & flags::SUPERVISOR, flags::SUPERVISOR);
    // the PC snapshot points back into the faulting instruction
    assert!((0x400..=0x406).contains(&pushed_pc));
}

#[test]
fn test_double_fault_halts() {
    let mut t = TestCpu::new();
    // the address-error vector itself points at an odd address, so the
    // prologue's stack writes land on an odd stack pointer
    t.write_long(3 * 4, 0x0000_3000);
    t.write_word(0x3000, 0x4E71);
    t.cpu.regs.a[7] = 0x8001; // odd supervisor stack

    t.set_program(0x400, &[0x3039, 0x0010, 0x0001]);

    let mut cycles = 0;
    while !t.cpu.is_halted() {
        t.cpu.cycle();
        cycles += 1;
        assert!(cycles < 1000, "double fault never halted the cpu");
    }
    assert!(t.cpu.is_halted());

    // a halted CPU makes no further progress
    let pc = t.cpu.regs.pc;
    t.run_cycles(20);
    assert_eq!(t.cpu.regs.pc, pc);
}

#[test]
fn test_trap_takes_its_vector() {
    let mut t = TestCpu::new();
    t.write_long((32 + 5) * 4, 0x0000_3000);
    t.write_word(0x3000, 0x4E71);
    t.cpu.regs.a[7] = 0x8000;

    t.set_program(0x400, &[0x4E45]); // TRAP #5
    t.step_instruction();

    assert_eq!(t.cpu.regs.pc, 0x3000);
    assert_eq!(t.cpu.regs.a[7], 0x8000 - 6);
    // return address points past the TRAP instruction
    assert_eq!(t.read_long(t.cpu.regs.a[7] + 2), 0x402);
}

#[test]
fn test_illegal_instruction_vector_4() {
    let mut t = TestCpu::new();
    t.write_long(4 * 4, 0x0000_3000);
    t.write_word(0x3000, 0x4E71);

    t.set_program(0x400, &[0x4AFC]); // ILLEGAL
    t.step_instruction();

    assert_eq!(t.cpu.regs.pc, 0x3000);
}

#[test]
fn test_line_a_and_line_f_vectors() {
    let mut t = TestCpu::new();
    t.write_long(10 * 4, 0x0000_3000);
    t.write_word(0x3000, 0x4E71);
    t.set_program(0x400, &[0xA123]);
    t.step_instruction();
    assert_eq!(t.cpu.regs.pc, 0x3000);

    let mut t = TestCpu::new();
    t.write_long(11 * 4, 0x0000_4000);
    t.write_word(0x4000, 0x4E71);
    t.set_program(0x400, &[0xF123]);
    t.step_instruction();
    assert_eq!(t.cpu.regs.pc, 0x4000);
}

#[test]
fn test_privilege_violation_in_user_mode() {
    let mut t = TestCpu::new();
    t.write_long(8 * 4, 0x0000_3000);
    t.write_word(0x3000, 0x4E71);
    t.cpu.regs.set_sr(0); // drop to user mode
    t.cpu.regs.inactive_sp = 0x8000; // SSP while in user mode

    t.set_program(0x400, &[0x46C0]); // MOVE D0,SR
    t.step_instruction();

    assert_eq!(t.cpu.regs.pc, 0x3000);
    assert!(t.cpu.regs.supervisor());
    // the frame went onto the supervisor stack
    assert_eq!(t.cpu.regs.a[7], 0x8000 - 6);
}

#[test]
fn test_interrupt_autovector_and_mask() {
    let mut t = TestCpu::new();
    t.write_long((0x18 + 4) * 4, 0x0000_3000); // level-4 autovector
    t.write_word(0x3000, 0x4E71);
    t.cpu.regs.set_ipm(0);
    t.cpu.regs.a[7] = 0x8000;

    t.set_program(0x400, &[0x4E71]);
    t.cpu.bus.set_interrupt_priority(4);

    let mut cycles = 0;
    while t.cpu.regs.pc < 0x3000 {
        t.cpu.cycle();
        cycles += 1;
        assert!(cycles < 500, "interrupt never taken");
    }

    assert_eq!(t.cpu.regs.ipm(), 4);
    assert!(t.cpu.regs.supervisor());
    assert_eq!(t.int_device.borrow().last_acked, Some(4));
    // SR and return PC stacked
    assert_eq!(t.cpu.regs.a[7], 0x8000 - 6);
}

#[test]
fn test_masked_interrupt_stays_pending() {
    let mut t = TestCpu::new();
    t.cpu.regs.set_ipm(7);

    t.set_program(0x400, &[0x4E71]);
    t.cpu.bus.set_interrupt_priority(3);
    t.run_cycles(30);

    assert!(!t.cpu.exman.is_raised(ExceptionKind::Interrupt));
    assert!(t.cpu.regs.pc < 0x500); // still running straight-line code
}

#[test]
fn test_level_seven_breaks_through_the_mask() {
    let mut t = TestCpu::new();
    t.write_long((0x18 + 7) * 4, 0x0000_3000);
    t.write_word(0x3000, 0x4E71);
    t.cpu.regs.set_ipm(7);
    t.cpu.regs.a[7] = 0x8000;

    t.set_program(0x400, &[0x4E71]);
    t.cpu.bus.set_interrupt_priority(7);

    let mut cycles = 0;
    while t.cpu.regs.pc < 0x3000 {
        t.cpu.cycle();
        cycles += 1;
        assert!(cycles < 500, "nmi never taken");
    }
    assert_eq!(t.int_device.borrow().last_acked, Some(7));
}

#[test]
fn test_trace_fires_after_one_instruction() {
    let mut t = TestCpu::new();
    t.write_long(9 * 4, 0x0000_3000);
    t.write_word(0x3000, 0x4E71);
    t.cpu.regs.set_sr(t.cpu.regs.sr | flags::TRACE);
    t.cpu.regs.a[7] = 0x8000;

    t.set_program(0x400, &[0x4E71]); // a single traced NOP
    t.step_instruction();

    assert_eq!(t.cpu.regs.pc, 0x3000);
    // trace cleared inside the handler, original SR on the stack
    assert!(!t.cpu.regs.flag(flags::TRACE));
    let pushed_sr = t.read_word(t.cpu.regs.a[7]);
    assert_eq!(pushed_sr & flags::TRACE, flags::TRACE);
}
