//! M68K control-flow and system instruction tests

use super::testing::TestCpu;
use super::flags;

#[test]
fn test_bra_byte_displacement() {
    let mut t = TestCpu::new();

    t.set_program(0x400, &[0x6004]); // BRA.B +4
    t.step_instruction();

    assert_eq!(t.cpu.regs.pc, 0x406);
}

#[test]
fn test_bra_word_displacement() {
    let mut t = TestCpu::new();

    t.set_program(0x400, &[0x6000, 0x0100]); // BRA.W +$100
    t.step_instruction();

    assert_eq!(t.cpu.regs.pc, 0x502);
}

#[test]
fn test_bcc_not_taken_byte() {
    let mut t = TestCpu::new();
    t.cpu.regs.set_flag(flags::ZERO, false);

    t.set_program(0x400, &[0x6704]); // BEQ.B +4, Z clear
    t.step_instruction();

    assert_eq!(t.cpu.regs.pc, 0x402);
}

#[test]
fn test_bcc_not_taken_word_skips_extension() {
    let mut t = TestCpu::new();
    t.cpu.regs.set_flag(flags::CARRY, true);

    t.set_program(0x400, &[0x6400, 0x0100]); // BCC.W, C set
    t.step_instruction();

    assert_eq!(t.cpu.regs.pc, 0x404);
}

#[test]
fn test_bcc_taken_backward() {
    let mut t = TestCpu::new();
    t.write_word(0x3F0, 0x4E71);
    t.cpu.regs.set_flag(flags::ZERO, true);

    t.set_program(0x400, &[0x67EE]); // BEQ.B -18
    t.step_instruction();

    assert_eq!(t.cpu.regs.pc, 0x3F0);
}

#[test]
fn test_dbf_loops_until_minus_one() {
    let mut t = TestCpu::new();
    t.cpu.regs.d[0] = 2;

    // DBF D0,-2 branches back onto itself until D0 wraps to -1
    t.set_program(0x400, &[0x51C8, 0xFFFE]);

    t.step_instruction();
    assert_eq!(t.cpu.regs.pc, 0x400);
    assert_eq!(t.cpu.regs.d[0] & 0xFFFF, 1);

    // prime the pipeline again at the same spot and run the final pass
    t.set_program(0x400, &[0x51C8, 0xFFFE]);
    t.cpu.regs.d[0] = 0;
    t.step_instruction();
    assert_eq!(t.cpu.regs.d[0] & 0xFFFF, 0xFFFF);
    assert_eq!(t.cpu.regs.pc, 0x404); // falls through
}

#[test]
fn test_dbcc_condition_true_exits() {
    let mut t = TestCpu::new();
    t.cpu.regs.d[0] = 5;
    t.cpu.regs.set_flag(flags::ZERO, true);

    t.set_program(0x400, &[0x57C8, 0xFFFE]); // DBEQ D0,-2 with Z set
    t.step_instruction();

    assert_eq!(t.cpu.regs.d[0], 5); // counter untouched
    assert_eq!(t.cpu.regs.pc, 0x404);
}

#[test]
fn test_scc_register() {
    let mut t = TestCpu::new();
    t.cpu.regs.d[0] = 0;
    t.cpu.regs.set_flag(flags::ZERO, true);

    t.set_program(0x400, &[0x57C0]); // SEQ D0
    t.step_instruction();
    assert_eq!(t.cpu.regs.d[0] & 0xFF, 0xFF);

    t.set_program(0x404, &[0x56C0]); // SNE D0, Z still set
    t.step_instruction();
    assert_eq!(t.cpu.regs.d[0] & 0xFF, 0x00);
}

#[test]
fn test_jmp_indirect() {
    let mut t = TestCpu::new();
    t.write_word(0x2000, 0x4E71);
    t.cpu.regs.a[0] = 0x2000;

    t.set_program(0x400, &[0x4ED0]); // JMP (A0)
    t.step_instruction();

    assert_eq!(t.cpu.regs.pc, 0x2000);
    assert_eq!(t.cpu.regs.ird, 0x4E71); // pipeline refilled at the target
}

#[test]
fn test_jsr_pushes_return_address() {
    let mut t = TestCpu::new();
    t.write_word(0x2000, 0x4E71);
    t.cpu.regs.a[0] = 0x2000;
    t.cpu.regs.a[7] = 0x8000;

    t.set_program(0x400, &[0x4E90]); // JSR (A0)
    t.step_instruction();

    assert_eq!(t.cpu.regs.pc, 0x2000);
    assert_eq!(t.cpu.regs.a[7], 0x7FFC);
    assert_eq!(t.read_long(0x7FFC), 0x402);
}

#[test]
fn test_jsr_displacement_return_address_skips_extension() {
    let mut t = TestCpu::new();
    t.write_word(0x2010, 0x4E71);
    t.cpu.regs.a[0] = 0x2000;
    t.cpu.regs.a[7] = 0x8000;

    t.set_program(0x400, &[0x4EA8, 0x0010]); // JSR (16,A0)
    t.step_instruction();

    assert_eq!(t.cpu.regs.pc, 0x2010);
    assert_eq!(t.read_long(0x7FFC), 0x404);
}

#[test]
fn test_bsr_and_rts() {
    let mut t = TestCpu::new();
    t.write_word(0x440, 0x4E75); // RTS at the subroutine
    t.cpu.regs.a[7] = 0x8000;

    t.set_program(0x400, &[0x613E]); // BSR.B +62
    t.step_instruction();

    assert_eq!(t.cpu.regs.pc, 0x440);
    assert_eq!(t.read_long(0x7FFC), 0x402);

    // run the RTS the pipeline just fetched
    t.step_instruction();
    assert_eq!(t.cpu.regs.pc, 0x402);
    assert_eq!(t.cpu.regs.a[7], 0x8000);
}

#[test]
fn test_link_and_unlk() {
    let mut t = TestCpu::new();
    t.cpu.regs.a[6] = 0x1111_2222;
    t.cpu.regs.a[7] = 0x8000;

    t.set_program(0x400, &[0x4E56, 0xFFF8]); // LINK A6,#-8
    t.step_instruction();

    assert_eq!(t.read_long(0x7FFC), 0x1111_2222); // old frame pointer saved
    assert_eq!(t.cpu.regs.a[6], 0x7FFC);
    assert_eq!(t.cpu.regs.a[7], 0x7FF4); // frame minus eight

    t.set_program(0x404, &[0x4E5E]); // UNLK A6
    t.step_instruction();

    assert_eq!(t.cpu.regs.a[6], 0x1111_2222);
    assert_eq!(t.cpu.regs.a[7], 0x8000);
}

#[test]
fn test_rte_restores_sr_and_pc() {
    let mut t = TestCpu::new();
    t.cpu.regs.a[7] = 0x7FFA;
    t.write_word(0x7FFA, 0x0004); // SR: user mode, Z set
    t.write_long(0x7FFC, 0x0000_3000); // return PC
    t.write_word(0x3000, 0x4E71);
    t.cpu.regs.inactive_sp = 0x0070_0000; // USP waiting

    t.set_program(0x400, &[0x4E73]); // RTE
    t.step_instruction();

    assert_eq!(t.cpu.regs.pc, 0x3000);
    assert!(!t.cpu.regs.supervisor());
    assert!(t.cpu.regs.flag(flags::ZERO));
    assert_eq!(t.cpu.regs.a[7], 0x0070_0000); // now on the user stack
    assert_eq!(t.cpu.regs.inactive_sp, 0x8000); // SSP parked after the pop
}

#[test]
fn test_rtr_restores_ccr_only() {
    let mut t = TestCpu::new();
    t.cpu.regs.a[7] = 0x7FFA;
    t.write_word(0x7FFA, 0xFF1F); // only the CCR bits land
    t.write_long(0x7FFC, 0x0000_3000);
    t.write_word(0x3000, 0x4E71);

    t.set_program(0x400, &[0x4E77]); // RTR
    t.step_instruction();

    assert_eq!(t.cpu.regs.pc, 0x3000);
    assert!(t.cpu.regs.supervisor()); // system byte untouched
    assert_eq!(t.cpu.regs.sr & 0x1F, 0x1F);
}

#[test]
fn test_tas_register_and_memory() {
    let mut t = TestCpu::new();
    t.cpu.regs.d[0] = 0x00;
    t.set_program(0x400, &[0x4AC0]); // TAS D0
    t.step_instruction();
    assert_eq!(t.cpu.regs.d[0] & 0xFF, 0x80);
    assert!(t.cpu.regs.flag(flags::ZERO));

    let mut t = TestCpu::new();
    t.write_byte(0x2000, 0x40);
    t.cpu.regs.a[0] = 0x2000;
    t.set_program(0x400, &[0x4AD0]); // TAS (A0)
    t.step_instruction();
    assert_eq!(t.read_byte(0x2000), 0xC0);
    assert!(!t.cpu.regs.flag(flags::ZERO));
    assert!(!t.cpu.regs.flag(flags::NEGATIVE));
}

#[test]
fn test_chk_in_bounds_continues() {
    let mut t = TestCpu::new();
    t.cpu.regs.d[0] = 50;
    t.cpu.regs.d[1] = 100;

    t.set_program(0x400, &[0x4181]); // CHK.W D1,D0
    t.step_instruction();

    assert_eq!(t.cpu.regs.pc, 0x402);
}

#[test]
fn test_chk_out_of_bounds_takes_vector_6() {
    let mut t = TestCpu::new();
    t.write_long(6 * 4, 0x0000_3000);
    t.write_word(0x3000, 0x4E71);
    t.cpu.regs.d[0] = 200;
    t.cpu.regs.d[1] = 100;

    t.set_program(0x400, &[0x4181]); // CHK.W D1,D0
    t.step_instruction();

    assert_eq!(t.cpu.regs.pc, 0x3000);
    assert!(!t.cpu.regs.flag(flags::NEGATIVE));
}

#[test]
fn test_trapv_only_on_overflow() {
    let mut t = TestCpu::new();
    t.set_program(0x400, &[0x4E76]); // TRAPV, V clear
    t.step_instruction();
    assert_eq!(t.cpu.regs.pc, 0x402);

    let mut t = TestCpu::new();
    t.write_long(7 * 4, 0x0000_3000);
    t.write_word(0x3000, 0x4E71);
    t.cpu.regs.set_flag(flags::OVERFLOW, true);
    t.set_program(0x400, &[0x4E76]);
    t.step_instruction();
    assert_eq!(t.cpu.regs.pc, 0x3000);
}

#[test]
fn test_stop_parks_until_interrupt() {
    let mut t = TestCpu::new();
    t.write_long((0x18 + 6) * 4, 0x0000_3000); // autovector level 6
    t.write_word(0x3000, 0x4E71);

    t.set_program(0x400, &[0x4E72, 0x2000]); // STOP #$2000
    t.run_cycles(40);
    assert!(t.cpu.iunit.is_stopped());
    assert_eq!(t.cpu.regs.sr, 0x2000);

    // nothing happens while parked
    t.run_cycles(20);
    assert!(t.cpu.iunit.is_stopped());

    // a level-6 interrupt wakes the CPU through its prologue
    t.cpu.bus.set_interrupt_priority(6);
    t.run_cycles(80);
    assert!(!t.cpu.iunit.is_stopped());
    assert!((0x3000..0x3010).contains(&t.cpu.regs.pc));
    assert_eq!(t.cpu.regs.ipm(), 6);
}

#[test]
fn test_nop_advances_pc_only() {
    let mut t = TestCpu::new();
    let sr_before = t.cpu.regs.sr;

    t.set_program(0x400, &[0x4E71]);
    t.step_instruction();

    assert_eq!(t.cpu.regs.pc, 0x402);
    assert_eq!(t.cpu.regs.sr, sr_before);
}
