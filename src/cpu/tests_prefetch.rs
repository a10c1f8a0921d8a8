//! Prefetch queue and bus scheduler pipeline tests
//!
//! Driven through the scheduler/bus-manager/queue sub-cycle loop, without
//! the instruction unit.

use super::scheduler::ReadTarget;
use super::testing::TestCpu;
use super::Size;

fn pipeline_cycle(t: &mut TestCpu) {
    t.cpu.scheduler.cycle(
        &mut t.cpu.regs,
        &mut t.cpu.bus,
        &mut t.cpu.busm,
        &mut t.cpu.pq,
        &mut t.cpu.exec,
    );
    t.cpu
        .busm
        .cycle(&mut t.cpu.bus, &mut t.cpu.regs, &mut t.cpu.exman);
    t.cpu.pq.cycle(&t.cpu.busm, &mut t.cpu.regs);
}

fn run_until_drained(t: &mut TestCpu) -> u32 {
    let mut cycles = 0;
    while !t.cpu.scheduler.is_idle() || !t.cpu.pq.is_idle() || !t.cpu.busm.is_idle() {
        pipeline_cycle(t);
        cycles += 1;
        assert!(cycles < 100, "pipeline never drained");
    }
    cycles
}

#[test]
fn test_fetch_ird_loads_word_at_pc() {
    let mut t = TestCpu::new();
    t.write_word(0x100, 0x1234);
    t.write_word(0x102, 0x5678);
    t.cpu.regs.pc = 0x100;
    t.cpu.regs.ird = 0;
    t.cpu.regs.ir = 0;
    t.cpu.regs.irc = 0x5678;

    t.cpu.scheduler.prefetch_ird();
    run_until_drained(&mut t);

    assert_eq!(t.cpu.regs.ird, 0x1234);
    assert_eq!(t.cpu.regs.ir, 0x1234);
    assert_eq!(t.cpu.regs.irc, 0x5678);
    assert_eq!(t.cpu.regs.pc, 0x100); // the queue never moves PC itself
}

#[test]
fn test_fetch_irc_loads_lookahead_word() {
    let mut t = TestCpu::new();
    t.write_word(0x100, 0x1111);
    t.write_word(0x102, 0x2222);
    t.cpu.regs.pc = 0x100;
    t.cpu.regs.ird = 0x1111;
    t.cpu.regs.ir = 0x1111;
    t.cpu.regs.irc = 0;

    t.cpu.scheduler.prefetch_irc();
    run_until_drained(&mut t);

    assert_eq!(t.cpu.regs.irc, 0x2222);
    assert_eq!(t.cpu.regs.ird, 0x1111);
    assert_eq!(t.cpu.regs.pc, 0x100);
}

#[test]
fn test_fetch_one_advances_the_pipeline() {
    let mut t = TestCpu::new();
    t.write_word(0x100, 0xAAAA);
    t.write_word(0x102, 0xBBBB);
    t.cpu.regs.pc = 0x100;
    t.cpu.regs.ird = 0x0024;
    t.cpu.regs.ir = 0x0024;
    t.cpu.regs.irc = 0x0088; // stale lookahead, becomes the new IRD

    t.cpu.scheduler.prefetch_one();
    run_until_drained(&mut t);

    assert_eq!(t.cpu.regs.ird, 0x0088);
    assert_eq!(t.cpu.regs.ir, 0x0088);
    assert_eq!(t.cpu.regs.irc, 0xBBBB); // word at PC + 2
}

#[test]
fn test_fetch_completes_in_four_bus_cycles() {
    let mut t = TestCpu::new();
    t.write_word(0x200, 0xCAFE);
    t.cpu.regs.pc = 0x200;

    t.cpu.scheduler.prefetch_ird();
    let mut cycles = 0;
    while !t.cpu.pq.is_idle() || t.cpu.regs.ird != 0xCAFE {
        pipeline_cycle(&mut t);
        cycles += 1;
        assert!(cycles < 20);
    }
    assert_eq!(cycles, 4);
}

#[test]
fn test_prefetch_two_refills_both_slots() {
    let mut t = TestCpu::new();
    t.write_word(0x300, 0x4E71);
    t.write_word(0x302, 0x5279);
    t.cpu.regs.pc = 0x300;
    t.cpu.regs.ird = 0xFFFF;
    t.cpu.regs.irc = 0xFFFF;

    t.cpu.scheduler.prefetch_two();
    run_until_drained(&mut t);

    assert_eq!(t.cpu.regs.ird, 0x4E71);
    assert_eq!(t.cpu.regs.irc, 0x5279);
}

#[test]
#[should_panic]
fn test_overlapping_fetch_panics() {
    let mut t = TestCpu::new();
    t.cpu.regs.pc = 0x100;
    t.cpu.pq.init_fetch_one(&mut t.cpu.busm, &t.cpu.regs);
    // the second init fires the modeling-error assert
    t.cpu.pq.init_fetch_irc(&mut t.cpu.busm, &t.cpu.regs);
}

#[test]
fn test_read_imm_advances_pc_once() {
    let mut t = TestCpu::new();
    t.write_word(0x102, 0x00AB); // the immediate sitting in IRC
    t.write_word(0x104, 0x00CD);
    t.cpu.regs.pc = 0x102;
    t.cpu.regs.irc = 0x00AB;

    t.cpu.scheduler.read_imm(Size::Word, ReadTarget::Imm);
    run_until_drained(&mut t);

    assert_eq!(t.cpu.exec.imm, 0x00AB);
    assert_eq!(t.cpu.regs.pc, 0x104);
    assert_eq!(t.cpu.regs.irc, 0x00CD); // refilled from the new position
}

#[test]
fn test_long_read_imm_consumes_two_words() {
    let mut t = TestCpu::new();
    t.write_word(0x102, 0xDEAD);
    t.write_word(0x104, 0xBEEF);
    t.write_word(0x106, 0x4E71);
    t.cpu.regs.pc = 0x102;
    t.cpu.regs.irc = 0xDEAD;

    t.cpu.scheduler.read_imm(Size::Long, ReadTarget::Imm);
    run_until_drained(&mut t);

    assert_eq!(t.cpu.exec.imm, 0xDEAD_BEEF);
    assert_eq!(t.cpu.regs.pc, 0x106);
    assert_eq!(t.cpu.regs.irc, 0x4E71);
}

#[test]
fn test_scheduler_long_read_splits_into_words() {
    let mut t = TestCpu::new();
    t.write_word(0x1000, 0x0123);
    t.write_word(0x1002, 0x4567);

    t.cpu.scheduler.read(0x1000, Size::Long, ReadTarget::Data);
    run_until_drained(&mut t);

    assert_eq!(t.cpu.exec.data, 0x0123_4567);
}

#[test]
fn test_scheduler_wait_delays_following_op() {
    let mut plain = TestCpu::new();
    plain.write_word(0x1000, 0x00AA);
    plain.cpu.scheduler.read(0x1000, Size::Word, ReadTarget::Data);
    let baseline = run_until_drained(&mut plain);

    let mut waited = TestCpu::new();
    waited.write_word(0x1000, 0x00AA);
    waited.cpu.scheduler.wait(6);
    waited.cpu.scheduler.read(0x1000, Size::Word, ReadTarget::Data);
    let delayed = run_until_drained(&mut waited);

    assert_eq!(delayed - baseline, 6);
    assert_eq!(waited.cpu.exec.data, 0x00AA);
}

#[test]
fn test_scheduler_reset_drops_everything() {
    let mut t = TestCpu::new();
    t.write_word(0x1000, 0x5555);

    t.cpu.scheduler.read(0x1000, Size::Word, ReadTarget::Data);
    t.cpu.scheduler.wait(10);
    pipeline_cycle(&mut t);

    t.cpu.scheduler.reset();
    assert!(t.cpu.scheduler.is_idle());
    // the data buffer never received the dropped read
    assert_eq!(t.cpu.exec.data, 0);
}
