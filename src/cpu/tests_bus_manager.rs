//! Bus manager microcycle tests
//!
//! These drive the bus manager directly, without the execution pipeline,
//! mirroring how a bus master sees it.

use super::bus::BusLine;
use super::bus_manager::AddrSpace;
use super::exceptions::ExceptionKind;
use super::testing::TestCpu;

fn busm_cycle(t: &mut TestCpu) {
    t.cpu
        .busm
        .cycle(&mut t.cpu.bus, &mut t.cpu.regs, &mut t.cpu.exman);
}

fn run_until_idle(t: &mut TestCpu) -> u32 {
    let mut cycles = 0;
    loop {
        busm_cycle(t);
        cycles += 1;
        if t.cpu.busm.is_idle() {
            return cycles;
        }
        assert!(cycles < 50, "bus cycle never completed");
    }
}

#[test]
fn test_word_read_round_trip() {
    let mut t = TestCpu::new();
    t.write_word(0x1000, 0xBEEF);

    t.cpu.busm.init_read_word(0x1000, AddrSpace::Data);
    let cycles = run_until_idle(&mut t);

    assert_eq!(cycles, 4);
    assert_eq!(t.cpu.busm.latched_word(), 0xBEEF);
}

#[test]
fn test_byte_read_selects_strobe_by_parity() {
    let mut t = TestCpu::new();
    t.write_word(0x1000, 0xABCD);

    // even address drives UDS and returns the high byte
    t.cpu.busm.init_read_byte(0x1000, AddrSpace::Data);
    busm_cycle(&mut t); // READ0
    busm_cycle(&mut t); // READ1 asserts the strobes
    assert!(t.cpu.bus.is_set(BusLine::Uds));
    assert!(!t.cpu.bus.is_set(BusLine::Lds));
    run_until_idle(&mut t);
    assert_eq!(t.cpu.busm.latched_byte(), 0xAB);

    // odd address drives LDS and returns the low byte
    t.cpu.busm.init_read_byte(0x1001, AddrSpace::Data);
    busm_cycle(&mut t);
    busm_cycle(&mut t);
    assert!(t.cpu.bus.is_set(BusLine::Lds));
    assert!(!t.cpu.bus.is_set(BusLine::Uds));
    run_until_idle(&mut t);
    assert_eq!(t.cpu.busm.latched_byte(), 0xCD);
}

#[test]
fn test_write_cycle_stores_data() {
    let mut t = TestCpu::new();

    t.cpu.busm.init_write_word(0x2000, 0x1234);
    assert_eq!(run_until_idle(&mut t), 4);
    assert_eq!(t.read_word(0x2000), 0x1234);

    t.cpu.busm.init_write_byte(0x2003, 0x56);
    run_until_idle(&mut t);
    assert_eq!(t.read_byte(0x2003), 0x56);
    // RW returns high after a write cycle
    assert!(t.cpu.bus.is_set(BusLine::Rw));
}

#[test]
fn test_byte_write_leaves_neighbour_alone() {
    let mut t = TestCpu::new();
    t.write_word(0x2000, 0xAABB);

    t.cpu.busm.init_write_byte(0x2000, 0x11);
    run_until_idle(&mut t);
    assert_eq!(t.read_word(0x2000), 0x11BB);

    t.cpu.busm.init_write_byte(0x2001, 0x22);
    run_until_idle(&mut t);
    assert_eq!(t.read_word(0x2000), 0x1122);
}

#[test]
fn test_odd_word_access_raises_address_error() {
    let mut t = TestCpu::new();
    t.write_word(0x1000, 0x7777);
    t.cpu.regs.pc = 0x400;

    t.cpu.busm.init_read_word(0x1001, AddrSpace::Program);
    busm_cycle(&mut t); // READ0 checks and faults

    assert!(t.cpu.busm.is_idle());
    assert!(t.cpu.busm.operation_aborted());
    assert!(t.cpu.exman.is_raised(ExceptionKind::AddressError));

    let fault = t.cpu.exman.accept_address_error();
    assert_eq!(fault.address, 0x1001);
    assert!(fault.read);
    assert!(fault.in_program);
    assert_eq!(fault.func_codes & 0b010, 0b010); // program space
    assert_eq!(fault.func_codes & 0b100, 0b100); // supervisor

    // the target memory was never touched
    assert_eq!(t.read_word(0x1000), 0x7777);
}

#[test]
fn test_odd_write_faults_before_store() {
    let mut t = TestCpu::new();
    t.write_word(0x1000, 0x7777);

    t.cpu.busm.init_write_word(0x1001, 0x1234);
    busm_cycle(&mut t);

    assert!(t.cpu.exman.is_raised(ExceptionKind::AddressError));
    let fault = t.cpu.exman.accept_address_error();
    assert!(!fault.read);
    assert_eq!(t.read_word(0x1000), 0x7777);
}

#[test]
fn test_rmw_cycle_runs_tas() {
    let mut t = TestCpu::new();
    t.write_byte(0x3000, 0x00);

    t.cpu
        .busm
        .init_read_modify_write(0x3000, super::bus_manager::RmwModify::Tas);

    // AS stays asserted across the read-modify-write chain
    for _ in 0..6 {
        busm_cycle(&mut t);
    }
    assert!(t.cpu.bus.is_set(BusLine::As));
    assert!(!t.cpu.busm.is_idle());

    run_until_idle(&mut t);
    assert_eq!(t.read_byte(0x3000), 0x80);
    assert!(t.cpu.regs.flag(super::flags::ZERO));
}

#[test]
fn test_bus_grant_handshake() {
    let mut t = TestCpu::new();

    {
        let mut access = t.cpu.bus_access();
        access.request_bus();
        assert!(!access.bus_granted());
    }

    // granted on the next idle transition
    busm_cycle(&mut t);
    assert!(t.cpu.bus.is_set(BusLine::Bg));

    // the new master reads a word through the manager
    t.write_word(0x3000, 0x9876);
    t.cpu.bus_access().init_read_word(0x3000);
    run_until_idle(&mut t);
    assert_eq!(t.cpu.busm.latched_word(), 0x9876);

    t.cpu.bus_access().release_bus();
    busm_cycle(&mut t);
    assert!(!t.cpu.bus.is_set(BusLine::Bg));
}

#[test]
fn test_grant_waits_for_current_cycle() {
    let mut t = TestCpu::new();
    t.write_word(0x1000, 0x0001);

    t.cpu.busm.init_read_word(0x1000, AddrSpace::Data);
    busm_cycle(&mut t);
    t.cpu.bus.set(BusLine::Br);
    busm_cycle(&mut t);
    assert!(!t.cpu.bus.is_set(BusLine::Bg));

    // grant arrives only once the cycle finishes
    run_until_idle(&mut t);
    assert!(t.cpu.bus.is_set(BusLine::Bg));
}

#[test]
#[should_panic]
fn test_init_while_busy_panics() {
    let mut t = TestCpu::new();
    t.cpu.busm.init_read_word(0x1000, AddrSpace::Data);
    t.cpu.busm.init_read_word(0x2000, AddrSpace::Data);
}

#[test]
#[should_panic]
fn test_latched_word_after_byte_read_panics() {
    let mut t = TestCpu::new();
    t.cpu.busm.init_read_byte(0x1000, AddrSpace::Data);
    run_until_idle(&mut t);
    let _ = t.cpu.busm.latched_word();
}

#[test]
fn test_interrupt_ack_autovectors() {
    let mut t = TestCpu::new();

    t.cpu.busm.init_interrupt_ack(6);
    run_until_idle(&mut t);

    assert_eq!(t.cpu.busm.vector_number(), 0x18 + 6);
    assert_eq!(t.int_device.borrow().last_acked, Some(6));
    assert!(!t.cpu.bus.is_set(BusLine::Vpa)); // cleared with the rest
}
