//! VDP port protocol tests

use super::testing::TestVdp;

#[test]
fn test_register_write_does_not_set_pending() {
    let mut t = TestVdp::new();

    t.control_write(0x8F02); // R15 = auto-increment 2
    assert_eq!(t.vdp.regs.register(15), 0x02);
    assert!(!t.vdp.ports.control_pending());

    t.control_write(0x8144);
    assert_eq!(t.vdp.regs.register(1), 0x44);
}

#[test]
fn test_register_writes_cap_at_r23() {
    let mut t = TestVdp::new();
    // register index 24 is consumed as a register write but lands nowhere
    t.control_write(0x9842);
    assert!(!t.vdp.ports.control_pending());
    for reg in 0..super::registers::REGISTER_COUNT {
        assert_eq!(t.vdp.regs.register(reg), if reg == 15 { 0x02 } else { 0 });
    }
}

#[test]
fn test_two_word_command_latches_cp1_cp2() {
    let mut t = TestVdp::new();

    t.control_write(0x4000); // VRAM write, address low bits
    assert!(t.vdp.ports.control_pending());
    t.control_write(0x0000);
    assert!(!t.vdp.ports.control_pending());

    assert_eq!(t.vdp.regs.control.cp1, 0x4000);
    assert_eq!(t.vdp.regs.control.cp2, 0x0000);
    assert_eq!(t.vdp.regs.control.address(), 0x0000);
    assert_eq!(t.vdp.regs.control.vmem_type(), super::VMemType::Vram);
    assert_eq!(t.vdp.regs.control.control_type(), super::ControlType::Write);
}

#[test]
fn test_control_address_spans_both_words() {
    let mut t = TestVdp::new();

    // scenario: 0x8F02, 0xC000, 0x0000 leaves R15=2 and a CRAM write at 0
    t.control_write(0x8F02);
    t.control_write(0xC000);
    t.control_write(0x0000);

    assert_eq!(t.vdp.regs.register(15), 0x02);
    assert_eq!(t.vdp.regs.control.address(), 0x0000);
    assert_eq!(t.vdp.regs.control.vmem_type(), super::VMemType::Cram);
    assert_eq!(t.vdp.regs.control.control_type(), super::ControlType::Write);
}

#[test]
fn test_status_read_clears_pending() {
    let mut t = TestVdp::new();

    t.control_write(0x4000); // first half latched
    assert!(t.vdp.ports.control_pending());

    let status = t.status_read();
    assert!(!t.vdp.ports.control_pending());
    // power-on status: FIFO empty
    assert_ne!(status & 0x0200, 0);
}

#[test]
fn test_data_write_clears_pending_and_advances_address() {
    let mut t = TestVdp::new();
    t.control_write(0x8F02);

    t.control_write(0x4000);
    t.control_write(0x0000);

    t.data_write(0x1234);
    assert_eq!(t.vdp.regs.control.address(), 0x0002);
    assert!(!t.vdp.ports.control_pending());

    // VRAM stores the low byte at the even address
    assert_eq!(t.vdp.vram[0], 0x34);
    assert_eq!(t.vdp.vram[1], 0x12);
    assert_eq!(t.vdp.vram_read_word(0), 0x1234);
}

#[test]
fn test_data_reads_come_from_the_precache() {
    let mut t = TestVdp::new();
    t.control_write(0x8F02);

    // write two words
    t.control_write(0x4000);
    t.control_write(0x0000);
    t.data_write(0xAAAA);
    t.data_write(0xBBBB);

    // VRAM read from address 0
    t.control_write(0x0000);
    t.control_write(0x0000);

    assert_eq!(t.data_read(), 0xAAAA);
    assert_eq!(t.data_read(), 0xBBBB);
    assert_eq!(t.vdp.regs.control.address(), 0x0004);
}

#[test]
fn test_cram_write_and_read() {
    let mut t = TestVdp::new();
    t.control_write(0x8F02);

    t.control_write(0xC004); // CRAM write at 4 (color slot 2)
    t.control_write(0x0000);
    t.data_write(0x0E00);

    assert_eq!(t.vdp.cram[2], 0x0E00);

    // CRAM read: CD = 1000
    t.control_write(0x0004);
    t.control_write(0x0020);
    assert_eq!(t.data_read(), 0x0E00);
}

#[test]
fn test_vsram_write() {
    let mut t = TestVdp::new();
    t.control_write(0x8F02);

    t.control_write(0x4002); // VSRAM write at 2
    t.control_write(0x0010);
    t.data_write(0x0123);

    assert_eq!(t.vdp.vsram[1], 0x0123);
}

#[test]
fn test_hv_counter_port() {
    let mut t = TestVdp::new();
    t.run(32);

    use crate::memory::Addressable;
    t.vdp.init_read_word(0x8);
    let word = t.vdp.latched_word();
    assert_eq!(word & 0xFF, t.vdp.regs.h_counter as u16);
    assert_eq!(word >> 8, t.vdp.regs.v_counter as u16);
}

#[test]
fn test_byte_write_duplicates_on_both_halves() {
    let mut t = TestVdp::new();

    use crate::memory::Addressable;
    t.vdp.init_write_byte(0x4, 0x8F);
    t.run(2);
    t.vdp.init_write_byte(0x5, 0x02);
    t.run(2);

    // 0x8F8F then 0x0202: the first is a register write to R15
    assert_eq!(t.vdp.regs.register(15), 0x8F);
}

#[test]
fn test_fifo_backpressure() {
    let mut t = TestVdp::new();
    t.control_write(0x8F02);
    t.control_write(0x4000);
    t.control_write(0x0000);

    // saturate the queue without draining
    for i in 0..4 {
        t.vdp.ports.init_write_data(i);
        t.vdp.ports.cycle(&mut t.vdp.regs);
        assert!(t.vdp.ports.is_idle());
    }
    assert!(t.vdp.regs.fifo.is_full());

    // the fifth write parks until the VDP drains an entry
    t.vdp.ports.init_write_data(4);
    t.vdp.ports.cycle(&mut t.vdp.regs);
    assert!(!t.vdp.ports.is_idle());

    t.run(2);
    assert!(t.vdp.ports.is_idle());
}
