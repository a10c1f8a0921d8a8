//! H/V counter and interrupt unit tests

use super::testing::TestVdp;
use super::TimingMode;

/// Collect the H-counter value sequence over one full line.
fn h_sequence(t: &mut TestVdp) -> Vec<u8> {
    let mut seq = Vec::new();
    let start = t.vdp.hv.h.raw();
    loop {
        t.cycle();
        seq.push(t.vdp.hv.h.value());
        if t.vdp.hv.h.raw() == start {
            return seq;
        }
    }
}

#[test]
fn test_h32_skip_pair() {
    let mut t = TestVdp::new();
    let seq = h_sequence(&mut t);

    // one line is 171 counter ticks in H32: 0x00-0x93 then 0xE9-0xFF
    assert_eq!(seq.len(), 171);

    // the value runs 0x93 then jumps to 0xE9
    let jump = seq.windows(2).find(|w| w[0] == 0x93).unwrap();
    assert_eq!(jump[1], 0xE9);
    // and wraps back to zero at the end
    assert_eq!(*seq.last().unwrap(), 0x00);
}

#[test]
fn test_h40_skip_pair() {
    let mut t = TestVdp::new();
    t.control_write(0x8C81); // H40

    let seq = h_sequence(&mut t);
    // 0x00-0xB6 then 0xE4-0xFF
    assert_eq!(seq.len(), 211);

    let jump = seq.windows(2).find(|w| w[0] == 0xB6).unwrap();
    assert_eq!(jump[1], 0xE4);
}

#[test]
fn test_ntsc_v28_vcounter_skip() {
    let mut t = TestVdp::new();

    // run two full frames and collect the V transition pairs
    let mut seen_jump = false;
    let mut lines = 0;
    let mut prev = t.vdp.hv.v.value();
    while lines < 2 * 262 {
        t.cycle();
        let v = t.vdp.hv.v.value();
        if v != prev {
            lines += 1;
            if prev == 0xEA {
                assert_eq!(v, 0xE5);
                seen_jump = true;
            }
            prev = v;
        }
    }
    assert!(seen_jump, "v counter never took the 0xEA -> 0xE5 jump");
}

#[test]
fn test_vblank_flag_toggles_at_documented_lines() {
    let mut t = TestVdp::new();

    // run until the vblank flag rises; the raw line must be 0xE0
    let mut cycles = 0;
    while !t.vdp.regs.status.vblank {
        t.cycle();
        cycles += 1;
        assert!(cycles < 200_000);
    }
    assert_eq!(t.vdp.hv.v.raw(), 0xE0);

    // and it clears again before the next frame's active display
    while t.vdp.regs.status.vblank {
        t.cycle();
        cycles += 1;
        assert!(cycles < 400_000);
    }
    assert_eq!(t.vdp.hv.v.raw(), 0x105);
}

#[test]
fn test_hblank_flag_toggles_in_h32() {
    let mut t = TestVdp::new();

    let mut cycles = 0;
    while !t.vdp.regs.status.hblank {
        t.cycle();
        cycles += 1;
        assert!(cycles < 1000);
    }
    assert_eq!(t.vdp.hv.h.raw(), 0x93);

    while t.vdp.regs.status.hblank {
        t.cycle();
        cycles += 1;
        assert!(cycles < 1000);
    }
    assert_eq!(t.vdp.hv.h.raw(), 0x05);
}

#[test]
fn test_vint_pends_at_line_start() {
    let mut t = TestVdp::new();
    t.control_write(0x8120); // R1: VINT enable

    let mut cycles = 0;
    while !t.vdp.irq.borrow().vint_pending {
        t.cycle();
        cycles += 1;
        assert!(cycles < 200_000);
    }

    assert_eq!(t.vdp.regs.v_counter, 0xE0);
    assert_eq!(t.vdp.regs.h_counter, 0x02);
    assert!(t.vdp.regs.status.vint_pending);
    assert_eq!(t.vdp.ipl(), 6);
}

#[test]
fn test_vint_masked_without_ie0() {
    let mut t = TestVdp::new();

    let mut cycles = 0;
    while !t.vdp.irq.borrow().vint_pending {
        t.cycle();
        cycles += 1;
        assert!(cycles < 200_000);
    }

    // pending but not asserted on the IPL lines
    assert_eq!(t.vdp.ipl(), 0);
}

#[test]
fn test_hint_counts_lines() {
    let mut t = TestVdp::new();
    t.control_write(0x8A04); // R10: every 5th line (counter 4)
    t.control_write(0x8010); // R0: HINT enable

    let mut cycles = 0;
    while !t.vdp.irq.borrow().hint_pending {
        t.cycle();
        cycles += 1;
        assert!(cycles < 400_000, "hint never fired");
    }

    assert_eq!(t.vdp.ipl(), 4);
}

#[test]
fn test_interrupt_ack_clears_pending() {
    use crate::cpu::bus_manager::InterruptingDevice;

    let mut t = TestVdp::new();
    t.control_write(0x8120);

    let mut cycles = 0;
    while t.vdp.ipl() != 6 {
        t.cycle();
        cycles += 1;
        assert!(cycles < 200_000);
    }

    t.vdp.irq.borrow_mut().init_interrupt_ack(6);
    assert!(!t.vdp.irq.borrow().vint_pending);
    t.cycle();
    assert_eq!(t.vdp.ipl(), 0);
}

#[test]
fn test_pal_mode_sets_status_bit() {
    let mut t = TestVdp::with_mode(TimingMode::Pal);
    assert_ne!(t.status_read() & 0x0001, 0);

    let mut t = TestVdp::new();
    assert_eq!(t.status_read() & 0x0001, 0);
}
