//! M68K exception unit
//!
//! Each cycle, if idle, the unit picks the highest-priority raised exception
//! (group 0, then group 2, then group 1 - in practice the second group wins
//! over the first), accepts its bundle from the manager and schedules the
//! prologue on the bus scheduler. A group-0 exception raised while another
//! group-0 exception is being processed halts the CPU.

use super::bus::{BusLine, CpuBus};
use super::decoder::{self, InstType};
use super::exceptions::{
    ExceptionGroup, ExceptionKind, ExceptionManager, FaultInfo, GROUP_0, GROUP_1, GROUP_2,
};
use super::registers::{flags, RegisterFile, Size};
use super::scheduler::{BusScheduler, CallOp, Order, ReadTarget};

use log::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ExState {
    Idle,
    WaitingScheduler,
}

pub struct ExceptionUnit {
    state: ExState,
    current: Option<ExceptionKind>,
    fault: Option<FaultInfo>,
    trap_vector: u8,
    /// Set on a catastrophic double fault; the CPU stays down.
    halted: bool,
}

impl ExceptionUnit {
    pub fn new() -> Self {
        Self {
            state: ExState::Idle,
            current: None,
            fault: None,
            trap_vector: 0,
            halted: false,
        }
    }

    pub fn reset(&mut self) {
        self.state = ExState::Idle;
        self.current = None;
        self.fault = None;
    }

    pub fn is_halted(&self) -> bool {
        self.halted
    }

    pub fn is_idle(&self, exman: &ExceptionManager, instruction_unit_idle: bool) -> bool {
        if self.state != ExState::Idle {
            return false;
        }
        if !exman.is_raised_any() {
            return true;
        }
        !(exman.is_raised_group(ExceptionGroup::Group0)
            || (instruction_unit_idle
                && (exman.is_raised_group(ExceptionGroup::Group1)
                    || exman.is_raised_group(ExceptionGroup::Group2))))
    }

    /// The caller aborts the execution pipeline before this runs whenever a
    /// group-0 exception is pending; the prologue is scheduled onto a clean
    /// scheduler.
    pub fn cycle(
        &mut self,
        regs: &mut RegisterFile,
        bus: &mut CpuBus,
        scheduler: &mut BusScheduler,
        exman: &mut ExceptionManager,
        instruction_unit_idle: bool,
    ) {
        if self.state == ExState::Idle && self.should_process(exman, instruction_unit_idle) {
            self.process_exception(regs, bus, scheduler, exman);
            self.state = ExState::WaitingScheduler;
        }

        self.check_catastrophic_failure(bus, exman);
    }

    /// True while a prologue is being driven through the scheduler.
    pub fn is_processing(&self) -> bool {
        self.state == ExState::WaitingScheduler
    }

    pub fn post_cycle(&mut self, scheduler: &BusScheduler) {
        if self.state == ExState::WaitingScheduler && scheduler.is_idle() {
            self.reset();
        }
    }

    fn should_process(&self, exman: &ExceptionManager, instruction_unit_idle: bool) -> bool {
        if exman.is_raised_group(ExceptionGroup::Group0) {
            return true;
        }
        instruction_unit_idle
            && (exman.is_raised_group(ExceptionGroup::Group1)
                || exman.is_raised_group(ExceptionGroup::Group2))
    }

    fn process_exception(
        &mut self,
        regs: &mut RegisterFile,
        bus: &mut CpuBus,
        scheduler: &mut BusScheduler,
        exman: &mut ExceptionManager,
    ) {
        let kind = self.accept_exception(exman);
        self.current = Some(kind);
        debug!("processing exception {:?}", kind);

        match kind {
            ExceptionKind::Reset => {
                self.reset_prologue(regs, bus, scheduler, exman);
            }
            ExceptionKind::AddressError | ExceptionKind::BusError => {
                self.fault_prologue(kind, regs, scheduler);
            }
            ExceptionKind::Trace => {
                scheduler.wait(4);
                self.trap_prologue(regs, scheduler, regs.pc, ExceptionKind::Trace.vector());
            }
            ExceptionKind::Interrupt => {
                self.interrupt_prologue(regs, bus, scheduler);
            }
            ExceptionKind::IllegalInstruction => {
                scheduler.wait(4);
                self.trap_prologue(
                    regs,
                    scheduler,
                    regs.pc,
                    ExceptionKind::IllegalInstruction.vector(),
                );
            }
            ExceptionKind::LineA => {
                scheduler.wait(4);
                self.trap_prologue(regs, scheduler, regs.pc, ExceptionKind::LineA.vector());
            }
            ExceptionKind::LineF => {
                scheduler.wait(4);
                self.trap_prologue(regs, scheduler, regs.pc, ExceptionKind::LineF.vector());
            }
            ExceptionKind::PrivilegeViolation => {
                scheduler.wait(3);
                self.trap_prologue(
                    regs,
                    scheduler,
                    regs.spc,
                    ExceptionKind::PrivilegeViolation.vector(),
                );
            }
            ExceptionKind::Trap => {
                scheduler.wait(3);
                self.trap_prologue(regs, scheduler, regs.pc, self.trap_vector as u32);
            }
            ExceptionKind::TrapV => {
                self.trap_prologue(regs, scheduler, regs.pc, ExceptionKind::TrapV.vector());
            }
            ExceptionKind::ChkInstruction => {
                scheduler.wait(3);
                self.trap_prologue(
                    regs,
                    scheduler,
                    regs.pc,
                    ExceptionKind::ChkInstruction.vector(),
                );
            }
            ExceptionKind::DivisionByZero => {
                scheduler.wait(7);
                self.trap_prologue(
                    regs,
                    scheduler,
                    regs.spc,
                    ExceptionKind::DivisionByZero.vector(),
                );
            }
        }
    }

    /// Accept one raised exception, group 0 first, then group 2 over 1.
    fn accept_exception(&mut self, exman: &mut ExceptionManager) -> ExceptionKind {
        for group in [&GROUP_0[..], &GROUP_2[..], &GROUP_1[..]] {
            for &kind in group {
                if !exman.is_raised(kind) {
                    continue;
                }
                match kind {
                    ExceptionKind::AddressError => self.fault = Some(exman.accept_address_error()),
                    ExceptionKind::BusError => self.fault = Some(exman.accept_bus_error()),
                    ExceptionKind::Trap => self.trap_vector = exman.accept_trap(),
                    _ => exman.accept(kind),
                }
                return kind;
            }
        }
        panic!("exception unit invoked with nothing raised");
    }

    fn reset_prologue(
        &mut self,
        regs: &mut RegisterFile,
        bus: &mut CpuBus,
        scheduler: &mut BusScheduler,
        exman: &mut ExceptionManager,
    ) {
        exman.accept_all();

        regs.set_sr(regs.sr | flags::SUPERVISOR);
        regs.set_flag(flags::TRACE, false);
        regs.set_ipm(7);

        bus.set(BusLine::Reset);
        bus.set(BusLine::Halt);

        scheduler.wait(10);
        scheduler.call(CallOp::ClearResetHalt);
        scheduler.wait(4);

        scheduler.read(0, Size::Long, ReadTarget::SetSsp);
        scheduler.read(4, Size::Long, ReadTarget::SetPc);
        Self::prefetch_two_with_gap(scheduler);
    }

    /// Address/bus error frame: PC, SR, IRD, fault address and the info word.
    fn fault_prologue(
        &mut self,
        kind: ExceptionKind,
        regs: &mut RegisterFile,
        scheduler: &mut BusScheduler,
    ) {
        let fault = self.fault.expect("fault prologue without fault info");
        let pc = Self::corrected_pc(regs, &fault);
        let sr = regs.sr;

        regs.set_sr(regs.sr | flags::SUPERVISOR);
        regs.set_flag(flags::TRACE, false);

        scheduler.wait(3);

        // PC low, then SR into the slot beneath it
        regs.a[7] = regs.a[7].wrapping_sub(2);
        scheduler.write(regs.a[7], pc & 0xFFFF, Size::Word, Order::LswFirst);
        scheduler.write(
            regs.a[7].wrapping_sub(4),
            sr as u32,
            Size::Word,
            Order::LswFirst,
        );

        // PC high; the SR slot is already written
        regs.a[7] = regs.a[7].wrapping_sub(2);
        scheduler.write(regs.a[7], pc >> 16, Size::Word, Order::LswFirst);
        regs.a[7] = regs.a[7].wrapping_sub(2);

        // IRD
        regs.a[7] = regs.a[7].wrapping_sub(2);
        scheduler.write(regs.a[7], regs.sird as u32, Size::Word, Order::LswFirst);

        // fault address low, info word, fault address high
        regs.a[7] = regs.a[7].wrapping_sub(2);
        scheduler.write(regs.a[7], fault.address & 0xFFFF, Size::Word, Order::LswFirst);
        scheduler.write(
            regs.a[7].wrapping_sub(4),
            Self::fault_info_word(regs, &fault) as u32,
            Size::Word,
            Order::LswFirst,
        );
        regs.a[7] = regs.a[7].wrapping_sub(2);
        scheduler.write(regs.a[7], fault.address >> 16, Size::Word, Order::LswFirst);
        regs.a[7] = regs.a[7].wrapping_sub(2);

        scheduler.read(kind.vector() * 4, Size::Long, ReadTarget::SetPc);
        Self::prefetch_two_with_gap(scheduler);
    }

    /// The fault status word keeps the undocumented IRD bits above the five
    /// documented ones.
    fn fault_info_word(regs: &RegisterFile, fault: &FaultInfo) -> u16 {
        let mut status = regs.sird & !0b11111;
        status |= (fault.func_codes & 0x7) as u16;
        if fault.in_program {
            status |= 1 << 3;
        }
        if fault.read {
            status |= 1 << 4;
        }
        status
    }

    /// The PC pushed by a fault frame depends on how far the instruction
    /// stream had moved when the fault hit.
    fn corrected_pc(regs: &RegisterFile, fault: &FaultInfo) -> u32 {
        let is_write = !fault.read;
        if is_write && Self::is_predec_move(regs.sird) {
            return regs.pc;
        }
        if fault.in_program {
            return regs.pc.wrapping_sub(4);
        }
        regs.pc.wrapping_sub(2)
    }

    fn is_predec_move(opcode: u16) -> bool {
        decoder::decode(opcode) == InstType::Move && (opcode >> 6) & 0x7 == 0b100
    }

    /// SR is stacked first; the rest of the frame waits for the vector
    /// negotiated by the interrupt-acknowledge cycle.
    fn interrupt_prologue(
        &mut self,
        regs: &mut RegisterFile,
        bus: &mut CpuBus,
        scheduler: &mut BusScheduler,
    ) {
        let level = bus.interrupt_priority();
        assert!(level != 0, "interrupt exception raised with no pending level");

        let sr = regs.sr;
        regs.set_sr(regs.sr | flags::SUPERVISOR);
        regs.set_flag(flags::TRACE, false);
        regs.set_ipm(level);

        // the frame lands on the supervisor stack: SR beneath the PC slot
        scheduler.wait(6);
        scheduler.write(
            regs.a[7].wrapping_sub(6),
            sr as u32,
            Size::Word,
            Order::LswFirst,
        );

        // completion schedules: wait(4), push PC, vector read, refill
        scheduler.int_ack(level);
    }

    fn trap_prologue(
        &mut self,
        regs: &mut RegisterFile,
        scheduler: &mut BusScheduler,
        pc: u32,
        vector: u32,
    ) {
        let sr = regs.sr;
        regs.set_sr(regs.sr | flags::SUPERVISOR);
        regs.set_flag(flags::TRACE, false);

        // PC low, SR beneath it, then PC high
        regs.a[7] = regs.a[7].wrapping_sub(2);
        scheduler.write(regs.a[7], pc & 0xFFFF, Size::Word, Order::LswFirst);
        scheduler.write(
            regs.a[7].wrapping_sub(4),
            sr as u32,
            Size::Word,
            Order::LswFirst,
        );
        regs.a[7] = regs.a[7].wrapping_sub(2);
        scheduler.write(regs.a[7], pc >> 16, Size::Word, Order::LswFirst);
        regs.a[7] = regs.a[7].wrapping_sub(2);

        scheduler.read(vector * 4, Size::Long, ReadTarget::SetPc);
        Self::prefetch_two_with_gap(scheduler);
    }

    fn prefetch_two_with_gap(scheduler: &mut BusScheduler) {
        scheduler.prefetch_ird();
        scheduler.wait(2);
        scheduler.prefetch_irc();
    }

    /// An address or bus error during the handling of one is unrecoverable.
    fn check_catastrophic_failure(&mut self, bus: &mut CpuBus, exman: &ExceptionManager) {
        if !matches!(
            self.current,
            Some(ExceptionKind::AddressError) | Some(ExceptionKind::BusError)
        ) {
            return;
        }

        if exman.is_raised(ExceptionKind::AddressError) || exman.is_raised(ExceptionKind::BusError) {
            debug!("double fault while processing {:?}; halting", self.current);
            self.halted = true;
            bus.set(BusLine::Halt);
        }
    }
}

impl Default for ExceptionUnit {
    fn default() -> Self {
        Self::new()
    }
}
