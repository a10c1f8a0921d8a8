//! M68K CPU core
//!
//! The main processor of the Mega Drive, assembled from per-clock units:
//!
//! | Unit             | Job                                         |
//! |:-----------------|:--------------------------------------------|
//! | bus manager      | external bus microcycles, BR/BG arbitration |
//! | prefetch queue   | IR/IRD/IRC two-word lookahead               |
//! | bus scheduler    | deferred bus/register micro-operations      |
//! | instruction unit | decode and execute                          |
//! | exception unit   | exception prologues by group priority       |
//! | risers           | interrupt and trace detection               |
//!
//! Within one clock the sub-steps run in a fixed order: interrupt riser,
//! bus manager, bus scheduler, prefetch queue, instruction unit, exception
//! unit, trace riser. A just-issued bus operation never completes in the
//! cycle it was issued, and exceptions raised by the bus manager become
//! visible to the exception unit in the same cycle.

pub mod bus;
pub mod bus_manager;
pub mod decoder;
pub mod ea;
pub mod exception_unit;
pub mod exceptions;
pub mod instruction_unit;
pub mod operations;
pub mod prefetch;
pub mod registers;
pub mod scheduler;
pub mod timings;

pub use registers::{flags, RegisterFile, Size};

use crate::debugger::Debuggable;
use crate::memory::AddressSpace;

use bus::{BusLine, CpuBus};
use bus_manager::{AddrSpace, BusManager, SharedInterruptingDevice};
use exception_unit::ExceptionUnit;
use exceptions::{ExceptionKind, ExceptionManager};
use instruction_unit::{Ctx, InstructionUnit};
use prefetch::PrefetchQueue;
use scheduler::{BusScheduler, ExecContext};

use serde_json::{json, Value};
use std::cell::RefCell;
use std::rc::Rc;

/// Raises the interrupt exception when the IPL lines exceed the mask, or on
/// the edge of a level-7 (non-maskable) request.
struct InterruptRiser {
    prev_ipl: u8,
}

impl InterruptRiser {
    fn new() -> Self {
        Self { prev_ipl: 0 }
    }

    fn cycle(&mut self, bus: &CpuBus, regs: &RegisterFile, exman: &mut ExceptionManager) {
        let ipl = bus.interrupt_priority();

        if ipl != 0 && !exman.is_raised(ExceptionKind::Interrupt) {
            let nmi_edge = ipl == 0b111 && self.prev_ipl != ipl;
            if nmi_edge || ipl > regs.ipm() {
                exman.rise_interrupt();
            }
        }

        self.prev_ipl = ipl;
    }
}

/// Raises the trace exception once per completed instruction, based on the
/// T bit as it was when the instruction started.
struct TraceRiser {
    executing: bool,
    tracing_enabled: bool,
}

impl TraceRiser {
    fn new() -> Self {
        Self {
            executing: false,
            tracing_enabled: false,
        }
    }

    fn cycle(&mut self, instruction_unit_idle: bool, regs: &RegisterFile) {
        if instruction_unit_idle {
            self.tracing_enabled = regs.flag(flags::TRACE);
        }
    }

    fn post_cycle(&mut self, instruction_unit_idle: bool, exman: &mut ExceptionManager) {
        if self.executing && instruction_unit_idle && self.tracing_enabled {
            // an instruction that itself faulted does not also trace
            let faulted = exman.is_raised(ExceptionKind::IllegalInstruction)
                || exman.is_raised(ExceptionKind::PrivilegeViolation);
            if !faulted && !exman.is_raised(ExceptionKind::Trace) {
                exman.rise_trace();
            }
        }
        self.executing = !instruction_unit_idle;
    }
}

/// Non-owning view of the M68K bus for the VDP's DMA engine.
pub struct M68kBusAccess<'a> {
    pub busm: &'a mut BusManager,
    pub bus: &'a mut CpuBus,
}

impl M68kBusAccess<'_> {
    pub fn request_bus(&mut self) {
        self.busm.request_bus(self.bus);
    }

    pub fn release_bus(&mut self) {
        self.busm.release_bus(self.bus);
    }

    pub fn bus_granted(&self) -> bool {
        self.bus.is_set(BusLine::Bg)
    }

    pub fn is_idle(&self) -> bool {
        self.busm.is_idle()
    }

    pub fn init_read_word(&mut self, address: u32) {
        self.busm.init_read_word(address, AddrSpace::Data);
    }

    pub fn latched_word(&self) -> u16 {
        self.busm.latched_word()
    }
}

/// Motorola 68000, stepped one clock at a time.
pub struct Cpu {
    pub regs: RegisterFile,
    pub bus: CpuBus,
    pub exman: ExceptionManager,

    busm: BusManager,
    pq: PrefetchQueue,
    scheduler: BusScheduler,
    iunit: InstructionUnit,
    exunit: ExceptionUnit,
    irq_riser: InterruptRiser,
    trace_riser: TraceRiser,
    exec: ExecContext,
}

impl Cpu {
    /// Build the CPU over a shared address space. The reset exception is
    /// raised immediately, so the first cycles run the power-on prologue.
    pub fn new(memory: Rc<RefCell<AddressSpace>>) -> Self {
        let mut cpu = Self {
            regs: RegisterFile::new(),
            bus: CpuBus::new(),
            exman: ExceptionManager::new(),
            busm: BusManager::new(memory),
            pq: PrefetchQueue::new(),
            scheduler: BusScheduler::new(),
            iunit: InstructionUnit::new(),
            exunit: ExceptionUnit::new(),
            irq_riser: InterruptRiser::new(),
            trace_riser: TraceRiser::new(),
            exec: ExecContext::new(),
        };
        cpu.exman.rise_reset();
        cpu
    }

    pub fn set_interrupting_device(&mut self, device: SharedInterruptingDevice) {
        self.busm.set_interrupting_device(device);
    }

    /// The bus view handed to the VDP DMA engine each tick.
    pub fn bus_access(&mut self) -> M68kBusAccess<'_> {
        M68kBusAccess {
            busm: &mut self.busm,
            bus: &mut self.bus,
        }
    }

    pub fn is_halted(&self) -> bool {
        self.exunit.is_halted()
    }

    /// True when no instruction or exception prologue is in flight.
    pub fn is_idle(&self) -> bool {
        let iunit_idle = self.iunit.is_idle(&self.scheduler);
        iunit_idle
            && self.scheduler.is_idle()
            && self.busm.is_idle()
            && self.exunit.is_idle(&self.exman, iunit_idle)
    }

    pub fn cycle(&mut self) {
        if self.exunit.is_halted() {
            return;
        }

        let iunit_idle = self.iunit.is_idle(&self.scheduler);
        self.trace_riser.cycle(iunit_idle, &self.regs);
        self.irq_riser.cycle(&self.bus, &self.regs, &mut self.exman);

        // while the bus is granted away the execution pipeline stalls; the
        // bus manager keeps running on behalf of the new master
        let granted = self.bus.is_set(BusLine::Bg);

        // the scheduler runs ahead of the bus manager so an operation it
        // starts enters its first bus state on the same clock
        if !granted {
            self.scheduler.cycle(
                &mut self.regs,
                &mut self.bus,
                &mut self.busm,
                &mut self.pq,
                &mut self.exec,
            );
        }

        self.busm.cycle(&mut self.bus, &mut self.regs, &mut self.exman);

        if !granted {
            self.pq.cycle(&self.busm, &mut self.regs);

            // the instruction unit yields to exception processing: it never
            // starts decoding while a prologue runs or an exception waits
            let iunit_idle = self.iunit.is_idle(&self.scheduler);
            if self.exunit.is_idle(&self.exman, iunit_idle) {
                self.iunit.cycle(&mut Ctx {
                    regs: &mut self.regs,
                    bus: &mut self.bus,
                    busm: &mut self.busm,
                    scheduler: &mut self.scheduler,
                    exman: &mut self.exman,
                    exec: &mut self.exec,
                });
            }

            // group-0 exceptions cut the running instruction short before
            // their prologue is scheduled
            if self.exman.is_raised_group(exceptions::ExceptionGroup::Group0) {
                self.abort_execution();
            }

            let iunit_idle = self.iunit.is_idle(&self.scheduler);
            self.exunit.cycle(
                &mut self.regs,
                &mut self.bus,
                &mut self.scheduler,
                &mut self.exman,
                iunit_idle,
            );
            if self.exunit.is_processing() && self.iunit.is_stopped() {
                self.iunit.clear_stopped();
            }

            self.exunit.post_cycle(&self.scheduler);
            self.iunit.post_cycle(&self.scheduler);
        }

        let iunit_idle = self.iunit.is_idle(&self.scheduler);
        self.trace_riser.post_cycle(iunit_idle, &mut self.exman);
    }

    /// Drop every in-flight micro-operation without running completions.
    fn abort_execution(&mut self) {
        self.scheduler.reset();
        self.pq.reset();
        self.iunit.reset(&mut self.exec);
    }
}

impl Debuggable for Cpu {
    fn read_state(&self) -> Value {
        json!({
            "d": self.regs.d,
            "a": self.regs.a,
            "pc": self.regs.pc,
            "sr": self.regs.sr,
            "usp": self.regs.usp(),
            "ir": self.regs.ir,
            "ird": self.regs.ird,
            "irc": self.regs.irc,
            "halted": self.is_halted(),
        })
    }

    fn write_state(&mut self, state: &Value) {
        if let Some(pc) = state.get("pc").and_then(Value::as_u64) {
            self.regs.pc = pc as u32;
        }
        if let Some(sr) = state.get("sr").and_then(Value::as_u64) {
            self.regs.set_sr(sr as u16);
        }
        if let Some(d) = state.get("d").and_then(Value::as_array) {
            for (i, v) in d.iter().take(8).enumerate() {
                if let Some(v) = v.as_u64() {
                    self.regs.d[i] = v as u32;
                }
            }
        }
        if let Some(a) = state.get("a").and_then(Value::as_array) {
            for (i, v) in a.iter().take(8).enumerate() {
                if let Some(v) = v.as_u64() {
                    self.regs.a[i] = v as u32;
                }
            }
        }
    }
}

#[cfg(test)]
pub mod testing;

#[cfg(test)]
mod tests_bus_manager;
#[cfg(test)]
mod tests_exceptions;
#[cfg(test)]
mod tests_m68k_alu;
#[cfg(test)]
mod tests_m68k_control;
#[cfg(test)]
mod tests_m68k_data;
#[cfg(test)]
mod tests_prefetch;
