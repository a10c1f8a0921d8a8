//! M68K bus scheduler
//!
//! A FIFO of deferred micro-operations consumed one bus operation at a time:
//! reads and writes against the bus manager, prefetches against the queue,
//! idle waits, and zero-cost inline steps (calls, address-register bumps)
//! that drain between bus operations. Long accesses split into two word
//! operations; completion effects route through closed enums instead of
//! captured closures, so a reset drops everything without running anything.

use super::bus::{BusLine, CpuBus};
use super::bus_manager::{AddrSpace, BusManager};
use super::ea::{self, EaCall, EaState};
use super::prefetch::PrefetchQueue;
use super::registers::{flags, RegisterFile, Size};

use std::collections::VecDeque;

/// Which half of a long write is issued first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Order {
    MswFirst,
    LswFirst,
}

/// Where a completed read delivers its data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadTarget {
    /// Drop the data (MOVEM's trailing extra word read).
    Discard,
    /// Execution-context data buffer.
    Data,
    /// Data buffer, then decrement the register by a word (first half of a
    /// predecremented long read, deferred so a fault leaves the register).
    DataDecAddr { reg: u8 },
    /// OR the word into the data buffer's high half (second half of a
    /// predecremented long read).
    DataHigh,
    /// Execution-context immediate buffer.
    Imm,
    /// Operand read for the EA decoder.
    EaValue,
    /// Exception vector or jump target.
    SetPc,
    /// RTE/RTR: PC high word.
    PcHigh,
    /// RTE: staged SR from the stack.
    SrTemp,
    /// RTR: staged CCR from the stack.
    CcrTemp,
    /// RTE/RTR: PC low word, then pop the frame and commit the staged SR.
    PcLowCommitSr,
    /// RTS: full PC, then pop.
    PcRts,
    /// UNLK: pop the saved frame pointer into the register.
    UnlkReg { reg: u8 },
    /// MOVEM to registers: store to the next register in the mask.
    MovemReg,
    /// MOVEP to register: shift the byte into the data register.
    MovepReg,
    /// Reset prologue: initial supervisor stack pointer.
    SetSsp,
}

/// Inline operations executed between bus operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallOp {
    /// Deferred effective-address decode step.
    Ea(EaCall),
    /// Consume an extension word without refetching IRC.
    AdvancePc,
    /// MOVEM address writeback from the scratch address.
    SetAddrRegFromAddr { reg: u8 },
    /// LINK: displace the stack pointer by the fetched immediate.
    AddSpImm,
    /// Adjust the active stack pointer by a fixed amount.
    SpAdd { offset: i32 },
    /// RESET instruction: release the RESET line after the wait.
    ClearReset,
    /// Reset prologue: release RESET and HALT.
    ClearResetHalt,
    /// MOVE writeback through a no-read decoded destination.
    MoveStore { size: Size },
    /// MOVE to an absolute-long destination: merge the low address word and
    /// schedule the interleaved write/fetches.
    MoveAbsLong { size: Size, src_pointer: bool },
}

#[derive(Debug, Clone, Copy)]
enum Op {
    Read {
        addr: u32,
        size: Size,
        space: AddrSpace,
        target: ReadTarget,
        deliver: bool,
    },
    ReadEa {
        phase: u8,
    },
    ReadImm {
        size: Size,
        target: ReadTarget,
        prefetch: bool,
        deliver: bool,
    },
    Write {
        addr: u32,
        data: u16,
        byte: bool,
    },
    Push {
        data: u32,
        phase: u8,
    },
    PrefetchIrd,
    PrefetchIrc,
    /// IRC refill paired with the PC advance of the consumed extension word.
    PrefetchIrcAdvance,
    PrefetchOne,
    Wait {
        cycles: u16,
    },
    Call(CallOp),
    IncAddr {
        reg: u8,
        size: Size,
    },
    DecAddr {
        reg: u8,
        size: Size,
    },
    IntAck {
        ipl: u8,
    },
}

/// Scratch buffers shared between the scheduler's completion effects and the
/// instruction/exception units.
#[derive(Debug, Clone, Copy)]
pub struct ExecContext {
    /// Last delivered read value.
    pub data: u32,
    /// Fetched immediate.
    pub imm: u32,
    /// Scratch address (MOVEM writeback, MOVE abs destinations).
    pub addr: u32,
    /// Instruction result staged for deferred writeback.
    pub res: u32,
    /// Staged SR for RTE/RTR.
    pub tmp_sr: u16,

    pub movem_mask: u16,
    pub movem_reg: u8,
    pub movem_size: Size,
    pub movep_reg: u8,
    pub movep_size: Size,

    pub ea: EaState,
}

impl ExecContext {
    pub fn new() -> Self {
        Self {
            data: 0,
            imm: 0,
            addr: 0,
            res: 0,
            tmp_sr: 0,
            movem_mask: 0,
            movem_reg: 0,
            movem_size: Size::Word,
            movep_reg: 0,
            movep_size: Size::Word,
            ea: EaState::new(),
        }
    }
}

impl Default for ExecContext {
    fn default() -> Self {
        Self::new()
    }
}

pub struct BusScheduler {
    queue: VecDeque<Op>,
    current: Option<Op>,
    /// Read accumulator; long reads shift their halves through it.
    data: u32,
    wait_cycles: u16,
}

impl BusScheduler {
    pub fn new() -> Self {
        Self {
            queue: VecDeque::new(),
            current: None,
            data: 0,
            wait_cycles: 0,
        }
    }

    /// Drop every pending operation without executing completion effects.
    pub fn reset(&mut self) {
        self.queue.clear();
        self.current = None;
        self.wait_cycles = 0;
    }

    pub fn is_idle(&self) -> bool {
        self.queue.is_empty() && self.current.is_none()
    }

    /* scheduling interface */

    pub fn read(&mut self, addr: u32, size: Size, target: ReadTarget) {
        self.read_from(addr, size, AddrSpace::Data, target);
    }

    pub fn read_from(&mut self, addr: u32, size: Size, space: AddrSpace, target: ReadTarget) {
        match size {
            Size::Byte | Size::Word => self.queue.push_back(Op::Read {
                addr,
                size,
                space,
                target,
                deliver: true,
            }),
            Size::Long => {
                // the bus is 16 bits wide; split into two word operations
                self.queue.push_back(Op::Read {
                    addr,
                    size: Size::Long,
                    space,
                    target,
                    deliver: false,
                });
                self.queue.push_back(Op::Read {
                    addr: addr.wrapping_add(2),
                    size: Size::Long,
                    space,
                    target,
                    deliver: true,
                });
            }
        }
    }

    /// Drain IRC as immediate data; refill it so PC advances exactly once
    /// per consumed word.
    pub fn read_imm(&mut self, size: Size, target: ReadTarget) {
        match size {
            Size::Byte | Size::Word => self.queue.push_back(Op::ReadImm {
                size,
                target,
                prefetch: true,
                deliver: true,
            }),
            Size::Long => {
                self.queue.push_back(Op::ReadImm {
                    size: Size::Long,
                    target,
                    prefetch: true,
                    deliver: false,
                });
                self.queue.push_back(Op::ReadImm {
                    size: Size::Long,
                    target,
                    prefetch: true,
                    deliver: true,
                });
            }
        }
    }

    /// Long immediate fetched with a plain bus read instead of a second
    /// prefetch (the move-to-memory paths that manage IRC themselves).
    pub fn read_imm_no_prefetch(&mut self, target: ReadTarget) {
        self.queue.push_back(Op::ReadImm {
            size: Size::Long,
            target,
            prefetch: false,
            deliver: true,
        });
    }

    pub fn write(&mut self, addr: u32, data: u32, size: Size, order: Order) {
        match size {
            Size::Byte => self.queue.push_back(Op::Write {
                addr,
                data: data as u16,
                byte: true,
            }),
            Size::Word => self.queue.push_back(Op::Write {
                addr,
                data: data as u16,
                byte: false,
            }),
            Size::Long => {
                let msw = Op::Write {
                    addr,
                    data: (data >> 16) as u16,
                    byte: false,
                };
                let lsw = Op::Write {
                    addr: addr.wrapping_add(2),
                    data: data as u16,
                    byte: false,
                };
                match order {
                    Order::MswFirst => {
                        self.queue.push_back(msw);
                        self.queue.push_back(lsw);
                    }
                    Order::LswFirst => {
                        self.queue.push_back(lsw);
                        self.queue.push_back(msw);
                    }
                }
            }
        }
    }

    /// Push a long onto the active stack, high word first.
    pub fn push_long(&mut self, data: u32) {
        self.queue.push_back(Op::Push { data, phase: 0 });
    }

    pub fn prefetch_ird(&mut self) {
        self.queue.push_back(Op::PrefetchIrd);
    }

    pub fn prefetch_irc(&mut self) {
        self.queue.push_back(Op::PrefetchIrc);
    }

    pub fn prefetch_irc_advance(&mut self) {
        self.queue.push_back(Op::PrefetchIrcAdvance);
    }

    pub fn prefetch_one(&mut self) {
        self.queue.push_back(Op::PrefetchOne);
    }

    pub fn prefetch_two(&mut self) {
        self.prefetch_ird();
        self.prefetch_irc();
    }

    pub fn wait(&mut self, cycles: u16) {
        if cycles == 0 {
            return;
        }
        self.queue.push_back(Op::Wait { cycles });
    }

    pub fn call(&mut self, op: CallOp) {
        self.queue.push_back(Op::Call(op));
    }

    pub fn ea_call(&mut self, call: EaCall) {
        self.call(CallOp::Ea(call));
    }

    pub fn ea_call_advance_pc(&mut self) {
        self.call(CallOp::AdvancePc);
    }

    /// Operand read against the EA decoder's resolved pointer.
    pub fn read_ea(&mut self) {
        self.queue.push_back(Op::ReadEa { phase: 0 });
    }

    pub fn inc_addr_reg(&mut self, reg: u8, size: Size) {
        self.queue.push_back(Op::IncAddr { reg, size });
    }

    pub fn dec_addr_reg(&mut self, reg: u8, size: Size) {
        self.queue.push_back(Op::DecAddr { reg, size });
    }

    /// Interrupt-acknowledge bus cycle for the accepted level; its completion
    /// schedules the rest of the interrupt prologue with the negotiated
    /// vector.
    pub fn int_ack(&mut self, ipl: u8) {
        self.queue.push_back(Op::IntAck { ipl });
    }

    /* execution */

    pub fn cycle(
        &mut self,
        regs: &mut RegisterFile,
        bus: &mut CpuBus,
        busm: &mut BusManager,
        pq: &mut PrefetchQueue,
        exec: &mut ExecContext,
    ) {
        if let Some(op) = self.current {
            if busm.operation_aborted() && Self::op_uses_bus(&op) {
                // a group-0 exception cut the operation short; everything
                // scheduled behind it dies with it
                self.reset();
                return;
            }
            if !self.current_op_over(&op, busm, pq) {
                if let Op::Wait { .. } = op {
                    self.wait_cycles = self.wait_cycles.saturating_sub(1);
                }
                return;
            }
            self.current = None;
            self.finish(op, regs, busm, exec);
            if self.current.is_some() {
                // finish started the second half of a two-phase operation
                return;
            }
        }

        self.run_inline_ops(regs, bus, exec);

        if let Some(op) = self.queue.pop_front() {
            self.start(op, regs, busm, pq, exec);
        }
    }

    fn op_uses_bus(op: &Op) -> bool {
        matches!(
            op,
            Op::Read { .. }
                | Op::ReadEa { .. }
                | Op::Write { .. }
                | Op::Push { .. }
                | Op::PrefetchIrd
                | Op::PrefetchIrc
                | Op::PrefetchIrcAdvance
                | Op::PrefetchOne
                | Op::IntAck { .. }
                | Op::ReadImm { .. }
        )
    }

    fn current_op_over(&self, op: &Op, busm: &BusManager, pq: &PrefetchQueue) -> bool {
        match op {
            Op::Read { .. }
            | Op::ReadEa { .. }
            | Op::Write { .. }
            | Op::Push { .. }
            | Op::IntAck { .. } => busm.is_idle(),
            // the immediate drain itself is free; the op lingers for either
            // the IRC refill or the extra bus read of a long immediate
            Op::ReadImm { prefetch, .. } => {
                if *prefetch {
                    pq.is_idle()
                } else {
                    busm.is_idle()
                }
            }
            Op::PrefetchIrd | Op::PrefetchIrc | Op::PrefetchIrcAdvance | Op::PrefetchOne => {
                pq.is_idle()
            }
            Op::Wait { .. } => self.wait_cycles == 0,
            Op::Call(_) | Op::IncAddr { .. } | Op::DecAddr { .. } => true,
        }
    }

    fn run_inline_ops(&mut self, regs: &mut RegisterFile, bus: &mut CpuBus, exec: &mut ExecContext) {
        loop {
            match self.queue.front() {
                Some(Op::Call(_)) | Some(Op::IncAddr { .. }) | Some(Op::DecAddr { .. }) => {}
                _ => return,
            }
            let op = self.queue.pop_front().unwrap();
            match op {
                Op::Call(call) => self.run_call(call, regs, bus, exec),
                Op::IncAddr { reg, size } => regs.inc_addr(reg, size),
                Op::DecAddr { reg, size } => regs.dec_addr(reg, size),
                _ => unreachable!(),
            }
        }
    }

    fn start(
        &mut self,
        op: Op,
        regs: &mut RegisterFile,
        busm: &mut BusManager,
        pq: &mut PrefetchQueue,
        exec: &mut ExecContext,
    ) {
        match op {
            Op::Read {
                addr, size, space, ..
            } => {
                match size {
                    Size::Byte => busm.init_read_byte(addr, space),
                    _ => busm.init_read_word(addr, space),
                }
                self.current = Some(op);
            }

            Op::ReadEa { phase: 0 } => {
                let ptr = exec.ea.ptr;
                match exec.ea.size {
                    Size::Byte => busm.init_read_byte(ptr, AddrSpace::Data),
                    _ => busm.init_read_word(ptr, AddrSpace::Data),
                }
                self.current = Some(op);
            }
            Op::ReadEa { .. } => unreachable!("ReadEa phases start from finish()"),

            Op::ReadImm {
                size,
                target,
                prefetch,
                deliver,
            } => {
                // drain IRC; a long shifts its words through the accumulator
                match size {
                    Size::Byte => self.data = (regs.irc & 0xFF) as u32,
                    Size::Word => self.data = regs.irc as u32,
                    Size::Long => self.data = (self.data << 16) | regs.irc as u32,
                }

                if prefetch {
                    pq.init_fetch_irc(busm, regs);
                    regs.pc = regs.pc.wrapping_add(2);
                    if deliver {
                        Self::apply_read_target(target, self.data, regs, exec);
                    }
                    self.current = Some(op);
                } else {
                    // long immediate without refill: one additional bus read
                    busm.init_read_word(regs.pc.wrapping_add(2), AddrSpace::Program);
                    self.current = Some(op);
                }
            }

            Op::Write { addr, data, byte } => {
                if byte {
                    busm.init_write_byte(addr, data as u8);
                } else {
                    busm.init_write_word(addr, data);
                }
                self.current = Some(op);
            }

            Op::Push { data, phase: 0 } => {
                regs.a[7] = regs.a[7].wrapping_sub(4);
                busm.init_write_word(regs.a[7], (data >> 16) as u16);
                self.current = Some(Op::Push { data, phase: 0 });
            }
            Op::Push { .. } => unreachable!("push phases start from finish()"),

            Op::PrefetchIrd => {
                pq.init_fetch_ird(busm, regs);
                self.current = Some(op);
            }

            Op::PrefetchIrc => {
                pq.init_fetch_irc(busm, regs);
                self.current = Some(op);
            }

            Op::PrefetchIrcAdvance => {
                pq.init_fetch_irc(busm, regs);
                regs.pc = regs.pc.wrapping_add(2);
                self.current = Some(op);
            }

            Op::PrefetchOne => {
                pq.init_fetch_one(busm, regs);
                self.current = Some(op);
            }

            Op::Wait { cycles } => {
                self.wait_cycles = cycles - 1; // the current cycle counts
                self.current = Some(op);
            }

            Op::IntAck { ipl } => {
                busm.init_interrupt_ack(ipl);
                self.current = Some(op);
            }

            Op::Call(_) | Op::IncAddr { .. } | Op::DecAddr { .. } => {
                unreachable!("inline ops are drained before starting bus ops")
            }
        }
    }

    fn finish(&mut self, op: Op, regs: &mut RegisterFile, busm: &mut BusManager, exec: &mut ExecContext) {
        match op {
            Op::Read {
                size,
                target,
                deliver,
                ..
            } => {
                match size {
                    Size::Byte => self.data = busm.latched_byte() as u32,
                    Size::Word => self.data = busm.latched_word() as u32,
                    Size::Long => self.data = (self.data << 16) | busm.latched_word() as u32,
                }
                let _ = size;
                if deliver {
                    Self::apply_read_target(target, self.data, regs, exec);
                }
            }

            Op::ReadEa { phase } => {
                match exec.ea.size {
                    Size::Byte => self.data = busm.latched_byte() as u32,
                    Size::Word => self.data = busm.latched_word() as u32,
                    Size::Long => self.data = (self.data << 16) | busm.latched_word() as u32,
                }
                if exec.ea.size == Size::Long && phase == 0 {
                    busm.init_read_word(exec.ea.ptr.wrapping_add(2), AddrSpace::Data);
                    self.current = Some(Op::ReadEa { phase: 1 });
                } else {
                    ea::complete_read(exec, self.data);
                }
            }

            Op::ReadImm {
                size,
                target,
                prefetch,
                deliver,
            } => {
                let _ = size;
                if !prefetch {
                    self.data = (self.data << 16) | busm.latched_word() as u32;
                    if deliver {
                        Self::apply_read_target(target, self.data, regs, exec);
                    }
                }
                // prefetching immediates delivered at start
            }

            Op::Write { .. } => {}

            Op::Push { data, phase } => {
                if phase == 0 {
                    busm.init_write_word(regs.a[7].wrapping_add(2), data as u16);
                    self.current = Some(Op::Push { data, phase: 1 });
                }
            }

            Op::IntAck { .. } => {
                let vector = busm.vector_number() as u32;
                self.wait(4);
                self.write(regs.a[7].wrapping_sub(4), regs.pc, Size::Long, Order::MswFirst);
                self.call(CallOp::SpAdd { offset: -6 });
                self.read_from(vector * 4, Size::Long, AddrSpace::Data, ReadTarget::SetPc);
                self.prefetch_ird();
                self.wait(2);
                self.prefetch_irc();
            }

            Op::PrefetchIrd | Op::PrefetchIrc | Op::PrefetchIrcAdvance | Op::PrefetchOne => {}
            Op::Wait { .. } => {}

            Op::Call(_) | Op::IncAddr { .. } | Op::DecAddr { .. } => unreachable!(),
        }
    }

    fn run_call(&mut self, call: CallOp, regs: &mut RegisterFile, bus: &mut CpuBus, exec: &mut ExecContext) {
        match call {
            CallOp::Ea(ea_call) => ea::run_call(self, exec, regs, ea_call),

            CallOp::AdvancePc => regs.pc = regs.pc.wrapping_add(2),

            CallOp::SetAddrRegFromAddr { reg } => regs.a[reg as usize] = exec.addr,

            CallOp::AddSpImm => {
                let disp = Size::Word.sign_extend(exec.imm & 0xFFFF);
                regs.a[7] = regs.a[7].wrapping_add(disp);
            }

            CallOp::SpAdd { offset } => {
                regs.a[7] = regs.a[7].wrapping_add(offset as u32);
            }

            CallOp::ClearReset => {
                bus.clear(BusLine::Reset);
            }

            CallOp::ClearResetHalt => {
                bus.clear(BusLine::Reset);
                bus.clear(BusLine::Halt);
            }

            CallOp::MoveStore { size } => {
                let op = exec.ea.result();
                if op.is_pointer() {
                    self.write(op.pointer_address(), exec.res, size, Order::MswFirst);
                } else {
                    match op.kind {
                        super::ea::OperandKind::DataReg(r) => regs.d_write(r, size, exec.res),
                        super::ea::OperandKind::AddrReg(r) => regs.a_write(r, size, exec.res),
                        _ => unreachable!(),
                    }
                }
                self.prefetch_one();
            }

            CallOp::MoveAbsLong { size, src_pointer } => {
                exec.addr |= regs.irc as u32;
                if src_pointer {
                    self.write(exec.addr, exec.res, size, Order::MswFirst);
                    self.read_imm(Size::Word, ReadTarget::Discard);
                    self.prefetch_one();
                } else {
                    self.read_imm(Size::Word, ReadTarget::Discard);
                    self.write(exec.addr, exec.res, size, Order::MswFirst);
                    self.prefetch_one();
                }
            }
        }
    }

    fn apply_read_target(target: ReadTarget, data: u32, regs: &mut RegisterFile, exec: &mut ExecContext) {
        match target {
            ReadTarget::Discard => {}

            ReadTarget::Data => exec.data = data,

            ReadTarget::DataDecAddr { reg } => {
                exec.data = data;
                regs.dec_addr(reg, Size::Word);
            }

            ReadTarget::DataHigh => {
                exec.data |= (data & 0xFFFF) << 16;
            }

            ReadTarget::Imm => exec.imm = data,

            ReadTarget::EaValue => ea::complete_read(exec, data),

            ReadTarget::SetPc => regs.pc = data,

            ReadTarget::PcHigh => regs.pc = data << 16,

            ReadTarget::SrTemp => exec.tmp_sr = (data as u16) & flags::IMPLEMENTED,

            ReadTarget::CcrTemp => exec.tmp_sr = (regs.sr & 0xFF00) | (data as u16 & 0x001F),

            ReadTarget::PcLowCommitSr => {
                regs.pc |= data & 0xFFFF;
                regs.a[7] = regs.a[7].wrapping_add(6);
                regs.set_sr(exec.tmp_sr);
            }

            ReadTarget::PcRts => {
                regs.pc = data;
                regs.a[7] = regs.a[7].wrapping_add(4);
            }

            ReadTarget::UnlkReg { reg } => {
                regs.a[7] = regs.a[7].wrapping_add(4);
                regs.a[reg as usize] = data;
            }

            ReadTarget::MovemReg => {
                let value = if exec.movem_size == Size::Word {
                    Size::Word.sign_extend(data)
                } else {
                    data
                };

                let mut reg = exec.movem_reg;
                while reg <= 15 && (exec.movem_mask >> reg) & 1 == 0 {
                    reg += 1;
                }
                assert!(reg <= 15, "movem read with an exhausted register mask");

                if reg >= 8 {
                    regs.a[(reg - 8) as usize] = value;
                } else {
                    regs.d[reg as usize] = value;
                }
                exec.movem_reg = reg + 1;
            }

            ReadTarget::MovepReg => {
                let reg = exec.movep_reg as usize;
                let byte = data & 0xFF;
                match exec.movep_size {
                    Size::Long => regs.d[reg] = (regs.d[reg] << 8) | byte,
                    _ => {
                        let w = ((regs.d[reg] as u16) << 8) | byte as u16;
                        regs.d[reg] = (regs.d[reg] & 0xFFFF_0000) | w as u32;
                    }
                }
            }

            ReadTarget::SetSsp => regs.a[7] = data,
        }
    }
}

impl Default for BusScheduler {
    fn default() -> Self {
        Self::new()
    }
}

