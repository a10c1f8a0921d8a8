//! M68K instruction unit
//!
//! Fetches the current opcode from IRD, decodes and executes it as a small
//! per-instruction state machine. Each step returns `Done`,
//! `WaitScheduler` or `InProgress`; the unit spins through steps that
//! schedule nothing (zero-cost synchronous work) and yields to the bus
//! scheduler otherwise.

use super::bus::{BusLine, CpuBus};
use super::bus_manager::{BusManager, RmwModify};
use super::decoder::{self, InstType};
use super::ea::{self, AddressingMode, EaFlags, Operand, OperandKind};
use super::exceptions::ExceptionManager;
use super::operations as ops;
use super::registers::{flags, RegisterFile, Size};
use super::scheduler::{BusScheduler, CallOp, ExecContext, Order, ReadTarget};
use super::timings;

/// Borrowed view over the CPU's sub-components for one cycle.
pub struct Ctx<'a> {
    pub regs: &'a mut RegisterFile,
    pub bus: &'a mut CpuBus,
    pub busm: &'a mut BusManager,
    pub scheduler: &'a mut BusScheduler,
    pub exman: &'a mut ExceptionManager,
    pub exec: &'a mut ExecContext,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum UnitState {
    Idle,
    Executing,
    WaitingScheduler,
    WaitingSchedulerAndIdle,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ExecResult {
    Done,
    WaitScheduler,
    InProgress,
}

pub struct InstructionUnit {
    state: UnitState,
    decoded: bool,
    exec_stage: u8,
    opcode: u16,
    inst: InstType,
    size: Size,
    src_reg: u8,
    dest_reg: u8,
    /// STOP leaves the unit parked until an exception restarts it.
    stopped: bool,
}

impl InstructionUnit {
    pub fn new() -> Self {
        Self {
            state: UnitState::Idle,
            decoded: false,
            exec_stage: 0,
            opcode: 0,
            inst: InstType::None,
            size: Size::Word,
            src_reg: 0,
            dest_reg: 0,
            stopped: false,
        }
    }

    pub fn reset(&mut self, exec: &mut ExecContext) {
        self.state = UnitState::Idle;
        self.decoded = false;
        self.exec_stage = 0;
        self.stopped = false;
        exec.ea.reset();
    }

    pub fn is_idle(&self, scheduler: &BusScheduler) -> bool {
        if self.stopped {
            return true;
        }
        match self.state {
            UnitState::Idle => true,
            UnitState::WaitingSchedulerAndIdle => scheduler.is_idle(),
            _ => false,
        }
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped
    }

    /// An accepted exception restarts a stopped CPU.
    pub fn clear_stopped(&mut self) {
        self.stopped = false;
        self.state = UnitState::Idle;
        self.decoded = false;
    }

    pub fn cycle(&mut self, ctx: &mut Ctx) {
        if self.stopped {
            return;
        }

        if matches!(
            self.state,
            UnitState::WaitingScheduler | UnitState::WaitingSchedulerAndIdle
        ) {
            if !ctx.scheduler.is_idle() {
                return;
            }
            self.state = if self.state == UnitState::WaitingScheduler {
                UnitState::Executing
            } else {
                UnitState::Idle
            };
        }

        if self.state == UnitState::Idle {
            self.decoded = false;
            self.exec_stage = 0;
            ctx.exec.ea.reset();
            self.state = UnitState::Executing;
        }

        self.executing(ctx);
    }

    pub fn post_cycle(&mut self, scheduler: &BusScheduler) {
        if self.state == UnitState::WaitingSchedulerAndIdle && scheduler.is_idle() {
            self.state = UnitState::Idle;
        }
    }

    fn executing(&mut self, ctx: &mut Ctx) {
        loop {
            match self.on_executing(ctx) {
                ExecResult::WaitScheduler => {
                    if ctx.scheduler.is_idle() {
                        // the step scheduled nothing; run the next one now
                        continue;
                    }
                    self.state = UnitState::WaitingScheduler;
                    return;
                }
                ExecResult::Done => {
                    self.state = if ctx.scheduler.is_idle() {
                        UnitState::Idle
                    } else {
                        UnitState::WaitingSchedulerAndIdle
                    };
                    return;
                }
                ExecResult::InProgress => return,
            }
        }
    }

    fn on_executing(&mut self, ctx: &mut Ctx) -> ExecResult {
        if !self.decoded {
            self.opcode = ctx.regs.ird;
            ctx.regs.sird = ctx.regs.ird;
            ctx.regs.spc = ctx.regs.pc;
            self.inst = decoder::decode(self.opcode);
            self.decoded = true;

            if self.inst == InstType::None {
                match self.opcode >> 12 {
                    0b1010 => ctx.exman.rise(super::exceptions::ExceptionKind::LineA),
                    0b1111 => ctx.exman.rise(super::exceptions::ExceptionKind::LineF),
                    _ => ctx.exman.rise_illegal(),
                }
                return ExecResult::Done;
            }

            if self.inst == InstType::Illegal {
                ctx.exman.rise_illegal();
                return ExecResult::Done;
            }

            if !self.is_authorized(ctx.regs) {
                ctx.exman.rise_privilege_violation();
                return ExecResult::Done;
            }

            ctx.regs.pc = ctx.regs.pc.wrapping_add(2);
        }

        self.execute(ctx)
    }

    /// Privileged instructions fault in user mode.
    fn is_authorized(&self, regs: &RegisterFile) -> bool {
        if regs.supervisor() {
            return true;
        }
        !matches!(
            self.inst,
            InstType::MoveToSr
                | InstType::MoveUsp
                | InstType::AndiToSr
                | InstType::OriToSr
                | InstType::EoriToSr
                | InstType::Rte
                | InstType::Reset
                | InstType::Stop
        )
    }

    fn execute(&mut self, ctx: &mut Ctx) -> ExecResult {
        match self.inst {
            InstType::Add
            | InstType::Sub
            | InstType::And
            | InstType::Or
            | InstType::Eor
            | InstType::Cmp => self.alu_mode_handler(ctx),

            InstType::Adda | InstType::Suba | InstType::Cmpa => self.alu_address_mode_handler(ctx),

            InstType::Addi
            | InstType::Andi
            | InstType::Subi
            | InstType::Ori
            | InstType::Eori
            | InstType::Cmpi => self.alu_imm_handler(ctx),

            InstType::Addq | InstType::Subq => self.alu_quick_handler(ctx),

            InstType::Cmpm => self.rm_postinc_handler(ctx),

            InstType::Neg | InstType::Negx | InstType::Not | InstType::Clr | InstType::Nbcd => {
                self.unary_handler(ctx)
            }

            InstType::Addx | InstType::Subx => self.rm_predec_handler(ctx),

            InstType::Nop => {
                ctx.scheduler.prefetch_one();
                ExecResult::Done
            }

            InstType::Move => self.move_handler(ctx),
            InstType::Moveq => self.moveq_handler(ctx),
            InstType::Movea => self.movea_handler(ctx),
            InstType::MovemToMem | InstType::MovemToReg => self.movem_handler(ctx),
            InstType::Movep => self.movep_handler(ctx),
            InstType::MoveFromSr => self.move_from_sr_handler(ctx),
            InstType::MoveToSr => self.move_to_sr_handler(ctx),
            InstType::MoveToCcr => self.move_to_ccr_handler(ctx),
            InstType::MoveUsp => self.move_usp_handler(ctx),

            InstType::AndiToCcr | InstType::OriToCcr | InstType::EoriToCcr => {
                self.alu_to_ccr_handler(ctx)
            }
            InstType::AndiToSr | InstType::OriToSr | InstType::EoriToSr => {
                self.alu_to_sr_handler(ctx)
            }

            InstType::AslAsrReg | InstType::LslLsrReg | InstType::RolRorReg | InstType::RoxReg => {
                self.shift_reg_handler(ctx)
            }
            InstType::AslAsrMem | InstType::LslLsrMem | InstType::RolRorMem | InstType::RoxMem => {
                self.shift_mem_handler(ctx)
            }

            InstType::Tst => self.tst_handler(ctx),
            InstType::Mulu | InstType::Muls => self.mul_handler(ctx),
            InstType::Divu | InstType::Divs => self.div_handler(ctx),

            InstType::Trap => {
                let vector = 32 + (self.opcode & 0xF) as u8;
                ctx.exman.rise_trap(vector);
                ExecResult::Done
            }

            InstType::Trapv => {
                ctx.scheduler.prefetch_one();
                if ctx.regs.flag(flags::OVERFLOW) {
                    ctx.exman.rise_trapv();
                }
                ExecResult::Done
            }

            InstType::Ext => self.ext_handler(ctx),
            InstType::Exg => self.exg_handler(ctx),
            InstType::Swap => self.swap_handler(ctx),

            InstType::BtstReg | InstType::BsetReg | InstType::BclrReg | InstType::BchgReg => {
                self.bit_reg_handler(ctx)
            }
            InstType::BtstImm | InstType::BsetImm | InstType::BclrImm | InstType::BchgImm => {
                self.bit_imm_handler(ctx)
            }

            InstType::Rte => self.rte_handler(ctx),
            InstType::Rtr => self.rtr_handler(ctx),
            InstType::Rts => self.rts_handler(ctx),

            InstType::Jmp => self.jmp_handler(ctx),
            InstType::Chk => self.chk_handler(ctx),
            InstType::Jsr => self.jsr_handler(ctx),
            InstType::Bsr => self.bsr_handler(ctx),
            InstType::Lea => self.lea_handler(ctx),
            InstType::Pea => self.pea_handler(ctx),
            InstType::Link => self.link_handler(ctx),
            InstType::Unlk => self.unlk_handler(ctx),

            InstType::Bcc => self.bcc_handler(ctx),
            InstType::Dbcc => self.dbcc_handler(ctx),
            InstType::Scc => self.scc_handler(ctx),

            InstType::AbcdReg | InstType::SbcdReg => self.bcd_reg_handler(ctx),
            InstType::AbcdMem | InstType::SbcdMem => self.bcd_mem_handler(ctx),

            InstType::Reset => self.reset_handler(ctx),
            InstType::Tas => self.tas_handler(ctx),
            InstType::Stop => self.stop_handler(ctx),

            InstType::Illegal | InstType::None => unreachable!("filtered at decode"),
        }
    }

    /* shared helpers */

    fn decode_ea(&mut self, ctx: &mut Ctx, size: Size) {
        ea::schedule_decoding(
            ctx.scheduler,
            ctx.exec,
            ctx.regs,
            (self.opcode & 0xFF) as u8,
            size,
            EaFlags::NONE,
        );
    }

    fn decode_ea_flags(&mut self, ctx: &mut Ctx, size: Size, flags: EaFlags) {
        ea::schedule_decoding(
            ctx.scheduler,
            ctx.exec,
            ctx.regs,
            (self.opcode & 0xFF) as u8,
            size,
            flags,
        );
    }

    fn read_imm(&mut self, ctx: &mut Ctx, size: Size) {
        ctx.scheduler.read_imm(size, ReadTarget::Imm);
    }

    fn store_operand(regs: &mut RegisterFile, op: &Operand, size: Size, res: u32) {
        match op.kind {
            OperandKind::DataReg(r) => regs.d_write(r, size, res),
            OperandKind::AddrReg(r) => regs.a_write(r, size, res),
            _ => panic!("store into a non-register operand"),
        }
    }

    /// Prefetch, then write the result to its destination - registers
    /// inline, memory through the scheduler.
    fn schedule_prefetch_and_write(ctx: &mut Ctx, op: &Operand, res: u32, size: Size) {
        ctx.scheduler.prefetch_one();
        if op.is_pointer() {
            ctx.scheduler
                .write(op.pointer_address(), res, size, Order::LswFirst);
        } else {
            Self::store_operand(ctx.regs, op, size, res);
        }
    }

    fn dec_size(&self) -> Size {
        Size::from_bits(self.opcode >> 6).expect("size field validated at decode")
    }

    fn bit_is_set(value: u16, bit: u8) -> bool {
        (value >> bit) & 1 == 1
    }

    /* family handlers */

    fn alu_mode_handler(&mut self, ctx: &mut Ctx) -> ExecResult {
        match self.next_stage() {
            0 => {
                self.size = self.dec_size();
                self.decode_ea(ctx, self.size);
                ExecResult::WaitScheduler
            }
            1 => {
                let op = ctx.exec.ea.result();
                let reg = ((self.opcode >> 9) & 0x7) as u8;
                let opmode = ((self.opcode >> 6) & 0x7) as u8;
                let save_to_register = !Self::bit_is_set(self.opcode, 8);

                if save_to_register {
                    let a = ctx.regs.d_read(reg, self.size);
                    let b = op.value(self.size, ctx.regs);
                    let res = ops::alu(self.inst, a, b, self.size, ctx.regs);
                    if self.inst != InstType::Cmp {
                        ctx.regs.d_write(reg, self.size, res);
                    }
                    ctx.scheduler.prefetch_one();
                } else {
                    let a = op.value(self.size, ctx.regs);
                    let b = ctx.regs.d_read(reg, self.size);
                    let res = ops::alu(self.inst, a, b, self.size, ctx.regs);
                    Self::schedule_prefetch_and_write(ctx, &op, res, self.size);
                }

                ctx.scheduler.wait(timings::alu_mode(self.inst, opmode, &op));
                ExecResult::Done
            }
            _ => unreachable!(),
        }
    }

    fn alu_address_mode_handler(&mut self, ctx: &mut Ctx) -> ExecResult {
        let opmode = ((self.opcode >> 6) & 0x7) as u8;
        match self.next_stage() {
            0 => {
                self.size = if opmode == 0b011 { Size::Word } else { Size::Long };
                self.decode_ea(ctx, self.size);
                ExecResult::WaitScheduler
            }
            1 => {
                let op = ctx.exec.ea.result();
                let reg = ((self.opcode >> 9) & 0x7) as u8;
                // address arithmetic sign-extends the source and works on
                // the full register without touching flags (CMPA excepted)
                let src = self.size.sign_extend(op.value(self.size, ctx.regs));
                let dst = ctx.regs.a[reg as usize];

                match self.inst {
                    InstType::Adda => ctx.regs.a[reg as usize] = dst.wrapping_add(src),
                    InstType::Suba => ctx.regs.a[reg as usize] = dst.wrapping_sub(src),
                    InstType::Cmpa => {
                        ops::cmp(dst, src, Size::Long, ctx.regs);
                    }
                    _ => unreachable!(),
                }

                ctx.scheduler.prefetch_one();
                ctx.scheduler.wait(timings::alu_mode(self.inst, opmode, &op));
                ExecResult::Done
            }
            _ => unreachable!(),
        }
    }

    fn alu_imm_handler(&mut self, ctx: &mut Ctx) -> ExecResult {
        match self.next_stage() {
            0 => {
                self.size = self.dec_size();
                self.read_imm(ctx, self.size);
                ExecResult::WaitScheduler
            }
            1 => {
                self.decode_ea(ctx, self.size);
                ExecResult::WaitScheduler
            }
            2 => {
                let op = ctx.exec.ea.result();
                let a = op.value(self.size, ctx.regs);
                let res = ops::alu(self.inst, a, ctx.exec.imm, self.size, ctx.regs);

                if self.inst == InstType::Cmpi {
                    ctx.scheduler.prefetch_one();
                } else {
                    Self::schedule_prefetch_and_write(ctx, &op, res, self.size);
                }

                ctx.scheduler.wait(timings::alu_size(self.inst, self.size, &op));
                ExecResult::Done
            }
            _ => unreachable!(),
        }
    }

    fn alu_quick_handler(&mut self, ctx: &mut Ctx) -> ExecResult {
        match self.next_stage() {
            0 => {
                self.size = self.dec_size();
                self.decode_ea(ctx, self.size);
                ExecResult::WaitScheduler
            }
            1 => {
                let mut data = ((self.opcode >> 9) & 0x7) as u32;
                if data == 0 {
                    data = 8;
                }
                let op = ctx.exec.ea.result();

                let res = if op.is_addr_reg() {
                    // quick arithmetic on address registers is long-sized
                    // and leaves the flags alone
                    let dst = ctx.regs.a[op.reg() as usize];
                    match self.inst {
                        InstType::Addq => dst.wrapping_add(data),
                        _ => dst.wrapping_sub(data),
                    }
                } else {
                    let dst = op.value(self.size, ctx.regs);
                    match self.inst {
                        InstType::Addq => ops::add(dst, data, self.size, ctx.regs),
                        _ => ops::sub(dst, data, self.size, ctx.regs),
                    }
                };

                if op.is_addr_reg() {
                    ctx.regs.a[op.reg() as usize] = res;
                    ctx.scheduler.prefetch_one();
                } else {
                    Self::schedule_prefetch_and_write(ctx, &op, res, self.size);
                }

                ctx.scheduler.wait(timings::alu_size(self.inst, self.size, &op));
                ExecResult::Done
            }
            _ => unreachable!(),
        }
    }

    fn rm_postinc_handler(&mut self, ctx: &mut Ctx) -> ExecResult {
        match self.next_stage() {
            0 => {
                self.src_reg = (self.opcode & 0x7) as u8;
                self.dest_reg = ((self.opcode >> 9) & 0x7) as u8;
                self.size = self.dec_size();

                ctx.scheduler.inc_addr_reg(self.src_reg, self.size);
                let addr = ctx.regs.a[self.src_reg as usize];
                ctx.scheduler.read(addr, self.size, ReadTarget::Data);
                ExecResult::WaitScheduler
            }
            1 => {
                ctx.exec.res = ctx.exec.data;
                ctx.scheduler.inc_addr_reg(self.dest_reg, self.size);
                let addr = ctx.regs.a[self.dest_reg as usize];
                ctx.scheduler.read(addr, self.size, ReadTarget::Data);
                ExecResult::WaitScheduler
            }
            2 => {
                // CMPM: dest - src, X untouched
                ops::cmp(ctx.exec.data, ctx.exec.res, self.size, ctx.regs);
                ctx.scheduler.prefetch_one();
                ExecResult::Done
            }
            _ => unreachable!(),
        }
    }

    fn rm_predec_handler(&mut self, ctx: &mut Ctx) -> ExecResult {
        match self.next_stage() {
            0 => {
                self.src_reg = (self.opcode & 0x7) as u8;
                self.dest_reg = ((self.opcode >> 9) & 0x7) as u8;
                self.size = self.dec_size();

                if Self::bit_is_set(self.opcode, 3) {
                    // memory form
                    ctx.scheduler.wait(2);
                    ExecResult::WaitScheduler
                } else {
                    let src = ctx.regs.d_read(self.src_reg, self.size);
                    let dst = ctx.regs.d_read(self.dest_reg, self.size);
                    let res = ops::alu(self.inst, dst, src, self.size, ctx.regs);
                    ctx.regs.d_write(self.dest_reg, self.size, res);
                    ctx.scheduler.prefetch_one();
                    if self.size == Size::Long {
                        ctx.scheduler.wait(4);
                    }
                    ExecResult::Done
                }
            }
            1 => {
                self.dec_and_read(ctx, self.src_reg);
                ExecResult::WaitScheduler
            }
            2 => {
                ctx.exec.res = ctx.exec.data;
                self.dec_and_read(ctx, self.dest_reg);
                ExecResult::WaitScheduler
            }
            3 => {
                let res = ops::alu(self.inst, ctx.exec.data, ctx.exec.res, self.size, ctx.regs);
                let addr = ctx.regs.a[self.dest_reg as usize];
                if self.size == Size::Long {
                    // LSW, then the pipeline refill, then MSW
                    ctx.scheduler
                        .write(addr.wrapping_add(2), res & 0xFFFF, Size::Word, Order::LswFirst);
                    ctx.scheduler.prefetch_one();
                    ctx.scheduler
                        .write(addr, res >> 16, Size::Word, Order::LswFirst);
                } else {
                    ctx.scheduler.prefetch_one();
                    ctx.scheduler.write(addr, res, self.size, Order::LswFirst);
                }
                ExecResult::Done
            }
            _ => unreachable!(),
        }
    }

    /// Pre-decrement a register and read through it; long reads split with
    /// the second decrement deferred until the first half survives.
    fn dec_and_read(&mut self, ctx: &mut Ctx, reg: u8) {
        match self.size {
            Size::Byte | Size::Word => {
                ctx.regs.dec_addr(reg, self.size);
                let addr = ctx.regs.a[reg as usize];
                ctx.scheduler.read(addr, self.size, ReadTarget::Data);
            }
            Size::Long => {
                ctx.regs.dec_addr(reg, Size::Word);
                let addr = ctx.regs.a[reg as usize];
                ctx.scheduler
                    .read(addr, Size::Word, ReadTarget::DataDecAddr { reg });
                ctx.scheduler
                    .read(addr.wrapping_sub(2), Size::Word, ReadTarget::DataHigh);
            }
        }
    }

    fn unary_handler(&mut self, ctx: &mut Ctx) -> ExecResult {
        match self.next_stage() {
            0 => {
                self.size = if self.inst == InstType::Nbcd {
                    Size::Byte
                } else {
                    self.dec_size()
                };
                self.decode_ea(ctx, self.size);
                ExecResult::WaitScheduler
            }
            1 => {
                let op = ctx.exec.ea.result();
                let value = op.value(self.size, ctx.regs);
                let res = match self.inst {
                    InstType::Neg => ops::neg(value, self.size, ctx.regs),
                    InstType::Negx => ops::negx(value, self.size, ctx.regs),
                    InstType::Not => ops::not(value, self.size, ctx.regs),
                    InstType::Clr => ops::clr(self.size, ctx.regs),
                    InstType::Nbcd => ops::nbcd(value as u8, ctx.regs) as u32,
                    _ => unreachable!(),
                };

                Self::schedule_prefetch_and_write(ctx, &op, res, self.size);
                let wait = if self.inst == InstType::Nbcd {
                    if op.is_data_reg() {
                        2
                    } else {
                        0
                    }
                } else {
                    timings::alu_size(self.inst, self.size, &op)
                };
                ctx.scheduler.wait(wait);
                ExecResult::Done
            }
            _ => unreachable!(),
        }
    }

    fn move_handler(&mut self, ctx: &mut Ctx) -> ExecResult {
        match self.next_stage() {
            0 => {
                self.size = Size::from_move_bits(self.opcode >> 12).expect("validated at decode");
                self.decode_ea(ctx, self.size);
                ExecResult::WaitScheduler
            }
            1 => {
                let src_op = ctx.exec.ea.result();
                let value = src_op.value(self.size, ctx.regs);
                ops::move_flags(value, self.size, ctx.regs);
                ctx.exec.res = value;
                self.schedule_move_write(ctx, src_op.is_pointer())
            }
            _ => unreachable!(),
        }
    }

    fn schedule_move_write(&mut self, ctx: &mut Ctx, src_pointer: bool) -> ExecResult {
        let dst_ea = (self.opcode >> 6) & 0x3F;
        let mode_bits = (dst_ea & 0x7) as u8;
        self.dest_reg = ((dst_ea >> 3) & 0x7) as u8;

        // the destination field stores the register before the mode
        let ea_bits = (mode_bits << 3) | self.dest_reg;

        match mode_bits {
            // decode-driven destinations share the deferred store path
            0b000 | 0b010 | 0b101 | 0b110 => {
                self.decode_ea_via_field(ctx, ea_bits);
                ctx.scheduler.call(CallOp::MoveStore { size: self.size });
                ExecResult::Done
            }
            0b111 if self.dest_reg == 0b000 => {
                self.decode_ea_via_field(ctx, ea_bits);
                ctx.scheduler.call(CallOp::MoveStore { size: self.size });
                ExecResult::Done
            }

            0b011 => {
                let addr = ctx.regs.a[self.dest_reg as usize];
                ctx.scheduler
                    .write(addr, ctx.exec.res, self.size, Order::MswFirst);
                ctx.scheduler.prefetch_one();
                ctx.scheduler.inc_addr_reg(self.dest_reg, self.size);
                ExecResult::Done
            }

            0b100 => {
                ctx.scheduler.prefetch_one();
                if self.size != Size::Long {
                    ctx.regs.dec_addr(self.dest_reg, self.size);
                    let addr = ctx.regs.a[self.dest_reg as usize];
                    ctx.scheduler
                        .write(addr, ctx.exec.res, self.size, Order::LswFirst);
                } else {
                    ctx.regs.dec_addr(self.dest_reg, Size::Word);
                    let addr = ctx.regs.a[self.dest_reg as usize].wrapping_sub(2);
                    ctx.scheduler
                        .write(addr, ctx.exec.res, self.size, Order::LswFirst);
                    ctx.scheduler.dec_addr_reg(self.dest_reg, Size::Word);
                }
                ExecResult::Done
            }

            0b111 if self.dest_reg == 0b001 => {
                // absolute long: the high address word sits in IRC
                ctx.exec.addr = (ctx.regs.irc as u32) << 16;
                ctx.scheduler.read_imm(Size::Word, ReadTarget::Discard);
                ctx.scheduler.call(CallOp::MoveAbsLong {
                    size: self.size,
                    src_pointer,
                });
                ExecResult::Done
            }

            _ => unreachable!("move destination validated at decode"),
        }
    }

    fn decode_ea_via_field(&mut self, ctx: &mut Ctx, ea_bits: u8) {
        ea::schedule_decoding(
            ctx.scheduler,
            ctx.exec,
            ctx.regs,
            ea_bits,
            self.size,
            EaFlags::NO_READ,
        );
    }

    fn moveq_handler(&mut self, ctx: &mut Ctx) -> ExecResult {
        let data = Size::Byte.sign_extend((self.opcode & 0xFF) as u32);
        let reg = ((self.opcode >> 9) & 0x7) as u8;

        ops::move_flags(data, Size::Long, ctx.regs);
        ctx.regs.d[reg as usize] = data;
        ctx.scheduler.prefetch_one();
        ExecResult::Done
    }

    fn movea_handler(&mut self, ctx: &mut Ctx) -> ExecResult {
        match self.next_stage() {
            0 => {
                self.size = if Self::bit_is_set(self.opcode, 12) {
                    Size::Word
                } else {
                    Size::Long
                };
                self.dest_reg = ((self.opcode >> 9) & 0x7) as u8;
                self.decode_ea(ctx, self.size);
                ExecResult::WaitScheduler
            }
            1 => {
                let op = ctx.exec.ea.result();
                let res = self.size.sign_extend(op.value(self.size, ctx.regs));
                ctx.regs.a[self.dest_reg as usize] = res;
                ctx.scheduler.prefetch_one();
                ExecResult::Done
            }
            _ => unreachable!(),
        }
    }

    fn movem_handler(&mut self, ctx: &mut Ctx) -> ExecResult {
        match self.next_stage() {
            0 => {
                self.size = if Self::bit_is_set(self.opcode, 6) {
                    Size::Long
                } else {
                    Size::Word
                };
                self.read_imm(ctx, Size::Word);
                ExecResult::WaitScheduler
            }
            1 => {
                self.src_reg = (self.opcode & 0x7) as u8;
                self.decode_ea_flags(ctx, self.size, EaFlags::NO_READ);
                ExecResult::WaitScheduler
            }
            2 => {
                let mask = (ctx.exec.imm & 0xFFFF) as u16;
                if Self::bit_is_set(self.opcode, 10) {
                    self.movem_memory_to_registers(ctx, mask);
                } else {
                    self.movem_registers_to_memory(ctx, mask);
                }
                ctx.scheduler.prefetch_one();
                ExecResult::Done
            }
            _ => unreachable!(),
        }
    }

    fn movem_registers_to_memory(&mut self, ctx: &mut Ctx, mask: u16) {
        let op = ctx.exec.ea.result();
        let mut addr = op.pointer_address();
        let predec = op.mode == AddressingMode::PreDec;

        let step = self.size.bytes() as i64;
        let (offset, order) = if predec {
            (-step, Order::LswFirst)
        } else {
            (step, Order::MswFirst)
        };

        if predec {
            addr = addr.wrapping_add(offset as u32);
        }

        for i in 0..16u8 {
            if (mask >> i) & 1 == 0 {
                continue;
            }
            // predecrement writes run the register list backwards
            let reg = if predec { 15 - i } else { i };
            let data = if reg >= 8 {
                ctx.regs.a[(reg - 8) as usize]
            } else {
                ctx.regs.d[reg as usize]
            };

            ctx.scheduler.write(addr, data, self.size, order);
            addr = addr.wrapping_add(offset as u32);
        }

        if predec {
            ctx.exec.addr = addr.wrapping_sub(offset as u32);
            ctx.scheduler
                .call(CallOp::SetAddrRegFromAddr { reg: self.src_reg });
        }
    }

    fn movem_memory_to_registers(&mut self, ctx: &mut Ctx, mask: u16) {
        ctx.exec.movem_mask = mask;
        ctx.exec.movem_reg = 0;
        ctx.exec.movem_size = self.size;

        let op = ctx.exec.ea.result();
        let postinc = op.mode == AddressingMode::PostInc;
        if postinc {
            // the register is rewritten at the end, but bump it now so a
            // fault mid-list leaves it moved
            let step = if self.size == Size::Long {
                Size::Word
            } else {
                self.size
            };
            ctx.regs.inc_addr(self.src_reg, step);
        }

        let mut addr = op.pointer_address();
        for i in 0..16u8 {
            if (mask >> i) & 1 == 0 {
                continue;
            }
            ctx.scheduler.read(addr, self.size, ReadTarget::MovemReg);
            addr = addr.wrapping_add(self.size.bytes());
        }

        // one extra word read beyond the list, dropped on the floor
        ctx.scheduler.read(addr, Size::Word, ReadTarget::Discard);

        if postinc {
            ctx.exec.addr = addr;
            ctx.scheduler
                .call(CallOp::SetAddrRegFromAddr { reg: self.src_reg });
        }
    }

    fn movep_handler(&mut self, ctx: &mut Ctx) -> ExecResult {
        match self.next_stage() {
            0 => {
                self.size = if Self::bit_is_set(self.opcode, 6) {
                    Size::Long
                } else {
                    Size::Word
                };
                self.dest_reg = ((self.opcode >> 9) & 0x7) as u8;
                self.src_reg = (self.opcode & 0x7) as u8;
                self.read_imm(ctx, Size::Word);
                ExecResult::WaitScheduler
            }
            1 => {
                let addr = ctx.regs.a[self.src_reg as usize]
                    .wrapping_add(Size::Word.sign_extend(ctx.exec.imm & 0xFFFF));
                ctx.exec.movep_reg = self.dest_reg;
                ctx.exec.movep_size = self.size;

                let bytes: u32 = if self.size == Size::Long { 4 } else { 2 };
                if Self::bit_is_set(self.opcode, 7) {
                    // register to memory: alternate bytes, high first
                    let data = ctx.regs.d[self.dest_reg as usize];
                    for i in 0..bytes {
                        let shift = 8 * (bytes - 1 - i);
                        ctx.scheduler.write(
                            addr.wrapping_add(i * 2),
                            (data >> shift) & 0xFF,
                            Size::Byte,
                            Order::LswFirst,
                        );
                    }
                } else {
                    for i in 0..bytes {
                        ctx.scheduler.read(
                            addr.wrapping_add(i * 2),
                            Size::Byte,
                            ReadTarget::MovepReg,
                        );
                    }
                }

                ctx.scheduler.prefetch_one();
                ExecResult::Done
            }
            _ => unreachable!(),
        }
    }

    fn move_from_sr_handler(&mut self, ctx: &mut Ctx) -> ExecResult {
        match self.next_stage() {
            0 => {
                self.decode_ea(ctx, Size::Word);
                ExecResult::WaitScheduler
            }
            1 => {
                let op = ctx.exec.ea.result();
                let res = ctx.regs.sr as u32;
                Self::schedule_prefetch_and_write(ctx, &op, res, Size::Word);
                ctx.scheduler.wait(timings::move_from_sr(&op));
                ExecResult::Done
            }
            _ => unreachable!(),
        }
    }

    fn move_to_sr_handler(&mut self, ctx: &mut Ctx) -> ExecResult {
        match self.next_stage() {
            0 => {
                self.decode_ea(ctx, Size::Word);
                ExecResult::WaitScheduler
            }
            1 => {
                let op = ctx.exec.ea.result();
                let value = op.value(Size::Word, ctx.regs) as u16;
                ctx.regs.set_sr(value);
                ctx.scheduler.wait(4);
                ctx.scheduler.prefetch_two();
                ExecResult::Done
            }
            _ => unreachable!(),
        }
    }

    fn move_to_ccr_handler(&mut self, ctx: &mut Ctx) -> ExecResult {
        match self.next_stage() {
            0 => {
                self.decode_ea(ctx, Size::Word);
                ExecResult::WaitScheduler
            }
            1 => {
                let op = ctx.exec.ea.result();
                let value = op.value(Size::Word, ctx.regs) as u16;
                ctx.regs.set_ccr(value);
                ctx.scheduler.wait(4);
                ctx.scheduler.prefetch_two();
                ExecResult::Done
            }
            _ => unreachable!(),
        }
    }

    fn move_usp_handler(&mut self, ctx: &mut Ctx) -> ExecResult {
        let reg = (self.opcode & 0x7) as u8;
        if Self::bit_is_set(self.opcode, 3) {
            ctx.regs.a[reg as usize] = ctx.regs.usp();
        } else {
            let value = ctx.regs.a[reg as usize];
            ctx.regs.set_usp(value);
        }
        ctx.scheduler.prefetch_one();
        ExecResult::Done
    }

    fn alu_to_ccr_handler(&mut self, ctx: &mut Ctx) -> ExecResult {
        match self.next_stage() {
            0 => {
                self.read_imm(ctx, Size::Byte);
                ExecResult::WaitScheduler
            }
            1 => {
                let imm = (ctx.exec.imm & 0x1F) as u16;
                let ccr = ctx.regs.sr & 0x1F;
                let new = match self.inst {
                    InstType::AndiToCcr => ccr & imm,
                    InstType::OriToCcr => ccr | imm,
                    InstType::EoriToCcr => ccr ^ imm,
                    _ => unreachable!(),
                };
                ctx.regs.set_ccr(new);
                ctx.scheduler.wait(8);
                ctx.scheduler.prefetch_two();
                ExecResult::Done
            }
            _ => unreachable!(),
        }
    }

    fn alu_to_sr_handler(&mut self, ctx: &mut Ctx) -> ExecResult {
        match self.next_stage() {
            0 => {
                self.read_imm(ctx, Size::Word);
                ExecResult::WaitScheduler
            }
            1 => {
                let imm = (ctx.exec.imm & 0xFFFF) as u16;
                let new = match self.inst {
                    InstType::AndiToSr => ctx.regs.sr & imm,
                    InstType::OriToSr => ctx.regs.sr | imm,
                    InstType::EoriToSr => ctx.regs.sr ^ imm,
                    _ => unreachable!(),
                };
                ctx.regs.set_sr(new);
                ctx.scheduler.wait(8);
                ctx.scheduler.prefetch_two();
                ExecResult::Done
            }
            _ => unreachable!(),
        }
    }

    fn shift_reg_handler(&mut self, ctx: &mut Ctx) -> ExecResult {
        let count_or_reg = ((self.opcode >> 9) & 0x7) as u8;
        let count = if Self::bit_is_set(self.opcode, 5) {
            ctx.regs.d[count_or_reg as usize] % 64
        } else if count_or_reg == 0 {
            8
        } else {
            count_or_reg as u32
        };

        self.size = self.dec_size();
        let reg = (self.opcode & 0x7) as u8;
        let left = Self::bit_is_set(self.opcode, 8);
        let value = ctx.regs.d_read(reg, self.size);

        let res = match self.inst {
            InstType::AslAsrReg => ops::shift(value, count, left, true, self.size, ctx.regs),
            InstType::LslLsrReg => ops::shift(value, count, left, false, self.size, ctx.regs),
            InstType::RolRorReg => ops::rotate(value, count, left, self.size, ctx.regs),
            InstType::RoxReg => ops::rotate_extend(value, count, left, self.size, ctx.regs),
            _ => unreachable!(),
        };
        ctx.regs.d_write(reg, self.size, res);

        ctx.scheduler.prefetch_one();
        ctx.scheduler.wait(timings::reg_shift(count, self.size));
        ExecResult::Done
    }

    fn shift_mem_handler(&mut self, ctx: &mut Ctx) -> ExecResult {
        match self.next_stage() {
            0 => {
                self.decode_ea(ctx, Size::Word);
                ExecResult::WaitScheduler
            }
            1 => {
                let op = ctx.exec.ea.result();
                let left = Self::bit_is_set(self.opcode, 8);
                let value = op.value(Size::Word, ctx.regs);

                let res = match self.inst {
                    InstType::AslAsrMem => ops::shift(value, 1, left, true, Size::Word, ctx.regs),
                    InstType::LslLsrMem => ops::shift(value, 1, left, false, Size::Word, ctx.regs),
                    InstType::RolRorMem => ops::rotate(value, 1, left, Size::Word, ctx.regs),
                    InstType::RoxMem => ops::rotate_extend(value, 1, left, Size::Word, ctx.regs),
                    _ => unreachable!(),
                };

                Self::schedule_prefetch_and_write(ctx, &op, res, Size::Word);
                ExecResult::Done
            }
            _ => unreachable!(),
        }
    }

    fn tst_handler(&mut self, ctx: &mut Ctx) -> ExecResult {
        match self.next_stage() {
            0 => {
                self.size = self.dec_size();
                self.decode_ea(ctx, self.size);
                ExecResult::WaitScheduler
            }
            1 => {
                let op = ctx.exec.ea.result();
                let value = op.value(self.size, ctx.regs);
                ops::move_flags(value, self.size, ctx.regs);
                ctx.scheduler.prefetch_one();
                ExecResult::Done
            }
            _ => unreachable!(),
        }
    }

    fn mul_handler(&mut self, ctx: &mut Ctx) -> ExecResult {
        match self.next_stage() {
            0 => {
                self.decode_ea(ctx, Size::Word);
                ExecResult::WaitScheduler
            }
            1 => {
                let op = ctx.exec.ea.result();
                let reg = ((self.opcode >> 9) & 0x7) as u8;
                let src = op.value(Size::Word, ctx.regs) as u16;
                let dst = ctx.regs.d_read(reg, Size::Word) as u16;

                let res = match self.inst {
                    InstType::Mulu => ops::mulu(src, dst, ctx.regs),
                    InstType::Muls => ops::muls(src, dst, ctx.regs),
                    _ => unreachable!(),
                };
                ctx.regs.d[reg as usize] = res;

                ctx.scheduler.prefetch_one();
                ctx.scheduler.wait(timings::mul(self.inst, src));
                ExecResult::Done
            }
            _ => unreachable!(),
        }
    }

    fn div_handler(&mut self, ctx: &mut Ctx) -> ExecResult {
        match self.next_stage() {
            0 => {
                self.decode_ea(ctx, Size::Word);
                ExecResult::WaitScheduler
            }
            1 => {
                let op = ctx.exec.ea.result();
                let reg = ((self.opcode >> 9) & 0x7) as u8;
                let dividend = ctx.regs.d[reg as usize];
                let divisor = op.value(Size::Word, ctx.regs) as u16;

                if divisor == 0 {
                    ops::div_zero_flags(ctx.regs);
                    ctx.exman.rise_division_by_zero();
                    return ExecResult::Done;
                }

                let res = match self.inst {
                    InstType::Divu => ops::divu(dividend, divisor, ctx.regs),
                    InstType::Divs => ops::divs(dividend, divisor, ctx.regs),
                    _ => unreachable!(),
                };
                ctx.regs.d[reg as usize] = res;

                ctx.scheduler.wait(timings::div(self.inst, dividend, divisor));
                ctx.scheduler.prefetch_one();
                ExecResult::Done
            }
            _ => unreachable!(),
        }
    }

    fn ext_handler(&mut self, ctx: &mut Ctx) -> ExecResult {
        let reg = (self.opcode & 0x7) as u8;
        let to = if Self::bit_is_set(self.opcode, 6) {
            Size::Long
        } else {
            Size::Word
        };
        let res = ops::ext(ctx.regs.d[reg as usize], to, ctx.regs);
        ctx.regs.d_write(reg, to, res);
        ctx.scheduler.prefetch_one();
        ExecResult::Done
    }

    fn exg_handler(&mut self, ctx: &mut Ctx) -> ExecResult {
        let rx = ((self.opcode >> 9) & 0x7) as usize;
        let ry = (self.opcode & 0x7) as usize;
        let opmode = (self.opcode >> 3) & 0x1F;

        match opmode {
            0b01000 => ctx.regs.d.swap(rx, ry),
            0b01001 => ctx.regs.a.swap(rx, ry),
            0b10001 => std::mem::swap(&mut ctx.regs.d[rx], &mut ctx.regs.a[ry]),
            _ => unreachable!("exg opmode validated at decode"),
        }

        ctx.scheduler.prefetch_one();
        ctx.scheduler.wait(timings::exg());
        ExecResult::Done
    }

    fn swap_handler(&mut self, ctx: &mut Ctx) -> ExecResult {
        let reg = (self.opcode & 0x7) as usize;
        ctx.regs.d[reg] = ops::swap(ctx.regs.d[reg], ctx.regs);
        ctx.scheduler.prefetch_one();
        ExecResult::Done
    }

    fn bit_reg_handler(&mut self, ctx: &mut Ctx) -> ExecResult {
        match self.next_stage() {
            0 => {
                self.src_reg = ((self.opcode >> 9) & 0x7) as u8;
                self.decode_ea(ctx, Size::Byte);
                ExecResult::WaitScheduler
            }
            1 => {
                let bit_number = (ctx.regs.d[self.src_reg as usize] & 0xFF) as u8;
                self.finish_bit_op(ctx, bit_number)
            }
            _ => unreachable!(),
        }
    }

    fn bit_imm_handler(&mut self, ctx: &mut Ctx) -> ExecResult {
        match self.next_stage() {
            0 => {
                self.read_imm(ctx, Size::Word);
                ExecResult::WaitScheduler
            }
            1 => {
                self.decode_ea(ctx, Size::Byte);
                ExecResult::WaitScheduler
            }
            2 => {
                let bit_number = (ctx.exec.imm & 0xFF) as u8;
                self.finish_bit_op(ctx, bit_number)
            }
            _ => unreachable!(),
        }
    }

    /// Shared tail of the bit instructions: `n mod 32` against registers
    /// (long operand), `n mod 8` against memory (byte operand).
    fn finish_bit_op(&mut self, ctx: &mut Ctx, bit_number: u8) -> ExecResult {
        let op = ctx.exec.ea.result();
        let is_test = matches!(self.inst, InstType::BtstReg | InstType::BtstImm);

        if op.is_data_reg() {
            let bit = bit_number % 32;
            let reg = op.reg();
            let value = ctx.regs.d[reg as usize];
            let res = match self.inst {
                InstType::BtstReg | InstType::BtstImm => {
                    ops::btst(value, bit, ctx.regs);
                    value
                }
                InstType::BsetReg | InstType::BsetImm => ops::bset(value, bit, ctx.regs),
                InstType::BclrReg | InstType::BclrImm => ops::bclr(value, bit, ctx.regs),
                InstType::BchgReg | InstType::BchgImm => ops::bchg(value, bit, ctx.regs),
                _ => unreachable!(),
            };
            if !is_test {
                ctx.regs.d[reg as usize] = res;
            }
            ctx.scheduler.prefetch_one();
            let wait = if is_test {
                timings::btst(&op)
            } else {
                timings::bit(self.inst, &op, bit)
            };
            ctx.scheduler.wait(wait);
        } else {
            let bit = bit_number % 8;
            let value = op.value(Size::Byte, ctx.regs);
            let res = match self.inst {
                InstType::BtstReg | InstType::BtstImm => {
                    ops::btst(value, bit, ctx.regs);
                    value
                }
                InstType::BsetReg | InstType::BsetImm => ops::bset(value, bit, ctx.regs),
                InstType::BclrReg | InstType::BclrImm => ops::bclr(value, bit, ctx.regs),
                InstType::BchgReg | InstType::BchgImm => ops::bchg(value, bit, ctx.regs),
                _ => unreachable!(),
            };
            if is_test {
                ctx.scheduler.prefetch_one();
            } else {
                Self::schedule_prefetch_and_write(ctx, &op, res, Size::Byte);
            }
        }
        ExecResult::Done
    }

    fn rte_handler(&mut self, ctx: &mut Ctx) -> ExecResult {
        let sp = ctx.regs.a[7];
        ctx.scheduler
            .read(sp.wrapping_add(2), Size::Word, ReadTarget::PcHigh);
        ctx.scheduler.read(sp, Size::Word, ReadTarget::SrTemp);
        ctx.scheduler
            .read(sp.wrapping_add(4), Size::Word, ReadTarget::PcLowCommitSr);
        ctx.scheduler.prefetch_two();
        ExecResult::Done
    }

    fn rtr_handler(&mut self, ctx: &mut Ctx) -> ExecResult {
        let sp = ctx.regs.a[7];
        ctx.scheduler
            .read(sp.wrapping_add(2), Size::Word, ReadTarget::PcHigh);
        ctx.scheduler.read(sp, Size::Word, ReadTarget::CcrTemp);
        ctx.scheduler
            .read(sp.wrapping_add(4), Size::Word, ReadTarget::PcLowCommitSr);
        ctx.scheduler.prefetch_two();
        ExecResult::Done
    }

    fn rts_handler(&mut self, ctx: &mut Ctx) -> ExecResult {
        ctx.scheduler
            .read(ctx.regs.a[7], Size::Long, ReadTarget::PcRts);
        ctx.scheduler.prefetch_two();
        ExecResult::Done
    }

    fn jmp_handler(&mut self, ctx: &mut Ctx) -> ExecResult {
        match self.next_stage() {
            0 => {
                self.decode_ea_flags(ctx, Size::Long, EaFlags::NO_READ_NO_PREFETCH);
                ExecResult::WaitScheduler
            }
            1 => {
                ctx.regs.pc = ctx.exec.ea.result().pointer_address();
                ctx.scheduler.prefetch_two();
                ExecResult::Done
            }
            _ => unreachable!(),
        }
    }

    fn chk_handler(&mut self, ctx: &mut Ctx) -> ExecResult {
        match self.next_stage() {
            0 => {
                self.decode_ea(ctx, Size::Word);
                ExecResult::WaitScheduler
            }
            1 => {
                let op = ctx.exec.ea.result();
                let reg = ((self.opcode >> 9) & 0x7) as u8;
                let bound = op.value(Size::Word, ctx.regs) as u16;
                let value = ctx.regs.d_read(reg, Size::Word) as u16;

                let rise = ops::chk(bound, value, ctx.regs);

                ctx.scheduler.prefetch_one();
                ctx.scheduler.wait(timings::chk(bound, value));
                if rise {
                    ctx.exman.rise_chk();
                }
                ExecResult::Done
            }
            _ => unreachable!(),
        }
    }

    fn jsr_handler(&mut self, ctx: &mut Ctx) -> ExecResult {
        match self.next_stage() {
            0 => {
                self.decode_ea_flags(ctx, Size::Long, EaFlags::NO_READ_NO_PREFETCH);
                ExecResult::WaitScheduler
            }
            1 => {
                // PC already advanced over the extension words, so it is the
                // return address
                let return_pc = ctx.regs.pc;
                ctx.regs.pc = ctx.exec.ea.result().pointer_address();

                ctx.scheduler.prefetch_ird();
                ctx.scheduler.push_long(return_pc);
                ctx.scheduler.prefetch_irc();
                ExecResult::Done
            }
            _ => unreachable!(),
        }
    }

    fn bsr_handler(&mut self, ctx: &mut Ctx) -> ExecResult {
        let mut disp = Size::Byte.sign_extend((self.opcode & 0xFF) as u32);
        let mut return_pc = ctx.regs.pc;
        if disp == 0 {
            disp = Size::Word.sign_extend(ctx.regs.irc as u32);
            return_pc = return_pc.wrapping_add(2);
        }

        ctx.regs.pc = ctx.regs.pc.wrapping_add(disp);

        ctx.scheduler.wait(timings::bsr());
        ctx.scheduler.push_long(return_pc);
        ctx.scheduler.prefetch_two();
        ExecResult::Done
    }

    fn lea_handler(&mut self, ctx: &mut Ctx) -> ExecResult {
        match self.next_stage() {
            0 => {
                self.decode_ea_flags(ctx, Size::Long, EaFlags::NO_READ);
                ExecResult::WaitScheduler
            }
            1 => {
                let op = ctx.exec.ea.result();
                let reg = ((self.opcode >> 9) & 0x7) as u8;
                ctx.scheduler.wait(timings::lea(op.mode));
                ctx.regs.a[reg as usize] = op.pointer_address();
                ctx.scheduler.prefetch_one();
                ExecResult::Done
            }
            _ => unreachable!(),
        }
    }

    fn pea_handler(&mut self, ctx: &mut Ctx) -> ExecResult {
        match self.next_stage() {
            0 => {
                self.decode_ea_flags(ctx, Size::Long, EaFlags::NO_READ);
                ExecResult::WaitScheduler
            }
            1 => {
                let op = ctx.exec.ea.result();
                ctx.scheduler.wait(timings::pea(op.mode));

                let addr = op.pointer_address();
                let prefetch_after_push = matches!(
                    op.mode,
                    AddressingMode::AbsShort | AddressingMode::AbsLong
                );

                if !prefetch_after_push {
                    ctx.scheduler.prefetch_one();
                }
                ctx.scheduler.push_long(addr);
                if prefetch_after_push {
                    ctx.scheduler.prefetch_one();
                }
                ExecResult::Done
            }
            _ => unreachable!(),
        }
    }

    fn link_handler(&mut self, ctx: &mut Ctx) -> ExecResult {
        match self.next_stage() {
            0 => {
                self.read_imm(ctx, Size::Word);
                ExecResult::WaitScheduler
            }
            1 => {
                let reg = (self.opcode & 0x7) as u8;

                ctx.regs.a[7] = ctx.regs.a[7].wrapping_sub(4);
                let frame = ctx.regs.a[7];

                ctx.scheduler.write(
                    frame,
                    ctx.regs.a[reg as usize],
                    Size::Long,
                    Order::MswFirst,
                );
                ctx.regs.a[reg as usize] = frame;
                ctx.scheduler.call(CallOp::AddSpImm);
                ctx.scheduler.prefetch_one();
                ExecResult::Done
            }
            _ => unreachable!(),
        }
    }

    fn unlk_handler(&mut self, ctx: &mut Ctx) -> ExecResult {
        let reg = (self.opcode & 0x7) as u8;
        ctx.regs.a[7] = ctx.regs.a[reg as usize];
        ctx.scheduler
            .read(ctx.regs.a[7], Size::Long, ReadTarget::UnlkReg { reg });
        ctx.scheduler.prefetch_one();
        ExecResult::Done
    }

    fn bcc_handler(&mut self, ctx: &mut Ctx) -> ExecResult {
        let cc = ((self.opcode >> 8) & 0xF) as u8;
        let disp8 = Size::Byte.sign_extend((self.opcode & 0xFF) as u32);
        let word_sized = disp8 == 0;
        let disp = if word_sized {
            Size::Word.sign_extend(ctx.regs.irc as u32)
        } else {
            disp8
        };

        let cond = ops::cond_test(cc, ctx.regs);
        ctx.scheduler.wait(timings::bcc(cond));

        if cond {
            ctx.regs.pc = ctx.regs.pc.wrapping_add(disp);
        }

        if cond || word_sized {
            if !cond {
                ctx.regs.pc = ctx.regs.pc.wrapping_add(2);
            }
            ctx.scheduler.prefetch_two();
        } else {
            ctx.scheduler.prefetch_one();
        }
        ExecResult::Done
    }

    fn dbcc_handler(&mut self, ctx: &mut Ctx) -> ExecResult {
        let cc = ((self.opcode >> 8) & 0xF) as u8;
        let disp = Size::Word.sign_extend(ctx.regs.irc as u32);
        let reg = (self.opcode & 0x7) as u8;

        let cond = ops::cond_test(cc, ctx.regs);
        ctx.scheduler.wait(timings::dbcc(cond));

        if cond {
            ctx.regs.pc = ctx.regs.pc.wrapping_add(2);
        } else {
            let counter = (ctx.regs.d_read(reg, Size::Word) as u16).wrapping_sub(1);
            ctx.regs.d_write(reg, Size::Word, counter as u32);
            if counter as i16 != -1 {
                ctx.regs.pc = ctx.regs.pc.wrapping_add(disp);
            } else {
                ctx.regs.pc = ctx.regs.pc.wrapping_add(2);
            }
        }

        ctx.scheduler.prefetch_two();
        ExecResult::Done
    }

    fn scc_handler(&mut self, ctx: &mut Ctx) -> ExecResult {
        match self.next_stage() {
            0 => {
                self.decode_ea(ctx, Size::Byte);
                ExecResult::WaitScheduler
            }
            1 => {
                let cc = ((self.opcode >> 8) & 0xF) as u8;
                let cond = ops::cond_test(cc, ctx.regs);
                let res = if cond { 0xFF } else { 0x00 };

                let op = ctx.exec.ea.result();
                Self::schedule_prefetch_and_write(ctx, &op, res, Size::Byte);
                ctx.scheduler.wait(timings::scc(cond, &op));
                ExecResult::Done
            }
            _ => unreachable!(),
        }
    }

    fn bcd_reg_handler(&mut self, ctx: &mut Ctx) -> ExecResult {
        let src = ctx.regs.d_read((self.opcode & 0x7) as u8, Size::Byte) as u8;
        let dest_reg = ((self.opcode >> 9) & 0x7) as u8;
        let dst = ctx.regs.d_read(dest_reg, Size::Byte) as u8;

        let res = match self.inst {
            InstType::AbcdReg => ops::abcd(src, dst, ctx.regs),
            _ => ops::sbcd(src, dst, ctx.regs),
        };
        ctx.regs.d_write(dest_reg, Size::Byte, res as u32);

        ctx.scheduler.prefetch_one();
        ctx.scheduler.wait(timings::bcd_reg());
        ExecResult::Done
    }

    fn bcd_mem_handler(&mut self, ctx: &mut Ctx) -> ExecResult {
        match self.next_stage() {
            0 => {
                self.src_reg = (self.opcode & 0x7) as u8;
                self.dest_reg = ((self.opcode >> 9) & 0x7) as u8;

                ctx.scheduler.wait(2);
                ctx.regs.dec_addr(self.src_reg, Size::Byte);
                ctx.scheduler.read(
                    ctx.regs.a[self.src_reg as usize],
                    Size::Byte,
                    ReadTarget::Data,
                );
                ExecResult::WaitScheduler
            }
            1 => {
                ctx.exec.res = ctx.exec.data;
                ctx.regs.dec_addr(self.dest_reg, Size::Byte);
                ctx.scheduler.read(
                    ctx.regs.a[self.dest_reg as usize],
                    Size::Byte,
                    ReadTarget::Data,
                );
                ExecResult::WaitScheduler
            }
            2 => {
                let src = ctx.exec.res as u8;
                let dst = ctx.exec.data as u8;
                let res = match self.inst {
                    InstType::AbcdMem => ops::abcd(src, dst, ctx.regs),
                    _ => ops::sbcd(src, dst, ctx.regs),
                };

                ctx.scheduler.prefetch_one();
                ctx.scheduler.write(
                    ctx.regs.a[self.dest_reg as usize],
                    res as u32,
                    Size::Byte,
                    Order::LswFirst,
                );
                ExecResult::Done
            }
            _ => unreachable!(),
        }
    }

    fn reset_handler(&mut self, ctx: &mut Ctx) -> ExecResult {
        ctx.bus.set(BusLine::Reset);
        ctx.scheduler.wait(timings::reset());
        ctx.scheduler.call(CallOp::ClearReset);
        ctx.scheduler.prefetch_one();
        ExecResult::Done
    }

    fn tas_handler(&mut self, ctx: &mut Ctx) -> ExecResult {
        match self.exec_stage {
            0 => {
                self.exec_stage += 1;
                self.decode_ea_flags(ctx, Size::Byte, EaFlags::NO_READ);
                ExecResult::WaitScheduler
            }
            1 => {
                let op = ctx.exec.ea.result();
                if op.is_data_reg() {
                    let reg = op.reg();
                    let value = ctx.regs.d_read(reg, Size::Byte) as u8;
                    let res = ops::tas(value, ctx.regs);
                    ctx.regs.d_write(reg, Size::Byte, res as u32);
                    ctx.scheduler.prefetch_one();
                    return ExecResult::Done;
                }

                self.exec_stage += 1;
                ctx.exec.addr = op.pointer_address();

                let reg = (self.opcode & 0x7) as u8;
                match op.mode {
                    AddressingMode::PostInc => {
                        ctx.regs.inc_addr(reg, Size::Byte);
                    }
                    AddressingMode::PreDec => {
                        ctx.scheduler.wait(2);
                        ctx.regs.dec_addr(reg, Size::Byte);
                        ctx.exec.addr = ctx.regs.a[reg as usize];
                        return ExecResult::WaitScheduler;
                    }
                    _ => {}
                }
                self.tas_handler(ctx)
            }
            2 => {
                ctx.busm.init_read_modify_write(ctx.exec.addr, RmwModify::Tas);
                self.exec_stage += 1;
                ExecResult::InProgress
            }
            3 => {
                if !ctx.busm.is_idle() {
                    return ExecResult::InProgress;
                }
                ctx.scheduler.prefetch_one();
                ExecResult::Done
            }
            _ => unreachable!(),
        }
    }

    fn stop_handler(&mut self, ctx: &mut Ctx) -> ExecResult {
        match self.next_stage() {
            0 => {
                self.read_imm(ctx, Size::Word);
                ExecResult::WaitScheduler
            }
            1 => {
                ctx.regs.set_sr((ctx.exec.imm & 0xFFFF) as u16);
                self.stopped = true;
                ExecResult::Done
            }
            _ => unreachable!(),
        }
    }

    fn next_stage(&mut self) -> u8 {
        let stage = self.exec_stage;
        self.exec_stage += 1;
        stage
    }
}

impl Default for InstructionUnit {
    fn default() -> Self {
        Self::new()
    }
}
