//! Effective-address decoding
//!
//! The low six bits of an opcode select one of eleven addressing modes plus
//! immediate data. Decoding schedules the extension-word consumption, any
//! idle cycles and the operand read onto the bus scheduler; the decoded
//! [`Operand`] lands in the shared execution context once the scheduler
//! drains.

use super::registers::{RegisterFile, Size};
use super::scheduler::{BusScheduler, ExecContext};

/// Addressing modes as named by the timing tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddressingMode {
    /// Dn
    DataReg,
    /// An
    AddrReg,
    /// (An)
    Indirect,
    /// (An)+
    PostInc,
    /// -(An)
    PreDec,
    /// (d16,An)
    Disp16,
    /// (d8,An,Xn)
    Index8,
    /// (xxx).W
    AbsShort,
    /// (xxx).L
    AbsLong,
    /// (d16,PC)
    PcDisp16,
    /// (d8,PC,Xn)
    PcIndex8,
    /// #imm
    Immediate,
}

impl AddressingMode {
    /// Decode from the 3-bit mode and 3-bit register fields.
    pub fn from_bits(mode: u8, reg: u8) -> Option<Self> {
        match mode & 0x7 {
            0b000 => Some(Self::DataReg),
            0b001 => Some(Self::AddrReg),
            0b010 => Some(Self::Indirect),
            0b011 => Some(Self::PostInc),
            0b100 => Some(Self::PreDec),
            0b101 => Some(Self::Disp16),
            0b110 => Some(Self::Index8),
            0b111 => match reg & 0x7 {
                0b000 => Some(Self::AbsShort),
                0b001 => Some(Self::AbsLong),
                0b010 => Some(Self::PcDisp16),
                0b011 => Some(Self::PcIndex8),
                0b100 => Some(Self::Immediate),
                _ => None,
            },
            _ => unreachable!(),
        }
    }
}

/// Effective-address mode classes used by the opcode table for validity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EaClass {
    None,
    All,
    /// All except An direct.
    Data,
    /// Data except PC-relative and immediate.
    DataAlterable,
    /// Data except immediate.
    DataExceptImm,
    /// All except PC-relative and immediate.
    Alterable,
    /// Alterable except register direct.
    MemoryAlterable,
    /// All except register direct, postinc/predec and immediate.
    Control,
    /// MOVEM to memory: control alterable plus -(An).
    Predecrement,
    /// MOVEM to registers: control plus (An)+.
    Postincrement,
}

impl EaClass {
    pub fn allows(self, mode: AddressingMode) -> bool {
        use AddressingMode::*;
        match self {
            EaClass::None => false,
            EaClass::All => true,
            EaClass::Data => mode != AddrReg,
            EaClass::DataAlterable => !matches!(mode, AddrReg | PcDisp16 | PcIndex8 | Immediate),
            EaClass::DataExceptImm => !matches!(mode, AddrReg | Immediate),
            EaClass::Alterable => !matches!(mode, PcDisp16 | PcIndex8 | Immediate),
            EaClass::MemoryAlterable => {
                !matches!(mode, DataReg | AddrReg | PcDisp16 | PcIndex8 | Immediate)
            }
            EaClass::Control => matches!(
                mode,
                Indirect | Disp16 | Index8 | AbsShort | AbsLong | PcDisp16 | PcIndex8
            ),
            EaClass::Predecrement => matches!(
                mode,
                Indirect | PreDec | Disp16 | Index8 | AbsShort | AbsLong
            ),
            EaClass::Postincrement => matches!(
                mode,
                Indirect | PostInc | Disp16 | Index8 | AbsShort | AbsLong | PcDisp16 | PcIndex8
            ),
        }
    }
}

/// A decoded operand. Register carriers are indices into the register file,
/// never owning pointers; `value` is the operand value read during decoding
/// (zero when decoding ran with `NO_READ`).
#[derive(Debug, Clone, Copy)]
pub struct Operand {
    pub mode: AddressingMode,
    pub kind: OperandKind,
    pub value: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperandKind {
    DataReg(u8),
    AddrReg(u8),
    Pointer(u32),
    Immediate(u32),
}

impl Operand {
    pub fn is_data_reg(&self) -> bool {
        matches!(self.kind, OperandKind::DataReg(_))
    }

    pub fn is_addr_reg(&self) -> bool {
        matches!(self.kind, OperandKind::AddrReg(_))
    }

    pub fn is_pointer(&self) -> bool {
        matches!(self.kind, OperandKind::Pointer(_))
    }

    pub fn is_imm(&self) -> bool {
        matches!(self.kind, OperandKind::Immediate(_))
    }

    pub fn reg(&self) -> u8 {
        match self.kind {
            OperandKind::DataReg(r) | OperandKind::AddrReg(r) => r,
            _ => panic!("operand has no register"),
        }
    }

    pub fn pointer_address(&self) -> u32 {
        match self.kind {
            OperandKind::Pointer(addr) => addr,
            OperandKind::Immediate(addr) => addr,
            _ => panic!("operand has no address"),
        }
    }

    /// The operand value for the given size, re-reading registers so writes
    /// between decode and use are observed.
    pub fn value(&self, size: Size, regs: &RegisterFile) -> u32 {
        match self.kind {
            OperandKind::DataReg(r) => regs.d_read(r, size),
            OperandKind::AddrReg(r) => regs.a_read(r, size),
            OperandKind::Pointer(_) | OperandKind::Immediate(_) => self.value & size.mask(),
        }
    }
}

/// Decoding options.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct EaFlags {
    /// Produce the address only; skip the operand read.
    pub no_read: bool,
    /// Consume extension words without refilling IRC (JMP/JSR).
    pub no_prefetch: bool,
}

impl EaFlags {
    pub const NONE: EaFlags = EaFlags {
        no_read: false,
        no_prefetch: false,
    };
    pub const NO_READ: EaFlags = EaFlags {
        no_read: true,
        no_prefetch: false,
    };
    pub const NO_READ_NO_PREFETCH: EaFlags = EaFlags {
        no_read: true,
        no_prefetch: true,
    };
}

/// In-flight decode state; lives in the shared execution context.
#[derive(Debug, Clone, Copy)]
pub struct EaState {
    pub mode: AddressingMode,
    pub reg: u8,
    pub size: Size,
    pub flags: EaFlags,
    /// Resolved memory address, filled in as extension words arrive.
    pub ptr: u32,
    pub result: Option<Operand>,
}

impl EaState {
    pub fn new() -> Self {
        Self {
            mode: AddressingMode::DataReg,
            reg: 0,
            size: Size::Word,
            flags: EaFlags::NONE,
            ptr: 0,
            result: None,
        }
    }

    pub fn reset(&mut self) {
        self.result = None;
        self.ptr = 0;
    }

    pub fn result(&self) -> Operand {
        self.result.expect("ea decoder: result is not available")
    }
}

impl Default for EaState {
    fn default() -> Self {
        Self::new()
    }
}

/// Deferred decode steps executed inline by the scheduler once the ops ahead
/// of them drain. Each consumes the extension word sitting in IRC.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EaCall {
    /// -(An): decrement the register, then read from it.
    DecAndRead,
    /// (d16,An)
    DispAn,
    /// (d8,An,Xn)
    IndexAn,
    /// (xxx).W
    AbsShort,
    /// (xxx).L first extension word
    AbsLongHigh,
    /// (xxx).L second extension word, then read
    AbsLongLow,
    /// (d16,PC)
    DispPc,
    /// (d8,PC,Xn)
    PcIndex,
    /// #imm byte/word
    ImmWord,
    /// #imm long, first extension word
    ImmLongHigh,
    /// #imm long, second extension word
    ImmLongLow,
    /// Terminal step: operand read or bare address, after the extension
    /// words have resolved the pointer.
    FinishPointer,
}

/// Start decoding `ea_bits` (mode in bits 3-5, register in bits 0-2).
///
/// Register-direct operands resolve synchronously; everything else lands on
/// the scheduler. The caller waits for the scheduler to drain before using
/// the result.
pub fn schedule_decoding(
    scheduler: &mut BusScheduler,
    exec: &mut ExecContext,
    regs: &mut RegisterFile,
    ea_bits: u8,
    size: Size,
    flags: EaFlags,
) {
    let reg = ea_bits & 0x7;
    let mode_bits = (ea_bits >> 3) & 0x7;
    let mode = AddressingMode::from_bits(mode_bits, reg)
        .unwrap_or_else(|| panic!("unknown ea mode bits {:#04X}", ea_bits));

    exec.ea = EaState {
        mode,
        reg,
        size,
        flags,
        ptr: 0,
        result: None,
    };

    match mode {
        AddressingMode::DataReg => {
            exec.ea.result = Some(Operand {
                mode,
                kind: OperandKind::DataReg(reg),
                value: regs.d_read(reg, size),
            });
        }

        AddressingMode::AddrReg => {
            exec.ea.result = Some(Operand {
                mode,
                kind: OperandKind::AddrReg(reg),
                value: regs.a_read(reg, size),
            });
        }

        AddressingMode::Indirect => {
            exec.ea.ptr = regs.a[reg as usize];
            finish_pointer(scheduler, exec);
        }

        AddressingMode::PostInc => {
            exec.ea.ptr = regs.a[reg as usize];
            if !flags.no_read {
                regs.inc_addr(reg, size);
            }
            finish_pointer(scheduler, exec);
        }

        AddressingMode::PreDec => {
            if flags.no_read {
                // the owner of the operand performs the decrement itself
                exec.ea.ptr = regs.a[reg as usize];
                finish_pointer(scheduler, exec);
            } else {
                scheduler.wait(2);
                scheduler.ea_call(EaCall::DecAndRead);
            }
        }

        AddressingMode::Disp16 => {
            scheduler.ea_call(EaCall::DispAn);
            consume_irc(scheduler, exec);
        }

        AddressingMode::Index8 => {
            scheduler.wait(2);
            scheduler.ea_call(EaCall::IndexAn);
            consume_irc(scheduler, exec);
        }

        AddressingMode::AbsShort => {
            scheduler.ea_call(EaCall::AbsShort);
            consume_irc(scheduler, exec);
        }

        AddressingMode::AbsLong => {
            scheduler.ea_call(EaCall::AbsLongHigh);
            consume_irc_mid(scheduler, exec);
            scheduler.ea_call(EaCall::AbsLongLow);
            consume_irc(scheduler, exec);
        }

        AddressingMode::PcDisp16 => {
            scheduler.ea_call(EaCall::DispPc);
            consume_irc(scheduler, exec);
        }

        AddressingMode::PcIndex8 => {
            scheduler.wait(2);
            scheduler.ea_call(EaCall::PcIndex);
            consume_irc(scheduler, exec);
        }

        AddressingMode::Immediate => match size {
            Size::Byte | Size::Word => {
                scheduler.ea_call(EaCall::ImmWord);
                scheduler.prefetch_irc_advance();
            }
            Size::Long => {
                scheduler.ea_call(EaCall::ImmLongHigh);
                scheduler.prefetch_irc_advance();
                scheduler.ea_call(EaCall::ImmLongLow);
                scheduler.prefetch_irc_advance();
            }
        },
    }
}

/// IRC was consumed by the preceding call op; refill it (unless the caller
/// asked not to) and finish with the pointer read.
fn consume_irc(scheduler: &mut BusScheduler, exec: &mut ExecContext) {
    if exec.ea.flags.no_prefetch {
        scheduler.ea_call_advance_pc();
    } else {
        scheduler.prefetch_irc_advance();
    }
    scheduler.ea_call(EaCall::FinishPointer);
}

/// Same, for an extension word in the middle of the mode (abs.l high half).
/// The next word still has to arrive from the bus even when the caller
/// skips the final refill, so this one always fetches.
fn consume_irc_mid(scheduler: &mut BusScheduler, _exec: &mut ExecContext) {
    scheduler.prefetch_irc_advance();
}

/// Queue the final pointer step: either the operand read or a bare address.
fn finish_pointer(scheduler: &mut BusScheduler, exec: &mut ExecContext) {
    if exec.ea.flags.no_read {
        set_pointer_result(exec);
    } else {
        scheduler.read_ea();
    }
}

pub(super) fn set_pointer_result(exec: &mut ExecContext) {
    exec.ea.result = Some(Operand {
        mode: exec.ea.mode,
        kind: OperandKind::Pointer(exec.ea.ptr),
        value: 0,
    });
}

/// Store the completed operand read.
pub(super) fn complete_read(exec: &mut ExecContext, data: u32) {
    exec.ea.result = Some(Operand {
        mode: exec.ea.mode,
        kind: OperandKind::Pointer(exec.ea.ptr),
        value: data & exec.ea.size.mask(),
    });
}

/// Execute one deferred decode step. Runs inline inside the scheduler with
/// the extension word available in IRC.
pub(super) fn run_call(
    scheduler: &mut BusScheduler,
    exec: &mut ExecContext,
    regs: &mut RegisterFile,
    call: EaCall,
) {
    match call {
        EaCall::DecAndRead => {
            regs.dec_addr(exec.ea.reg, exec.ea.size);
            exec.ea.ptr = regs.a[exec.ea.reg as usize];
            finish_pointer(scheduler, exec);
        }

        EaCall::DispAn => {
            exec.ea.ptr = regs.a[exec.ea.reg as usize]
                .wrapping_add(Size::Word.sign_extend(regs.irc as u32));
        }

        EaCall::IndexAn => {
            exec.ea.ptr = brief_extension_address(regs, regs.a[exec.ea.reg as usize]);
        }

        EaCall::AbsShort => {
            exec.ea.ptr = Size::Word.sign_extend(regs.irc as u32);
        }

        EaCall::AbsLongHigh => {
            exec.ea.ptr = (regs.irc as u32) << 16;
        }

        EaCall::AbsLongLow => {
            exec.ea.ptr |= regs.irc as u32;
        }

        EaCall::DispPc => {
            exec.ea.ptr = regs.pc.wrapping_add(Size::Word.sign_extend(regs.irc as u32));
        }

        EaCall::PcIndex => {
            exec.ea.ptr = brief_extension_address(regs, regs.pc);
        }

        EaCall::ImmWord => {
            exec.ea.result = Some(Operand {
                mode: AddressingMode::Immediate,
                kind: OperandKind::Immediate(regs.pc),
                value: (regs.irc as u32) & exec.ea.size.mask(),
            });
        }

        EaCall::ImmLongHigh => {
            exec.ea.ptr = (regs.irc as u32) << 16;
        }

        EaCall::ImmLongLow => {
            exec.ea.result = Some(Operand {
                mode: AddressingMode::Immediate,
                kind: OperandKind::Immediate(regs.pc),
                value: exec.ea.ptr | regs.irc as u32,
            });
        }

        EaCall::FinishPointer => {
            finish_pointer(scheduler, exec);
        }
    }
}

/// Brief extension word: displacement in the low byte, index register number
/// in bits 12-14, D/A select in bit 15, word/long select in bit 11.
fn brief_extension_address(regs: &RegisterFile, base: u32) -> u32 {
    let ext = regs.irc;
    let disp = Size::Byte.sign_extend((ext & 0xFF) as u32);
    let idx_reg = ((ext >> 12) & 0x7) as u8;
    let is_addr = (ext & 0x8000) != 0;
    let is_long = (ext & 0x0800) != 0;

    let raw = if is_addr {
        regs.a[idx_reg as usize]
    } else {
        regs.d[idx_reg as usize]
    };
    let index = if is_long {
        raw
    } else {
        Size::Word.sign_extend(raw)
    };

    base.wrapping_add(disp).wrapping_add(index)
}
