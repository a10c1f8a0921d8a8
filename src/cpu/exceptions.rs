//! M68K exception bookkeeping
//!
//! The [`ExceptionManager`] is a bitset of raised exceptions with side
//! storage for the bundles some kinds carry (address/bus error fault info,
//! TRAP vectors). Raising is done by the bus manager, the instruction unit
//! and the interrupt riser; the exception unit accepts and processes them.

/// Exception kinds, grouped by priority.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExceptionKind {
    /* group 0 - interrupts the current bus cycle */
    Reset,
    AddressError,
    BusError,

    /* group 1 - checked at instruction boundary */
    Trace,
    Interrupt,
    IllegalInstruction,
    LineA,
    LineF,
    PrivilegeViolation,

    /* group 2 - checked at instruction boundary, serviced before group 1 */
    Trap,
    TrapV,
    ChkInstruction,
    DivisionByZero,
}

pub const EXCEPTION_COUNT: usize = 13;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExceptionGroup {
    Group0,
    Group1,
    Group2,
}

impl ExceptionKind {
    pub fn group(self) -> ExceptionGroup {
        use ExceptionKind::*;
        match self {
            Reset | AddressError | BusError => ExceptionGroup::Group0,
            Trace | Interrupt | IllegalInstruction | LineA | LineF | PrivilegeViolation => {
                ExceptionGroup::Group1
            }
            Trap | TrapV | ChkInstruction | DivisionByZero => ExceptionGroup::Group2,
        }
    }

    /// Exception vector number. Interrupts negotiate theirs on the bus and
    /// TRAP carries its own, so neither goes through here.
    pub fn vector(self) -> u32 {
        use ExceptionKind::*;
        match self {
            Reset => 0,
            BusError => 2,
            AddressError => 3,
            IllegalInstruction => 4,
            DivisionByZero => 5,
            ChkInstruction => 6,
            TrapV => 7,
            PrivilegeViolation => 8,
            Trace => 9,
            LineA => 10,
            LineF => 11,
            Interrupt | Trap => panic!("vector for {:?} is negotiated, not fixed", self),
        }
    }

    fn bit(self) -> u16 {
        use ExceptionKind::*;
        let idx = match self {
            Reset => 0,
            AddressError => 1,
            BusError => 2,
            Trace => 3,
            Interrupt => 4,
            IllegalInstruction => 5,
            LineA => 6,
            LineF => 7,
            PrivilegeViolation => 8,
            Trap => 9,
            TrapV => 10,
            ChkInstruction => 11,
            DivisionByZero => 12,
        };
        1 << idx
    }
}

/// Acceptance order inside each group.
pub const GROUP_0: [ExceptionKind; 3] = [
    ExceptionKind::Reset,
    ExceptionKind::AddressError,
    ExceptionKind::BusError,
];

pub const GROUP_1: [ExceptionKind; 6] = [
    ExceptionKind::Trace,
    ExceptionKind::Interrupt,
    ExceptionKind::IllegalInstruction,
    ExceptionKind::LineA,
    ExceptionKind::LineF,
    ExceptionKind::PrivilegeViolation,
];

pub const GROUP_2: [ExceptionKind; 4] = [
    ExceptionKind::Trap,
    ExceptionKind::TrapV,
    ExceptionKind::ChkInstruction,
    ExceptionKind::DivisionByZero,
];

/// Fault bundle carried by address and bus errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FaultInfo {
    /// Offending address.
    pub address: u32,
    /// Function codes at the time of the fault.
    pub func_codes: u8,
    /// True for a read cycle.
    pub read: bool,
    /// True when the access was in program space.
    pub in_program: bool,
}

/// Bitset of raised exceptions plus bundle storage.
#[derive(Debug, Default)]
pub struct ExceptionManager {
    raised: u16,
    addr_error: Option<FaultInfo>,
    bus_error: Option<FaultInfo>,
    trap_vector: Option<u8>,
}

impl ExceptionManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Raise an exception. Raising a kind that is already pending is a
    /// modeling error.
    pub fn rise(&mut self, kind: ExceptionKind) {
        assert!(
            !self.is_raised(kind),
            "exception {:?} raised while already pending",
            kind
        );
        self.raised |= kind.bit();
    }

    pub fn is_raised(&self, kind: ExceptionKind) -> bool {
        (self.raised & kind.bit()) != 0
    }

    pub fn is_raised_any(&self) -> bool {
        self.raised != 0
    }

    pub fn is_raised_group(&self, group: ExceptionGroup) -> bool {
        let kinds: &[ExceptionKind] = match group {
            ExceptionGroup::Group0 => &GROUP_0,
            ExceptionGroup::Group1 => &GROUP_1,
            ExceptionGroup::Group2 => &GROUP_2,
        };
        kinds.iter().any(|&k| self.is_raised(k))
    }

    /// Consume a raised exception. Accepting an unraised kind is a modeling
    /// error.
    pub fn accept(&mut self, kind: ExceptionKind) {
        assert!(self.is_raised(kind), "accept of unraised exception {:?}", kind);
        self.raised &= !kind.bit();
    }

    pub fn accept_all(&mut self) {
        self.raised = 0;
        self.addr_error = None;
        self.bus_error = None;
        self.trap_vector = None;
    }

    pub fn rise_reset(&mut self) {
        self.rise(ExceptionKind::Reset);
    }

    pub fn rise_address_error(&mut self, info: FaultInfo) {
        self.rise(ExceptionKind::AddressError);
        self.addr_error = Some(info);
    }

    pub fn accept_address_error(&mut self) -> FaultInfo {
        self.accept(ExceptionKind::AddressError);
        self.addr_error.take().expect("address error without bundle")
    }

    pub fn rise_bus_error(&mut self, info: FaultInfo) {
        self.rise(ExceptionKind::BusError);
        self.bus_error = Some(info);
    }

    pub fn accept_bus_error(&mut self) -> FaultInfo {
        self.accept(ExceptionKind::BusError);
        self.bus_error.take().expect("bus error without bundle")
    }

    pub fn rise_trap(&mut self, vector: u8) {
        self.rise(ExceptionKind::Trap);
        self.trap_vector = Some(vector);
    }

    pub fn accept_trap(&mut self) -> u8 {
        self.accept(ExceptionKind::Trap);
        self.trap_vector.take().expect("trap without vector")
    }

    pub fn rise_trace(&mut self) {
        self.rise(ExceptionKind::Trace);
    }

    pub fn rise_interrupt(&mut self) {
        self.rise(ExceptionKind::Interrupt);
    }

    pub fn rise_trapv(&mut self) {
        self.rise(ExceptionKind::TrapV);
    }

    pub fn rise_chk(&mut self) {
        self.rise(ExceptionKind::ChkInstruction);
    }

    pub fn rise_division_by_zero(&mut self) {
        self.rise(ExceptionKind::DivisionByZero);
    }

    pub fn rise_illegal(&mut self) {
        self.rise(ExceptionKind::IllegalInstruction);
    }

    pub fn rise_privilege_violation(&mut self) {
        self.rise(ExceptionKind::PrivilegeViolation);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rise_accept_roundtrip() {
        let mut exman = ExceptionManager::new();
        assert!(!exman.is_raised_any());

        exman.rise(ExceptionKind::Trace);
        assert!(exman.is_raised(ExceptionKind::Trace));
        assert!(exman.is_raised_group(ExceptionGroup::Group1));
        assert!(!exman.is_raised_group(ExceptionGroup::Group0));

        exman.accept(ExceptionKind::Trace);
        assert!(!exman.is_raised_any());
    }

    #[test]
    fn test_address_error_bundle_roundtrip() {
        let mut exman = ExceptionManager::new();
        let info = FaultInfo {
            address: 0x100001,
            func_codes: 0b101,
            read: true,
            in_program: false,
        };
        exman.rise_address_error(info);
        assert_eq!(exman.accept_address_error(), info);
    }

    #[test]
    fn test_trap_vector_roundtrip() {
        let mut exman = ExceptionManager::new();
        exman.rise_trap(0x20 + 5);
        assert_eq!(exman.accept_trap(), 0x25);
    }

    #[test]
    #[should_panic]
    fn test_double_rise_panics() {
        let mut exman = ExceptionManager::new();
        exman.rise(ExceptionKind::Interrupt);
        exman.rise(ExceptionKind::Interrupt);
    }

    #[test]
    #[should_panic]
    fn test_accept_unraised_panics() {
        let mut exman = ExceptionManager::new();
        exman.accept(ExceptionKind::Trap);
    }
}
