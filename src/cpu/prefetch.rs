//! M68K prefetch queue
//!
//! The two-word instruction lookahead: IRD holds the opcode being executed,
//! IRC the next word of the instruction stream, IR the staging slot between
//! them. The slots themselves live in the register file; this unit owns the
//! fetch state machine against the bus manager.
//!
//! Fetch kinds:
//! - `fetch_ird`: load the word at PC straight into IR and IRD (first half of
//!   a refill after a change of flow)
//! - `fetch_irc`: load the word at PC+2 into IRC (second half of a refill, or
//!   replacing a consumed extension word; the consumer advances PC)
//! - `fetch_one`: advance the pipeline at instruction end - IRC moves to IRD
//!   through IR and the word at PC+2 becomes the new IRC

use super::bus_manager::{AddrSpace, BusManager};
use super::registers::RegisterFile;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FetchState {
    Idle,
    FetchIrd,
    FetchIrc,
    FetchOne,
}

#[derive(Debug)]
pub struct PrefetchQueue {
    state: FetchState,
}

impl PrefetchQueue {
    pub fn new() -> Self {
        Self {
            state: FetchState::Idle,
        }
    }

    pub fn is_idle(&self) -> bool {
        self.state == FetchState::Idle
    }

    pub fn reset(&mut self) {
        self.state = FetchState::Idle;
    }

    pub fn init_fetch_ird(&mut self, busm: &mut BusManager, regs: &RegisterFile) {
        self.assert_idle("init_fetch_ird");
        busm.init_read_word(regs.pc, AddrSpace::Program);
        self.state = FetchState::FetchIrd;
    }

    pub fn init_fetch_irc(&mut self, busm: &mut BusManager, regs: &RegisterFile) {
        self.assert_idle("init_fetch_irc");
        busm.init_read_word(regs.pc.wrapping_add(2), AddrSpace::Program);
        self.state = FetchState::FetchIrc;
    }

    pub fn init_fetch_one(&mut self, busm: &mut BusManager, regs: &RegisterFile) {
        self.assert_idle("init_fetch_one");
        busm.init_read_word(regs.pc.wrapping_add(2), AddrSpace::Program);
        self.state = FetchState::FetchOne;
    }

    pub fn cycle(&mut self, busm: &BusManager, regs: &mut RegisterFile) {
        if self.state == FetchState::Idle || !busm.is_idle() {
            return;
        }

        let word = busm.latched_word();
        match self.state {
            FetchState::FetchIrd => {
                regs.ir = word;
                regs.ird = word;
            }
            FetchState::FetchIrc => {
                regs.irc = word;
            }
            FetchState::FetchOne => {
                regs.ir = regs.irc;
                regs.ird = regs.ir;
                regs.irc = word;
            }
            FetchState::Idle => unreachable!(),
        }
        self.state = FetchState::Idle;
    }

    fn assert_idle(&self, caller: &str) {
        assert!(
            self.is_idle(),
            "prefetch queue: {} while another fetch is in progress",
            caller
        );
    }
}

impl Default for PrefetchQueue {
    fn default() -> Self {
        Self::new()
    }
}
