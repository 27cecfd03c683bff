//! Programmer-visible register file.

use serde::{Deserialize, Serialize};

/// Number of general-purpose `V` registers.
pub const REG_COUNT: usize = 16;

/// Return-address slots available to `2nnn`.
pub const STACK_DEPTH: usize = 16;

/// First instruction executed after reset, and where programs are loaded.
pub const PROGRAM_START: u16 = 0x200;

/// Index of the flag register `VF`.
pub const VF: usize = 0xF;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Registers {
    /// Return addresses; slots at or above `sp` are stale.
    pub stack: [u16; STACK_DEPTH],
    pub v: [u8; REG_COUNT],
    pub pc: u16,
    pub i: u16,
    /// Number of occupied stack slots, `0..=STACK_DEPTH`.
    pub sp: u8,
    /// Delay timer
    pub dt: u8,
    /// Sound timer
    pub st: u8,
}

impl Default for Registers {
    fn default() -> Self {
        Self {
            stack: [0; STACK_DEPTH],
            v: [0; REG_COUNT],
            pc: PROGRAM_START,
            i: 0,
            sp: 0,
            dt: 0,
            st: 0,
        }
    }
}

impl Registers {
    pub fn set_flag(&mut self, flag: bool) {
        self.v[VF] = flag as u8;
    }

    /// Occupied part of the call stack, oldest first.
    pub fn call_stack(&self) -> &[u16] {
        let depth = (self.sp as usize).min(STACK_DEPTH);
        &self.stack[..depth]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_starts_at_program() {
        let r = Registers::default();
        assert_eq!(r.pc, PROGRAM_START);
        assert_eq!(r.sp, 0);
        assert!(r.call_stack().is_empty());
    }

    #[test]
    fn call_stack_is_clamped() {
        let mut r = Registers::default();
        r.stack[0] = 0x222;
        r.sp = 1;
        assert_eq!(r.call_stack(), &[0x222]);
        r.sp = 200;
        assert_eq!(r.call_stack().len(), STACK_DEPTH);
    }

    #[test]
    fn json_round_trip() {
        let mut r = Registers::default();
        r.v[3] = 0x42;
        r.i = 0x321;
        let json = serde_json::to_string(&r).expect("serialize");
        let back: Registers = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(back, r);
    }
}
