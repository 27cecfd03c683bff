//! 8-bit xorshift generator backing the `Cxnn` instruction.
//!
//! The state is four bytes, viewed little-endian as the `u32` seed. Every
//! draw shifts the bytes down one slot and mixes a new top byte, which is
//! also the value returned. Period is 2^32 - 1 for any non-zero seed; an
//! all-zero state stays zero forever.

use std::time::{SystemTime, UNIX_EPOCH};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rng {
    b: [u8; 4],
}

impl Rng {
    pub fn new(seed: u32) -> Self {
        Self {
            b: seed.to_le_bytes(),
        }
    }

    /// A non-zero seed derived from the wall clock.
    pub fn seed_from_time() -> u32 {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos())
            .unwrap_or(0);
        let folded = (nanos as u64 ^ (nanos >> 64) as u64) as u32 ^ (nanos >> 32) as u32;
        if folded == 0 {
            1
        } else {
            folded
        }
    }

    /// Current state as a seed value.
    pub fn seed(&self) -> u32 {
        u32::from_le_bytes(self.b)
    }

    pub fn next_byte(&mut self) -> u8 {
        let t = self.b[0] ^ (self.b[0] >> 1);
        self.b[0] = self.b[1];
        self.b[1] = self.b[2];
        self.b[2] = self.b[3];
        self.b[3] = self.b[2] ^ t ^ (self.b[2] >> 3) ^ (t << 1);
        self.b[3]
    }
}
