//! Per-session machine configuration: sizes, pacing, quirks and the
//! opcode handler chain.

use std::fmt;
use std::ops::{BitOr, BitOrAssign};
use std::rc::Rc;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::dispatch::OpHandler;
use crate::error::Chip8Error;
use crate::instructions::BaseInstructionSet;
use crate::registers::PROGRAM_START;

/// Independent historical divergences in instruction semantics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "Vec<String>", try_from = "Vec<String>")]
pub struct Quirks(u8);

impl Quirks {
    pub const NONE: Quirks = Quirks(0);
    /// `8xy6`/`8xyE` shift VX in place instead of reading VY.
    pub const SHIFT: Quirks = Quirks(1 << 0);
    /// `Fx55`/`Fx65` advance I by X instead of X + 1.
    pub const LOAD_STORE_INC_I_BY_X: Quirks = Quirks(1 << 1);
    /// `Fx55`/`Fx65` leave I unchanged. Takes precedence over `LOAD_STORE_INC_I_BY_X`.
    pub const LOAD_STORE_NO_INC_I: Quirks = Quirks(1 << 2);
    /// `Dxyn` wraps sprites around the screen edges instead of clipping.
    pub const WRAP_SPRITES: Quirks = Quirks(1 << 3);
    /// `Bnnn` adds VX (X = top nibble of nnn) instead of V0.
    pub const BXNN_JUMP: Quirks = Quirks(1 << 4);
    /// `Dxyn` is limited to one draw per 60 Hz tick.
    pub const VBLANK: Quirks = Quirks(1 << 5);
    /// `8xy1`/`8xy2`/`8xy3` clear VF.
    pub const VF_RESET: Quirks = Quirks(1 << 6);

    /// Original COSMAC VIP interpreter.
    pub const COSMAC_VIP: Quirks = Quirks(Self::VF_RESET.0 | Self::VBLANK.0);
    /// SUPER-CHIP 1.1 on the HP-48.
    pub const SCHIP: Quirks =
        Quirks(Self::SHIFT.0 | Self::LOAD_STORE_NO_INC_I.0 | Self::BXNN_JUMP.0);
    /// XO-CHIP.
    pub const XO_CHIP: Quirks = Quirks(Self::WRAP_SPRITES.0);

    const NAMED: [(&'static str, Quirks); 7] = [
        ("shift", Self::SHIFT),
        ("load-store-inc-by-x", Self::LOAD_STORE_INC_I_BY_X),
        ("load-store-no-inc", Self::LOAD_STORE_NO_INC_I),
        ("wrap-sprites", Self::WRAP_SPRITES),
        ("bxnn-jump", Self::BXNN_JUMP),
        ("vblank", Self::VBLANK),
        ("vf-reset", Self::VF_RESET),
    ];

    const PRESETS: [(&'static str, Quirks); 4] = [
        ("none", Self::NONE),
        ("vip", Self::COSMAC_VIP),
        ("schip", Self::SCHIP),
        ("xochip", Self::XO_CHIP),
    ];

    pub const fn from_bits(bits: u8) -> Self {
        Quirks(bits & 0x7F)
    }

    pub const fn bits(self) -> u8 {
        self.0
    }

    pub const fn contains(self, other: Quirks) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub fn insert(&mut self, other: Quirks) {
        self.0 |= other.0;
    }

    pub fn remove(&mut self, other: Quirks) {
        self.0 &= !other.0;
    }

    pub fn toggle(&mut self, other: Quirks) {
        self.0 ^= other.0;
    }

    /// Names of the individual flags that are set.
    pub fn names(self) -> Vec<&'static str> {
        Self::NAMED
            .iter()
            .filter(|(_, q)| self.contains(*q))
            .map(|(name, _)| *name)
            .collect()
    }

    fn lookup(name: &str) -> Option<Quirks> {
        let name = name.trim().to_lowercase().replace('_', "-");
        Self::NAMED
            .iter()
            .chain(Self::PRESETS.iter())
            .find(|(n, _)| *n == name)
            .map(|(_, q)| *q)
    }
}

impl BitOr for Quirks {
    type Output = Quirks;

    fn bitor(self, rhs: Quirks) -> Quirks {
        Quirks(self.0 | rhs.0)
    }
}

impl BitOrAssign for Quirks {
    fn bitor_assign(&mut self, rhs: Quirks) {
        self.0 |= rhs.0;
    }
}

/// Parses a comma-separated list of flag or preset names, e.g.
/// `"schip,vf-reset"`. An empty string yields no quirks.
impl FromStr for Quirks {
    type Err = Chip8Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.split(',')
            .filter(|part| !part.trim().is_empty())
            .try_fold(Quirks::NONE, |acc, part| {
                Quirks::lookup(part)
                    .map(|q| acc | q)
                    .ok_or_else(|| Chip8Error::UnknownQuirk(part.trim().to_string()))
            })
    }
}

impl fmt::Display for Quirks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return write!(f, "none");
        }
        write!(f, "{}", self.names().join(","))
    }
}

impl From<Quirks> for Vec<String> {
    fn from(q: Quirks) -> Self {
        q.names().into_iter().map(str::to_string).collect()
    }
}

impl TryFrom<Vec<String>> for Quirks {
    type Error = Chip8Error;

    fn try_from(names: Vec<String>) -> Result<Self, Self::Error> {
        names.iter().try_fold(Quirks::NONE, |acc, name| {
            Quirks::lookup(name)
                .map(|q| acc | q)
                .ok_or_else(|| Chip8Error::UnknownQuirk(name.clone()))
        })
    }
}

/// Ordered opcode handlers; the first one that accepts an opcode wins.
///
/// Cloning is cheap, so a machine can hold its chain while handing
/// itself mutably to each handler.
#[derive(Clone)]
pub struct HandlerChain {
    handlers: Rc<[Rc<dyn OpHandler>]>,
}

impl HandlerChain {
    /// Only the standard instruction set.
    pub fn base() -> Self {
        let base: Rc<dyn OpHandler> = Rc::new(BaseInstructionSet);
        Self {
            handlers: Rc::from(vec![base]),
        }
    }

    /// No handlers at all; every opcode stalls.
    pub fn empty() -> Self {
        Self {
            handlers: Rc::from(Vec::new()),
        }
    }

    /// A new chain that tries `handler` before everything in `self`.
    pub fn prepend<H: OpHandler + 'static>(&self, handler: H) -> Self {
        let mut handlers: Vec<Rc<dyn OpHandler>> = Vec::with_capacity(self.handlers.len() + 1);
        handlers.push(Rc::new(handler));
        handlers.extend(self.handlers.iter().cloned());
        Self {
            handlers: Rc::from(handlers),
        }
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &dyn OpHandler> {
        self.handlers.iter().map(|h| &**h)
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.iter().map(|h| h.name()).collect()
    }
}

impl Default for HandlerChain {
    fn default() -> Self {
        Self::base()
    }
}

impl fmt::Debug for HandlerChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.names()).finish()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MachineConfig {
    pub quirks: Quirks,
    /// Total addressable bytes.
    pub memory_size: usize,
    /// Instructions executed per 60 Hz frame by `step_frame`.
    pub cycles_per_frame: u32,
    pub screen_width: u8,
    pub screen_height: u8,
    /// Not serialized; always the base chain after deserializing.
    #[serde(skip)]
    pub handlers: HandlerChain,
}

impl Default for MachineConfig {
    fn default() -> Self {
        Self {
            quirks: Quirks::NONE,
            memory_size: 4096,
            cycles_per_frame: 15,
            screen_width: 64,
            screen_height: 32,
            handlers: HandlerChain::base(),
        }
    }
}

impl MachineConfig {
    /// Largest memory reachable through 16-bit `pc`/`I`.
    pub const MAX_MEMORY: usize = 0x10000;
    /// Room for at least one instruction at the program start.
    pub const MIN_MEMORY: usize = PROGRAM_START as usize + 2;

    pub fn with_quirks(mut self, quirks: Quirks) -> Self {
        self.quirks = quirks;
        self
    }

    pub fn with_handler<H: OpHandler + 'static>(mut self, handler: H) -> Self {
        self.handlers = self.handlers.prepend(handler);
        self
    }

    pub fn display_size(&self) -> usize {
        self.screen_width as usize * self.screen_height as usize
    }

    pub fn validate(&self) -> Result<(), Chip8Error> {
        if self.memory_size < Self::MIN_MEMORY || self.memory_size > Self::MAX_MEMORY {
            return Err(Chip8Error::InvalidConfig(format!(
                "memory size {} outside {}..={}",
                self.memory_size,
                Self::MIN_MEMORY,
                Self::MAX_MEMORY
            )));
        }
        if self.screen_width == 0 || self.screen_height == 0 {
            return Err(Chip8Error::InvalidConfig(format!(
                "screen {}x{} has no pixels",
                self.screen_width, self.screen_height
            )));
        }
        if self.cycles_per_frame == 0 {
            return Err(Chip8Error::InvalidConfig(
                "cycles per frame must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatch::Opcode;
    use crate::machine::Machine;

    struct Nop;

    impl OpHandler for Nop {
        fn name(&self) -> &'static str {
            "nop"
        }

        fn try_handle(&self, _machine: &mut Machine, _op: Opcode) -> bool {
            false
        }
    }

    #[test]
    fn default_config() {
        let c = MachineConfig::default();
        assert_eq!(c.memory_size, 4096);
        assert_eq!(c.cycles_per_frame, 15);
        assert_eq!((c.screen_width, c.screen_height), (64, 32));
        assert_eq!(c.display_size(), 2048);
        assert!(c.quirks.is_empty());
        assert_eq!(c.handlers.names(), vec!["chip8"]);
        assert!(c.validate().is_ok());
    }

    #[test]
    fn quirk_set_algebra() {
        let mut q = Quirks::SHIFT | Quirks::VBLANK;
        assert!(q.contains(Quirks::SHIFT));
        assert!(!q.contains(Quirks::WRAP_SPRITES));
        q.remove(Quirks::SHIFT);
        assert_eq!(q, Quirks::VBLANK);
        q.toggle(Quirks::VF_RESET);
        assert!(q.contains(Quirks::VF_RESET));
        q.insert(Quirks::BXNN_JUMP);
        assert_eq!(q.names(), vec!["bxnn-jump", "vblank", "vf-reset"]);
    }

    #[test]
    fn quirk_parsing() {
        assert_eq!("".parse::<Quirks>(), Ok(Quirks::NONE));
        assert_eq!("Shift, VF_RESET".parse::<Quirks>(), Ok(Quirks::SHIFT | Quirks::VF_RESET));
        assert_eq!("vip".parse::<Quirks>(), Ok(Quirks::COSMAC_VIP));
        assert_eq!("schip,wrap-sprites".parse::<Quirks>(), Ok(Quirks::SCHIP | Quirks::WRAP_SPRITES));
        assert_eq!(
            "shift,bogus".parse::<Quirks>(),
            Err(Chip8Error::UnknownQuirk("bogus".to_string()))
        );
    }

    #[test]
    fn quirk_display() {
        assert_eq!(Quirks::NONE.to_string(), "none");
        assert_eq!(Quirks::XO_CHIP.to_string(), "wrap-sprites");
    }

    #[test]
    fn config_json_uses_quirk_names() {
        let config = MachineConfig::default().with_quirks(Quirks::SCHIP);
        let json = serde_json::to_value(&config).expect("serialize");
        assert_eq!(
            json["quirks"],
            serde_json::json!(["shift", "load-store-no-inc", "bxnn-jump"])
        );
        assert!(json.get("handlers").is_none());
    }

    #[test]
    fn partial_config_json_fills_defaults() {
        let config: MachineConfig =
            serde_json::from_str(r#"{"quirks": ["vblank"], "cycles_per_frame": 30}"#)
                .expect("deserialize");
        assert_eq!(config.quirks, Quirks::VBLANK);
        assert_eq!(config.cycles_per_frame, 30);
        assert_eq!(config.memory_size, 4096);
        assert_eq!(config.handlers.len(), 1);
    }

    #[test]
    fn unknown_quirk_in_json_is_rejected() {
        let result = serde_json::from_str::<MachineConfig>(r#"{"quirks": ["turbo"]}"#);
        assert!(result.is_err());
    }

    #[test]
    fn validate_rejects_bad_sizes() {
        let mut c = MachineConfig::default();
        c.memory_size = 0x100;
        assert!(matches!(c.validate(), Err(Chip8Error::InvalidConfig(_))));

        let mut c = MachineConfig::default();
        c.memory_size = 0x10001;
        assert!(c.validate().is_err());

        let mut c = MachineConfig::default();
        c.screen_height = 0;
        assert!(c.validate().is_err());

        let mut c = MachineConfig::default();
        c.cycles_per_frame = 0;
        assert!(c.validate().is_err());
    }

    #[test]
    fn prepend_puts_handler_first() {
        let base = HandlerChain::base();
        let chain = base.prepend(Nop);
        assert_eq!(chain.names(), vec!["nop", "chip8"]);
        // The original chain is untouched.
        assert_eq!(base.names(), vec!["chip8"]);
        assert!(HandlerChain::empty().is_empty());
    }

    #[test]
    fn handler_chain_debug_lists_names() {
        let chain = MachineConfig::default().with_handler(Nop).handlers;
        assert_eq!(format!("{:?}", chain), r#"["nop", "chip8"]"#);
    }
}
