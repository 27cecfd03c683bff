//! Core emulator primitives and traits.

pub mod logging;

pub mod types {
    use serde::{Deserialize, Serialize};

    #[derive(Debug, Clone, Serialize, Deserialize)]
    pub struct Frame {
        pub width: u32,
        pub height: u32,
        pub pixels: Vec<u32>,
    }

    impl Frame {
        pub fn new(width: u32, height: u32) -> Self {
            Self {
                width,
                height,
                pixels: vec![0; (width * height) as usize],
            }
        }

        /// Expand a one-byte-per-pixel monochrome buffer into ARGB pixels.
        ///
        /// Any non-zero source byte is drawn with `on`, zero with `off`.
        /// Missing source bytes are treated as off.
        pub fn from_mono(width: u32, height: u32, mono: &[u8], on: u32, off: u32) -> Self {
            let mut frame = Self::new(width, height);
            for (dst, src) in frame.pixels.iter_mut().zip(mono.iter()) {
                *dst = if *src != 0 { on } else { off };
            }
            if mono.len() < frame.pixels.len() {
                frame.pixels[mono.len()..].fill(off);
            }
            frame
        }
    }
}

use serde_json::Value;

/// Description of a mount point (media slot) that a system supports
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MountPointInfo {
    /// Unique identifier for this mount point (e.g., "Program")
    pub id: String,
    /// User-friendly name for display
    pub name: String,
    /// File extensions accepted by this mount point (e.g., ["ch8"])
    pub extensions: Vec<String>,
    /// Whether this mount point is required for the system to function
    pub required: bool,
}

/// A high-level System trait tying components together.
pub trait System {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Reset to initial power-on state
    fn reset(&mut self);

    /// Emulate until a frame is produced and return a framebuffer.
    fn step_frame(&mut self) -> Result<types::Frame, Self::Error>;

    /// Read-only JSON snapshot for debugger views.
    fn debug_state(&self) -> Value;

    /// Get the list of mount points this system supports
    fn mount_points(&self) -> Vec<MountPointInfo>;

    /// Load media into a specific mount point
    fn mount(&mut self, mount_point_id: &str, data: &[u8]) -> Result<(), Self::Error>;

    /// Unload media from a specific mount point
    fn unmount(&mut self, mount_point_id: &str) -> Result<(), Self::Error>;

    /// Check if a mount point has media loaded
    fn is_mounted(&self, mount_point_id: &str) -> bool;
}
