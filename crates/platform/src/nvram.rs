//! Nonvolatile region abstraction.
//!
//! A byte-addressable persistent region (battery-backed SRAM or similar)
//! that survives a reboot but can fail independently of the rest of the
//! system: retention may be lost on power failure, and the region is
//! small enough that a record may simply not fit.

/// Errors reported by a [`NonvolatileRegion`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum NvError {
    /// The medium is unavailable or its contents were wiped (battery-backed
    /// RAM lost power and retention failed). Distinct from `OutOfBounds` so
    /// the fault path can report "memory wiped" rather than "full".
    Unavailable,
    /// The requested range does not fit inside the region.
    OutOfBounds,
}

/// Byte-addressable power-loss-resilient storage.
///
/// Both methods must be callable with interrupts disabled and must not
/// allocate or take locks: the write path runs inside the fault handler.
pub trait NonvolatileRegion {
    /// Total usable size of the region in bytes.
    fn capacity(&self) -> usize;

    /// Read `buf.len()` bytes starting at `offset`.
    fn read(&self, offset: usize, buf: &mut [u8]) -> Result<(), NvError>;

    /// Write `data` starting at `offset`.
    fn write(&mut self, offset: usize, data: &[u8]) -> Result<(), NvError>;
}
