//! Bounds-checked raw memory reads.
//!
//! The stack pointers captured at fault time cannot be trusted: the fault
//! may be a stack corruption in the first place. Instead of dereferencing
//! raw pointers, capture walks the stack windows through this trait, which
//! refuses reads outside the readable address ranges of the board.

/// Best-effort word reads over potentially invalid addresses.
pub trait RawMemory {
    /// Read the 32-bit word at `addr`, or `None` if the address is not
    /// inside a readable range (unmapped, peripheral space, misaligned).
    ///
    /// Must not itself fault: a fault during fault capture is
    /// unrecoverable by design.
    fn read_word(&self, addr: u32) -> Option<u32>;
}
