//! Raw console abstraction.
//!
//! The crash-log core talks to the operator through single unbuffered
//! characters: at fault time the only surviving capability may be the
//! low-level transmit register, and at early boot the interactive recovery
//! menu runs before any line discipline or file system exists.

/// Unbuffered character I/O usable with interrupts disabled.
///
/// Implementations must not allocate, buffer, or block on any lock: the
/// write path is invoked from the hard-fault handler with the scheduler
/// frozen.
pub trait RawConsole {
    /// Emit a single byte. Infallible by contract — if the transmit
    /// hardware is gone there is nothing left to report the failure to.
    fn write_char(&mut self, byte: u8);

    /// Read a single byte, blocking until one arrives.
    ///
    /// Returns `None` when the input stream has ended (console detached,
    /// scripted input exhausted). The recovery menu treats end-of-input
    /// like whitespace: ignored.
    fn read_char(&mut self) -> Option<u8>;

    /// Non-blocking check whether input is waiting to be read.
    ///
    /// Used once per boot by the recovery decision step: an operator
    /// holding a key at the console forces the interactive menu even
    /// below the crash-loop threshold.
    fn input_pending(&self) -> bool;

    /// Emit a byte slice one character at a time.
    fn write_all(&mut self, bytes: &[u8]) {
        for &b in bytes {
            self.write_char(b);
        }
    }
}
