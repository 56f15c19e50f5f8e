//! Mock implementations for testing
//!
//! This module provides mock implementations of all platform traits
//! for use in unit and integration tests.

#![cfg(any(test, feature = "std"))]
// Test support: mocks favour directness over audited arithmetic.
#![allow(clippy::arithmetic_side_effects)]
#![allow(clippy::indexing_slicing)]
#![allow(clippy::panic)]

use crate::*;

/// Mock console with scripted input and captured output.
pub struct MockConsole {
    input: heapless::Deque<u8, 256>,
    output: heapless::Vec<u8, 32768>,
}

impl MockConsole {
    /// Create a mock console with no pending input.
    pub fn new() -> Self {
        Self {
            input: heapless::Deque::new(),
            output: heapless::Vec::new(),
        }
    }

    /// Queue input bytes to be returned by `read_char`.
    pub fn feed(&mut self, bytes: &[u8]) {
        for &b in bytes {
            let _ = self.input.push_back(b);
        }
    }

    /// Everything written so far.
    pub fn output(&self) -> &[u8] {
        &self.output
    }

    /// Output as UTF-8; non-UTF-8 output renders a placeholder.
    pub fn output_str(&self) -> &str {
        core::str::from_utf8(&self.output).unwrap_or("<non-utf8 output>")
    }

    /// Discard captured output (e.g. between boots in a scenario test).
    pub fn clear_output(&mut self) {
        self.output.clear();
    }
}

impl Default for MockConsole {
    fn default() -> Self {
        Self::new()
    }
}

impl RawConsole for MockConsole {
    fn write_char(&mut self, byte: u8) {
        let _ = self.output.push(byte);
    }

    fn read_char(&mut self) -> Option<u8> {
        self.input.pop_front()
    }

    fn input_pending(&self) -> bool {
        !self.input.is_empty()
    }
}

/// Mock nonvolatile region backed by an in-memory array.
pub struct MockNvram {
    data: [u8; Self::BACKING_SIZE],
    capacity: usize,
    unavailable: bool,
    write_count: usize,
}

impl MockNvram {
    const BACKING_SIZE: usize = 4096;

    /// Create a region with the full backing capacity.
    pub fn new() -> Self {
        Self::with_capacity(Self::BACKING_SIZE)
    }

    /// Create a region reporting a smaller capacity (for "no space" tests).
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            data: [0u8; Self::BACKING_SIZE],
            capacity: capacity.min(Self::BACKING_SIZE),
            unavailable: false,
            write_count: 0,
        }
    }

    /// Simulate retention loss: all operations report `NvError::Unavailable`.
    pub fn set_unavailable(&mut self, unavailable: bool) {
        self.unavailable = unavailable;
    }

    /// Number of successful writes performed.
    pub fn write_count(&self) -> usize {
        self.write_count
    }

    /// Raw view of the backing bytes, for persistence assertions.
    pub fn raw(&self) -> &[u8] {
        &self.data[..self.capacity]
    }
}

impl Default for MockNvram {
    fn default() -> Self {
        Self::new()
    }
}

impl NonvolatileRegion for MockNvram {
    fn capacity(&self) -> usize {
        self.capacity
    }

    fn read(&self, offset: usize, buf: &mut [u8]) -> Result<(), NvError> {
        if self.unavailable {
            return Err(NvError::Unavailable);
        }
        let end = offset.checked_add(buf.len()).ok_or(NvError::OutOfBounds)?;
        if end > self.capacity {
            return Err(NvError::OutOfBounds);
        }
        buf.copy_from_slice(&self.data[offset..end]);
        Ok(())
    }

    fn write(&mut self, offset: usize, data: &[u8]) -> Result<(), NvError> {
        if self.unavailable {
            return Err(NvError::Unavailable);
        }
        let end = offset.checked_add(data.len()).ok_or(NvError::OutOfBounds)?;
        if end > self.capacity {
            return Err(NvError::OutOfBounds);
        }
        self.data[offset..end].copy_from_slice(data);
        self.write_count += 1;
        Ok(())
    }
}

/// Mock memory: a window of readable words at a base address.
pub struct MockMemory {
    base: u32,
    len_words: usize,
    /// `None` = self-addressed mode: each word reads as its own address.
    words: Option<heapless::Vec<u32, 1024>>,
}

impl MockMemory {
    /// Create readable memory covering `words.len()` words from `base`.
    pub fn new(base: u32, words: &[u32]) -> Self {
        let mut v = heapless::Vec::new();
        for &w in words {
            let _ = v.push(w);
        }
        Self {
            base,
            len_words: words.len().min(1024),
            words: Some(v),
        }
    }

    /// Create a region of `count` words whose value equals their address.
    ///
    /// Handy for asserting exactly which addresses a stack window copied.
    /// Values are computed, so the region can be arbitrarily large.
    pub fn self_addressed(base: u32, count: usize) -> Self {
        Self {
            base,
            len_words: count,
            words: None,
        }
    }
}

impl RawMemory for MockMemory {
    fn read_word(&self, addr: u32) -> Option<u32> {
        if addr % 4 != 0 || addr < self.base {
            return None;
        }
        let idx = ((addr - self.base) / 4) as usize;
        if idx >= self.len_words {
            return None;
        }
        match &self.words {
            Some(words) => words.get(idx).copied(),
            None => Some(addr),
        }
    }
}

/// Mock task control block.
pub struct MockTask {
    id: u32,
    name: heapless::Vec<u8, 64>,
    stack_top: u32,
    stack_size: u32,
}

impl MockTask {
    /// Create a task descriptor.
    pub fn new(id: u32, name: &str, stack_top: u32, stack_size: u32) -> Self {
        let mut n = heapless::Vec::new();
        let _ = n.extend_from_slice(name.as_bytes());
        Self {
            id,
            name: n,
            stack_top,
            stack_size,
        }
    }
}

impl TaskDescriptor for MockTask {
    fn task_id(&self) -> u32 {
        self.id
    }

    fn name(&self) -> &[u8] {
        &self.name
    }

    fn stack_top(&self) -> u32 {
        self.stack_top
    }

    fn stack_size(&self) -> u32 {
        self.stack_size
    }
}

/// Mock board reset. Panics with a recognizable message so tests can
/// assert that a reset was (or was not) requested.
pub struct MockReset;

impl BoardReset for MockReset {
    fn reset(&mut self) -> ! {
        panic!("MockReset: board reset requested")
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn mock_console_scripts_input() {
        let mut console = MockConsole::new();
        console.feed(b"dc");
        assert!(console.input_pending());
        assert_eq!(console.read_char(), Some(b'd'));
        assert_eq!(console.read_char(), Some(b'c'));
        assert_eq!(console.read_char(), None);
        assert!(!console.input_pending());
    }

    #[test]
    fn mock_console_captures_output() {
        let mut console = MockConsole::new();
        console.write_all(b"hello");
        assert_eq!(console.output(), b"hello");
    }

    #[test]
    fn mock_nvram_roundtrip() {
        let mut nv = MockNvram::new();
        nv.write(16, b"abc").unwrap();
        let mut buf = [0u8; 3];
        nv.read(16, &mut buf).unwrap();
        assert_eq!(&buf, b"abc");
    }

    #[test]
    fn mock_nvram_reports_unavailable() {
        let mut nv = MockNvram::new();
        nv.set_unavailable(true);
        assert_eq!(nv.write(0, b"x"), Err(NvError::Unavailable));
        let mut buf = [0u8; 1];
        assert_eq!(nv.read(0, &mut buf), Err(NvError::Unavailable));
    }

    #[test]
    fn mock_nvram_reports_out_of_bounds() {
        let mut nv = MockNvram::with_capacity(8);
        assert_eq!(nv.write(4, &[0u8; 8]), Err(NvError::OutOfBounds));
    }

    #[test]
    fn mock_memory_self_addressed() {
        let mem = MockMemory::self_addressed(0x2000_0000, 4);
        assert_eq!(mem.read_word(0x2000_0004), Some(0x2000_0004));
        assert_eq!(mem.read_word(0x2000_0010), None);
        assert_eq!(mem.read_word(0x2000_0002), None); // misaligned
        assert_eq!(mem.read_word(0x1000_0000), None); // below base
    }
}
