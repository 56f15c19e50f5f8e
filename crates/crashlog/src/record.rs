//! Fault record model and its persisted binary layout.
//!
//! A [`FaultRecord`] is the unit of postmortem diagnostic data: a flat,
//! fixed-size, self-contained block with no pointers that would need a
//! live address space to reinterpret. An external tool can decode the
//! persisted bytes alone.
//!
//! All multi-byte integers are little-endian.
//!
//! Layout (440 bytes total):
//! ```text
//! [0..4]     magic        b"SKFR"
//! [4]        version      u8 = 1
//! [5..8]     _pad         [u8; 3]
//! [8..12]    line         u32
//! [12..16]   flags        u32 (FaultFlags bits)
//! [16..20]   task_id      u32
//! [20..24]   int_ctx_ptr  u32 (raw evidence value, never dereferenced)
//! [24..64]   file_name    [u8; 40] (tail-truncated, zero-padded)
//! [64..88]   task_name    [u8; 24] (verbatim, not NUL-guaranteed)
//! [88..160]  regs         [u32; 18]
//! [160..300] user_stack   StackRegion (sp, top, size, 32-word window)
//! [300..440] int_stack    StackRegion (sp, top, size, 32-word window)
//! ```

/// Width of the source file name field in bytes.
pub const MAX_FILE_NAME: usize = 40;

/// Width of the task name field in bytes.
pub const MAX_TASK_NAME: usize = 24;

/// Number of machine registers in a saved register file.
///
/// R0-R12, SP, LR, PC, xPSR, EXC_RETURN for this architecture class.
pub const REG_COUNT: usize = 18;

/// Index of R13 (the user stack pointer) within a saved register file.
pub const REG_SP: usize = 13;

/// Words copied per stack window, centered on the stack pointer.
pub const STACK_WINDOW_WORDS: usize = 32;

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

/// Error variants for record decode operations.
#[derive(Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum RecordError {
    /// Record magic bytes are not b"SKFR"
    BadMagic,
    /// Record version is not recognised by this implementation
    UnsupportedVersion,
}

// ---------------------------------------------------------------------------
// FaultFlags
// ---------------------------------------------------------------------------

/// Validity bitset for a fault record.
///
/// The flags state exactly which fields were populated at capture time;
/// a reader must consult them before trusting the register snapshot or
/// either stack window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct FaultFlags(u32);

impl FaultFlags {
    /// A register snapshot was copied. Set only when the fault occurred
    /// while an interrupt/exception context was active.
    pub const REGS_PRESENT: Self = Self(1 << 0);
    /// The user stack summary and window were populated.
    pub const USER_STACK_PRESENT: Self = Self(1 << 1);
    /// The interrupt stack summary and window were populated.
    pub const INT_STACK_PRESENT: Self = Self(1 << 2);
    /// The user stack pointer fell outside `(top - size, top]`; the
    /// window was still dumped best-effort but must not be trusted.
    pub const INVALID_USER_SP: Self = Self(1 << 3);
    /// The interrupt stack pointer fell outside `(top - size, top]`.
    pub const INVALID_INT_SP: Self = Self(1 << 4);

    /// No flags set.
    #[must_use]
    pub const fn empty() -> Self {
        Self(0)
    }

    /// Raw bit value, as persisted.
    #[must_use]
    pub const fn bits(self) -> u32 {
        self.0
    }

    /// Reconstruct from persisted bits. Unknown bits are preserved as
    /// evidence rather than masked off.
    #[must_use]
    pub const fn from_bits(bits: u32) -> Self {
        Self(bits)
    }

    /// True if every bit of `other` is set in `self`.
    #[must_use]
    pub const fn contains(self, other: Self) -> bool {
        (self.0 & other.0) == other.0
    }

    /// Set every bit of `other`.
    pub fn insert(&mut self, other: Self) {
        self.0 |= other.0;
    }
}

// ---------------------------------------------------------------------------
// StackRegion
// ---------------------------------------------------------------------------

/// One captured stack: pointer, allocated bounds, and a window of words
/// copied from memory bracketing the pointer.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct StackRegion {
    /// Stack pointer at capture time.
    pub sp: u32,
    /// Highest address of the allocated stack.
    pub top: u32,
    /// Allocated size in bytes.
    pub size: u32,
    /// `STACK_WINDOW_WORDS` words copied walking downward from
    /// `sp + half-window` to `sp - half-window`. Unreadable words are zero.
    pub window: [u32; STACK_WINDOW_WORDS],
}

impl StackRegion {
    /// Encoded size: three u32 fields plus the window.
    pub const SIZE: usize = 12 + STACK_WINDOW_WORDS * 4;

    /// All-zero region, the state of an untouched record field.
    #[must_use]
    pub const fn zeroed() -> Self {
        Self {
            sp: 0,
            top: 0,
            size: 0,
            window: [0; STACK_WINDOW_WORDS],
        }
    }

    /// True when `sp` lies within the allocated range `(top - size, top]`.
    #[must_use]
    pub fn sp_in_bounds(&self) -> bool {
        self.sp <= self.top && self.sp > self.top.saturating_sub(self.size)
    }

    /// Address of window word `i` (word 0 is `sp + half-window`).
    ///
    /// Lets a reader label each dumped word with the address it was
    /// copied from.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)] // i < STACK_WINDOW_WORDS
    pub fn window_addr(&self, i: usize) -> u32 {
        let half = (STACK_WINDOW_WORDS / 2) as i32;
        let offset_words = half.wrapping_sub(i as i32);
        self.sp.wrapping_add_signed(offset_words.wrapping_mul(4))
    }
}

// ---------------------------------------------------------------------------
// FaultRecord
// ---------------------------------------------------------------------------

/// The fixed-size snapshot of execution context captured at the moment of
/// an unrecoverable fault.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct FaultRecord {
    /// Source line of the fault site, when known.
    pub line: u32,
    /// Which fields of this record were actually populated.
    pub flags: FaultFlags,
    /// Numeric id of the faulting task.
    pub task_id: u32,
    /// Raw value of the active-interrupt-context pointer at capture time.
    /// Saved purely as corroborating evidence; never dereferenced.
    pub interrupt_context_ptr: u32,
    /// Source file of the fault site, tail-truncated to fit.
    pub file_name: [u8; MAX_FILE_NAME],
    /// Faulting task's name, copied verbatim from its control block.
    pub task_name: [u8; MAX_TASK_NAME],
    /// Machine register snapshot. Valid only under
    /// [`FaultFlags::REGS_PRESENT`].
    pub regs: [u32; REG_COUNT],
    /// User stack at the fault.
    pub user_stack: StackRegion,
    /// Interrupt stack at the fault.
    pub int_stack: StackRegion,
}

impl FaultRecord {
    /// Encoded size in bytes.
    pub const SIZE: usize = 160 + 2 * StackRegion::SIZE;
    /// Record magic bytes.
    pub const MAGIC: &'static [u8; 4] = b"SKFR";
    /// Record layout version.
    pub const VERSION: u8 = 1;

    /// All-zero record. Capture starts from this so that untouched fields
    /// deterministically read as absent rather than stale.
    #[must_use]
    pub const fn zeroed() -> Self {
        Self {
            line: 0,
            flags: FaultFlags::empty(),
            task_id: 0,
            interrupt_context_ptr: 0,
            file_name: [0; MAX_FILE_NAME],
            task_name: [0; MAX_TASK_NAME],
            regs: [0; REG_COUNT],
            user_stack: StackRegion::zeroed(),
            int_stack: StackRegion::zeroed(),
        }
    }

    /// Record the fault site, keeping the suffix of over-long file names:
    /// the basename end of a path is the diagnostic part.
    pub fn set_source(&mut self, file: &str, line: u32) {
        self.line = line;
        let bytes = file.as_bytes();
        let start = bytes.len().saturating_sub(MAX_FILE_NAME);
        let tail = bytes.get(start..).unwrap_or(&[]);
        self.file_name = [0; MAX_FILE_NAME];
        if let Some(dst) = self.file_name.get_mut(..tail.len()) {
            dst.copy_from_slice(tail);
        }
    }

    /// File name with trailing zero padding removed.
    #[must_use]
    pub fn file_name_bytes(&self) -> &[u8] {
        let end = self
            .file_name
            .iter()
            .rposition(|&b| b != 0)
            .map_or(0, |p| p.saturating_add(1));
        self.file_name.get(..end).unwrap_or(&[])
    }

    /// Task name with trailing zero padding removed.
    #[must_use]
    pub fn task_name_bytes(&self) -> &[u8] {
        let end = self
            .task_name
            .iter()
            .rposition(|&b| b != 0)
            .map_or(0, |p| p.saturating_add(1));
        self.task_name.get(..end).unwrap_or(&[])
    }

    /// Encode the record into its 440-byte persisted form.
    ///
    /// # Safety (lint allow)
    /// All range indices are compile-time constants within `[0, SIZE)`.
    /// The buffer is `[u8; Self::SIZE]` so all slices are always valid.
    #[must_use]
    #[allow(clippy::indexing_slicing)]
    #[allow(clippy::arithmetic_side_effects)] // offsets are const expressions
    pub fn encode(&self) -> [u8; Self::SIZE] {
        let mut buf = [0u8; Self::SIZE];
        buf[0..4].copy_from_slice(Self::MAGIC);
        buf[4] = Self::VERSION;
        buf[8..12].copy_from_slice(&self.line.to_le_bytes());
        buf[12..16].copy_from_slice(&self.flags.bits().to_le_bytes());
        buf[16..20].copy_from_slice(&self.task_id.to_le_bytes());
        buf[20..24].copy_from_slice(&self.interrupt_context_ptr.to_le_bytes());
        buf[24..64].copy_from_slice(&self.file_name);
        buf[64..88].copy_from_slice(&self.task_name);
        for (i, reg) in self.regs.iter().enumerate() {
            let off = 88 + i * 4;
            buf[off..off + 4].copy_from_slice(&reg.to_le_bytes());
        }
        encode_stack(&mut buf[160..160 + StackRegion::SIZE], &self.user_stack);
        encode_stack(&mut buf[300..300 + StackRegion::SIZE], &self.int_stack);
        buf
    }

    /// Decode a record from its persisted form.
    ///
    /// # Errors
    ///
    /// Returns [`RecordError::BadMagic`] if bytes `[0..4]` are not
    /// `b"SKFR"`, and [`RecordError::UnsupportedVersion`] if byte `[4]` is
    /// not [`FaultRecord::VERSION`].
    ///
    /// # Safety (lint allow)
    /// All range indices are compile-time constants within `[0, SIZE)`.
    /// The buffer is `&[u8; Self::SIZE]` so all slices are always valid.
    #[allow(clippy::indexing_slicing)]
    #[allow(clippy::arithmetic_side_effects)] // offsets are const expressions
    pub fn decode(buf: &[u8; Self::SIZE]) -> Result<Self, RecordError> {
        if buf.get(0..4) != Some(Self::MAGIC.as_ref()) {
            return Err(RecordError::BadMagic);
        }
        if buf.get(4).copied() != Some(Self::VERSION) {
            return Err(RecordError::UnsupportedVersion);
        }
        let mut record = Self::zeroed();
        record.line = read_u32(buf, 8);
        record.flags = FaultFlags::from_bits(read_u32(buf, 12));
        record.task_id = read_u32(buf, 16);
        record.interrupt_context_ptr = read_u32(buf, 20);
        record.file_name.copy_from_slice(&buf[24..64]);
        record.task_name.copy_from_slice(&buf[64..88]);
        for (i, reg) in record.regs.iter_mut().enumerate() {
            *reg = read_u32(buf, 88 + i * 4);
        }
        record.user_stack = decode_stack(&buf[160..160 + StackRegion::SIZE]);
        record.int_stack = decode_stack(&buf[300..300 + StackRegion::SIZE]);
        Ok(record)
    }
}

/// Read a little-endian u32 at `off`.
///
/// # Safety (lint allow)
/// Callers pass offsets at least 4 below the buffer length.
#[allow(clippy::indexing_slicing)]
#[allow(clippy::arithmetic_side_effects)]
fn read_u32(buf: &[u8], off: usize) -> u32 {
    let mut b = [0u8; 4];
    b.copy_from_slice(&buf[off..off + 4]);
    u32::from_le_bytes(b)
}

/// # Safety (lint allow)
/// `buf` is exactly `StackRegion::SIZE` bytes; offsets are const-derived.
#[allow(clippy::indexing_slicing)]
#[allow(clippy::arithmetic_side_effects)]
fn encode_stack(buf: &mut [u8], stack: &StackRegion) {
    buf[0..4].copy_from_slice(&stack.sp.to_le_bytes());
    buf[4..8].copy_from_slice(&stack.top.to_le_bytes());
    buf[8..12].copy_from_slice(&stack.size.to_le_bytes());
    for (i, word) in stack.window.iter().enumerate() {
        let off = 12 + i * 4;
        buf[off..off + 4].copy_from_slice(&word.to_le_bytes());
    }
}

/// # Safety (lint allow)
/// `buf` is exactly `StackRegion::SIZE` bytes; offsets are const-derived.
#[allow(clippy::indexing_slicing)]
#[allow(clippy::arithmetic_side_effects)]
fn decode_stack(buf: &[u8]) -> StackRegion {
    let mut stack = StackRegion::zeroed();
    stack.sp = read_u32(buf, 0);
    stack.top = read_u32(buf, 4);
    stack.size = read_u32(buf, 8);
    for (i, word) in stack.window.iter_mut().enumerate() {
        *word = read_u32(buf, 12 + i * 4);
    }
    stack
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::indexing_slicing,
    clippy::arithmetic_side_effects
)]
mod tests {
    use super::*;

    fn sample_record() -> FaultRecord {
        let mut r = FaultRecord::zeroed();
        r.set_source("src/attitude/estimator.c", 217);
        r.flags.insert(FaultFlags::REGS_PRESENT);
        r.flags.insert(FaultFlags::USER_STACK_PRESENT);
        r.task_id = 7;
        r.task_name[..8].copy_from_slice(b"attitude");
        r.interrupt_context_ptr = 0x2000_1F00;
        for (i, reg) in r.regs.iter_mut().enumerate() {
            *reg = 0x1000_0000 + i as u32;
        }
        r.user_stack = StackRegion {
            sp: 0x2000_7F80,
            top: 0x2000_8000,
            size: 0x800,
            window: [0xA5A5_A5A5; STACK_WINDOW_WORDS],
        };
        r
    }

    #[test]
    fn record_size_is_440_bytes() {
        assert_eq!(FaultRecord::SIZE, 440);
        assert_eq!(StackRegion::SIZE, 140);
    }

    #[test]
    fn record_roundtrip_is_byte_exact() {
        let r = sample_record();
        let bytes = r.encode();
        let decoded = FaultRecord::decode(&bytes).unwrap();
        assert_eq!(decoded, r);
        // Re-encoding reproduces the identical byte image.
        assert_eq!(decoded.encode(), bytes);
    }

    #[test]
    fn decode_rejects_bad_magic() {
        let mut bytes = sample_record().encode();
        bytes[0..4].copy_from_slice(b"NOPE");
        assert_eq!(FaultRecord::decode(&bytes), Err(RecordError::BadMagic));
    }

    #[test]
    fn decode_rejects_wrong_version() {
        let mut bytes = sample_record().encode();
        bytes[4] = 99;
        assert_eq!(
            FaultRecord::decode(&bytes),
            Err(RecordError::UnsupportedVersion)
        );
    }

    #[test]
    fn set_source_keeps_short_names_whole() {
        let mut r = FaultRecord::zeroed();
        r.set_source("main.c", 42);
        assert_eq!(r.file_name_bytes(), b"main.c");
        assert_eq!(r.line, 42);
    }

    #[test]
    fn set_source_keeps_tail_of_long_names() {
        let mut r = FaultRecord::zeroed();
        let long = "modules/navigation/ekf/covariance_prediction.c";
        r.set_source(long, 9);
        let kept = r.file_name_bytes();
        assert_eq!(kept.len(), MAX_FILE_NAME);
        // Suffix survives; prefix is what gets dropped.
        assert!(long.as_bytes().ends_with(kept));
        assert!(kept.ends_with(b"covariance_prediction.c"));
    }

    #[test]
    fn flags_contains_and_insert() {
        let mut f = FaultFlags::empty();
        assert!(!f.contains(FaultFlags::REGS_PRESENT));
        f.insert(FaultFlags::REGS_PRESENT);
        f.insert(FaultFlags::INT_STACK_PRESENT);
        assert!(f.contains(FaultFlags::REGS_PRESENT));
        assert!(f.contains(FaultFlags::INT_STACK_PRESENT));
        assert!(!f.contains(FaultFlags::INVALID_USER_SP));
        assert_eq!(FaultFlags::from_bits(f.bits()), f);
    }

    #[test]
    fn sp_in_bounds_is_half_open_range() {
        let mut s = StackRegion::zeroed();
        s.top = 0x2000_8000;
        s.size = 0x1000;

        s.sp = 0x2000_8000; // == top: valid
        assert!(s.sp_in_bounds());
        s.sp = 0x2000_7001; // just above top - size: valid
        assert!(s.sp_in_bounds());
        s.sp = 0x2000_7000; // == top - size: invalid (exclusive)
        assert!(!s.sp_in_bounds());
        s.sp = 0x2000_8004; // above top: invalid
        assert!(!s.sp_in_bounds());
    }

    #[test]
    fn window_addr_brackets_the_stack_pointer() {
        let mut s = StackRegion::zeroed();
        s.sp = 0x2000_1000;
        let half = STACK_WINDOW_WORDS / 2;
        assert_eq!(s.window_addr(0), 0x2000_1000 + (half as u32) * 4);
        assert_eq!(s.window_addr(half), 0x2000_1000);
        assert_eq!(
            s.window_addr(STACK_WINDOW_WORDS - 1),
            0x2000_1000 - (half as u32 - 1) * 4
        );
    }

    #[test]
    fn zeroed_record_has_no_flags() {
        let r = FaultRecord::zeroed();
        assert_eq!(r.flags, FaultFlags::empty());
        assert_eq!(r.file_name_bytes(), b"");
        assert_eq!(r.task_name_bytes(), b"");
    }
}
