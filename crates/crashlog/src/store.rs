//! Persistent fault record store.
//!
//! Owns a byte-addressable nonvolatile region and divides it into named
//! slots, each holding one encoded [`FaultRecord`] plus a small header
//! with a presence marker, a reboot counter, and a CRC32 of the record.
//! Capture and recovery never touch the backing medium directly.
//!
//! Every operation is heap-free and safe to call with interrupts disabled
//! and the scheduler frozen: no locks, no queues, no formatted output.
//!
//! Slot header layout (16 bytes, little-endian):
//! ```text
//! [0..4]   magic        b"SKSL"
//! [4]      version      u8 = 1
//! [5]      state        u8 (0 = absent, 1 = present)
//! [6..8]   reboot_count u16
//! [8..12]  record_crc   u32 (CRC32 of the encoded record)
//! [12..16] _pad
//! ```

use platform::{NonvolatileRegion, NvError, RawConsole};
use thiserror_no_std::Error;

use crate::dump::{render_display, render_export, DumpFormat};
use crate::record::FaultRecord;

/// Names of the configured fault slots, in region order.
///
/// `"boot"` is the slot the fault entry writes and the boot-time recovery
/// inspects; `"flight"` is reserved for an in-air capture committed by the
/// logging task after a successful boot.
pub const SLOT_NAMES: &[&str] = &["boot", "flight"];

const SLOT_HEADER_SIZE: usize = 16;

/// Bytes occupied by one slot in the region.
pub const SLOT_SIZE: usize = SLOT_HEADER_SIZE + FaultRecord::SIZE;

const SLOT_MAGIC: &[u8; 4] = b"SKSL";
const SLOT_VERSION: u8 = 1;
const STATE_ABSENT: u8 = 0;
const STATE_PRESENT: u8 = 1;

/// Presence of a fault record in a slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SlotStatus {
    /// No pending fault record.
    Absent,
    /// A fault record is pending (captured, not yet cleared).
    Present,
}

/// Store operation failures.
///
/// `Unavailable` and `Full` are the two outcomes the fault path must be
/// able to tell apart with nothing but single raw characters left — see
/// [`report_write_failure`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum StoreError {
    /// The medium is unavailable or its contents were wiped (retention
    /// lost on power failure).
    #[error("persistent medium unavailable or wiped")]
    Unavailable,
    /// The slot does not fit inside the region.
    #[error("no space for fault slot in persistent region")]
    Full,
    /// The slot name is not in [`SLOT_NAMES`].
    #[error("unknown fault slot")]
    UnknownSlot,
    /// A record is marked present but fails its integrity check.
    #[error("stored fault record is corrupt")]
    Corrupt,
}

/// Decoded slot header, the store's only in-RAM view of slot state.
#[derive(Debug, Clone, Copy)]
struct SlotHeader {
    state: u8,
    reboot_count: u16,
    record_crc: u32,
}

impl SlotHeader {
    const fn fresh() -> Self {
        Self {
            state: STATE_ABSENT,
            reboot_count: 0,
            record_crc: 0,
        }
    }

    /// # Safety (lint allow)
    /// All range indices are compile-time constants within `[0, 16)`.
    #[allow(clippy::indexing_slicing)]
    fn encode(&self) -> [u8; SLOT_HEADER_SIZE] {
        let mut buf = [0u8; SLOT_HEADER_SIZE];
        buf[0..4].copy_from_slice(SLOT_MAGIC);
        buf[4] = SLOT_VERSION;
        buf[5] = self.state;
        buf[6..8].copy_from_slice(&self.reboot_count.to_le_bytes());
        buf[8..12].copy_from_slice(&self.record_crc.to_le_bytes());
        buf
    }

    /// `None` when the header bytes are not a recognisable slot header
    /// (factory-blank or scribbled-over medium).
    ///
    /// # Safety (lint allow)
    /// All range indices are compile-time constants within `[0, 16)`.
    #[allow(clippy::indexing_slicing)]
    fn decode(buf: &[u8; SLOT_HEADER_SIZE]) -> Option<Self> {
        if buf.get(0..4) != Some(SLOT_MAGIC.as_ref()) || buf.get(4).copied() != Some(SLOT_VERSION) {
            return None;
        }
        let mut count = [0u8; 2];
        count.copy_from_slice(&buf[6..8]);
        let mut crc = [0u8; 4];
        crc.copy_from_slice(&buf[8..12]);
        Some(Self {
            state: buf[5],
            reboot_count: u16::from_le_bytes(count),
            record_crc: u32::from_le_bytes(crc),
        })
    }
}

/// The fault record store. Exclusive owner of the slot region.
pub struct FaultStore<R: NonvolatileRegion> {
    region: R,
}

impl<R: NonvolatileRegion> FaultStore<R> {
    /// Take ownership of the backing region.
    pub fn new(region: R) -> Self {
        Self { region }
    }

    /// Write a freshly captured record into `slot`, marking it present
    /// and resetting the reboot counter to zero.
    ///
    /// # Errors
    ///
    /// [`StoreError::Unavailable`] when the medium reports itself wiped,
    /// [`StoreError::Full`] when the slot does not fit,
    /// [`StoreError::UnknownSlot`] for a name outside [`SLOT_NAMES`].
    pub fn write(&mut self, slot: &str, record: &FaultRecord) -> Result<(), StoreError> {
        let offset = self.slot_offset(slot)?;
        let bytes = record.encode();
        let header = SlotHeader {
            state: STATE_PRESENT,
            reboot_count: 0,
            record_crc: crc32fast::hash(&bytes),
        };
        self.region
            .write(record_offset(offset), &bytes)
            .map_err(map_nv)?;
        // Header last: a power loss mid-write leaves the slot absent
        // rather than pointing at a torn record.
        self.region
            .write(offset, &header.encode())
            .map_err(map_nv)?;
        Ok(())
    }

    /// Whether `slot` holds a pending fault record.
    ///
    /// A blank or unrecognisable header reads as [`SlotStatus::Absent`].
    pub fn status(&self, slot: &str) -> Result<SlotStatus, StoreError> {
        let offset = self.slot_offset(slot)?;
        let header = self.read_header(offset)?;
        match header {
            Some(h) if h.state == STATE_PRESENT => Ok(SlotStatus::Present),
            _ => Ok(SlotStatus::Absent),
        }
    }

    /// Read back the record in `slot`, verifying its CRC.
    ///
    /// Returns `Ok(None)` when the slot is absent.
    ///
    /// # Errors
    ///
    /// [`StoreError::Corrupt`] when the slot is marked present but the
    /// stored bytes fail the CRC or do not decode.
    pub fn read(&self, slot: &str) -> Result<Option<FaultRecord>, StoreError> {
        let offset = self.slot_offset(slot)?;
        let Some(header) = self.read_header(offset)? else {
            return Ok(None);
        };
        if header.state != STATE_PRESENT {
            return Ok(None);
        }
        let mut bytes = [0u8; FaultRecord::SIZE];
        self.region
            .read(record_offset(offset), &mut bytes)
            .map_err(map_nv)?;
        if crc32fast::hash(&bytes) != header.record_crc {
            return Err(StoreError::Corrupt);
        }
        FaultRecord::decode(&bytes).map(Some).map_err(|_| StoreError::Corrupt)
    }

    /// Render the record in `slot` through the raw character sink.
    ///
    /// An absent slot renders a single `fault: none` line.
    pub fn dump<C: RawConsole>(
        &self,
        slot: &str,
        sink: &mut C,
        format: DumpFormat,
    ) -> Result<(), StoreError> {
        match self.read(slot)? {
            Some(record) => {
                match format {
                    DumpFormat::Display => render_display(&record, sink),
                    DumpFormat::Export => render_export(&record, sink),
                }
                Ok(())
            }
            None => {
                sink.write_all(b"fault: none\r\n");
                Ok(())
            }
        }
    }

    /// Rearm `slot`: mark it absent and zero its reboot counter so it can
    /// capture a fresh fault. A no-op on an already-absent slot.
    pub fn clear(&mut self, slot: &str) -> Result<(), StoreError> {
        let offset = self.slot_offset(slot)?;
        self.write_header(offset, &SlotHeader::fresh())
    }

    /// Count one boot against the pending fault in `slot`.
    ///
    /// Called at most once per boot by recovery. With `also_clear` the
    /// slot is rearmed instead and the count returns to zero (the menu's
    /// `C` action).
    pub fn increment_reboot_count(
        &mut self,
        slot: &str,
        also_clear: bool,
    ) -> Result<u16, StoreError> {
        let offset = self.slot_offset(slot)?;
        // A blank medium still gets a well-defined counter.
        let mut header = match self.read_header(offset)? {
            Some(h) => h,
            None => SlotHeader::fresh(),
        };
        if also_clear {
            header = SlotHeader::fresh();
        } else {
            header.reboot_count = header.reboot_count.saturating_add(1);
        }
        self.write_header(offset, &header)?;
        Ok(header.reboot_count)
    }

    /// Current reboot counter for `slot` (zero on a blank header).
    pub fn reboot_count(&self, slot: &str) -> Result<u16, StoreError> {
        let offset = self.slot_offset(slot)?;
        Ok(self
            .read_header(offset)?
            .map_or(0, |h| h.reboot_count))
    }

    fn slot_offset(&self, slot: &str) -> Result<usize, StoreError> {
        let index = SLOT_NAMES
            .iter()
            .position(|&name| name == slot)
            .ok_or(StoreError::UnknownSlot)?;
        let offset = index.checked_mul(SLOT_SIZE).ok_or(StoreError::Full)?;
        let end = offset.checked_add(SLOT_SIZE).ok_or(StoreError::Full)?;
        if end > self.region.capacity() {
            return Err(StoreError::Full);
        }
        Ok(offset)
    }

    fn read_header(&self, offset: usize) -> Result<Option<SlotHeader>, StoreError> {
        let mut buf = [0u8; SLOT_HEADER_SIZE];
        self.region.read(offset, &mut buf).map_err(map_nv)?;
        Ok(SlotHeader::decode(&buf))
    }

    fn write_header(&mut self, offset: usize, header: &SlotHeader) -> Result<(), StoreError> {
        self.region.write(offset, &header.encode()).map_err(map_nv)
    }
}

const fn record_offset(slot_offset: usize) -> usize {
    // SLOT_HEADER_SIZE is a const; cannot overflow for any real region.
    slot_offset.wrapping_add(SLOT_HEADER_SIZE)
}

fn map_nv(err: NvError) -> StoreError {
    match err {
        NvError::Unavailable => StoreError::Unavailable,
        NvError::OutOfBounds => StoreError::Full,
    }
}

/// Report a persistence failure through the lowest-capability channel.
///
/// At fault time the only remaining output may be the raw transmit
/// register: the wiped-medium case gets a short fixed message, the
/// no-space case a single `'!'`. Failures are reported, never retried —
/// a retry risks a second fault.
pub fn report_write_failure<C: RawConsole>(err: StoreError, console: &mut C) {
    match err {
        StoreError::Unavailable => console.write_all(b"Memory wiped - dump not saved!"),
        StoreError::Full => console.write_char(b'!'),
        StoreError::UnknownSlot | StoreError::Corrupt => console.write_char(b'?'),
    }
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
    use crate::record::FaultFlags;
    use platform::mocks::{MockConsole, MockNvram};

    fn sample_record() -> FaultRecord {
        let mut r = FaultRecord::zeroed();
        r.set_source("estimator.c", 99);
        r.task_id = 4;
        r.flags.insert(FaultFlags::USER_STACK_PRESENT);
        r.user_stack.sp = 0x2000_7000;
        r.user_stack.top = 0x2000_8000;
        r.user_stack.size = 0x1000;
        r
    }

    #[test]
    fn fresh_region_reads_absent() {
        let store = FaultStore::new(MockNvram::new());
        assert_eq!(store.status("boot").unwrap(), SlotStatus::Absent);
        assert!(store.read("boot").unwrap().is_none());
    }

    #[test]
    fn write_then_read_reproduces_every_field() {
        let mut store = FaultStore::new(MockNvram::new());
        let record = sample_record();
        store.write("boot", &record).unwrap();
        assert_eq!(store.status("boot").unwrap(), SlotStatus::Present);
        let back = store.read("boot").unwrap().unwrap();
        assert_eq!(back, record);
        assert_eq!(back.encode(), record.encode());
    }

    #[test]
    fn slots_are_independent() {
        let mut store = FaultStore::new(MockNvram::new());
        store.write("boot", &sample_record()).unwrap();
        assert_eq!(store.status("boot").unwrap(), SlotStatus::Present);
        assert_eq!(store.status("flight").unwrap(), SlotStatus::Absent);
    }

    #[test]
    fn clear_then_status_reports_absent() {
        let mut store = FaultStore::new(MockNvram::new());
        store.write("boot", &sample_record()).unwrap();
        store.clear("boot").unwrap();
        assert_eq!(store.status("boot").unwrap(), SlotStatus::Absent);
        assert!(store.read("boot").unwrap().is_none());
    }

    #[test]
    fn clear_twice_on_absent_slot_is_a_noop() {
        let mut store = FaultStore::new(MockNvram::new());
        store.clear("boot").unwrap();
        store.clear("boot").unwrap();
        assert_eq!(store.status("boot").unwrap(), SlotStatus::Absent);
        assert_eq!(store.reboot_count("boot").unwrap(), 0);
    }

    #[test]
    fn reboot_count_starts_at_zero_and_increments() {
        let mut store = FaultStore::new(MockNvram::new());
        store.write("boot", &sample_record()).unwrap();
        assert_eq!(store.reboot_count("boot").unwrap(), 0);
        assert_eq!(store.increment_reboot_count("boot", false).unwrap(), 1);
        assert_eq!(store.increment_reboot_count("boot", false).unwrap(), 2);
        assert_eq!(store.reboot_count("boot").unwrap(), 2);
    }

    #[test]
    fn increment_with_clear_rearms_the_slot() {
        let mut store = FaultStore::new(MockNvram::new());
        store.write("boot", &sample_record()).unwrap();
        store.increment_reboot_count("boot", false).unwrap();
        assert_eq!(store.increment_reboot_count("boot", true).unwrap(), 0);
        assert_eq!(store.status("boot").unwrap(), SlotStatus::Absent);
        assert_eq!(store.reboot_count("boot").unwrap(), 0);
    }

    #[test]
    fn increment_on_blank_medium_is_well_defined() {
        let mut store = FaultStore::new(MockNvram::new());
        assert_eq!(store.increment_reboot_count("boot", false).unwrap(), 1);
        // Header initialized, still no record present.
        assert_eq!(store.status("boot").unwrap(), SlotStatus::Absent);
    }

    #[test]
    fn write_preserves_counter_reset_semantics() {
        // A fresh capture starts the loop counter from zero.
        let mut store = FaultStore::new(MockNvram::new());
        store.write("boot", &sample_record()).unwrap();
        store.increment_reboot_count("boot", false).unwrap();
        store.write("boot", &sample_record()).unwrap();
        assert_eq!(store.reboot_count("boot").unwrap(), 0);
    }

    #[test]
    fn unavailable_medium_reports_distinct_error() {
        let mut nv = MockNvram::new();
        nv.set_unavailable(true);
        let mut store = FaultStore::new(nv);
        assert_eq!(
            store.write("boot", &sample_record()),
            Err(StoreError::Unavailable)
        );
        assert_eq!(store.status("boot"), Err(StoreError::Unavailable));
    }

    #[test]
    fn undersized_region_reports_full() {
        let mut store = FaultStore::new(MockNvram::with_capacity(SLOT_SIZE / 2));
        assert_eq!(
            store.write("boot", &sample_record()),
            Err(StoreError::Full)
        );
    }

    #[test]
    fn second_slot_beyond_capacity_reports_full() {
        // Room for exactly one slot: "boot" works, "flight" does not.
        let mut store = FaultStore::new(MockNvram::with_capacity(SLOT_SIZE));
        store.write("boot", &sample_record()).unwrap();
        assert_eq!(
            store.write("flight", &sample_record()),
            Err(StoreError::Full)
        );
    }

    #[test]
    fn unknown_slot_is_rejected() {
        let store = FaultStore::new(MockNvram::new());
        assert_eq!(store.status("nonsense"), Err(StoreError::UnknownSlot));
    }

    #[test]
    fn corrupted_record_fails_integrity_check() {
        let mut nv = MockNvram::new();
        let mut store = FaultStore::new(nv);
        store.write("boot", &sample_record()).unwrap();
        // Clobber a byte inside the stored record, behind the store's back.
        nv = store.region;
        nv.write(SLOT_SIZE - 1, &[0xFF]).unwrap();
        let store = FaultStore::new(nv);
        assert_eq!(store.read("boot"), Err(StoreError::Corrupt));
    }

    #[test]
    fn report_write_failure_distinguishes_outcomes() {
        let mut console = MockConsole::new();
        report_write_failure(StoreError::Unavailable, &mut console);
        assert_eq!(console.output(), b"Memory wiped - dump not saved!");

        let mut console = MockConsole::new();
        report_write_failure(StoreError::Full, &mut console);
        assert_eq!(console.output(), b"!");
    }

    #[test]
    fn dump_on_absent_slot_says_none() {
        let store = FaultStore::new(MockNvram::new());
        let mut console = MockConsole::new();
        store.dump("boot", &mut console, DumpFormat::Display).unwrap();
        assert_eq!(console.output(), b"fault: none\r\n");
    }
}
