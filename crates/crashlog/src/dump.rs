//! Human-readable rendering of a fault record.
//!
//! Written through the raw character sink, one labeled field per line, so
//! the output is stable and machine-greppable even on a console with no
//! line discipline. The export format emits the raw encoded bytes as hex
//! for decoding by an external tool.

use core::fmt::{self, Write as _};

use platform::RawConsole;

use crate::record::{FaultFlags, FaultRecord, StackRegion, STACK_WINDOW_WORDS};

/// Rendering formats for a persisted fault record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DumpFormat {
    /// Line-oriented human-readable rendering (`field: value` per line).
    Display,
    /// Hex dump of the raw encoded record, for external decoders.
    Export,
}

/// `core::fmt::Write` adapter over a raw character sink.
///
/// Formatting through this writer never buffers and never fails; it
/// exists so the dump code can use `write!` for hex fields while the
/// sink stays a plain character primitive.
pub struct SinkWriter<'a, C: RawConsole> {
    sink: &'a mut C,
}

impl<'a, C: RawConsole> SinkWriter<'a, C> {
    /// Wrap a sink.
    pub fn new(sink: &'a mut C) -> Self {
        Self { sink }
    }
}

impl<C: RawConsole> fmt::Write for SinkWriter<'_, C> {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        self.sink.write_all(s.as_bytes());
        Ok(())
    }
}

/// Render the display format: every field labeled, one per line.
pub fn render_display<C: RawConsole>(record: &FaultRecord, sink: &mut C) {
    let mut w = SinkWriter::new(sink);

    let _ = write!(w, "file: ");
    write_bytes_printable(&mut w, record.file_name_bytes());
    let _ = write!(w, "\r\nline: {}\r\n", record.line);
    let _ = write!(w, "task_id: {}\r\n", record.task_id);
    let _ = write!(w, "task_name: ");
    write_bytes_printable(&mut w, record.task_name_bytes());
    let _ = write!(w, "\r\nflags: 0x{:08X}\r\n", record.flags.bits());
    let _ = write!(
        w,
        "current_regs: 0x{:08X}\r\n",
        record.interrupt_context_ptr
    );

    if record.flags.contains(FaultFlags::REGS_PRESENT) {
        for (i, reg) in record.regs.iter().enumerate() {
            let _ = write!(w, "r{i:02}: 0x{reg:08X}\r\n");
        }
    }

    render_stack(
        &mut w,
        "ustack",
        &record.user_stack,
        record.flags.contains(FaultFlags::USER_STACK_PRESENT),
        !record.flags.contains(FaultFlags::INVALID_USER_SP),
    );
    render_stack(
        &mut w,
        "istack",
        &record.int_stack,
        record.flags.contains(FaultFlags::INT_STACK_PRESENT),
        !record.flags.contains(FaultFlags::INVALID_INT_SP),
    );
}

fn render_stack<C: RawConsole>(
    w: &mut SinkWriter<'_, C>,
    label: &str,
    stack: &StackRegion,
    present: bool,
    valid: bool,
) {
    let _ = write!(w, "{label}.present: {}\r\n", u8::from(present));
    if !present {
        return;
    }
    let _ = write!(w, "{label}.sp: 0x{:08X}\r\n", stack.sp);
    let _ = write!(w, "{label}.top: 0x{:08X}\r\n", stack.top);
    let _ = write!(w, "{label}.size: 0x{:08X}\r\n", stack.size);
    let _ = write!(w, "{label}.valid: {}\r\n", u8::from(valid));
    for i in 0..STACK_WINDOW_WORDS {
        let addr = stack.window_addr(i);
        let word = stack.window.get(i).copied().unwrap_or(0);
        let _ = write!(w, "{label}[0x{addr:08X}]: 0x{word:08X}\r\n");
    }
}

/// Render the export format: raw encoded bytes, 16 hex values per line.
pub fn render_export<C: RawConsole>(record: &FaultRecord, sink: &mut C) {
    let bytes = record.encode();
    let mut w = SinkWriter::new(sink);
    let _ = write!(w, "export.size: {}\r\n", FaultRecord::SIZE);
    for (i, chunk) in bytes.chunks(16).enumerate() {
        let _ = write!(w, "export[{:03}]:", i.wrapping_mul(16));
        for byte in chunk {
            let _ = write!(w, " {byte:02X}");
        }
        let _ = write!(w, "\r\n");
    }
}

/// Write bytes that came from possibly-damaged memory: printable ASCII
/// passes through, anything else renders as `.`.
fn write_bytes_printable<C: RawConsole>(w: &mut SinkWriter<'_, C>, bytes: &[u8]) {
    for &b in bytes {
        let shown = if (0x20..0x7F).contains(&b) { b } else { b'.' };
        w.sink.write_char(shown);
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
    use platform::mocks::MockConsole;

    fn sample_record() -> FaultRecord {
        let mut r = FaultRecord::zeroed();
        r.set_source("estimator.c", 217);
        r.task_id = 7;
        r.task_name[..8].copy_from_slice(b"attitude");
        r.flags.insert(FaultFlags::REGS_PRESENT);
        r.flags.insert(FaultFlags::USER_STACK_PRESENT);
        r.flags.insert(FaultFlags::INT_STACK_PRESENT);
        r.interrupt_context_ptr = 0x2000_FFC0;
        r.regs[0] = 0xCAFE_F00D;
        r.user_stack.sp = 0x2000_7F80;
        r.user_stack.top = 0x2000_8000;
        r.user_stack.size = 0x1000;
        r.user_stack.window[0] = 0xDEAD_BEEF;
        r.int_stack.sp = 0x2001_0F00;
        r.int_stack.top = 0x2001_1000;
        r.int_stack.size = 0x800;
        r
    }

    #[test]
    fn display_emits_one_labeled_field_per_line() {
        let record = sample_record();
        let mut console = MockConsole::new();
        render_display(&record, &mut console);
        let out = console.output_str();

        assert!(out.contains("file: estimator.c\r\n"));
        assert!(out.contains("line: 217\r\n"));
        assert!(out.contains("task_id: 7\r\n"));
        assert!(out.contains("task_name: attitude\r\n"));
        assert!(out.contains("current_regs: 0x2000FFC0\r\n"));
        assert!(out.contains("r00: 0xCAFEF00D\r\n"));
        assert!(out.contains("ustack.sp: 0x20007F80\r\n"));
        assert!(out.contains("ustack.valid: 1\r\n"));
        assert!(out.contains("istack.present: 1\r\n"));
    }

    #[test]
    fn display_skips_registers_when_absent() {
        let mut record = sample_record();
        record.flags = FaultFlags::USER_STACK_PRESENT;
        let mut console = MockConsole::new();
        render_display(&record, &mut console);
        let out = console.output_str();
        assert!(!out.contains("r00:"));
        assert!(out.contains("istack.present: 0\r\n"));
        assert!(!out.contains("istack.sp:"));
    }

    #[test]
    fn display_labels_window_words_with_their_addresses() {
        let record = sample_record();
        let mut console = MockConsole::new();
        render_display(&record, &mut console);
        let out = console.output_str();
        // Word 0 sits half a window above the SP: 0x20007F80 + 16*4.
        assert!(out.contains("ustack[0x20007FC0]: 0xDEADBEEF\r\n"));
    }

    #[test]
    fn display_marks_invalid_stack() {
        let mut record = sample_record();
        record.flags.insert(FaultFlags::INVALID_USER_SP);
        let mut console = MockConsole::new();
        render_display(&record, &mut console);
        assert!(console.output_str().contains("ustack.valid: 0\r\n"));
    }

    #[test]
    fn non_printable_name_bytes_render_as_dots() {
        let mut record = sample_record();
        record.task_name = [0; 24];
        record.task_name[..4].copy_from_slice(&[b'a', 0x01, 0xFF, b'b']);
        let mut console = MockConsole::new();
        render_display(&record, &mut console);
        assert!(console.output_str().contains("task_name: a..b\r\n"));
    }

    #[test]
    fn export_covers_every_record_byte() {
        let record = sample_record();
        let mut console = MockConsole::new();
        render_export(&record, &mut console);
        let out = console.output_str();
        assert!(out.contains("export.size: 440\r\n"));
        // 440 bytes = 27 full lines + one 8-byte line; last offset 432.
        assert!(out.contains("export[432]:"));
        // First line starts with the record magic bytes "SKFR".
        assert!(out.contains("export[000]: 53 4B 46 52"));
    }
}
