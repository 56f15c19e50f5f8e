//! Boot-time fault recovery.
//!
//! Runs once per boot, after the store is reachable but before most
//! peripheral bring-up. Decides between continuing the boot and halting
//! for interactive recovery, using only two inputs that survived the
//! crash: the slot's reboot counter and whether an operator is already
//! waiting at the console.
//!
//! The interactive loop deliberately has no timeout: an unresolved
//! diagnostic must not be silently discarded, and nothing else can or
//! should run while the operator decides.

use core::fmt::Write as _;

use platform::{BoardReset, NonvolatileRegion, RawConsole};

use crate::dump::{DumpFormat, SinkWriter};
use crate::store::{FaultStore, SlotStatus, StoreError};

/// Consecutive reboots with an uncommitted fault before boot is halted.
///
/// A single observed crash must not strand the vehicle on the bench — the
/// commit-to-storage step later in boot may still succeed — so the first
/// two reboots proceed automatically. This is a fixed safety constant,
/// not configuration.
pub const REBOOT_LOOP_THRESHOLD: u16 = 2;

/// Outcome of the boot-time recovery check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum RecoveryStatus {
    /// Boot continues: the slot was absent, the loop threshold was not
    /// exceeded, or the operator exited the recovery menu with the
    /// explicit continue action.
    Proceed,
    /// Boot is parked in the interactive recovery loop. The only way out
    /// is the operator's continue action, after which [`run`] reports
    /// [`RecoveryStatus::Proceed`].
    Halted,
}

/// Startup-resolved recovery policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct RecoveryConfig {
    /// Force a clean board reset after the interactive loop exits.
    pub reset_after_recovery: bool,
}

/// The interactive loop as an explicit state machine, driven by one
/// synchronous character read per step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MenuState {
    AwaitingInput,
    Proceeding,
}

/// Run the boot-time fault recovery check against `slot`.
///
/// Contract: called exactly once per boot, before normal task scheduling
/// begins. Each call that observes a pending fault counts one reboot
/// against it.
///
/// # Errors
///
/// Store failures propagate; the caller decides whether a boot without a
/// readable crash log is acceptable.
pub fn run<R, C, B>(
    store: &mut FaultStore<R>,
    slot: &str,
    console: &mut C,
    reset: &mut B,
    config: &RecoveryConfig,
) -> Result<RecoveryStatus, StoreError>
where
    R: NonvolatileRegion,
    C: RawConsole,
    B: BoardReset,
{
    if store.status(slot)? == SlotStatus::Absent {
        return Ok(RecoveryStatus::Proceed);
    }

    console.write_all(b"[boot] there is a hard fault logged\r\n");
    let reboots = store.increment_reboot_count(slot, false)?;
    let operator_waiting = console.input_pending();

    if reboots <= REBOOT_LOOP_THRESHOLD && !operator_waiting {
        // Logged but non-fatal: the commit step later in boot may still
        // succeed, so retry automatically.
        let mut w = SinkWriter::new(console);
        let _ = write!(w, "[boot] continuing, reboot {reboots} with uncommitted fault\r\n");
        return Ok(RecoveryStatus::Proceed);
    }

    // Crash loop or operator present: show everything we have and stop.
    store.dump(slot, console, DumpFormat::Display)?;
    {
        let mut w = SinkWriter::new(console);
        let _ = write!(
            w,
            "[boot] {reboots} reboots with an uncommitted hard fault - system halted\r\n"
        );
        if operator_waiting {
            let _ = write!(w, "[boot] halted due to key press\r\n");
        }
    }

    let mut state = MenuState::AwaitingInput;
    print_menu(console);

    while state == MenuState::AwaitingInput {
        match console.read_char() {
            // End of input behaves like whitespace: re-prompt, keep waiting.
            None => {
                console.write_all(b"?>");
            }
            Some(c) if c.is_ascii_whitespace() => {
                console.write_all(b"?>");
            }
            Some(c) => {
                console.write_char(c);
                console.write_all(b"\r\n");
                match c {
                    b'D' | b'd' => {
                        store.dump(slot, console, DumpFormat::Display)?;
                    }
                    b'C' | b'c' => {
                        store.clear(slot)?;
                        store.increment_reboot_count(slot, true)?;
                    }
                    b'B' | b'b' => {
                        state = MenuState::Proceeding;
                    }
                    _ => {}
                }
                if state == MenuState::AwaitingInput {
                    print_menu(console);
                }
            }
        }
    }

    console.write_all(b"[boot] continuing boot\r\n");
    if config.reset_after_recovery {
        reset.reset();
    }
    // The halted state has resolved through the continue action.
    Ok(RecoveryStatus::Proceed)
}

fn print_menu<C: RawConsole>(console: &mut C) {
    console.write_all(
        b"\r\nEnter B - Continue booting\r\n\
          Enter C - Clear the fault log\r\n\
          Enter D - Dump fault log\r\n\r\n?>",
    );
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
    use crate::record::{FaultFlags, FaultRecord};
    use platform::mocks::{MockConsole, MockNvram, MockReset};

    fn store_with_fault() -> FaultStore<MockNvram> {
        let mut store = FaultStore::new(MockNvram::new());
        let mut record = FaultRecord::zeroed();
        record.set_source("servo.c", 55);
        record.task_id = 2;
        record.flags.insert(FaultFlags::USER_STACK_PRESENT);
        store.write("boot", &record).unwrap();
        store
    }

    #[test]
    fn absent_slot_proceeds_without_touching_the_counter() {
        let mut store = FaultStore::new(MockNvram::new());
        let mut console = MockConsole::new();
        let status = run(
            &mut store,
            "boot",
            &mut console,
            &mut MockReset,
            &RecoveryConfig::default(),
        )
        .unwrap();
        assert_eq!(status, RecoveryStatus::Proceed);
        assert_eq!(store.reboot_count("boot").unwrap(), 0);
        assert!(console.output().is_empty());
    }

    #[test]
    fn pending_fault_below_threshold_proceeds_and_counts() {
        let mut store = store_with_fault();
        let mut console = MockConsole::new();
        let status = run(
            &mut store,
            "boot",
            &mut console,
            &mut MockReset,
            &RecoveryConfig::default(),
        )
        .unwrap();
        assert_eq!(status, RecoveryStatus::Proceed);
        assert_eq!(store.reboot_count("boot").unwrap(), 1);
        assert!(console.output_str().contains("hard fault logged"));
    }

    #[test]
    fn operator_key_press_halts_regardless_of_count() {
        let mut store = store_with_fault();
        let mut console = MockConsole::new();
        console.feed(b"b"); // pending input forces the menu; 'b' exits it
        let status = run(
            &mut store,
            "boot",
            &mut console,
            &mut MockReset,
            &RecoveryConfig::default(),
        )
        .unwrap();
        assert_eq!(status, RecoveryStatus::Proceed);
        assert_eq!(store.reboot_count("boot").unwrap(), 1);
        assert!(console.output_str().contains("halted due to key press"));
    }

    #[test]
    fn menu_dump_clear_continue_returns_proceed() {
        let mut store = store_with_fault();
        store.increment_reboot_count("boot", false).unwrap();
        store.increment_reboot_count("boot", false).unwrap();
        let mut console = MockConsole::new();
        console.feed(b"dcb");
        let status = run(
            &mut store,
            "boot",
            &mut console,
            &mut MockReset,
            &RecoveryConfig::default(),
        )
        .unwrap();
        // The continue action is the way out of the halted state: the
        // caller sees a normal boot, with the slot rearmed behind it.
        assert_eq!(status, RecoveryStatus::Proceed);
        assert_eq!(store.status("boot").unwrap(), SlotStatus::Absent);
        assert_eq!(store.reboot_count("boot").unwrap(), 0);
    }

    #[test]
    fn end_of_input_reprompts_like_whitespace() {
        let mut store = store_with_fault();
        let mut console = DetachingConsole::new(&[None, Some(b'b')]);
        let status = run(
            &mut store,
            "boot",
            &mut console,
            &mut MockReset,
            &RecoveryConfig::default(),
        )
        .unwrap();
        assert_eq!(status, RecoveryStatus::Proceed);
        // One "?>" from the menu, one from the end-of-input re-prompt.
        assert_eq!(console.output_str().matches("?>").count(), 2);
    }

    /// Console whose reads can report end-of-input mid-session.
    struct DetachingConsole {
        script: Vec<Option<u8>>,
        output: Vec<u8>,
    }

    impl DetachingConsole {
        fn new(script: &[Option<u8>]) -> Self {
            Self {
                script: script.to_vec(),
                output: Vec::new(),
            }
        }

        fn output_str(&self) -> &str {
            core::str::from_utf8(&self.output).unwrap_or("<non-utf8 output>")
        }
    }

    impl RawConsole for DetachingConsole {
        fn write_char(&mut self, byte: u8) {
            self.output.push(byte);
        }

        fn read_char(&mut self) -> Option<u8> {
            if self.script.is_empty() {
                None
            } else {
                self.script.remove(0)
            }
        }

        fn input_pending(&self) -> bool {
            !self.script.is_empty()
        }
    }

    #[test]
    fn unknown_menu_characters_reprint_the_menu() {
        let mut store = store_with_fault();
        // Push past the threshold so the menu opens without pending input
        // mattering.
        store.increment_reboot_count("boot", false).unwrap();
        store.increment_reboot_count("boot", false).unwrap();
        let mut console = MockConsole::new();
        console.feed(b"x b");
        let status = run(
            &mut store,
            "boot",
            &mut console,
            &mut MockReset,
            &RecoveryConfig::default(),
        )
        .unwrap();
        assert_eq!(status, RecoveryStatus::Proceed);
        let menus = console
            .output_str()
            .matches("Enter B - Continue booting")
            .count();
        // Initial menu, after 'x', not after the whitespace re-prompt.
        assert!(menus >= 2, "menu shown {menus} times");
    }
}
