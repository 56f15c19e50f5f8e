//! Boot sequence for the Skylark FCC.
//!
//! Initialization order (MUST be respected — order matters for safety):
//!   1. Clocks and the raw console (needed for recovery messages)
//!   2. Map the battery-backed slot region and build the fault store
//!   3. Fault recovery check — BEFORE peripheral bring-up, so a crash
//!      loop in a driver cannot prevent the operator from reaching the
//!      recovery menu
//!   4. Peripheral bring-up (storage, bus, USB, timers)
//!   5. LED indication and normal task scheduling

use crashlog::{FaultStore, RecoveryConfig, RecoveryStatus, StoreError};
use platform::{BoardReset, NonvolatileRegion, RawConsole};

use crate::fault::FAULT_SLOT;

/// Ordered list of boot sequence steps for documentation and testing.
///
/// Tests assert that the fault-recovery step precedes peripheral
/// bring-up: the whole point of the persistent crash log is to be read
/// before anything that might crash again is started.
pub const BOOT_SEQUENCE_STEPS: &[&str] = &[
    "1. Clocks + raw console: minimal output path for recovery messages",
    "2. Persistent region: map battery-backed slots, build the fault store",
    "3. Fault recovery: inspect the boot slot, count the reboot, maybe halt",
    "4. Peripheral bring-up: storage, bus, USB, timers",
    "5. Indication + scheduler: LEDs, normal task start",
];

/// Emit the boot banner, then run the fault recovery check against the
/// boot slot.
///
/// Called exactly once per boot, as early as the store and console allow.
/// A store failure here is reported to the caller; the board decides
/// whether to boot without a readable crash log.
pub fn run_fault_recovery<R, C, B>(
    store: &mut FaultStore<R>,
    console: &mut C,
    reset: &mut B,
    config: &RecoveryConfig,
) -> Result<RecoveryStatus, StoreError>
where
    R: NonvolatileRegion,
    C: RawConsole,
    B: BoardReset,
{
    console.write_all(platform::config::APP_NAME.as_bytes());
    console.write_all(b" v");
    console.write_all(platform::config::APP_VERSION.as_bytes());
    console.write_all(b" boot\r\n");
    crashlog::run_fault_recovery(store, FAULT_SLOT, console, reset, config)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;
    use platform::mocks::{MockConsole, MockNvram, MockReset};

    fn step_index(needle: &str) -> usize {
        BOOT_SEQUENCE_STEPS
            .iter()
            .position(|s| s.contains(needle))
            .unwrap_or_else(|| panic!("boot step containing {needle:?} missing"))
    }

    #[test]
    fn recovery_runs_before_peripheral_bring_up() {
        assert!(step_index("Fault recovery") < step_index("Peripheral bring-up"));
    }

    #[test]
    fn store_exists_before_recovery_needs_it() {
        assert!(step_index("Persistent region") < step_index("Fault recovery"));
    }

    #[test]
    fn console_exists_before_recovery_needs_it() {
        assert!(step_index("raw console") < step_index("Fault recovery"));
    }

    #[test]
    fn recovery_wrapper_targets_the_boot_slot() {
        let mut store = FaultStore::new(MockNvram::new());
        let mut console = MockConsole::new();
        let status = run_fault_recovery(
            &mut store,
            &mut console,
            &mut MockReset,
            &RecoveryConfig::default(),
        )
        .unwrap();
        assert_eq!(status, RecoveryStatus::Proceed);
        let out = console.output_str();
        assert!(out.contains(platform::config::APP_NAME));
        assert!(out.contains(platform::config::APP_VERSION));
        assert!(out.contains(" boot\r\n"));
    }
}
