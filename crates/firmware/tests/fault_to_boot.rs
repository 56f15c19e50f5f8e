//! Crash-to-boot integration: the fault entry persists a record, the
//! next boots run recovery through the firmware surface.

#![allow(clippy::unwrap_used, clippy::panic)]

use crashlog::{FaultStore, RecoveryConfig, RecoveryStatus, SlotStatus};
use firmware::{run_fault_recovery, CrashConfig, CrashHandler, FAULT_SLOT};
use platform::mocks::{MockConsole, MockMemory, MockNvram, MockReset, MockTask};
use platform::SystemStackInfo;

const SYS: SystemStackInfo = SystemStackInfo {
    idle_stack_top: 0x2000_0FFC,
    idle_stack_size: 0x400,
    interrupt_stack_top: 0x2001_1000,
    interrupt_stack_size: 0x800,
};

#[test]
fn crash_then_two_boots_then_operator_clears() {
    // Crash time: the trap routes into the handler.
    let mut handler = CrashHandler::new(
        FaultStore::new(MockNvram::new()),
        MockConsole::new(),
        MockReset,
        MockMemory::self_addressed(0x2000_0000, 0x5000),
        SYS,
        CrashConfig::default(),
    );
    let task = MockTask::new(8, "baro", 0x2000_8000, 0x1000);
    handler.on_fault(0x2000_7E80, &task, None, "baro.c", 140);
    let (mut store, _) = handler.into_parts();

    // Boots 1 and 2: nobody at the console, under the loop threshold.
    for expected_count in 1..=2u16 {
        let mut console = MockConsole::new();
        let status = run_fault_recovery(
            &mut store,
            &mut console,
            &mut MockReset,
            &RecoveryConfig::default(),
        )
        .unwrap();
        assert_eq!(status, RecoveryStatus::Proceed);
        assert_eq!(store.reboot_count(FAULT_SLOT).unwrap(), expected_count);
    }

    // Boot 3: crash loop confirmed; operator dumps, clears, continues.
    let mut console = MockConsole::new();
    console.feed(b"dcb");
    let status = run_fault_recovery(
        &mut store,
        &mut console,
        &mut MockReset,
        &RecoveryConfig::default(),
    )
    .unwrap();
    assert_eq!(status, RecoveryStatus::Proceed);
    assert!(console.output_str().contains("system halted"));
    assert!(console.output_str().contains("file: baro.c"));
    assert_eq!(store.status(FAULT_SLOT).unwrap(), SlotStatus::Absent);
    assert_eq!(store.reboot_count(FAULT_SLOT).unwrap(), 0);
}
