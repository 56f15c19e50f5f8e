//! End-to-end scenarios across crash time and the boots that follow.
//!
//! Each test drives the real store over a mock nonvolatile region, with
//! recovery re-run per simulated boot against the same surviving bytes.

#![allow(clippy::unwrap_used, clippy::panic)]

use crashlog::{
    capture, run_fault_recovery, DumpFormat, FaultStore, InterruptContext, RecoveryConfig,
    RecoveryStatus, SlotStatus,
};
use crashlog::record::{REG_COUNT, REG_SP};
use platform::mocks::{MockConsole, MockMemory, MockNvram, MockReset, MockTask};
use platform::SystemStackInfo;

const SYS: SystemStackInfo = SystemStackInfo {
    idle_stack_top: 0x2000_0FFC,
    idle_stack_size: 0x400,
    interrupt_stack_top: 0x2001_1000,
    interrupt_stack_size: 0x800,
};

fn crash_and_persist(store: &mut FaultStore<MockNvram>) {
    let task = MockTask::new(6, "mixer", 0x2000_8000, 0x1000);
    let mem = MockMemory::self_addressed(0x2000_0000, 0x5000);
    let record = capture(0x2000_7E00, &task, None, "mixer.c", 301, &SYS, &mem);
    store.write("boot", &record).unwrap();
}

fn boot(
    store: &mut FaultStore<MockNvram>,
    input: &[u8],
) -> (RecoveryStatus, MockConsole) {
    let mut console = MockConsole::new();
    console.feed(input);
    let status = run_fault_recovery(
        store,
        "boot",
        &mut console,
        &mut MockReset,
        &RecoveryConfig::default(),
    )
    .unwrap();
    (status, console)
}

#[test]
fn reboot_loop_halts_on_the_third_boot() {
    let mut store = FaultStore::new(MockNvram::new());
    crash_and_persist(&mut store);

    // Boot 1: count becomes 1, below threshold, nobody at the console.
    let (status, _) = boot(&mut store, b"");
    assert_eq!(status, RecoveryStatus::Proceed);
    assert_eq!(store.reboot_count("boot").unwrap(), 1);

    // Boot 2 (crashed again before commit): boundary is inclusive.
    let (status, _) = boot(&mut store, b"");
    assert_eq!(status, RecoveryStatus::Proceed);
    assert_eq!(store.reboot_count("boot").unwrap(), 2);

    // Boot 3: the loop is real; halt for the operator, who continues.
    let (status, console) = boot(&mut store, b"b");
    assert_eq!(status, RecoveryStatus::Proceed);
    assert_eq!(store.reboot_count("boot").unwrap(), 3);
    assert!(console.output_str().contains("system halted"));
}

#[test]
fn operator_at_console_halts_on_first_reboot() {
    let mut store = FaultStore::new(MockNvram::new());
    crash_and_persist(&mut store);

    let (status, console) = boot(&mut store, b"b");
    assert_eq!(status, RecoveryStatus::Proceed);
    assert_eq!(store.reboot_count("boot").unwrap(), 1);
    assert!(console.output_str().contains("halted due to key press"));
    // The full dump reached the console before the menu.
    assert!(console.output_str().contains("file: mixer.c"));
    assert!(console.output_str().contains("line: 301"));
}

#[test]
fn menu_dump_clear_continue_rearms_the_slot() {
    let mut store = FaultStore::new(MockNvram::new());
    crash_and_persist(&mut store);
    store.increment_reboot_count("boot", false).unwrap();
    store.increment_reboot_count("boot", false).unwrap();

    let (status, console) = boot(&mut store, b"dcb");
    // Exiting the menu with 'b' resumes a normal boot.
    assert_eq!(status, RecoveryStatus::Proceed);

    let out = console.output_str();
    // 'd': the record was dumped again (initial halt dump + re-dump).
    assert!(out.matches("file: mixer.c").count() >= 2);
    // 'c': slot cleared and counter rearmed.
    assert_eq!(store.status("boot").unwrap(), SlotStatus::Absent);
    assert_eq!(store.reboot_count("boot").unwrap(), 0);
    // 'b': boot resumed.
    assert!(out.contains("continuing boot"));

    // The next boot sees nothing pending.
    let (status, _) = boot(&mut store, b"");
    assert_eq!(status, RecoveryStatus::Proceed);
}

#[test]
fn persisted_record_survives_reboots_byte_for_byte() {
    let mut store = FaultStore::new(MockNvram::new());
    let task = MockTask::new(3, "rc_input", 0x2000_6000, 0x800);
    let mem = MockMemory::self_addressed(0x2000_0000, 0x5000);
    let mut regs = [0u32; REG_COUNT];
    regs[REG_SP] = 0x2000_5F00;
    let ctx = InterruptContext {
        regs: &regs,
        raw_ptr: 0x2001_0FC0,
    };
    let record = capture(0x2001_0F00, &task, Some(ctx), "rc_input.c", 77, &SYS, &mem);
    store.write("boot", &record).unwrap();

    // Two boots later the bytes are unchanged.
    boot(&mut store, b"");
    boot(&mut store, b"");
    let back = store.read("boot").unwrap().unwrap();
    assert_eq!(back, record);
    assert_eq!(back.encode(), record.encode());
}

#[test]
fn export_dump_is_available_for_external_decoding() {
    let mut store = FaultStore::new(MockNvram::new());
    crash_and_persist(&mut store);
    let mut console = MockConsole::new();
    store
        .dump("boot", &mut console, DumpFormat::Export)
        .unwrap();
    assert!(console.output_str().contains("export.size: 440"));
}
