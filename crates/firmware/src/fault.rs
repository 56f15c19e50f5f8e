//! The system-wide fault entry point.
//!
//! [`CrashHandler::on_fault`] is what the low-level fault trap calls. It
//! runs with interrupts disabled on a stack it cannot trust, so the whole
//! path is capture → persist → single-character failure reporting →
//! optional reset, with no allocation and no retry.

use crashlog::capture::InterruptContext;
use crashlog::{capture, report_write_failure, FaultRecord, FaultStore};
use platform::{BoardReset, NonvolatileRegion, RawConsole, RawMemory, SystemStackInfo, TaskDescriptor};

/// The slot the fault entry writes and boot-time recovery inspects.
pub const FAULT_SLOT: &str = "boot";

/// Crash-time policy, resolved once at startup.
///
/// Disabling persistence or auto-reset must leave capture functioning:
/// the record still lands in the handler's arena for a debugger to read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct CrashConfig {
    /// Write the captured record to the persistent slot.
    pub persist: bool,
    /// Reset the board once the record has been handled.
    pub reset_on_crash: bool,
}

impl Default for CrashConfig {
    fn default() -> Self {
        Self {
            persist: true,
            reset_on_crash: false,
        }
    }
}

/// Owns everything the fault path needs, so the trap handler has a single
/// object to call into and nothing to look up while the system is broken.
///
/// On hardware the board places this in a static: the record field
/// doubles as the statically-allocated capture arena, guaranteed
/// available under memory pressure because it was never on the heap.
pub struct CrashHandler<R, C, B, M>
where
    R: NonvolatileRegion,
    C: RawConsole,
    B: BoardReset,
    M: RawMemory,
{
    store: FaultStore<R>,
    console: C,
    reset: B,
    memory: M,
    system_stacks: SystemStackInfo,
    config: CrashConfig,
    arena: FaultRecord,
}

impl<R, C, B, M> CrashHandler<R, C, B, M>
where
    R: NonvolatileRegion,
    C: RawConsole,
    B: BoardReset,
    M: RawMemory,
{
    /// Assemble the handler. Called once during early startup, before
    /// faults can be routed here.
    pub fn new(
        store: FaultStore<R>,
        console: C,
        reset: B,
        memory: M,
        system_stacks: SystemStackInfo,
        config: CrashConfig,
    ) -> Self {
        Self {
            store,
            console,
            reset,
            memory,
            system_stacks,
            config,
            arena: FaultRecord::zeroed(),
        }
    }

    /// The fault entry: capture the context, persist it, report the
    /// outcome with the lowest-capability channel, optionally reset.
    ///
    /// Invoked at most once per fault from the platform's fault trap.
    /// Persistence failures are reported but never retried — a retry
    /// risks a second fault.
    pub fn on_fault<T: TaskDescriptor>(
        &mut self,
        stack_pointer: u32,
        task: &T,
        interrupt_context: Option<InterruptContext<'_>>,
        file: &str,
        line: u32,
    ) {
        self.arena = capture(
            stack_pointer,
            task,
            interrupt_context,
            file,
            line,
            &self.system_stacks,
            &self.memory,
        );

        if self.config.persist {
            if let Err(err) = self.store.write(FAULT_SLOT, &self.arena) {
                report_write_failure(err, &mut self.console);
            }
        }

        if self.config.reset_on_crash {
            self.reset.reset();
        }
    }

    /// The most recently captured record (the arena contents).
    pub fn last_record(&self) -> &FaultRecord {
        &self.arena
    }

    /// Hand the store back for boot-time recovery.
    pub fn store_mut(&mut self) -> &mut FaultStore<R> {
        &mut self.store
    }

    /// Tear down into parts (tests and controlled shutdown).
    pub fn into_parts(self) -> (FaultStore<R>, C) {
        (self.store, self.console)
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
    use crashlog::{FaultFlags, SlotStatus};
    use platform::mocks::{MockConsole, MockMemory, MockNvram, MockReset, MockTask};

    const SYS: SystemStackInfo = SystemStackInfo {
        idle_stack_top: 0x2000_0FFC,
        idle_stack_size: 0x400,
        interrupt_stack_top: 0x2001_1000,
        interrupt_stack_size: 0x800,
    };

    fn handler(
        nv: MockNvram,
        config: CrashConfig,
    ) -> CrashHandler<MockNvram, MockConsole, MockReset, MockMemory> {
        CrashHandler::new(
            FaultStore::new(nv),
            MockConsole::new(),
            MockReset,
            MockMemory::self_addressed(0x2000_0000, 0x5000),
            SYS,
            config,
        )
    }

    #[test]
    fn fault_is_captured_and_persisted() {
        let mut h = handler(MockNvram::new(), CrashConfig::default());
        let task = MockTask::new(5, "gyro", 0x2000_8000, 0x1000);
        h.on_fault(0x2000_7F00, &task, None, "gyro.c", 88);

        assert_eq!(h.store_mut().status(FAULT_SLOT).unwrap(), SlotStatus::Present);
        let record = h.store_mut().read(FAULT_SLOT).unwrap().unwrap();
        assert_eq!(record.line, 88);
        assert_eq!(record.task_id, 5);
        assert_eq!(record, *h.last_record());
        // Clean write: nothing on the failure channel.
        let (_, console) = h.into_parts();
        assert!(console.output().is_empty());
    }

    #[test]
    fn wiped_medium_emits_the_distinguishing_message() {
        let mut nv = MockNvram::new();
        nv.set_unavailable(true);
        let mut h = handler(nv, CrashConfig::default());
        let task = MockTask::new(5, "gyro", 0x2000_8000, 0x1000);
        h.on_fault(0x2000_7F00, &task, None, "gyro.c", 88);
        let (_, console) = h.into_parts();
        assert_eq!(console.output(), b"Memory wiped - dump not saved!");
    }

    #[test]
    fn full_medium_emits_a_single_bang() {
        let nv = MockNvram::with_capacity(8);
        let mut h = handler(nv, CrashConfig::default());
        let task = MockTask::new(5, "gyro", 0x2000_8000, 0x1000);
        h.on_fault(0x2000_7F00, &task, None, "gyro.c", 88);
        let (_, console) = h.into_parts();
        assert_eq!(console.output(), b"!");
    }

    #[test]
    fn persistence_disabled_still_captures_into_the_arena() {
        let config = CrashConfig {
            persist: false,
            reset_on_crash: false,
        };
        let mut h = handler(MockNvram::new(), config);
        let task = MockTask::new(5, "gyro", 0x2000_8000, 0x1000);
        h.on_fault(0x2000_7F00, &task, None, "gyro.c", 88);
        assert!(h
            .last_record()
            .flags
            .contains(FaultFlags::USER_STACK_PRESENT));
        assert_eq!(h.last_record().line, 88);
        // Nothing persisted, nothing reported.
        assert_eq!(h.store_mut().status(FAULT_SLOT).unwrap(), SlotStatus::Absent);
        let (_, console) = h.into_parts();
        assert!(console.output().is_empty());
    }
}
