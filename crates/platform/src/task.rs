//! Faulting-task identity and stack metadata.

/// Descriptor of the task that was running when the fault hit.
///
/// Implemented over the RTOS task control block on hardware and by
/// [`crate::mocks::MockTask`] in tests. Capture reads it exactly once,
/// inside the fault handler, and copies everything it needs into the
/// fault record — the descriptor is never retained.
pub trait TaskDescriptor {
    /// Numeric task identifier. Id 0 is the idle/background task, whose
    /// stack bounds come from [`SystemStackInfo`] rather than from the
    /// task object.
    fn task_id(&self) -> u32;

    /// Task name bytes, copied verbatim into the record. Not guaranteed
    /// to be NUL-terminated or valid UTF-8 — the control block may itself
    /// be damaged.
    fn name(&self) -> &[u8];

    /// Highest address of the task's allocated stack.
    fn stack_top(&self) -> u32;

    /// Allocated stack size in bytes.
    fn stack_size(&self) -> u32;
}

/// Fixed system stack bounds that do not live in any task object.
///
/// The idle task's stack is carved out by the startup code, and the
/// interrupt stack is a linker-script symbol; both are constants of the
/// board, resolved once and handed to capture.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SystemStackInfo {
    /// Highest address of the idle task's stack.
    pub idle_stack_top: u32,
    /// Idle task stack size in bytes.
    pub idle_stack_size: u32,
    /// Highest address of the dedicated interrupt stack.
    pub interrupt_stack_top: u32,
    /// Interrupt stack size in bytes.
    pub interrupt_stack_size: u32,
}
