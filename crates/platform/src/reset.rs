//! Board reset primitive.

/// Unconditional processor restart.
///
/// Invoked after the fault handler has persisted its record (when the
/// reset-on-crash policy is enabled) and optionally after the interactive
/// recovery menu exits. Never returns.
pub trait BoardReset {
    /// Restart the processor immediately.
    fn reset(&mut self) -> !;
}
