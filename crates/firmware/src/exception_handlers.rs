//! Cortex-M exception handlers for the Skylark FCC firmware.
//!
//! The HardFault handler is the single system-wide fault entry. It does
//! not own the crash-log machinery itself; the board registers a fault
//! hook during startup (after the [`crate::CrashHandler`] is built) and
//! the handler delegates to it with the faulting stack pointer.
//!
//! # Hardware-only handler
//!
//! The `#[cortex_m_rt::exception]` attribute requires ARM target
//! intrinsics and is therefore gated behind `#[cfg(feature =
//! "hardware")]`. The module itself (and `HARDFAULT_DEFINED`) compiles
//! unconditionally so host tests can verify the module exists without
//! needing an ARM toolchain.

#![allow(clippy::doc_markdown)] // HardFault, SVC as plain text

use core::cell::Cell;

use critical_section::Mutex;

/// Marker constant — confirmed by arch tests to verify this module exists.
pub const HARDFAULT_DEFINED: bool = true;

/// A registered fault hook never returns: after capture and persistence
/// the board either resets or parks the core for the debugger.
pub type FaultHook = fn(stack_pointer: u32) -> !;

static FAULT_HOOK: Mutex<Cell<Option<FaultHook>>> = Mutex::new(Cell::new(None));

/// Route hard faults to `hook`. Called once during startup, after the
/// crash handler and its store exist. Registering again replaces the
/// previous hook.
pub fn register_fault_hook(hook: FaultHook) {
    critical_section::with(|cs| FAULT_HOOK.borrow(cs).set(Some(hook)));
}

#[cfg(test)]
fn registered_fault_hook() -> Option<FaultHook> {
    critical_section::with(|cs| FAULT_HOOK.borrow(cs).get())
}

/// HardFault exception handler (hardware target only).
///
/// # Behavior
///
/// Delegates to the registered fault hook with the address of the
/// stacked exception frame — the stack pointer at the moment of the
/// fault. If no hook was registered yet (fault during very early boot),
/// parks the core at a breakpoint: there is nowhere to log to.
///
/// # Safety
///
/// This function must never return — returning from a HardFault handler
/// is undefined behavior on Cortex-M. The `-> !` return type enforces
/// this.
#[cfg(feature = "hardware")]
#[cortex_m_rt::exception]
#[allow(unsafe_code)]
unsafe fn HardFault(ef: &cortex_m_rt::ExceptionFrame) -> ! {
    let hook = critical_section::with(|cs| FAULT_HOOK.borrow(cs).get());
    match hook {
        Some(hook) => hook(ef as *const _ as u32),
        None => loop {
            cortex_m::asm::bkpt();
        },
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic)]
mod tests {
    use super::*;

    fn park(_sp: u32) -> ! {
        panic!("fault hook invoked in a host test")
    }

    #[test]
    fn handler_module_is_linked() {
        assert!(HARDFAULT_DEFINED);
    }

    #[test]
    fn fault_hook_registration_replaces_previous() {
        register_fault_hook(park);
        assert!(registered_fault_hook().is_some());
        register_fault_hook(park);
        assert!(registered_fault_hook().is_some());
    }
}
