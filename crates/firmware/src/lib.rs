//! Board integration for the Skylark FCC crash-log subsystem.
//!
//! This crate wires the crash-log core to the platform: the single fault
//! entry invoked by the low-level fault trap, the once-per-boot recovery
//! call, and the hardware exception hook. Peripheral bring-up (storage,
//! bus, USB, timers), LED indication, and normal task scheduling live in
//! the board support packages and are collaborators, not residents, of
//! this crate.

// ── Lint policy ─────────────────────────────────────────────────────────────
#![deny(clippy::unwrap_used)] // no .unwrap() in production code
#![deny(clippy::expect_used)] // no .expect() in production code
#![deny(clippy::panic)] // no panic!() in the fault path
#![deny(unused_must_use)]
// ────────────────────────────────────────────────────────────────────────────
#![cfg_attr(not(test), no_std)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![allow(clippy::doc_markdown)] // HardFault, register names in docs
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::module_name_repetitions)]

// Link the RTT logger and the panic-probe handler into hardware builds.
#[cfg(feature = "hardware")]
use {defmt_rtt as _, panic_probe as _};

pub mod boot;
pub mod exception_handlers;
pub mod fault;

pub use boot::{run_fault_recovery, BOOT_SEQUENCE_STEPS};
pub use fault::{CrashConfig, CrashHandler, FAULT_SLOT};
