//! Hardware Abstraction Layer for the Skylark flight-control computer.
//!
//! This crate defines trait contracts for every hardware collaborator the
//! crash-log core consumes, enabling development and testing without
//! physical hardware.
//!
//! # Architecture Layers
//!
//! ```text
//! Integration Layer (firmware crate)
//!         ↓
//! Crash-Log Core (crashlog crate)
//!         ↓
//! Platform HAL (this crate - trait abstractions)
//!         ↓
//! Hardware Layer (board support + PAC)
//! ```
//!
//! # Contracts
//!
//! - [`RawConsole`] - unbuffered character I/O, usable with interrupts off
//! - [`NonvolatileRegion`] - byte-addressable power-loss-resilient storage
//! - [`TaskDescriptor`] - faulting task identity and stack bounds
//! - [`RawMemory`] - bounds-checked best-effort word reads
//! - [`BoardReset`] - unconditional processor restart
//!
//! # Features
//!
//! - `std`: expose the [`mocks`] module to downstream test suites
//! - `hardware`: physical hardware target marker
//! - `defmt`: enable defmt logging derives

// ── Lint policy ─────────────────────────────────────────────────────────────
#![deny(clippy::unwrap_used)] // no .unwrap() in production code
#![deny(clippy::expect_used)] // no .expect() in production code
#![deny(clippy::panic)] // no panic!() in production code
#![deny(unused_must_use)]
// ────────────────────────────────────────────────────────────────────────────
#![cfg_attr(not(test), no_std)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![allow(clippy::doc_markdown)] // register names and hex addresses in docs
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::must_use_candidate)] // hardware accessors — callers decide
#![allow(clippy::module_name_repetitions)]

pub mod config;
pub mod console;
pub mod memory;
pub mod nvram;
pub mod reset;
pub mod task;

#[cfg(any(test, feature = "std"))]
pub mod mocks;

pub use console::RawConsole;
pub use memory::RawMemory;
pub use nvram::{NonvolatileRegion, NvError};
pub use reset::BoardReset;
pub use task::{SystemStackInfo, TaskDescriptor};
