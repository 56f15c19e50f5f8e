//! Postmortem fault capture and persistent crash log for the Skylark FCC.
//!
//! Three components in a strict lifecycle order:
//!
//! - [`capture`]: runs inside the fault handler; turns the faulting stack
//!   pointer and task control block into a self-contained [`FaultRecord`].
//! - [`store`]: named slots in a power-loss-resilient region, each holding
//!   one record plus a reboot counter; safe with interrupts disabled.
//! - [`recovery`]: runs once at the next boot; decides between continuing
//!   and halting for an interactive dump/clear/continue menu, based on a
//!   bounded reboot-loop counter and pending operator input.
//!
//! Data flows one way during a crash (capture → store) and one way on the
//! next boot (store → recovery → possible board reset). Nothing in this
//! crate allocates, blocks, or assumes a running scheduler.

// ── Lint policy ─────────────────────────────────────────────────────────────
#![deny(clippy::unwrap_used)] // no .unwrap() in production code
#![deny(clippy::expect_used)] // no .expect() in production code
#![deny(clippy::panic)] // no panic!() in the fault path
#![deny(unused_must_use)]
// ────────────────────────────────────────────────────────────────────────────
#![cfg_attr(not(test), no_std)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![allow(clippy::doc_markdown)] // register names and hex addresses in docs
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::module_name_repetitions)]

pub mod capture;
pub mod dump;
pub mod record;
pub mod recovery;
pub mod store;

pub use capture::{capture, InterruptContext};
pub use dump::DumpFormat;
pub use record::{FaultFlags, FaultRecord, StackRegion};
pub use recovery::{run as run_fault_recovery, RecoveryConfig, RecoveryStatus, REBOOT_LOOP_THRESHOLD};
pub use store::{report_write_failure, FaultStore, SlotStatus, StoreError, SLOT_NAMES, SLOT_SIZE};
