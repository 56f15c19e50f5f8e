//! Fault context capture.
//!
//! Runs inside the fault handler itself. Given the faulting stack pointer
//! and the task control block it was handed, produces a self-contained
//! [`FaultRecord`]. Capture never fails — when the memory it reads is
//! itself corrupted it degrades the record's completeness and says so in
//! the flags.
//!
//! Hard constraints: no allocation, no blocking, no call that can itself
//! fault. Stack memory is read through [`RawMemory`] bounds-checked word
//! reads, never trusted dereferencing.

use platform::{RawMemory, SystemStackInfo, TaskDescriptor};

use crate::record::{FaultFlags, FaultRecord, StackRegion, MAX_TASK_NAME, REG_COUNT, REG_SP, STACK_WINDOW_WORDS};

/// The saved register file of an active interrupt/exception context.
///
/// Present exactly when the fault hit while interrupts were being
/// serviced; in that case the stack pointer handed to the fault entry is
/// the *interrupt* stack pointer and the true user stack pointer must be
/// recovered from the R13 slot of this register file.
#[derive(Debug, Clone, Copy)]
pub struct InterruptContext<'a> {
    /// The saved register file.
    pub regs: &'a [u32; REG_COUNT],
    /// Raw value of the context pointer itself, recorded as evidence for
    /// cross-checking system memory. Never dereferenced.
    pub raw_ptr: u32,
}

/// Capture a fault record.
///
/// Invoked at most once per fault, from the single system-wide fault
/// entry point. The whole population runs inside a critical section: any
/// scheduler activity during capture could produce a torn record.
///
/// The returned record is internally consistent — the flags accurately
/// reflect which fields were populated — even if the memory being read is
/// garbage.
pub fn capture<T: TaskDescriptor, M: RawMemory>(
    stack_pointer: u32,
    task: &T,
    interrupt_context: Option<InterruptContext<'_>>,
    file: &str,
    line: u32,
    system_stacks: &SystemStackInfo,
    memory: &M,
) -> FaultRecord {
    critical_section::with(|_| {
        // Start from all-zero so untouched fields read as absent.
        let mut record = FaultRecord::zeroed();

        record.set_source(file, line);
        record.task_id = task.task_id();
        copy_task_name(&mut record, task.name());

        // Interrupt stack bounds are a board constant, not task state.
        record.int_stack.top = system_stacks.interrupt_stack_top;
        record.int_stack.size = system_stacks.interrupt_stack_size;

        match interrupt_context {
            Some(ctx) => {
                record.interrupt_context_ptr = ctx.raw_ptr;
                record.regs.copy_from_slice(ctx.regs);
                record.flags.insert(FaultFlags::REGS_PRESENT);
                record.flags.insert(FaultFlags::USER_STACK_PRESENT);
                record.flags.insert(FaultFlags::INT_STACK_PRESENT);
                // The handed-in pointer is the interrupt stack; the user
                // stack pointer lives in the saved R13 slot.
                record.int_stack.sp = stack_pointer;
                record.user_stack.sp = ctx.regs.get(REG_SP).copied().unwrap_or(0);
            }
            None => {
                // No interrupt active: the fault was taken in the user's
                // own context and the handed-in pointer is the user SP.
                record.flags.insert(FaultFlags::USER_STACK_PRESENT);
                record.user_stack.sp = stack_pointer;
            }
        }

        if record.task_id == 0 {
            // The idle task's stack is carved out by startup code; its
            // bounds come from the system constants, not a task object.
            record.user_stack.top = system_stacks.idle_stack_top;
            record.user_stack.size = system_stacks.idle_stack_size;
        } else {
            record.user_stack.top = task.stack_top();
            record.user_stack.size = task.stack_size();
        }

        if record.flags.contains(FaultFlags::INT_STACK_PRESENT) {
            dump_window(&mut record.int_stack, memory);
            if !record.int_stack.sp_in_bounds() {
                record.flags.insert(FaultFlags::INVALID_INT_SP);
            }
        }

        if record.flags.contains(FaultFlags::USER_STACK_PRESENT) {
            dump_window(&mut record.user_stack, memory);
            if !record.user_stack.sp_in_bounds() {
                record.flags.insert(FaultFlags::INVALID_USER_SP);
            }
        }

        record
    })
}

fn copy_task_name(record: &mut FaultRecord, name: &[u8]) {
    let len = name.len().min(MAX_TASK_NAME);
    if let (Some(dst), Some(src)) = (record.task_name.get_mut(..len), name.get(..len)) {
        dst.copy_from_slice(src);
    }
}

/// Copy the window words walking downward from `sp + half` to `sp - half`,
/// so the dump brackets the point of failure. Best-effort: words the board
/// cannot read stay zero. An out-of-bounds SP does not suppress the dump —
/// the invalid flag only marks untrustworthiness for the reader.
fn dump_window<M: RawMemory>(stack: &mut StackRegion, memory: &M) {
    for i in 0..STACK_WINDOW_WORDS {
        let addr = stack.window_addr(i);
        let word = memory.read_word(addr).unwrap_or(0);
        if let Some(slot) = stack.window.get_mut(i) {
            *slot = word;
        }
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
    use platform::mocks::{MockMemory, MockTask};

    const SYS: SystemStackInfo = SystemStackInfo {
        idle_stack_top: 0x2000_0FFC,
        idle_stack_size: 0x400,
        interrupt_stack_top: 0x2001_0000,
        interrupt_stack_size: 0x800,
    };

    fn readable_everything() -> MockMemory {
        // One big self-addressed region covering both stacks used below.
        MockMemory::self_addressed(0x2000_0000, 0x4200)
    }

    #[test]
    fn user_context_capture_sets_only_user_flags() {
        let task = MockTask::new(3, "attitude", 0x2000_8000, 0x1000);
        let mem = readable_everything();
        let r = capture(0x2000_7F00, &task, None, "fault.c", 10, &SYS, &mem);

        assert!(r.flags.contains(FaultFlags::USER_STACK_PRESENT));
        assert!(!r.flags.contains(FaultFlags::REGS_PRESENT));
        assert!(!r.flags.contains(FaultFlags::INT_STACK_PRESENT));
        assert_eq!(r.user_stack.sp, 0x2000_7F00);
        assert_eq!(r.user_stack.top, 0x2000_8000);
        assert_eq!(r.user_stack.size, 0x1000);
        assert_eq!(r.interrupt_context_ptr, 0);
    }

    #[test]
    fn interrupt_context_capture_recovers_user_sp_from_r13() {
        let task = MockTask::new(3, "attitude", 0x2000_8000, 0x1000);
        let mem = readable_everything();
        let mut regs = [0u32; REG_COUNT];
        regs[REG_SP] = 0x2000_7E00;
        let ctx = InterruptContext {
            regs: &regs,
            raw_ptr: 0x2000_FFC0,
        };
        let r = capture(0x2000_FF80, &task, Some(ctx), "fault.c", 10, &SYS, &mem);

        assert!(r.flags.contains(FaultFlags::REGS_PRESENT));
        assert!(r.flags.contains(FaultFlags::USER_STACK_PRESENT));
        assert!(r.flags.contains(FaultFlags::INT_STACK_PRESENT));
        assert_eq!(r.user_stack.sp, 0x2000_7E00);
        assert_eq!(r.int_stack.sp, 0x2000_FF80);
        assert_eq!(r.int_stack.top, SYS.interrupt_stack_top);
        assert_eq!(r.int_stack.size, SYS.interrupt_stack_size);
        assert_eq!(r.interrupt_context_ptr, 0x2000_FFC0);
        assert_eq!(r.regs, regs);
    }

    #[test]
    fn regs_present_implies_nonzero_context_pointer() {
        // The invariant is structural: REGS_PRESENT is set on the same
        // branch that records the context pointer.
        let task = MockTask::new(1, "io", 0x2000_8000, 0x1000);
        let mem = readable_everything();
        let regs = [0u32; REG_COUNT];
        let ctx = InterruptContext {
            regs: &regs,
            raw_ptr: 0x2000_AAAA,
        };
        let r = capture(0x2000_FF80, &task, Some(ctx), "f.c", 1, &SYS, &mem);
        assert!(r.flags.contains(FaultFlags::REGS_PRESENT));
        assert_ne!(r.interrupt_context_ptr, 0);

        let r = capture(0x2000_7F00, &task, None, "f.c", 1, &SYS, &mem);
        assert!(!r.flags.contains(FaultFlags::REGS_PRESENT));
        assert_eq!(r.interrupt_context_ptr, 0);
    }

    #[test]
    fn idle_task_stack_bounds_come_from_system_constants() {
        // Deliberately bogus task-object bounds: id 0 must ignore them.
        let task = MockTask::new(0, "idle", 0xDEAD_0000, 0xFFFF_0000);
        let mem = readable_everything();
        let r = capture(0x2000_0F00, &task, None, "f.c", 1, &SYS, &mem);
        assert_eq!(r.user_stack.top, SYS.idle_stack_top);
        assert_eq!(r.user_stack.size, SYS.idle_stack_size);
    }

    #[test]
    fn out_of_range_sp_sets_invalid_flag_but_still_dumps() {
        let task = MockTask::new(5, "nav", 0x2000_8000, 0x1000);
        let mem = readable_everything();
        // SP far outside (top - size, top].
        let r = capture(0x2000_1000, &task, None, "f.c", 1, &SYS, &mem);
        assert!(r.flags.contains(FaultFlags::INVALID_USER_SP));
        // Window was still copied best-effort from the (readable) SP area.
        let half = STACK_WINDOW_WORDS / 2;
        assert_eq!(r.user_stack.window[half], 0x2000_1000);
    }

    #[test]
    fn in_range_sp_does_not_set_invalid_flag() {
        let task = MockTask::new(5, "nav", 0x2000_8000, 0x1000);
        let mem = readable_everything();
        let r = capture(0x2000_7800, &task, None, "f.c", 1, &SYS, &mem);
        assert!(!r.flags.contains(FaultFlags::INVALID_USER_SP));
    }

    #[test]
    fn window_brackets_the_stack_pointer() {
        let task = MockTask::new(5, "nav", 0x2000_8000, 0x1000);
        let mem = readable_everything();
        let sp = 0x2000_7800;
        let r = capture(sp, &task, None, "f.c", 1, &SYS, &mem);
        let half = STACK_WINDOW_WORDS as u32 / 2;
        // Word 0 is half a window above SP, walking downward.
        assert_eq!(r.user_stack.window[0], sp + half * 4);
        assert_eq!(r.user_stack.window[STACK_WINDOW_WORDS - 1], sp - (half - 1) * 4);
    }

    #[test]
    fn unreadable_stack_words_read_as_zero() {
        let task = MockTask::new(5, "nav", 0x2000_8000, 0x1000);
        // Nothing readable anywhere near the SP.
        let mem = MockMemory::new(0x9000_0000, &[]);
        let r = capture(0x2000_7800, &task, None, "f.c", 1, &SYS, &mem);
        assert!(r.user_stack.window.iter().all(|&w| w == 0));
        // Capture degraded but did not fail.
        assert!(r.flags.contains(FaultFlags::USER_STACK_PRESENT));
    }

    #[test]
    fn long_task_name_is_truncated_verbatim() {
        let task = MockTask::new(
            9,
            "a_very_long_task_name_that_exceeds_the_field",
            0x2000_8000,
            0x1000,
        );
        let mem = readable_everything();
        let r = capture(0x2000_7800, &task, None, "f.c", 1, &SYS, &mem);
        assert_eq!(r.task_name_bytes().len(), MAX_TASK_NAME);
        assert_eq!(r.task_name_bytes(), &b"a_very_long_task_name_that_exceeds_the_field"[..MAX_TASK_NAME]);
    }
}
