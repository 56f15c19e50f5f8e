//! Property-based tests for stack-pointer validity.
//! Verifies the `(top - size, top]` rule holds for ALL inputs, not just
//! fixed examples.

#![allow(clippy::unwrap_used, clippy::panic, clippy::arithmetic_side_effects)]

use crashlog::record::FaultFlags;
use crashlog::{capture, StackRegion};
use platform::mocks::{MockMemory, MockTask};
use platform::SystemStackInfo;

const SYS: SystemStackInfo = SystemStackInfo {
    idle_stack_top: 0x2000_0FFC,
    idle_stack_size: 0x400,
    interrupt_stack_top: 0x2001_1000,
    interrupt_stack_size: 0x800,
};

proptest::proptest! {
    /// Inside (top - size, top] the pointer is always accepted.
    #[test]
    fn sp_inside_range_is_never_flagged(
        top in 0x1_0000u32..=0xFFFF_F000u32,
        size in 1u32..=0x8000u32,
        offset in 0u32..=0x7FFFu32,
    ) {
        let offset = offset % size;
        let sp = top - offset; // in (top - size, top]
        let mut s = StackRegion::zeroed();
        s.top = top;
        s.size = size;
        s.sp = sp;
        assert!(s.sp_in_bounds(),
            "sp 0x{sp:08X} should be valid for top 0x{top:08X} size 0x{size:X}");
    }

    /// Above top, or at/below top - size, the pointer is always rejected.
    #[test]
    fn sp_outside_range_is_always_flagged(
        top in 0x1_0000u32..=0x7FFF_0000u32,
        size in 1u32..=0x8000u32,
        above in 1u32..=0x1000u32,
        below in 0u32..=0x1000u32,
    ) {
        let mut s = StackRegion::zeroed();
        s.top = top;
        s.size = size;

        s.sp = top + above;
        assert!(!s.sp_in_bounds(), "sp above top must be invalid");

        s.sp = top.saturating_sub(size).saturating_sub(below);
        assert!(!s.sp_in_bounds(), "sp at or below top - size must be invalid");
    }

    /// Capture mirrors the range rule into the record's invalid flag.
    #[test]
    fn capture_flags_follow_the_range_rule(sp_offset in 0u32..=0x2000u32) {
        let top = 0x2000_8000u32;
        let size = 0x1000u32;
        let sp = (top - 0x1800) + sp_offset; // sweeps across both bounds
        let task = MockTask::new(4, "sweep", top, size);
        let mem = MockMemory::self_addressed(0x2000_0000, 0x9000);
        let r = capture(sp, &task, None, "sweep.c", 1, &SYS, &mem);

        let in_range = sp <= top && sp > top - size;
        assert_eq!(
            !r.flags.contains(FaultFlags::INVALID_USER_SP),
            in_range,
            "sp 0x{sp:08X}: invalid flag must match the (top-size, top] rule"
        );
        // Presence is unconditional; validity only marks trust.
        assert!(r.flags.contains(FaultFlags::USER_STACK_PRESENT));
    }
}
