//! Property-based model tests for the concurrent containers.
//!
//! Each container is driven by a random sequence of operations on a single
//! thread and compared step by step against a std collection model.
//!
//! Run with: `cargo test --test property`

mod bounded_stack;
mod lazy_list;
mod two_lock_queue;

/// Case count, overridable with `PROPTEST_CASES`.
pub fn proptest_cases(default: u32) -> u32 {
    std::env::var("PROPTEST_CASES")
        .ok()
        .and_then(|value| value.parse::<u32>().ok())
        .map_or(default, |value| value.max(1))
}
