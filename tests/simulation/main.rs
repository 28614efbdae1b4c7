//! End-to-end runs of the reservation workload with real threads.
//!
//! Run with: `cargo test --test simulation`

mod failure;
mod runs;
mod scenario;
