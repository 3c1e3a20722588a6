//! `mb-bench` - Benchmark driver for matmul-bench.
//!
//! Generates a seeded workload, checks every selected backend against the
//! scalar reference, then times each one with criterion.

pub mod config;
pub mod harness;
pub mod suite;
pub mod verify;

pub use config::{BackendKind, BenchConfig};
pub use harness::Harness;
pub use suite::{bench_backend, run, BackendReport, Workload};
pub use verify::{compare, VerifyReport};
