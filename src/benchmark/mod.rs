//! Benchmark module
//!
//! The staged load generator: frame timing, workload staging, windowed
//! aggregation and the render loop that ties them together, plus the suite
//! orchestrator that runs every test in its own process.

pub mod clock;
pub mod runner;
pub mod stager;
pub mod suite;
pub mod window;

pub use runner::{StagedBenchmarkRunner, StopSignal};
pub use window::AggregatedRecord;
