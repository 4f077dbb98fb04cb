//! E2E test harness for vdoc.
//!
//! Scenarios are built with a fluent DSL and executed against a real store
//! in a temporary directory, with a controllable clock.

#![allow(dead_code)]

pub mod assertions;
pub mod clock;
pub mod runner;
pub mod scenario;
pub mod steps;
pub mod workspace;

// Re-export commonly used types
pub use assertions::Assertion;
pub use clock::MockClock;
pub use scenario::Scenario;
pub use workspace::{topic, TestWorkspace};
