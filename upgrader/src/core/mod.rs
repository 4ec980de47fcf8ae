//! Deterministic, pure logic shared by the upgrade controller.
//!
//! Core modules must be free of I/O side effects. They operate on in-memory
//! data structures and return deterministic outputs suitable for tests.

pub mod excerpt;
pub mod recipes;
pub mod report;
pub mod router;
pub mod state;
pub mod types;
pub mod versions;
