//! Side-effecting adapters: configuration, processes, git, the transformation
//! engine, the build runner and the HTTP collaborators.
//!
//! Each collaborator is a trait with one production implementation so the
//! controller can be driven by scripted doubles in tests.

pub mod advisory;
pub mod build;
pub mod config;
pub mod git;
pub mod hosting;
pub mod process;
pub mod prompt;
pub mod rewrite;
pub mod workspace;
