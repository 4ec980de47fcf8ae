//! Automated Java/Spring Boot upgrade agent.
//!
//! A run clones a repository, detects its build tool and current versions,
//! applies OpenRewrite recipes proposed by an advisory service, and loops on
//! build failures (bounded by `max_attempts`) before opening a pull request.
//! The architecture enforces a strict separation:
//!
//! - **[`core`]**: Pure, deterministic logic (run state, routing, version and
//!   recipe extraction, change-request text). No I/O.
//! - **[`io`]**: Side-effecting collaborators (git, OpenRewrite CLI, build
//!   runner, HTTP services, configuration). Each sits behind a trait so it can
//!   be scripted in tests.
//! - **[`phases`]** and **[`controller`]**: the workflow itself.

pub mod controller;
pub mod core;
pub mod exit_codes;
pub mod io;
pub mod logging;
pub mod phases;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
