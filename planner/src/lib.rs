//! Policy-gated action selection for the task-dispatch kernel.
//!
//! This crate turns free-form task context into a bounded, deterministic
//! planner input; optionally consults a learned predictor; and enforces hard
//! safety invariants before anything executes. The architecture enforces a
//! strict separation:
//!
//! - **[`core`]**: Pure, deterministic logic (action space, history
//!   selection, input building, tokenization, the decision engine, routing).
//!   No I/O, fully testable in isolation.
//! - **[`io`]**: Side-effecting operations (configuration, history sources,
//!   transition snapshots, audit artifacts, child processes). Isolated to
//!   enable mocking in tests.
//!
//! [`decide`] coordinates core logic with I/O for one decision request;
//! [`predictor`] holds the memoized model capability.

pub mod core;
pub mod decide;
pub mod io;
pub mod logging;
pub mod predictor;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
