//! Scenario tests for the Zinc wallet engine.
//!
//! The suites under `tests/` drive the service, provider fallback, and
//! reconciler end to end against scripted providers from [`helpers`].

pub mod helpers;
