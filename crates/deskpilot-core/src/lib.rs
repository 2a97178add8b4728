#![deny(missing_docs)]
//! Deskpilot core library.
//!
//! Transport-agnostic command session controller: authorization, cooldowns,
//! session state, external process execution and output delivery.

/// Authorization gate for the single operator.
pub mod auth;
/// Contracts for the desktop collaborators (capture, windows, input).
pub mod collaborators;
/// Command handlers and their registry.
pub mod commands;
/// Configuration management.
pub mod config;
/// Long-text delivery planning.
pub mod delivery;
/// Invocation dispatch pipeline.
pub mod dispatcher;
/// Error taxonomy reported back to the operator.
pub mod error;
/// Pre-handler interceptor stages.
pub mod interceptors;
/// Inline button panel vocabulary.
pub mod panel;
/// External process execution.
pub mod process;
/// Per-key cooldown ledger.
pub mod rate_limit;
/// Reply channel abstraction.
pub mod reply;
/// Process-lifetime session state.
pub mod session;
/// Shell dialect heuristic.
pub mod shell_dialect;
/// Utility functions.
pub mod utils;

#[cfg(test)]
pub mod testing;
