//! Local development orchestrator with a live terminal log renderer.
//!
//! Invariant: single output gate. Only `core::output::OutputGate::flush(..)`
//! writes to the terminal.
//!
//! # Overview
//! - Services are spawned and supervised per the project config
//!   ([`config::LocaldevConfig`]).
//! - Their output is persisted per service ([`log_store::LogStore`]), merged
//!   and wrapped ([`logs::LogMerger`]), and replayed through a virtual
//!   terminal ([`vterm::VirtualTerminal`]) so cursor motion and colors
//!   survive the merge.
//! - The update loop ([`runtime::TerminalUpdater`]) diffs full-screen frames
//!   and handles input, scroll mode, and overflow into native scrollback.

pub mod commands;
pub mod config;
pub mod state;

pub mod core;
pub mod logs;
pub mod platform;
pub mod render;
pub mod runtime;
pub mod service;
pub mod vterm;

/// Terminal interfaces and the process-backed implementation.
pub use crate::core::output::{OutputGate, TerminalCmd};
pub use crate::core::terminal::Terminal;
#[cfg(unix)]
pub use crate::platform::process_terminal::ProcessTerminal;

/// ANSI-aware text helpers.
pub use crate::core::text::{visible_width, wrap_ansi, wrap_with_prefix};

/// Service supervision.
pub use crate::service::{Service, ServiceEvent, ServiceSpec, ServiceStatus};

/// The update loop.
pub use crate::runtime::{TerminalUpdater, UpdaterEvent};
pub use crate::state::LocaldevState;
