//! vecsync chat library. Re-exports all modules for the binary and the
//! integration tests.
//!
//! The core is the streaming pipeline: [`driver`] starts a run, [`handler`]
//! resolves citations into ordered fragments, [`formatter`] renders them for
//! the terminal or a markdown surface.

pub mod assistant_api;
pub mod config;
pub mod driver;
pub mod error;
pub mod formatter;
pub mod handler;
pub mod history;
pub mod session;
pub mod settings;
pub mod store;
pub mod types;
pub mod ui;
