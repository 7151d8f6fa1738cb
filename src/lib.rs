//! rkmon: host telemetry, a privileged update runner and an embedded shell
//! for single-board computers, in one terminal screen.
//!
//! This library exposes the core modules for use by the binary and by tests.

pub mod app;
pub mod collectors;
pub mod config;
pub mod controller;
pub mod error;
pub mod model;
pub mod script;
pub mod script_controller;
pub mod terminal;
pub mod view;
