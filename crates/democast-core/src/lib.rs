//! Core types and logic for democast.
//!
//! This crate holds the pieces of the recording daemon that do no I/O, so
//! the daemon, its client and the tests can share them.
//!
//! # Modules
//!
//! - [`error`]: Structured error codes with hints for operators
//! - [`protocol`]: One-line JSON request/response protocol
//! - [`motion`]: Ease-in-out pointer motion planning
//! - [`input`]: Session detection and external input tool invocations
//!
//! # Protocol
//!
//! | Action | Parameters | Success response |
//! |--------|------------|------------------|
//! | `ping` | none | `{"status":"ok","message":"pong"}` |
//! | `list_scenarios` | none | `{"status":"ok","scenarios":[...]}` |
//! | `record` | `scenario`, `output`, `pre_delay`, `post_delay`, `options` | `{"status":"ok","output":...}` |
//!
//! Failures always come back as `{"status":"error","message":...}`.

pub mod error;
pub mod input;
pub mod motion;
pub mod protocol;
