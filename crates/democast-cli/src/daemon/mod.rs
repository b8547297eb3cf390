//! Recording daemon: command server, recording session, scenarios.

pub mod client;
pub mod paths;
pub mod recording;
pub mod scenario;
pub mod screencast;
pub mod server;

// Public API - used by main.rs
pub use client::DaemonClient;
pub use server::{DaemonContext, DaemonServer};
