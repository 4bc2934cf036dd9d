//! Control channel for the capture surface and configuration clients
//!
//! Length-prefixed JSON over a localhost TCP socket. The surface client
//! registers its window, subscribes for show/hide pushes, and reports
//! submissions and visibility changes; configuration clients query status
//! and rebind the hotkey at runtime.

pub mod protocol;
mod server;

pub use server::Server;
