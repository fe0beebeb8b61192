//! Common utilities for netmd-rs
//!
//! This crate provides functionality shared between the protocol driver and
//! the command-line tools: error handling, tracing setup, and the hex dump
//! used to trace command and response bytes.

pub mod dump;
pub mod error;
pub mod logging;

pub use dump::{hex_dump, parse_hex};
pub use error::{Error, Result};
pub use logging::setup_logging;
