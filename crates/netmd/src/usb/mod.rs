//! USB subsystem
//!
//! Everything NetMD does over USB, layered bottom-up:
//! - `pipe`: the endpoint-0 control channel the rest is written against
//! - `discovery`: scanning the buses for supported devices
//! - `session`: opening, claiming and closing one device
//! - `exchange`: the poll/send/poll/receive message handshake
//!
//! All calls block the calling thread. A session is owned by one caller at a
//! time; independent sessions may live on independent threads.

pub mod discovery;
pub mod exchange;
pub mod pipe;
pub mod session;

// Re-export public types
pub use discovery::{DiscoveredDevice, discover, discover_with, select_known};
pub use exchange::{Backoff, ThreadSleep, exchange, poll};
pub use pipe::ControlPipe;
pub use session::NetmdHandle;
