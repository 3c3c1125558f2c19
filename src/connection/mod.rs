//! Live viewer connections.
//!
//! The transport layer (out of scope here) owns sockets; this module owns
//! the bookkeeping. It reports connects and disconnects to the
//! [`ConnectionRegistry`] and receives events through its [`ConnectionSink`]
//! implementation.

pub mod registry;
pub mod sink;

pub use registry::ConnectionRegistry;
pub use sink::ConnectionSink;
