//! Async transport and frame-level I/O for CARES.
//!
//! `cares-proto` defines the frame format and message types; this crate
//! moves them over the wire. [`transport`] wraps TCP listeners and
//! connections, [`framing`] sends and receives whole frames.

pub mod framing;
pub mod transport;

pub use framing::{recv_frame, recv_frame_timeout, send_envelope, Frame};
pub use transport::{TcpConnection, TcpListener, TransportError};
