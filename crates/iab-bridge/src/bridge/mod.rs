//! Wire layer between the dApp side and the privileged host.
//!
//! # Architecture
//!
//! - **protocol**: Message types (RequestEnvelope outbound, Completion inbound)
//! - **codec**: Length-prefixed JSON framing for AsyncRead/AsyncWrite
//! - **transport**: One-way outbound send primitive and its implementations

pub mod codec;
pub mod protocol;
pub mod transport;
