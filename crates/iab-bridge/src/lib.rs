//! iab-bridge: request/response bridge between an in-app browser dApp and its wallet host.
//!
//! The dApp side can only post one-way messages to the host; the host answers later,
//! out of band, by completing the request id. [`RequestBridge`] turns that into
//! futures that settle exactly once.

pub mod binding;
pub mod bridge;
pub mod config;
pub mod error;
pub mod events;
mod id;
pub mod pending;
pub mod provider;

pub use binding::{CompletionStats, run_completion_loop};
pub use bridge::protocol::{
    AddressType, Completion, GetMultiAddressesPayload, Request, RequestEnvelope, RequestId,
    SendBitcoinPayload, SignDataPayload, SignMessagePayload,
};
pub use bridge::transport::{ChannelTransport, FramedTransport, OutboundTransport, TransportError};
pub use config::BridgeConfig;
pub use error::{BridgeError, HostError, HostFailure};
pub use events::BridgeEvent;
pub use id::next_request_id;
pub use pending::PendingResponse;
pub use provider::RequestBridge;
