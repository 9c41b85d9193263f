//! RequestBridge: correlates requests posted to the host with its completions.
//!
//! Flow:
//! 1. `invoke` allocates an id and serializes the envelope
//! 2. The pending entry is registered, then the envelope is posted (fire-and-forget)
//! 3. The host later calls `complete_success` / `complete_failure` with that id
//! 4. The entry is removed and the caller's `PendingResponse` settles
//!
//! There is no timeout and no cancellation: a request the host never completes stays
//! pending until the bridge is dropped.

use serde::de::DeserializeOwned;
use tokio::sync::{broadcast, watch};

use crate::bridge::protocol::{
    AddressType, Completion, GetMultiAddressesPayload, Request, RequestEnvelope, RequestId,
    SendBitcoinPayload, SignDataPayload, SignMessagePayload,
};
use crate::bridge::transport::OutboundTransport;
use crate::config::BridgeConfig;
use crate::error::{BridgeError, HostError, HostFailure};
use crate::events::BridgeEvent;
use crate::id::next_request_id;
use crate::pending::{PendingRequest, PendingResponse, PendingTable};

/// dApp-side endpoint of the bridge to the privileged host.
pub struct RequestBridge {
    rpc_url: String,
    identity: watch::Sender<Option<String>>,
    events: broadcast::Sender<BridgeEvent>,
    pending: PendingTable,
    transport: Box<dyn OutboundTransport>,
}

impl RequestBridge {
    pub fn new(config: BridgeConfig, transport: impl OutboundTransport + 'static) -> Self {
        tracing::debug!(
            rpc_url = %config.rpc_url,
            address = ?config.address,
            "Creating request bridge"
        );

        let (identity, _) = watch::channel(config.address);
        let (events, _) = broadcast::channel(config.event_capacity.max(1));

        Self {
            rpc_url: config.rpc_url,
            identity,
            events,
            pending: PendingTable::new(),
            transport: Box::new(transport),
        }
    }

    pub fn rpc_url(&self) -> &str {
        &self.rpc_url
    }

    /// Currently bound identity. Local state, never routed through the host.
    pub async fn get_identity(&self) -> Option<String> {
        self.identity.borrow().clone()
    }

    /// Replace the bound identity and notify subscribers.
    ///
    /// Requests already in flight are unaffected.
    pub fn set_identity(&self, address: impl Into<String>) {
        let address = address.into();
        tracing::debug!(%address, "Identity changed");

        self.identity.send_replace(Some(address.clone()));
        // No subscribers is fine.
        let _ = self.events.send(BridgeEvent::IdentityChanged(address));
    }

    pub fn subscribe(&self) -> broadcast::Receiver<BridgeEvent> {
        self.events.subscribe()
    }

    /// Derive `count` addresses of `address_type` from account `index`.
    ///
    /// Parameters go to the host untouched and the address order it returns is kept.
    pub fn get_multi_addresses(
        &self,
        count: u32,
        address_type: AddressType,
        index: u32,
    ) -> PendingResponse<Vec<String>> {
        tracing::debug!(count, address_type = address_type.as_str(), index, "get_multi_addresses");
        self.invoke(Request::GetMultiAddresses(GetMultiAddressesPayload {
            index,
            count,
            address_type,
        }))
    }

    /// Sign `digest`. Without `addresses` the host signs with its default address.
    pub fn sign_message(
        &self,
        digest: impl Into<String>,
        addresses: Option<Vec<String>>,
    ) -> PendingResponse<String> {
        let digest = digest.into();
        tracing::debug!(%digest, ?addresses, "sign_message");
        self.invoke(Request::SignMessage(SignMessagePayload { digest, addresses }))
    }

    /// Ask the host to build, sign and broadcast a payment. Resolves to the txid.
    pub fn send_bitcoin(&self, payload: SendBitcoinPayload) -> PendingResponse<String> {
        tracing::debug!(
            pay_address = %payload.pay_address,
            sat_amount = payload.sat_amount,
            sat_per_vb = payload.sat_per_vb,
            "send_bitcoin"
        );
        self.invoke(Request::SendBitcoin(payload))
    }

    /// Sign one transaction input. Resolves to the signature.
    pub fn sign_data(&self, payload: SignDataPayload) -> PendingResponse<String> {
        tracing::debug!(in_index = payload.in_index, value = payload.value, "sign_data");
        self.invoke(Request::SignData(payload))
    }

    /// Post `request` to the host and return a future for its result.
    ///
    /// Never fails synchronously: encoding and transport failures settle the
    /// returned response instead.
    pub fn invoke<T: DeserializeOwned>(&self, request: Request) -> PendingResponse<T> {
        let id = next_request_id();
        let operation = request.operation();
        let envelope = RequestEnvelope { id, request };

        let message = match serde_json::to_string(&envelope) {
            Ok(message) => message,
            Err(source) => {
                tracing::warn!(%id, operation, error = %source, "Failed to encode request");
                return PendingResponse::failed(id, BridgeError::Encode { id, source });
            }
        };

        // Registered before posting: the host may answer before post_message returns.
        let rx = self.pending.register(id, operation, message.clone());
        self.dispatch(id, operation, message);

        PendingResponse::new(id, rx)
    }

    fn dispatch(&self, id: RequestId, operation: &'static str, message: String) {
        tracing::debug!(%id, operation, "Posting request to host");
        tracing::trace!(%id, %message, "Request envelope");

        if let Err(source) = self.transport.post_message(message) {
            tracing::warn!(%id, operation, error = %source, "Failed to post request");
            if let Some(request) = self.pending.take(id) {
                request.reject(id, BridgeError::Transport { id, source });
            }
        }
    }

    /// Resolve pending request `id` with `result`.
    ///
    /// Errors with [`BridgeError::UnknownRequest`] if `id` is not pending.
    pub fn complete_success(
        &self,
        id: RequestId,
        result: serde_json::Value,
    ) -> Result<(), BridgeError> {
        let request = self.take_pending(id)?;
        tracing::debug!(%id, operation = request.operation(), "Request resolved by host");
        request.resolve(id, result);
        Ok(())
    }

    /// Reject pending request `id`, normalizing `error` into a [`HostError`].
    ///
    /// Errors with [`BridgeError::UnknownRequest`] if `id` is not pending.
    pub fn complete_failure(
        &self,
        id: RequestId,
        error: impl Into<HostFailure>,
    ) -> Result<(), BridgeError> {
        let request = self.take_pending(id)?;
        let error = HostError::from(error.into());
        tracing::debug!(
            %id,
            operation = request.operation(),
            error = %error,
            "Request rejected by host"
        );
        request.reject(id, BridgeError::Host { id, error });
        Ok(())
    }

    /// Route a decoded host completion to the matching entry point.
    pub fn apply(&self, completion: Completion) -> Result<(), BridgeError> {
        match completion {
            Completion::Response { id, result } => self.complete_success(id, result),
            Completion::Error { id, error } => self.complete_failure(id, error),
        }
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    pub fn is_pending(&self, id: RequestId) -> bool {
        self.pending.contains(id)
    }

    fn take_pending(&self, id: RequestId) -> Result<PendingRequest, BridgeError> {
        self.pending.take(id).ok_or_else(|| {
            tracing::error!(%id, "Completion for a request that is not pending");
            BridgeError::UnknownRequest(id)
        })
    }
}

impl Drop for RequestBridge {
    fn drop(&mut self) {
        let pending = self.pending.len();
        if pending > 0 {
            tracing::warn!(pending, "Dropping bridge with requests still pending");
        }
    }
}
