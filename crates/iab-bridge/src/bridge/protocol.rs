//! Wire protocol types for dApp-host communication.
//!
//! Two directions:
//! - **Outbound** (dApp → host): [`RequestEnvelope`], one per invocation, fire-and-forget
//! - **Inbound** (host → dApp): [`Completion`], resolving or rejecting one pending id

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::HostFailure;

/// Correlation id for one request.
///
/// Allocated from a process-wide monotonic counter, never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequestId(u64);

impl RequestId {
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for RequestId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Address category for multi-address derivation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AddressType {
    External,
    Internal,
    /// Special-purpose addresses of the wallet (owner, deposit, ...).
    Special,
    /// Every special address first, then the remaining count split evenly between
    /// external and internal addresses. Ordering is decided by the host.
    #[default]
    All,
}

impl AddressType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::External => "external",
            Self::Internal => "internal",
            Self::Special => "special",
            Self::All => "all",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid address type '{0}', expected external, internal, special or all")]
pub struct ParseAddressTypeError(String);

impl FromStr for AddressType {
    type Err = ParseAddressTypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "external" => Ok(Self::External),
            "internal" => Ok(Self::Internal),
            "special" => Ok(Self::Special),
            "all" => Ok(Self::All),
            other => Err(ParseAddressTypeError(other.to_string())),
        }
    }
}

/// Parameters for `elamain_getMultiAddresses`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GetMultiAddressesPayload {
    /// Account index, only meaningful for multi-account wallets.
    pub index: u32,
    pub count: u32,
    #[serde(rename = "type")]
    pub address_type: AddressType,
}

impl GetMultiAddressesPayload {
    /// `count` addresses of every category from account 0.
    pub fn new(count: u32) -> Self {
        Self {
            index: 0,
            count,
            address_type: AddressType::All,
        }
    }

    pub fn with_type(mut self, address_type: AddressType) -> Self {
        self.address_type = address_type;
        self
    }

    pub fn with_index(mut self, index: u32) -> Self {
        self.index = index;
        self
    }
}

/// Parameters for `elamain_signMessage`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignMessagePayload {
    pub digest: String,
    /// Candidate signing addresses. `None` lets the host pick its default address.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub addresses: Option<Vec<String>>,
}

/// Parameters for `unisat_sendBitcoin`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendBitcoinPayload {
    /// Address receiving the payment.
    pub pay_address: String,
    pub sat_amount: u64,
    /// Fee rate, integer sats per virtual byte.
    #[serde(rename = "satPerVB")]
    pub sat_per_vb: u64,
}

/// Parameters for `unisat_signData`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignDataPayload {
    pub raw_data: String,
    pub prev_out_script: String,
    /// Index of the input being signed.
    pub in_index: u32,
    /// Value of that input, in sats.
    pub value: u64,
}

/// Operation requested from the host, one variant per capability.
///
/// Serialized adjacently tagged: the operation name goes in `name`, the payload in `object`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "name", content = "object")]
pub enum Request {
    #[serde(rename = "elamain_getMultiAddresses")]
    GetMultiAddresses(GetMultiAddressesPayload),

    #[serde(rename = "elamain_signMessage")]
    SignMessage(SignMessagePayload),

    #[serde(rename = "unisat_sendBitcoin")]
    SendBitcoin(SendBitcoinPayload),

    #[serde(rename = "unisat_signData")]
    SignData(SignDataPayload),
}

impl Request {
    /// Operation name as it appears on the wire.
    pub fn operation(&self) -> &'static str {
        match self {
            Self::GetMultiAddresses(_) => "elamain_getMultiAddresses",
            Self::SignMessage(_) => "elamain_signMessage",
            Self::SendBitcoin(_) => "unisat_sendBitcoin",
            Self::SignData(_) => "unisat_signData",
        }
    }
}

/// The unit posted to the host: `{"id": .., "name": .., "object": ..}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestEnvelope {
    pub id: RequestId,
    #[serde(flatten)]
    pub request: Request,
}

/// Completion sent back by the host for a previously posted request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Completion {
    Response {
        id: RequestId,
        /// Missing result decodes as `null`.
        #[serde(default)]
        result: serde_json::Value,
    },

    Error {
        id: RequestId,
        error: HostFailure,
    },
}

impl Completion {
    pub fn id(&self) -> RequestId {
        match self {
            Self::Response { id, .. } | Self::Error { id, .. } => *id,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::HostError;
    use serde_json::json;

    #[test]
    fn get_multi_addresses_envelope_serializes() {
        let envelope = RequestEnvelope {
            id: RequestId::new(7),
            request: Request::GetMultiAddresses(GetMultiAddressesPayload::new(10)),
        };
        insta::assert_json_snapshot!(envelope);
    }

    #[test]
    fn sign_message_without_addresses_serializes() {
        let envelope = RequestEnvelope {
            id: RequestId::new(8),
            request: Request::SignMessage(SignMessagePayload {
                digest: "0xdeadbeef".to_string(),
                addresses: None,
            }),
        };
        insta::assert_json_snapshot!(envelope);
    }

    #[test]
    fn send_bitcoin_envelope_serializes() {
        let envelope = RequestEnvelope {
            id: RequestId::new(9),
            request: Request::SendBitcoin(SendBitcoinPayload {
                pay_address: "bc1qexample".to_string(),
                sat_amount: 15_000,
                sat_per_vb: 3,
            }),
        };
        insta::assert_json_snapshot!(envelope);
    }

    #[test]
    fn error_completion_serializes() {
        let completion = Completion::Error {
            id: RequestId::new(11),
            error: HostFailure::Error(HostError::new("user rejected").with_code(4001)),
        };
        insta::assert_json_snapshot!(completion);
    }

    #[test]
    fn sign_message_with_addresses_keeps_list() {
        let envelope = RequestEnvelope {
            id: RequestId::new(3),
            request: Request::SignMessage(SignMessagePayload {
                digest: "abc".to_string(),
                addresses: Some(vec!["EaddrA".to_string(), "EaddrB".to_string()]),
            }),
        };
        let value = serde_json::to_value(&envelope).unwrap();
        assert_eq!(
            value,
            json!({
                "id": 3,
                "name": "elamain_signMessage",
                "object": {"digest": "abc", "addresses": ["EaddrA", "EaddrB"]}
            })
        );
    }

    #[test]
    fn sign_data_uses_camel_case_fields() {
        let request = Request::SignData(SignDataPayload {
            raw_data: "00ff".to_string(),
            prev_out_script: "76a914".to_string(),
            in_index: 1,
            value: 546,
        });
        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(
            value,
            json!({
                "name": "unisat_signData",
                "object": {"rawData": "00ff", "prevOutScript": "76a914", "inIndex": 1, "value": 546}
            })
        );
    }

    #[test]
    fn envelope_parses_on_host_side() {
        let raw = r#"{"id":42,"name":"elamain_getMultiAddresses",
            "object":{"index":2,"count":5,"type":"internal"}}"#;
        let envelope: RequestEnvelope = serde_json::from_str(raw).unwrap();

        assert_eq!(envelope.id, RequestId::new(42));
        assert_eq!(
            envelope.request,
            Request::GetMultiAddresses(
                GetMultiAddressesPayload::new(5)
                    .with_type(AddressType::Internal)
                    .with_index(2)
            )
        );
    }

    #[test]
    fn operation_matches_wire_name() {
        let requests = [
            Request::GetMultiAddresses(GetMultiAddressesPayload::new(1)),
            Request::SignMessage(SignMessagePayload {
                digest: String::new(),
                addresses: None,
            }),
            Request::SendBitcoin(SendBitcoinPayload {
                pay_address: String::new(),
                sat_amount: 0,
                sat_per_vb: 0,
            }),
            Request::SignData(SignDataPayload {
                raw_data: String::new(),
                prev_out_script: String::new(),
                in_index: 0,
                value: 0,
            }),
        ];

        for request in requests {
            let value = serde_json::to_value(&request).unwrap();
            assert_eq!(value["name"], request.operation());
        }
    }

    #[test]
    fn response_completion_without_result_is_null() {
        let completion: Completion = serde_json::from_str(r#"{"type":"response","id":5}"#).unwrap();
        assert_eq!(
            completion,
            Completion::Response {
                id: RequestId::new(5),
                result: serde_json::Value::Null,
            }
        );
    }

    #[test]
    fn error_completion_accepts_plain_string() {
        let completion: Completion =
            serde_json::from_str(r#"{"type":"error","id":6,"error":"wallet locked"}"#).unwrap();
        assert_eq!(completion.id(), RequestId::new(6));
        match completion {
            Completion::Error { error, .. } => {
                assert_eq!(error, HostFailure::Message("wallet locked".to_string()));
            }
            _ => panic!("wrong variant"),
        }
    }

    #[test]
    fn address_type_parses() {
        assert_eq!("all".parse::<AddressType>(), Ok(AddressType::All));
        assert_eq!("special".parse::<AddressType>(), Ok(AddressType::Special));
        assert!("owner".parse::<AddressType>().is_err());
        assert_eq!(AddressType::External.as_str(), "external");
    }
}
