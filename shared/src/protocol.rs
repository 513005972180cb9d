use std::net::Ipv4Addr;
use serde::{Serialize, Deserialize};
use serde_json::Value;
use crate::types::ServiceInfo;

/// Default multicast group for announcements
pub const MULTICAST_HOST: Ipv4Addr = Ipv4Addr::new(224, 0, 0, 236);

/// Destination used instead of the group in broadcast mode
pub const BROADCAST_HOST: Ipv4Addr = Ipv4Addr::BROADCAST;

/// UDP port shared by every participant
pub const DEFAULT_PORT: u16 = 60540;

/// Multicast TTL; 1 keeps datagrams on the local link
pub const MULTICAST_TTL: u32 = 1;

/// Largest payload a single UDP datagram can carry
pub const MAX_DATAGRAM_SIZE: usize = 65507;

/// API path prefix
pub const API_PREFIX: &str = "/v1";

/// One protocol message. Exactly one is carried per datagram, as UTF-8 JSON
/// tagged by `eventType`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "eventType", rename_all = "lowercase")]
pub enum Message {
    Query {
        #[serde(rename = "fromInstance")]
        from_instance: String,
    },
    Announce {
        #[serde(rename = "fromInstance")]
        from_instance: String,
        #[serde(rename = "serviceInfos")]
        service_infos: Vec<ServiceInfo>,
    },
    Renounce {
        #[serde(rename = "fromInstance")]
        from_instance: String,
        #[serde(rename = "serviceInfos")]
        service_infos: Vec<ServiceInfo>,
    },
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "lowercase")]
enum EventType {
    Query,
    Announce,
    Renounce,
}

/// Envelope as received. Entries stay untyped so one bad entry cannot
/// poison the rest of the batch.
#[derive(Deserialize)]
struct RawMessage {
    #[serde(rename = "eventType")]
    event_type: EventType,
    #[serde(rename = "fromInstance", alias = "fromDiontInstance")]
    from_instance: String,
    #[serde(rename = "serviceInfos", default)]
    service_infos: Vec<Value>,
}

impl Message {
    pub fn from_instance(&self) -> &str {
        match self {
            Message::Query { from_instance }
            | Message::Announce { from_instance, .. }
            | Message::Renounce { from_instance, .. } => from_instance,
        }
    }

    pub fn encode(&self) -> serde_json::Result<Vec<u8>> {
        serde_json::to_vec(self)
    }

    /// Parse a datagram payload.
    ///
    /// Fails only when the envelope itself is unusable. Elements of
    /// `serviceInfos` that are not ServiceInfo objects are dropped; records
    /// with empty required fields are kept and left for the receiver to skip.
    pub fn decode(data: &[u8]) -> serde_json::Result<Self> {
        let raw: RawMessage = serde_json::from_slice(data)?;

        let entries = || {
            raw.service_infos
                .iter()
                .filter_map(|value| ServiceInfo::deserialize(value).ok())
                .collect::<Vec<_>>()
        };

        let message = match raw.event_type {
            EventType::Query => Message::Query {
                from_instance: raw.from_instance.clone(),
            },
            EventType::Announce => Message::Announce {
                service_infos: entries(),
                from_instance: raw.from_instance.clone(),
            },
            EventType::Renounce => Message::Renounce {
                service_infos: entries(),
                from_instance: raw.from_instance.clone(),
            },
        };

        Ok(message)
    }
}
