use std::fmt;
use serde::{Serialize, Deserialize};
use serde_json::{Map, Value};

/// Port of an announced service. Peers may send it as a JSON number or a string;
/// it is carried and rendered back exactly as received.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Port {
    Number(u64),
    Text(String),
}

impl Port {
    /// Numeric zero counts as absent; the text "0" does not.
    pub fn is_empty(&self) -> bool {
        matches!(self, Port::Number(0)) || matches!(self, Port::Text(s) if s.is_empty())
    }
}

impl Default for Port {
    /// A missing port decodes as empty text so validation can reject the record.
    fn default() -> Self {
        Port::Text(String::new())
    }
}

impl fmt::Display for Port {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Port::Number(n) => write!(f, "{}", n),
            Port::Text(s) => f.write_str(s),
        }
    }
}

impl From<u16> for Port {
    fn from(port: u16) -> Self {
        Port::Number(port.into())
    }
}

impl From<&str> for Port {
    fn from(port: &str) -> Self {
        Port::Text(port.to_string())
    }
}

impl From<String> for Port {
    fn from(port: String) -> Self {
        Port::Text(port)
    }
}

/// A service as announced on the wire: name, host, port, plus any
/// caller-defined metadata which is flattened into the same JSON object.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ServiceRecord {
    #[serde(default)]
    pub name: String,

    /// Empty means "not given"; filled from the host address at announce time.
    #[serde(default)]
    pub host: String,

    #[serde(default)]
    pub port: Port,

    /// Extra key/value pairs. Not part of the service identity.
    #[serde(flatten)]
    pub metadata: Map<String, Value>,
}

impl ServiceRecord {
    pub fn new(name: impl Into<String>, host: impl Into<String>, port: impl Into<Port>) -> Self {
        Self {
            name: name.into(),
            host: host.into(),
            port: port.into(),
            metadata: Map::new(),
        }
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// Name of the first required field that is empty, if any.
    pub fn missing_field(&self) -> Option<&'static str> {
        if self.host.is_empty() {
            Some("host")
        } else if self.port.is_empty() {
            Some("port")
        } else if self.name.is_empty() {
            Some("name")
        } else {
            None
        }
    }

    pub fn is_valid(&self) -> bool {
        self.missing_field().is_none()
    }

    /// Composite identity `host:port:name`. Metadata does not take part.
    pub fn id(&self) -> ServiceId {
        ServiceId(format!("{}:{}:{}", self.host, self.port, self.name))
    }
}

/// Composite `host:port:name` key addressing a service in a registry.
/// Not globally unique: two processes picking the same triple collide.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ServiceId(String);

impl ServiceId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ServiceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ServiceId {
    fn from(id: &str) -> Self {
        ServiceId(id.to_string())
    }
}

impl From<String> for ServiceId {
    fn from(id: String) -> Self {
        ServiceId(id)
    }
}

/// A registry entry, also the element type of announce/renounce payloads.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceInfo {
    /// True only for services this process announced itself.
    #[serde(rename = "isOurService", default)]
    pub is_our_service: bool,

    pub service: ServiceRecord,
}

impl ServiceInfo {
    pub fn own(service: ServiceRecord) -> Self {
        Self { is_our_service: true, service }
    }

    pub fn foreign(service: ServiceRecord) -> Self {
        Self { is_our_service: false, service }
    }

    pub fn id(&self) -> ServiceId {
        self.service.id()
    }
}
