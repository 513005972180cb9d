use std::fmt;
use uuid::Uuid;

/// Random per-process token stamped on every outgoing message, used only to
/// recognise our own datagrams when the network loops them back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct InstanceId(String);

impl InstanceId {
    pub(crate) fn generate() -> Self {
        InstanceId(Uuid::new_v4().to_string())
    }

    pub(crate) fn as_str(&self) -> &str {
        &self.0
    }

    pub(crate) fn is_origin_of(&self, from_instance: &str) -> bool {
        self.0 == from_instance
    }
}

impl fmt::Display for InstanceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
