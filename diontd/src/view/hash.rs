use serde::Serialize;
use sha2::{Sha256, Digest};
use shared::types::{ServiceInfo, ServiceRecord};

#[derive(Serialize)]
struct HashView<'a> {
    id: String,
    is_our_service: bool,
    service: &'a ServiceRecord,
}

/// SHA-256 fingerprint of a registry snapshot.
/// Entries are sorted by id so the result does not depend on map order.
pub fn compute_hash(services: &[ServiceInfo]) -> String {
    let mut views: Vec<HashView<'_>> = services
        .iter()
        .map(|info| HashView {
            id: info.id().to_string(),
            is_our_service: info.is_our_service,
            service: &info.service,
        })
        .collect();
    views.sort_by(|a, b| a.id.cmp(&b.id));

    let json = serde_json::to_string(&views)
        .expect("Failed to serialize services for hashing");

    let hash = Sha256::digest(json.as_bytes());
    hex::encode(hash)
}
