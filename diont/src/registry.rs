use std::collections::hash_map::Entry;
use std::collections::HashMap;
use shared::types::{ServiceId, ServiceInfo};

/// Locally reconstructed view of the services on the segment.
///
/// Presence of an id means "last known to exist". There is no tombstone:
/// a renounced service is indistinguishable from one never seen.
#[derive(Debug, Default)]
pub struct Registry {
    entries: HashMap<ServiceId, ServiceInfo>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert unless the id is already present. The first writer wins;
    /// returns false and leaves the existing entry untouched otherwise.
    pub fn insert(&mut self, id: ServiceId, info: ServiceInfo) -> bool {
        match self.entries.entry(id) {
            Entry::Occupied(_) => false,
            Entry::Vacant(slot) => {
                slot.insert(info);
                true
            }
        }
    }

    pub fn remove(&mut self, id: &ServiceId) -> Option<ServiceInfo> {
        self.entries.remove(id)
    }

    pub fn get(&self, id: &ServiceId) -> Option<&ServiceInfo> {
        self.entries.get(id)
    }

    pub fn contains(&self, id: &ServiceId) -> bool {
        self.entries.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Owned copy of every entry; callers can mutate it freely.
    pub fn snapshot(&self) -> Vec<ServiceInfo> {
        self.entries.values().cloned().collect()
    }

    /// Entries this process announced itself
    pub fn own_entries(&self) -> Vec<ServiceInfo> {
        self.entries
            .values()
            .filter(|info| info.is_our_service)
            .cloned()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::types::ServiceRecord;

    fn foreign(name: &str) -> ServiceInfo {
        ServiceInfo::foreign(ServiceRecord::new(name, "10.0.0.2", "80"))
    }

    #[test]
    fn test_insert_first_writer_wins() {
        let mut registry = Registry::new();
        let first = foreign("svc");
        let second = ServiceInfo::foreign(first.service.clone().with_metadata("v", 2));

        assert!(registry.insert(first.id(), first.clone()));
        assert!(!registry.insert(second.id(), second));
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.get(&first.id()), Some(&first));
    }

    #[test]
    fn test_remove_returns_prior_entry() {
        let mut registry = Registry::new();
        let info = foreign("svc");
        registry.insert(info.id(), info.clone());

        assert_eq!(registry.remove(&info.id()), Some(info.clone()));
        assert_eq!(registry.remove(&info.id()), None);
        assert!(registry.is_empty());
    }

    #[test]
    fn test_snapshot_is_isolated() {
        let mut registry = Registry::new();
        let info = foreign("svc");
        registry.insert(info.id(), info.clone());

        let mut snapshot = registry.snapshot();
        snapshot[0].service.name = "mutated".to_string();
        snapshot[0].is_our_service = true;
        snapshot.clear();

        assert_eq!(registry.get(&info.id()), Some(&info));
    }

    #[test]
    fn test_own_entries_partition() {
        let mut registry = Registry::new();
        let ours = ServiceInfo::own(ServiceRecord::new("mine", "10.0.0.1", "1"));
        let theirs = foreign("theirs");
        registry.insert(ours.id(), ours.clone());
        registry.insert(theirs.id(), theirs);

        assert_eq!(registry.own_entries(), vec![ours]);
        assert_eq!(registry.snapshot().len(), 2);
    }
}
