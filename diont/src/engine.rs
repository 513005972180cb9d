//! Protocol engine: decides what an inbound message or a local API call
//! means for the registry, which listeners fire, and what goes out on the
//! wire. Performs no I/O itself; outgoing messages are returned.

use shared::protocol::Message;
use shared::types::{ServiceId, ServiceInfo, ServiceRecord};

use crate::address::AddressProvider;
use crate::error::{DiontError, Result};
use crate::events::{Callback, Dispatcher, ServiceEvent, SubscriptionId};
use crate::instance::InstanceId;
use crate::registry::Registry;

/// What to renounce: a composite id, or a record to derive it from
#[derive(Debug, Clone, PartialEq)]
pub enum RenounceTarget {
    Id(ServiceId),
    Record(ServiceRecord),
}

impl From<ServiceId> for RenounceTarget {
    fn from(id: ServiceId) -> Self {
        RenounceTarget::Id(id)
    }
}

impl From<&ServiceId> for RenounceTarget {
    fn from(id: &ServiceId) -> Self {
        RenounceTarget::Id(id.clone())
    }
}

impl From<&str> for RenounceTarget {
    fn from(id: &str) -> Self {
        RenounceTarget::Id(id.into())
    }
}

impl From<String> for RenounceTarget {
    fn from(id: String) -> Self {
        RenounceTarget::Id(id.into())
    }
}

impl From<ServiceRecord> for RenounceTarget {
    fn from(record: ServiceRecord) -> Self {
        RenounceTarget::Record(record)
    }
}

impl From<&ServiceRecord> for RenounceTarget {
    fn from(record: &ServiceRecord) -> Self {
        RenounceTarget::Record(record.clone())
    }
}

#[derive(Debug)]
pub struct Engine {
    instance: InstanceId,
    registry: Registry,
    dispatcher: Dispatcher,
}

impl Default for Engine {
    fn default() -> Self {
        Self::new()
    }
}

impl Engine {
    pub fn new() -> Self {
        Self {
            instance: InstanceId::generate(),
            registry: Registry::new(),
            dispatcher: Dispatcher::new(),
        }
    }

    pub(crate) fn instance(&self) -> &InstanceId {
        &self.instance
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn subscribe(&mut self, event: ServiceEvent, callback: Callback) -> SubscriptionId {
        self.dispatcher.subscribe(event, callback)
    }

    pub fn unsubscribe(&mut self, event: ServiceEvent, id: &SubscriptionId) -> bool {
        self.dispatcher.unsubscribe(event, id)
    }

    pub fn service_infos(&self) -> Vec<ServiceInfo> {
        self.registry.snapshot()
    }

    /// Decode and handle one datagram. Undecodable payloads are dropped.
    /// Returns the reply to broadcast, if any.
    pub fn handle_datagram(&mut self, payload: &[u8]) -> Option<Message> {
        match Message::decode(payload) {
            Ok(message) => self.handle_message(message),
            Err(e) => {
                tracing::debug!("Dropping malformed datagram: {}", e);
                None
            }
        }
    }

    pub fn handle_message(&mut self, message: Message) -> Option<Message> {
        if self.instance.is_origin_of(message.from_instance()) {
            tracing::trace!("Ignoring our own message");
            return None;
        }

        match message {
            Message::Query { from_instance } => {
                tracing::debug!("Query from {}", from_instance);
                let known = self.registry.snapshot();
                if known.is_empty() {
                    return None;
                }
                Some(self.announcement(known))
            }
            Message::Announce { service_infos, .. } => {
                for info in service_infos {
                    self.apply_announce(info.service);
                }
                None
            }
            Message::Renounce { service_infos, .. } => {
                for info in service_infos {
                    self.apply_renounce(&info.service);
                }
                None
            }
        }
    }

    fn apply_announce(&mut self, service: ServiceRecord) {
        if let Some(field) = service.missing_field() {
            tracing::debug!("Skipping announced service without {}", field);
            return;
        }

        let id = service.id();
        // Announcements always describe a peer's service.
        let info = ServiceInfo::foreign(service);
        if self.registry.insert(id.clone(), info.clone()) {
            tracing::debug!("Service announced: {}", id);
            self.dispatcher.dispatch(ServiceEvent::ServiceAnnounced, &info);
        }
    }

    fn apply_renounce(&mut self, service: &ServiceRecord) {
        if let Some(field) = service.missing_field() {
            tracing::debug!("Skipping renounced service without {}", field);
            return;
        }

        let id = service.id();
        if let Some(stored) = self.registry.remove(&id) {
            tracing::debug!("Service renounced: {}", id);
            self.dispatcher.dispatch(ServiceEvent::ServiceRenounced, &stored);
        }
    }

    /// Register one of our own services. Returns its id and, when it was
    /// not known yet, the announcement to broadcast.
    pub fn announce_service(
        &mut self,
        mut record: ServiceRecord,
        addresses: &dyn AddressProvider,
    ) -> Result<(ServiceId, Option<Message>)> {
        if record.host.is_empty() {
            record.host = addresses
                .current_host_address()
                .ok_or(DiontError::NoAnnounceableAddress)?;
        }
        if let Some(field) = record.missing_field() {
            return Err(DiontError::InvalidService(field.to_string()));
        }

        let id = record.id();
        if self.registry.contains(&id) {
            return Ok((id, None));
        }

        let info = ServiceInfo::own(record);
        self.registry.insert(id.clone(), info.clone());
        tracing::info!("Announcing {}", id);
        Ok((id, Some(self.announcement(vec![info]))))
    }

    /// Drop one of our own services. Unknown ids and peers' services are
    /// left alone and nothing is sent.
    pub fn renounce_service(&mut self, target: RenounceTarget) -> Result<Option<Message>> {
        let id = match target {
            RenounceTarget::Id(id) => id,
            RenounceTarget::Record(record) => {
                if let Some(field) = record.missing_field() {
                    return Err(DiontError::InvalidService(field.to_string()));
                }
                record.id()
            }
        };

        if !self.registry.get(&id).is_some_and(|info| info.is_our_service) {
            tracing::debug!("Not renouncing {}: unknown or owned by a peer", id);
            return Ok(None);
        }
        let Some(removed) = self.registry.remove(&id) else {
            return Ok(None);
        };

        tracing::info!("Renouncing {}", id);
        Ok(Some(Message::Renounce {
            from_instance: self.instance.to_string(),
            service_infos: vec![removed],
        }))
    }

    /// One announcement carrying every service we own, if there are any.
    pub fn repeat_announcements(&self) -> Option<Message> {
        let own = self.registry.own_entries();
        if own.is_empty() {
            return None;
        }
        Some(self.announcement(own))
    }

    pub fn query(&self) -> Message {
        Message::Query {
            from_instance: self.instance.to_string(),
        }
    }

    fn announcement(&self, service_infos: Vec<ServiceInfo>) -> Message {
        Message::Announce {
            from_instance: self.instance.to_string(),
            service_infos,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};
    use crate::address::StaticAddressProvider;

    const PEER: &str = "peer-instance";

    fn svc() -> ServiceRecord {
        ServiceRecord::new("svc", "10.0.0.1", "9")
    }

    fn announce(from: &str, records: Vec<ServiceRecord>) -> Message {
        Message::Announce {
            from_instance: from.to_string(),
            service_infos: records.into_iter().map(ServiceInfo::foreign).collect(),
        }
    }

    fn renounce(from: &str, records: Vec<ServiceRecord>) -> Message {
        Message::Renounce {
            from_instance: from.to_string(),
            service_infos: records.into_iter().map(ServiceInfo::foreign).collect(),
        }
    }

    fn record_events(engine: &mut Engine, event: ServiceEvent) -> Arc<Mutex<Vec<ServiceInfo>>> {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        engine.subscribe(event, Box::new(move |info: &ServiceInfo| sink.lock().unwrap().push(info.clone())));
        seen
    }

    #[test]
    fn test_announce_service_registers_own_entry() {
        let mut engine = Engine::new();
        let (id, outgoing) = engine
            .announce_service(svc(), &StaticAddressProvider::none())
            .unwrap();

        assert_eq!(id.as_str(), "10.0.0.1:9:svc");
        let infos = engine.service_infos();
        assert_eq!(infos.len(), 1);
        assert!(infos[0].is_our_service);
        assert_eq!(infos[0].id(), id);

        match outgoing {
            Some(Message::Announce { from_instance, service_infos }) => {
                assert_eq!(from_instance, engine.instance().to_string());
                assert_eq!(service_infos, infos);
            }
            other => panic!("expected announce, got {:?}", other),
        }
    }

    #[test]
    fn test_announce_service_fills_missing_host() {
        let mut engine = Engine::new();
        let record = ServiceRecord::new("svc", "", "1233");

        let (id, _) = engine
            .announce_service(record, &StaticAddressProvider::new("192.168.1.5"))
            .unwrap();
        assert_eq!(id.as_str(), "192.168.1.5:1233:svc");
    }

    #[test]
    fn test_announce_service_without_address_fails() {
        let mut engine = Engine::new();
        let err = engine
            .announce_service(ServiceRecord::new("svc", "", "1"), &StaticAddressProvider::none())
            .unwrap_err();
        assert!(matches!(err, DiontError::NoAnnounceableAddress));
        assert!(engine.registry().is_empty());
    }

    #[test]
    fn test_announce_service_rejects_missing_fields() {
        let mut engine = Engine::new();
        let provider = StaticAddressProvider::new("10.0.0.1");

        let err = engine
            .announce_service(ServiceRecord::new("svc", "", ""), &provider)
            .unwrap_err();
        assert!(matches!(err, DiontError::InvalidService(ref f) if f == "port"));

        let err = engine
            .announce_service(ServiceRecord::new("", "h", "1"), &provider)
            .unwrap_err();
        assert!(matches!(err, DiontError::InvalidService(ref f) if f == "name"));

        let err = engine
            .announce_service(ServiceRecord::new("svc", "10.0.0.1", 0u16), &provider)
            .unwrap_err();
        assert!(matches!(err, DiontError::InvalidService(ref f) if f == "port"));
        assert!(engine.registry().is_empty());
    }

    #[test]
    fn test_reannounce_is_idempotent() {
        let mut engine = Engine::new();
        let provider = StaticAddressProvider::none();
        let (first, _) = engine.announce_service(svc(), &provider).unwrap();
        let (second, outgoing) = engine.announce_service(svc(), &provider).unwrap();

        assert_eq!(first, second);
        assert!(outgoing.is_none());
        assert_eq!(engine.registry().len(), 1);
    }

    #[test]
    fn test_self_echo_is_ignored() {
        let mut engine = Engine::new();
        let announced = record_events(&mut engine, ServiceEvent::ServiceAnnounced);
        let own = engine.instance().to_string();

        assert!(engine.handle_message(announce(&own, vec![svc()])).is_none());
        assert!(engine.handle_message(Message::Query { from_instance: own.clone() }).is_none());

        assert!(engine.registry().is_empty());
        assert!(announced.lock().unwrap().is_empty());
    }

    #[test]
    fn test_renounce_with_own_token_is_ignored() {
        let mut engine = Engine::new();
        let renounced = record_events(&mut engine, ServiceEvent::ServiceRenounced);
        let own = engine.instance().to_string();

        engine.handle_message(announce(PEER, vec![svc()]));
        assert!(engine.handle_message(renounce(&own, vec![svc()])).is_none());

        assert_eq!(engine.registry().len(), 1);
        assert!(renounced.lock().unwrap().is_empty());
    }

    #[test]
    fn test_own_announcement_echo_does_not_duplicate() {
        let mut engine = Engine::new();
        let (_, outgoing) = engine
            .announce_service(svc(), &StaticAddressProvider::none())
            .unwrap();
        let payload = outgoing.unwrap().encode().unwrap();

        assert!(engine.handle_datagram(&payload).is_none());
        assert_eq!(engine.registry().len(), 1);
        assert!(engine.service_infos()[0].is_our_service);
    }

    #[test]
    fn test_peer_announce_fires_once() {
        let mut engine = Engine::new();
        let announced = record_events(&mut engine, ServiceEvent::ServiceAnnounced);

        engine.handle_message(announce(PEER, vec![svc()]));
        engine.handle_message(announce(PEER, vec![svc()]));

        assert_eq!(engine.registry().len(), 1);
        let seen = announced.lock().unwrap();
        assert_eq!(*seen, vec![ServiceInfo::foreign(svc())]);
    }

    #[test]
    fn test_peer_announce_never_marked_own() {
        let mut engine = Engine::new();
        let message = Message::Announce {
            from_instance: PEER.to_string(),
            service_infos: vec![ServiceInfo::own(svc())],
        };
        engine.handle_message(message);

        assert!(!engine.service_infos()[0].is_our_service);
    }

    #[test]
    fn test_announce_batch_skips_invalid_entries() {
        let mut engine = Engine::new();
        let announced = record_events(&mut engine, ServiceEvent::ServiceAnnounced);
        let mut no_port = ServiceRecord::new("broken", "10.0.0.2", "");
        no_port.metadata.insert("note".to_string(), "missing port".into());

        let zero_port = ServiceRecord::new("zero", "10.0.0.2", 0u16);

        engine.handle_message(announce(PEER, vec![no_port, zero_port, svc()]));

        assert_eq!(engine.registry().len(), 1);
        assert_eq!(announced.lock().unwrap().len(), 1);
        assert_eq!(engine.service_infos()[0].service, svc());
    }

    #[test]
    fn test_malformed_datagram_is_dropped() {
        let mut engine = Engine::new();
        assert!(engine.handle_datagram(b"not json at all").is_none());
        assert!(engine.handle_datagram(br#"{"eventType":"announce"}"#).is_none());
        assert!(engine.registry().is_empty());
    }

    #[test]
    fn test_empty_announce_is_noop() {
        let mut engine = Engine::new();
        assert!(engine.handle_message(announce(PEER, vec![])).is_none());
        assert!(engine.registry().is_empty());
    }

    #[test]
    fn test_peer_renounce_fires_with_stored_entry() {
        let mut engine = Engine::new();
        let renounced = record_events(&mut engine, ServiceEvent::ServiceRenounced);
        let stored = svc().with_metadata("version", "1");

        engine.handle_message(announce(PEER, vec![stored.clone()]));
        engine.handle_message(renounce(PEER, vec![svc().with_metadata("version", "stale")]));

        assert!(engine.registry().is_empty());
        assert_eq!(*renounced.lock().unwrap(), vec![ServiceInfo::foreign(stored)]);
    }

    #[test]
    fn test_renounce_of_unknown_is_noop() {
        let mut engine = Engine::new();
        let renounced = record_events(&mut engine, ServiceEvent::ServiceRenounced);

        assert!(engine.handle_message(renounce(PEER, vec![svc()])).is_none());
        assert!(renounced.lock().unwrap().is_empty());
    }

    #[test]
    fn test_query_replies_with_full_snapshot() {
        let mut engine = Engine::new();
        engine
            .announce_service(svc(), &StaticAddressProvider::none())
            .unwrap();
        engine.handle_message(announce(PEER, vec![ServiceRecord::new("other", "10.0.0.3", 80u16)]));

        let reply = engine.handle_message(Message::Query { from_instance: PEER.to_string() });
        match reply {
            Some(Message::Announce { service_infos, .. }) => {
                assert_eq!(service_infos.len(), 2);
                assert_eq!(service_infos.iter().filter(|i| i.is_our_service).count(), 1);
            }
            other => panic!("expected announce, got {:?}", other),
        }
    }

    #[test]
    fn test_query_with_nothing_known_sends_nothing() {
        let mut engine = Engine::new();
        assert!(engine
            .handle_message(Message::Query { from_instance: PEER.to_string() })
            .is_none());
    }

    #[test]
    fn test_renounce_own_service_by_id_and_record() {
        let mut engine = Engine::new();
        let provider = StaticAddressProvider::none();
        let (id, _) = engine.announce_service(svc(), &provider).unwrap();

        match engine.renounce_service(id.clone().into()).unwrap() {
            Some(Message::Renounce { service_infos, .. }) => {
                assert_eq!(service_infos, vec![ServiceInfo::own(svc())]);
            }
            other => panic!("expected renounce, got {:?}", other),
        }
        assert!(engine.registry().is_empty());

        engine.announce_service(svc(), &provider).unwrap();
        assert!(engine.renounce_service(svc().into()).unwrap().is_some());
        assert!(engine.renounce_service(svc().into()).unwrap().is_none());
    }

    #[test]
    fn test_renounce_peer_service_is_refused() {
        let mut engine = Engine::new();
        engine.handle_message(announce(PEER, vec![svc()]));

        assert!(engine.renounce_service(svc().into()).unwrap().is_none());
        assert!(engine.renounce_service("10.0.0.1:9:svc".into()).unwrap().is_none());
        assert_eq!(engine.registry().len(), 1);
    }

    #[test]
    fn test_renounce_invalid_record_fails() {
        let mut engine = Engine::new();
        let err = engine
            .renounce_service(ServiceRecord::new("svc", "", "9").into())
            .unwrap_err();
        assert!(matches!(err, DiontError::InvalidService(ref f) if f == "host"));
    }

    #[test]
    fn test_repeat_announcements_only_own() {
        let mut engine = Engine::new();
        assert!(engine.repeat_announcements().is_none());

        engine
            .announce_service(svc(), &StaticAddressProvider::none())
            .unwrap();
        engine.handle_message(announce(PEER, vec![ServiceRecord::new("other", "10.0.0.3", "80")]));

        match engine.repeat_announcements() {
            Some(Message::Announce { service_infos, .. }) => {
                assert_eq!(service_infos, vec![ServiceInfo::own(svc())]);
            }
            other => panic!("expected announce, got {:?}", other),
        }
    }

    #[test]
    fn test_local_calls_never_fire_listeners() {
        let mut engine = Engine::new();
        let announced = record_events(&mut engine, ServiceEvent::ServiceAnnounced);
        let renounced = record_events(&mut engine, ServiceEvent::ServiceRenounced);
        let (id, _) = engine
            .announce_service(svc(), &StaticAddressProvider::none())
            .unwrap();
        engine.repeat_announcements();
        engine.renounce_service(id.into()).unwrap();

        assert!(announced.lock().unwrap().is_empty());
        assert!(renounced.lock().unwrap().is_empty());
    }
}
