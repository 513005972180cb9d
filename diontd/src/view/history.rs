use std::collections::VecDeque;
use chrono::{DateTime, Utc};
use diont::ServiceEvent;
use serde::Serialize;
use shared::types::ServiceInfo;

/// A listener notification as observed by the daemon
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordedEvent {
    pub event: ServiceEvent,
    pub service_info: ServiceInfo,
    pub at: DateTime<Utc>,
}

/// Most recent events, oldest first. Older entries fall off once full.
#[derive(Debug)]
pub struct EventHistory {
    events: VecDeque<RecordedEvent>,
    capacity: usize,
}

impl EventHistory {
    pub fn new(capacity: usize) -> Self {
        Self {
            events: VecDeque::with_capacity(capacity.min(1024)),
            capacity,
        }
    }

    pub fn record(&mut self, event: ServiceEvent, service_info: ServiceInfo) {
        if self.capacity == 0 {
            return;
        }
        while self.events.len() >= self.capacity {
            self.events.pop_front();
        }
        self.events.push_back(RecordedEvent {
            event,
            service_info,
            at: Utc::now(),
        });
    }

    pub fn to_vec(&self) -> Vec<RecordedEvent> {
        self.events.iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::types::ServiceRecord;

    fn info(name: &str) -> ServiceInfo {
        ServiceInfo::foreign(ServiceRecord::new(name, "10.0.0.2", "80"))
    }

    #[test]
    fn test_history_keeps_order() {
        let mut history = EventHistory::new(8);
        history.record(ServiceEvent::ServiceAnnounced, info("a"));
        history.record(ServiceEvent::ServiceRenounced, info("a"));

        let events = history.to_vec();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].event, ServiceEvent::ServiceAnnounced);
        assert_eq!(events[1].event, ServiceEvent::ServiceRenounced);
        assert!(events[0].at <= events[1].at);
    }

    #[test]
    fn test_history_drops_oldest_when_full() {
        let mut history = EventHistory::new(2);
        for name in ["a", "b", "c"] {
            history.record(ServiceEvent::ServiceAnnounced, info(name));
        }

        let names: Vec<_> = history
            .to_vec()
            .into_iter()
            .map(|e| e.service_info.service.name)
            .collect();
        assert_eq!(names, vec!["b", "c"]);
    }

    #[test]
    fn test_recorded_event_uses_camel_case_keys() {
        let mut history = EventHistory::new(1);
        history.record(ServiceEvent::ServiceAnnounced, info("a"));

        let json = serde_json::to_value(history.to_vec()).unwrap();
        let event = &json[0];
        assert!(event.get("serviceInfo").is_some());
        assert!(event.get("service_info").is_none());
        assert_eq!(event["serviceInfo"]["isOurService"], false);
        assert_eq!(event["event"], "serviceAnnounced");
    }

    #[test]
    fn test_zero_capacity_records_nothing() {
        let mut history = EventHistory::new(0);
        history.record(ServiceEvent::ServiceAnnounced, info("a"));
        assert_eq!(history.len(), 0);
    }
}
