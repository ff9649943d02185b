// Fire-and-forget analytics events.
// Pushing never fails and never blocks playback; a full queue drops its oldest event.

use std::collections::VecDeque;

use serde::Serialize;

use crate::types::{SlideIndex, Timestamp};

const CATEGORY: &str = "User Interaction";

/// Notable interactions worth reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum TelemetryAction {
    HotspotSelected,
    ArEntered,
    ZoomEnded,
}

impl TelemetryAction {
    pub fn event_name(&self) -> &'static str {
        match self {
            TelemetryAction::HotspotSelected => "hotspot_selected",
            TelemetryAction::ArEntered => "ar_entered",
            TelemetryAction::ZoomEnded => "zoom_end",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TelemetryEvent {
    pub event_name: &'static str,
    pub category: &'static str,
    pub label: String,
    pub value: u32,
    pub slide_index: SlideIndex,
    pub timestamp: Timestamp,
}

impl TelemetryEvent {
    pub fn new(action: TelemetryAction, label: String, slide_index: SlideIndex, timestamp: Timestamp) -> Self {
        TelemetryEvent {
            event_name: action.event_name(),
            category: CATEGORY,
            label,
            value: 1,
            slide_index,
            timestamp,
        }
    }
}

/// Bounded outbox drained by the host.
#[derive(Debug)]
pub struct TelemetryQueue {
    events: VecDeque<TelemetryEvent>,
    capacity: usize,
    dropped: u64,
}

impl TelemetryQueue {
    pub fn new(capacity: usize) -> Self {
        TelemetryQueue {
            events: VecDeque::with_capacity(capacity.min(256)),
            capacity: capacity.max(1),
            dropped: 0,
        }
    }

    pub fn push(&mut self, event: TelemetryEvent) {
        if self.events.len() >= self.capacity {
            self.events.pop_front();
            self.dropped += 1;
            tracing::warn!("telemetry queue full, dropped {} events so far", self.dropped);
        }
        tracing::debug!("telemetry {} ({})", event.event_name, event.label);
        self.events.push_back(event);
    }

    pub fn drain(&mut self) -> Vec<TelemetryEvent> {
        self.events.drain(..).collect()
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn dropped(&self) -> u64 {
        self.dropped
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(label: &str) -> TelemetryEvent {
        TelemetryEvent::new(
            TelemetryAction::HotspotSelected,
            label.to_string(),
            SlideIndex::new(0),
            Timestamp::from_micros(0),
        )
    }

    #[test]
    fn full_queue_drops_oldest() {
        let mut queue = TelemetryQueue::new(2);
        queue.push(event("a"));
        queue.push(event("b"));
        queue.push(event("c"));

        assert_eq!(queue.dropped(), 1);
        let labels: Vec<_> = queue.drain().into_iter().map(|e| e.label).collect();
        assert_eq!(labels, vec!["b", "c"]);
        assert!(queue.is_empty());
    }

    #[test]
    fn event_carries_category_and_value() {
        let e = event("Sole");
        assert_eq!(e.event_name, "hotspot_selected");
        assert_eq!(e.category, "User Interaction");
        assert_eq!(e.value, 1);

        let json = serde_json::to_value(&e).unwrap();
        assert_eq!(json["eventName"], "hotspot_selected");
        assert_eq!(json["slideIndex"], 0);
    }
}
