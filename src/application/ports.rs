// Renderer-facing ports injected into the data service and session
use crate::domain::anomaly::Anomaly;
use crate::domain::error::DashboardError;
use crate::domain::signal::SeriesOrigin;
use serde::Serialize;
use std::collections::VecDeque;
use std::sync::Mutex;
use tokio::sync::broadcast;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "state", rename_all = "camelCase")]
pub enum LoadingState {
    Idle,
    Loading { message: String },
    /// Progressive conversion of a large signal window
    Progress { percent: u8 },
}

/// What the renderer should redraw.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum RenderUpdate {
    #[serde(rename_all = "camelCase")]
    Series {
        track_id: String,
        origin: SeriesOrigin,
        points: usize,
    },
    Domain { start: f64, end: f64 },
    PlaybackTime { time: f64 },
    Anomalies { added: Vec<Anomaly> },
    Simulation { points: usize },
}

pub trait UiPorts: Send + Sync {
    fn render(&self, update: RenderUpdate);
    fn loading(&self, state: LoadingState);
    fn show_error(&self, error: &DashboardError);
}

/// Ports that drop everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopPorts;

impl UiPorts for NoopPorts {
    fn render(&self, _update: RenderUpdate) {}
    fn loading(&self, _state: LoadingState) {}
    fn show_error(&self, _error: &DashboardError) {}
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "port", rename_all = "camelCase")]
pub enum PortEvent {
    Render { update: RenderUpdate },
    Loading { state: LoadingState },
    Error { message: String },
}

/// Keeps the most recent port events and republishes each one to live
/// subscribers. The HTTP surface reports them and tests assert on them.
#[derive(Debug)]
pub struct RecordingPorts {
    capacity: usize,
    events: Mutex<VecDeque<PortEvent>>,
    live: broadcast::Sender<PortEvent>,
}

impl Default for RecordingPorts {
    fn default() -> Self {
        Self::with_capacity(256)
    }
}

impl RecordingPorts {
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        let (live, _) = broadcast::channel(capacity);
        Self {
            capacity,
            events: Mutex::new(VecDeque::new()),
            live,
        }
    }

    /// Events pushed from now on. Slow subscribers lose the oldest ones.
    pub fn subscribe(&self) -> broadcast::Receiver<PortEvent> {
        self.live.subscribe()
    }

    fn push(&self, event: PortEvent) {
        // No subscribers is fine.
        let _ = self.live.send(event.clone());
        let mut events = self.events.lock().unwrap_or_else(|e| e.into_inner());
        if events.len() == self.capacity {
            events.pop_front();
        }
        events.push_back(event);
    }

    pub fn events(&self) -> Vec<PortEvent> {
        self.events
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .cloned()
            .collect()
    }

    pub fn errors(&self) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                PortEvent::Error { message } => Some(message),
                _ => None,
            })
            .collect()
    }

    pub fn drain(&self) -> Vec<PortEvent> {
        self.events
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .drain(..)
            .collect()
    }
}

impl UiPorts for RecordingPorts {
    fn render(&self, update: RenderUpdate) {
        self.push(PortEvent::Render { update });
    }

    fn loading(&self, state: LoadingState) {
        self.push(PortEvent::Loading { state });
    }

    fn show_error(&self, error: &DashboardError) {
        self.push(PortEvent::Error {
            message: error.to_string(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recording_ports_are_bounded() {
        let ports = RecordingPorts::with_capacity(2);
        ports.loading(LoadingState::Idle);
        ports.render(RenderUpdate::PlaybackTime { time: 1.0 });
        ports.show_error(&DashboardError::fetch("cases", "offline"));

        let events = ports.events();
        assert_eq!(events.len(), 2);
        assert!(matches!(events[0], PortEvent::Render { .. }));
        assert_eq!(ports.errors(), vec!["fetch failed for cases: offline".to_string()]);
        assert_eq!(ports.drain().len(), 2);
        assert!(ports.events().is_empty());
    }

    #[tokio::test]
    async fn test_subscribers_see_new_events() {
        let ports = RecordingPorts::default();
        ports.loading(LoadingState::Idle);
        let mut rx = ports.subscribe();
        ports.render(RenderUpdate::Domain { start: 0.0, end: 5.0 });

        let event = rx.recv().await.unwrap();
        assert!(matches!(event, PortEvent::Render { update: RenderUpdate::Domain { .. } }));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_event_json_shape() {
        let event = PortEvent::Loading {
            state: LoadingState::Progress { percent: 40 },
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"port": "loading", "state": {"state": "progress", "percent": 40}})
        );
    }
}
