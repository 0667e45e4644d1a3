// Periodic push publishing over a broadcast channel
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::{broadcast, watch};

use crate::application::alarm_service::AlarmService;
use crate::application::store::TelemetryStore;
use crate::domain::alarm::AlarmEvent;
use crate::domain::snapshot::Snapshot;

/// One frame pushed to every connected consumer.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BroadcastFrame {
    Snapshot {
        data: Snapshot,
        alarms: Vec<AlarmEvent>,
    },
    Shutdown,
}

/// Publishes the current snapshot and active alarms on a fixed interval.
/// Consumers subscribe through `subscribe`; a lagging consumer misses frames
/// rather than blocking the loop.
#[derive(Clone)]
pub struct BroadcastService {
    store: Arc<TelemetryStore>,
    alarms: AlarmService,
    interval: Duration,
    tx: broadcast::Sender<String>,
}

impl BroadcastService {
    pub fn new(store: Arc<TelemetryStore>, alarms: AlarmService, interval: Duration) -> Self {
        let (tx, _) = broadcast::channel(16);
        Self {
            store,
            alarms,
            interval,
            tx,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<String> {
        self.tx.subscribe()
    }

    /// The publish loop. Runs until the shutdown signal flips, then notifies
    /// connected consumers with a final frame and exits; no cycle is left
    /// half-published.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        tracing::info!("broadcast loop started ({}s interval)", self.interval.as_secs());

        loop {
            tokio::select! {
                _ = ticker.tick() => self.publish_cycle(),
                _ = shutdown.changed() => break,
            }
        }

        self.send_frame(&BroadcastFrame::Shutdown);
        tracing::info!("broadcast loop stopped");
    }

    fn publish_cycle(&self) {
        // Evaluation is also the sampling heartbeat, so it runs first and the
        // published snapshot reflects any sample it recorded.
        let alarms = self.alarms.evaluate();
        let data = self.store.get_snapshot();
        self.send_frame(&BroadcastFrame::Snapshot { data, alarms });
    }

    fn send_frame(&self, frame: &BroadcastFrame) {
        match serde_json::to_string(frame) {
            // A send error only means nobody is listening right now.
            Ok(payload) => {
                let _ = self.tx.send(payload);
            }
            Err(e) => tracing::error!("broadcast frame serialization failed: {}", e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::log_service::LogService;
    use crate::application::store::StorePaths;
    use tempfile::TempDir;

    fn service(dir: &TempDir, interval: Duration) -> BroadcastService {
        let store = Arc::new(TelemetryStore::new(
            StorePaths::new(dir.path()),
            Duration::ZERO,
            false,
        ));
        let alarms = AlarmService::new(store.clone(), LogService::new(store.clone()));
        BroadcastService::new(store, alarms, interval)
    }

    #[test]
    fn test_snapshot_frame_shape() {
        let frame = BroadcastFrame::Snapshot {
            data: Snapshot::new(
                "2025-03-01T10:00:00".to_string(),
                Default::default(),
                Default::default(),
                Default::default(),
                Default::default(),
            ),
            alarms: Vec::new(),
        };
        let value = serde_json::to_value(&frame).unwrap();
        assert_eq!(value["type"], "snapshot");
        assert!(value["data"]["timestamp"].is_string());
        assert!(value["alarms"].as_array().unwrap().is_empty());

        let shutdown = serde_json::to_value(BroadcastFrame::Shutdown).unwrap();
        assert_eq!(shutdown["type"], "shutdown");
    }

    #[tokio::test]
    async fn test_loop_publishes_then_announces_shutdown() {
        let dir = TempDir::new().unwrap();
        let service = service(&dir, Duration::from_millis(10));
        let mut rx = service.subscribe();
        let (stop_tx, stop_rx) = watch::channel(false);

        let loop_service = service.clone();
        let handle = tokio::spawn(async move { loop_service.run(stop_rx).await });

        let first = rx.recv().await.unwrap();
        let frame: serde_json::Value = serde_json::from_str(&first).unwrap();
        assert_eq!(frame["type"], "snapshot");

        stop_tx.send(true).unwrap();
        handle.await.unwrap();
        // Close the channel so the drain below terminates.
        drop(service);

        let mut saw_shutdown = false;
        while let Ok(payload) = rx.recv().await {
            let frame: serde_json::Value = serde_json::from_str(&payload).unwrap();
            if frame["type"] == "shutdown" {
                saw_shutdown = true;
            }
        }
        assert!(saw_shutdown);
    }
}
