use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, PoisonError, RwLock};

use async_trait::async_trait;
use tokio::sync::broadcast::{self, error::RecvError};

use muster_core::alert::{Alert, Fingerprint};
use muster_ports::error::PortError;
use muster_ports::outbound::{AlertIterator, AlertProvider, AlertStore};

/// In-memory alert store that also feeds live subscribers.
///
/// The latest write per fingerprint wins. A new subscriber first receives
/// every alert currently held, then each alert put after it subscribed.
pub struct MemAlerts {
    alerts: RwLock<HashMap<Fingerprint, Arc<Alert>>>,
    updates: broadcast::Sender<Arc<Alert>>,
}

impl MemAlerts {
    /// `capacity` bounds how far a subscriber may fall behind before it lags.
    pub fn new(capacity: usize) -> Self {
        let (updates, _) = broadcast::channel(capacity.max(1));
        Self {
            alerts: RwLock::new(HashMap::new()),
            updates,
        }
    }

    pub fn len(&self) -> usize {
        self.alerts
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl AlertProvider for MemAlerts {
    fn subscribe(&self) -> Box<dyn AlertIterator> {
        // Subscribing under the read lock means no put lands between snapshot and receiver.
        let alerts = self.alerts.read().unwrap_or_else(PoisonError::into_inner);
        let replay: VecDeque<Arc<Alert>> = alerts.values().cloned().collect();
        let rx = self.updates.subscribe();
        drop(alerts);

        Box::new(MemAlertIterator {
            replay,
            rx: Some(rx),
            err: None,
        })
    }
}

#[async_trait]
impl AlertStore for MemAlerts {
    async fn get(&self, fp: &Fingerprint) -> Result<Arc<Alert>, PortError> {
        self.alerts
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(fp)
            .cloned()
            .ok_or(PortError::NotFound)
    }

    async fn put(&self, alerts: Vec<Alert>) -> Result<(), PortError> {
        let mut stored = self.alerts.write().unwrap_or_else(PoisonError::into_inner);
        for alert in alerts {
            let alert = Arc::new(alert);
            stored.insert(alert.fingerprint(), Arc::clone(&alert));
            // No subscribers is fine; the alert stays queryable.
            let _ = self.updates.send(alert);
        }
        Ok(())
    }
}

struct MemAlertIterator {
    replay: VecDeque<Arc<Alert>>,
    rx: Option<broadcast::Receiver<Arc<Alert>>>,
    err: Option<PortError>,
}

#[async_trait]
impl AlertIterator for MemAlertIterator {
    async fn next(&mut self) -> Option<Arc<Alert>> {
        if let Some(alert) = self.replay.pop_front() {
            return Some(alert);
        }
        let rx = self.rx.as_mut()?;
        loop {
            match rx.recv().await {
                Ok(alert) => return Some(alert),
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "alert subscriber lagged");
                    self.err = Some(PortError::Stream(format!(
                        "subscriber lagged, {skipped} alerts skipped"
                    )));
                }
                Err(RecvError::Closed) => return None,
            }
        }
    }

    fn err(&mut self) -> Option<PortError> {
        self.err.take()
    }

    fn close(&mut self) {
        self.replay.clear();
        self.rx = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use muster_core::alert::LabelSet;

    fn make_alert(name: &str) -> Alert {
        let labels: LabelSet = [("alertname", name)].into_iter().collect();
        Alert::new(labels, Utc::now())
    }

    #[tokio::test]
    async fn put_then_get() {
        let store = MemAlerts::new(16);
        let alert = make_alert("HighCPU");
        store.put(vec![alert.clone()]).await.unwrap();

        let got = store.get(&alert.fingerprint()).await.unwrap();
        assert_eq!(*got, alert);
    }

    #[tokio::test]
    async fn get_unknown_is_not_found() {
        let store = MemAlerts::new(16);
        let result = store.get(&Fingerprint::from_u64(1)).await;
        assert_eq!(result.unwrap_err(), PortError::NotFound);
    }

    #[tokio::test]
    async fn latest_write_wins() {
        let store = MemAlerts::new(16);
        let first = make_alert("HighCPU");
        let second = first.clone().with_ends_at(Utc::now());
        store.put(vec![first.clone()]).await.unwrap();
        store.put(vec![second.clone()]).await.unwrap();

        assert_eq!(store.len(), 1);
        let got = store.get(&first.fingerprint()).await.unwrap();
        assert_eq!(*got, second);
    }

    #[tokio::test]
    async fn subscriber_replays_existing_then_receives_new() {
        let store = MemAlerts::new(16);
        let existing = make_alert("HighCPU");
        store.put(vec![existing.clone()]).await.unwrap();

        let mut it = store.subscribe();
        let live = make_alert("DiskFull");
        store.put(vec![live.clone()]).await.unwrap();

        assert_eq!(*it.next().await.unwrap(), existing);
        assert_eq!(*it.next().await.unwrap(), live);
        assert!(it.err().is_none());
    }

    #[tokio::test]
    async fn lagging_subscriber_records_error_and_keeps_reading() {
        let store = MemAlerts::new(1);
        let mut it = store.subscribe();

        store.put(vec![make_alert("A")]).await.unwrap();
        store.put(vec![make_alert("B")]).await.unwrap();

        let alert = it.next().await.unwrap();
        assert_eq!(alert.labels().get("alertname"), Some("B"));
        assert!(matches!(it.err(), Some(PortError::Stream(_))));
        assert!(it.err().is_none());
    }

    #[tokio::test]
    async fn dropped_store_ends_stream() {
        let store = MemAlerts::new(16);
        let mut it = store.subscribe();
        drop(store);

        assert!(it.next().await.is_none());
    }

    #[tokio::test]
    async fn closed_iterator_is_exhausted() {
        let store = MemAlerts::new(16);
        store.put(vec![make_alert("HighCPU")]).await.unwrap();
        let mut it = store.subscribe();

        it.close();
        assert!(it.next().await.is_none());
    }
}
