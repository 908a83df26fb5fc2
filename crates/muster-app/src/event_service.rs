use std::sync::Arc;

use chrono::{DateTime, Utc};

use muster_core::alert::{Alert, Fingerprint};
use muster_core::event::Event;
use muster_ports::outbound::{AlertStore, EventStore};

use crate::error::AppError;

pub struct EventService<E, A>
where
    E: EventStore,
    A: AlertStore,
{
    events: E,
    alerts: A,
}

impl<E, A> EventService<E, A>
where
    E: EventStore,
    A: AlertStore,
{
    pub fn new(events: E, alerts: A) -> Self {
        Self { events, alerts }
    }

    pub async fn list_events(&self) -> Result<Vec<Event>, AppError> {
        Ok(self.events.all().await?)
    }

    /// Stores the event and returns its id. `created_at` defaults to `now`.
    pub async fn add_event(&self, mut event: Event, now: DateTime<Utc>) -> Result<u64, AppError> {
        if event.created_at.is_none() {
            event.created_at = Some(now);
        }
        let id = self.events.set(&event).await?;
        tracing::info!(event_id = id, alerts = event.alerts.len(), "event recorded");
        Ok(id)
    }

    /// Resolves the alerts referenced by an event, in the order the event lists them.
    pub async fn event_alerts(&self, id: u64) -> Result<Vec<Arc<Alert>>, AppError> {
        let event = self.events.get(id).await?;

        let fingerprints = event
            .alerts
            .iter()
            .map(|s| s.parse::<Fingerprint>())
            .collect::<Result<Vec<_>, _>>()?;

        let mut alerts = Vec::with_capacity(fingerprints.len());
        for fp in &fingerprints {
            alerts.push(self.alerts.get(fp).await?);
        }
        Ok(alerts)
    }
}
