use std::sync::Arc;

use async_trait::async_trait;

use muster_core::alert::{Alert, Fingerprint, LabelSet};
use muster_core::event::Event;
use muster_core::route::Route;

use crate::error::{NotifyError, PortError};
use crate::types::NotifyContext;

/// Source of the live alert stream.
pub trait AlertProvider: Send + Sync {
    /// Returns a fresh iterator. Iterators are not restartable; subscribe again instead.
    fn subscribe(&self) -> Box<dyn AlertIterator>;
}

/// A lazy, unbounded sequence of alerts.
#[async_trait]
pub trait AlertIterator: Send {
    /// Next alert, or `None` once the stream is exhausted.
    ///
    /// Must be cancel safe: dropping the future before it completes loses no alert.
    async fn next(&mut self) -> Option<Arc<Alert>>;

    /// Takes the error recorded since the last call, if any.
    fn err(&mut self) -> Option<PortError>;

    fn close(&mut self);
}

#[async_trait]
pub trait AlertStore: Send + Sync {
    async fn get(&self, fp: &Fingerprint) -> Result<Arc<Alert>, PortError>;
    async fn put(&self, alerts: Vec<Alert>) -> Result<(), PortError>;
}

/// Produces zero or more routes for a label set; each match is an independent grouping context.
pub trait RouteMatcher: Send + Sync {
    fn match_labels(&self, labels: &LabelSet) -> Vec<Arc<Route>>;
}

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, ctx: &NotifyContext, alerts: &[Arc<Alert>]) -> Result<(), NotifyError>;
}

/// Silencing and inhibition state of alerts.
pub trait Marker: Send + Sync {
    /// Id of the silence muting the alert, if any.
    fn silenced(&self, fp: &Fingerprint) -> Option<u64>;
    fn inhibited(&self, fp: &Fingerprint) -> bool;
}

#[async_trait]
pub trait EventStore: Send + Sync {
    /// Stores the event and returns its newly assigned sequential id.
    async fn set(&self, event: &Event) -> Result<u64, PortError>;
    async fn get(&self, id: u64) -> Result<Event, PortError>;
    async fn all(&self) -> Result<Vec<Event>, PortError>;
}

#[async_trait]
impl<T: AlertStore + ?Sized> AlertStore for Arc<T> {
    async fn get(&self, fp: &Fingerprint) -> Result<Arc<Alert>, PortError> {
        (**self).get(fp).await
    }

    async fn put(&self, alerts: Vec<Alert>) -> Result<(), PortError> {
        (**self).put(alerts).await
    }
}

#[async_trait]
impl<T: EventStore + ?Sized> EventStore for Arc<T> {
    async fn set(&self, event: &Event) -> Result<u64, PortError> {
        (**self).set(event).await
    }

    async fn get(&self, id: u64) -> Result<Event, PortError> {
        (**self).get(id).await
    }

    async fn all(&self) -> Result<Vec<Event>, PortError> {
        (**self).all().await
    }
}
