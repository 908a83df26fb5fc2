//! The dispatch engine.
//!
//! Consumes the live alert stream, sorts every alert into the aggregation
//! groups of each route it matches, and retires groups once they are empty.
//! Each group owns an independent timer loop; the engine only creates and
//! destroys them.

mod group;

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::Utc;
use futures::future::BoxFuture;
use futures::FutureExt;
use tokio::sync::RwLock;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use muster_core::alert::{Alert, Fingerprint};
use muster_core::ids::RouteId;
use muster_core::route::Route;
use muster_ports::outbound::{AlertIterator, AlertProvider, Marker, Notifier, RouteMatcher};
use muster_ports::types::NotifyContext;

use crate::overview::{self, AlertOverview};

pub use group::{AggrGroup, DeliverFn};

/// Aggregation groups by route, then by fingerprint of the grouping labels.
pub type GroupMap = HashMap<RouteId, HashMap<Fingerprint, Arc<AggrGroup>>>;

/// Floor for the cleanup sweep period.
const MIN_CLEANUP_INTERVAL: Duration = Duration::from_secs(1);

#[derive(Debug, Clone)]
pub struct DispatcherConfig {
    /// How often empty groups are retired. Never more often than once per second.
    pub cleanup_interval: Duration,
    /// Floor for a route's group interval.
    pub min_group_interval: Duration,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            cleanup_interval: Duration::from_secs(30),
            min_group_interval: Duration::from_secs(10),
        }
    }
}

struct Lifecycle {
    cancel: CancellationToken,
    done: CancellationToken,
}

pub struct Dispatcher {
    provider: Arc<dyn AlertProvider>,
    matcher: Arc<dyn RouteMatcher>,
    notifier: Arc<dyn Notifier>,
    marker: Arc<dyn Marker>,
    config: DispatcherConfig,
    groups: RwLock<GroupMap>,
    lifecycle: Mutex<Option<Lifecycle>>,
}

impl Dispatcher {
    pub fn new(
        provider: Arc<dyn AlertProvider>,
        matcher: Arc<dyn RouteMatcher>,
        notifier: Arc<dyn Notifier>,
        marker: Arc<dyn Marker>,
        config: DispatcherConfig,
    ) -> Self {
        Self {
            provider,
            matcher,
            notifier,
            marker,
            config,
            groups: RwLock::new(GroupMap::new()),
            lifecycle: Mutex::new(None),
        }
    }

    /// Dispatches alerts until the stream is exhausted or [`Dispatcher::stop`] is called.
    ///
    /// Must not be called again while a previous call is still running.
    pub async fn run(&self) {
        let cancel = CancellationToken::new();
        let done = CancellationToken::new();
        *lock(&self.lifecycle) = Some(Lifecycle {
            cancel: cancel.clone(),
            done: done.clone(),
        });
        let _done = done.drop_guard();

        self.groups.write().await.clear();

        tracing::info!("dispatcher started");
        self.run_loop(self.provider.subscribe(), &cancel).await;
        tracing::info!("dispatcher stopped");
    }

    async fn run_loop(&self, mut it: Box<dyn AlertIterator>, cancel: &CancellationToken) {
        let deliver = self.deliver_fn();
        let period = self.config.cleanup_interval.max(MIN_CLEANUP_INTERVAL);
        let mut cleanup = interval_at(Instant::now() + period, period);
        cleanup.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                maybe_alert = it.next() => {
                    let Some(alert) = maybe_alert else {
                        if let Some(err) = it.err() {
                            tracing::error!(%err, "error on alert update");
                        }
                        tracing::info!("alert stream exhausted");
                        break;
                    };

                    tracing::debug!(alert = %alert.fingerprint(), "received alert");

                    // Log errors but keep going.
                    if let Some(err) = it.err() {
                        tracing::error!(%err, "error on alert update");
                        continue;
                    }

                    for route in self.matcher.match_labels(alert.labels()) {
                        self.process_alert(&alert, route, cancel, &deliver).await;
                    }
                }
                _ = cleanup.tick() => self.cleanup().await,
                () = cancel.cancelled() => break,
            }
        }

        it.close();
    }

    /// Cancels the main loop and every group, then waits for the main loop to exit.
    /// No-op when the dispatcher is not running.
    pub async fn stop(&self) {
        let lifecycle = lock(&self.lifecycle).take();
        let Some(lifecycle) = lifecycle else {
            return;
        };
        lifecycle.cancel.cancel();
        lifecycle.done.cancelled().await;
    }

    /// Snapshot of the current groups, ready for presentation.
    pub async fn groups(&self) -> AlertOverview {
        let groups = self.groups.read().await;
        overview::build(&groups, self.marker.as_ref(), Utc::now())
    }

    async fn process_alert(
        &self,
        alert: &Arc<Alert>,
        route: Arc<Route>,
        cancel: &CancellationToken,
        deliver: &DeliverFn,
    ) {
        let group_labels = alert.labels().subset(&route.opts().group_by);
        let fp = group_labels.fingerprint();

        let mut groups = self.groups.write().await;
        let group = groups
            .entry(route.id().clone())
            .or_default()
            .entry(fp)
            .or_insert_with(|| {
                let group = AggrGroup::new(group_labels, Arc::clone(&route), cancel);
                group.start(Arc::clone(deliver), self.config.min_group_interval);
                tracing::debug!(
                    group_key = %group.group_key(),
                    receiver = %route.opts().receiver,
                    "created aggregation group"
                );
                group
            });

        group.insert(Arc::clone(alert));
    }

    /// Stops and drops every group that currently holds no alerts.
    async fn cleanup(&self) {
        let mut groups = self.groups.write().await;

        for route_groups in groups.values_mut() {
            let empty: Vec<Fingerprint> = route_groups
                .iter()
                .filter(|(_, group)| group.is_empty())
                .map(|(fp, _)| *fp)
                .collect();

            for fp in empty {
                if let Some(group) = route_groups.remove(&fp) {
                    group.stop().await;
                    tracing::debug!(group_key = %group.group_key(), "removed empty aggregation group");
                }
            }
        }

        groups.retain(|_, route_groups| !route_groups.is_empty());
    }

    fn deliver_fn(&self) -> DeliverFn {
        let notifier = Arc::clone(&self.notifier);
        Arc::new(
            move |ctx: NotifyContext, alerts: Vec<Arc<Alert>>| -> BoxFuture<'static, bool> {
                let notifier = Arc::clone(&notifier);
                async move {
                    match notifier.notify(&ctx, &alerts).await {
                        Ok(()) => true,
                        Err(err) => {
                            tracing::error!(
                                group_key = %ctx.group_key,
                                receiver = %ctx.receiver,
                                alerts = alerts.len(),
                                %err,
                                "notify failed"
                            );
                            false
                        }
                    }
                }
                .boxed()
            },
        )
    }
}

pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
